//! Value-predicate filtering.

use tracing::error;

use crate::error::Error;
use crate::iterator::{Cancellation, Cursor, Size, Stats, TagMap};
use crate::model::Value;
use crate::shape::{CmpOp, ValuePredicate};
use crate::store::{resolve_name, Ref, Store};

/// Scans a sub-cursor, resolving each reference to its value and keeping
/// the references whose value satisfies every predicate.
///
/// A backend failure during resolution latches; the cursor then stops.
pub struct ValueFilter {
    qs: Store,
    sub: Box<dyn Cursor>,
    preds: Vec<ValuePredicate>,
    result: Option<Ref>,
    err: Option<Error>,
    closed: bool,
}

impl ValueFilter {
    pub fn new(qs: Store, sub: Box<dyn Cursor>, preds: Vec<ValuePredicate>) -> Self {
        Self {
            qs,
            sub,
            preds,
            result: None,
            err: None,
            closed: false,
        }
    }

    fn accepts(&mut self, r: &Ref) -> Option<bool> {
        let name = match resolve_name(self.qs.as_ref(), r) {
            Ok(v) => v,
            Err(e) => {
                error!(target: "quarry::iterator", %e, "value lookup failed during filter");
                self.err = Some(e);
                return None;
            }
        };
        Some(self.preds.iter().all(|p| p.matches(&name)))
    }
}

impl ValuePredicate {
    /// Whether a single value passes this predicate.
    pub fn matches(&self, v: &Value) -> bool {
        match self {
            ValuePredicate::Compare { op, value } => match v.compare(value) {
                Some(ord) => match op {
                    CmpOp::Lt => ord.is_lt(),
                    CmpOp::Lte => ord.is_le(),
                    CmpOp::Gt => ord.is_gt(),
                    CmpOp::Gte => ord.is_ge(),
                },
                None => false,
            },
            ValuePredicate::Regex { pattern, refs } => {
                if v.is_node_ref() && !refs {
                    return false;
                }
                match v.text() {
                    Some(text) => pattern.is_match(text),
                    None => false,
                }
            }
            ValuePredicate::Like { like } => {
                if v.is_node_ref() {
                    return false;
                }
                match v.text() {
                    Some(text) => like.is_match(text),
                    None => false,
                }
            }
        }
    }
}

impl Cursor for ValueFilter {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.closed || self.err.is_some() {
            return false;
        }
        while self.sub.next(ctx) {
            let r = match self.sub.result() {
                Some(r) => r,
                None => continue,
            };
            match self.accepts(&r) {
                Some(true) => {
                    self.result = Some(r);
                    return true;
                }
                Some(false) => continue,
                None => return false,
            }
        }
        self.result = None;
        false
    }

    fn result(&self) -> Option<Ref> {
        self.result.clone()
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.sub.tag_results(dst);
    }

    fn next_path(&mut self, ctx: &Cancellation) -> bool {
        if self.closed {
            return false;
        }
        self.sub.next_path(ctx)
    }

    fn contains(&mut self, ctx: &Cancellation, v: &Ref) -> bool {
        if self.closed || self.err.is_some() {
            return false;
        }
        match self.accepts(v) {
            Some(true) => {
                if self.sub.contains(ctx, v) {
                    self.result = Some(v.clone());
                    return true;
                }
                false
            }
            _ => false,
        }
    }

    fn reset(&mut self) {
        self.sub.reset();
        self.result = None;
        self.err = None;
    }

    fn stats(&self) -> Stats {
        let sub = self.sub.stats();
        Stats {
            next_cost: sub.next_cost + 1,
            contains_cost: sub.contains_cost + 1,
            size: Size::guess(sub.size.value / 2 + 1),
        }
    }

    fn err(&self) -> Option<&Error> {
        self.err.as_ref().or_else(|| self.sub.err())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.sub.close();
        self.result = None;
    }
}
