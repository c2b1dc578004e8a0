//! Set difference.

use crate::error::Error;
use crate::iterator::{Cancellation, Cursor, Size, Stats, TagMap};
use crate::store::Ref;

/// Emits every result of `from` that the excluded cursor does not
/// contain.
pub struct Not {
    exclude: Box<dyn Cursor>,
    from: Box<dyn Cursor>,
    result: Option<Ref>,
    closed: bool,
}

impl Not {
    pub fn new(exclude: Box<dyn Cursor>, from: Box<dyn Cursor>) -> Self {
        Self {
            exclude,
            from,
            result: None,
            closed: false,
        }
    }
}

impl Cursor for Not {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.closed {
            return false;
        }
        while self.from.next(ctx) {
            let r = match self.from.result() {
                Some(r) => r,
                None => continue,
            };
            if !self.exclude.contains(ctx, &r) {
                self.result = Some(r);
                return true;
            }
            if self.exclude.err().is_some() {
                return false;
            }
        }
        self.result = None;
        false
    }

    fn result(&self) -> Option<Ref> {
        self.result.clone()
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.from.tag_results(dst);
    }

    fn next_path(&mut self, _ctx: &Cancellation) -> bool {
        false
    }

    fn contains(&mut self, ctx: &Cancellation, v: &Ref) -> bool {
        if self.closed {
            return false;
        }
        if !self.from.contains(ctx, v) {
            return false;
        }
        if !self.exclude.contains(ctx, v) && self.exclude.err().is_none() {
            self.result = Some(v.clone());
            return true;
        }
        false
    }

    fn reset(&mut self) {
        self.exclude.reset();
        self.from.reset();
        self.result = None;
    }

    fn stats(&self) -> Stats {
        let from = self.from.stats();
        let excl = self.exclude.stats();
        Stats {
            next_cost: from.next_cost + excl.contains_cost,
            contains_cost: excl.contains_cost,
            size: Size::guess((from.size.value - excl.size.value).max(0)),
        }
    }

    fn err(&self) -> Option<&Error> {
        self.from.err().or_else(|| self.exclude.err())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.exclude.close();
        self.from.close();
        self.result = None;
    }
}
