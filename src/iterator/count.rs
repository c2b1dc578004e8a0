//! Cardinality aggregation.

use crate::error::Error;
use crate::iterator::{Cancellation, Cursor, Size, Stats, TagMap};
use crate::model::Value;
use crate::store::Ref;

/// Drains the input and emits a single synthetic reference carrying the
/// number of results as an integer value.
pub struct Count {
    sub: Box<dyn Cursor>,
    result: Option<Ref>,
    done: bool,
    closed: bool,
}

impl Count {
    pub fn new(sub: Box<dyn Cursor>) -> Self {
        Self {
            sub,
            result: None,
            done: false,
            closed: false,
        }
    }

    fn tally(&mut self, ctx: &Cancellation) -> Option<Ref> {
        let mut n: i64 = 0;
        while self.sub.next(ctx) {
            n += 1;
        }
        if self.sub.err().is_some() || ctx.is_cancelled() {
            return None;
        }
        Some(Ref::Prefetched(Value::Int(n)))
    }
}

impl Cursor for Count {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.closed || self.done {
            return false;
        }
        self.done = true;
        match self.tally(ctx) {
            Some(r) => {
                self.result = Some(r);
                true
            }
            None => false,
        }
    }

    fn result(&self) -> Option<Ref> {
        self.result.clone()
    }

    fn tag_results(&self, _dst: &mut TagMap) {}

    fn next_path(&mut self, _ctx: &Cancellation) -> bool {
        false
    }

    fn contains(&mut self, ctx: &Cancellation, v: &Ref) -> bool {
        if self.closed {
            return false;
        }
        if !self.done {
            self.done = true;
            self.result = self.tally(ctx);
        }
        match &self.result {
            Some(r) if r == v => true,
            _ => false,
        }
    }

    fn reset(&mut self) {
        self.sub.reset();
        self.result = None;
        self.done = false;
    }

    fn stats(&self) -> Stats {
        let sub = self.sub.stats();
        Stats {
            next_cost: sub.next_cost * sub.size.value.max(1),
            contains_cost: sub.next_cost * sub.size.value.max(1),
            size: Size::exact(1),
        }
    }

    fn err(&self) -> Option<&Error> {
        self.sub.err()
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
