//! Reference de-duplication.

use rustc_hash::FxHashSet;

use crate::error::Error;
use crate::iterator::{Cancellation, Cursor, Size, Stats, TagMap};
use crate::store::Ref;

/// Drops references already seen earlier in the scan.
pub struct Unique {
    sub: Box<dyn Cursor>,
    seen: FxHashSet<Ref>,
    closed: bool,
}

impl Unique {
    pub fn new(sub: Box<dyn Cursor>) -> Self {
        Self {
            sub,
            seen: FxHashSet::default(),
            closed: false,
        }
    }
}

impl Cursor for Unique {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.closed {
            return false;
        }
        while self.sub.next(ctx) {
            let r = match self.sub.result() {
                Some(r) => r,
                None => continue,
            };
            if self.seen.insert(r) {
                return true;
            }
        }
        false
    }

    fn result(&self) -> Option<Ref> {
        self.sub.result()
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.sub.tag_results(dst);
    }

    fn next_path(&mut self, _ctx: &Cancellation) -> bool {
        false
    }

    fn contains(&mut self, ctx: &Cancellation, v: &Ref) -> bool {
        if self.closed {
            return false;
        }
        self.sub.contains(ctx, v)
    }

    fn reset(&mut self) {
        self.sub.reset();
        self.seen.clear();
    }

    fn stats(&self) -> Stats {
        let sub = self.sub.stats();
        Stats {
            next_cost: sub.next_cost + 1,
            contains_cost: sub.contains_cost,
            size: Size::guess(sub.size.value / 2 + 1),
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
        self.seen.clear();
    }
}
