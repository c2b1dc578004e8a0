//! Result slicing.

use crate::error::Error;
use crate::iterator::{Cancellation, Cursor, Size, Stats, TagMap};
use crate::store::Ref;

/// Drops the first `skip` results of the sub-cursor.
///
/// Membership tests are not paged; `contains` delegates to the input.
pub struct Skip {
    sub: Box<dyn Cursor>,
    skip: i64,
    skipped: i64,
}

impl Skip {
    pub fn new(sub: Box<dyn Cursor>, skip: i64) -> Self {
        Self {
            sub,
            skip,
            skipped: 0,
        }
    }
}

impl Cursor for Skip {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        while self.skipped < self.skip {
            if !self.sub.next(ctx) {
                return false;
            }
            self.skipped += 1;
        }
        self.sub.next(ctx)
    }

    fn result(&self) -> Option<Ref> {
        self.sub.result()
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.sub.tag_results(dst);
    }

    fn next_path(&mut self, ctx: &Cancellation) -> bool {
        self.sub.next_path(ctx)
    }

    fn contains(&mut self, ctx: &Cancellation, v: &Ref) -> bool {
        self.sub.contains(ctx, v)
    }

    fn reset(&mut self) {
        self.sub.reset();
        self.skipped = 0;
    }

    fn stats(&self) -> Stats {
        let sub = self.sub.stats();
        Stats {
            size: Size {
                value: (sub.size.value - self.skip).max(0),
                exact: sub.size.exact,
            },
            ..sub
        }
    }

    fn err(&self) -> Option<&Error> {
        self.sub.err()
    }

    fn close(&mut self) {
        self.sub.close();
    }
}

/// Yields at most `limit` results of the sub-cursor.
pub struct Limit {
    sub: Box<dyn Cursor>,
    limit: i64,
    emitted: i64,
}

impl Limit {
    pub fn new(sub: Box<dyn Cursor>, limit: i64) -> Self {
        Self {
            sub,
            limit,
            emitted: 0,
        }
    }
}

impl Cursor for Limit {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.emitted >= self.limit {
            return false;
        }
        if self.sub.next(ctx) {
            self.emitted += 1;
            return true;
        }
        false
    }

    fn result(&self) -> Option<Ref> {
        self.sub.result()
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.sub.tag_results(dst);
    }

    fn next_path(&mut self, ctx: &Cancellation) -> bool {
        self.sub.next_path(ctx)
    }

    fn contains(&mut self, ctx: &Cancellation, v: &Ref) -> bool {
        self.sub.contains(ctx, v)
    }

    fn reset(&mut self) {
        self.sub.reset();
        self.emitted = 0;
    }

    fn stats(&self) -> Stats {
        let sub = self.sub.stats();
        Stats {
            size: Size {
                value: sub.size.value.min(self.limit),
                exact: sub.size.exact,
            },
            ..sub
        }
    }

    fn err(&self) -> Option<&Error> {
        self.sub.err()
    }

    fn close(&mut self) {
        self.sub.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::fixed::Fixed;

    fn refs(ids: &[u64]) -> Vec<Ref> {
        ids.iter().map(|id| Ref::Node(*id)).collect()
    }

    fn drain(it: &mut dyn Cursor) -> Vec<Ref> {
        let ctx = Cancellation::new();
        let mut got = Vec::new();
        while it.next(&ctx) {
            got.push(it.result().unwrap());
        }
        got
    }

    #[test]
    fn skip_then_limit_slices() {
        let sub = Box::new(Fixed::new(refs(&[1, 2, 3, 4, 5])));
        let mut it = Limit::new(Box::new(Skip::new(sub, 1)), 2);
        assert_eq!(drain(&mut it), refs(&[2, 3]));
        it.reset();
        assert_eq!(drain(&mut it), refs(&[2, 3]));
    }
}
