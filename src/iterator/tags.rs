//! Tag-binding pass-throughs.

use rustc_hash::FxHashMap;

use crate::error::Error;
use crate::iterator::{Cancellation, Cursor, Stats, TagMap};
use crate::store::Ref;

/// Pass-through that binds each result's own reference under a set of
/// tag names.
pub struct Save {
    sub: Box<dyn Cursor>,
    tags: Vec<String>,
}

impl Save {
    pub fn new(sub: Box<dyn Cursor>, tags: Vec<String>) -> Self {
        Self { sub, tags }
    }
}

impl Cursor for Save {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        self.sub.next(ctx)
    }

    fn result(&self) -> Option<Ref> {
        self.sub.result()
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.sub.tag_results(dst);
        if let Some(r) = self.sub.result() {
            for tag in &self.tags {
                dst.insert(tag.clone(), r.clone());
            }
        }
    }

    fn next_path(&mut self, ctx: &Cancellation) -> bool {
        self.sub.next_path(ctx)
    }

    fn contains(&mut self, ctx: &Cancellation, v: &Ref) -> bool {
        self.sub.contains(ctx, v)
    }

    fn reset(&mut self) {
        self.sub.reset();
    }

    fn stats(&self) -> Stats {
        self.sub.stats()
    }

    fn err(&self) -> Option<&Error> {
        self.sub.err()
    }

    fn close(&mut self) {
        self.sub.close();
    }
}

/// Pass-through that adds a constant tag map to every result.
pub struct FixedTags {
    sub: Box<dyn Cursor>,
    tags: FxHashMap<String, Ref>,
}

impl FixedTags {
    pub fn new(sub: Box<dyn Cursor>, tags: FxHashMap<String, Ref>) -> Self {
        Self { sub, tags }
    }
}

impl Cursor for FixedTags {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        self.sub.next(ctx)
    }

    fn result(&self) -> Option<Ref> {
        self.sub.result()
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.sub.tag_results(dst);
        for (tag, value) in &self.tags {
            dst.insert(tag.clone(), value.clone());
        }
    }

    fn next_path(&mut self, ctx: &Cancellation) -> bool {
        self.sub.next_path(ctx)
    }

    fn contains(&mut self, ctx: &Cancellation, v: &Ref) -> bool {
        self.sub.contains(ctx, v)
    }

    fn reset(&mut self) {
        self.sub.reset();
    }

    fn stats(&self) -> Stats {
        self.sub.stats()
    }

    fn err(&self) -> Option<&Error> {
        self.sub.err()
    }

    fn close(&mut self) {
        self.sub.close();
    }
}

/// Lookup-only wrapper used as a child of an intersection.
///
/// Its membership test always succeeds; the wrapped cursor's tags are
/// contributed only when the underlying test actually hit. Scanning an
/// `Optional` directly yields nothing.
pub struct Optional {
    sub: Box<dyn Cursor>,
    hit: bool,
}

impl Optional {
    pub fn new(sub: Box<dyn Cursor>) -> Self {
        Self { sub, hit: false }
    }
}

impl Cursor for Optional {
    fn next(&mut self, _ctx: &Cancellation) -> bool {
        false
    }

    fn result(&self) -> Option<Ref> {
        if self.hit {
            self.sub.result()
        } else {
            None
        }
    }

    fn tag_results(&self, dst: &mut TagMap) {
        if self.hit {
            self.sub.tag_results(dst);
        }
    }

    fn next_path(&mut self, ctx: &Cancellation) -> bool {
        if self.hit {
            self.sub.next_path(ctx)
        } else {
            false
        }
    }

    fn contains(&mut self, ctx: &Cancellation, v: &Ref) -> bool {
        self.hit = self.sub.contains(ctx, v);
        true
    }

    fn reset(&mut self) {
        self.sub.reset();
        self.hit = false;
    }

    fn stats(&self) -> Stats {
        let sub = self.sub.stats();
        Stats {
            next_cost: 0,
            contains_cost: sub.contains_cost,
            size: sub.size,
        }
    }

    fn err(&self) -> Option<&Error> {
        self.sub.err()
    }

    fn close(&mut self) {
        self.sub.close();
        self.hit = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::fixed::Fixed;

    #[test]
    fn save_binds_each_result() {
        let ctx = Cancellation::new();
        let sub = Box::new(Fixed::new(vec![Ref::Node(1)]));
        let mut it = Save::new(sub, vec!["id".into()]);
        assert!(it.next(&ctx));
        let mut tags = TagMap::default();
        it.tag_results(&mut tags);
        assert_eq!(tags.get("id"), Some(&Ref::Node(1)));
    }

    #[test]
    fn optional_contains_tolerates_misses() {
        let ctx = Cancellation::new();
        let mut it = Optional::new(Box::new(Fixed::new(vec![Ref::Node(1)])));
        assert!(it.contains(&ctx, &Ref::Node(2)));
        let mut tags = TagMap::default();
        it.tag_results(&mut tags);
        assert!(tags.is_empty());
        assert!(it.contains(&ctx, &Ref::Node(1)));
    }
}
