//! Nested-loop intersection.

use crate::error::Error;
use crate::iterator::{Cancellation, Cursor, Size, Stats, TagMap};
use crate::store::Ref;

/// Intersection of several cursors.
///
/// The child with the smallest reported size drives the scan; every other
/// child is consulted in lookup mode. Optional children participate only
/// in lookup mode and never fail the join; their tags are present only
/// when the lookup hit.
pub struct And {
    primary: Box<dyn Cursor>,
    checkers: Vec<Box<dyn Cursor>>,
    result: Option<Ref>,
    closed: bool,
}

impl And {
    /// Builds the intersection, promoting the smallest child to primary
    /// and ordering the rest by lookup cost.
    pub fn new(mut children: Vec<Box<dyn Cursor>>) -> Self {
        debug_assert!(!children.is_empty(), "And requires at least one child");
        let primary_idx = children
            .iter()
            .enumerate()
            .min_by_key(|(_, c)| c.stats().size.value)
            .map(|(i, _)| i)
            .unwrap_or(0);
        let primary = children.swap_remove(primary_idx);
        children.sort_by_key(|c| c.stats().contains_cost);
        Self {
            primary,
            checkers: children,
            result: None,
            closed: false,
        }
    }

    /// Adds a lookup-only child whose misses do not fail the join.
    pub fn add_optional(&mut self, child: Box<dyn Cursor>) {
        self.checkers.push(child);
    }

    fn check_all(&mut self, ctx: &Cancellation, v: &Ref) -> bool {
        self.checkers.iter_mut().all(|c| c.contains(ctx, v))
    }
}

impl Cursor for And {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.closed {
            return false;
        }
        while self.primary.next(ctx) {
            let r = match self.primary.result() {
                Some(r) => r,
                None => continue,
            };
            if self.check_all(ctx, &r) {
                self.result = Some(r);
                return true;
            }
        }
        self.result = None;
        false
    }

    fn result(&self) -> Option<Ref> {
        self.result.clone()
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.primary.tag_results(dst);
        for c in &self.checkers {
            c.tag_results(dst);
        }
    }

    fn next_path(&mut self, ctx: &Cancellation) -> bool {
        if self.closed {
            return false;
        }
        if self.primary.next_path(ctx) {
            return true;
        }
        self.checkers.iter_mut().any(|c| c.next_path(ctx))
    }

    fn contains(&mut self, ctx: &Cancellation, v: &Ref) -> bool {
        if self.closed {
            return false;
        }
        if self.primary.contains(ctx, v) && self.check_all(ctx, v) {
            self.result = Some(v.clone());
            return true;
        }
        false
    }

    fn reset(&mut self) {
        self.primary.reset();
        for c in &mut self.checkers {
            c.reset();
        }
        self.result = None;
    }

    fn stats(&self) -> Stats {
        let primary = self.primary.stats();
        let mut next_cost = primary.next_cost;
        let mut contains_cost = primary.contains_cost;
        for c in &self.checkers {
            let st = c.stats();
            next_cost += st.contains_cost;
            contains_cost += st.contains_cost;
        }
        Stats {
            next_cost,
            contains_cost,
            size: Size {
                value: primary.size.value,
                exact: false,
            },
        }
    }

    fn err(&self) -> Option<&Error> {
        self.primary
            .err()
            .or_else(|| self.checkers.iter().find_map(|c| c.err()))
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.primary.close();
        for c in &mut self.checkers {
            c.close();
        }
        self.result = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::fixed::Fixed;

    fn refs(ids: &[u64]) -> Vec<Ref> {
        ids.iter().map(|id| Ref::Node(*id)).collect()
    }

    #[test]
    fn intersects_and_preserves_primary_order() {
        let ctx = Cancellation::new();
        let small: Box<dyn Cursor> = Box::new(Fixed::new(refs(&[4, 2, 9])));
        let large: Box<dyn Cursor> = Box::new(Fixed::new(refs(&[1, 2, 3, 4, 5])));
        let mut it = And::new(vec![large, small]);
        let mut got = Vec::new();
        while it.next(&ctx) {
            got.push(it.result().unwrap());
        }
        assert_eq!(got, refs(&[4, 2]));
    }

    #[test]
    fn contains_requires_all_children() {
        let ctx = Cancellation::new();
        let mut it = And::new(vec![
            Box::new(Fixed::new(refs(&[1, 2]))) as Box<dyn Cursor>,
            Box::new(Fixed::new(refs(&[2, 3]))),
        ]);
        assert!(it.contains(&ctx, &Ref::Node(2)));
        assert!(!it.contains(&ctx, &Ref::Node(1)));
    }
}
