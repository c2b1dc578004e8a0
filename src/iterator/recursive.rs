//! Breadth-first transitive closure.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;
use tracing::error;

use crate::error::Error;
use crate::iterator::{Cancellation, Cursor, Size, Stats, TagMap};
use crate::model::Value;
use crate::shape::{Morphism, Shape};
use crate::store::{Ref, Store};

/// Transitive closure of repeatedly applying a morphism to a seed set.
///
/// Results are emitted in discovery order, de-duplicated globally; the
/// seeds themselves are not emitted. Termination is guaranteed only on
/// graphs whose closure is finite; an unbounded derivation is stopped
/// only by an enclosing limit or by cancellation.
pub struct Recursive {
    qs: Store,
    seed: Box<dyn Cursor>,
    via: Morphism,
    depth_tag: Option<String>,
    seeded: bool,
    visited: FxHashSet<Ref>,
    delivered: FxHashSet<Ref>,
    frontier: Vec<Ref>,
    queue: VecDeque<Ref>,
    depth: i64,
    result: Option<Ref>,
    err: Option<Error>,
    closed: bool,
}

impl Recursive {
    pub fn new(qs: Store, seed: Box<dyn Cursor>, via: Morphism, depth_tag: Option<String>) -> Self {
        Self {
            qs,
            seed,
            via,
            depth_tag,
            seeded: false,
            visited: FxHashSet::default(),
            delivered: FxHashSet::default(),
            frontier: Vec::new(),
            queue: VecDeque::new(),
            depth: 0,
            result: None,
            err: None,
            closed: false,
        }
    }

    fn seed_frontier(&mut self, ctx: &Cancellation) {
        while self.seed.next(ctx) {
            if let Some(r) = self.seed.result() {
                if self.visited.insert(r.clone()) {
                    self.frontier.push(r);
                }
            }
        }
        self.seeded = true;
    }

    fn expand(&mut self, ctx: &Cancellation) -> bool {
        let step = self.via.apply(Shape::Fixed(self.frontier.clone()));
        let mut it = match crate::shape::build_cursor(&self.qs, &step) {
            Ok(it) => it,
            Err(e) => {
                error!(target: "quarry::iterator", %e, "recursive step failed to build");
                self.err = Some(e);
                return false;
            }
        };
        let mut next_frontier = Vec::new();
        while it.next(ctx) {
            if let Some(r) = it.result() {
                if self.visited.insert(r.clone()) {
                    self.queue.push_back(r.clone());
                    next_frontier.push(r);
                }
            }
        }
        let failed = it.err().is_some();
        if failed {
            self.err = Some(Error::Backend(
                it.err().map(|e| e.to_string()).unwrap_or_default(),
            ));
        }
        it.close();
        self.frontier = next_frontier;
        !failed
    }
}

impl Cursor for Recursive {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.closed || self.err.is_some() {
            return false;
        }
        if !self.seeded {
            self.seed_frontier(ctx);
            if self.seed.err().is_some() {
                return false;
            }
        }
        loop {
            if let Some(r) = self.queue.pop_front() {
                self.delivered.insert(r.clone());
                self.result = Some(r);
                return true;
            }
            if self.frontier.is_empty() || ctx.is_cancelled() {
                self.result = None;
                return false;
            }
            self.depth += 1;
            if !self.expand(ctx) {
                return false;
            }
        }
    }

    fn result(&self) -> Option<Ref> {
        self.result.clone()
    }

    fn tag_results(&self, dst: &mut TagMap) {
        if let Some(tag) = &self.depth_tag {
            dst.insert(tag.clone(), Ref::Prefetched(Value::Int(self.depth)));
        }
    }

    fn next_path(&mut self, _ctx: &Cancellation) -> bool {
        false
    }

    fn contains(&mut self, ctx: &Cancellation, v: &Ref) -> bool {
        if self.closed {
            return false;
        }
        if self.delivered.contains(v) {
            self.result = Some(v.clone());
            return true;
        }
        while self.next(ctx) {
            if self.result.as_ref() == Some(v) {
                return true;
            }
        }
        false
    }

    fn reset(&mut self) {
        self.seed.reset();
        self.seeded = false;
        self.visited.clear();
        self.delivered.clear();
        self.frontier.clear();
        self.queue.clear();
        self.depth = 0;
        self.result = None;
        self.err = None;
    }

    fn stats(&self) -> Stats {
        let seed = self.seed.stats();
        Stats {
            next_cost: seed.next_cost.saturating_mul(10),
            contains_cost: seed.next_cost.saturating_mul(10),
            size: Size::guess(seed.size.value.saturating_mul(10).max(1)),
        }
    }

    fn err(&self) -> Option<&Error> {
        self.err.as_ref().or_else(|| self.seed.err())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.seed.close();
        self.visited.clear();
        self.delivered.clear();
        self.frontier.clear();
        self.queue.clear();
        self.result = None;
    }
}
