//! Projection between quads and nodes.
//!
//! `LinksTo` turns a node cursor into the quads holding those nodes at a
//! direction; `HasA` projects a quad cursor back to the node at a
//! direction. Together they are the duals every traversal step is built
//! from.

use tracing::error;

use crate::error::Error;
use crate::iterator::{Cancellation, Cursor, Size, Stats, TagMap};
use crate::model::Direction;
use crate::store::{Ref, Store};

// Estimated quads per node when the backend cannot tell us better.
const FANOUT: i64 = 20;

/// Quads whose node at `dir` is produced by the sub-cursor.
pub struct LinksTo {
    qs: Store,
    dir: Direction,
    nodes: Box<dyn Cursor>,
    quads: Option<Box<dyn Cursor>>,
    result: Option<Ref>,
    err: Option<Error>,
    closed: bool,
}

impl LinksTo {
    pub fn new(qs: Store, nodes: Box<dyn Cursor>, dir: Direction) -> Self {
        Self {
            qs,
            dir,
            nodes,
            quads: None,
            result: None,
            err: None,
            closed: false,
        }
    }

    /// The direction this cursor links through.
    pub fn direction(&self) -> Direction {
        self.dir
    }
}

impl Cursor for LinksTo {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.closed || self.err.is_some() {
            return false;
        }
        loop {
            if let Some(quads) = self.quads.as_mut() {
                if quads.next(ctx) {
                    self.result = quads.result();
                    return true;
                }
                if quads.err().is_some() || ctx.is_cancelled() {
                    return false;
                }
            }
            if !self.nodes.next(ctx) {
                self.result = None;
                return false;
            }
            let node = match self.nodes.result() {
                Some(r) => r,
                None => continue,
            };
            if let Some(mut old) = self.quads.take() {
                old.close();
            }
            self.quads = Some(self.qs.quad_cursor(self.dir, &node));
        }
    }

    fn result(&self) -> Option<Ref> {
        self.result.clone()
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.nodes.tag_results(dst);
    }

    fn next_path(&mut self, ctx: &Cancellation) -> bool {
        if self.closed {
            return false;
        }
        self.nodes.next_path(ctx)
    }

    fn contains(&mut self, ctx: &Cancellation, v: &Ref) -> bool {
        if self.closed || self.err.is_some() {
            return false;
        }
        let node = match self.qs.quad_direction(v, self.dir) {
            Ok(node) => node,
            Err(Error::NotFound(_)) => return false,
            Err(e) => {
                error!(target: "quarry::iterator", %e, "quad projection failed");
                self.err = Some(e);
                return false;
            }
        };
        if self.nodes.contains(ctx, &node) {
            self.result = Some(v.clone());
            return true;
        }
        false
    }

    fn reset(&mut self) {
        self.nodes.reset();
        if let Some(mut quads) = self.quads.take() {
            quads.close();
        }
        self.result = None;
        self.err = None;
    }

    fn stats(&self) -> Stats {
        let nodes = self.nodes.stats();
        Stats {
            next_cost: nodes.next_cost + 1,
            contains_cost: nodes.contains_cost + 1,
            size: Size::guess(nodes.size.value.saturating_mul(FANOUT)),
        }
    }

    fn err(&self) -> Option<&Error> {
        self.err
            .as_ref()
            .or_else(|| self.nodes.err())
            .or_else(|| self.quads.as_ref().and_then(|q| q.err()))
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.nodes.close();
        if let Some(mut quads) = self.quads.take() {
            quads.close();
        }
        self.result = None;
    }
}

/// Nodes standing at `dir` of the quads produced by the sub-cursor.
///
/// A node reachable through several quads is emitted once per quad on
/// the scan side; on the lookup side, `next_path` walks the remaining
/// candidate quads so alternative tag bindings can be observed.
pub struct HasA {
    qs: Store,
    dir: Direction,
    quads: Box<dyn Cursor>,
    candidates: Option<Box<dyn Cursor>>,
    result: Option<Ref>,
    err: Option<Error>,
    closed: bool,
}

impl HasA {
    pub fn new(qs: Store, quads: Box<dyn Cursor>, dir: Direction) -> Self {
        Self {
            qs,
            dir,
            quads,
            candidates: None,
            result: None,
            err: None,
            closed: false,
        }
    }

    /// The direction this cursor projects to.
    pub fn direction(&self) -> Direction {
        self.dir
    }

    fn advance_candidates(&mut self, ctx: &Cancellation, v: &Ref) -> bool {
        let candidates = match self.candidates.as_mut() {
            Some(c) => c,
            None => return false,
        };
        while candidates.next(ctx) {
            let quad = match candidates.result() {
                Some(q) => q,
                None => continue,
            };
            if self.quads.contains(ctx, &quad) {
                self.result = Some(v.clone());
                return true;
            }
        }
        false
    }
}

impl Cursor for HasA {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.closed || self.err.is_some() {
            return false;
        }
        if let Some(mut candidates) = self.candidates.take() {
            candidates.close();
        }
        if !self.quads.next(ctx) {
            self.result = None;
            return false;
        }
        let quad = match self.quads.result() {
            Some(q) => q,
            None => return false,
        };
        match self.qs.quad_direction(&quad, self.dir) {
            Ok(node) => {
                self.result = Some(node);
                true
            }
            Err(e) => {
                error!(target: "quarry::iterator", %e, "quad projection failed");
                self.err = Some(e);
                false
            }
        }
    }

    fn result(&self) -> Option<Ref> {
        self.result.clone()
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.quads.tag_results(dst);
    }

    fn next_path(&mut self, ctx: &Cancellation) -> bool {
        if self.closed {
            return false;
        }
        if self.candidates.is_some() {
            let v = match self.result.clone() {
                Some(v) => v,
                None => return false,
            };
            return self.advance_candidates(ctx, &v);
        }
        self.quads.next_path(ctx)
    }

    fn contains(&mut self, ctx: &Cancellation, v: &Ref) -> bool {
        if self.closed || self.err.is_some() {
            return false;
        }
        if let Some(mut old) = self.candidates.take() {
            old.close();
        }
        self.candidates = Some(self.qs.quad_cursor(self.dir, v));
        self.advance_candidates(ctx, v)
    }

    fn reset(&mut self) {
        self.quads.reset();
        if let Some(mut candidates) = self.candidates.take() {
            candidates.close();
        }
        self.result = None;
        self.err = None;
    }

    fn stats(&self) -> Stats {
        let quads = self.quads.stats();
        Stats {
            next_cost: quads.next_cost + 1,
            contains_cost: quads.contains_cost.saturating_mul(FANOUT),
            size: Size::guess(quads.size.value),
        }
    }

    fn err(&self) -> Option<&Error> {
        self.err
            .as_ref()
            .or_else(|| self.quads.err())
            .or_else(|| self.candidates.as_ref().and_then(|c| c.err()))
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.quads.close();
        if let Some(mut candidates) = self.candidates.take() {
            candidates.close();
        }
        self.result = None;
    }
}
