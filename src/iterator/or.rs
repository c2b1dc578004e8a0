//! Concatenating union.

use crate::error::Error;
use crate::iterator::{Cancellation, Cursor, Size, Stats, TagMap};
use crate::store::Ref;

/// Union of several cursors, scanned in declared order.
///
/// Duplicates are kept; wrap in a unique cursor to drop them.
pub struct Or {
    children: Vec<Box<dyn Cursor>>,
    current: usize,
    active: Option<usize>,
    closed: bool,
}

impl Or {
    pub fn new(children: Vec<Box<dyn Cursor>>) -> Self {
        Self {
            children,
            current: 0,
            active: None,
            closed: false,
        }
    }
}

impl Cursor for Or {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.closed {
            return false;
        }
        while self.current < self.children.len() {
            let child = &mut self.children[self.current];
            if child.next(ctx) {
                self.active = Some(self.current);
                return true;
            }
            if child.err().is_some() || ctx.is_cancelled() {
                return false;
            }
            self.current += 1;
        }
        self.active = None;
        false
    }

    fn result(&self) -> Option<Ref> {
        self.active.and_then(|i| self.children[i].result())
    }

    fn tag_results(&self, dst: &mut TagMap) {
        if let Some(i) = self.active {
            self.children[i].tag_results(dst);
        }
    }

    fn next_path(&mut self, ctx: &Cancellation) -> bool {
        match self.active {
            Some(i) => self.children[i].next_path(ctx),
            None => false,
        }
    }

    fn contains(&mut self, ctx: &Cancellation, v: &Ref) -> bool {
        if self.closed {
            return false;
        }
        for (i, child) in self.children.iter_mut().enumerate() {
            if child.contains(ctx, v) {
                self.active = Some(i);
                return true;
            }
        }
        false
    }

    fn reset(&mut self) {
        for c in &mut self.children {
            c.reset();
        }
        self.current = 0;
        self.active = None;
    }

    fn stats(&self) -> Stats {
        let mut next_cost = 0;
        let mut contains_cost = 0;
        let mut size = 0i64;
        let mut exact = true;
        for c in &self.children {
            let st = c.stats();
            next_cost += st.next_cost;
            contains_cost += st.contains_cost;
            size += st.size.value;
            exact = exact && st.size.exact;
        }
        Stats {
            next_cost,
            contains_cost,
            size: Size { value: size, exact },
        }
    }

    fn err(&self) -> Option<&Error> {
        self.children.iter().find_map(|c| c.err())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for c in &mut self.children {
            c.close();
        }
        self.active = None;
    }
}
