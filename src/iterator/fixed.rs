//! Cursor over an explicit list of references.

use rustc_hash::FxHashSet;

use crate::error::Error;
use crate::iterator::{Cancellation, Cursor, Size, Stats, TagMap};
use crate::store::Ref;

/// Yields each reference once, in insertion order. Membership tests are
/// O(1) against a reference set.
#[derive(Debug)]
pub struct Fixed {
    values: Vec<Ref>,
    set: FxHashSet<Ref>,
    index: usize,
    result: Option<Ref>,
    closed: bool,
}

impl Fixed {
    pub fn new(values: Vec<Ref>) -> Self {
        let set = values.iter().cloned().collect();
        Self {
            values,
            set,
            index: 0,
            result: None,
            closed: false,
        }
    }
}

impl Cursor for Fixed {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.closed || ctx.is_cancelled() {
            return false;
        }
        if self.index >= self.values.len() {
            self.result = None;
            return false;
        }
        self.result = Some(self.values[self.index].clone());
        self.index += 1;
        true
    }

    fn result(&self) -> Option<Ref> {
        self.result.clone()
    }

    fn tag_results(&self, _dst: &mut TagMap) {}

    fn next_path(&mut self, _ctx: &Cancellation) -> bool {
        false
    }

    fn contains(&mut self, ctx: &Cancellation, v: &Ref) -> bool {
        if self.closed || ctx.is_cancelled() {
            return false;
        }
        if self.set.contains(v) {
            self.result = Some(v.clone());
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.result = None;
    }

    fn stats(&self) -> Stats {
        Stats {
            next_cost: 1,
            contains_cost: 1,
            size: Size::exact(self.values.len() as i64),
        }
    }

    fn err(&self) -> Option<&Error> {
        None
    }

    fn close(&mut self) {
        self.closed = true;
        self.values.clear();
        self.set.clear();
        self.result = None;
    }
}
