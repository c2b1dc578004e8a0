//! Value-ordered materialization.

use tracing::error;

use crate::error::Error;
use crate::iterator::{Cancellation, Cursor, Size, Stats, TagMap};
use crate::store::{resolve_name, Ref, Store};

struct Entry {
    value: Ref,
    tags: TagMap,
    key: String,
}

/// Materializes the input, then yields it ordered by the string form of
/// each result's value, ties broken by reference identity.
///
/// Two-phase: the first `next` drains the input (including every
/// alternative tag binding reachable through `next_path`), sorts, and
/// switches to emitting. `reset` discards the buffer.
pub struct Sort {
    qs: Store,
    sub: Box<dyn Cursor>,
    ordered: Option<Vec<Entry>>,
    index: usize,
    err: Option<Error>,
    closed: bool,
}

impl Sort {
    pub fn new(qs: Store, sub: Box<dyn Cursor>) -> Self {
        Self {
            qs,
            sub,
            ordered: None,
            index: 0,
            err: None,
            closed: false,
        }
    }

    fn accumulate(&mut self, ctx: &Cancellation) {
        let mut entries = Vec::new();
        while self.sub.next(ctx) {
            let r = match self.sub.result() {
                Some(r) => r,
                None => continue,
            };
            let key = match resolve_name(self.qs.as_ref(), &r) {
                Ok(v) => v.to_string(),
                Err(e) => {
                    error!(target: "quarry::iterator", %e, "value lookup failed during sort");
                    self.err = Some(e);
                    break;
                }
            };
            let mut tags = TagMap::default();
            self.sub.tag_results(&mut tags);
            entries.push(Entry {
                value: r.clone(),
                tags,
                key: key.clone(),
            });
            while self.sub.next_path(ctx) {
                let mut tags = TagMap::default();
                self.sub.tag_results(&mut tags);
                entries.push(Entry {
                    value: r.clone(),
                    tags,
                    key: key.clone(),
                });
            }
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key).then_with(|| a.value.cmp(&b.value)));
        self.ordered = Some(entries);
    }
}

impl Cursor for Sort {
    fn next(&mut self, ctx: &Cancellation) -> bool {
        if self.closed || self.err.is_some() || ctx.is_cancelled() {
            return false;
        }
        if self.ordered.is_none() {
            self.accumulate(ctx);
            if self.err.is_some() || ctx.is_cancelled() {
                return false;
            }
        }
        let ordered = self.ordered.as_ref().expect("buffer filled above");
        if self.index < ordered.len() {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn result(&self) -> Option<Ref> {
        let ordered = self.ordered.as_ref()?;
        ordered.get(self.index.checked_sub(1)?).map(|e| e.value.clone())
    }

    fn tag_results(&self, dst: &mut TagMap) {
        if let (Some(ordered), Some(prev)) = (self.ordered.as_ref(), self.index.checked_sub(1)) {
            if let Some(entry) = ordered.get(prev) {
                for (tag, value) in &entry.tags {
                    dst.insert(tag.clone(), value.clone());
                }
            }
        }
    }

    fn next_path(&mut self, _ctx: &Cancellation) -> bool {
        // Alternative bindings were expanded into the buffer.
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
        self.ordered = None;
        self.index = 0;
        self.err = None;
    }

    fn stats(&self) -> Stats {
        let sub = self.sub.stats();
        match self.ordered.as_ref() {
            Some(ordered) => Stats {
                next_cost: 1,
                contains_cost: sub.contains_cost,
                size: Size::exact(ordered.len() as i64),
            },
            None => Stats {
                next_cost: sub.next_cost,
                contains_cost: sub.contains_cost,
                size: sub.size,
            },
        }
    }

    fn err(&self) -> Option<&Error> {
        self.err.as_ref().or_else(|| self.sub.err())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.ordered = None;
        self.sub.close();
    }
}
