//! Lazy cursor runtime.
//!
//! A [`Cursor`] is a pull-based iterator over backend references with two
//! access modes: scanning (`next`/`result`) and membership testing
//! (`contains`). Cursors form a tree rooted at the top-level scan; every
//! operator of the shape algebra lowers to one of the cursors in this
//! module.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::store::Ref;

pub mod and;
pub mod count;
pub mod fixed;
pub mod not;
pub mod or;
pub mod paging;
pub mod quads;
pub mod recursive;
pub mod sort;
pub mod tags;
pub mod unique;
pub mod value_filter;

pub use and::And;
pub use count::Count;
pub use fixed::Fixed;
pub use not::Not;
pub use or::Or;
pub use paging::{Limit, Skip};
pub use quads::{HasA, LinksTo};
pub use recursive::Recursive;
pub use sort::Sort;
pub use tags::{FixedTags, Optional, Save};
pub use unique::Unique;
pub use value_filter::ValueFilter;

/// Per-result tag bindings.
pub type TagMap = FxHashMap<String, Ref>;

/// Cooperative cancellation token shared between a caller and a cursor
/// tree. Observing cancellation stops a scan without setting an error.
#[derive(Clone, Debug, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    /// A token that never fires.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of every scan holding this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Best-effort cardinality of a cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
    /// Estimated number of results.
    pub value: i64,
    /// Whether the estimate is known to be exact.
    pub exact: bool,
}

impl Size {
    /// An exact size, as reported by indexed leaves.
    pub fn exact(value: i64) -> Self {
        Size { value, exact: true }
    }

    /// An inexact estimate.
    pub fn guess(value: i64) -> Self {
        Size {
            value,
            exact: false,
        }
    }
}

/// Cost and size statistics used to order join branches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stats {
    /// Relative cost of one `next` call.
    pub next_cost: i64,
    /// Relative cost of one `contains` call.
    pub contains_cost: i64,
    /// Estimated result cardinality.
    pub size: Size,
}

/// A lazy cursor over backend references.
///
/// State machine: a fresh cursor accepts any mix of `next` and `contains`
/// calls; `reset` returns it to fresh from any non-closed state; `close`
/// is idempotent, releases sub-cursors and backend state, and is
/// terminal, after which `next` and `contains` return `false`.
///
/// Backend failures latch into the cursor: `next` returns `false`,
/// further calls stop consulting the backend, and [`err`](Cursor::err)
/// exposes the cause. Cancellation also returns `false` but leaves
/// `err()` empty.
pub trait Cursor {
    /// Advances to the next result. Returns `false` at exhaustion, on a
    /// latched error, or when `ctx` is cancelled.
    fn next(&mut self, ctx: &Cancellation) -> bool;

    /// The current result, valid after a successful `next` or `contains`.
    fn result(&self) -> Option<Ref>;

    /// Adds this result's tag bindings to `dst`. Bindings written later
    /// overwrite earlier ones, so outer operators take precedence.
    fn tag_results(&self, dst: &mut TagMap);

    /// Advances to an alternative tag binding for the current result
    /// without changing `result`.
    fn next_path(&mut self, ctx: &Cancellation) -> bool;

    /// Tests whether `v` is a member of this cursor's result set. On
    /// success the cursor's `result` is `v` and tags reflect the match.
    fn contains(&mut self, ctx: &Cancellation, v: &Ref) -> bool;

    /// Restarts the cursor from the beginning, discarding buffered state.
    fn reset(&mut self);

    /// Cost and cardinality statistics.
    fn stats(&self) -> Stats;

    /// The latched error, if any.
    fn err(&self) -> Option<&Error>;

    /// Releases this cursor and every sub-cursor. Idempotent.
    fn close(&mut self);
}

/// The empty cursor.
#[derive(Debug, Default)]
pub struct Null;

impl Null {
    pub fn new() -> Self {
        Null
    }
}

impl Cursor for Null {
    fn next(&mut self, _ctx: &Cancellation) -> bool {
        false
    }

    fn result(&self) -> Option<Ref> {
        None
    }

    fn tag_results(&self, _dst: &mut TagMap) {}

    fn next_path(&mut self, _ctx: &Cancellation) -> bool {
        false
    }

    fn contains(&mut self, _ctx: &Cancellation, _v: &Ref) -> bool {
        false
    }

    fn reset(&mut self) {}

    fn stats(&self) -> Stats {
        Stats {
            next_cost: 0,
            contains_cost: 0,
            size: Size::exact(0),
        }
    }

    fn err(&self) -> Option<&Error> {
        None
    }

    fn close(&mut self) {}
}

/// One scanned result: a reference plus its tag bindings.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanResult {
    pub value: Ref,
    pub tags: TagMap,
}

/// Drains a cursor, collecting every result with its tag bindings.
pub fn scan(it: &mut dyn Cursor, ctx: &Cancellation) -> Result<Vec<ScanResult>> {
    collect(it, ctx, false)
}

/// Like [`scan`], additionally enumerating every alternative tag binding
/// each result is reachable through.
pub fn scan_paths(it: &mut dyn Cursor, ctx: &Cancellation) -> Result<Vec<ScanResult>> {
    collect(it, ctx, true)
}

fn collect(it: &mut dyn Cursor, ctx: &Cancellation, paths: bool) -> Result<Vec<ScanResult>> {
    let mut out = Vec::new();
    while it.next(ctx) {
        let value = match it.result() {
            Some(r) => r,
            None => continue,
        };
        let mut tags = TagMap::default();
        it.tag_results(&mut tags);
        out.push(ScanResult {
            value: value.clone(),
            tags,
        });
        if paths {
            while it.next_path(ctx) {
                let mut tags = TagMap::default();
                it.tag_results(&mut tags);
                out.push(ScanResult {
                    value: value.clone(),
                    tags,
                });
            }
        }
    }
    if let Some(err) = it.err() {
        return Err(clone_err(err));
    }
    Ok(out)
}

// Latched errors are owned by their cursor; scans hand callers a fresh
// value carrying the same description.
fn clone_err(err: &Error) -> Error {
    match err {
        Error::Malformed(m) => Error::Malformed(m),
        Error::NotFound(w) => Error::NotFound(w),
        other => Error::Backend(other.to_string()),
    }
}
