//! Storage backend capability.
//!
//! The query core addresses storage exclusively through [`QuadStore`]: a
//! narrow, read-only view of an indexed quad collection. Backends mint
//! opaque references for stored values and quads; the core never assumes
//! anything about their representation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::iterator::Cursor;
use crate::model::{Direction, Quad, Value};
use crate::shape::ValuePredicate;

pub mod memory;

pub use memory::MemStore;

/// An opaque handle minted by a storage backend.
///
/// `Node` and `Quad` carry backend-assigned keys that the core treats as
/// opaque identity; `Prefetched` is minted by the core itself for
/// synthetic results (counts, recursion depths) and resolves to its value
/// without consulting the backend.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Ref {
    /// A stored value.
    Node(u64),
    /// A stored quad.
    Quad(u64),
    /// A value carried inline, not resident in any backend.
    Prefetched(Value),
}

/// Shared handle to a backend, cloned into every cursor that needs it.
pub type Store = Arc<dyn QuadStore>;

/// Read-only capability over a quad collection.
///
/// The backend is consulted as a snapshot during a single execution and
/// must tolerate concurrent reads from distinct cursor trees. All methods
/// may block on I/O; the calling cursor inherits that latency.
pub trait QuadStore: Send + Sync {
    /// Resolves a value to its reference, if stored.
    fn value_of(&self, v: &Value) -> Option<Ref>;

    /// Inverse of [`value_of`](Self::value_of).
    fn name_of(&self, r: &Ref) -> Result<Value>;

    /// Materializes a stored quad.
    fn quad(&self, r: &Ref) -> Result<Quad>;

    /// Projects a quad reference to the node reference at a direction.
    fn quad_direction(&self, r: &Ref, d: Direction) -> Result<Ref>;

    /// Index lookup: all quads holding `r` at direction `d`.
    fn quad_cursor(&self, d: Direction, r: &Ref) -> Box<dyn Cursor>;

    /// Scan over every node reference.
    fn nodes_all(&self) -> Box<dyn Cursor>;

    /// Scan over every quad reference.
    fn quads_all(&self) -> Box<dyn Cursor>;

    /// Optional hook: rewrite a finished cursor into a backend-native
    /// form. The boolean reports whether a rewrite happened.
    fn optimize_cursor(&self, it: Box<dyn Cursor>) -> (Box<dyn Cursor>, bool) {
        (it, false)
    }

    /// Optional hook: serve a pure value-filter bag over all nodes with a
    /// backend-native cursor. Returning `None` falls back to the generic
    /// scan-and-test cursor.
    fn value_filter_cursor(&self, _preds: &[ValuePredicate]) -> Option<Box<dyn Cursor>> {
        None
    }
}

/// Resolves a reference to its value, serving prefetched refs inline so
/// backends only ever see their own handles.
pub(crate) fn resolve_name(qs: &dyn QuadStore, r: &Ref) -> Result<Value> {
    match r {
        Ref::Prefetched(v) => Ok(v.clone()),
        other => qs.name_of(other),
    }
}
