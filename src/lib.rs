#![forbid(unsafe_code)]

//! Query core for a quad-model graph database.
//!
//! Traversal expressions built with the fluent [`Path`] builder lower to
//! an algebraic [`Shape`] tree, are rewritten by a bottom-up optimizer,
//! and execute as a lazy [`Cursor`] pipeline against any storage backend
//! implementing the narrow [`QuadStore`] capability.
//!
//! ```
//! use quarry::{iterator, MemStore, Path, Quad, Store};
//! use std::sync::Arc;
//!
//! let qs: Store = Arc::new(MemStore::from_quads([
//!     Quad::new("alice", "follows", "bob"),
//!     Quad::new("bob", "follows", "fred"),
//! ]));
//! let mut it = Path::start(["alice"]).out("follows").build_on(&qs).unwrap();
//! let results = iterator::scan(it.as_mut(), &Default::default()).unwrap();
//! assert_eq!(results.len(), 1);
//! ```

pub mod error;
pub mod iterator;
pub mod model;
pub mod shape;
pub mod store;

pub use crate::error::{Error, Result};
pub use crate::iterator::{Cancellation, Cursor, ScanResult, Size, Stats, TagMap};
pub use crate::model::{Direction, Quad, Value};
pub use crate::shape::{build_cursor, CmpOp, Morphism, Path, Pattern, Shape, Via};
pub use crate::store::{MemStore, QuadStore, Ref, Store};
