//! In-memory reference backend.
//!
//! Interns values to dense identifiers and keeps one posting list per
//! quad position. Sizes reported by its cursors are exact, which the
//! optimizer and join ordering rely on in tests. Reads take a snapshot,
//! so cursor trees stay stable while other threads add quads.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::iterator::{self, Cursor};
use crate::model::{Direction, Quad, Value};
use crate::shape::ValuePredicate;
use crate::store::{QuadStore, Ref};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
struct StoredQuad {
    subject: u64,
    predicate: u64,
    object: u64,
    label: Option<u64>,
}

impl StoredQuad {
    fn get(&self, d: Direction) -> Option<u64> {
        match d {
            Direction::Subject => Some(self.subject),
            Direction::Predicate => Some(self.predicate),
            Direction::Object => Some(self.object),
            Direction::Label => self.label,
            Direction::Any => None,
        }
    }
}

#[derive(Default)]
struct Inner {
    values: Vec<Value>,
    ids: FxHashMap<Value, u64>,
    quads: Vec<StoredQuad>,
    index: FxHashMap<(Direction, u64), Vec<u64>>,
}

impl Inner {
    fn intern(&mut self, v: &Value) -> u64 {
        if let Some(id) = self.ids.get(v) {
            return *id;
        }
        let id = self.values.len() as u64;
        self.values.push(v.clone());
        self.ids.insert(v.clone(), id);
        id
    }

    fn add(&mut self, q: &Quad) {
        let stored = StoredQuad {
            subject: self.intern(&q.subject),
            predicate: self.intern(&q.predicate),
            object: self.intern(&q.object),
            label: q.label.as_ref().map(|l| self.intern(l)),
        };
        let quad_id = self.quads.len() as u64;
        self.quads.push(stored);
        for dir in Direction::POSITIONS {
            if let Some(node) = stored.get(dir) {
                self.index.entry((dir, node)).or_default().push(quad_id);
            }
        }
    }
}

/// An in-memory [`QuadStore`].
#[derive(Default)]
pub struct MemStore {
    inner: RwLock<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store holding the given quads.
    pub fn from_quads(quads: impl IntoIterator<Item = Quad>) -> Self {
        let store = Self::new();
        for q in quads {
            store.add_quad(&q);
        }
        store
    }

    /// Adds a quad, interning any values it introduces.
    pub fn add_quad(&self, q: &Quad) {
        self.inner.write().add(q);
    }

    /// Number of stored quads.
    pub fn quad_count(&self) -> usize {
        self.inner.read().quads.len()
    }

    fn node_id(r: &Ref) -> Result<u64> {
        match r {
            Ref::Node(id) => Ok(*id),
            _ => Err(Error::NotFound("node")),
        }
    }

    fn quad_id(r: &Ref) -> Result<u64> {
        match r {
            Ref::Quad(id) => Ok(*id),
            _ => Err(Error::NotFound("quad")),
        }
    }
}

impl QuadStore for MemStore {
    fn value_of(&self, v: &Value) -> Option<Ref> {
        self.inner.read().ids.get(v).map(|id| Ref::Node(*id))
    }

    fn name_of(&self, r: &Ref) -> Result<Value> {
        let id = Self::node_id(r)?;
        self.inner
            .read()
            .values
            .get(id as usize)
            .cloned()
            .ok_or(Error::NotFound("node"))
    }

    fn quad(&self, r: &Ref) -> Result<Quad> {
        let id = Self::quad_id(r)?;
        let inner = self.inner.read();
        let stored = inner.quads.get(id as usize).ok_or(Error::NotFound("quad"))?;
        let name = |id: u64| -> Result<Value> {
            inner
                .values
                .get(id as usize)
                .cloned()
                .ok_or(Error::NotFound("node"))
        };
        Ok(Quad {
            subject: name(stored.subject)?,
            predicate: name(stored.predicate)?,
            object: name(stored.object)?,
            label: stored.label.map(name).transpose()?,
        })
    }

    fn quad_direction(&self, r: &Ref, d: Direction) -> Result<Ref> {
        let id = Self::quad_id(r)?;
        let inner = self.inner.read();
        let stored = inner.quads.get(id as usize).ok_or(Error::NotFound("quad"))?;
        stored
            .get(d)
            .map(Ref::Node)
            .ok_or(Error::NotFound("direction"))
    }

    fn quad_cursor(&self, d: Direction, r: &Ref) -> Box<dyn Cursor> {
        let id = match r {
            Ref::Node(id) => *id,
            _ => return Box::new(iterator::Null::new()),
        };
        let refs = match self.inner.read().index.get(&(d, id)) {
            Some(list) => list.iter().map(|q| Ref::Quad(*q)).collect(),
            None => Vec::new(),
        };
        Box::new(iterator::Fixed::new(refs))
    }

    fn nodes_all(&self) -> Box<dyn Cursor> {
        let refs = (0..self.inner.read().values.len() as u64)
            .map(Ref::Node)
            .collect();
        Box::new(iterator::Fixed::new(refs))
    }

    fn quads_all(&self) -> Box<dyn Cursor> {
        let refs = (0..self.inner.read().quads.len() as u64)
            .map(Ref::Quad)
            .collect();
        Box::new(iterator::Fixed::new(refs))
    }

    fn value_filter_cursor(&self, preds: &[ValuePredicate]) -> Option<Box<dyn Cursor>> {
        let inner = self.inner.read();
        let refs = inner
            .values
            .iter()
            .enumerate()
            .filter(|(_, v)| preds.iter().all(|p| p.matches(v)))
            .map(|(id, _)| Ref::Node(id as u64))
            .collect();
        Some(Box::new(iterator::Fixed::new(refs)))
    }
}
