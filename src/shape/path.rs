//! Fluent traversal builder.
//!
//! A [`Path`] threads a current root shape and an optional label context
//! through a chain of traversal steps. Every step returns a new builder
//! state; nothing is shared or mutated behind the caller's back. The
//! first failing step parks an error that [`Path::shape`] reports, so
//! chains stay fluent, as the bindings-layer builders do.

use crate::error::{Error, Result};
use crate::iterator::Cursor;
use crate::model::{Direction, Value};
use crate::shape::{
    build_cursor, CmpOp, Like, Morphism, Pattern, QuadFilter, QuadFilters, QuadShape, Shape,
    ValueComparison,
};
use crate::store::{Ref, Store};

/// Polymorphic predicate specification accepted by traversal steps.
pub enum Via {
    /// No predicate constraint.
    All,
    /// Predicates named by value.
    Values(Vec<Value>),
    /// Predicates named by backend reference.
    Refs(Vec<Ref>),
    /// An arbitrary node shape.
    Shape(Shape),
}

impl Via {
    fn into_shape(self) -> Shape {
        match self {
            Via::All => Shape::AllNodes,
            Via::Values(vals) => {
                if vals.is_empty() {
                    Shape::AllNodes
                } else {
                    Shape::Lookup(vals)
                }
            }
            Via::Refs(refs) => {
                if refs.is_empty() {
                    Shape::AllNodes
                } else {
                    Shape::Fixed(refs)
                }
            }
            Via::Shape(s) => s,
        }
    }
}

impl From<&str> for Via {
    fn from(iri: &str) -> Self {
        Via::Values(vec![Value::iri(iri)])
    }
}

impl From<Value> for Via {
    fn from(v: Value) -> Self {
        Via::Values(vec![v])
    }
}

impl From<Vec<Value>> for Via {
    fn from(vals: Vec<Value>) -> Self {
        Via::Values(vals)
    }
}

impl From<Ref> for Via {
    fn from(r: Ref) -> Self {
        Via::Refs(vec![r])
    }
}

impl From<Shape> for Via {
    fn from(s: Shape) -> Self {
        Via::Shape(s)
    }
}

impl From<Path> for Via {
    fn from(p: Path) -> Self {
        Via::Shape(p.root)
    }
}

/// Builder state: the current root shape plus an optional label context
/// constraining every subsequent traversal.
#[derive(Debug)]
pub struct Path {
    root: Shape,
    labels: Option<Shape>,
    error: Option<Error>,
}

impl Path {
    /// Starts from the given values, or from every node when none are
    /// given.
    pub fn start<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let vals: Vec<Value> = values.into_iter().map(Into::into).collect();
        let root = if vals.is_empty() {
            Shape::AllNodes
        } else {
            Shape::Lookup(vals)
        };
        Self::from_shape(root)
    }

    /// Starts from resolved backend references.
    pub fn start_refs(refs: impl IntoIterator<Item = Ref>) -> Self {
        let refs: Vec<Ref> = refs.into_iter().collect();
        let root = if refs.is_empty() {
            Shape::AllNodes
        } else {
            Shape::Fixed(refs)
        };
        Self::from_shape(root)
    }

    /// Starts from an arbitrary shape.
    pub fn from_shape(root: Shape) -> Self {
        Self {
            root,
            labels: None,
            error: None,
        }
    }

    /// Finishes the chain, surfacing the first builder error.
    pub fn shape(self) -> Result<Shape> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.root),
        }
    }

    /// Optimizes and lowers the chain against a backend.
    pub fn build_on(self, qs: &Store) -> Result<Box<dyn Cursor>> {
        build_cursor(qs, &self.shape()?)
    }

    fn map_root(mut self, f: impl FnOnce(Shape) -> Shape) -> Self {
        if self.error.is_some() {
            return self;
        }
        let root = std::mem::replace(&mut self.root, Shape::Null);
        self.root = f(root);
        self
    }

    fn fail(mut self, message: &'static str) -> Self {
        if self.error.is_none() {
            self.error = Some(Error::Malformed(message));
        }
        self
    }

    /// Sets the label context for subsequent traversals; no values clear
    /// it.
    pub fn label_context<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let vals: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.labels = if vals.is_empty() {
            None
        } else {
            Some(Shape::Lookup(vals))
        };
        self
    }

    /// Follows quads out of the current nodes: subject → object.
    pub fn out(self, via: impl Into<Via>) -> Self {
        self.step(via, Vec::new(), false)
    }

    /// Follows quads into the current nodes: object → subject.
    pub fn r#in(self, via: impl Into<Via>) -> Self {
        self.step(via, Vec::new(), true)
    }

    /// As [`out`](Self::out), additionally binding the predicate taken
    /// under each tag.
    pub fn out_with_tags<I, S>(self, via: impl Into<Via>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.step(via, tags.into_iter().map(Into::into).collect(), false)
    }

    /// As [`r#in`](Self::r#in), additionally binding the predicate taken
    /// under each tag.
    pub fn in_with_tags<I, S>(self, via: impl Into<Via>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.step(via, tags.into_iter().map(Into::into).collect(), true)
    }

    fn step(self, via: impl Into<Via>, tags: Vec<String>, reverse: bool) -> Self {
        let via = via.into().into_shape();
        let labels = self.labels.clone();
        self.map_root(|root| traverse(root, via, labels.as_ref(), tags, reverse))
    }

    /// Keeps nodes that have a quad through `via` ending at one of the
    /// given references (any endpoint when none are given).
    pub fn has(self, via: impl Into<Via>, reverse: bool, nodes: impl IntoIterator<Item = Ref>) -> Self {
        let refs: Vec<Ref> = nodes.into_iter().collect();
        let ends = if refs.is_empty() {
            Shape::AllNodes
        } else {
            Shape::Fixed(refs)
        };
        self.has_shape(via, reverse, ends)
    }

    /// As [`has`](Self::has), naming the endpoints by value.
    pub fn has_values<I, V>(self, via: impl Into<Via>, reverse: bool, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let vals: Vec<Value> = values.into_iter().map(Into::into).collect();
        let ends = if vals.is_empty() {
            Shape::AllNodes
        } else {
            Shape::Lookup(vals)
        };
        self.has_shape(via, reverse, ends)
    }

    fn has_shape(self, via: impl Into<Via>, reverse: bool, ends: Shape) -> Self {
        let via = via.into().into_shape();
        let (start, goal) = endpoints(reverse);
        let mut filters = QuadFilters::new();
        if !ends.is_all() {
            filters.push(QuadFilter::new(goal, ends));
        }
        if !via.is_all() {
            filters.push(QuadFilter::new(Direction::Predicate, via));
        }
        if filters.is_empty() {
            return self.fail("has requires a predicate or target nodes");
        }
        self.map_root(|root| {
            intersect_shapes(
                root,
                Shape::QuadDirection {
                    dir: start,
                    quads: QuadShape::Quads(filters),
                },
            )
        })
    }

    /// Binds, for every current node, the endpoint reached through `via`
    /// under `tag`. The node is dropped when no such quad exists.
    pub fn save(self, via: impl Into<Via>, tag: impl Into<String>) -> Self {
        self.save_opt(via, tag, false, false)
    }

    /// As [`save`](Self::save), walking the quad in reverse.
    pub fn save_reverse(self, via: impl Into<Via>, tag: impl Into<String>) -> Self {
        self.save_opt(via, tag, true, false)
    }

    /// As [`save`](Self::save); when `optional`, nodes without such a
    /// quad survive with the tag absent.
    pub fn save_opt(
        self,
        via: impl Into<Via>,
        tag: impl Into<String>,
        reverse: bool,
        optional: bool,
    ) -> Self {
        let via = via.into().into_shape();
        let (start, goal) = endpoints(reverse);
        let nodes = Shape::Save {
            from: Box::new(Shape::AllNodes),
            tags: vec![tag.into()],
        };
        let mut filters = QuadFilters::new();
        filters.push(QuadFilter::new(goal, nodes));
        if !via.is_all() {
            filters.push(QuadFilter::new(Direction::Predicate, via));
        }
        let mut save = Shape::QuadDirection {
            dir: start,
            quads: QuadShape::Quads(filters),
        };
        if optional {
            save = Shape::Optional(Box::new(save));
        }
        self.map_root(|root| intersect_shapes(root, save))
    }

    /// Restricts the current nodes to the given values.
    pub fn is<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let vals: Vec<Value> = values.into_iter().map(Into::into).collect();
        if vals.is_empty() {
            return self;
        }
        self.map_root(|root| intersect_shapes(root, Shape::Lookup(vals)))
    }

    /// Restricts the current nodes to the given references.
    pub fn is_refs(self, refs: impl IntoIterator<Item = Ref>) -> Self {
        let refs: Vec<Ref> = refs.into_iter().collect();
        if refs.is_empty() {
            return self;
        }
        self.map_root(|root| intersect_shapes(root, Shape::Fixed(refs)))
    }

    /// Keeps nodes whose value satisfies the comparison, folding into an
    /// existing filter when one is already on top.
    pub fn compare(self, op: CmpOp, value: impl Into<Value>) -> Self {
        let cmp = ValueComparison::new(op, value);
        self.map_root(|root| match root {
            Shape::Filter { from, mut ops } => {
                ops.push(cmp);
                Shape::Filter { from, ops }
            }
            other => Shape::Filter {
                from: Box::new(other),
                ops: vec![cmp],
            },
        })
    }

    /// Keeps nodes whose literal value matches the pattern; node
    /// references never match.
    pub fn regex(self, pattern: Pattern) -> Self {
        self.map_root(|root| Shape::Regexp {
            from: Box::new(root),
            pattern,
            refs: false,
        })
    }

    /// As [`regex`](Self::regex), also matching IRIs and blank nodes.
    pub fn regex_with_refs(self, pattern: Pattern) -> Self {
        self.map_root(|root| Shape::Regexp {
            from: Box::new(root),
            pattern,
            refs: true,
        })
    }

    /// Keeps nodes whose literal value matches a SQL-LIKE pattern.
    pub fn wildcard(mut self, pattern: &str) -> Self {
        if self.error.is_some() {
            return self;
        }
        match Like::new(pattern) {
            Ok(like) => self.map_root(|root| Shape::Wildcard {
                from: Box::new(root),
                like,
            }),
            Err(err) => {
                self.error = Some(err);
                self
            }
        }
    }

    /// Binds every current node under the given tags.
    pub fn tag<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        if tags.is_empty() {
            return self;
        }
        self.map_root(|root| Shape::Save {
            from: Box::new(root),
            tags,
        })
    }

    /// Intersects with another path, flattening nested intersections.
    pub fn and(mut self, other: Path) -> Self {
        if self.error.is_none() {
            self.error = other.error;
        }
        let other_root = other.root;
        self.map_root(|root| intersect_shapes(root, other_root))
    }

    /// Unions with another path, flattening nested unions. Duplicates
    /// are kept.
    pub fn or(mut self, other: Path) -> Self {
        if self.error.is_none() {
            self.error = other.error;
        }
        let other_root = other.root;
        self.map_root(|root| union_shapes(root, other_root))
    }

    /// Removes another path's results from this one.
    pub fn except(mut self, other: Path) -> Self {
        if self.error.is_none() {
            self.error = other.error;
        }
        let exclude = other.root;
        self.map_root(|root| Shape::Except {
            from: Some(Box::new(root)),
            exclude: Box::new(exclude),
        })
    }

    /// De-duplicates results by reference.
    pub fn unique(self) -> Self {
        self.map_root(|root| Shape::Unique(Box::new(root)))
    }

    /// Orders results by their value string.
    pub fn sort(self) -> Self {
        self.map_root(|root| Shape::Sort(Box::new(root)))
    }

    /// Replaces the results with their count.
    pub fn count(self) -> Self {
        self.map_root(|root| Shape::Count(Box::new(root)))
    }

    /// Slices the results.
    pub fn page(self, skip: i64, limit: i64) -> Self {
        self.map_root(|root| Shape::Page {
            from: Box::new(root),
            skip,
            limit,
        })
    }

    /// Caps the number of results.
    pub fn limit(self, limit: i64) -> Self {
        self.page(0, limit)
    }

    /// Distinct predicates leaving (or entering, if `reverse`) the
    /// current nodes.
    pub fn predicates(self, reverse: bool) -> Self {
        self.map_root(|root| Shape::Predicates {
            from: Box::new(root),
            reverse,
        })
    }

    /// Transitive closure of following `via` out of the current nodes.
    /// With a depth tag, each result binds the tag to its discovery
    /// depth.
    pub fn follow_recursive(self, via: impl Into<Via>, depth_tag: Option<&str>) -> Self {
        let via = via.into().into_shape();
        let labels = self.labels.clone();
        let morphism = Morphism::new("follow", move |root| {
            traverse(root, via.clone(), labels.as_ref(), Vec::new(), false)
        });
        let depth_tag = depth_tag.map(str::to_owned);
        self.map_root(|root| Shape::Recursive {
            from: Box::new(root),
            via: morphism,
            depth_tag,
        })
    }
}

fn endpoints(reverse: bool) -> (Direction, Direction) {
    if reverse {
        (Direction::Object, Direction::Subject)
    } else {
        (Direction::Subject, Direction::Object)
    }
}

/// One traversal step: quads leaving `from` through `via` (and the label
/// context, when set), projected to the far endpoint.
fn traverse(
    from: Shape,
    via: Shape,
    labels: Option<&Shape>,
    tags: Vec<String>,
    reverse: bool,
) -> Shape {
    let (start, goal) = endpoints(reverse);
    let via = if tags.is_empty() {
        via
    } else {
        Shape::Save {
            from: Box::new(via),
            tags,
        }
    };
    let mut filters = QuadFilters::new();
    if !from.is_all() {
        filters.push(QuadFilter::new(start, from));
    }
    if !via.is_all() {
        filters.push(QuadFilter::new(Direction::Predicate, via));
    }
    if let Some(labels) = labels {
        if !labels.is_all() {
            filters.push(QuadFilter::new(Direction::Label, labels.clone()));
        }
    }
    Shape::QuadDirection {
        dir: goal,
        quads: QuadShape::Quads(filters),
    }
}

fn intersect_shapes(a: Shape, b: Shape) -> Shape {
    match a {
        Shape::AllNodes => b,
        Shape::Intersect(mut list) => {
            if let Shape::Intersect(other) = b {
                list.extend(other);
            } else {
                list.push(b);
            }
            Shape::Intersect(list)
        }
        a => Shape::Intersect(vec![a, b]),
    }
}

fn union_shapes(a: Shape, b: Shape) -> Shape {
    match a {
        Shape::Union(mut list) => {
            if let Shape::Union(other) = b {
                list.extend(other);
            } else {
                list.push(b);
            }
            Shape::Union(list)
        }
        a => Shape::Union(vec![a, b]),
    }
}
