//! Algebraic query shapes.
//!
//! A [`Shape`] denotes a multiset of node references; a [`QuadShape`]
//! denotes a multiset of quad references. The two sorts never mix:
//! quad-valued trees appear only under [`Shape::QuadDirection`], and the
//! values constraining a quad position are node-valued again. Shape trees
//! are plain values: built by the [`Path`] builder, rewritten by
//! [`Shape::optimize`], and lowered to cursors by [`Shape::build`].

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::iterator::{self, And, Cursor, HasA, LinksTo, Not, Or, ValueFilter};
use crate::model::{Direction, Value};
use crate::store::{QuadStore, Ref, Store};

mod optimize;
pub mod path;

pub use path::{Path, Via};

/// Comparison operator applied to resolved values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Lte,
    Gt,
    Gte,
}

/// A single comparison constraint carried by [`Shape::Filter`].
#[derive(Clone, Debug, PartialEq)]
pub struct ValueComparison {
    pub op: CmpOp,
    pub value: Value,
}

impl ValueComparison {
    pub fn new(op: CmpOp, value: impl Into<Value>) -> Self {
        Self {
            op,
            value: value.into(),
        }
    }
}

/// A compiled regular expression, comparable by its source text.
#[derive(Clone, Debug)]
pub struct Pattern(Regex);

impl Pattern {
    /// Compiles a pattern; failures surface here, once, not per-step.
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Pattern(Regex::new(pattern)?))
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

impl From<Regex> for Pattern {
    fn from(re: Regex) -> Self {
        Pattern(re)
    }
}

/// A SQL-LIKE pattern (`%` any run, `?` any single character), compiled
/// to an anchored regular expression at construction.
#[derive(Clone, Debug)]
pub struct Like {
    pattern: String,
    re: Regex,
}

impl Like {
    pub fn new(pattern: &str) -> Result<Self> {
        let mut expr = String::with_capacity(pattern.len() + 2);
        expr.push('^');
        for c in pattern.chars() {
            match c {
                '%' => expr.push_str(".*"),
                '?' => expr.push('.'),
                c => expr.push_str(&regex::escape(&c.to_string())),
            }
        }
        expr.push('$');
        Ok(Like {
            pattern: pattern.to_owned(),
            re: Regex::new(&expr)?,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.re.is_match(text)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl PartialEq for Like {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

/// A value predicate offered to backends for pushdown and evaluated by
/// the generic filter cursor.
#[derive(Clone, Debug, PartialEq)]
pub enum ValuePredicate {
    Compare { op: CmpOp, value: Value },
    Regex { pattern: Pattern, refs: bool },
    Like { like: Like },
}

impl From<ValueComparison> for ValuePredicate {
    fn from(cmp: ValueComparison) -> Self {
        ValuePredicate::Compare {
            op: cmp.op,
            value: cmp.value,
        }
    }
}

/// A reusable sub-shape with an open start.
///
/// Applying the morphism grafts a step onto a given root; the recursive
/// operator applies it once per closure depth. Equality is identity, so
/// trees carrying morphisms still compare.
#[derive(Clone)]
pub struct Morphism {
    name: &'static str,
    apply: Arc<dyn Fn(Shape) -> Shape + Send + Sync>,
}

impl Morphism {
    pub fn new(name: &'static str, apply: impl Fn(Shape) -> Shape + Send + Sync + 'static) -> Self {
        Self {
            name,
            apply: Arc::new(apply),
        }
    }

    /// Grafts the step onto `root`.
    pub fn apply(&self, root: Shape) -> Shape {
        (self.apply)(root)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for Morphism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Morphism({})", self.name)
    }
}

impl PartialEq for Morphism {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.apply, &other.apply)
    }
}

/// One constraint on a quad position: the quad's node at `dir` must be a
/// member of the node-valued `values`.
#[derive(Clone, Debug, PartialEq)]
pub struct QuadFilter {
    pub dir: Direction,
    pub values: Box<Shape>,
}

impl QuadFilter {
    pub fn new(dir: Direction, values: Shape) -> Self {
        Self {
            dir,
            values: Box::new(values),
        }
    }

    fn build(&self, qs: &Store) -> Result<Box<dyn Cursor>> {
        if self.dir == Direction::Any {
            return Err(Error::Malformed("quad filter direction is not set"));
        }
        if let Some(r) = self.values.one() {
            return Ok(qs.quad_cursor(self.dir, r));
        }
        let sub = self.values.build(qs)?;
        Ok(Box::new(LinksTo::new(qs.clone(), sub, self.dir)))
    }
}

/// Filter list backing a quad-valued shape.
pub type QuadFilters = SmallVec<[QuadFilter; 4]>;

/// A quad-valued shape.
#[derive(Clone, Debug, PartialEq)]
pub enum QuadShape {
    /// The empty quad multiset.
    Null,
    /// Quads satisfying every filter; no filters means every quad.
    Quads(QuadFilters),
}

impl QuadShape {
    pub fn quads(filters: impl IntoIterator<Item = QuadFilter>) -> Self {
        QuadShape::Quads(filters.into_iter().collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, QuadShape::Null)
    }

    /// Lowers the quad shape to a cursor over quad references.
    pub fn build(&self, qs: &Store) -> Result<Box<dyn Cursor>> {
        match self {
            QuadShape::Null => Ok(Box::new(iterator::Null::new())),
            QuadShape::Quads(filters) => {
                if filters.is_empty() {
                    return Ok(qs.quads_all());
                }
                let mut subs = Vec::with_capacity(filters.len());
                for f in filters {
                    subs.push(f.build(qs)?);
                }
                if subs.len() == 1 {
                    return Ok(subs.pop().expect("one sub-cursor"));
                }
                Ok(Box::new(And::new(subs)))
            }
        }
    }
}

/// Fused traversal step produced by the optimizer: quads matching a map
/// of constant filters, projected to `result`, binding tags per
/// direction. Build-equivalent to the explicit projection tree it was
/// fused from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuadsAction {
    pub result: Direction,
    pub filter: FxHashMap<Direction, Ref>,
    pub save: FxHashMap<Direction, Vec<String>>,
}

impl QuadsAction {
    fn expand(&self) -> Shape {
        let mut filters = QuadFilters::new();
        for dir in Direction::POSITIONS {
            if let Some(r) = self.filter.get(&dir) {
                filters.push(QuadFilter::new(dir, Shape::Fixed(vec![r.clone()])));
            }
            if let Some(tags) = self.save.get(&dir) {
                filters.push(QuadFilter::new(
                    dir,
                    Shape::Save {
                        from: Box::new(Shape::AllNodes),
                        tags: tags.clone(),
                    },
                ));
            }
        }
        Shape::QuadDirection {
            dir: self.result,
            quads: QuadShape::Quads(filters),
        }
    }
}

/// A node-valued query shape.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    /// Every node known to the backend.
    AllNodes,
    /// The empty multiset.
    Null,
    /// The listed backend references, as-is.
    Fixed(Vec<Ref>),
    /// Values resolved through the backend; unresolved values drop out.
    Lookup(Vec<Value>),
    /// Nodes standing at `dir` of the quads below.
    QuadDirection { dir: Direction, quads: QuadShape },
    /// Optimizer-fused traversal step.
    QuadsAct(QuadsAction),
    /// Multiset intersection.
    Intersect(Vec<Shape>),
    /// Multiset union; duplicates kept.
    Union(Vec<Shape>),
    /// `from` minus `exclude`; an absent `from` means all nodes.
    Except {
        from: Option<Box<Shape>>,
        exclude: Box<Shape>,
    },
    /// Nodes whose value passes every comparison.
    Filter {
        from: Box<Shape>,
        ops: Vec<ValueComparison>,
    },
    /// Nodes whose value matches a regular expression. Unless `refs` is
    /// set, IRIs and blank nodes are excluded before matching.
    Regexp {
        from: Box<Shape>,
        pattern: Pattern,
        refs: bool,
    },
    /// Nodes whose value matches a SQL-LIKE pattern.
    Wildcard { from: Box<Shape>, like: Like },
    /// Slice of the input.
    Page {
        from: Box<Shape>,
        skip: i64,
        limit: i64,
    },
    /// De-duplication by reference.
    Unique(Box<Shape>),
    /// Results ordered by value string.
    Sort(Box<Shape>),
    /// Singleton holding the input's cardinality.
    Count(Box<Shape>),
    /// Pass-through binding each result under the given tags.
    Save { from: Box<Shape>, tags: Vec<String> },
    /// Pass-through adding constant tag bindings.
    FixedTags {
        from: Box<Shape>,
        tags: FxHashMap<String, Ref>,
    },
    /// Left-outer child of an intersection; identity elsewhere.
    Optional(Box<Shape>),
    /// Distinct predicates of quads holding `from` at the subject
    /// (or object, if `reverse`) position.
    Predicates { from: Box<Shape>, reverse: bool },
    /// Transitive closure of applying `via`, starting from `from`.
    Recursive {
        from: Box<Shape>,
        via: Morphism,
        depth_tag: Option<String>,
    },
}

impl Shape {
    pub fn is_null(&self) -> bool {
        matches!(self, Shape::Null)
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Shape::AllNodes)
    }

    /// The single reference held by a singleton `Fixed`, if that is what
    /// this shape is.
    pub fn one(&self) -> Option<&Ref> {
        match self {
            Shape::Fixed(refs) if refs.len() == 1 => refs.first(),
            _ => None,
        }
    }

    fn resolve_lookup(values: &[Value], qs: &dyn QuadStore) -> Vec<Ref> {
        values.iter().filter_map(|v| qs.value_of(v)).collect()
    }

    /// Lowers the shape to a cursor, without optimizing first.
    ///
    /// Building an unoptimized tree and building its optimized form scan
    /// to the same multiset of results.
    pub fn build(&self, qs: &Store) -> Result<Box<dyn Cursor>> {
        match self {
            Shape::AllNodes => Ok(qs.nodes_all()),
            Shape::Null => Ok(Box::new(iterator::Null::new())),
            Shape::Fixed(refs) => Ok(Box::new(iterator::Fixed::new(refs.clone()))),
            Shape::Lookup(values) => Ok(Box::new(iterator::Fixed::new(Self::resolve_lookup(
                values,
                qs.as_ref(),
            )))),
            Shape::QuadDirection { dir, quads } => {
                if quads.is_null() {
                    return Ok(Box::new(iterator::Null::new()));
                }
                if *dir == Direction::Any {
                    return Err(Error::Malformed("projection direction is not set"));
                }
                let sub = quads.build(qs)?;
                Ok(Box::new(HasA::new(qs.clone(), sub, *dir)))
            }
            Shape::QuadsAct(act) => act.expand().build(qs),
            Shape::Intersect(children) => {
                if children.is_empty() {
                    return Ok(Box::new(iterator::Null::new()));
                }
                let mut subs: Vec<Box<dyn Cursor>> = Vec::new();
                let mut optionals: Vec<Box<dyn Cursor>> = Vec::new();
                for c in children {
                    match c {
                        Shape::Optional(inner) => optionals
                            .push(Box::new(iterator::Optional::new(inner.build(qs)?))),
                        other => subs.push(other.build(qs)?),
                    }
                }
                // An intersection of nothing but optional constraints
                // matches every node, with tags where the lookups hit.
                if subs.is_empty() {
                    subs.push(qs.nodes_all());
                }
                if subs.len() == 1 && optionals.is_empty() {
                    return Ok(subs.pop().expect("one sub-cursor"));
                }
                let mut and = And::new(subs);
                for o in optionals {
                    and.add_optional(o);
                }
                Ok(Box::new(and))
            }
            Shape::Union(children) => {
                if children.is_empty() {
                    return Ok(Box::new(iterator::Null::new()));
                }
                let mut subs = Vec::with_capacity(children.len());
                for c in children {
                    subs.push(c.build(qs)?);
                }
                if subs.len() == 1 {
                    return Ok(subs.pop().expect("one sub-cursor"));
                }
                Ok(Box::new(Or::new(subs)))
            }
            Shape::Except { from, exclude } => {
                if matches!(from.as_deref(), Some(Shape::Null)) {
                    return Ok(qs.nodes_all());
                }
                let all = match from {
                    Some(f) => f.build(qs)?,
                    None => qs.nodes_all(),
                };
                if exclude.is_null() {
                    return Ok(all);
                }
                Ok(Box::new(Not::new(exclude.build(qs)?, all)))
            }
            Shape::Filter { from, ops } => {
                if from.is_null() {
                    return Ok(Box::new(iterator::Null::new()));
                }
                if ops.is_empty() {
                    return from.build(qs);
                }
                let preds: Vec<ValuePredicate> =
                    ops.iter().cloned().map(ValuePredicate::from).collect();
                build_value_filter(qs, from, preds)
            }
            Shape::Regexp {
                from,
                pattern,
                refs,
            } => {
                if from.is_null() {
                    return Ok(Box::new(iterator::Null::new()));
                }
                let preds = vec![ValuePredicate::Regex {
                    pattern: pattern.clone(),
                    refs: *refs,
                }];
                build_value_filter(qs, from, preds)
            }
            Shape::Wildcard { from, like } => {
                if from.is_null() {
                    return Ok(Box::new(iterator::Null::new()));
                }
                let preds = vec![ValuePredicate::Like { like: like.clone() }];
                build_value_filter(qs, from, preds)
            }
            Shape::Page { from, skip, limit } => {
                if from.is_null() {
                    return Ok(Box::new(iterator::Null::new()));
                }
                let mut it = from.build(qs)?;
                if *skip > 0 {
                    it = Box::new(iterator::Skip::new(it, *skip));
                }
                if *limit > 0 {
                    it = Box::new(iterator::Limit::new(it, *limit));
                }
                Ok(it)
            }
            Shape::Unique(from) => {
                if from.is_null() {
                    return Ok(Box::new(iterator::Null::new()));
                }
                Ok(Box::new(iterator::Unique::new(from.build(qs)?)))
            }
            Shape::Sort(from) => {
                if from.is_null() {
                    return Ok(Box::new(iterator::Null::new()));
                }
                Ok(Box::new(iterator::Sort::new(qs.clone(), from.build(qs)?)))
            }
            Shape::Count(from) => Ok(Box::new(iterator::Count::new(from.build(qs)?))),
            Shape::Save { from, tags } => {
                if from.is_null() {
                    return Ok(Box::new(iterator::Null::new()));
                }
                if tags.is_empty() {
                    return from.build(qs);
                }
                Ok(Box::new(iterator::Save::new(from.build(qs)?, tags.clone())))
            }
            Shape::FixedTags { from, tags } => {
                if from.is_null() {
                    return Ok(Box::new(iterator::Null::new()));
                }
                if tags.is_empty() {
                    return from.build(qs);
                }
                Ok(Box::new(iterator::FixedTags::new(
                    from.build(qs)?,
                    tags.clone(),
                )))
            }
            // Outside an intersection an optional constraint is identity;
            // the left-outer reading is applied by Intersect above.
            Shape::Optional(from) => from.build(qs),
            Shape::Predicates { from, reverse } => {
                predicates_shape((**from).clone(), *reverse).build(qs)
            }
            Shape::Recursive {
                from,
                via,
                depth_tag,
            } => Ok(Box::new(iterator::Recursive::new(
                qs.clone(),
                from.build(qs)?,
                via.clone(),
                depth_tag.clone(),
            ))),
        }
    }

}

// A pure filter bag over all nodes is offered to the backend before
// falling back to scan-and-test.
fn build_value_filter(
    qs: &Store,
    from: &Shape,
    preds: Vec<ValuePredicate>,
) -> Result<Box<dyn Cursor>> {
    if from.is_all() {
        if let Some(it) = qs.value_filter_cursor(&preds) {
            return Ok(it);
        }
    }
    Ok(Box::new(ValueFilter::new(qs.clone(), from.build(qs)?, preds)))
}

/// Distinct predicates of quads holding `from` at the start position.
pub(crate) fn predicates_shape(from: Shape, reverse: bool) -> Shape {
    let dir = if reverse {
        Direction::Object
    } else {
        Direction::Subject
    };
    Shape::Unique(Box::new(Shape::QuadDirection {
        dir: Direction::Predicate,
        quads: QuadShape::quads([QuadFilter::new(dir, from)]),
    }))
}

/// Optimizes a shape, lowers it to a cursor, and offers the result to the
/// backend's native-rewrite hook. The entry point for every scan.
pub fn build_cursor(qs: &Store, s: &Shape) -> Result<Box<dyn Cursor>> {
    let (optimized, changed) = s.clone().optimize(qs.as_ref());
    tracing::debug!(target: "quarry::optimize", changed, "optimized shape tree");
    if optimized.is_null() {
        return Ok(Box::new(iterator::Null::new()));
    }
    let it = optimized.build(qs)?;
    Ok(qs.optimize_cursor(it).0)
}
