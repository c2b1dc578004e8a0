//! Bottom-up shape rewriting.
//!
//! `optimize` is a pure function over shape trees, dispatched by variant
//! and applied children-first. A single pass establishes a fixed point:
//! optimizing an already-optimized tree reports no change.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::model::{Direction, Value};
use crate::shape::{
    predicates_shape, QuadFilter, QuadShape, QuadsAction, Shape,
};
use crate::store::{QuadStore, Ref};

impl Shape {
    /// Rewrites the tree, resolving lookups against the backend and
    /// normalizing set operators. The boolean reports whether anything
    /// changed; the result of a changed pass optimizes to itself.
    pub fn optimize(self, qs: &dyn QuadStore) -> (Shape, bool) {
        match self {
            Shape::AllNodes => (Shape::AllNodes, false),
            Shape::Null => (Shape::Null, false),
            Shape::QuadsAct(act) => (Shape::QuadsAct(act), false),
            Shape::Fixed(refs) => {
                if refs.is_empty() {
                    (Shape::Null, true)
                } else {
                    (Shape::Fixed(refs), false)
                }
            }
            Shape::Lookup(values) => {
                let refs = Shape::resolve_lookup(&values, qs);
                trace!(
                    target: "quarry::optimize",
                    requested = values.len(),
                    resolved = refs.len(),
                    "resolved lookup"
                );
                if refs.is_empty() {
                    (Shape::Null, true)
                } else {
                    (Shape::Fixed(refs), true)
                }
            }
            Shape::QuadDirection { dir, quads } => optimize_quad_direction(dir, quads, qs),
            Shape::Intersect(children) => optimize_intersect(children, qs),
            Shape::Union(children) => optimize_union(children, qs),
            Shape::Except { from, exclude } => {
                // A literal Null universe denotes "everything": the
                // builder writes it for an unconstrained difference. A
                // universe that merely reduces to Null is an empty scan.
                if matches!(from.as_deref(), Some(Shape::Null)) {
                    return (Shape::AllNodes, true);
                }
                let (exclude, mut opt) = exclude.optimize(qs);
                let from = match from {
                    Some(f) => {
                        let (f, o) = f.optimize(qs);
                        opt |= o;
                        Some(f)
                    }
                    None => None,
                };
                if matches!(from, Some(Shape::Null)) {
                    return (Shape::Null, true);
                }
                if exclude.is_null() {
                    return (from.unwrap_or(Shape::AllNodes), true);
                }
                if exclude.is_all() {
                    return (Shape::Null, true);
                }
                (
                    Shape::Except {
                        from: from.map(Box::new),
                        exclude: Box::new(exclude),
                    },
                    opt,
                )
            }
            Shape::Filter { from, ops } => {
                let (from, opt) = from.optimize(qs);
                if from.is_null() {
                    return (Shape::Null, true);
                }
                if ops.is_empty() {
                    return (from, true);
                }
                (
                    Shape::Filter {
                        from: Box::new(from),
                        ops,
                    },
                    opt,
                )
            }
            Shape::Regexp {
                from,
                pattern,
                refs,
            } => {
                let (from, opt) = from.optimize(qs);
                if from.is_null() {
                    return (Shape::Null, true);
                }
                (
                    Shape::Regexp {
                        from: Box::new(from),
                        pattern,
                        refs,
                    },
                    opt,
                )
            }
            Shape::Wildcard { from, like } => {
                let (from, opt) = from.optimize(qs);
                if from.is_null() {
                    return (Shape::Null, true);
                }
                (
                    Shape::Wildcard {
                        from: Box::new(from),
                        like,
                    },
                    opt,
                )
            }
            Shape::Page { from, skip, limit } => {
                let (from, opt) = from.optimize(qs);
                if from.is_null() {
                    return (Shape::Null, true);
                }
                if skip <= 0 && limit <= 0 {
                    return (from, true);
                }
                (
                    Shape::Page {
                        from: Box::new(from),
                        skip,
                        limit,
                    },
                    opt,
                )
            }
            Shape::Unique(from) => {
                let (from, opt) = from.optimize(qs);
                if from.is_null() {
                    return (Shape::Null, true);
                }
                (Shape::Unique(Box::new(from)), opt)
            }
            Shape::Sort(from) => {
                let (from, opt) = from.optimize(qs);
                if from.is_null() {
                    return (Shape::Null, true);
                }
                (Shape::Sort(Box::new(from)), opt)
            }
            Shape::Count(from) => {
                let (from, opt) = from.optimize(qs);
                if from.is_null() {
                    return (
                        Shape::Fixed(vec![Ref::Prefetched(Value::Int(0))]),
                        true,
                    );
                }
                (Shape::Count(Box::new(from)), opt)
            }
            Shape::Save { from, tags } => {
                let (from, opt) = from.optimize(qs);
                if from.is_null() {
                    return (Shape::Null, true);
                }
                if tags.is_empty() {
                    return (from, true);
                }
                // Stacked saves bind the same result; one wrapper
                // carrying every tag is equivalent.
                if let Shape::Save {
                    from: inner,
                    tags: inner_tags,
                } = from
                {
                    let mut merged = tags;
                    merged.extend(inner_tags);
                    return (
                        Shape::Save {
                            from: inner,
                            tags: merged,
                        },
                        true,
                    );
                }
                (
                    Shape::Save {
                        from: Box::new(from),
                        tags,
                    },
                    opt,
                )
            }
            Shape::FixedTags { from, tags } => {
                let (from, opt) = from.optimize(qs);
                if from.is_null() {
                    return (Shape::Null, true);
                }
                if tags.is_empty() {
                    return (from, true);
                }
                if let Shape::FixedTags {
                    from: inner,
                    tags: inner_tags,
                } = from
                {
                    // Nested constant maps merge; the innermost binding
                    // wins a collision.
                    let mut merged = tags;
                    for (tag, value) in inner_tags {
                        merged.insert(tag, value);
                    }
                    return (
                        Shape::FixedTags {
                            from: inner,
                            tags: merged,
                        },
                        true,
                    );
                }
                (
                    Shape::FixedTags {
                        from: Box::new(from),
                        tags,
                    },
                    opt,
                )
            }
            // Emptiness does not propagate here: an optional branch that
            // can never match still lets the enclosing join succeed.
            Shape::Optional(from) => {
                let (from, opt) = from.optimize(qs);
                (Shape::Optional(Box::new(from)), opt)
            }
            Shape::Predicates { from, reverse } => {
                let (expanded, _) = predicates_shape(*from, reverse).optimize(qs);
                (expanded, true)
            }
            Shape::Recursive {
                from,
                via,
                depth_tag,
            } => {
                let (from, opt) = from.optimize(qs);
                if from.is_null() {
                    return (Shape::Null, true);
                }
                (
                    Shape::Recursive {
                        from: Box::new(from),
                        via,
                        depth_tag,
                    },
                    opt,
                )
            }
        }
    }
}

impl QuadShape {
    /// Optimizes every filter's value shape; a filter whose values are
    /// empty empties the whole quad set.
    pub fn optimize(self, qs: &dyn QuadStore) -> (QuadShape, bool) {
        match self {
            QuadShape::Null => (QuadShape::Null, false),
            QuadShape::Quads(filters) => {
                let mut opt = false;
                let mut out = super::QuadFilters::with_capacity(filters.len());
                for f in filters {
                    let (values, o) = f.values.optimize(qs);
                    opt |= o;
                    if values.is_null() {
                        return (QuadShape::Null, true);
                    }
                    out.push(QuadFilter {
                        dir: f.dir,
                        values: Box::new(values),
                    });
                }
                (QuadShape::Quads(out), opt)
            }
        }
    }
}

fn wrap_const_tags(inner: Shape, tags: FxHashMap<String, Ref>) -> Shape {
    if tags.is_empty() {
        inner
    } else {
        Shape::FixedTags {
            from: Box::new(inner),
            tags,
        }
    }
}

fn optimize_quad_direction(
    dir: Direction,
    quads: QuadShape,
    qs: &dyn QuadStore,
) -> (Shape, bool) {
    let (quads, mut opt) = quads.optimize(qs);
    let mut filters = match quads {
        QuadShape::Null => return (Shape::Null, true),
        QuadShape::Quads(f) => f,
    };

    // Constant tag maps bubble out of the filter values to the top of
    // the projection.
    let mut const_tags: FxHashMap<String, Ref> = FxHashMap::default();
    for f in filters.iter_mut() {
        while matches!(*f.values, Shape::FixedTags { .. }) {
            let Shape::FixedTags { from, tags } =
                *std::mem::replace(&mut f.values, Box::new(Shape::Null))
            else {
                unreachable!("matched above");
            };
            for (tag, value) in tags {
                const_tags.entry(tag).or_insert(value);
            }
            f.values = from;
            opt = true;
        }
    }

    // A projection straight back to the only filtered direction is a
    // round trip through the quad and cancels out.
    if filters.len() == 1 && filters[0].dir == dir {
        let only = filters.into_iter().next().expect("one filter");
        trace!(target: "quarry::optimize", %dir, "collapsed projection round trip");
        return (wrap_const_tags(*only.values, const_tags), true);
    }

    // Fuse when every filter is either a constant reference or a
    // whole-position tag save.
    let mut filter_map: FxHashMap<Direction, Ref> = FxHashMap::default();
    let mut save_map: FxHashMap<Direction, Vec<String>> = FxHashMap::default();
    let mut fused = 0usize;
    let mut duplicate = false;
    for f in &filters {
        if let Some(r) = f.values.one() {
            if filter_map.insert(f.dir, r.clone()).is_some() {
                duplicate = true;
                break;
            }
            fused += 1;
        } else if let Shape::Save { from, tags } = &*f.values {
            if from.is_all() {
                save_map
                    .entry(f.dir)
                    .or_default()
                    .extend(tags.iter().cloned());
                fused += 1;
            }
        }
    }
    if !duplicate && fused == filters.len() {
        let act = Shape::QuadsAct(QuadsAction {
            result: dir,
            filter: filter_map,
            save: save_map,
        });
        return (wrap_const_tags(act, const_tags), true);
    }

    let shape = Shape::QuadDirection {
        dir,
        quads: QuadShape::Quads(filters),
    };
    if const_tags.is_empty() {
        (shape, opt)
    } else {
        (wrap_const_tags(shape, const_tags), true)
    }
}

fn optimize_union(children: Vec<Shape>, qs: &dyn QuadStore) -> (Shape, bool) {
    let mut opt = false;
    let mut out = Vec::with_capacity(children.len());
    for c in children {
        let (c, o) = c.optimize(qs);
        opt |= o;
        match c {
            Shape::Null => opt = true,
            Shape::Union(sub) => {
                opt = true;
                out.extend(sub);
            }
            other => out.push(other),
        }
    }
    match out.len() {
        0 => (Shape::Null, true),
        1 => (out.pop().expect("one child"), true),
        _ => (Shape::Union(out), opt),
    }
}

fn optimize_intersect(children: Vec<Shape>, qs: &dyn QuadStore) -> (Shape, bool) {
    let mut opt = false;
    let first_was_fixed = matches!(children.first(), Some(Shape::Fixed(_)));
    let mut work: VecDeque<Shape> = VecDeque::with_capacity(children.len());
    for c in children {
        let (c, o) = c.optimize(qs);
        opt |= o;
        work.push_back(c);
    }

    let mut out: Vec<Shape> = Vec::new();
    let mut fixed_lists: Vec<Vec<Ref>> = Vec::new();
    let mut saved_tags: Vec<String> = Vec::new();
    let mut const_tags: FxHashMap<String, Ref> = FxHashMap::default();
    while let Some(c) = work.pop_front() {
        match c {
            Shape::Null => return (Shape::Null, true),
            Shape::AllNodes => opt = true,
            Shape::Intersect(sub) => {
                opt = true;
                for s in sub.into_iter().rev() {
                    work.push_front(s);
                }
            }
            Shape::Fixed(refs) => fixed_lists.push(refs),
            Shape::Save { from, tags } => {
                // Tag bindings surface to the outermost scope; the
                // result they bind is the intersection's own result.
                opt = true;
                saved_tags.extend(tags);
                work.push_front(*from);
            }
            Shape::FixedTags { from, tags } => {
                opt = true;
                for (tag, value) in tags {
                    const_tags.entry(tag).or_insert(value);
                }
                work.push_front(*from);
            }
            other => out.push(other),
        }
    }

    if !fixed_lists.is_empty() {
        if fixed_lists.len() > 1 || !first_was_fixed {
            opt = true;
        }
        let merged = merge_fixed(fixed_lists);
        if merged.is_empty() {
            return (Shape::Null, true);
        }
        out.insert(0, Shape::Fixed(merged));
    }

    let inner = match out.len() {
        0 => return (Shape::Null, true),
        1 => {
            opt = true;
            out.pop().expect("one child")
        }
        _ => Shape::Intersect(out),
    };
    let inner = wrap_const_tags(inner, const_tags);
    let inner = if saved_tags.is_empty() {
        inner
    } else {
        Shape::Save {
            from: Box::new(inner),
            tags: saved_tags,
        }
    };
    (inner, opt)
}

// Multiset intersection: each reference survives as many times as its
// smallest multiplicity across the lists, in first-list order.
fn merge_fixed(mut lists: Vec<Vec<Ref>>) -> Vec<Ref> {
    let mut merged = lists.remove(0);
    for other in lists {
        let mut avail: FxHashMap<Ref, usize> = FxHashMap::default();
        for r in other {
            *avail.entry(r).or_insert(0) += 1;
        }
        merged.retain(|r| match avail.get_mut(r) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        });
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Quad;
    use crate::shape::QuadFilters;
    use crate::store::{MemStore, QuadStore};

    fn store() -> MemStore {
        MemStore::from_quads([
            Quad::new("alice", "follows", "bob"),
            Quad::new("bob", "status", "cool"),
        ])
    }

    fn ref_of(qs: &MemStore, name: &str) -> Ref {
        qs.value_of(&Value::iri(name)).expect("value interned")
    }

    fn quads(filters: impl IntoIterator<Item = QuadFilter>) -> QuadShape {
        QuadShape::Quads(filters.into_iter().collect::<QuadFilters>())
    }

    fn assert_fixed_point(shape: &Shape, qs: &dyn QuadStore) {
        let (once, _) = shape.clone().optimize(qs);
        let (twice, changed) = once.clone().optimize(qs);
        assert_eq!(once, twice);
        assert!(!changed, "second pass must be a fixed point: {once:?}");
    }

    #[test]
    fn all_nodes_is_already_optimal() {
        let qs = store();
        let (got, changed) = Shape::AllNodes.optimize(&qs);
        assert_eq!(got, Shape::AllNodes);
        assert!(!changed);
    }

    #[test]
    fn lookup_resolves_to_fixed() {
        let qs = store();
        let bob = ref_of(&qs, "bob");
        let (got, changed) = Shape::Lookup(vec![Value::iri("bob")]).optimize(&qs);
        assert_eq!(got, Shape::Fixed(vec![bob]));
        assert!(changed);

        let (got, changed) = Shape::Lookup(vec![Value::iri("nobody")]).optimize(&qs);
        assert_eq!(got, Shape::Null);
        assert!(changed);
    }

    #[test]
    fn intersect_drops_all_nodes_merges_fixed_and_flattens() {
        let qs = store();
        let alice = ref_of(&qs, "alice");
        let from = Shape::Intersect(vec![
            Shape::AllNodes,
            Shape::QuadDirection {
                dir: Direction::Subject,
                quads: quads([]),
            },
            Shape::Intersect(vec![
                Shape::Lookup(vec![Value::iri("alice")]),
                Shape::Unique(Box::new(Shape::QuadDirection {
                    dir: Direction::Object,
                    quads: quads([]),
                })),
            ]),
        ]);
        let (got, changed) = from.clone().optimize(&qs);
        assert!(changed);
        assert_eq!(
            got,
            Shape::Intersect(vec![
                Shape::Fixed(vec![alice]),
                Shape::QuadsAct(QuadsAction {
                    result: Direction::Subject,
                    ..Default::default()
                }),
                Shape::Unique(Box::new(Shape::QuadsAct(QuadsAction {
                    result: Direction::Object,
                    ..Default::default()
                }))),
            ])
        );
        assert_fixed_point(&from, &qs);
    }

    #[test]
    fn save_is_hoisted_out_of_intersect() {
        let qs = store();
        let from = Shape::Intersect(vec![
            Shape::Save {
                tags: vec!["id".into()],
                from: Box::new(Shape::QuadDirection {
                    dir: Direction::Subject,
                    quads: quads([]),
                }),
            },
            Shape::Unique(Box::new(Shape::QuadDirection {
                dir: Direction::Object,
                quads: quads([]),
            })),
        ]);
        let (got, changed) = from.clone().optimize(&qs);
        assert!(changed);
        assert_eq!(
            got,
            Shape::Save {
                tags: vec!["id".into()],
                from: Box::new(Shape::Intersect(vec![
                    Shape::QuadsAct(QuadsAction {
                        result: Direction::Subject,
                        ..Default::default()
                    }),
                    Shape::Unique(Box::new(Shape::QuadsAct(QuadsAction {
                        result: Direction::Object,
                        ..Default::default()
                    }))),
                ])),
            }
        );
        assert_fixed_point(&from, &qs);
    }

    #[test]
    fn unresolved_lookup_empties_the_whole_tree() {
        let qs = store();
        let from = Shape::QuadDirection {
            dir: Direction::Subject,
            quads: quads([QuadFilter::new(
                Direction::Subject,
                Shape::Union(vec![Shape::Unique(Box::new(Shape::QuadDirection {
                    dir: Direction::Predicate,
                    quads: quads([QuadFilter::new(
                        Direction::Object,
                        Shape::Lookup(vec![Value::iri("no-such-node")]),
                    )]),
                }))]),
            )]),
        };
        let (got, changed) = from.optimize(&qs);
        assert_eq!(got, Shape::Null);
        assert!(changed);
    }

    #[test]
    fn empty_optional_branches_survive() {
        let qs = store();
        let r1 = ref_of(&qs, "alice");
        let from = Shape::Intersect(vec![
            Shape::Fixed(vec![r1.clone()]),
            Shape::Optional(Box::new(Shape::Lookup(vec![Value::iri("no-such-node")]))),
        ]);
        let (got, changed) = from.clone().optimize(&qs);
        assert!(changed);
        assert_eq!(
            got,
            Shape::Intersect(vec![
                Shape::Fixed(vec![r1]),
                Shape::Optional(Box::new(Shape::Null)),
            ])
        );
        assert_fixed_point(&from, &qs);
    }

    #[test]
    fn fixed_children_intersect_and_lead() {
        let qs = store();
        let (r1, r2) = (ref_of(&qs, "alice"), ref_of(&qs, "bob"));
        let from = Shape::Intersect(vec![
            Shape::AllNodes,
            Shape::Fixed(vec![r1, r2.clone()]),
            Shape::Save {
                from: Box::new(Shape::AllNodes),
                tags: vec!["all".into()],
            },
            Shape::Fixed(vec![r2.clone()]),
        ]);
        let (got, changed) = from.clone().optimize(&qs);
        assert!(changed);
        assert_eq!(
            got,
            Shape::Save {
                from: Box::new(Shape::Fixed(vec![r2])),
                tags: vec!["all".into()],
            }
        );
        assert_fixed_point(&from, &qs);
    }

    #[test]
    fn disjoint_fixed_children_empty_the_intersect() {
        let qs = store();
        let (r1, r2) = (ref_of(&qs, "alice"), ref_of(&qs, "bob"));
        let from = Shape::Intersect(vec![
            Shape::Fixed(vec![r1]),
            Shape::Fixed(vec![r2]),
            Shape::AllNodes,
        ]);
        let (got, changed) = from.optimize(&qs);
        assert_eq!(got, Shape::Null);
        assert!(changed);
    }

    #[test]
    fn projection_round_trip_cancels() {
        let qs = store();
        let r1 = ref_of(&qs, "alice");
        let from = Shape::QuadDirection {
            dir: Direction::Subject,
            quads: quads([QuadFilter::new(
                Direction::Subject,
                Shape::Fixed(vec![r1.clone()]),
            )]),
        };
        let (got, changed) = from.clone().optimize(&qs);
        assert_eq!(got, Shape::Fixed(vec![r1]));
        assert!(changed);
        assert_fixed_point(&from, &qs);
    }

    #[test]
    fn constant_filters_and_saves_fuse() {
        let qs = store();
        let r1 = ref_of(&qs, "follows");
        let from = Shape::QuadDirection {
            dir: Direction::Object,
            quads: quads([
                QuadFilter::new(Direction::Predicate, Shape::Fixed(vec![r1.clone()])),
                QuadFilter::new(
                    Direction::Subject,
                    Shape::Save {
                        from: Box::new(Shape::AllNodes),
                        tags: vec!["source".into()],
                    },
                ),
            ]),
        };
        let (got, changed) = from.clone().optimize(&qs);
        assert!(changed);
        let mut filter = FxHashMap::default();
        filter.insert(Direction::Predicate, r1);
        let mut save = FxHashMap::default();
        save.insert(Direction::Subject, vec!["source".to_owned()]);
        assert_eq!(
            got,
            Shape::QuadsAct(QuadsAction {
                result: Direction::Object,
                filter,
                save,
            })
        );
        assert_fixed_point(&from, &qs);
    }

    #[test]
    fn constant_tags_pop_to_the_top_of_the_tree() {
        let qs = store();
        let (r1, r2, r3) = (
            ref_of(&qs, "alice"),
            ref_of(&qs, "bob"),
            ref_of(&qs, "cool"),
        );
        let mut foo = FxHashMap::default();
        foo.insert("foo".to_owned(), r1.clone());
        let mut bar = FxHashMap::default();
        bar.insert("bar".to_owned(), r2.clone());

        let from = Shape::QuadDirection {
            dir: Direction::Subject,
            quads: quads([QuadFilter::new(
                Direction::Predicate,
                Shape::Intersect(vec![Shape::FixedTags {
                    tags: foo,
                    from: Box::new(Shape::QuadDirection {
                        dir: Direction::Subject,
                        quads: quads([QuadFilter::new(
                            Direction::Object,
                            Shape::FixedTags {
                                tags: bar,
                                from: Box::new(Shape::Fixed(vec![r3.clone()])),
                            },
                        )]),
                    }),
                }]),
            )]),
        };
        let (got, changed) = from.clone().optimize(&qs);
        assert!(changed);

        let mut merged = FxHashMap::default();
        merged.insert("foo".to_owned(), r1);
        merged.insert("bar".to_owned(), r2);
        let mut filter = FxHashMap::default();
        filter.insert(Direction::Object, r3);
        assert_eq!(
            got,
            Shape::FixedTags {
                tags: merged,
                from: Box::new(Shape::QuadDirection {
                    dir: Direction::Subject,
                    quads: quads([QuadFilter::new(
                        Direction::Predicate,
                        Shape::QuadsAct(QuadsAction {
                            result: Direction::Subject,
                            filter,
                            ..Default::default()
                        }),
                    )]),
                }),
            }
        );
        assert_fixed_point(&from, &qs);
    }

    #[test]
    fn except_neutral_rules() {
        let qs = store();
        let r1 = ref_of(&qs, "alice");
        let some = Shape::Fixed(vec![r1]);

        let (got, changed) = Shape::Except {
            from: Some(Box::new(some.clone())),
            exclude: Box::new(Shape::Null),
        }
        .optimize(&qs);
        assert_eq!(got, some);
        assert!(changed);

        let (got, changed) = Shape::Except {
            from: Some(Box::new(Shape::Null)),
            exclude: Box::new(some.clone()),
        }
        .optimize(&qs);
        assert_eq!(got, Shape::AllNodes);
        assert!(changed);

        let (got, changed) = Shape::Except {
            from: Some(Box::new(some)),
            exclude: Box::new(Shape::AllNodes),
        }
        .optimize(&qs);
        assert_eq!(got, Shape::Null);
        assert!(changed);
    }

    #[test]
    fn zero_page_is_elided() {
        let qs = store();
        let r1 = ref_of(&qs, "alice");
        let from = Shape::Page {
            from: Box::new(Shape::Fixed(vec![r1.clone()])),
            skip: 0,
            limit: 0,
        };
        let (got, changed) = from.optimize(&qs);
        assert_eq!(got, Shape::Fixed(vec![r1]));
        assert!(changed);
    }

    #[test]
    fn singleton_set_operators_collapse() {
        let qs = store();
        let r1 = ref_of(&qs, "alice");
        let inner = Shape::Fixed(vec![r1]);

        let (got, changed) = Shape::Intersect(vec![inner.clone()]).optimize(&qs);
        assert_eq!(got, inner);
        assert!(changed);

        let (got, changed) = Shape::Union(vec![inner.clone()]).optimize(&qs);
        assert_eq!(got, inner);
        assert!(changed);

        let (got, _) = Shape::Intersect(vec![]).optimize(&qs);
        assert_eq!(got, Shape::Null);
        let (got, _) = Shape::Union(vec![]).optimize(&qs);
        assert_eq!(got, Shape::Null);
    }

    #[test]
    fn nested_unions_flatten() {
        let qs = store();
        let (r1, r2, r3) = (
            ref_of(&qs, "alice"),
            ref_of(&qs, "bob"),
            ref_of(&qs, "cool"),
        );
        let from = Shape::Union(vec![
            Shape::Union(vec![
                Shape::Fixed(vec![r1.clone()]),
                Shape::Fixed(vec![r2.clone()]),
            ]),
            Shape::Null,
            Shape::Fixed(vec![r3.clone()]),
        ]);
        let (got, changed) = from.clone().optimize(&qs);
        assert_eq!(
            got,
            Shape::Union(vec![
                Shape::Fixed(vec![r1]),
                Shape::Fixed(vec![r2]),
                Shape::Fixed(vec![r3]),
            ])
        );
        assert!(changed);
        assert_fixed_point(&from, &qs);
    }

    #[test]
    fn stacked_saves_merge_into_one_wrapper() {
        let qs = store();
        let r1 = ref_of(&qs, "alice");
        let from = Shape::Save {
            tags: vec!["outer".into()],
            from: Box::new(Shape::Save {
                tags: vec!["inner".into()],
                from: Box::new(Shape::Fixed(vec![r1.clone()])),
            }),
        };
        let (got, changed) = from.clone().optimize(&qs);
        assert_eq!(
            got,
            Shape::Save {
                tags: vec!["outer".into(), "inner".into()],
                from: Box::new(Shape::Fixed(vec![r1])),
            }
        );
        assert!(changed);
        assert_fixed_point(&from, &qs);
    }

    #[test]
    fn count_of_nothing_is_a_prefetched_zero() {
        let qs = store();
        let (got, changed) = Shape::Count(Box::new(Shape::Null)).optimize(&qs);
        assert_eq!(got, Shape::Fixed(vec![Ref::Prefetched(Value::Int(0))]));
        assert!(changed);
        assert_fixed_point(&got, &qs);
    }

    #[test]
    fn optional_children_are_not_flattened() {
        let qs = store();
        let r1 = ref_of(&qs, "alice");
        let from = Shape::Intersect(vec![
            Shape::Fixed(vec![r1.clone()]),
            Shape::Optional(Box::new(Shape::QuadDirection {
                dir: Direction::Subject,
                quads: quads([]),
            })),
        ]);
        let (got, _) = from.clone().optimize(&qs);
        assert_eq!(
            got,
            Shape::Intersect(vec![
                Shape::Fixed(vec![r1]),
                Shape::Optional(Box::new(Shape::QuadsAct(QuadsAction {
                    result: Direction::Subject,
                    ..Default::default()
                }))),
            ])
        );
        assert_fixed_point(&from, &qs);
    }
}
