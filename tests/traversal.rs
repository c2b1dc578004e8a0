use std::collections::BTreeSet;
use std::sync::Arc;

use quarry::{
    iterator, CmpOp, MemStore, Path, Quad, QuadStore, Ref, Result, Store, TagMap, Value,
};

// alice, bob, charlie, dani, fred, greg and who follows whom; three of
// them share a status.
fn social_graph() -> Store {
    Arc::new(MemStore::from_quads([
        Quad::new("alice", "follows", "bob"),
        Quad::new("bob", "follows", "fred"),
        Quad::new("charlie", "follows", "bob"),
        Quad::new("dani", "follows", "bob"),
        Quad::new("charlie", "follows", "dani"),
        Quad::new("bob", "status", "cool"),
        Quad::new("dani", "status", "cool"),
        Quad::new("greg", "status", "cool"),
        Quad::new("greg", "status", "smart"),
    ]))
}

fn scan_values(qs: &Store, path: Path) -> Result<Vec<Value>> {
    let mut it = path.build_on(qs)?;
    let results = iterator::scan(it.as_mut(), &Default::default())?;
    it.close();
    results
        .into_iter()
        .map(|r| name_of(qs, &r.value))
        .collect()
}

fn scan_with_tags(qs: &Store, path: Path) -> Result<Vec<(Value, TagMap)>> {
    let mut it = path.build_on(qs)?;
    let results = iterator::scan(it.as_mut(), &Default::default())?;
    it.close();
    results
        .into_iter()
        .map(|r| Ok((name_of(qs, &r.value)?, r.tags)))
        .collect()
}

fn name_of(qs: &Store, r: &Ref) -> Result<Value> {
    match r {
        Ref::Prefetched(v) => Ok(v.clone()),
        other => qs.name_of(other),
    }
}

fn iri_set(values: &[Value]) -> BTreeSet<String> {
    values
        .iter()
        .map(|v| match v {
            Value::Iri(s) => s.clone(),
            other => other.to_string(),
        })
        .collect()
}

fn iris(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn out_follows_single_hop() -> Result<()> {
    let qs = social_graph();
    let got = scan_values(&qs, Path::start(["alice"]).out("follows"))?;
    assert_eq!(iri_set(&got), iris(&["bob"]));
    Ok(())
}

#[test]
fn in_follows_finds_every_follower() -> Result<()> {
    let qs = social_graph();
    let got = scan_values(&qs, Path::start(["bob"]).r#in("follows"))?;
    assert_eq!(iri_set(&got), iris(&["alice", "charlie", "dani"]));
    assert_eq!(got.len(), 3);
    Ok(())
}

#[test]
fn has_status_restricts_to_subjects() -> Result<()> {
    let qs = social_graph();
    let got = scan_values(
        &qs,
        Path::start(Vec::<Value>::new()).has_values("status", false, ["cool"]),
    )?;
    assert_eq!(iri_set(&got), iris(&["bob", "dani", "greg"]));
    Ok(())
}

#[test]
fn except_removes_the_other_path() -> Result<()> {
    let qs = social_graph();
    let got = scan_values(
        &qs,
        Path::start(["alice", "bob"]).except(Path::start(["alice"])),
    )?;
    assert_eq!(iri_set(&got), iris(&["bob"]));
    assert_eq!(got.len(), 1);
    Ok(())
}

#[test]
fn out_unique_deduplicates_shared_targets() -> Result<()> {
    let qs = social_graph();
    // alice and charlie both follow bob; every distinct target survives
    // exactly once.
    let got = scan_values(
        &qs,
        Path::start(["alice", "bob", "charlie"]).out("follows").unique(),
    )?;
    assert_eq!(iri_set(&got), iris(&["bob", "dani", "fred"]));
    assert_eq!(got.len(), 3);
    Ok(())
}

#[test]
fn sorted_page_picks_the_second_cool_node() -> Result<()> {
    let qs = social_graph();
    let got = scan_values(
        &qs,
        Path::start(Vec::<Value>::new())
            .has_values("status", false, ["cool"])
            .sort()
            .page(1, 1),
    )?;
    assert_eq!(got, vec![Value::iri("dani")]);
    Ok(())
}

#[test]
fn follow_recursive_reaches_the_closure() -> Result<()> {
    let qs = social_graph();
    let got = scan_values(
        &qs,
        Path::start(["charlie"]).follow_recursive("follows", None),
    )?;
    assert_eq!(iri_set(&got), iris(&["bob", "dani", "fred"]));
    Ok(())
}

#[test]
fn follow_recursive_binds_discovery_depth() -> Result<()> {
    let qs = social_graph();
    let got = scan_with_tags(
        &qs,
        Path::start(["charlie"]).follow_recursive("follows", Some("depth")),
    )?;
    let mut depths: Vec<(String, i64)> = got
        .into_iter()
        .map(|(v, tags)| {
            let depth = match tags.get("depth") {
                Some(Ref::Prefetched(Value::Int(d))) => *d,
                other => panic!("missing depth tag: {other:?}"),
            };
            (v.to_string(), depth)
        })
        .collect();
    depths.sort();
    assert_eq!(
        depths,
        vec![
            ("<bob>".to_string(), 1),
            ("<dani>".to_string(), 1),
            ("<fred>".to_string(), 2),
        ]
    );
    Ok(())
}

#[test]
fn out_with_tags_binds_the_predicate_taken() -> Result<()> {
    let qs = social_graph();
    let follows = qs.value_of(&Value::iri("follows")).expect("interned");
    let got = scan_with_tags(&qs, Path::start(["alice"]).out_with_tags("follows", ["pred"]))?;
    assert_eq!(got.len(), 1);
    let (value, tags) = &got[0];
    assert_eq!(value, &Value::iri("bob"));
    assert_eq!(tags.get("pred"), Some(&follows));
    Ok(())
}

#[test]
fn save_binds_the_reached_endpoint() -> Result<()> {
    let qs = social_graph();
    let cool = qs.value_of(&Value::iri("cool")).expect("interned");
    let got = scan_with_tags(
        &qs,
        Path::start(["bob", "greg"]).save("status", "state"),
    )?;
    let names: BTreeSet<String> = got.iter().map(|(v, _)| v.to_string()).collect();
    assert_eq!(names, iris(&["<bob>", "<greg>"]));
    for (_, tags) in &got {
        // greg has two statuses; either binding is a valid path here.
        assert!(tags.contains_key("state"));
    }
    assert!(got.iter().any(|(_, tags)| tags.get("state") == Some(&cool)));
    Ok(())
}

#[test]
fn optional_save_keeps_nodes_without_the_predicate() -> Result<()> {
    let qs = social_graph();

    // alice has no status quad: a required save drops her.
    let required = scan_values(&qs, Path::start(["alice", "bob"]).save("status", "state"))?;
    assert_eq!(iri_set(&required), iris(&["bob"]));

    // An optional save keeps her, with the tag absent.
    let optional = scan_with_tags(
        &qs,
        Path::start(["alice", "bob"]).save_opt("status", "state", false, true),
    )?;
    assert_eq!(optional.len(), 2);
    for (value, tags) in optional {
        match value {
            Value::Iri(ref s) if s == "alice" => assert!(!tags.contains_key("state")),
            Value::Iri(ref s) if s == "bob" => assert!(tags.contains_key("state")),
            other => panic!("unexpected result {other}"),
        }
    }
    Ok(())
}

#[test]
fn count_wraps_the_cardinality() -> Result<()> {
    let qs = social_graph();
    let got = scan_values(
        &qs,
        Path::start(Vec::<Value>::new())
            .has_values("status", false, ["cool"])
            .count(),
    )?;
    assert_eq!(got, vec![Value::Int(3)]);
    Ok(())
}

#[test]
fn predicates_lists_distinct_edges() -> Result<()> {
    let qs = social_graph();
    let got = scan_values(&qs, Path::start(["bob"]).predicates(false))?;
    assert_eq!(iri_set(&got), iris(&["follows", "status"]));
    Ok(())
}

#[test]
fn union_keeps_duplicates_until_unique() -> Result<()> {
    let qs = social_graph();
    let doubled = scan_values(&qs, Path::start(["bob"]).or(Path::start(["bob"])))?;
    assert_eq!(doubled.len(), 2);

    let deduped = scan_values(&qs, Path::start(["bob"]).or(Path::start(["bob"])).unique())?;
    assert_eq!(deduped.len(), 1);
    Ok(())
}

#[test]
fn label_context_restricts_to_one_graph() -> Result<()> {
    let qs: Store = Arc::new(MemStore::from_quads([
        Quad::new("alice", "follows", "bob").with_label("work"),
        Quad::new("alice", "follows", "charlie").with_label("home"),
        Quad::new("alice", "follows", "dani"),
    ]));
    let got = scan_values(&qs, Path::start(["alice"]).label_context(["work"]).out("follows"))?;
    assert_eq!(iri_set(&got), iris(&["bob"]));

    let all = scan_values(&qs, Path::start(["alice"]).out("follows"))?;
    assert_eq!(iri_set(&all), iris(&["bob", "charlie", "dani"]));
    Ok(())
}

#[test]
fn comparisons_filter_resolved_values() -> Result<()> {
    let qs: Store = Arc::new(MemStore::from_quads([
        Quad::new("alice", "age", Value::Int(25)),
        Quad::new("bob", "age", Value::Int(17)),
        Quad::new("charlie", "age", Value::Int(40)),
    ]));
    let got = scan_values(
        &qs,
        Path::start(Vec::<Value>::new())
            .has("age", false, [])
            .out("age")
            .compare(CmpOp::Gt, Value::Int(20))
            .compare(CmpOp::Lt, Value::Int(30)),
    )?;
    assert_eq!(got, vec![Value::Int(25)]);
    Ok(())
}

#[test]
fn wildcard_and_regex_skip_node_references() -> Result<()> {
    let qs: Store = Arc::new(MemStore::from_quads([
        Quad::new("alice", "name", Value::str("Alice Smith")),
        Quad::new("bob", "name", Value::str("Bob Smith")),
        Quad::new("smith", "name", Value::str("else")),
    ]));
    let got = scan_values(
        &qs,
        Path::start(Vec::<Value>::new()).out("name").wildcard("%Smith"),
    )?;
    assert_eq!(
        iri_set(&got),
        ["\"Alice Smith\"", "\"Bob Smith\""]
            .iter()
            .map(|s| s.to_string())
            .collect::<BTreeSet<_>>()
    );

    // The IRI <smith> never matches unless refs are allowed.
    let pattern = quarry::Pattern::new("mith")?;
    let without_refs = scan_values(
        &qs,
        Path::start(Vec::<Value>::new()).regex(pattern.clone()),
    )?;
    assert!(without_refs.iter().all(|v| !matches!(v, Value::Iri(_))));

    let with_refs = scan_values(
        &qs,
        Path::start(Vec::<Value>::new()).regex_with_refs(pattern),
    )?;
    assert!(with_refs.contains(&Value::iri("smith")));
    Ok(())
}

#[test]
fn optimized_and_unoptimized_trees_agree() -> Result<()> {
    let qs = social_graph();
    let shape = Path::start(["alice", "charlie"])
        .out("follows")
        .has_values("status", false, ["cool"])
        .tag(["who"])
        .shape()?;

    let mut raw = shape.build(&qs)?;
    let mut raw_results = iterator::scan(raw.as_mut(), &Default::default())?;
    raw.close();

    let mut optimized = quarry::build_cursor(&qs, &shape)?;
    let mut opt_results = iterator::scan(optimized.as_mut(), &Default::default())?;
    optimized.close();

    let key = |r: &iterator::ScanResult| {
        let mut tags: Vec<(String, Ref)> =
            r.tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        tags.sort();
        (r.value.clone(), tags)
    };
    let mut raw_keys: Vec<_> = raw_results.drain(..).map(|r| key(&r)).collect();
    let mut opt_keys: Vec<_> = opt_results.drain(..).map(|r| key(&r)).collect();
    raw_keys.sort();
    raw_keys.dedup();
    opt_keys.sort();
    opt_keys.dedup();
    assert_eq!(raw_keys, opt_keys);
    Ok(())
}

#[test]
fn cancellation_stops_a_scan_without_error() -> Result<()> {
    let qs = social_graph();
    let mut it = Path::start(Vec::<Value>::new()).build_on(&qs)?;
    let ctx = quarry::Cancellation::new();
    ctx.cancel();
    assert!(!it.next(&ctx));
    assert!(it.err().is_none());
    it.close();
    Ok(())
}

#[test]
fn page_composition_matches_a_single_slice() -> Result<()> {
    let qs = social_graph();
    let twice = scan_values(
        &qs,
        Path::start(Vec::<Value>::new())
            .has_values("status", false, ["cool"])
            .sort()
            .page(1, 2)
            .page(1, 1),
    )?;
    let once = scan_values(
        &qs,
        Path::start(Vec::<Value>::new())
            .has_values("status", false, ["cool"])
            .sort()
            .page(2, 1),
    )?;
    assert_eq!(twice, once);
    Ok(())
}

#[test]
fn morphism_via_another_path() -> Result<()> {
    let qs = social_graph();
    // "friend of a friend": reuse a sub-path as the predicate constraint.
    let via = Path::start(["follows"]);
    let got = scan_values(&qs, Path::start(["charlie"]).out(via).out("follows"))?;
    assert_eq!(iri_set(&got), iris(&["bob", "fred"]));
    Ok(())
}
