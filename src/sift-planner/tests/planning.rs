//! End-to-end planning through the standard pipeline.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{context, index, metadata, planner};
use common_config::{ExpansionConfig, SiftConfig};
use common_error::SiftError;
use sift_ast::marker::{find_instance, MarkerKind};
use sift_ast::{Node, ANY_FIELD};
use sift_metadata::memory::InMemoryIndex;
use sift_planner::executability::{Classifier, FieldIndexPolicy};
use sift_planner::{Executability, Planner, PlannerConfig};

fn plan(tree: Node) -> Node {
    planner().plan(tree).unwrap().tree
}

// =============================================================================
// Simplification
// =============================================================================

#[test]
fn test_subsumed_branch_is_dropped() {
    let a = Node::eq("A", "a");
    let tree = Node::or(vec![Node::and(vec![a.clone(), Node::eq("B", "b")]), a.clone()]);
    assert_eq!(plan(tree), a);
}

#[test]
fn test_negated_conjunction_becomes_disjunction() {
    let tree = Node::not(Node::and(vec![Node::eq("A", "a"), Node::eq("B", "b")]));
    assert_eq!(plan(tree).to_string(), "!(A == 'a') || !(B == 'b')");
}

#[test]
fn test_double_negation_cancels() {
    let tree = Node::not(Node::and(vec![Node::ne("A", "a"), Node::ne("B", "b")]));
    assert_eq!(plan(tree).to_string(), "A == 'a' || B == 'b'");
}

#[test]
fn test_bounded_range_survives_planning() {
    let range = Node::and(vec![Node::gt("F", 1), Node::lt("F", 10)]);
    let tree = Node::and(vec![Node::eq("A", "a"), range]);
    let planned = plan(tree.clone());
    assert_eq!(planned, tree);
    assert_eq!(planned.children().len(), 2);
}

// =============================================================================
// Expansion
// =============================================================================

#[test]
fn test_unfielded_term_expands_to_fields() {
    let planned = plan(Node::eq(ANY_FIELD, "x"));
    assert_eq!(planned.to_string(), "FIELD1 == 'x' || FIELD2 == 'x'");
}

#[test]
fn test_unmatched_query_is_rejected() {
    let err = planner().plan(Node::eq(ANY_FIELD, "nothing")).unwrap_err();
    assert!(matches!(err, SiftError::NoExpansionMatch { .. }));
    assert!(err.is_fatal());
    assert!(err.subtree().is_some_and(|s| s.contains("nothing")));
}

#[test]
fn test_partially_matched_query_survives() {
    let tree = Node::and(vec![Node::eq("A", "a"), Node::eq(ANY_FIELD, "nothing")]);
    let planned = plan(tree);
    assert!(planned.to_string().starts_with("A == 'a' && "));
}

fn reducing_planner() -> Planner {
    let config = SiftConfig::default().with_reduce_query(true);
    let ctx = context(config, Arc::new(metadata()), Arc::new(index()));
    Planner::standard(PlannerConfig::default(), &ctx).unwrap()
}

#[test]
fn test_reduced_partial_match_can_never_match() {
    let tree = Node::and(vec![Node::eq("A", "a"), Node::eq(ANY_FIELD, "nothing")]);
    let planned = reducing_planner().plan(tree).unwrap();
    assert_eq!(planned.tree, Node::Empty);
}

#[test]
fn test_reduced_disjunction_drops_unmatched_branch() {
    let tree = Node::or(vec![Node::eq("FIELD1", "x"), Node::eq(ANY_FIELD, "nothing")]);
    let planned = reducing_planner().plan(tree).unwrap();
    assert_eq!(planned.tree, Node::eq("FIELD1", "x"));
}

#[test]
fn test_malformed_regex_is_kept() {
    let tree = Node::er("FIELD1", "(x");
    assert_eq!(plan(tree.clone()), tree);
}

#[test]
fn test_lookup_timeout_aborts_planning() {
    let config = SiftConfig::default()
        .with_expansion(ExpansionConfig::default().with_lookup_timeout(Duration::from_millis(20)));
    let index = Arc::new(index().with_delay(Duration::from_millis(500)));
    let ctx = context(config, Arc::new(metadata()), index);
    let planner = Planner::standard(PlannerConfig::default(), &ctx).unwrap();

    let err = planner.plan(Node::eq(ANY_FIELD, "x")).unwrap_err();
    assert!(matches!(err, SiftError::LookupTimeout { .. }));
    assert!(err.is_fatal());
}

#[test]
fn test_index_outage_aborts_planning() {
    let index = Arc::new(index());
    index.set_available(false);
    let ctx = context(SiftConfig::default(), Arc::new(metadata()), index);
    let planner = Planner::standard(PlannerConfig::default(), &ctx).unwrap();

    let err = planner.plan(Node::eq(ANY_FIELD, "x")).unwrap_err();
    assert!(matches!(err, SiftError::BackingStoreUnavailable(_)));
}

#[test]
fn test_metadata_outage_aborts_planning() {
    let metadata = Arc::new(metadata());
    metadata.set_available(false);
    let ctx = context(SiftConfig::default(), metadata, Arc::new(InMemoryIndex::new()));
    let planner = Planner::standard(PlannerConfig::default(), &ctx).unwrap();

    let err = planner.plan(Node::eq("A", "a")).unwrap_err();
    assert!(matches!(err, SiftError::BackingStoreUnavailable(_)));
}

// =============================================================================
// Executability repair
// =============================================================================

#[test]
fn test_partial_disjunction_is_delayed() {
    let tree = Node::and(vec![
        Node::eq("INDEXED_FIELD", "a"),
        Node::or(vec![Node::eq("INDEXED_FIELD", "b"), Node::eq("EVENT_FIELD", "c")]),
    ]);
    let planned = plan(tree);
    assert_eq!(
        planned.to_string(),
        "INDEXED_FIELD == 'a' && ((_Delayed_ = true) && (INDEXED_FIELD == 'b' || EVENT_FIELD == 'c'))"
    );

    let policy = FieldIndexPolicy::fetch(&metadata(), &Default::default()).unwrap();
    let state = Classifier::new(&policy).classify(&planned).unwrap();
    assert_eq!(state, Executability::Executable);
}

#[test]
fn test_replanning_is_stable() {
    let tree = Node::and(vec![
        Node::eq("INDEXED_FIELD", "a"),
        Node::or(vec![Node::eq("INDEXED_FIELD", "b"), Node::eq("EVENT_FIELD", "c")]),
    ]);
    let planner = planner();
    let once = planner.plan(tree).unwrap().tree;
    let twice = planner.plan(once.clone()).unwrap().tree;
    assert_eq!(once, twice);
}

#[test]
fn test_needless_delay_is_pulled_up() {
    let delayed = sift_ast::marker::create(MarkerKind::Delayed, Node::eq("INDEXED_FIELD", "b"));
    let tree = Node::and(vec![Node::eq("EVENT_FIELD", "a"), delayed]);
    let planned = plan(tree);
    assert!(find_instance(&planned).is_none());
    assert_eq!(planned.to_string(), "EVENT_FIELD == 'a' && INDEXED_FIELD == 'b'");
}

// =============================================================================
// Ingest types
// =============================================================================

#[test]
fn test_disjoint_types_match_nothing() {
    let tree = Node::and(vec![Node::eq("A", "a"), Node::eq("C", "c")]);
    assert_eq!(plan(tree), Node::Empty);
}

#[test]
fn test_datatype_filter_prunes_branches() {
    let config = SiftConfig::default().with_datatype_filter(["T1"]);
    let ctx = context(config, Arc::new(metadata()), Arc::new(index()));
    let planner = Planner::standard(PlannerConfig::default(), &ctx).unwrap();

    let tree = Node::or(vec![Node::eq("A", "a"), Node::eq("C", "c")]);
    assert_eq!(planner.plan(tree).unwrap().tree, Node::eq("A", "a"));
}

// =============================================================================
// Tracing
// =============================================================================

#[test]
fn test_trace_names_changing_passes() {
    let ctx = context(SiftConfig::default(), Arc::new(metadata()), Arc::new(index()));
    let planner = Planner::standard(PlannerConfig::default().with_trace(true), &ctx).unwrap();
    let planned = planner.plan(Node::eq(ANY_FIELD, "x")).unwrap();

    assert!(planned.passes_applied >= 1);
    assert!(planned.trace.iter().any(|t| t.pass_name == "IndexExpansion"));
    assert!(planned.format_trace().contains("FIELD1 == 'x'"));
}

#[test]
fn test_standard_pipeline_order() {
    assert_eq!(
        planner().pass_names(),
        vec![
            "Flatten",
            "IndexExpansion",
            "LargeListPushdown",
            "NegationPushdown",
            "Subsumption",
            "Flatten",
            "DelayedPullup",
            "PartialPushdown",
            "IngestTypePruning",
        ]
    );
}

#[test]
fn test_reducing_pipeline_prunes_after_expansion() {
    let names = reducing_planner().pass_names();
    assert_eq!(names.len(), 10);
    assert_eq!(&names[1..3], ["IndexExpansion", "TruthPruning"]);
}
