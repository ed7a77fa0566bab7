//! Shared fixtures for sift-planner integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use common_config::SiftConfig;
use proptest::prelude::*;
use sift_ast::marker::{create, MarkerKind};
use sift_ast::{CompareOp, Literal, Node};
use sift_metadata::memory::{FieldInfo, InMemoryIndex, InMemoryMetadata};
use sift_planner::{Planner, PlannerConfig, PlanningContext};

// =============================================================================
// Collaborators
// =============================================================================

/// Ingest types per field used by the typed fixtures.
pub fn field_types() -> BTreeMap<&'static str, Vec<&'static str>> {
    BTreeMap::from([
        ("A", vec!["T1", "T2"]),
        ("B", vec!["T2", "T3"]),
        ("C", vec!["T3"]),
    ])
}

/// Metadata over the typed fields plus the executability fixtures.
pub fn metadata() -> InMemoryMetadata {
    let mut metadata = InMemoryMetadata::new()
        .with_field("INDEXED_FIELD", FieldInfo::indexed(["T1"]))
        .with_field("INDEX_ONLY_FIELD", FieldInfo::indexed(["T1"]).index_only())
        .with_field("EVENT_FIELD", FieldInfo::unindexed(["T1"]))
        .with_field("FIELD1", FieldInfo::indexed(["T1"]))
        .with_field("FIELD2", FieldInfo::indexed(["T1"]))
        .with_field("F", FieldInfo::unindexed(["T1"]));
    for (field, types) in field_types() {
        metadata = metadata.with_field(field, FieldInfo::indexed(types));
    }
    metadata
}

/// Index holding `'x'` under `FIELD1` and `FIELD2`.
pub fn index() -> InMemoryIndex {
    InMemoryIndex::new()
        .with_values("FIELD1", ["x", "xa", "xb"])
        .with_values("FIELD2", ["x"])
}

/// A planning context over the given collaborators.
pub fn context(
    config: SiftConfig,
    metadata: Arc<InMemoryMetadata>,
    index: Arc<InMemoryIndex>,
) -> PlanningContext {
    PlanningContext::new(config, metadata, index)
}

/// The standard planner over the default fixtures.
pub fn planner() -> Planner {
    let ctx = context(
        SiftConfig::default(),
        Arc::new(metadata()),
        Arc::new(index()),
    );
    Planner::standard(PlannerConfig::default(), &ctx).unwrap()
}

// =============================================================================
// Arbitrary Strategies for Node
// =============================================================================

/// Strategy for leaves over `A`, `B` and `C` with one literal.
pub fn arb_leaf() -> impl Strategy<Value = Node> {
    let field = prop_oneof![Just("A"), Just("B"), Just("C")];
    let op = prop_oneof![
        Just(CompareOp::Eq),
        Just(CompareOp::Ne),
        Just(CompareOp::Er),
        Just(CompareOp::Nr),
        Just(CompareOp::Gt),
    ];
    (field, op).prop_map(|(field, op)| Node::leaf(field, op, Literal::from("x")))
}

/// Strategy for markers that rewrites may look into.
pub fn arb_marker_kind() -> impl Strategy<Value = MarkerKind> {
    prop_oneof![
        Just(MarkerKind::Delayed),
        Just(MarkerKind::EvaluationOnly),
        Just(MarkerKind::ExceededValue),
    ]
}

/// Strategy for trees of bounded depth without markers.
pub fn arb_plain_tree() -> impl Strategy<Value = Node> {
    arb_leaf().prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(Node::and),
            prop::collection::vec(inner.clone(), 1..4).prop_map(Node::or),
            inner.clone().prop_map(Node::not),
            inner.prop_map(Node::group),
        ]
    })
}

/// Strategy for trees of bounded depth, markers included.
pub fn arb_tree() -> impl Strategy<Value = Node> {
    arb_leaf().prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(Node::and),
            prop::collection::vec(inner.clone(), 1..4).prop_map(Node::or),
            inner.clone().prop_map(Node::not),
            inner.clone().prop_map(Node::group),
            (arb_marker_kind(), inner).prop_map(|(kind, source)| create(kind, source)),
        ]
    })
}
