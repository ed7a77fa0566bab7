//! Expansion against a custom index implementation.

mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::metadata;
use common_config::{ExpansionConfig, SiftConfig};
use sift_ast::marker::{create, MarkerKind};
use sift_ast::{Node, ANY_FIELD};
use sift_metadata::memory::FieldInfo;
use sift_metadata::{IndexLookupService, IndexMatches, LookupError, LookupTerm, RangeBound};
use sift_planner::{Planner, PlannerConfig, PlanningContext};

/// Answers every lookup with a fixed result and records what was asked.
struct RecordingIndex {
    answer: IndexMatches,
    seen: Mutex<Vec<LookupTerm>>,
}

impl RecordingIndex {
    fn new(answer: IndexMatches) -> Self {
        Self {
            answer,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen(&self) -> Vec<LookupTerm> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl IndexLookupService for RecordingIndex {
    async fn lookup(&self, term: &LookupTerm) -> Result<IndexMatches, LookupError> {
        self.seen.lock().unwrap().push(term.clone());
        Ok(self.answer.clone())
    }
}

fn planner_over(index: Arc<RecordingIndex>, config: SiftConfig) -> Planner {
    let metadata = metadata().with_field("NUM", FieldInfo::indexed(["T1"]));
    let ctx = PlanningContext::new(config, Arc::new(metadata), index);
    Planner::standard(PlannerConfig::default(), &ctx).unwrap()
}

#[test]
fn test_bounded_range_is_looked_up_with_its_bounds() {
    let index = Arc::new(RecordingIndex::new(
        IndexMatches::new().with_field("NUM", ["12"]),
    ));
    let config = SiftConfig::default()
        .with_expansion(ExpansionConfig::default().with_keep_original_terms(false));
    let planner = planner_over(index.clone(), config);

    let range = Node::and(vec![Node::ge("NUM", 5), Node::lt("NUM", 20)]);
    let planned = planner
        .plan(create(MarkerKind::BoundedRange, range))
        .unwrap();

    assert_eq!(planned.tree, Node::eq("NUM", "12"));
    assert_eq!(
        index.seen(),
        vec![LookupTerm::Range {
            field: "NUM".to_string(),
            lower: RangeBound::inclusive(5),
            upper: RangeBound::exclusive(20),
        }]
    );
}

#[test]
fn test_negated_unfielded_terms_are_opt_in() {
    let answer = IndexMatches::new().with_field("FIELD1", ["x"]);

    let index = Arc::new(RecordingIndex::new(answer.clone()));
    let planner = planner_over(index.clone(), SiftConfig::default());
    let tree = Node::and(vec![Node::eq("A", "a"), Node::ne(ANY_FIELD, "x")]);
    planner.plan(tree.clone()).unwrap();
    assert!(index.seen().is_empty());

    let index = Arc::new(RecordingIndex::new(answer));
    let config = SiftConfig::default()
        .with_expansion(ExpansionConfig::default().with_unfielded_negations(true));
    let planner = planner_over(index.clone(), config);
    let planned = planner.plan(tree).unwrap();
    assert_eq!(index.seen().len(), 1);
    assert_eq!(planned.tree.to_string(), "A == 'a' && FIELD1 != 'x'");
}

#[test]
fn test_unfielded_regex_is_sent_as_pattern() {
    let index = Arc::new(RecordingIndex::new(
        IndexMatches::new().with_field("FIELD1", ["xa", "xb"]),
    ));
    let planner = planner_over(index.clone(), SiftConfig::default());
    let planned = planner.plan(Node::er(ANY_FIELD, "x.*")).unwrap();

    assert_eq!(
        index.seen(),
        vec![LookupTerm::Unfielded {
            value: "x.*".to_string(),
            regex: true,
        }]
    );
    assert_eq!(planned.tree.to_string(), "FIELD1 == 'xa' || FIELD1 == 'xb'");
}

#[test]
fn test_plain_range_conjunction_is_expanded() {
    let index = Arc::new(RecordingIndex::new(
        IndexMatches::new().with_field("NUM", ["12"]),
    ));
    let config = SiftConfig::default()
        .with_expansion(ExpansionConfig::default().with_keep_original_terms(false));
    let planner = planner_over(index.clone(), config);

    let planned = planner
        .plan(Node::and(vec![Node::ge("NUM", 5), Node::lt("NUM", 20)]))
        .unwrap();

    assert_eq!(planned.tree, Node::eq("NUM", "12"));
    assert_eq!(
        index.seen(),
        vec![LookupTerm::Range {
            field: "NUM".to_string(),
            lower: RangeBound::inclusive(5),
            upper: RangeBound::exclusive(20),
        }]
    );
}

#[test]
fn test_range_bounds_split_by_other_terms_are_expanded() {
    let index = Arc::new(RecordingIndex::new(
        IndexMatches::new().with_field("NUM", ["12"]),
    ));
    let config = SiftConfig::default()
        .with_expansion(ExpansionConfig::default().with_keep_original_terms(false));
    let planner = planner_over(index.clone(), config);

    let tree = Node::and(vec![
        Node::ge("NUM", 5),
        Node::eq("A", "a"),
        Node::lt("NUM", 20),
    ]);
    let planned = planner.plan(tree).unwrap();

    assert_eq!(index.seen().len(), 1);
    assert!(matches!(index.seen()[0], LookupTerm::Range { .. }));
    let rendered = planned.tree.to_string();
    assert!(rendered.contains("NUM == '12'"), "{rendered}");
    assert!(!rendered.contains(">="), "{rendered}");
}

#[test]
fn test_both_polarities_of_a_term_share_one_lookup() {
    let index = Arc::new(RecordingIndex::new(
        IndexMatches::new().with_field("FIELD1", ["x"]),
    ));
    let config = SiftConfig::default()
        .with_expansion(ExpansionConfig::default().with_unfielded_negations(true));
    let planner = planner_over(index.clone(), config);

    let tree = Node::and(vec![Node::eq(ANY_FIELD, "x"), Node::ne(ANY_FIELD, "x")]);
    planner.plan(tree).unwrap();

    assert_eq!(
        index.seen(),
        vec![LookupTerm::Unfielded {
            value: "x".to_string(),
            regex: false,
        }]
    );
}
