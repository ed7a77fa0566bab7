//! Rewrite passes over query trees.
//!
//! Every pass takes the tree by value and returns the tree the next pass
//! works on, together with whether anything changed.
//!
//! # Pass Categories
//!
//! - **Normalization**: junction flattening and grouping removal
//! - **Boolean simplification**: negation pushdown, subsumption elimination
//! - **Executability repair**: delayed-marker pullup, partial pushdown
//! - **Index-driven rewrites**: large list pushdown, truth pruning, ingest-type pruning
//!
//! # Rewrite Safety
//!
//! A pass must leave the set of matching records unchanged. The one
//! deliberate exception is ingest-type pruning, which drops branches no
//! ingest type in scope can satisfy.

mod flatten;
mod ingest;
mod large_lists;
mod negation;
mod pass;
mod planner;
mod pullup;
mod pushdown;
mod subsumption;
mod truth;

pub use flatten::{flatten, flatten_with, Flatten};
pub use ingest::{prune_ingest_types, IngestTypePruning, IngestTyper, IngestTypes};
pub use large_lists::{push_down_large_lists, LargeListPushdown};
pub use negation::{push_negations, NegationPushdown};
pub use pass::{PassTrace, PlannedQuery, RewritePass, Transformed};
pub use planner::{Planner, PlannerConfig, PlanningContext};
pub use pullup::{pull_up, DelayedPullup};
pub use pushdown::{push_down, PartialPushdown};
pub use subsumption::{eliminate_subsumed, Subsumption};
pub use truth::{prune_truth, TruthPruning};
