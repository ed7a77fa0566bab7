//! Query planning for sift.
//!
//! `sift-planner` turns a parsed filter tree into the tree handed to physical
//! planning. The tree stays logically equivalent to the input while it is
//! normalized, simplified, expanded against the global index and repaired
//! until it can be answered from the index.
//!
//! # Overview
//!
//! - **Passes**: flattening, negation pushdown, subsumption, large list
//!   pushdown, ingest-type pruning ([`passes`])
//! - **Executability**: the four-state classification and the pullup and
//!   pushdown repairs built on it ([`executability`])
//! - **Expansion**: concurrent, memoized index lookups that replace
//!   unfielded, regex and range terms ([`expansion`])
//! - **Planner**: the ordered pipeline ([`Planner`])
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use sift_ast::{Node, ANY_FIELD};
//! use sift_metadata::memory::{FieldInfo, InMemoryIndex, InMemoryMetadata};
//! use sift_planner::{Planner, PlannerConfig, PlanningContext};
//!
//! let metadata = InMemoryMetadata::new()
//!     .with_field("FIELD1", FieldInfo::indexed(["T1"]))
//!     .with_field("FIELD2", FieldInfo::indexed(["T1"]));
//! let index = InMemoryIndex::new()
//!     .with_values("FIELD1", ["x"])
//!     .with_values("FIELD2", ["x"]);
//! let ctx = PlanningContext::new(Default::default(), Arc::new(metadata), Arc::new(index));
//!
//! let planner = Planner::standard(PlannerConfig::default(), &ctx).unwrap();
//! let planned = planner.plan(Node::eq(ANY_FIELD, "x")).unwrap();
//! assert_eq!(planned.tree.to_string(), "FIELD1 == 'x' || FIELD2 == 'x'");
//! ```

pub mod executability;
pub mod expansion;
pub mod passes;

pub use executability::{Classifier, Executability, ExecutabilityPolicy, FieldIndexPolicy};
pub use expansion::{ExpansionEngine, ExpansionStats, IndexExpansion};
pub use passes::{PlannedQuery, Planner, PlannerConfig, PlanningContext, RewritePass, Transformed};
