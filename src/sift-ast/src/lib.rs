//! Query tree model for sift.
//!
//! `sift-ast` provides the owned expression tree that every planning pass
//! consumes and produces, together with the machinery the passes share.
//!
//! # Overview
//!
//! - **Nodes**: comparisons, function calls, AND/OR junctions, negations,
//!   groupings and expansion placeholders ([`Node`])
//! - **Markers**: structural tags that attach planning metadata to a subtree
//!   without leaving the expression grammar ([`marker`])
//! - **Canonical form**: the single definition of structural equivalence
//!   ([`canonical_key`], [`equivalent`])
//! - **Traversal**: read-only, rebuilding and in-place visitors ([`visit`])
//! - **Evaluation**: truth of a tree under an oracle for its atoms ([`evaluate`])
//!
//! # Example
//!
//! ```rust
//! use sift_ast::{marker, MarkerKind, Node};
//!
//! let tree = Node::eq("A", "a").and_with(marker::create(
//!     MarkerKind::Delayed,
//!     Node::eq("B", "b").or_with(Node::eq("C", "c")),
//! ));
//! assert_eq!(
//!     tree.to_string(),
//!     "A == 'a' && ((_Delayed_ = true) && (B == 'b' || C == 'c'))"
//! );
//! ```

mod canonical;
mod display;
mod eval;
pub mod marker;
mod node;
pub mod testing;
pub mod visit;

#[cfg(test)]
mod proptest_utils;

pub use canonical::{canonical_form, canonical_key, equivalent, KeyCache};
pub use eval::{evaluate, Oracle};
pub use marker::{MarkerInstance, MarkerKind, RangeBounds};
pub use node::{
    CompareOp, Function, FunctionArg, FutureNode, Junction, JunctionKind, Leaf, Literal, Node,
    ANY_FIELD, NO_FIELD,
};
pub use visit::{MutVisitor, Rebuilder, Visitor};
