//! Truth pruning.
//!
//! Expansion renames unfielded terms the index knows nothing about to
//! `_NOFIELD_`. No record carries that field, so such a comparison has a
//! fixed truth value. This pass folds those values up the tree: a false
//! child empties its AND and drops out of its OR, a true child drops out of
//! its AND and settles its OR. A tree that can never match becomes
//! [`Node::Empty`].
//!
//! Markers are pruned inside their source, except ivarators and bounded
//! ranges which are kept whole.

use common_error::SiftResult;
use log::debug;
use sift_ast::marker::{create, find_instance};
use sift_ast::{JunctionKind, MarkerKind, Node, NO_FIELD};

use super::ingest::{absent_field, Pruned};
use super::pass::{RewritePass, Transformed};

fn reduce(node: &Node) -> Pruned {
    match node {
        Node::Leaf(leaf) if leaf.field == NO_FIELD && !leaf.is_assignment() => absent_field(leaf),
        Node::Leaf(_) | Node::Function(_) | Node::Future(_) => Pruned::Keep(node.clone()),
        Node::Empty => Pruned::Never,
        Node::Not(child) => match reduce(child) {
            Pruned::Keep(child) => Pruned::Keep(Node::not(child)),
            Pruned::Never => Pruned::Always,
            Pruned::Always => Pruned::Never,
        },
        Node::Group(child) => match reduce(child) {
            Pruned::Keep(child @ Node::Group(_)) => Pruned::Keep(child),
            Pruned::Keep(child) => Pruned::Keep(Node::group(child)),
            other => other,
        },
        Node::Junction(junction) => {
            if find_instance(node).is_some() {
                return reduce_marker(node);
            }
            let mut kept = Vec::with_capacity(junction.children.len());
            for child in &junction.children {
                match (junction.kind, reduce(child)) {
                    (_, Pruned::Keep(child)) => kept.push(child),
                    (JunctionKind::And, Pruned::Never) => {
                        debug!("Pruning {} to false", node);
                        return Pruned::Never;
                    }
                    (JunctionKind::Or, Pruned::Always) => {
                        debug!("Pruning {} to true", node);
                        return Pruned::Always;
                    }
                    _ => debug!("Pruning {} from {}", child, node),
                }
            }
            match (kept.len(), junction.kind) {
                (0, JunctionKind::And) => Pruned::Always,
                (0, JunctionKind::Or) => Pruned::Never,
                (1, _) => Pruned::Keep(kept.pop().unwrap_or_default()),
                _ => Pruned::Keep(Node::junction(junction.kind, kept)),
            }
        }
    }
}

fn reduce_marker(node: &Node) -> Pruned {
    let Some(instance) = find_instance(node) else {
        return Pruned::Keep(node.clone());
    };
    if instance.kind.is_ivarator() || instance.is(MarkerKind::BoundedRange) {
        return Pruned::Keep(node.clone());
    }
    let source = instance.source();
    match reduce(&source) {
        Pruned::Keep(pruned) if pruned == source => Pruned::Keep(node.clone()),
        Pruned::Keep(pruned) => Pruned::Keep(create(instance.kind, pruned)),
        other => other,
    }
}

/// Fold `_NOFIELD_` comparisons out of `tree`.
///
/// A tree that is always true is returned unchanged; one that is never true
/// becomes [`Node::Empty`].
pub fn prune_truth(tree: &Node) -> Node {
    match reduce(tree) {
        Pruned::Keep(pruned) => pruned,
        Pruned::Never => Node::Empty,
        Pruned::Always => tree.clone(),
    }
}

/// Truth pruning pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct TruthPruning;

impl RewritePass for TruthPruning {
    fn name(&self) -> &'static str {
        "TruthPruning"
    }

    fn description(&self) -> &'static str {
        "Remove branches whose truth is fixed by terms no field can satisfy"
    }

    fn apply(&self, tree: Node) -> SiftResult<Transformed> {
        let pruned = prune_truth(&tree);
        let changed = pruned != tree;
        if changed {
            debug!("Query before prune: {}\nQuery after prune: {}", tree, pruned);
        }
        Ok(Transformed::new(pruned, changed))
    }
}
