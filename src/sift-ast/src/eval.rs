//! Truth evaluation against an oracle for atomic predicates.

use crate::node::{CompareOp, Function, JunctionKind, Leaf, Node};

/// Decides the truth of atomic predicates.
pub trait Oracle {
    /// Truth of a positive comparison. Never called with `!=` or `!~`.
    fn leaf(&self, leaf: &Leaf) -> bool;

    /// Truth of a function call. Functions are false by default.
    fn function(&self, _func: &Function) -> bool {
        false
    }
}

impl<F> Oracle for F
where
    F: Fn(&Leaf) -> bool,
{
    fn leaf(&self, leaf: &Leaf) -> bool {
        self(leaf)
    }
}

/// Evaluate `node` under `oracle`.
///
/// `!=` and `!~` are evaluated as the negation of their positive form, so an
/// oracle only ever decides `==`, `=~` and the ordering comparisons. Marker
/// sentinels are true; pending placeholders evaluate their original node.
pub fn evaluate<O: Oracle + ?Sized>(node: &Node, oracle: &O) -> bool {
    match node {
        Node::Leaf(leaf) => evaluate_leaf(leaf, oracle),
        Node::Function(func) => oracle.function(func),
        Node::Junction(junction) => match junction.kind {
            JunctionKind::And => junction.children.iter().all(|c| evaluate(c, oracle)),
            JunctionKind::Or => junction.children.iter().any(|c| evaluate(c, oracle)),
        },
        Node::Not(child) => !evaluate(child, oracle),
        Node::Group(child) => evaluate(child, oracle),
        Node::Future(future) => match &future.resolved {
            Some(resolved) => evaluate(resolved, oracle),
            None => evaluate(&future.original, oracle),
        },
        Node::Empty => false,
    }
}

fn evaluate_leaf<O: Oracle + ?Sized>(leaf: &Leaf, oracle: &O) -> bool {
    match leaf.op {
        CompareOp::Assign => true,
        op => match op.positive() {
            Some(positive) => !oracle.leaf(&Leaf {
                field: leaf.field.clone(),
                op: positive,
                literal: leaf.literal.clone(),
            }),
            None => oracle.leaf(leaf),
        },
    }
}
