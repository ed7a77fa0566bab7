//! Negation pushdown.
//!
//! Negations are pushed towards the leaves with De Morgan's law until they
//! only wrap a comparison, a function, a bounded range or a marker. A pending
//! negation that meets another one cancels out; `!=` and `!~` under a pending
//! negation become `==` and `=~`.
//!
//! The rewrite assumes a flattened tree and flattens its own output, so the
//! pass runs [`flatten`](super::flatten::flatten) on both sides.

use common_error::SiftResult;
use sift_ast::marker::{is_marker, is_protected};
use sift_ast::visit::replace_slot;
use sift_ast::{Leaf, Node};

use super::flatten::{flatten, flatten_with};
use super::pass::{RewritePass, Transformed};

/// Push every negation in `tree` as far down as it can go.
///
/// The input should already be flattened.
pub fn push_negations(tree: Node) -> Node {
    push(tree, false)
}

fn push(node: Node, negated: bool) -> Node {
    if is_protected(&node) {
        return push_protected(node, negated);
    }

    match node {
        Node::Not(child) => push(*child, !negated),
        Node::Group(child) => Node::group(push(*child, negated)),
        Node::Junction(junction) => {
            let kind = if negated {
                junction.kind.flip()
            } else {
                junction.kind
            };
            let children = junction
                .children
                .into_iter()
                .map(|child| push(child, negated))
                .collect();
            Node::junction(kind, children)
        }
        Node::Leaf(leaf) if negated => match leaf.op.positive() {
            Some(op) => Node::Leaf(Leaf { op, ..leaf }),
            None => Node::not(Node::Leaf(leaf)),
        },
        other if negated => Node::not(other),
        other => other,
    }
}

/// Markers and bounded ranges stop a pending negation. A marker's source is
/// still normalized on its own.
fn push_protected(node: Node, negated: bool) -> Node {
    let node = if is_marker(&node) {
        push_into_marker(node)
    } else {
        node
    };
    if negated {
        Node::not(node)
    } else {
        node
    }
}

fn push_into_marker(node: Node) -> Node {
    match node {
        Node::Group(inner) => Node::group(push_into_marker(*inner)),
        Node::Junction(mut junction) => {
            for source in junction.children.iter_mut().skip(1) {
                replace_slot(source, |source| push(source, false));
            }
            Node::Junction(junction)
        }
        other => other,
    }
}

/// Negation pushdown pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct NegationPushdown;

impl RewritePass for NegationPushdown {
    fn name(&self) -> &'static str {
        "NegationPushdown"
    }

    fn description(&self) -> &'static str {
        "Apply De Morgan's law until negations only wrap leaves, functions and markers"
    }

    fn apply(&self, tree: Node) -> SiftResult<Transformed> {
        let before = flatten_with(tree, true);
        let after = flatten(push_negations(before.tree.clone()));
        let changed = before.changed || after != before.tree;
        Ok(Transformed::new(after, changed))
    }
}
