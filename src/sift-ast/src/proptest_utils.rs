//! Property-based tests for the tree model.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::canonical::{canonical_form, canonical_key, equivalent};
    use crate::marker::{create, MarkerKind};
    use crate::node::{CompareOp, Literal, Node};
    use crate::testing::truth_equivalent;

    // =========================================================================
    // Arbitrary Strategies for Node
    // =========================================================================

    /// Strategy for leaves over a small alphabet so truth tables stay small.
    fn arb_leaf() -> impl Strategy<Value = Node> {
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

    fn arb_marker_kind() -> impl Strategy<Value = MarkerKind> {
        prop_oneof![
            Just(MarkerKind::Delayed),
            Just(MarkerKind::EvaluationOnly),
            Just(MarkerKind::IndexHole),
        ]
    }

    /// Strategy for trees of bounded depth.
    fn arb_node() -> impl Strategy<Value = Node> {
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

    fn reverse_children(node: &Node) -> Node {
        match node {
            Node::Junction(junction) if crate::marker::find_instance(node).is_none() => {
                Node::junction(
                    junction.kind,
                    junction.children.iter().rev().map(reverse_children).collect(),
                )
            }
            Node::Junction(junction) => Node::junction(
                junction.kind,
                junction.children.iter().map(reverse_children).collect(),
            ),
            Node::Not(child) => Node::not(reverse_children(child)),
            Node::Group(child) => Node::group(reverse_children(child)),
            other => other.clone(),
        }
    }

    // =========================================================================
    // Properties
    // =========================================================================

    proptest! {
        #[test]
        fn prop_canonical_form_is_idempotent(tree in arb_node()) {
            let once = canonical_form(&tree);
            prop_assert_eq!(canonical_key(&once), once.to_string());
        }

        #[test]
        fn prop_canonical_form_preserves_truth(tree in arb_node()) {
            prop_assert!(truth_equivalent(&tree, &canonical_form(&tree)));
        }

        #[test]
        fn prop_grouping_is_transparent(tree in arb_node()) {
            prop_assert!(equivalent(&tree, &tree.clone().grouped()));
        }

        #[test]
        fn prop_child_order_is_transparent(tree in arb_node()) {
            prop_assert!(equivalent(&tree, &reverse_children(&tree)));
        }

        #[test]
        fn prop_json_roundtrip(tree in arb_node()) {
            let json = serde_json::to_string(&tree).unwrap();
            let back: Node = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back, tree);
        }
    }
}
