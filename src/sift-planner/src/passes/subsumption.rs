//! Conjunction/disjunction subsumption elimination.
//!
//! Removes children of a junction that are implied away by their siblings:
//!
//! - `(A && B) || A` becomes `A`
//! - `A && (A || B)` becomes `A`
//! - `((A || B) && C) || A || B` becomes `A || B`
//!
//! A child `c` of junction `J` is redundant when `c` has the opposite kind
//! and one of its terms `g` is already covered by the live siblings of `c`:
//! some sibling is equivalent to `g`, or `g` has the same kind as `J` and
//! every term of `g` has an equivalent sibling. Equivalence is decided by
//! canonical keys, memoized per junction.

use common_error::SiftResult;
use log::trace;
use sift_ast::marker::is_protected;
use sift_ast::{Junction, JunctionKind, KeyCache, MarkerInstance, Node, Rebuilder};

use super::pass::{RewritePass, Transformed};

/// Remove subsumed junction children throughout `tree`.
pub fn eliminate_subsumed(tree: &Node) -> SiftResult<Transformed> {
    let mut eliminator = Eliminator::default();
    let rebuilt = eliminator.rebuild(tree)?;
    Ok(Transformed::new(rebuilt, eliminator.removed > 0))
}

#[derive(Default)]
struct Eliminator {
    removed: usize,
}

impl Rebuilder for Eliminator {
    fn rebuild_junction(&mut self, junction: &Junction) -> SiftResult<Node> {
        let children = junction
            .children
            .iter()
            .map(|child| self.rebuild(child))
            .collect::<SiftResult<Vec<_>>>()?;
        Ok(self.remove_redundant(junction.kind, children))
    }

    // Markers are units; nothing inside them is compared or removed.
    fn rebuild_marker(&mut self, node: &Node, _instance: MarkerInstance<'_>) -> SiftResult<Node> {
        Ok(node.clone())
    }
}

impl Eliminator {
    fn remove_redundant(&mut self, kind: JunctionKind, children: Vec<Node>) -> Node {
        let keep = {
            let mut cache = KeyCache::new();
            let mut keep = vec![true; children.len()];
            for i in 0..children.len() {
                if is_redundant(i, kind, &children, &keep, &mut cache) {
                    trace!("Dropping subsumed {} term: {}", kind, children[i]);
                    keep[i] = false;
                }
            }
            keep
        };

        let removed = keep.iter().filter(|k| !**k).count();
        if removed == 0 {
            return Node::junction(kind, children);
        }
        self.removed += removed;

        let mut survivors: Vec<Node> = children
            .into_iter()
            .zip(keep)
            .filter_map(|(child, keep)| keep.then_some(child))
            .collect();
        if survivors.len() == 1 {
            survivors.pop().unwrap_or_default()
        } else {
            Node::junction(kind, survivors)
        }
    }
}

fn is_redundant<'a>(
    i: usize,
    kind: JunctionKind,
    children: &'a [Node],
    keep: &[bool],
    cache: &mut KeyCache<'a>,
) -> bool {
    let child = &children[i];
    if is_protected(child) {
        return false;
    }
    let inner = match child.as_junction() {
        Some(inner) if inner.kind == kind.flip() => inner,
        _ => return false,
    };

    let has_sibling = |term: &'a Node, cache: &mut KeyCache<'a>| {
        children
            .iter()
            .enumerate()
            .any(|(j, sibling)| j != i && keep[j] && cache.equivalent(sibling, term))
    };

    inner.children.iter().any(|grandchild| {
        let nested = grandchild
            .as_junction()
            .filter(|g| g.kind == kind && !is_protected(grandchild));
        has_sibling(grandchild, cache)
            || nested.is_some_and(|g| g.children.iter().all(|term| has_sibling(term, cache)))
    })
}

/// Subsumption elimination pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct Subsumption;

impl RewritePass for Subsumption {
    fn name(&self) -> &'static str {
        "Subsumption"
    }

    fn description(&self) -> &'static str {
        "Drop junction children that their siblings make redundant"
    }

    fn apply(&self, tree: Node) -> SiftResult<Transformed> {
        eliminate_subsumed(&tree)
    }
}

#[cfg(test)]
mod tests {
    use sift_ast::marker::{create, MarkerKind};
    use sift_ast::testing::{letters, truth_equivalent};

    use super::*;

    fn abc() -> (Node, Node, Node) {
        let mut atoms = letters(3).into_iter();
        (
            atoms.next().unwrap(),
            atoms.next().unwrap(),
            atoms.next().unwrap(),
        )
    }

    #[test]
    fn test_absorbs_conjunction_into_disjunction() {
        let (a, b, _) = abc();
        let tree = Node::or(vec![Node::and(vec![a.clone(), b]).grouped(), a.clone()]);
        let result = eliminate_subsumed(&tree).unwrap();
        assert!(result.changed);
        assert_eq!(result.tree, a);
        assert!(truth_equivalent(&tree, &result.tree));
    }

    #[test]
    fn test_absorbs_disjunction_into_conjunction() {
        let (a, b, _) = abc();
        let tree = Node::and(vec![a.clone(), Node::or(vec![b, a.clone()])]);
        let result = eliminate_subsumed(&tree).unwrap();
        assert_eq!(result.tree, a);
    }

    #[test]
    fn test_nested_same_kind_terms() {
        let (a, b, c) = abc();
        let tree = Node::or(vec![
            Node::and(vec![Node::or(vec![a.clone(), b.clone()]).grouped(), c]).grouped(),
            a,
            b,
        ]);
        let result = eliminate_subsumed(&tree).unwrap();
        assert_eq!(result.tree.to_string(), "A == 'a' || B == 'b'");
        assert!(truth_equivalent(&tree, &result.tree));
    }

    #[test]
    fn test_equivalence_ignores_order_and_groups() {
        let (a, b, c) = abc();
        let tree = Node::or(vec![
            Node::and(vec![Node::or(vec![b.clone(), a.clone()]).grouped(), c.clone()]),
            Node::or(vec![a, b]).grouped(),
        ]);
        let result = eliminate_subsumed(&tree).unwrap();
        assert!(result.changed);
        assert_eq!(result.tree.to_string(), "(A == 'a' || B == 'b')");
    }

    #[test]
    fn test_independent_terms_are_kept() {
        let (a, b, c) = abc();
        let tree = Node::or(vec![Node::and(vec![a, b]), c]);
        let result = eliminate_subsumed(&tree).unwrap();
        assert!(!result.changed);
        assert_eq!(result.tree, tree);
    }

    #[test]
    fn test_markers_are_units() {
        let (a, b, _) = abc();
        let marker = create(
            MarkerKind::Delayed,
            Node::or(vec![Node::and(vec![a.clone(), b]), a.clone()]),
        );
        let tree = Node::or(vec![marker.clone(), a]);
        let result = eliminate_subsumed(&tree).unwrap();
        assert!(!result.changed);
        assert_eq!(result.tree, tree);
    }
}
