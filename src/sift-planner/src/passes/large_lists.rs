//! Large value list pushdown.
//!
//! An OR holding more `==` comparisons against one field than the configured
//! threshold is handed to record evaluation as a single `ExceededOr` marker
//! instead of being looked up term by term. Comparisons on other fields stay
//! where they are.

use std::collections::BTreeMap;

use common_error::SiftResult;
use log::debug;
use sift_ast::marker::{create, is_marker};
use sift_ast::visit::{replace_slot, walk_mut};
use sift_ast::{CompareOp, JunctionKind, MarkerKind, MutVisitor, Node};

use super::pass::{RewritePass, Transformed};

/// Wrap every oversized single-field value list of `tree` in an
/// `ExceededOr` marker. Returns the number of markers added.
pub fn push_down_large_lists(tree: &mut Node, threshold: usize) -> SiftResult<usize> {
    let mut pusher = ListPusher {
        threshold,
        marked: 0,
    };
    pusher.visit_mut(tree)?;
    Ok(pusher.marked)
}

struct ListPusher {
    threshold: usize,
    marked: usize,
}

/// The field of a list member, if the node is one.
fn list_field(node: &Node) -> Option<&str> {
    match node.peel() {
        Node::Leaf(leaf) if leaf.op == CompareOp::Eq && !leaf.is_unfielded() && !leaf.is_no_field() => {
            Some(&leaf.field)
        }
        _ => None,
    }
}

impl ListPusher {
    fn oversized_fields(&self, children: &[Node]) -> Vec<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for field in children.iter().filter_map(list_field) {
            *counts.entry(field).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, count)| *count > self.threshold)
            .map(|(field, _)| field.to_string())
            .collect()
    }

    fn split(&mut self, children: Vec<Node>, fields: &[String]) -> Node {
        let mut lists: BTreeMap<&str, Vec<Node>> = BTreeMap::new();
        let mut rest = Vec::new();
        for child in children {
            match list_field(&child).and_then(|f| fields.iter().find(|x| *x == f)) {
                Some(field) => lists.entry(field.as_str()).or_default().push(child),
                None => rest.push(child),
            }
        }

        for (field, members) in lists {
            debug!(
                "Marking {} values of {} as an exceeded list",
                members.len(),
                field
            );
            self.marked += 1;
            rest.push(create(MarkerKind::ExceededOr, Node::or(members)));
        }

        if rest.len() == 1 {
            rest.pop().unwrap_or_default()
        } else {
            Node::or(rest)
        }
    }
}

impl MutVisitor for ListPusher {
    fn visit_mut(&mut self, node: &mut Node) -> SiftResult<()> {
        if is_marker(node) {
            return Ok(());
        }
        if let Node::Junction(junction) = node {
            if junction.kind == JunctionKind::Or {
                let fields = self.oversized_fields(&junction.children);
                if !fields.is_empty() {
                    replace_slot(node, |or| match or {
                        Node::Junction(junction) => self.split(junction.children, &fields),
                        other => other,
                    });
                    return Ok(());
                }
            }
        }
        walk_mut(self, node)
    }
}

/// Large list pushdown pass.
#[derive(Debug, Clone, Copy)]
pub struct LargeListPushdown {
    threshold: usize,
}

impl LargeListPushdown {
    /// Mark lists with more than `threshold` values.
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }
}

impl RewritePass for LargeListPushdown {
    fn name(&self) -> &'static str {
        "LargeListPushdown"
    }

    fn description(&self) -> &'static str {
        "Mark oversized single-field value lists for record evaluation"
    }

    fn apply(&self, mut tree: Node) -> SiftResult<Transformed> {
        let marked = push_down_large_lists(&mut tree, self.threshold)?;
        Ok(Transformed::new(tree, marked > 0))
    }
}

#[cfg(test)]
mod tests {
    use sift_ast::marker::find_instance;

    use super::*;

    fn list(field: &str, n: usize) -> Vec<Node> {
        (0..n).map(|i| Node::eq(field, i.to_string())).collect()
    }

    #[test]
    fn test_single_field_list_is_marked() {
        let tree = Node::or(list("F", 4));
        let result = LargeListPushdown::new(3).apply(tree).unwrap();
        assert!(result.changed);
        let instance = find_instance(&result.tree).unwrap();
        assert!(instance.is(MarkerKind::ExceededOr));
        assert_eq!(instance.source().children().len(), 4);
    }

    #[test]
    fn test_small_list_is_kept() {
        let tree = Node::or(list("F", 3));
        let result = LargeListPushdown::new(3).apply(tree.clone()).unwrap();
        assert!(!result.changed);
        assert_eq!(result.tree, tree);
    }

    #[test]
    fn test_other_terms_stay_beside_the_marker() {
        let mut children = list("F", 3);
        children.push(Node::eq("G", "x"));
        let tree = Node::and(vec![Node::eq("A", "a"), Node::or(children)]);
        let result = LargeListPushdown::new(2).apply(tree).unwrap();
        assert_eq!(
            result.tree.to_string(),
            "A == 'a' && (G == 'x' || ((_List_ = true) && (F == '0' || F == '1' || F == '2')))"
        );
    }

    #[test]
    fn test_unfielded_terms_are_not_lists() {
        let tree = Node::or(list(sift_ast::ANY_FIELD, 5));
        let result = LargeListPushdown::new(2).apply(tree).unwrap();
        assert!(!result.changed);
    }
}
