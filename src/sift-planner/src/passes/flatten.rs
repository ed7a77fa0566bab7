//! Junction flattening and grouping removal.
//!
//! Nested AND-under-AND and OR-under-OR are merged into a single n-ary
//! junction, single-child junctions collapse into their child, and grouping
//! wrappers are dropped where they carry no meaning. Markers and bounded
//! ranges are rebuilt as units: their children are flattened but never merged
//! into them, and they are never merged into their parent.
//!
//! The traversal is iterative so arbitrarily deep trees cannot overflow the
//! stack.

use common_error::SiftResult;
use sift_ast::marker::{is_marker, is_protected};
use sift_ast::{JunctionKind, Node};

use super::pass::{RewritePass, Transformed};

/// Flatten `tree`, removing redundant groupings.
pub fn flatten(tree: Node) -> Node {
    flatten_with(tree, true).tree
}

/// Flatten `tree`. Groupings are only removed when `remove_groups` is set.
pub fn flatten_with(tree: Node, remove_groups: bool) -> Transformed {
    let mut folder = Folder {
        remove_groups,
        changed: false,
        values: Vec::new(),
    };
    for shell in post_order(tree) {
        let node = folder.fold(shell);
        folder.values.push(node);
    }
    let tree = folder.values.pop().unwrap_or_default();
    Transformed::new(tree, folder.changed)
}

// ============================================================================
// Phase 1: post-order decomposition
// ============================================================================

/// A node with its children detached.
enum Shell {
    /// A node with no children to flatten.
    Atom(Node),
    Junction {
        kind: JunctionKind,
        arity: usize,
        protected: bool,
    },
    Not,
    /// `pinned` groups survive regardless of `remove_groups`.
    Group { pinned: bool },
}

#[derive(Clone, Copy)]
enum Parent {
    Root,
    Not,
    Group,
    Junction { protected: bool },
}

enum Frame {
    Enter(Node, Parent),
    Exit(Shell),
}

fn post_order(tree: Node) -> Vec<Shell> {
    let mut out = Vec::new();
    let mut stack = vec![Frame::Enter(tree, Parent::Root)];

    while let Some(frame) = stack.pop() {
        let (node, parent) = match frame {
            Frame::Exit(shell) => {
                out.push(shell);
                continue;
            }
            Frame::Enter(node, parent) => (node, parent),
        };

        let protected = matches!(node, Node::Junction(_)) && is_protected(&node);
        match node {
            Node::Junction(junction) => {
                stack.push(Frame::Exit(Shell::Junction {
                    kind: junction.kind,
                    arity: junction.children.len(),
                    protected,
                }));
                for child in junction.children.into_iter().rev() {
                    stack.push(Frame::Enter(child, Parent::Junction { protected }));
                }
            }
            Node::Not(child) => {
                stack.push(Frame::Exit(Shell::Not));
                stack.push(Frame::Enter(*child, Parent::Not));
            }
            Node::Group(child) => {
                let pinned = matches!(parent, Parent::Not | Parent::Junction { protected: true });
                stack.push(Frame::Exit(Shell::Group { pinned }));
                stack.push(Frame::Enter(*child, Parent::Group));
            }
            atom => out.push(Shell::Atom(atom)),
        }
    }

    out
}

// ============================================================================
// Phase 2: bottom-up fold
// ============================================================================

struct Folder {
    remove_groups: bool,
    changed: bool,
    values: Vec<Node>,
}

impl Folder {
    fn fold(&mut self, shell: Shell) -> Node {
        match shell {
            Shell::Atom(node) => node,
            Shell::Not => Node::not(self.pop()),
            Shell::Group { pinned } => self.regroup(pinned),
            Shell::Junction {
                kind,
                arity,
                protected,
            } => {
                let at = self.values.len().saturating_sub(arity);
                let children = self.values.split_off(at);
                if protected {
                    Node::junction(kind, children)
                } else {
                    self.merge(kind, children)
                }
            }
        }
    }

    fn pop(&mut self) -> Node {
        self.values.pop().unwrap_or_default()
    }

    fn regroup(&mut self, pinned: bool) -> Node {
        let child = self.pop();
        if matches!(child, Node::Group(_)) {
            self.changed = true;
            return child;
        }
        if !self.remove_groups || pinned || child.is_assignment() || is_marker(&child) {
            Node::group(child)
        } else {
            self.changed = true;
            child
        }
    }

    fn merge(&mut self, kind: JunctionKind, children: Vec<Node>) -> Node {
        let mut merged = Vec::with_capacity(children.len());
        for child in children {
            if child.is_junction_of(kind) && !is_protected(&child) {
                if let Node::Junction(inner) = child.into_peeled() {
                    merged.extend(inner.children);
                }
                self.changed = true;
            } else {
                merged.push(child);
            }
        }

        if merged.len() == 1 {
            self.changed = true;
            merged.pop().unwrap_or_default()
        } else {
            Node::junction(kind, merged)
        }
    }
}

// ============================================================================
// Pass
// ============================================================================

/// Pass wrapper around [`flatten_with`].
#[derive(Debug, Clone, Copy)]
pub struct Flatten {
    /// Drop groupings that carry no meaning.
    pub remove_groups: bool,
}

impl Default for Flatten {
    fn default() -> Self {
        Self {
            remove_groups: true,
        }
    }
}

impl RewritePass for Flatten {
    fn name(&self) -> &'static str {
        "Flatten"
    }

    fn description(&self) -> &'static str {
        "Merge nested junctions of the same kind and drop redundant groupings"
    }

    fn apply(&self, tree: Node) -> SiftResult<Transformed> {
        Ok(flatten_with(tree, self.remove_groups))
    }
}

#[cfg(test)]
mod tests {
    use sift_ast::marker::{create, find_instance, MarkerKind};

    use super::*;

    fn a() -> Node {
        Node::eq("A", "a")
    }

    fn b() -> Node {
        Node::eq("B", "b")
    }

    fn c() -> Node {
        Node::eq("C", "c")
    }

    #[test]
    fn test_merges_same_kind() {
        let tree = Node::and(vec![a(), Node::and(vec![b(), c()]).grouped()]);
        let result = flatten_with(tree, true);
        assert!(result.changed);
        assert_eq!(result.tree.to_string(), "A == 'a' && B == 'b' && C == 'c'");
    }

    #[test]
    fn test_keeps_opposite_kind() {
        let tree = Node::and(vec![a(), Node::or(vec![b(), c()])]);
        let result = flatten_with(tree.clone(), true);
        assert!(!result.changed);
        assert_eq!(result.tree, tree);
    }

    #[test]
    fn test_single_child_collapses() {
        let tree = Node::or(vec![Node::and(vec![a()])]);
        assert_eq!(flatten(tree), a());
    }

    #[test]
    fn test_bounded_range_stays_whole() {
        let range = Node::and(vec![Node::gt("F", 1), Node::lt("F", 10)]);
        let tree = Node::and(vec![a(), range.clone().grouped()]);
        let flat = flatten(tree);
        assert_eq!(flat.to_string(), "A == 'a' && (F > 1 && F < 10)");
        assert_eq!(flat.children()[1], range);
    }

    #[test]
    fn test_marker_keeps_its_shape() {
        let marker = create(MarkerKind::Delayed, Node::or(vec![b(), Node::or(vec![c()])]));
        let tree = Node::and(vec![a(), marker]);
        let flat = flatten(tree);
        assert_eq!(
            flat.to_string(),
            "A == 'a' && ((_Delayed_ = true) && (B == 'b' || C == 'c'))"
        );
        let instance = find_instance(&flat.children()[1]).unwrap();
        assert!(instance.is(MarkerKind::Delayed));
    }

    #[test]
    fn test_negated_group_is_kept() {
        let tree = Node::not(Node::and(vec![a(), b()]).grouped());
        let flat = flatten(tree.clone());
        assert_eq!(flat, tree);
    }

    #[test]
    fn test_double_groups_collapse() {
        let flat = flatten_with(a().grouped().grouped(), false);
        assert!(flat.changed);
        assert_eq!(flat.tree, a().grouped());
    }

    #[test]
    fn test_deep_tree() {
        let mut tree = a();
        for _ in 0..50_000 {
            tree = Node::and(vec![tree, b()]);
        }
        let flat = flatten(tree);
        assert_eq!(flat.children().len(), 50_001);
    }

    #[test]
    fn test_idempotent_on_sample() {
        let tree = Node::or(vec![
            Node::and(vec![a(), Node::and(vec![b(), c()]).grouped()]).grouped(),
            Node::not(Node::or(vec![a(), Node::or(vec![b()])]).grouped()),
        ]);
        let once = flatten(tree);
        let twice = flatten_with(once.clone(), true);
        assert!(!twice.changed);
        assert_eq!(twice.tree, once);
    }
}
