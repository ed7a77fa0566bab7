//! Canonical form and structural equivalence.
//!
//! Two subtrees are equivalent when their canonical forms render to the same
//! text. The canonical form drops groupings, merges nested junctions of the
//! same kind, keeps markers and bounded ranges as single units and sorts
//! junction children by their own canonical rendering. Subsumption checks and
//! expansion memo keys both go through this module.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::marker::{find_instance, is_bounded_range, is_protected};
use crate::node::{Junction, JunctionKind, Node};

/// Build the canonical form of `node`.
pub fn canonical_form(node: &Node) -> Node {
    match node {
        Node::Group(inner) => canonical_form(inner),
        Node::Not(child) => Node::not(canonical_form(child)),
        Node::Future(future) => canonical_form(&future.original),
        Node::Junction(junction) => canonical_junction(node, junction),
        Node::Leaf(_) | Node::Function(_) | Node::Empty => node.clone(),
    }
}

fn canonical_junction(node: &Node, junction: &Junction) -> Node {
    if let Some(instance) = find_instance(node) {
        // sentinel first, then the canonical source
        return Node::and(vec![
            Node::assignment(instance.kind.label()),
            canonical_form(&instance.source()),
        ]);
    }
    if is_bounded_range(node) {
        return sorted_junction(junction.kind, junction.children.iter().map(canonical_form));
    }

    let mut children = Vec::with_capacity(junction.children.len());
    for child in &junction.children {
        let canon = canonical_form(child);
        let mergeable = canon.is_junction_of(junction.kind) && !is_protected(&canon);
        match canon {
            Node::Junction(inner) if mergeable => children.extend(inner.children),
            other => children.push(other),
        }
    }
    if children.len() == 1 {
        return children.remove(0);
    }
    sorted_junction(junction.kind, children.into_iter())
}

fn sorted_junction(kind: JunctionKind, children: impl Iterator<Item = Node>) -> Node {
    let mut keyed: Vec<(String, Node)> = children.map(|c| (c.to_string(), c)).collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    Node::junction(kind, keyed.into_iter().map(|(_, c)| c).collect())
}

/// The canonical text of `node`.
pub fn canonical_key(node: &Node) -> String {
    canonical_form(node).to_string()
}

/// Whether two subtrees are structurally equivalent.
pub fn equivalent(a: &Node, b: &Node) -> bool {
    canonical_key(a) == canonical_key(b)
}

/// Memoized canonical keys for nodes borrowed from one tree.
///
/// Keys are cached by node address; the borrow on `'a` keeps every cached
/// node alive and unmoved for as long as the cache exists.
#[derive(Default)]
pub struct KeyCache<'a> {
    keys: HashMap<*const Node, Rc<str>>,
    misses: usize,
    _tree: PhantomData<&'a Node>,
}

impl<'a> KeyCache<'a> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            keys: HashMap::new(),
            misses: 0,
            _tree: PhantomData,
        }
    }

    /// The canonical key of `node`, computed at most once.
    pub fn key(&mut self, node: &'a Node) -> Rc<str> {
        let misses = &mut self.misses;
        Rc::clone(self.keys.entry(node as *const Node).or_insert_with(|| {
            *misses += 1;
            Rc::from(canonical_key(node))
        }))
    }

    /// Whether two nodes are equivalent, using cached keys.
    pub fn equivalent(&mut self, a: &'a Node, b: &'a Node) -> bool {
        self.key(a) == self.key(b)
    }

    /// Number of keys actually computed.
    pub fn computed(&self) -> usize {
        self.misses
    }
}
