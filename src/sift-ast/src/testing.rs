//! Testing utilities for sift-ast.
//!
//! Fixtures for building small trees over a fixed alphabet of atoms and an
//! oracle that assigns a truth value to each atom, so rewrites can be checked
//! against every assignment.

use std::collections::BTreeMap;

use crate::eval::{evaluate, Oracle};
use crate::node::{Leaf, Node};
use crate::visit::Visitor;

/// Truth assignment keyed by the rendering of each positive atom.
#[derive(Debug, Clone, Default)]
pub struct TruthTable {
    values: BTreeMap<String, bool>,
}

impl TruthTable {
    /// Create an empty assignment where every atom is false.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a truth value to `atom`.
    #[must_use]
    pub fn with(mut self, atom: &Node, value: bool) -> Self {
        self.values.insert(atom.to_string(), value);
        self
    }

    /// Every assignment over `atoms`, in binary counting order.
    ///
    /// Only meant for a handful of atoms.
    pub fn enumerate(atoms: &[Node]) -> Vec<Self> {
        (0..1u32 << atoms.len())
            .map(|bits| {
                atoms
                    .iter()
                    .enumerate()
                    .fold(Self::new(), |table, (i, atom)| {
                        table.with(atom, bits & (1 << i) != 0)
                    })
            })
            .collect()
    }
}

impl Oracle for TruthTable {
    fn leaf(&self, leaf: &Leaf) -> bool {
        self.values
            .get(&leaf.to_string())
            .copied()
            .unwrap_or(false)
    }
}

/// The positive atoms appearing in `node`, in visit order.
///
/// `!=` and `!~` leaves contribute their positive form.
pub fn atoms_of(node: &Node) -> Vec<Node> {
    struct Atoms;

    impl Visitor for Atoms {
        type Context = Vec<Node>;

        fn visit_leaf(&mut self, leaf: &Leaf, mut ctx: Vec<Node>) -> Vec<Node> {
            if !leaf.is_assignment() {
                let op = leaf.op.positive().unwrap_or(leaf.op);
                let atom = Node::leaf(leaf.field.clone(), op, leaf.literal.clone());
                if !ctx.contains(&atom) {
                    ctx.push(atom);
                }
            }
            ctx
        }
    }

    Atoms.visit(node, Vec::new())
}

/// Whether `a` and `b` agree under every assignment of the atoms of both.
pub fn truth_equivalent(a: &Node, b: &Node) -> bool {
    let mut atoms = atoms_of(a);
    for atom in atoms_of(b) {
        if !atoms.contains(&atom) {
            atoms.push(atom);
        }
    }
    TruthTable::enumerate(&atoms)
        .iter()
        .all(|table| evaluate(a, table) == evaluate(b, table))
}

/// The atoms `A == 'a'`, `B == 'b'`, ... for the first `n` letters.
pub fn letters(n: usize) -> Vec<Node> {
    (b'A'..=b'Z')
        .take(n)
        .map(|c| {
            let field = char::from(c).to_string();
            let value = field.to_lowercase();
            Node::eq(field, value)
        })
        .collect()
}
