//! Tree traversal.
//!
//! Three disciplines are provided:
//!
//! - [`Visitor`] walks a borrowed tree and threads a context value through
//!   every node. The default for every node kind recurses into the children
//!   and returns the context unchanged.
//! - [`Rebuilder`] produces a fresh tree whose children are the results of
//!   rebuilding the original children. Nothing is shared with the input.
//! - [`MutVisitor`] edits a tree in place through `&mut Node` slots. Writing
//!   a new node into a slot replaces it in its parent, including at the root.
//!
//! Marker nodes are dispatched to their own hook in every discipline so passes
//! can decide whether to enter them.

use common_error::SiftResult;

use crate::marker::{find_instance, MarkerInstance};
use crate::node::{Function, FutureNode, Junction, Leaf, Node};

// ============================================================================
// Read-only visitor
// ============================================================================

/// Read-only, context-threading visitor.
pub trait Visitor {
    /// Value threaded through the traversal.
    type Context;

    /// Dispatch on the kind of `node`.
    fn visit(&mut self, node: &Node, ctx: Self::Context) -> Self::Context {
        match node {
            Node::Leaf(leaf) => self.visit_leaf(leaf, ctx),
            Node::Function(func) => self.visit_function(func, ctx),
            Node::Junction(junction) => match find_instance(node) {
                Some(instance) => self.visit_marker(node, instance, ctx),
                None => self.visit_junction(junction, ctx),
            },
            Node::Not(child) => self.visit_not(child, ctx),
            Node::Group(child) => self.visit_group(child, ctx),
            Node::Future(future) => self.visit_future(future, ctx),
            Node::Empty => ctx,
        }
    }

    fn visit_leaf(&mut self, _leaf: &Leaf, ctx: Self::Context) -> Self::Context {
        ctx
    }

    fn visit_function(&mut self, _func: &Function, ctx: Self::Context) -> Self::Context {
        ctx
    }

    fn visit_junction(&mut self, junction: &Junction, ctx: Self::Context) -> Self::Context {
        junction
            .children
            .iter()
            .fold(ctx, |ctx, child| self.visit(child, ctx))
    }

    /// Called for a recognized marker. `node` is the marker's AND.
    fn visit_marker(
        &mut self,
        node: &Node,
        _instance: MarkerInstance<'_>,
        ctx: Self::Context,
    ) -> Self::Context {
        walk_children(self, node, ctx)
    }

    fn visit_not(&mut self, child: &Node, ctx: Self::Context) -> Self::Context {
        self.visit(child, ctx)
    }

    fn visit_group(&mut self, child: &Node, ctx: Self::Context) -> Self::Context {
        self.visit(child, ctx)
    }

    fn visit_future(&mut self, future: &FutureNode, ctx: Self::Context) -> Self::Context {
        self.visit(&future.original, ctx)
    }
}

/// Visit every direct child of `node` in order.
pub fn walk_children<V: Visitor + ?Sized>(visitor: &mut V, node: &Node, ctx: V::Context) -> V::Context {
    node.children()
        .iter()
        .fold(ctx, |ctx, child| visitor.visit(child, ctx))
}

// ============================================================================
// Rebuilding visitor
// ============================================================================

/// Produces a fresh copy of a tree, node by node.
pub trait Rebuilder {
    /// Dispatch on the kind of `node`.
    fn rebuild(&mut self, node: &Node) -> SiftResult<Node> {
        match node {
            Node::Leaf(leaf) => self.rebuild_leaf(leaf),
            Node::Function(func) => self.rebuild_function(func),
            Node::Junction(junction) => match find_instance(node) {
                Some(instance) => self.rebuild_marker(node, instance),
                None => self.rebuild_junction(junction),
            },
            Node::Not(child) => self.rebuild_not(child),
            Node::Group(child) => self.rebuild_group(child),
            Node::Future(future) => Ok(Node::Future(future.clone())),
            Node::Empty => Ok(Node::Empty),
        }
    }

    fn rebuild_leaf(&mut self, leaf: &Leaf) -> SiftResult<Node> {
        Ok(Node::Leaf(leaf.clone()))
    }

    fn rebuild_function(&mut self, func: &Function) -> SiftResult<Node> {
        Ok(Node::Function(func.clone()))
    }

    fn rebuild_junction(&mut self, junction: &Junction) -> SiftResult<Node> {
        let children = junction
            .children
            .iter()
            .map(|child| self.rebuild(child))
            .collect::<SiftResult<Vec<_>>>()?;
        Ok(Node::junction(junction.kind, children))
    }

    /// Called for a recognized marker. The default rebuilds the marker
    /// structure child by child.
    fn rebuild_marker(&mut self, node: &Node, _instance: MarkerInstance<'_>) -> SiftResult<Node> {
        match node {
            Node::Junction(junction) => self.rebuild_junction(junction),
            other => Ok(other.clone()),
        }
    }

    fn rebuild_not(&mut self, child: &Node) -> SiftResult<Node> {
        Ok(Node::not(self.rebuild(child)?))
    }

    fn rebuild_group(&mut self, child: &Node) -> SiftResult<Node> {
        Ok(Node::group(self.rebuild(child)?))
    }
}

// ============================================================================
// Mutating visitor
// ============================================================================

/// Edits a tree in place.
pub trait MutVisitor {
    /// Visit one slot. The default recurses with [`walk_mut`].
    fn visit_mut(&mut self, node: &mut Node) -> SiftResult<()> {
        walk_mut(self, node)
    }
}

/// Visit every direct child slot of `node`.
///
/// Placeholders are not entered; their original node belongs to the
/// expansion engine.
pub fn walk_mut<V: MutVisitor + ?Sized>(visitor: &mut V, node: &mut Node) -> SiftResult<()> {
    match node {
        Node::Junction(junction) => {
            for child in &mut junction.children {
                visitor.visit_mut(child)?;
            }
            Ok(())
        }
        Node::Not(child) | Node::Group(child) => visitor.visit_mut(child),
        Node::Leaf(_) | Node::Function(_) | Node::Future(_) | Node::Empty => Ok(()),
    }
}

/// Replace the node in `slot` with `f(node)`.
///
/// The slot briefly holds [`Node::Empty`] while `f` runs.
pub fn replace_slot(slot: &mut Node, f: impl FnOnce(Node) -> Node) {
    let node = std::mem::take(slot);
    *slot = f(node);
}
