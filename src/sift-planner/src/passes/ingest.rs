//! Ingest-type pruning.
//!
//! Every field is produced by a known set of record ingest types. A
//! conjunction can only match records of a type that all of its terms allow,
//! so terms whose types cannot meet the rest of the conjunction are removed.
//!
//! Each subtree is given an [`IngestTypes`] value, an over-approximation of
//! the record types it can match:
//!
//! - a comparison takes its field's types; a field with no recorded types is
//!   [`IngestTypes::Unknown`]
//! - negations, `!=`, `!~` and null checks also match records that lack the
//!   field, so they are [`IngestTypes::Ignored`]
//! - AND intersects, OR unions; `Unknown` wins both, `Ignored` never narrows
//!
//! Pruning walks down with the set computed at the nearest AND. A subtree
//! that cannot match any record in that set is dropped from an OR and makes
//! an AND unsatisfiable; a subtree that matches every such record is dropped
//! from an AND. Pruning never drops a branch that some allowed record could
//! satisfy.

use std::collections::BTreeSet;
use std::sync::Arc;

use common_error::SiftResult;
use log::debug;
use sift_ast::marker::{create, find_instance};
use sift_ast::{CompareOp, JunctionKind, Leaf, MarkerKind, Node};
use sift_metadata::TypeMetadata;

use super::pass::{RewritePass, Transformed};

// ============================================================================
// Type sets
// ============================================================================

/// Record ingest types a subtree can match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestTypes {
    /// The types could not be determined. Suppresses narrowing.
    Unknown,
    /// The subtree does not restrict the type.
    Ignored,
    /// The subtree only matches records of these types.
    Known(BTreeSet<String>),
}

impl IngestTypes {
    /// A known set of types.
    pub fn of<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Known(types.into_iter().map(Into::into).collect())
    }

    /// Types an AND of `self` and `other` can match.
    #[must_use]
    pub fn intersect(self, other: Self) -> Self {
        match (self, other) {
            (Self::Unknown, _) | (_, Self::Unknown) => Self::Unknown,
            (Self::Ignored, other) | (other, Self::Ignored) => other,
            (Self::Known(a), Self::Known(b)) => Self::Known(a.intersection(&b).cloned().collect()),
        }
    }

    /// Types an OR of `self` and `other` can match.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        match (self, other) {
            (Self::Unknown, _) | (_, Self::Unknown) => Self::Unknown,
            (Self::Ignored, _) | (_, Self::Ignored) => Self::Ignored,
            (Self::Known(mut a), Self::Known(b)) => {
                a.extend(b);
                Self::Known(a)
            }
        }
    }

    /// Whether no record type can match.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Known(types) if types.is_empty())
    }

    /// Whether a record of some type in `scope` could match.
    pub fn admits(&self, scope: &BTreeSet<String>) -> bool {
        match self {
            Self::Known(types) => !types.is_disjoint(scope),
            Self::Unknown | Self::Ignored => true,
        }
    }
}

/// Computes [`IngestTypes`] for subtrees.
pub struct IngestTyper<'a> {
    types: &'a TypeMetadata,
}

impl<'a> IngestTyper<'a> {
    /// Create a typer backed by `types`.
    pub fn new(types: &'a TypeMetadata) -> Self {
        Self { types }
    }

    /// Types `field` can be produced by.
    pub fn field_types(&self, field: &str) -> SiftResult<IngestTypes> {
        let types = self.types.datatypes_for_field(field)?;
        if types.is_empty() {
            Ok(IngestTypes::Unknown)
        } else {
            Ok(IngestTypes::Known(types.as_ref().clone()))
        }
    }

    /// Types `node` can match.
    pub fn types_of(&self, node: &Node) -> SiftResult<IngestTypes> {
        match node {
            Node::Leaf(leaf) => self.leaf_types(leaf),
            Node::Function(func) => {
                let mut fields = func.fields().peekable();
                if fields.peek().is_none() {
                    return Ok(IngestTypes::Unknown);
                }
                fields.try_fold(IngestTypes::Known(BTreeSet::new()), |acc, field| {
                    Ok(acc.union(self.field_types(field)?))
                })
            }
            Node::Junction(junction) => {
                if let Some(instance) = find_instance(node) {
                    return self.types_of(&instance.source());
                }
                match junction.kind {
                    JunctionKind::And => {
                        let mut acc = IngestTypes::Ignored;
                        for child in &junction.children {
                            acc = acc.intersect(self.types_of(child)?);
                            if acc.is_empty() {
                                break;
                            }
                        }
                        Ok(acc)
                    }
                    JunctionKind::Or => junction
                        .children
                        .iter()
                        .try_fold(IngestTypes::Known(BTreeSet::new()), |acc, child| {
                            Ok(acc.union(self.types_of(child)?))
                        }),
                }
            }
            Node::Not(_) => Ok(IngestTypes::Ignored),
            Node::Group(child) => self.types_of(child),
            Node::Future(future) => match &future.resolved {
                Some(resolved) => self.types_of(resolved),
                None => self.types_of(&future.original),
            },
            Node::Empty => Ok(IngestTypes::Known(BTreeSet::new())),
        }
    }

    fn leaf_types(&self, leaf: &Leaf) -> SiftResult<IngestTypes> {
        if leaf.is_assignment() || leaf.op.is_negative() || leaf.literal.is_null() {
            return Ok(IngestTypes::Ignored);
        }
        self.field_types(&leaf.field)
    }
}

// ============================================================================
// Pruning
// ============================================================================

/// What a subtree is worth to records in the pruning scope.
pub(super) enum Pruned {
    /// Keep this (possibly smaller) subtree.
    Keep(Node),
    /// No record in scope can match.
    Never,
    /// Every record in scope matches.
    Always,
}

struct Pruner<'a> {
    typer: IngestTyper<'a>,
}

impl Pruner<'_> {
    fn prune(&self, node: &Node, scope: Option<&BTreeSet<String>>) -> SiftResult<Pruned> {
        match node {
            Node::Leaf(leaf) => self.prune_leaf(node, leaf, scope),
            Node::Function(func) => {
                if let Some(scope) = scope {
                    let types = self.typer.types_of(node)?;
                    if !types.admits(scope) {
                        debug!("Pruning {}: fields never share a type with the query", func);
                        return Ok(Pruned::Never);
                    }
                }
                Ok(Pruned::Keep(node.clone()))
            }
            Node::Junction(junction) => {
                if find_instance(node).is_some() {
                    return self.prune_marker(node, scope);
                }
                let own = self.typer.types_of(node)?;
                if own.is_empty() || scope.is_some_and(|s| !own.admits(s)) {
                    return Ok(Pruned::Never);
                }
                match junction.kind {
                    JunctionKind::And => {
                        let narrowed = match &own {
                            IngestTypes::Known(types) => Some(types),
                            IngestTypes::Unknown | IngestTypes::Ignored => scope,
                        };
                        self.prune_and(&junction.children, narrowed)
                    }
                    JunctionKind::Or => self.prune_or(&junction.children, scope),
                }
            }
            Node::Not(child) => Ok(match self.prune(child, scope)? {
                Pruned::Keep(child) => Pruned::Keep(Node::not(child)),
                Pruned::Never => Pruned::Always,
                Pruned::Always => Pruned::Never,
            }),
            Node::Group(child) => Ok(match self.prune(child, scope)? {
                // rebuilt markers come back already grouped
                Pruned::Keep(child @ Node::Group(_)) => Pruned::Keep(child),
                Pruned::Keep(child) => Pruned::Keep(Node::group(child)),
                other => other,
            }),
            Node::Future(_) => Ok(Pruned::Keep(node.clone())),
            Node::Empty => Ok(Pruned::Never),
        }
    }

    fn prune_leaf(
        &self,
        node: &Node,
        leaf: &Leaf,
        scope: Option<&BTreeSet<String>>,
    ) -> SiftResult<Pruned> {
        if leaf.is_assignment() {
            return Ok(Pruned::Keep(node.clone()));
        }
        if let Some(scope) = scope {
            if let IngestTypes::Known(types) = self.typer.field_types(&leaf.field)? {
                if types.is_disjoint(scope) {
                    return Ok(absent_field(leaf));
                }
            }
        }
        Ok(Pruned::Keep(node.clone()))
    }

    // Ivarators and bounded ranges are kept whole; other markers are pruned
    // inside their source.
    fn prune_marker(&self, node: &Node, scope: Option<&BTreeSet<String>>) -> SiftResult<Pruned> {
        let own = self.typer.types_of(node)?;
        if own.is_empty() || scope.is_some_and(|s| !own.admits(s)) {
            return Ok(Pruned::Never);
        }
        let Some(instance) = find_instance(node) else {
            return Ok(Pruned::Keep(node.clone()));
        };
        if instance.kind.is_ivarator() || instance.is(MarkerKind::BoundedRange) {
            return Ok(Pruned::Keep(node.clone()));
        }

        let source = instance.source();
        Ok(match self.prune(&source, scope)? {
            Pruned::Keep(pruned) if pruned == source => Pruned::Keep(node.clone()),
            Pruned::Keep(pruned) => Pruned::Keep(create(instance.kind, pruned)),
            other => other,
        })
    }

    // Children are visited last to first.
    fn prune_and(&self, children: &[Node], scope: Option<&BTreeSet<String>>) -> SiftResult<Pruned> {
        let mut kept = Vec::with_capacity(children.len());
        for child in children.iter().rev() {
            match self.prune(child, scope)? {
                Pruned::Keep(child) => kept.push(child),
                Pruned::Always => {}
                Pruned::Never => return Ok(Pruned::Never),
            }
        }
        kept.reverse();
        Ok(match kept.len() {
            0 => Pruned::Always,
            1 => Pruned::Keep(kept.pop().unwrap_or_default()),
            _ => Pruned::Keep(Node::and(kept)),
        })
    }

    fn prune_or(&self, children: &[Node], scope: Option<&BTreeSet<String>>) -> SiftResult<Pruned> {
        let mut kept = Vec::with_capacity(children.len());
        for child in children.iter().rev() {
            match self.prune(child, scope)? {
                Pruned::Keep(child) => kept.push(child),
                Pruned::Never => {}
                Pruned::Always => return Ok(Pruned::Always),
            }
        }
        kept.reverse();
        Ok(match kept.len() {
            0 => Pruned::Never,
            1 => Pruned::Keep(kept.pop().unwrap_or_default()),
            _ => Pruned::Keep(Node::or(kept)),
        })
    }
}

/// Truth of `leaf` on a record that lacks its field.
pub(super) fn absent_field(leaf: &Leaf) -> Pruned {
    let positive = leaf.op.positive().unwrap_or(leaf.op);
    let matches_absent = positive == CompareOp::Eq && leaf.literal.is_null();
    if matches_absent != leaf.op.is_negative() {
        Pruned::Always
    } else {
        Pruned::Never
    }
}

/// Prune `tree` against the ingest types its fields can come from.
///
/// `filter` restricts the records considered; an empty filter means all
/// types. A tree no record can match becomes [`Node::Empty`].
pub fn prune_ingest_types(
    tree: &Node,
    types: &TypeMetadata,
    filter: &BTreeSet<String>,
) -> SiftResult<Node> {
    let pruner = Pruner {
        typer: IngestTyper::new(types),
    };
    let scope = (!filter.is_empty()).then_some(filter);
    Ok(match pruner.prune(tree, scope)? {
        Pruned::Keep(pruned) => pruned,
        Pruned::Never => Node::Empty,
        Pruned::Always => tree.clone(),
    })
}

/// Ingest-type pruning pass.
pub struct IngestTypePruning {
    types: Arc<TypeMetadata>,
    filter: BTreeSet<String>,
}

impl IngestTypePruning {
    /// Create the pass over `types`, restricted to `filter`.
    pub fn new(types: Arc<TypeMetadata>, filter: BTreeSet<String>) -> Self {
        Self { types, filter }
    }
}

impl RewritePass for IngestTypePruning {
    fn name(&self) -> &'static str {
        "IngestTypePruning"
    }

    fn description(&self) -> &'static str {
        "Remove branches whose fields share no ingest type with the rest of the query"
    }

    fn apply(&self, tree: Node) -> SiftResult<Transformed> {
        let pruned = prune_ingest_types(&tree, &self.types, &self.filter)?;
        let changed = pruned != tree;
        Ok(Transformed::new(pruned, changed))
    }
}
