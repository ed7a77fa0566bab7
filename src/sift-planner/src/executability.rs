//! Executability against the global index.
//!
//! Every subtree is classified into one of four states. A state of `None`
//! means the subtree does not matter to the decision (a term the index could
//! not resolve to any field, or a marker sentinel).
//!
//! Leaves and markers are classified by an [`ExecutabilityPolicy`]; junctions
//! compose their children's states:
//!
//! - OR (and AND under an odd number of negations) is *all-or-none*: every
//!   child must be executable
//! - AND (and OR under an odd number of negations) is *all-or-some*: one
//!   executable child is enough, unless another is partial or an error

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use common_error::SiftResult;
use log::trace;
use sift_ast::marker::find_instance;
use sift_ast::{
    CompareOp, Function, JunctionKind, Leaf, MarkerInstance, MarkerKind, Node, NO_FIELD,
};
use sift_metadata::{FieldClassification, MetadataService};

/// Executability state of a subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Executability {
    /// Can be answered from the global index alone.
    Executable,
    /// Some parts can be answered from the index, others cannot.
    Partial,
    /// Cannot be answered from the index.
    NonExecutable,
    /// Cannot be answered at all as written (for example a `!=` on a field
    /// that only exists in the index).
    Error,
}

impl fmt::Display for Executability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Executable => write!(f, "EXECUTABLE"),
            Self::Partial => write!(f, "PARTIAL"),
            Self::NonExecutable => write!(f, "NON_EXECUTABLE"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

// ============================================================================
// Policy
// ============================================================================

/// Classification of the atoms of a tree.
pub trait ExecutabilityPolicy: Send + Sync {
    /// State of a comparison.
    fn leaf(&self, leaf: &Leaf) -> Option<Executability>;

    /// State of a function call.
    fn function(&self, _func: &Function) -> Option<Executability> {
        Some(Executability::NonExecutable)
    }

    /// State of a marked subtree.
    fn marker(&self, instance: MarkerInstance<'_>) -> Option<Executability>;
}

/// The global-index policy, driven by field classifications.
#[derive(Debug, Clone, Default)]
pub struct FieldIndexPolicy {
    fields: FieldClassification,
}

impl FieldIndexPolicy {
    /// Create a policy over `fields`.
    pub fn new(fields: FieldClassification) -> Self {
        Self { fields }
    }

    /// Fetch field classifications from `service` and build a policy.
    pub fn fetch(service: &dyn MetadataService, filter: &BTreeSet<String>) -> SiftResult<Self> {
        Ok(Self::new(FieldClassification::fetch(service, filter)?))
    }

    fn equality(&self, leaf: &Leaf) -> Executability {
        if leaf.is_unfielded() {
            return Executability::Executable;
        }
        if leaf.op == CompareOp::Eq && leaf.literal.is_null() {
            return if self.fields.is_index_only(&leaf.field) {
                Executability::Error
            } else {
                Executability::NonExecutable
            };
        }
        if self.fields.is_indexed(&leaf.field) {
            Executability::Executable
        } else {
            Executability::NonExecutable
        }
    }

    fn evaluation_only(&self, source: &Node) -> Option<Executability> {
        let fields = source.fields();
        if !fields.is_empty() && fields.iter().all(|field| *field == NO_FIELD) {
            return None;
        }
        if fields.iter().any(|field| self.fields.is_non_event(field)) {
            Some(Executability::Error)
        } else {
            Some(Executability::NonExecutable)
        }
    }
}

impl ExecutabilityPolicy for FieldIndexPolicy {
    fn leaf(&self, leaf: &Leaf) -> Option<Executability> {
        if leaf.is_assignment() || leaf.is_no_field() {
            return None;
        }
        let state = match leaf.op {
            CompareOp::Eq | CompareOp::Er => self.equality(leaf),
            CompareOp::Ne => {
                if self.fields.is_index_only(&leaf.field) {
                    Executability::Error
                } else {
                    Executability::NonExecutable
                }
            }
            CompareOp::Nr | CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
                if self.fields.is_non_event(&leaf.field) {
                    Executability::Error
                } else {
                    Executability::NonExecutable
                }
            }
            CompareOp::Assign => return None,
        };
        Some(state)
    }

    fn marker(&self, instance: MarkerInstance<'_>) -> Option<Executability> {
        match instance.kind {
            MarkerKind::ExceededValue | MarkerKind::ExceededOr => Some(Executability::Executable),
            MarkerKind::EvaluationOnly => self.evaluation_only(&instance.source()),
            MarkerKind::ExceededTerm
            | MarkerKind::Delayed
            | MarkerKind::BoundedRange
            | MarkerKind::IndexHole => Some(Executability::NonExecutable),
        }
    }
}

/// Where a pass gets its policy from.
#[derive(Clone)]
pub enum PolicySource {
    /// Build a [`FieldIndexPolicy`] from metadata on every use.
    Metadata {
        /// Metadata service.
        service: Arc<dyn MetadataService>,
        /// Datatype filter passed to the service.
        filter: BTreeSet<String>,
    },
    /// Use a fixed policy.
    Fixed(Arc<dyn ExecutabilityPolicy>),
}

impl fmt::Debug for PolicySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metadata { filter, .. } => f
                .debug_struct("Metadata")
                .field("filter", filter)
                .finish_non_exhaustive(),
            Self::Fixed(_) => f.write_str("Fixed"),
        }
    }
}

impl PolicySource {
    /// The policy to classify with.
    pub fn resolve(&self) -> SiftResult<Arc<dyn ExecutabilityPolicy>> {
        match self {
            Self::Metadata { service, filter } => {
                Ok(Arc::new(FieldIndexPolicy::fetch(service.as_ref(), filter)?))
            }
            Self::Fixed(policy) => Ok(Arc::clone(policy)),
        }
    }
}

// ============================================================================
// Composition
// ============================================================================

/// Classifies subtrees under a policy.
pub struct Classifier<'a> {
    policy: &'a dyn ExecutabilityPolicy,
}

impl<'a> Classifier<'a> {
    /// Create a classifier for `policy`.
    pub fn new(policy: &'a dyn ExecutabilityPolicy) -> Self {
        Self { policy }
    }

    /// State of `node` at the root.
    pub fn classify(&self, node: &Node) -> Option<Executability> {
        self.state(node, false)
    }

    /// Whether `node` is executable at the root.
    pub fn is_executable(&self, node: &Node) -> bool {
        self.classify(node) == Some(Executability::Executable)
    }

    /// State of `node` under `negated` pending negations.
    pub fn state(&self, node: &Node, negated: bool) -> Option<Executability> {
        let state = match node {
            Node::Leaf(leaf) => self.policy.leaf(leaf),
            Node::Function(func) => self.policy.function(func),
            Node::Junction(junction) => match find_instance(node) {
                Some(instance) => self.policy.marker(instance),
                None => self.junction_state(junction.kind, &junction.children, negated),
            },
            // the global index cannot answer a negation
            Node::Not(child) => match self.state(child, !negated) {
                Some(Executability::Error) => Some(Executability::Error),
                _ => Some(Executability::NonExecutable),
            },
            Node::Group(child) => self.state(child, negated),
            Node::Future(future) => match &future.resolved {
                Some(resolved) => self.state(resolved, negated),
                None => self.state(&future.original, negated),
            },
            Node::Empty => None,
        };
        trace!("{} is {:?}", node, state);
        state
    }

    /// State of a junction of `kind` over `children`.
    pub fn junction_state(
        &self,
        kind: JunctionKind,
        children: &[Node],
        negated: bool,
    ) -> Option<Executability> {
        let states = children.iter().map(|child| self.state(child, negated));
        match effective_kind(kind, negated) {
            JunctionKind::And => all_or_some(states),
            JunctionKind::Or => all_or_none(states),
        }
    }
}

/// The kind a junction behaves as under `negated` pending negations.
pub fn effective_kind(kind: JunctionKind, negated: bool) -> JunctionKind {
    if negated {
        kind.flip()
    } else {
        kind
    }
}

/// Collapse duplicate states; `Err` carries the distinct non-ignorable
/// states when more than one remains.
fn settle(
    states: impl Iterator<Item = Option<Executability>>,
) -> Result<Option<Executability>, BTreeSet<Executability>> {
    let states: BTreeSet<Option<Executability>> = states.collect();
    if states.len() <= 1 {
        return Ok(states.into_iter().next().flatten());
    }
    let remaining: BTreeSet<Executability> = states.into_iter().flatten().collect();
    if remaining.len() == 1 {
        return Ok(remaining.into_iter().next());
    }
    Err(remaining)
}

/// Every child must be executable.
pub fn all_or_none(states: impl Iterator<Item = Option<Executability>>) -> Option<Executability> {
    match settle(states) {
        Ok(state) => state,
        Err(mixed) if mixed.contains(&Executability::Error) => Some(Executability::Error),
        Err(mixed)
            if mixed.contains(&Executability::Partial)
                || mixed.contains(&Executability::NonExecutable) =>
        {
            Some(Executability::Partial)
        }
        Err(_) => Some(Executability::Executable),
    }
}

/// At least one child must be executable and none partial.
pub fn all_or_some(states: impl Iterator<Item = Option<Executability>>) -> Option<Executability> {
    match settle(states) {
        Ok(state) => state,
        Err(mixed) if mixed.contains(&Executability::Error) => Some(Executability::Error),
        Err(mixed) if mixed.contains(&Executability::Partial) => Some(Executability::Partial),
        Err(mixed) if mixed.contains(&Executability::Executable) => {
            Some(Executability::Executable)
        }
        Err(_) => Some(Executability::NonExecutable),
    }
}
