//! Query property markers.
//!
//! A marker attaches planning metadata to a subtree without leaving the
//! expression grammar. It is an AND whose first child is the sentinel
//! assignment `label = true` and whose remaining children are the marked
//! source:
//!
//! ```text
//! ((_Delayed_ = true) && (F == 'a' || G == 'b'))
//! ```
//!
//! Markers are recognized structurally by [`find_instance`], so a tree that is
//! rendered and parsed again keeps its markers. Removing a marker never changes
//! what a query matches, only how it is executed.

use std::fmt;

use common_error::{SiftError, SiftResult};
use serde::{Deserialize, Serialize};

use crate::node::{JunctionKind, Leaf, Node};

/// Every kind of marker known to the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MarkerKind {
    /// Evaluate the source against documents instead of the index.
    Delayed,
    /// The source is a lower/upper bound pair on one field.
    BoundedRange,
    /// The source falls in a hole of the global index.
    IndexHole,
    /// The source may only be evaluated against documents.
    EvaluationOnly,
    /// An unfielded term matched too many fields to expand.
    ExceededTerm,
    /// A term matched too many values to expand.
    ExceededValue,
    /// A single-field disjunction is too large to run term by term.
    ExceededOr,
}

impl MarkerKind {
    /// All registered marker kinds.
    pub const ALL: [Self; 7] = [
        Self::Delayed,
        Self::BoundedRange,
        Self::IndexHole,
        Self::EvaluationOnly,
        Self::ExceededTerm,
        Self::ExceededValue,
        Self::ExceededOr,
    ];

    /// The sentinel label identifying this marker.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Delayed => "_Delayed_",
            Self::BoundedRange => "_Bounded_",
            Self::IndexHole => "_Hole_",
            Self::EvaluationOnly => "_Eval_",
            Self::ExceededTerm => "_Term_",
            Self::ExceededValue => "_Value_",
            Self::ExceededOr => "_List_",
        }
    }

    /// Look up a marker kind by its label.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.label() == label)
    }

    /// Markers whose source is evaluated after the index scan.
    pub const fn is_delayed_predicate(self) -> bool {
        matches!(
            self,
            Self::IndexHole
                | Self::Delayed
                | Self::EvaluationOnly
                | Self::ExceededOr
                | Self::ExceededTerm
                | Self::ExceededValue
        )
    }

    /// Markers handled by an ivarator at scan time.
    pub const fn is_ivarator(self) -> bool {
        matches!(
            self,
            Self::ExceededTerm | Self::ExceededOr | Self::ExceededValue
        )
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Registry validation
// ============================================================================

const fn str_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

const fn label_is_reserved(label: &str) -> bool {
    let bytes = label.as_bytes();
    bytes.len() > 2 && bytes[0] == b'_' && bytes[bytes.len() - 1] == b'_'
}

const fn registry_is_well_formed() -> bool {
    let mut i = 0;
    while i < MarkerKind::ALL.len() {
        if !label_is_reserved(MarkerKind::ALL[i].label()) {
            return false;
        }
        let mut j = i + 1;
        while j < MarkerKind::ALL.len() {
            if str_eq(MarkerKind::ALL[i].label(), MarkerKind::ALL[j].label()) {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    true
}

const _: () = assert!(
    registry_is_well_formed(),
    "marker labels must be unique and of the form _Label_"
);

/// Check a set of marker labels for duplicates and malformed entries.
pub fn validate_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> SiftResult<()> {
    let mut seen = std::collections::HashSet::new();
    for label in labels {
        if !label_is_reserved(label) {
            return Err(SiftError::marker_registration(format!(
                "label '{label}' is not a reserved identifier"
            )));
        }
        if !seen.insert(label) {
            return Err(SiftError::marker_registration(format!(
                "label '{label}' registered twice"
            )));
        }
    }
    Ok(())
}

/// Validate the built-in marker registry.
pub fn validate_registry() -> SiftResult<()> {
    validate_labels(MarkerKind::ALL.iter().map(|kind| kind.label()))
}

// ============================================================================
// Recognition
// ============================================================================

/// A recognized marker: its kind and the marked source.
#[derive(Debug, Clone, Copy)]
pub struct MarkerInstance<'a> {
    /// Marker kind.
    pub kind: MarkerKind,
    /// The children following the sentinel. Usually exactly one.
    pub sources: &'a [Node],
}

impl MarkerInstance<'_> {
    /// Whether this instance is of the given kind.
    pub fn is(&self, kind: MarkerKind) -> bool {
        self.kind == kind
    }

    /// The marked source as a single node.
    ///
    /// Multiple trailing children are joined under an implicit AND.
    pub fn source(&self) -> Node {
        match self.sources {
            [single] => single.peel().clone(),
            many => Node::and(many.to_vec()),
        }
    }
}

/// Recognize a marker at `node`.
///
/// Groupings above the AND and around the sentinel are skipped. The search
/// stops at the first AND and never looks inside an OR.
pub fn find_instance(node: &Node) -> Option<MarkerInstance<'_>> {
    let junction = match node.peel() {
        Node::Junction(j) if j.kind == JunctionKind::And => j,
        _ => return None,
    };
    let (sentinel, sources) = junction.children.split_first()?;
    if sources.is_empty() {
        return None;
    }
    match sentinel.peel() {
        Node::Leaf(leaf) if leaf.is_assignment() => {
            MarkerKind::from_label(&leaf.field).map(|kind| MarkerInstance { kind, sources })
        }
        _ => None,
    }
}

/// Whether `node` is a marker of any kind.
pub fn is_marker(node: &Node) -> bool {
    find_instance(node).is_some()
}

/// Whether `node` is a marker of `kind`.
pub fn is_marker_of(node: &Node, kind: MarkerKind) -> bool {
    find_instance(node).is_some_and(|instance| instance.is(kind))
}

/// Wrap `source` in a marker of `kind`.
///
/// A source that already carries the same marker is returned unchanged.
pub fn create(kind: MarkerKind, source: Node) -> Node {
    if is_marker_of(&source, kind) {
        return source;
    }
    let source = match source {
        Node::Group(_) => source,
        other => Node::group(other),
    };
    Node::group(Node::and(vec![
        Node::group(Node::assignment(kind.label())),
        source,
    ]))
}

/// Strip every layer of `kind` marker from the top of `node`.
pub fn unwrap_fully(node: Node, kind: MarkerKind) -> Node {
    let mut node = node;
    while is_marker_of(&node, kind) {
        node = take_source(node);
    }
    node
}

/// Take the source out of a marker node. Non-markers are returned as-is.
pub fn take_source(node: Node) -> Node {
    if !is_marker(&node) {
        return node;
    }
    match node.into_peeled() {
        Node::Junction(junction) => {
            let mut sources: Vec<Node> = junction.children.into_iter().skip(1).collect();
            if sources.len() == 1 {
                sources.remove(0).into_peeled()
            } else {
                Node::and(sources)
            }
        }
        other => other,
    }
}

// ============================================================================
// Bounded ranges
// ============================================================================

/// The lower and upper bound of a bounded range pair.
#[derive(Debug, Clone, Copy)]
pub struct RangeBounds<'a> {
    /// Lower bound (`>` or `>=`).
    pub lower: &'a Leaf,
    /// Upper bound (`<` or `<=`).
    pub upper: &'a Leaf,
}

/// Recognize a two-child AND of a lower and an upper bound on the same field.
pub fn range_bounds(node: &Node) -> Option<RangeBounds<'_>> {
    let junction = match node.peel() {
        Node::Junction(j) if j.kind == JunctionKind::And && j.children.len() == 2 => j,
        _ => return None,
    };
    let first = junction.children[0].as_leaf()?;
    let second = junction.children[1].as_leaf()?;
    if first.field != second.field {
        return None;
    }
    if first.op.is_lower_bound() && second.op.is_upper_bound() {
        Some(RangeBounds {
            lower: first,
            upper: second,
        })
    } else if first.op.is_upper_bound() && second.op.is_lower_bound() {
        Some(RangeBounds {
            lower: second,
            upper: first,
        })
    } else {
        None
    }
}

/// Whether `node` is a bounded range pair.
pub fn is_bounded_range(node: &Node) -> bool {
    range_bounds(node).is_some()
}

/// The bounds of a bounded range, marked or not.
pub fn marked_range_bounds(node: &Node) -> Option<RangeBounds<'_>> {
    match find_instance(node) {
        Some(instance) if instance.is(MarkerKind::BoundedRange) => match instance.sources {
            [single] => range_bounds(single),
            _ => None,
        },
        Some(_) => None,
        None => range_bounds(node),
    }
}

/// Whether flattening and rewriting must treat `node` as an opaque unit.
pub fn is_protected(node: &Node) -> bool {
    is_marker(node) || is_bounded_range(node)
}
