//! Building the replacement for an expanded term.
//!
//! A lookup answers with a map of field to matching values. Positive terms
//! become a disjunction of `==` comparisons, negative terms (`!=`, `!~`) a
//! conjunction of `!=` comparisons. Terms whose answer is too large to spell
//! out are wrapped in an exceeded-threshold marker instead.

use std::collections::BTreeSet;

use common_config::ExpansionConfig;
use sift_ast::marker::create;
use sift_ast::{CompareOp, FutureNode, JunctionKind, Leaf, MarkerKind, Node, NO_FIELD};
use sift_metadata::{IndexMatches, ValueSet};

/// Limits and toggles applied while building replacements.
#[derive(Debug, Clone, Copy)]
pub struct ReplacementLimits {
    /// Spell out the fields an unfielded term matched.
    pub expand_fields: bool,
    /// Spell out the values a term matched.
    pub expand_values: bool,
    /// Most fields an unfielded term may expand to.
    pub max_fields: usize,
    /// Most values one field may expand to.
    pub max_values: usize,
}

impl From<&ExpansionConfig> for ReplacementLimits {
    fn from(config: &ExpansionConfig) -> Self {
        Self {
            expand_fields: config.expand_fields,
            expand_values: config.expand_values,
            max_fields: config.max_unfielded_expansion_threshold,
            max_values: config.max_value_expansion_threshold,
        }
    }
}

/// Build the node that replaces `future` given the lookup answer.
pub fn build_replacement(
    future: &FutureNode,
    matches: &IndexMatches,
    composites: &BTreeSet<String>,
    limits: ReplacementLimits,
) -> Node {
    let original = future.original.as_ref();
    if !limits.expand_fields && !limits.expand_values {
        return original.clone();
    }

    let leaf = original.as_leaf();
    let unfielded = leaf.is_some_and(Leaf::is_unfielded);
    let negative = leaf.is_some_and(|leaf| leaf.op.is_negative());

    let fields: Vec<(&String, &ValueSet)> = matches
        .fields
        .iter()
        .filter(|(field, _)| !(future.ignore_composites && composites.contains(*field)))
        .collect();

    if fields.is_empty() && !matches.key_threshold_exceeded {
        return match leaf {
            Some(leaf) if unfielded => Node::Leaf(leaf.with_field(NO_FIELD)),
            _ => original.clone(),
        };
    }
    if unfielded && (matches.key_threshold_exceeded || fields.len() > limits.max_fields) {
        return create(MarkerKind::ExceededTerm, original.clone());
    }

    let mut children = Vec::with_capacity(fields.len() + 1);
    if future.keep_original {
        children.push(original.clone());
    }
    for (field, values) in fields {
        children.push(field_replacement(original, field, values, negative, limits));
    }

    let kind = if negative {
        JunctionKind::And
    } else {
        JunctionKind::Or
    };
    match children.len() {
        0 => Node::Empty,
        1 => children.pop().unwrap_or_default(),
        _ => Node::junction(kind, children),
    }
}

/// `original` restricted to `field`.
fn renamed(original: &Node, field: &str) -> Node {
    match original.as_leaf() {
        Some(leaf) if leaf.is_unfielded() => Node::Leaf(leaf.with_field(field)),
        _ => original.clone(),
    }
}

fn field_replacement(
    original: &Node,
    field: &str,
    values: &ValueSet,
    negative: bool,
    limits: ReplacementLimits,
) -> Node {
    if !limits.expand_values {
        return renamed(original, field);
    }
    if values.threshold_exceeded || values.values.len() > limits.max_values {
        return create(MarkerKind::ExceededValue, renamed(original, field));
    }

    let (op, kind) = if negative {
        (CompareOp::Ne, JunctionKind::And)
    } else {
        (CompareOp::Eq, JunctionKind::Or)
    };
    let mut terms: Vec<Node> = values
        .values
        .iter()
        .map(|value| Node::leaf(field, op, value.as_str()))
        .collect();
    match terms.len() {
        0 => renamed(original, field),
        1 => terms.pop().unwrap_or_default(),
        _ => Node::junction(kind, terms).grouped(),
    }
}
