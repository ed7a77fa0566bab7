//! Index lookup service.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use async_trait::async_trait;
use common_error::SiftError;
use serde::{Deserialize, Serialize};
use sift_ast::Literal;
use thiserror::Error;

// ============================================================================
// Lookup terms
// ============================================================================

/// One end of a range lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RangeBound {
    /// Bound value.
    pub value: Literal,
    /// Whether the bound itself is in range.
    pub inclusive: bool,
}

impl RangeBound {
    /// An inclusive bound.
    pub fn inclusive(value: impl Into<Literal>) -> Self {
        Self {
            value: value.into(),
            inclusive: true,
        }
    }

    /// An exclusive bound.
    pub fn exclusive(value: impl Into<Literal>) -> Self {
        Self {
            value: value.into(),
            inclusive: false,
        }
    }
}

/// What to ask the index for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LookupTerm {
    /// Every field holding `value`, or a value matching it when `regex` is set.
    Unfielded {
        /// Literal value or pattern.
        value: String,
        /// Whether `value` is a pattern.
        regex: bool,
    },
    /// Values of `field` matching `pattern`.
    Regex {
        /// Field to search.
        field: String,
        /// Pattern to match.
        pattern: String,
    },
    /// Values of `field` between two bounds.
    Range {
        /// Field to search.
        field: String,
        /// Lower bound.
        lower: RangeBound,
        /// Upper bound.
        upper: RangeBound,
    },
}

impl fmt::Display for LookupTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unfielded { value, regex: false } => write!(f, "*:{value}"),
            Self::Unfielded { value, regex: true } => write!(f, "*:/{value}/"),
            Self::Regex { field, pattern } => write!(f, "{field}:/{pattern}/"),
            Self::Range {
                field,
                lower,
                upper,
            } => write!(
                f,
                "{field}:{}{}..{}{}",
                if lower.inclusive { '[' } else { '(' },
                lower.value,
                upper.value,
                if upper.inclusive { ']' } else { ')' },
            ),
        }
    }
}

// ============================================================================
// Lookup results
// ============================================================================

/// Values found for one field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSet {
    /// Matching values.
    pub values: BTreeSet<String>,
    /// The index stopped collecting values for this field.
    pub threshold_exceeded: bool,
}

impl ValueSet {
    /// A complete set of values.
    pub fn of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            threshold_exceeded: false,
        }
    }

    /// A set the index gave up on.
    pub fn exceeded() -> Self {
        Self {
            values: BTreeSet::new(),
            threshold_exceeded: true,
        }
    }
}

/// Result of one index lookup: field to matching values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMatches {
    /// Matching values per field.
    pub fields: BTreeMap<String, ValueSet>,
    /// The index stopped collecting fields.
    pub key_threshold_exceeded: bool,
}

impl IndexMatches {
    /// No matches.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `values` for `field`.
    #[must_use]
    pub fn with_field<I, S>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields
            .entry(field.into())
            .or_default()
            .values
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Mark `field` as having too many values.
    #[must_use]
    pub fn with_exceeded_field(mut self, field: impl Into<String>) -> Self {
        self.fields.insert(field.into(), ValueSet::exceeded());
        self
    }

    /// Whether nothing matched.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && !self.key_threshold_exceeded
    }

    /// Matched field names.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

// ============================================================================
// Service
// ============================================================================

/// Errors reported by an index lookup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    /// The range or pattern cannot be evaluated. Recoverable.
    #[error("malformed range: {0}")]
    MalformedRange(String),

    /// The index cannot be reached. Fatal.
    #[error("index unavailable: {0}")]
    Unavailable(String),
}

impl LookupError {
    /// Convert into a planning error, attaching the rendered subtree.
    pub fn into_error(self, subtree: impl Into<String>) -> SiftError {
        match self {
            Self::MalformedRange(msg) => SiftError::malformed_range(msg, subtree),
            Self::Unavailable(msg) => SiftError::backing_store(msg),
        }
    }
}

/// Asynchronous access to the global index.
#[async_trait]
pub trait IndexLookupService: Send + Sync {
    /// Look up `term`. Timeouts are enforced by the caller.
    async fn lookup(&self, term: &LookupTerm) -> Result<IndexMatches, LookupError>;
}

#[cfg(test)]
mod tests {
    use common_error::ErrorCode;

    use super::*;

    #[test]
    fn test_term_display() {
        let term = LookupTerm::Range {
            field: "F".into(),
            lower: RangeBound::exclusive(1),
            upper: RangeBound::inclusive(10),
        };
        assert_eq!(term.to_string(), "F:(1..10]");
        assert_eq!(
            LookupTerm::Unfielded {
                value: "x".into(),
                regex: false
            }
            .to_string(),
            "*:x"
        );
    }

    #[test]
    fn test_matches_builder() {
        let matches = IndexMatches::new()
            .with_field("A", ["1", "2"])
            .with_field("A", ["3"])
            .with_exceeded_field("B");
        assert_eq!(matches.fields["A"].values.len(), 3);
        assert!(matches.fields["B"].threshold_exceeded);
        assert_eq!(matches.field_names().collect::<Vec<_>>(), vec!["A", "B"]);
        assert!(IndexMatches::new().is_empty());
    }

    #[test]
    fn test_error_conversion() {
        let err = LookupError::MalformedRange("lower above upper".into()).into_error("F > 9");
        assert_eq!(err.code(), ErrorCode::MalformedRange);
        assert!(!err.is_fatal());

        let err = LookupError::Unavailable("offline".into()).into_error("F > 9");
        assert_eq!(err.code(), ErrorCode::BackingStoreUnavailable);
        assert!(err.is_fatal());
    }
}
