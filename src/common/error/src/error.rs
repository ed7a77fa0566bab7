//! Core error types for sift.

use std::fmt;

use thiserror::Error;

/// Result type alias using `SiftError`.
pub type SiftResult<T> = std::result::Result<T, SiftError>;

/// Generic boxed error for external error sources.
pub type GenericError = Box<dyn std::error::Error + Send + Sync>;

/// Stable numeric codes carried by every error.
///
/// Codes in the 1xx range abort planning; 2xx codes are recoverable and
/// 9xx codes indicate a bug or misuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The metadata or index store could not be reached.
    BackingStoreUnavailable,
    /// An index lookup exceeded the configured timeout.
    LookupTimeout,
    /// A top-level expansion matched nothing in the index.
    NoExpansionMatch,
    /// The marker registry is malformed.
    MarkerRegistration,
    /// A range or regex could not be evaluated by the index.
    MalformedRange,
    /// A tree violates a structural invariant.
    InvalidTree,
    /// A parameter is out of range.
    InvalidParameter,
    /// Serialization failure.
    Serialization,
    /// Failure reported by a third-party library.
    External,
    /// Internal error (bug in sift).
    Internal,
}

impl ErrorCode {
    /// The numeric value of this code.
    pub const fn as_u16(self) -> u16 {
        match self {
            Self::BackingStoreUnavailable => 101,
            Self::LookupTimeout => 102,
            Self::NoExpansionMatch => 103,
            Self::MarkerRegistration => 104,
            Self::MalformedRange => 201,
            Self::InvalidTree => 901,
            Self::InvalidParameter => 902,
            Self::Serialization => 903,
            Self::External => 904,
            Self::Internal => 999,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.as_u16())
    }
}

/// Core error type for sift operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SiftError {
    /// The metadata or index store is unavailable.
    #[error("BackingStoreUnavailable: {0}")]
    BackingStoreUnavailable(String),

    /// An index lookup did not finish in time.
    #[error("LookupTimeout: {message} [subtree: {subtree}]")]
    LookupTimeout {
        /// What timed out.
        message: String,
        /// Rendered subtree whose lookup timed out.
        subtree: String,
    },

    /// The whole expanded tree resolved to nothing.
    #[error("NoExpansionMatch: no index entries for [subtree: {subtree}]")]
    NoExpansionMatch {
        /// Rendered tree that could not be matched.
        subtree: String,
    },

    /// The marker registry contains a duplicate or missing label.
    #[error("MarkerRegistration: {0}")]
    MarkerRegistration(String),

    /// The index rejected a range or regex.
    #[error("MalformedRange: {message} [subtree: {subtree}]")]
    MalformedRange {
        /// Reason reported by the index.
        message: String,
        /// Rendered subtree that was left unexpanded.
        subtree: String,
    },

    /// A tree violates a structural invariant.
    #[error("InvalidTree: {0}")]
    InvalidTree(String),

    /// Invalid parameter provided.
    #[error("InvalidParameter: {0}")]
    InvalidParameter(String),

    /// Internal error (bug in sift).
    #[error("InternalError: {0}")]
    InternalError(String),

    /// JSON serialization error.
    #[error("SerdeJsonError: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// External error from third-party libraries.
    #[error("ExternalError: {0}")]
    ExternalError(GenericError),
}

impl SiftError {
    /// Create a new `BackingStoreUnavailable` error.
    pub fn backing_store<S: Into<String>>(msg: S) -> Self {
        Self::BackingStoreUnavailable(msg.into())
    }

    /// Create a new `LookupTimeout` error for the given subtree.
    pub fn lookup_timeout<S: Into<String>, T: Into<String>>(msg: S, subtree: T) -> Self {
        Self::LookupTimeout {
            message: msg.into(),
            subtree: subtree.into(),
        }
    }

    /// Create a new `NoExpansionMatch` error.
    pub fn no_expansion_match<S: Into<String>>(subtree: S) -> Self {
        Self::NoExpansionMatch {
            subtree: subtree.into(),
        }
    }

    /// Create a new `MarkerRegistration` error.
    pub fn marker_registration<S: Into<String>>(msg: S) -> Self {
        Self::MarkerRegistration(msg.into())
    }

    /// Create a new `MalformedRange` error.
    pub fn malformed_range<S: Into<String>, T: Into<String>>(msg: S, subtree: T) -> Self {
        Self::MalformedRange {
            message: msg.into(),
            subtree: subtree.into(),
        }
    }

    /// Create a new `InvalidTree` error.
    pub fn invalid_tree<S: Into<String>>(msg: S) -> Self {
        Self::InvalidTree(msg.into())
    }

    /// Create a new `InvalidParameter` error.
    pub fn invalid_parameter<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Create a new `InternalError`.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::InternalError(msg.into())
    }

    /// Create a cancellation error (using `InternalError`).
    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        Self::InternalError(format!("Cancelled: {}", msg.into()))
    }

    /// The stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::BackingStoreUnavailable(_) => ErrorCode::BackingStoreUnavailable,
            Self::LookupTimeout { .. } => ErrorCode::LookupTimeout,
            Self::NoExpansionMatch { .. } => ErrorCode::NoExpansionMatch,
            Self::MarkerRegistration(_) => ErrorCode::MarkerRegistration,
            Self::MalformedRange { .. } => ErrorCode::MalformedRange,
            Self::InvalidTree(_) => ErrorCode::InvalidTree,
            Self::InvalidParameter(_) => ErrorCode::InvalidParameter,
            Self::InternalError(_) => ErrorCode::Internal,
            Self::SerdeJsonError(_) => ErrorCode::Serialization,
            Self::ExternalError(_) => ErrorCode::External,
        }
    }

    /// Whether this error must abort the whole planning pipeline.
    ///
    /// Only a malformed range is handled locally; the offending subtree is
    /// left unexpanded.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::MalformedRange { .. })
    }

    /// The rendered subtree attached to this error, if any.
    pub fn subtree(&self) -> Option<&str> {
        match self {
            Self::LookupTimeout { subtree, .. }
            | Self::NoExpansionMatch { subtree }
            | Self::MalformedRange { subtree, .. } => Some(subtree),
            _ => None,
        }
    }
}

/// Ensure a condition holds, returning an `InvalidTree` error if not.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $variant:ident: $($msg:tt)*) => {
        if !$cond {
            return Err($crate::SiftError::$variant(format!($($msg)*)));
        }
    };
    ($cond:expr, $msg:expr) => {
        if !$cond {
            return Err($crate::SiftError::InvalidTree($msg.to_string()));
        }
    };
}

/// Return early with an `InvalidTree` error.
#[macro_export]
macro_rules! invalid_tree {
    ($($arg:tt)*) => {
        return Err($crate::SiftError::InvalidTree(format!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SiftError::backing_store("metadata table offline");
        assert_eq!(
            err.to_string(),
            "BackingStoreUnavailable: metadata table offline"
        );

        let err = SiftError::no_expansion_match("_ANYFIELD_ == 'x'");
        assert_eq!(
            err.to_string(),
            "NoExpansionMatch: no index entries for [subtree: _ANYFIELD_ == 'x']"
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            SiftError::lookup_timeout("slow", "F =~ 'a.*'").code(),
            ErrorCode::LookupTimeout
        );
        assert_eq!(ErrorCode::LookupTimeout.to_string(), "E102");
        assert_eq!(ErrorCode::MalformedRange.as_u16(), 201);
    }

    #[test]
    fn test_fatal_classification() {
        assert!(SiftError::backing_store("down").is_fatal());
        assert!(SiftError::marker_registration("dup").is_fatal());
        assert!(!SiftError::malformed_range("lower > upper", "F > 9 && F < 1").is_fatal());
    }

    #[test]
    fn test_subtree_accessor() {
        let err = SiftError::malformed_range("bad", "F > 9 && F < 1");
        assert_eq!(err.subtree(), Some("F > 9 && F < 1"));
        assert_eq!(SiftError::internal("oops").subtree(), None);
    }

    fn check_depth(depth: usize) -> SiftResult<()> {
        ensure!(depth < 4, InvalidParameter: "depth {} too large", depth);
        Ok(())
    }

    #[test]
    fn test_ensure_macro() {
        assert!(check_depth(2).is_ok());
        let err = check_depth(9).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParameter);
    }
}
