//! Error types and result aliases for sift.
//!
//! Every pass and collaborator reports failures through [`SiftError`]; the
//! [`ErrorCode`] attached to each variant is what callers surface to users.

mod error;

pub use error::{ErrorCode, GenericError, SiftError, SiftResult};
