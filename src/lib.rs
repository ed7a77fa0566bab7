//! Sift - query rewriting and planning for index-backed boolean filters
//!
//! Sift takes a parsed filter expression over record fields and rewrites it
//! into an equivalent tree that an inverted global index can answer, leaving
//! the rest to per-record evaluation.

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

// Re-export core crates
pub use common_config as config;
pub use common_error as error;
pub use common_runtime as runtime;
pub use sift_ast as ast;
pub use sift_metadata as metadata;
pub use sift_planner as planner;

/// Sift version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
