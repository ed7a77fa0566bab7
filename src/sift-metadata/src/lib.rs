//! Metadata and index collaborators for sift.
//!
//! Planning consults two external services:
//!
//! - [`MetadataService`]: field classifications (indexed, index-only,
//!   non-event, composite) and the ingest types producing each field
//! - [`IndexLookupService`]: asynchronous lookups against the global index,
//!   answering which fields and values match a term
//!
//! [`TypeMetadata`] puts an expiring cache in front of ingest-type lookups.
//! [`memory`] provides map-backed implementations of both services.
//!
//! # Example
//!
//! ```rust
//! use std::collections::BTreeSet;
//! use sift_metadata::memory::{FieldInfo, InMemoryMetadata};
//! use sift_metadata::MetadataService;
//!
//! let metadata = InMemoryMetadata::new()
//!     .with_field("NAME", FieldInfo::indexed(["person"]))
//!     .with_field("NOTES", FieldInfo::unindexed(["person"]));
//!
//! let indexed = metadata.indexed_fields(&BTreeSet::new()).unwrap();
//! assert!(indexed.contains("NAME"));
//! ```

mod cache;
mod lookup;
pub mod memory;
mod metadata;

pub use cache::TypeMetadata;
pub use lookup::{IndexLookupService, IndexMatches, LookupError, LookupTerm, RangeBound, ValueSet};
pub use metadata::{FieldClassification, MetadataService};
