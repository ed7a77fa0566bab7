//! Field metadata service.

use std::collections::BTreeSet;

use common_error::SiftResult;

/// Field classifications consulted during planning.
///
/// Every method may fail with `BackingStoreUnavailable`, which planning
/// treats as fatal. `filter` restricts the answer to fields produced by the
/// given ingest types; an empty filter means all types.
pub trait MetadataService: Send + Sync {
    /// Whether `field` has a global index entry.
    fn is_indexed(&self, field: &str, filter: &BTreeSet<String>) -> SiftResult<bool>;

    /// Ingest types that can produce `field`.
    fn datatypes_for_field(&self, field: &str) -> SiftResult<BTreeSet<String>>;

    /// Fields that exist only in the index, never in stored records.
    fn index_only_fields(&self, filter: &BTreeSet<String>) -> SiftResult<BTreeSet<String>>;

    /// Every known field.
    fn all_fields(&self, filter: &BTreeSet<String>) -> SiftResult<BTreeSet<String>>;

    /// Fields with a global index entry.
    fn indexed_fields(&self, filter: &BTreeSet<String>) -> SiftResult<BTreeSet<String>>;

    /// Fields that are not stored with the event record.
    fn non_event_fields(&self, filter: &BTreeSet<String>) -> SiftResult<BTreeSet<String>>;

    /// Fields built from other fields. Expansion may be asked to skip them.
    fn composite_fields(&self, _filter: &BTreeSet<String>) -> SiftResult<BTreeSet<String>> {
        Ok(BTreeSet::new())
    }
}

/// A snapshot of the field sets one planning call works with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldClassification {
    /// Fields with a global index entry.
    pub indexed: BTreeSet<String>,
    /// Fields that exist only in the index.
    pub index_only: BTreeSet<String>,
    /// Fields not stored with the event record.
    pub non_event: BTreeSet<String>,
}

impl FieldClassification {
    /// Fetch the field sets for `filter` from `service`.
    pub fn fetch(service: &dyn MetadataService, filter: &BTreeSet<String>) -> SiftResult<Self> {
        Ok(Self {
            indexed: service.indexed_fields(filter)?,
            index_only: service.index_only_fields(filter)?,
            non_event: service.non_event_fields(filter)?,
        })
    }

    /// Whether `field` is indexed.
    pub fn is_indexed(&self, field: &str) -> bool {
        self.indexed.contains(field)
    }

    /// Whether `field` is index-only.
    pub fn is_index_only(&self, field: &str) -> bool {
        self.index_only.contains(field)
    }

    /// Whether `field` is a non-event field.
    pub fn is_non_event(&self, field: &str) -> bool {
        self.non_event.contains(field)
    }
}
