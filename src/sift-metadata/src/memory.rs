//! In-memory metadata and index.
//!
//! Both collaborators hold their data in plain maps and can be switched
//! offline to exercise the fatal error paths. The index also counts calls and
//! can be slowed down to trigger lookup timeouts.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common_error::{SiftError, SiftResult};
use log::trace;
use regex::Regex;

use crate::lookup::{IndexLookupService, IndexMatches, LookupError, LookupTerm, RangeBound, ValueSet};
use crate::metadata::MetadataService;

// ============================================================================
// InMemoryMetadata
// ============================================================================

/// Classification of one field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldInfo {
    /// Ingest types producing the field.
    pub datatypes: BTreeSet<String>,
    /// Has a global index entry.
    pub indexed: bool,
    /// Exists only in the index.
    pub index_only: bool,
    /// Not stored with the event record.
    pub non_event: bool,
    /// Built from other fields.
    pub composite: bool,
}

impl FieldInfo {
    /// An indexed field produced by `datatypes`.
    pub fn indexed<I, S>(datatypes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            datatypes: datatypes.into_iter().map(Into::into).collect(),
            indexed: true,
            ..Self::default()
        }
    }

    /// An unindexed field produced by `datatypes`.
    pub fn unindexed<I, S>(datatypes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            datatypes: datatypes.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Mark the field index-only. Index-only fields are also non-event.
    #[must_use]
    pub fn index_only(mut self) -> Self {
        self.index_only = true;
        self.non_event = true;
        self
    }

    /// Mark the field non-event.
    #[must_use]
    pub fn non_event(mut self) -> Self {
        self.non_event = true;
        self
    }

    /// Mark the field composite.
    #[must_use]
    pub fn composite(mut self) -> Self {
        self.composite = true;
        self
    }

    fn visible(&self, filter: &BTreeSet<String>) -> bool {
        filter.is_empty() || !self.datatypes.is_disjoint(filter)
    }
}

/// Metadata service backed by a map of field classifications.
#[derive(Debug, Default)]
pub struct InMemoryMetadata {
    fields: BTreeMap<String, FieldInfo>,
    offline: AtomicBool,
}

impl InMemoryMetadata {
    /// Create an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, info: FieldInfo) -> Self {
        self.fields.insert(name.into(), info);
        self
    }

    /// Take the backing store online or offline.
    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    fn check_available(&self) -> SiftResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(SiftError::backing_store("metadata table is offline"));
        }
        Ok(())
    }

    fn select(
        &self,
        filter: &BTreeSet<String>,
        predicate: impl Fn(&FieldInfo) -> bool,
    ) -> SiftResult<BTreeSet<String>> {
        self.check_available()?;
        Ok(self
            .fields
            .iter()
            .filter(|(_, info)| info.visible(filter) && predicate(info))
            .map(|(name, _)| name.clone())
            .collect())
    }
}

impl MetadataService for InMemoryMetadata {
    fn is_indexed(&self, field: &str, filter: &BTreeSet<String>) -> SiftResult<bool> {
        self.check_available()?;
        Ok(self
            .fields
            .get(field)
            .is_some_and(|info| info.indexed && info.visible(filter)))
    }

    fn datatypes_for_field(&self, field: &str) -> SiftResult<BTreeSet<String>> {
        self.check_available()?;
        Ok(self
            .fields
            .get(field)
            .map(|info| info.datatypes.clone())
            .unwrap_or_default())
    }

    fn index_only_fields(&self, filter: &BTreeSet<String>) -> SiftResult<BTreeSet<String>> {
        self.select(filter, |info| info.index_only)
    }

    fn all_fields(&self, filter: &BTreeSet<String>) -> SiftResult<BTreeSet<String>> {
        self.select(filter, |_| true)
    }

    fn indexed_fields(&self, filter: &BTreeSet<String>) -> SiftResult<BTreeSet<String>> {
        self.select(filter, |info| info.indexed)
    }

    fn non_event_fields(&self, filter: &BTreeSet<String>) -> SiftResult<BTreeSet<String>> {
        self.select(filter, |info| info.non_event)
    }

    fn composite_fields(&self, filter: &BTreeSet<String>) -> SiftResult<BTreeSet<String>> {
        self.select(filter, |info| info.composite)
    }
}

// ============================================================================
// InMemoryIndex
// ============================================================================

/// Global index backed by a map of field to values.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    entries: BTreeMap<String, BTreeSet<String>>,
    value_limit: Option<usize>,
    delay: Option<Duration>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl InMemoryIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `values` under `field`.
    #[must_use]
    pub fn with_values<I, S>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries
            .entry(field.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Flag a field as exceeded once it matches more than `limit` values.
    #[must_use]
    pub fn with_value_limit(mut self, limit: usize) -> Self {
        self.value_limit = Some(limit);
        self
    }

    /// Sleep for `delay` before answering each lookup.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Take the index online or offline.
    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    /// Number of lookups received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn collect<'a>(
        &'a self,
        fields: impl Iterator<Item = (&'a String, &'a BTreeSet<String>)>,
        matches: impl Fn(&str) -> bool,
    ) -> IndexMatches {
        let mut result = IndexMatches::new();
        for (field, values) in fields {
            let found: BTreeSet<String> = values.iter().filter(|v| matches(v.as_str())).cloned().collect();
            if found.is_empty() {
                continue;
            }
            let set = match self.value_limit {
                Some(limit) if found.len() > limit => ValueSet::exceeded(),
                _ => ValueSet {
                    values: found,
                    threshold_exceeded: false,
                },
            };
            result.fields.insert(field.clone(), set);
        }
        result
    }

    fn field_entries<'a>(
        &'a self,
        field: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a BTreeSet<String>)> {
        self.entries.iter().filter(move |(name, _)| name.as_str() == field)
    }
}

fn anchored(pattern: &str) -> Result<Regex, LookupError> {
    Regex::new(&format!("^(?:{pattern})$"))
        .map_err(|e| LookupError::MalformedRange(format!("invalid pattern '{pattern}': {e}")))
}

/// Compare numerically when both sides are integers, else as text.
fn compare_values(a: &str, b: &str) -> CmpOrdering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

fn bound_text(bound: &RangeBound) -> Result<String, LookupError> {
    bound
        .value
        .as_text()
        .ok_or_else(|| LookupError::MalformedRange("range bound is null".to_string()))
}

fn in_range(value: &str, lower: &(String, bool), upper: &(String, bool)) -> bool {
    let above = match compare_values(value, &lower.0) {
        CmpOrdering::Greater => true,
        CmpOrdering::Equal => lower.1,
        CmpOrdering::Less => false,
    };
    let below = match compare_values(value, &upper.0) {
        CmpOrdering::Less => true,
        CmpOrdering::Equal => upper.1,
        CmpOrdering::Greater => false,
    };
    above && below
}

#[async_trait]
impl IndexLookupService for InMemoryIndex {
    async fn lookup(&self, term: &LookupTerm) -> Result<IndexMatches, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        trace!("Index lookup {term}");
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(LookupError::Unavailable("index tablet is offline".to_string()));
        }

        match term {
            LookupTerm::Unfielded { value, regex: false } => {
                Ok(self.collect(self.entries.iter(), |v| v == value.as_str()))
            }
            LookupTerm::Unfielded { value, regex: true } => {
                let re = anchored(value)?;
                Ok(self.collect(self.entries.iter(), |v| re.is_match(v)))
            }
            LookupTerm::Regex { field, pattern } => {
                let re = anchored(pattern)?;
                Ok(self.collect(self.field_entries(field), |v| re.is_match(v)))
            }
            LookupTerm::Range {
                field,
                lower,
                upper,
            } => {
                let lower = (bound_text(lower)?, lower.inclusive);
                let upper = (bound_text(upper)?, upper.inclusive);
                if compare_values(&lower.0, &upper.0) == CmpOrdering::Greater {
                    return Err(LookupError::MalformedRange(format!(
                        "lower bound {} is above upper bound {}",
                        lower.0, upper.0
                    )));
                }
                Ok(self.collect(self.field_entries(field), |v| in_range(v, &lower, &upper)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> InMemoryMetadata {
        InMemoryMetadata::new()
            .with_field("A", FieldInfo::indexed(["T1"]))
            .with_field("B", FieldInfo::unindexed(["T2"]))
            .with_field("C", FieldInfo::indexed(["T1", "T2"]).index_only())
            .with_field("D", FieldInfo::indexed(["T2"]).composite())
    }

    fn filter(types: &[&str]) -> BTreeSet<String> {
        types.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_metadata_sets() {
        let md = metadata();
        let all = filter(&[]);
        assert_eq!(md.indexed_fields(&all).unwrap(), filter(&["A", "C", "D"]));
        assert_eq!(md.index_only_fields(&all).unwrap(), filter(&["C"]));
        assert_eq!(md.non_event_fields(&all).unwrap(), filter(&["C"]));
        assert_eq!(md.composite_fields(&all).unwrap(), filter(&["D"]));
        assert!(md.is_indexed("A", &all).unwrap());
        assert!(!md.is_indexed("B", &all).unwrap());
        assert!(md.datatypes_for_field("Z").unwrap().is_empty());
    }

    #[test]
    fn test_metadata_datatype_filter() {
        let md = metadata();
        let t2 = filter(&["T2"]);
        assert_eq!(md.all_fields(&t2).unwrap(), filter(&["B", "C", "D"]));
        assert!(!md.is_indexed("A", &t2).unwrap());
    }

    #[test]
    fn test_metadata_offline() {
        let md = metadata();
        md.set_available(false);
        let err = md.all_fields(&filter(&[])).unwrap_err();
        assert!(err.is_fatal());
    }

    fn index() -> InMemoryIndex {
        InMemoryIndex::new()
            .with_values("NAME", ["alice", "bob"])
            .with_values("ALIAS", ["bob"])
            .with_values("AGE", ["7", "30", "41"])
    }

    #[tokio::test]
    async fn test_unfielded_lookup() {
        let idx = index();
        let matches = idx
            .lookup(&LookupTerm::Unfielded {
                value: "bob".into(),
                regex: false,
            })
            .await
            .unwrap();
        assert_eq!(matches.field_names().collect::<Vec<_>>(), vec!["ALIAS", "NAME"]);
        assert_eq!(idx.calls(), 1);
    }

    #[tokio::test]
    async fn test_regex_lookup() {
        let idx = index();
        let matches = idx
            .lookup(&LookupTerm::Regex {
                field: "NAME".into(),
                pattern: "a.*".into(),
            })
            .await
            .unwrap();
        assert_eq!(matches.fields["NAME"], ValueSet::of(["alice"]));
    }

    #[tokio::test]
    async fn test_invalid_regex_is_malformed() {
        let err = index()
            .lookup(&LookupTerm::Regex {
                field: "NAME".into(),
                pattern: "(".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::MalformedRange(_)));
    }

    #[tokio::test]
    async fn test_range_lookup_is_numeric() {
        let matches = index()
            .lookup(&LookupTerm::Range {
                field: "AGE".into(),
                lower: RangeBound::exclusive(7),
                upper: RangeBound::inclusive(41),
            })
            .await
            .unwrap();
        assert_eq!(matches.fields["AGE"], ValueSet::of(["30", "41"]));
    }

    #[tokio::test]
    async fn test_inverted_range_is_malformed() {
        let err = index()
            .lookup(&LookupTerm::Range {
                field: "AGE".into(),
                lower: RangeBound::inclusive(50),
                upper: RangeBound::inclusive(10),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::MalformedRange(_)));
    }

    #[tokio::test]
    async fn test_value_limit_flags_field() {
        let idx = index().with_value_limit(1);
        let matches = idx
            .lookup(&LookupTerm::Regex {
                field: "AGE".into(),
                pattern: ".*".into(),
            })
            .await
            .unwrap();
        assert!(matches.fields["AGE"].threshold_exceeded);
    }

    #[tokio::test]
    async fn test_offline_index() {
        let idx = index();
        idx.set_available(false);
        let err = idx
            .lookup(&LookupTerm::Unfielded {
                value: "bob".into(),
                regex: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::Unavailable(_)));
    }
}
