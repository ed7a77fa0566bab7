//! Configuration for sift planning.
//!
//! Provides the read-only record consulted by the rewrite passes: lookup pool
//! sizing, expansion toggles, timeouts and the thresholds that switch large
//! expansions over to marker-based evaluation.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Global sift configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiftConfig {
    /// Index expansion configuration.
    pub expansion: ExpansionConfig,
    /// Metadata caching configuration.
    pub metadata: MetadataConfig,
    /// Ingest types the query is restricted to. Empty means all types.
    pub datatype_filter: BTreeSet<String>,
    /// Prune branches that can never match once expansion has run.
    pub reduce_query: bool,
}

impl SiftConfig {
    /// Replace the expansion configuration.
    #[must_use]
    pub fn with_expansion(mut self, expansion: ExpansionConfig) -> Self {
        self.expansion = expansion;
        self
    }

    /// Enable or disable truth pruning after expansion.
    #[must_use]
    pub fn with_reduce_query(mut self, enable: bool) -> Self {
        self.reduce_query = enable;
        self
    }

    /// Restrict the query to the given ingest types.
    #[must_use]
    pub fn with_datatype_filter<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.datatype_filter = types.into_iter().map(Into::into).collect();
        self
    }
}

/// Index expansion configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionConfig {
    /// Number of worker threads in the per-call lookup pool.
    pub lookup_threads: usize,
    /// Timeout for a single index lookup, in milliseconds.
    pub lookup_timeout_ms: u64,
    /// Replace unfielded terms with the fields the index reports.
    pub expand_fields: bool,
    /// Replace patterns and ranges with the concrete values the index reports.
    pub expand_values: bool,
    /// Also expand unfielded terms that appear under a negation.
    pub expand_unfielded_negations: bool,
    /// Keep a fielded regex or range alongside its expansion.
    pub keep_original_terms: bool,
    /// Values per field above which a term is marked instead of expanded.
    pub max_value_expansion_threshold: usize,
    /// Fields per unfielded term above which the term is marked instead of expanded.
    pub max_unfielded_expansion_threshold: usize,
    /// Disjunction size above which a single-field list is marked.
    pub max_or_expansion_threshold: usize,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            lookup_threads: 8,
            lookup_timeout_ms: 60_000,
            expand_fields: true,
            expand_values: true,
            expand_unfielded_negations: false,
            keep_original_terms: false,
            max_value_expansion_threshold: 5_000,
            max_unfielded_expansion_threshold: 50,
            max_or_expansion_threshold: 500,
        }
    }
}

impl ExpansionConfig {
    /// The lookup timeout as a `Duration`.
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    /// Set the lookup pool size.
    #[must_use]
    pub fn with_lookup_threads(mut self, threads: usize) -> Self {
        self.lookup_threads = threads;
        self
    }

    /// Set the lookup timeout.
    #[must_use]
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Enable or disable expansion of negated unfielded terms.
    #[must_use]
    pub fn with_unfielded_negations(mut self, enable: bool) -> Self {
        self.expand_unfielded_negations = enable;
        self
    }

    /// Enable or disable keeping originals next to their expansion.
    #[must_use]
    pub fn with_keep_original_terms(mut self, enable: bool) -> Self {
        self.keep_original_terms = enable;
        self
    }
}

/// Metadata caching configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Time-to-live for cached ingest types, in seconds.
    pub type_cache_ttl_secs: u64,
    /// Maximum number of fields held in the ingest-type cache.
    pub type_cache_capacity: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            type_cache_ttl_secs: 3_600,
            type_cache_capacity: 10_000,
        }
    }
}

impl MetadataConfig {
    /// The cache TTL as a `Duration`.
    pub fn type_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.type_cache_ttl_secs)
    }
}
