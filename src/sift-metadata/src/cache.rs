//! Ingest-type cache.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use common_config::MetadataConfig;
use common_error::SiftResult;
use log::trace;

use crate::metadata::MetadataService;

/// Read-through cache of field ingest types.
///
/// Entries expire after the configured TTL. The cache is owned by whoever
/// builds it; share it across planning calls with an `Arc`.
pub struct TypeMetadata {
    service: Arc<dyn MetadataService>,
    cache: moka::sync::Cache<String, Arc<BTreeSet<String>>>,
}

impl fmt::Debug for TypeMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeMetadata")
            .field("entry_count", &self.cache.entry_count())
            .finish()
    }
}

impl TypeMetadata {
    /// Create a cache in front of `service`.
    pub fn new(service: Arc<dyn MetadataService>, config: &MetadataConfig) -> Self {
        let cache = moka::sync::Cache::builder()
            .max_capacity(config.type_cache_capacity)
            .time_to_live(config.type_cache_ttl())
            .build();
        Self { service, cache }
    }

    /// Ingest types for `field`, fetched on a miss.
    pub fn datatypes_for_field(&self, field: &str) -> SiftResult<Arc<BTreeSet<String>>> {
        if let Some(types) = self.cache.get(field) {
            return Ok(types);
        }
        let types = Arc::new(self.service.datatypes_for_field(field)?);
        trace!("Cached {} ingest types for {field}", types.len());
        self.cache.insert(field.to_string(), Arc::clone(&types));
        Ok(types)
    }

    /// Drop every cached entry.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Number of cached entries.
    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}
