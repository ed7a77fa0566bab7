//! Unit tests for common-config crate

use std::time::Duration;

use common_config::{ExpansionConfig, MetadataConfig, SiftConfig};

#[test]
fn test_sift_config_default() {
    let config = SiftConfig::default();

    assert_eq!(config.expansion.lookup_threads, 8);
    assert!(config.expansion.expand_fields);
    assert!(config.expansion.expand_values);
    assert!(!config.expansion.expand_unfielded_negations);
    assert!(config.datatype_filter.is_empty());
    assert!(!config.reduce_query);
    assert_eq!(config.metadata.type_cache_ttl_secs, 3_600);
}

#[test]
fn test_expansion_config_default() {
    let config = ExpansionConfig::default();

    assert_eq!(config.lookup_timeout(), Duration::from_secs(60));
    assert_eq!(config.max_value_expansion_threshold, 5_000);
    assert_eq!(config.max_unfielded_expansion_threshold, 50);
    assert_eq!(config.max_or_expansion_threshold, 500);
    assert!(!config.keep_original_terms);
}

#[test]
fn test_expansion_config_builders() {
    let config = ExpansionConfig::default()
        .with_lookup_threads(0)
        .with_lookup_timeout(Duration::from_millis(250))
        .with_unfielded_negations(true)
        .with_keep_original_terms(true);

    assert_eq!(config.lookup_threads, 0);
    assert_eq!(config.lookup_timeout_ms, 250);
    assert!(config.expand_unfielded_negations);
    assert!(config.keep_original_terms);
}

#[test]
fn test_metadata_config_ttl() {
    let config = MetadataConfig {
        type_cache_ttl_secs: 5,
        type_cache_capacity: 10,
    };
    assert_eq!(config.type_cache_ttl(), Duration::from_secs(5));
}

#[test]
fn test_datatype_filter_builder() {
    let config = SiftConfig::default().with_datatype_filter(["csv", "json"]);
    assert_eq!(config.datatype_filter.len(), 2);
    assert!(config.datatype_filter.contains("csv"));
}

#[test]
fn test_reduce_query_builder() {
    assert!(SiftConfig::default().with_reduce_query(true).reduce_query);
}

#[test]
fn test_sift_config_serialization() {
    let mut config = SiftConfig::default();
    config.expansion.lookup_threads = 4;
    config.expansion.expand_values = false;
    config.metadata.type_cache_capacity = 64;
    config.datatype_filter.insert("wiki".to_string());

    // Serialize to JSON
    let json = serde_json::to_string(&config).unwrap();

    // Deserialize from JSON
    let restored: SiftConfig = serde_json::from_str(&json).unwrap();

    assert_eq!(restored, config);
    assert_eq!(restored.expansion.lookup_threads, 4);
    assert!(!restored.expansion.expand_values);
}
