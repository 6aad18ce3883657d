use super::*;

#[test]
fn missing_api_key_degrades_to_diagnostic() {
    let search = SerpApiSearch::new(&ExternalSearchConfig::default());

    assert!(!search.is_configured());
    assert_eq!(
        search.search("HANA out of memory", 3),
        vec!["External search failed: API key not configured".to_string()]
    );
}

#[test]
fn blank_api_key_counts_as_missing() {
    let config = ExternalSearchConfig {
        api_key: Some("   ".to_string()),
        ..ExternalSearchConfig::default()
    };
    let search = SerpApiSearch::new(&config);

    assert!(!search.is_configured());
    assert_eq!(
        search.search("query", 3),
        vec![failure_message("API key not configured")]
    );
}

#[test]
fn invalid_endpoint_degrades_to_diagnostic() {
    let config = ExternalSearchConfig {
        api_key: Some("key".to_string()),
        endpoint: "not a url".to_string(),
        ..ExternalSearchConfig::default()
    };

    let results = SerpApiSearch::new(&config).search("query", 3);
    assert_eq!(results.len(), 1);
    assert!(results[0].starts_with(FAILURE_PREFIX));
}

#[test]
fn unreachable_endpoint_degrades_to_diagnostic() {
    let config = ExternalSearchConfig {
        api_key: Some("key".to_string()),
        endpoint: "http://127.0.0.1:9/search".to_string(),
        timeout_seconds: 1,
        ..ExternalSearchConfig::default()
    };

    let results = SerpApiSearch::new(&config).search("query", 3);
    assert_eq!(results.len(), 1);
    assert!(results[0].starts_with("External search failed: "));
}

#[test]
fn response_parsing_tolerates_missing_fields() {
    let response: SerpResponse = serde_json::from_str(r#"{"search_metadata": {}}"#)
        .expect("organic_results defaults to empty");
    assert!(response.organic_results.is_empty());
    assert!(response.error.is_none());
}

#[test]
fn debug_output_masks_api_key() {
    let config = ExternalSearchConfig {
        api_key: Some("6bbf05bfc95ea39d0123".to_string()),
        ..ExternalSearchConfig::default()
    };
    let debug = format!("{:?}", SerpApiSearch::new(&config));

    assert!(debug.contains("6bbf05bf..."));
    assert!(!debug.contains("6bbf05bfc95ea39d0123"));
}
