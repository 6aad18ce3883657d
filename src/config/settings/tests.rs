use super::*;
use std::collections::HashMap;
use tempfile::TempDir;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.embedding.provider, ProviderKind::Ollama);
    assert_eq!(config.embedding.protocol, "http");
    assert_eq!(config.embedding.host, "localhost");
    assert_eq!(config.embedding.port, 11434);
    assert_eq!(config.retrieval.top_k, 3);
    assert!((config.retrieval.threshold - 0.7).abs() < f32::EPSILON);
    assert_eq!(config.knowledge_base.title_column, "Note Title");
    assert_eq!(config.knowledge_base.description_column, "Description");
    assert_eq!(config.external_search.api_key, None);
    assert!(config.validate().is_ok());
}

#[test]
fn config_validation() {
    let config = Config::default();

    let mut invalid_config = config.clone();
    invalid_config.embedding.protocol = "ftp".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.model = String::new();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.batch_size = 1001;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.retrieval.top_k = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.retrieval.threshold = f32::NAN;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.knowledge_base.title_column = "  ".to_string();
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config;
    invalid_config.external_search.endpoint = "not a url".to_string();
    assert!(invalid_config.validate().is_err());
}

#[test]
fn ollama_url_generation() {
    let mut config = Config::default();
    let url = config
        .ollama_url()
        .expect("should generate ollama_url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/");

    config.embedding.protocol = "https".to_string();
    config.embedding.host = "secure.example.com".to_string();
    config.embedding.port = 443;
    let url = config.ollama_url().expect("should generate https url");
    assert_eq!(url.as_str(), "https://secure.example.com/");
}

#[test]
fn toml_serialization() {
    let mut config = Config::default();
    config.embedding.provider = ProviderKind::Hashing;
    config.retrieval.threshold = 1.25;
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
    assert!(toml_str.contains("provider = \"hashing\""));
}

#[test]
fn api_key_is_not_serialized_when_absent() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    assert!(!toml_str.contains("api_key"));
}

#[test]
fn partial_toml_fills_defaults() {
    let partial = r#"
        [retrieval]
        threshold = 1.5

        [knowledge_base]
        path = "data/notes.json"
    "#;

    let config: Config = toml::from_str(partial).expect("should parse partial toml");
    assert_eq!(config.retrieval.top_k, DEFAULT_TOP_K);
    assert!((config.retrieval.threshold - 1.5).abs() < f32::EPSILON);
    assert_eq!(config.knowledge_base.path, PathBuf::from("data/notes.json"));
    assert_eq!(config.knowledge_base.title_column, "Note Title");
    assert_eq!(config.embedding.model, "all-minilm:latest");
}

#[test]
fn load_missing_config_uses_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config::load(temp_dir.path()).expect("should load defaults");

    assert_eq!(config.get_base_dir(), temp_dir.path());
    assert_eq!(config.retrieval, RetrievalConfig::default());
    assert_eq!(
        config.config_file_path(),
        temp_dir.path().join("config.toml")
    );
}

#[test]
fn save_then_load() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = Config {
        base_dir: temp_dir.path().join("nested"),
        ..Config::default()
    };
    config.retrieval.top_k = 5;
    config.external_search.set_api_key(Some("abc".to_string()));

    config.save().expect("should save config");
    let loaded = Config::load(temp_dir.path().join("nested")).expect("should load config");

    assert_eq!(loaded, config);
}

#[test]
fn load_rejects_invalid_values() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[retrieval]\ntop_k = 0\n",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
fn override_replaces_invalid_file_value() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[retrieval]\ntop_k = 0\n",
    )
    .expect("should write config");

    let config = Config::load_with_lookup(temp_dir.path(), lookup_from(&[(ENV_TOP_K, "5")]))
        .expect("override fixes top_k");
    assert_eq!(config.retrieval.top_k, 5);

    let result = Config::load_with_lookup(temp_dir.path(), lookup_from(&[]));
    assert!(result.is_err());
}

#[test]
fn overrides_apply_over_file_values() {
    let mut config = Config::default();
    let lookup = lookup_from(&[
        (ENV_API_KEY, "secret-key-123456"),
        (ENV_KB_PATH, "/srv/kb.xlsx"),
        (ENV_MODEL, "nomic-embed-text"),
        (ENV_THRESHOLD, "0.9"),
        (ENV_TOP_K, "5"),
        (ENV_OLLAMA_HOST, "embeddings.internal"),
    ]);

    config.apply_overrides(lookup).expect("overrides are valid");

    assert_eq!(config.external_search.api_key(), Some("secret-key-123456"));
    assert_eq!(config.knowledge_base.path, PathBuf::from("/srv/kb.xlsx"));
    assert_eq!(config.embedding.model, "nomic-embed-text");
    assert_eq!(config.embedding.host, "embeddings.internal");
    assert!((config.retrieval.threshold - 0.9).abs() < f32::EPSILON);
    assert_eq!(config.retrieval.top_k, 5);
}

#[test]
fn ollama_host_override_accepts_ollama_forms() {
    let mut config = Config::default();
    config
        .apply_overrides(lookup_from(&[(ENV_OLLAMA_HOST, "0.0.0.0:11500")]))
        .expect("host:port is valid");
    assert_eq!(config.embedding.host, "0.0.0.0");
    assert_eq!(config.embedding.port, 11500);
    assert_eq!(config.embedding.protocol, "http");

    config
        .apply_overrides(lookup_from(&[(ENV_OLLAMA_HOST, "https://gpu-box.internal")]))
        .expect("url is valid");
    assert_eq!(config.embedding.host, "gpu-box.internal");
    assert_eq!(config.embedding.port, 443);
    assert_eq!(config.embedding.protocol, "https");

    let result = config.apply_overrides(lookup_from(&[(ENV_OLLAMA_HOST, "ftp://files")]));
    assert!(matches!(
        result,
        Err(ConfigError::InvalidEnvOverride {
            var: ENV_OLLAMA_HOST,
            ..
        })
    ));
    assert_eq!(config.embedding.host, "gpu-box.internal");
}

#[test]
fn blank_api_key_override_clears_key() {
    let mut config = Config::default();
    config.external_search.set_api_key(Some("from-file".to_string()));

    config
        .apply_overrides(lookup_from(&[(ENV_API_KEY, "   ")]))
        .expect("overrides are valid");

    assert_eq!(config.external_search.api_key(), None);
}

#[test]
fn invalid_numeric_overrides_are_errors() {
    let mut config = Config::default();
    let result = config.apply_overrides(lookup_from(&[(ENV_THRESHOLD, "high")]));
    assert!(matches!(
        result,
        Err(ConfigError::InvalidEnvOverride {
            var: ENV_THRESHOLD,
            ..
        })
    ));

    let result = config.apply_overrides(lookup_from(&[(ENV_TOP_K, "-1")]));
    assert!(matches!(
        result,
        Err(ConfigError::InvalidEnvOverride { var: ENV_TOP_K, .. })
    ));

    let result = config.apply_overrides(lookup_from(&[(ENV_THRESHOLD, "-0.5")]));
    assert!(matches!(result, Err(ConfigError::InvalidThreshold(_))));
}

#[test]
fn setter_validation() {
    let mut embedding = EmbeddingConfig::default();

    assert!(embedding.set_protocol("https".to_string()).is_ok());
    assert!(embedding.set_host("example.com".to_string()).is_ok());
    assert!(embedding.set_port(8080).is_ok());
    assert!(embedding.set_model("new-model".to_string()).is_ok());
    assert!(embedding.set_batch_size(128).is_ok());
    assert!(embedding.set_dimension(64).is_ok());
    assert!(embedding.set_provider("Hashing").is_ok());
    assert_eq!(embedding.provider, ProviderKind::Hashing);

    assert!(embedding.set_protocol("ftp".to_string()).is_err());
    assert!(embedding.set_protocol("HTTP".to_string()).is_err());
    assert!(embedding.set_host(String::new()).is_err());
    assert!(embedding.set_port(0).is_err());
    assert!(embedding.set_model("   ".to_string()).is_err());
    assert!(embedding.set_batch_size(0).is_err());
    assert!(embedding.set_dimension(4097).is_err());
    assert!(embedding.set_provider("faiss").is_err());

    let mut retrieval = RetrievalConfig::default();
    assert!(retrieval.set_top_k(100).is_ok());
    assert!(retrieval.set_top_k(101).is_err());
    assert!(retrieval.set_threshold(2.0).is_ok());
    assert!(retrieval.set_threshold(0.0).is_err());
    assert!(retrieval.set_threshold(f32::INFINITY).is_err());
}

#[test]
fn provider_id_reflects_settings() {
    let mut embedding = EmbeddingConfig::default();
    assert_eq!(embedding.provider_id(), "ollama:all-minilm:latest@localhost:11434");

    embedding.provider = ProviderKind::Hashing;
    embedding.dimension = 64;
    assert_eq!(embedding.provider_id(), "hashing:64");
}

#[test]
fn api_key_masking() {
    let mut external = ExternalSearchConfig::default();
    assert_eq!(external.masked_api_key(), None);

    external.set_api_key(Some("6bbf05bfc95ea39d".to_string()));
    assert_eq!(external.masked_api_key().as_deref(), Some("6bbf05bf..."));

    let debug = format!("{external:?}");
    assert!(!debug.contains("6bbf05bfc95ea39d"));
}

#[test]
fn error_display_messages() {
    let errors = vec![
        ConfigError::InvalidProtocol("ftp".to_string()),
        ConfigError::InvalidPort(0),
        ConfigError::InvalidTopK(0),
        ConfigError::InvalidThreshold(-1.0),
        ConfigError::InvalidProvider("faiss".to_string()),
        ConfigError::InvalidEnvOverride {
            var: ENV_TOP_K,
            value: "x".to_string(),
        },
    ];

    for error in errors {
        let message = format!("{error}");
        assert!(message.len() > 10);
    }
}
