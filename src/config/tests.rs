use super::*;
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

const OVERRIDE_VARS: [&str; 6] = [
    settings::ENV_API_KEY,
    settings::ENV_KB_PATH,
    settings::ENV_MODEL,
    settings::ENV_THRESHOLD,
    settings::ENV_TOP_K,
    settings::ENV_OLLAMA_HOST,
];

fn clear_env() {
    for var in OVERRIDE_VARS {
        // SAFETY: tests touching the environment are serialized with #[serial]
        unsafe { std::env::remove_var(var) };
    }
}

fn set_env(var: &str, value: &str) {
    // SAFETY: tests touching the environment are serialized with #[serial]
    unsafe { std::env::set_var(var, value) };
}

#[test]
fn explicit_config_dir_wins() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let dir = get_config_dir(Some(temp_dir.path())).expect("should resolve dir");
    assert_eq!(dir, temp_dir.path());
}

#[test]
#[serial]
fn environment_overrides_file() {
    clear_env();
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    fs::write(
        temp_dir.path().join("config.toml"),
        r#"
            [retrieval]
            top_k = 4
            threshold = 0.5

            [external_search]
            api_key = "from-file-key"
        "#,
    )
    .expect("should write config");

    set_env(settings::ENV_THRESHOLD, "1.1");
    set_env(settings::ENV_API_KEY, "from-env-key");

    let config = Config::load_with_env(temp_dir.path()).expect("should load config");
    clear_env();

    assert_eq!(config.retrieval.top_k, 4);
    assert!((config.retrieval.threshold - 1.1).abs() < f32::EPSILON);
    assert_eq!(config.external_search.api_key(), Some("from-env-key"));
}

#[test]
#[serial]
fn environment_without_overrides_keeps_file_values() {
    clear_env();
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[knowledge_base]\npath = \"kb/notes.json\"\n",
    )
    .expect("should write config");

    let config = Config::load_with_env(temp_dir.path()).expect("should load config");

    assert_eq!(
        config.knowledge_base.path,
        std::path::PathBuf::from("kb/notes.json")
    );
    assert_eq!(config.external_search.api_key(), None);
}

#[test]
#[serial]
fn invalid_environment_value_fails_load() {
    clear_env();
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    set_env(settings::ENV_TOP_K, "many");

    let result = Config::load_with_env(temp_dir.path());
    clear_env();

    assert!(result.is_err());
}

#[test]
#[serial]
fn environment_override_rescues_invalid_file_value() {
    clear_env();
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[retrieval]\nthreshold = -1.0\n",
    )
    .expect("should write config");
    set_env(settings::ENV_THRESHOLD, "0.9");

    let result = Config::load_with_env(temp_dir.path());
    clear_env();

    let config = result.expect("environment value replaces the invalid threshold");
    assert!((config.retrieval.threshold - 0.9).abs() < f32::EPSILON);
}

#[test]
fn invalid_toml_handling() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    fs::write(
        temp_dir.path().join("config.toml"),
        "[embedding\nhost = \"localhost\"\n",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}
