#![allow(clippy::unwrap_used, clippy::expect_used)]

use quanta_app::config::{Config, LLMProvider};
use std::collections::HashMap;
use tempfile::TempDir;

#[test]
fn test_config_gemini_provider() {
    let config_yaml = r#"
provider: gemini
model: gemini-1.5-flash-8b
"#;

    let config: Config = serde_yaml::from_str(config_yaml).unwrap();

    assert_eq!(config.provider, LLMProvider::Gemini);
    assert!(config.provider.requires_api_key());
    assert_eq!(config.model, "gemini-1.5-flash-8b");
    assert_eq!(config.pocketbase_url, "https://trackit.pockethost.io/");
    assert_eq!(config.allowed_collections, vec!["transactions".to_string()]);
}

#[test]
fn test_config_openai_compatible_provider() {
    let config_yaml = r#"
provider: !openai_compatible
  base_url: http://localhost:8080/v1
model: llama3
pocketbase_url: http://127.0.0.1:8090
"#;

    let config: Config = serde_yaml::from_str(config_yaml).unwrap();

    match &config.provider {
        LLMProvider::OpenaiCompatible { base_url } => {
            assert_eq!(base_url, "http://localhost:8080/v1");
        }
        other => panic!("Expected openai_compatible provider, got {:?}", other),
    }
    assert!(!config.provider.requires_api_key());
    assert!(config.validate().is_ok());
}

#[test]
fn test_env_overrides() {
    let env: HashMap<&str, &str> = HashMap::from([
        ("GEMINI_API_KEY", "  secret  "),
        ("QUANTA_LLM_MODEL", "gemini-2.0-flash"),
        ("POCKETBASE_URL", "https://pb.example.com"),
        ("QUANTA_BIND", "0.0.0.0:8080"),
        ("QUANTA_LLM_BASE_URL", ""),
    ]);

    let mut config = Config::default();
    config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

    assert_eq!(config.api_key.as_deref(), Some("secret"));
    assert_eq!(config.model, "gemini-2.0-flash");
    assert_eq!(config.pocketbase_url, "https://pb.example.com");
    assert_eq!(config.bind, "0.0.0.0:8080");
    assert_eq!(config.provider, LLMProvider::Gemini);
    assert!(config.validate().is_ok());
}

#[test]
fn test_base_url_override_switches_provider() {
    let mut config = Config::default();
    config.apply_overrides(|key| (key == "QUANTA_LLM_BASE_URL").then(|| "http://localhost:11434/v1".to_string()));
    assert_eq!(
        config.provider,
        LLMProvider::OpenaiCompatible {
            base_url: "http://localhost:11434/v1".to_string()
        }
    );
}

#[test]
fn test_config_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("quanta.yaml");

    let mut config = Config::default();
    config.model = "test-model".to_string();
    config.allowed_collections = vec!["transactions".to_string(), "budgets".to_string()];
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded, config);

    let missing = Config::load_or_default(&dir.path().join("absent.yaml")).unwrap();
    assert_eq!(missing, Config::default());
}

#[test]
fn test_config_validation() {
    let valid = Config {
        api_key: Some("k".to_string()),
        ..Config::default()
    };
    assert!(valid.validate().is_ok());

    let no_key = Config::default();
    assert!(no_key.validate().is_err());

    let empty_model = Config {
        model: " ".to_string(),
        ..valid.clone()
    };
    assert!(empty_model.validate().is_err());

    let bad_url = Config {
        pocketbase_url: "ftp://example.com".to_string(),
        ..valid.clone()
    };
    assert!(bad_url.validate().is_err());

    let bad_local = Config {
        provider: LLMProvider::OpenaiCompatible {
            base_url: "".to_string(),
        },
        ..valid.clone()
    };
    assert!(bad_local.validate().is_err());

    let bad_bind = Config {
        bind: "localhost".to_string(),
        ..valid.clone()
    };
    assert!(bad_bind.validate().is_err());

    let bad_collection = Config {
        allowed_collections: vec!["../users".to_string()],
        ..valid
    };
    assert!(bad_collection.validate().is_err());
}

#[test]
fn test_unparseable_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("quanta.yaml");
    std::fs::write(&path, "provider: [").unwrap();
    let err = Config::load(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse"));
}
