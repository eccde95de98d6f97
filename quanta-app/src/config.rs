use anyhow::{bail, Context, Result};
use quanta_providers::gemini;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

pub const DEFAULT_POCKETBASE_URL: &str = "https://trackit.pockethost.io/";
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_CONFIG_PATH: &str = "quanta.yaml";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LLMProvider {
    Gemini,
    OpenaiCompatible { base_url: String },
}

impl LLMProvider {
    pub fn base_url(&self) -> &str {
        match self {
            LLMProvider::Gemini => gemini::DEFAULT_BASE_URL,
            LLMProvider::OpenaiCompatible { base_url } => base_url,
        }
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, LLMProvider::Gemini)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub provider: LLMProvider,
    pub model: String,
    /// Usually supplied through `GEMINI_API_KEY` rather than the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub pocketbase_url: String,
    pub bind: String,
    pub request_timeout_secs: u64,
    pub transactions_collection: String,
    pub users_collection: String,
    pub allowed_collections: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: LLMProvider::Gemini,
            model: gemini::DEFAULT_MODEL.to_string(),
            api_key: None,
            pocketbase_url: DEFAULT_POCKETBASE_URL.to_string(),
            bind: DEFAULT_BIND.to_string(),
            request_timeout_secs: 30,
            transactions_collection: "transactions".to_string(),
            users_collection: "users".to_string(),
            allowed_collections: vec!["transactions".to_string()],
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Apply environment-style overrides from `lookup`. Blank values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(key) = get("GEMINI_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(model) = get("QUANTA_LLM_MODEL") {
            self.model = model;
        }
        if let Some(base_url) = get("QUANTA_LLM_BASE_URL") {
            self.provider = LLMProvider::OpenaiCompatible { base_url };
        }
        if let Some(url) = get("POCKETBASE_URL") {
            self.pocketbase_url = url;
        }
        if let Some(bind) = get("QUANTA_BIND") {
            self.bind = bind;
        }
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            bail!("Model name cannot be empty");
        }

        check_url("pocketbase_url", &self.pocketbase_url)?;
        if let LLMProvider::OpenaiCompatible { base_url } = &self.provider {
            check_url("provider base_url", base_url)?;
        }

        if self.provider.requires_api_key()
            && self.api_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            bail!("GEMINI_API_KEY is not configured");
        }

        self.bind
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid bind address: {}", self.bind))?;

        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be positive");
        }
        if self.allowed_collections.is_empty() {
            bail!("allowed_collections cannot be empty");
        }
        for collection in self
            .allowed_collections
            .iter()
            .chain([&self.transactions_collection, &self.users_collection])
        {
            quanta_tools::context::validate_identifier("collection", collection)?;
        }
        Ok(())
    }
}

fn check_url(name: &str, value: &str) -> Result<()> {
    let url = reqwest::Url::parse(value).with_context(|| format!("Invalid {}: {}", name, value))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("Invalid {}: scheme must be http or https", name);
    }
    Ok(())
}
