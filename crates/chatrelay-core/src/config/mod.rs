use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::constants::{defaults, endpoints, env};
use crate::error::RelayError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub history: HistorySettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
    /// Shared secret expected from callers. Empty disables the check.
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    /// Name of the environment variable holding the provider key.
    pub api_key_env: String,
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Number of most recent turns sent to the model.
    pub window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub rps: u32,
    pub burst: u32,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: defaults::PORT,
            api_key: String::new(),
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: endpoints::GROQ_BASE_URL.to_string(),
            model: defaults::DEFAULT_MODEL.to_string(),
            max_tokens: defaults::MAX_TOKENS,
            api_key_env: defaults::API_KEY_ENV.to_string(),
            api_key: None,
        }
    }
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            window: defaults::HISTORY_WINDOW,
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            rps: defaults::RATE_LIMIT_RPS,
            burst: defaults::RATE_LIMIT_BURST,
        }
    }
}

impl Settings {
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var(env::CONFIG_PATH) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chatrelay")
            .join("config.toml")
    }

    /// Defaults, then the config file if present, then the process
    /// environment with `.env` in the working directory as a fallback.
    pub fn load() -> Result<Self, RelayError> {
        Self::from_file(&Self::config_path())?.with_env()
    }

    /// Like `load`, but the file was named explicitly and must exist.
    pub fn load_from(path: &Path) -> Result<Self, RelayError> {
        if !path.exists() {
            return Err(RelayError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        Self::from_file(path)?.with_env()
    }

    fn with_env(mut self) -> Result<Self, RelayError> {
        let dotenv = read_dotenv(Path::new(".env"));
        self.apply_env(|key| std::env::var(key).ok().or_else(|| dotenv.get(key).cloned()));
        self.validate()?;
        Ok(self)
    }

    /// A missing file yields the defaults; an unreadable or invalid one is an error.
    pub fn from_file(path: &Path) -> Result<Self, RelayError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| RelayError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> Result<(), RelayError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| RelayError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Overlay environment values. Numbers that fail to parse keep the
    /// previous value.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup(env::PORT).and_then(|v| v.trim().parse().ok()) {
            self.server.port = port;
        }
        if let Some(key) = lookup(env::API_KEY) {
            self.server.api_key = key;
        }
        if let Some(model) = lookup(env::MODEL).filter(|v| !v.is_empty()) {
            self.llm.model = model;
        }
        if let Some(url) = lookup(env::LLM_BASE_URL).filter(|v| !v.is_empty()) {
            self.llm.base_url = url;
        }
        if let Some(max) = lookup(env::MAX_TOKENS).and_then(|v| v.trim().parse().ok()) {
            self.llm.max_tokens = max;
        }
        if let Some(window) = lookup(env::HISTORY_WINDOW).and_then(|v| v.trim().parse().ok()) {
            self.history.window = window;
        }
        if let Some(rps) = lookup(env::RATE_LIMIT_RPS).and_then(|v| v.trim().parse().ok()) {
            self.rate_limit.rps = rps;
        }
        if let Some(burst) = lookup(env::RATE_LIMIT_BURST).and_then(|v| v.trim().parse().ok()) {
            self.rate_limit.burst = burst;
        }
        if !self.llm.api_key_env.is_empty() {
            if let Some(key) = lookup(&self.llm.api_key_env).filter(|v| !v.is_empty()) {
                self.llm.api_key = Some(key);
            }
        }
    }

    pub fn validate(&self) -> Result<(), RelayError> {
        if self.history.window == 0 {
            return Err(RelayError::Config("history.window must be at least 1".into()));
        }
        if self.llm.max_tokens == 0 {
            return Err(RelayError::Config("llm.max_tokens must be at least 1".into()));
        }
        if self.rate_limit.rps == 0 || self.rate_limit.burst == 0 {
            return Err(RelayError::Config(
                "rate_limit.rps and rate_limit.burst must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn auth_enabled(&self) -> bool {
        !self.server.api_key.is_empty()
    }
}

/// Parse `KEY=VALUE` lines. Blank lines and `#` comments are ignored, and
/// surrounding quotes are stripped from values.
pub fn parse_dotenv(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let value = value.trim().trim_matches('"').trim_matches('\'');
            Some((key.trim().to_string(), value.to_string()))
        })
        .collect()
}

fn read_dotenv(path: &Path) -> HashMap<String, String> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_dotenv(&content),
        Err(_) => HashMap::new(),
    }
}
