use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::AssistantError;

/// Placeholder the setup instructions leave in an unconfigured `.env`.
pub const GEMINI_PLACEHOLDER_KEY: &str = "your_gemini_api_key_here";
pub const TAVILY_PLACEHOLDER_KEY: &str = "your_tavily_api_key_here";

/// Keys this short are treated as not configured.
pub const MIN_API_KEY_LEN: usize = 20;

/// Main configuration structure for the assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub gemini: GeminiConfig,
    pub tavily: TavilyConfig,
    pub stream: StreamConfig,
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TavilyConfig {
    #[serde(default)]
    pub api_key: String,
    pub api_url: String,
    /// The only site search results may come from.
    pub domain: String,
    pub search_depth: String,
    pub max_results: u32,
    /// Snippets at or below this many characters are dropped as noise.
    pub min_content_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    pub chunk_words: usize,
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub timeout_secs: u64,
    pub max_attempts: u32,
}

/// The two API keys the orchestrator needs before it touches the network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub generation: String,
    pub search: String,
}

impl Credentials {
    pub fn new(generation: impl Into<String>, search: impl Into<String>) -> Self {
        Self {
            generation: generation.into(),
            search: search.into(),
        }
    }

    pub fn generation_usable(&self) -> bool {
        key_is_usable(&self.generation, GEMINI_PLACEHOLDER_KEY)
    }

    pub fn search_usable(&self) -> bool {
        key_is_usable(&self.search, TAVILY_PLACEHOLDER_KEY)
    }

    pub fn usable(&self) -> bool {
        self.generation_usable() && self.search_usable()
    }
}

/// A key counts as real when it is set, is not the placeholder and is long enough.
pub fn key_is_usable(key: &str, placeholder: &str) -> bool {
    !key.is_empty() && key != placeholder && key.len() > MIN_API_KEY_LEN
}

impl Config {
    /// Load configuration from file with environment variable overrides
    /// ALWAYS returns a valid config - never fails
    pub fn load() -> Self {
        // .env.local is what the setup script writes; plain .env is the fallback
        let env_paths = [".env.local", ".env", "../.env"];

        let mut env_loaded = false;
        for path in &env_paths {
            if dotenvy::from_path(path).is_ok() {
                tracing::info!("Loaded env file from: {}", path);
                env_loaded = true;
                break;
            }
        }

        if !env_loaded {
            tracing::warn!("No env file found - continuing with process env vars only");
        }

        let config_path = env::var("UBL_CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => match Self::from_yaml(&contents) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from {}", config_path);
                        config
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to parse config file {}: {} - using defaults",
                            config_path,
                            e
                        );
                        Self::default()
                    }
                },
                Err(e) => {
                    tracing::error!(
                        "Failed to read config file {}: {} - using defaults",
                        config_path,
                        e
                    );
                    Self::default()
                }
            }
        } else {
            tracing::debug!("Config file not found at {} - using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides(|name| env::var(name).ok());

        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {} - continuing anyway", e);
        }

        config
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    /// Apply overrides from `lookup`, which is `std::env::var` outside tests.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("UBL_HTTP_BIND") {
            self.server.bind = bind;
        }

        // Gemini overrides
        if let Some(api_key) = lookup("GEMINI_API_KEY") {
            self.gemini.api_key = api_key;
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            self.gemini.model = model;
        }
        if let Some(base) = lookup("GEMINI_API_BASE") {
            self.gemini.api_base = base;
        }

        // Tavily overrides
        if let Some(api_key) = lookup("TAVILY_API_KEY") {
            self.tavily.api_key = api_key;
        }
        if let Some(url) = lookup("TAVILY_API_URL") {
            self.tavily.api_url = url;
        }
        if let Some(domain) = lookup("UBL_SEARCH_DOMAIN") {
            self.tavily.domain = domain;
        }

        // Stream overrides
        if let Some(words) = lookup("UBL_STREAM_CHUNK_WORDS") {
            if let Ok(n) = words.parse() {
                self.stream.chunk_words = n;
            }
        }
        if let Some(delay) = lookup("UBL_STREAM_DELAY_MS") {
            if let Ok(ms) = delay.parse() {
                self.stream.delay_ms = ms;
            }
        }

        // Upstream overrides
        if let Some(timeout) = lookup("UBL_UPSTREAM_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                self.upstream.timeout_secs = secs;
            }
        }
        if let Some(attempts) = lookup("UBL_UPSTREAM_MAX_ATTEMPTS") {
            if let Ok(n) = attempts.parse() {
                self.upstream.max_attempts = n;
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.server.bind.parse::<SocketAddr>().is_err() {
            return Err(AssistantError::Config(format!(
                "server.bind '{}' is not host:port",
                self.server.bind
            )));
        }

        if self.stream.chunk_words == 0 {
            return Err(AssistantError::Config("stream.chunk_words cannot be 0".to_string()));
        }

        if self.upstream.max_attempts == 0 {
            return Err(AssistantError::Config("upstream.max_attempts cannot be 0".to_string()));
        }

        if self.tavily.domain.is_empty() {
            return Err(AssistantError::Config("tavily.domain cannot be empty".to_string()));
        }

        // Missing keys are legal: the assistant answers from canned text.
        if !self.credentials().usable() {
            return Err(AssistantError::Config(
                "GEMINI_API_KEY and TAVILY_API_KEY are not both configured; serving fallback answers only"
                    .to_string(),
            ));
        }

        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.gemini.api_key.clone(), self.tavily.api_key.clone())
    }

    pub fn stream_delay(&self) -> Duration {
        Duration::from_millis(self.stream.delay_ms)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream.timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind: "127.0.0.1:3000".to_string(),
            },
            gemini: GeminiConfig {
                api_key: String::new(),
                model: "gemini-1.5-flash".to_string(),
                api_base: "https://generativelanguage.googleapis.com".to_string(),
                temperature: 0.7,
                max_output_tokens: 1024,
            },
            tavily: TavilyConfig {
                api_key: String::new(),
                api_url: "https://api.tavily.com/search".to_string(),
                domain: "ubldigital.com".to_string(),
                search_depth: "basic".to_string(),
                max_results: 3,
                min_content_chars: 50,
            },
            stream: StreamConfig {
                chunk_words: 3,
                delay_ms: 15,
            },
            upstream: UpstreamConfig {
                timeout_secs: 30,
                max_attempts: 2,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const REAL_KEY: &str = "AIzaSyA-0123456789abcdefghij";

    #[test]
    fn test_placeholder_and_short_keys_are_not_usable() {
        assert!(!key_is_usable("", GEMINI_PLACEHOLDER_KEY));
        assert!(!key_is_usable(GEMINI_PLACEHOLDER_KEY, GEMINI_PLACEHOLDER_KEY));
        assert!(!key_is_usable("short-key", GEMINI_PLACEHOLDER_KEY));
        assert!(!key_is_usable(&"k".repeat(MIN_API_KEY_LEN), GEMINI_PLACEHOLDER_KEY));
        assert!(key_is_usable(&"k".repeat(MIN_API_KEY_LEN + 1), GEMINI_PLACEHOLDER_KEY));
        assert!(key_is_usable(REAL_KEY, GEMINI_PLACEHOLDER_KEY));
    }

    #[test]
    fn test_credentials_require_both_keys() {
        assert!(Credentials::new(REAL_KEY, REAL_KEY).usable());
        assert!(!Credentials::new(REAL_KEY, TAVILY_PLACEHOLDER_KEY).usable());
        assert!(!Credentials::new("", REAL_KEY).usable());
        assert!(!Credentials::default().usable());
    }

    #[test]
    fn test_env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("GEMINI_API_KEY", REAL_KEY),
            ("TAVILY_API_KEY", "tvly-abcdefghijklmnopqrstuvwxyz"),
            ("UBL_STREAM_DELAY_MS", "0"),
            ("UBL_STREAM_CHUNK_WORDS", "5"),
            ("UBL_UPSTREAM_TIMEOUT_SECS", "not-a-number"),
            ("UBL_HTTP_BIND", "0.0.0.0:8080"),
        ]
        .into_iter()
        .collect();

        let mut cfg = Config::default();
        cfg.apply_env_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(cfg.gemini.api_key, REAL_KEY);
        assert_eq!(cfg.stream.delay_ms, 0);
        assert_eq!(cfg.stream.chunk_words, 5);
        // unparseable values leave the default in place
        assert_eq!(cfg.upstream.timeout_secs, 30);
        assert_eq!(cfg.server.bind, "0.0.0.0:8080");
        assert!(cfg.credentials().usable());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_flags_missing_keys_and_bad_values() {
        let cfg = Config::default();
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.gemini.api_key = REAL_KEY.to_string();
        cfg.tavily.api_key = REAL_KEY.to_string();
        cfg.stream.chunk_words = 0;
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, AssistantError::Config(ref msg) if msg.contains("chunk_words")));
    }

    #[test]
    fn test_yaml_config_parses() {
        let yaml = r#"
server:
  bind: "127.0.0.1:4000"
gemini:
  model: gemini-1.5-pro
  api_base: http://localhost:9000
  temperature: 0.2
  max_output_tokens: 512
tavily:
  api_url: http://localhost:9001/search
  domain: ubldigital.com
  search_depth: basic
  max_results: 3
  min_content_chars: 50
stream:
  chunk_words: 3
  delay_ms: 0
upstream:
  timeout_secs: 5
  max_attempts: 1
"#;
        let cfg = Config::from_yaml(yaml).unwrap();
        assert_eq!(cfg.gemini.model, "gemini-1.5-pro");
        assert_eq!(cfg.gemini.api_key, "");
        assert_eq!(cfg.stream_delay(), Duration::ZERO);
        assert_eq!(cfg.upstream_timeout(), Duration::from_secs(5));
    }
}
