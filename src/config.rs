//! Configuration for the assistant.
//!
//! Values are resolved in order: built-in defaults, an optional YAML file, the
//! `OLLAMA_HOST` / `OLLAMA_MODEL` environment variables, then command-line flags.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default Ollama host.
pub const DEFAULT_HOST: &str = "127.0.0.1:11434";

/// Default model.
pub const DEFAULT_MODEL: &str = "gemma2";

/// Connection settings for the Ollama server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaOptions {
    /// Host, with or without scheme.
    pub host: String,

    /// Optional proxy URL for all requests.
    pub proxy: Option<String>,

    /// Model name.
    pub model: String,
}

impl OllamaOptions {
    /// Creates options with the built-in defaults.
    pub fn new() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            proxy: None,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Sets the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the proxy.
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Sets the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl Default for OllamaOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for a [`Goblln`](crate::Goblln) assistant and the command-line tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Server connection.
    pub ollama: OllamaOptions,

    /// Give up on an answer after this many seconds.
    pub timeout_seconds: Option<f64>,

    /// Default programming language for code tasks.
    pub language: Option<String>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Append every request and streamed line to this file as JSON.
    pub log_file: Option<String>,
}

impl AssistantConfig {
    /// Creates a new AssistantConfig with default values.
    pub fn new() -> Self {
        Self {
            ollama: OllamaOptions::new(),
            timeout_seconds: None,
            language: None,
            use_color: true,
            log_file: None,
        }
    }

    /// Load a configuration from a YAML file.  Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|err| {
            Error::io(format!("failed to read config {}", path.display()), err)
        })?;
        Self::from_yaml(&contents)
    }

    /// Parse a configuration from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::new());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `OLLAMA_HOST` and `OLLAMA_MODEL` from the environment.
    pub fn with_env(self) -> Self {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    fn with_env_from(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(host) = var("OLLAMA_HOST").filter(|s| !s.trim().is_empty()) {
            self.ollama.host = host;
        }
        if let Some(model) = var("OLLAMA_MODEL").filter(|s| !s.trim().is_empty()) {
            self.ollama.model = model;
        }
        self
    }

    /// Sets the Ollama options.
    pub fn with_ollama(mut self, ollama: OllamaOptions) -> Self {
        self.ollama = ollama;
        self
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout_seconds = timeout.map(|t| t.as_secs_f64());
        self
    }

    /// Sets the default programming language.
    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// The configured timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs_f64)
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        if let Some(seconds) = self.timeout_seconds
            && !(seconds.is_finite() && seconds > 0.0)
        {
            return Err(Error::validation(
                format!("timeout must be a positive number of seconds, got {seconds}"),
                Some("timeout_seconds".to_string()),
            ));
        }
        if self.ollama.model.trim().is_empty() {
            return Err(Error::validation(
                "model must not be empty",
                Some("model".to_string()),
            ));
        }
        Ok(())
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a timeout given in seconds on the command line.
pub fn parse_timeout(value: &str) -> Result<Duration> {
    let seconds: f64 = value.trim().parse().map_err(|_| {
        Error::validation(
            format!("timeout expects a number of seconds, got '{value}'"),
            Some("timeout".to_string()),
        )
    })?;
    if !(seconds.is_finite() && seconds > 0.0) {
        return Err(Error::validation(
            format!("timeout must be positive, got '{value}'"),
            Some("timeout".to_string()),
        ));
    }
    Ok(Duration::from_secs_f64(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = AssistantConfig::new();
        assert_eq!(config.ollama.host, "127.0.0.1:11434");
        assert_eq!(config.ollama.model, "gemma2");
        assert!(config.ollama.proxy.is_none());
        assert!(config.timeout().is_none());
        assert!(config.use_color);
    }

    #[test]
    fn yaml_overrides_some_keys() {
        let config = AssistantConfig::from_yaml(
            "ollama:\n  model: codellama\ntimeout_seconds: 30\nlanguage: rust\n",
        )
        .unwrap();
        assert_eq!(config.ollama.model, "codellama");
        assert_eq!(config.ollama.host, DEFAULT_HOST);
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.language.as_deref(), Some("rust"));
    }

    #[test]
    fn yaml_rejects_bad_timeout() {
        let err = AssistantConfig::from_yaml("timeout_seconds: -1\n").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(AssistantConfig::from_yaml("").unwrap(), AssistantConfig::new());
    }

    #[test]
    fn env_overrides() {
        let config = AssistantConfig::new().with_env_from(|key| match key {
            "OLLAMA_HOST" => Some("http://gpu-box:11434".to_string()),
            "OLLAMA_MODEL" => Some(" ".to_string()),
            _ => None,
        });
        assert_eq!(config.ollama.host, "http://gpu-box:11434");
        assert_eq!(config.ollama.model, DEFAULT_MODEL);
    }

    #[test]
    fn builder_pattern() {
        let config = AssistantConfig::new()
            .with_ollama(OllamaOptions::new().with_model("mistral").with_host("h:1"))
            .with_timeout(Some(Duration::from_millis(1500)))
            .with_language(Some("go".to_string()))
            .without_color();
        assert_eq!(config.ollama.model, "mistral");
        assert_eq!(config.ollama.host, "h:1");
        assert_eq!(config.timeout(), Some(Duration::from_millis(1500)));
        assert!(!config.use_color);
    }

    #[test]
    fn timeout_parsing() {
        assert_eq!(parse_timeout("2.5").unwrap(), Duration::from_millis(2500));
        assert!(parse_timeout("0").is_err());
        assert!(parse_timeout("soon").is_err());
    }
}
