//! Configuration system for the `errorgenie` middleware.

use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::PathBuf;

use crate::providers::ProviderType;
use crate::stack_trace::SourceContextConfig;

/// Runtime environment the host application is running in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(format!(
                "Unknown environment: {}. Valid options: development, test, production",
                s
            )),
        }
    }
}

/// Completion settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AssistConfig {
    /// Fetch an explanation from the provider; when false a static notice is shown
    pub enabled: bool,
    /// Provider used when enabled
    pub provider: ProviderType,
    /// Model identifier sent with each request
    pub model: String,
    /// Base URL override for OpenAI-compatible endpoints
    pub base_url: Option<String>,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: ProviderType::OpenAI,
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            max_tokens: 1024,
            timeout_secs: 30,
        }
    }
}

/// Source window settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    /// Lines shown before and after the failing line
    pub context_lines: usize,
    /// Root for resolving relative backtrace paths
    pub context_root: Option<PathBuf>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            context_lines: 5,
            context_root: None,
        }
    }
}

impl From<&SourceConfig> for SourceContextConfig {
    fn from(config: &SourceConfig) -> Self {
        Self {
            context_lines: config.context_lines,
            context_root: config.context_root.clone(),
        }
    }
}

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub environment: Environment,
    pub assist: AssistConfig,
    pub source: SourceConfig,
    /// Custom fragment template containing `{{ ai_help }}`
    pub template_path: Option<PathBuf>,
}

impl Config {
    /// Load config from a specific path
    pub fn load_from_path(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) => {
                tracing::warn!("Failed to read config {}: {}", path.display(), err);
                return Self::default();
            }
        };

        toml::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!("Ignoring invalid config {}: {}", path.display(), err);
            Self::default()
        })
    }

    /// Get the config file path (~/.config/errorgenie/config.toml)
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("errorgenie").join("config.toml"))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| env::var(key).ok());
    }

    /// Apply overrides using `lookup` in place of the process environment
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // ERRORGENIE_ENV wins over the generic APP_ENV
        let environment = lookup("ERRORGENIE_ENV").or_else(|| lookup("APP_ENV"));
        if let Some(value) = environment {
            match value.parse() {
                Ok(environment) => self.environment = environment,
                Err(err) => tracing::warn!("{}", err),
            }
        }

        match lookup("ERRORGENIE_AI_FETCH").as_deref() {
            Some("1") => self.assist.enabled = true,
            Some("0") => self.assist.enabled = false,
            _ => {}
        }

        if let Some(model) = lookup("ERRORGENIE_MODEL").filter(|s| !s.is_empty()) {
            self.assist.model = model;
        }

        if let Some(url) = lookup("ERRORGENIE_BASE_URL").filter(|s| !s.is_empty()) {
            self.assist.base_url = Some(url);
        }
    }

    /// Whether the middleware should be active at all
    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

/// Generate default config as TOML string
pub fn generate_default_config() -> String {
    r#"# ErrorGenie - inline AI help for server errors
# Place this file at ~/.config/errorgenie/config.toml

# Only "development" enables the middleware
environment = "development"

# Custom fragment template; must contain {{ ai_help }}
# template_path = "templates/ai_help.html"

[assist]
# Fetch an explanation from the model (false shows a static notice)
enabled = true
provider = "openai"
model = "gpt-4o-mini"
max_tokens = 1024
timeout_secs = 30
# base_url = "http://localhost:11434"

[source]
# Lines shown before and after the failing line
context_lines = 5
# context_root = "/path/to/project"

# Environment variable overrides:
# ERRORGENIE_ENV / APP_ENV  - development, test or production
# ERRORGENIE_AI_FETCH=0     - Show the static notice instead of calling the API
# ERRORGENIE_MODEL          - Model identifier
# ERRORGENIE_BASE_URL       - OpenAI-compatible endpoint
# OPENAI_API_KEY            - Bearer token, read on every request
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.environment, Environment::Development);
        assert!(config.is_development());
        assert!(config.assist.enabled);
        assert_eq!(config.assist.provider, ProviderType::OpenAI);
        assert_eq!(config.assist.timeout_secs, 30);
        assert_eq!(config.source.context_lines, 5);
        assert!(config.template_path.is_none());
    }

    #[test]
    fn test_default_config_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.assist.model, "gpt-4o-mini");
        assert_eq!(config.source.context_lines, 5);
    }

    #[test]
    fn test_partial_config() {
        let config: Config = toml::from_str(
            r#"
environment = "production"

[assist]
enabled = false
"#,
        )
        .unwrap();
        assert!(!config.is_development());
        assert!(!config.assist.enabled);
        assert_eq!(config.assist.max_tokens, 1024);
    }

    #[test]
    fn test_load_missing_and_invalid() {
        let config = Config::load_from_path(Some(PathBuf::from("/nonexistent/config.toml")));
        assert!(config.is_development());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "environment = [not toml").unwrap();
        let config = Config::load_from_path(Some(path));
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "environment = \"test\"\n[source]\ncontext_lines = 2\n").unwrap();

        let config = Config::load_from_path(Some(path));
        assert_eq!(config.environment, Environment::Test);
        assert_eq!(config.source.context_lines, 2);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides_from(lookup_from(&[
            ("APP_ENV", "production"),
            ("ERRORGENIE_AI_FETCH", "0"),
            ("ERRORGENIE_MODEL", "gpt-4o"),
            ("ERRORGENIE_BASE_URL", "http://localhost:8080"),
        ]));

        assert_eq!(config.environment, Environment::Production);
        assert!(!config.assist.enabled);
        assert_eq!(config.assist.model, "gpt-4o");
        assert_eq!(config.assist.base_url.as_deref(), Some("http://localhost:8080"));
    }

    #[test]
    fn test_errorgenie_env_wins() {
        let mut config = Config::default();
        config.apply_overrides_from(lookup_from(&[
            ("ERRORGENIE_ENV", "development"),
            ("APP_ENV", "production"),
        ]));
        assert!(config.is_development());
    }

    #[test]
    fn test_invalid_env_override_ignored() {
        let mut config = Config::default();
        config.apply_overrides_from(lookup_from(&[("ERRORGENIE_ENV", "staging")]));
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn test_environment_from_str() {
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("Production".parse::<Environment>().unwrap(), Environment::Production);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_source_context_conversion() {
        let source = SourceConfig {
            context_lines: 3,
            context_root: Some(PathBuf::from("/srv/app")),
        };
        let context = SourceContextConfig::from(&source);
        assert_eq!(context.context_lines, 3);
        assert_eq!(context.context_root, Some(PathBuf::from("/srv/app")));
    }
}
