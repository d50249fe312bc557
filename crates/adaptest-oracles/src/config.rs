//! Configuration loading and the oracle factory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use adaptest_core::engine::{DifficultyPolicy, DEFAULT_MAX_QUESTIONS};
use adaptest_core::store::{DEFAULT_INACTIVITY_TIMEOUT_SECS, DEFAULT_SWEEP_INTERVAL_SECS};
use adaptest_core::service::DEFAULT_ORACLE_TIMEOUT_SECS;
use adaptest_core::traits::ScoringOracle;

use crate::anthropic::AnthropicOracle;
use crate::mock::MockOracle;
use crate::openai::OpenAiOracle;
use crate::retry::RetryingOracle;

/// Shortest quiz a config may ask for.
pub const MIN_QUESTIONS: usize = 5;

/// Configuration for a single scoring oracle.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OracleConfig {
    OpenAI {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        org_id: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    Anthropic {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    /// Offline keyword-coverage scorer.
    Mock,
}

impl std::fmt::Debug for OracleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleConfig::OpenAI {
                api_key: _,
                base_url,
                org_id,
                model,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("org_id", org_id)
                .field("model", model)
                .finish(),
            OracleConfig::Anthropic {
                api_key: _,
                base_url,
                model,
            } => f
                .debug_struct("Anthropic")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("model", model)
                .finish(),
            OracleConfig::Mock => f.write_str("Mock"),
        }
    }
}

/// Quiz length and session lifetime settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizSettings {
    /// Questions per quiz, before capping by bank size.
    pub max_questions: usize,
    /// Idle time after which a session is discarded.
    pub inactivity_timeout_secs: u64,
    /// How often the expiry sweep runs.
    pub sweep_interval_secs: u64,
    /// Upper bound on concurrently stored sessions.
    pub max_sessions: Option<usize>,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            max_questions: DEFAULT_MAX_QUESTIONS,
            inactivity_timeout_secs: DEFAULT_INACTIVITY_TIMEOUT_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            max_sessions: Some(10_000),
        }
    }
}

/// Top-level adaptest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptestConfig {
    /// Oracle configurations keyed by name.
    #[serde(default)]
    pub oracles: HashMap<String, OracleConfig>,
    /// Oracle used when none is named on the command line.
    #[serde(default = "default_oracle")]
    pub default_oracle: String,
    /// Upper bound on one evaluation, retries included.
    #[serde(default = "default_oracle_timeout")]
    pub oracle_timeout_secs: u64,
    /// Max retries on transient oracle errors.
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// Origins a browser front end may call from.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub quiz: QuizSettings,
    #[serde(default)]
    pub policy: DifficultyPolicy,
}

fn default_oracle() -> String {
    "mock".to_string()
}
fn default_oracle_timeout() -> u64 {
    DEFAULT_ORACLE_TIMEOUT_SECS
}
fn default_retries() -> u32 {
    2
}
fn default_retry_delay() -> u64 {
    500
}

impl Default for AdaptestConfig {
    fn default() -> Self {
        Self {
            oracles: HashMap::new(),
            default_oracle: default_oracle(),
            oracle_timeout_secs: default_oracle_timeout(),
            max_retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
            allowed_origins: Vec::new(),
            quiz: QuizSettings::default(),
            policy: DifficultyPolicy::default(),
        }
    }
}

impl AdaptestConfig {
    /// Reject settings the quiz cannot run with.
    pub fn validate(&self) -> Result<()> {
        let mut problems = self.policy.problems();
        let q = &self.quiz;
        if !(MIN_QUESTIONS..=DEFAULT_MAX_QUESTIONS).contains(&q.max_questions) {
            problems.push(format!(
                "quiz.max_questions must be between {MIN_QUESTIONS} and {DEFAULT_MAX_QUESTIONS}, got {}",
                q.max_questions
            ));
        }
        if q.inactivity_timeout_secs == 0 {
            problems.push("quiz.inactivity_timeout_secs must be positive".into());
        }
        if q.sweep_interval_secs == 0 {
            problems.push("quiz.sweep_interval_secs must be positive".into());
        }
        if q.max_sessions == Some(0) {
            problems.push("quiz.max_sessions must be positive when set".into());
        }
        if self.oracle_timeout_secs == 0 {
            problems.push("oracle_timeout_secs must be positive".into());
        }
        if !problems.is_empty() {
            anyhow::bail!("invalid configuration:\n  - {}", problems.join("\n  - "));
        }
        Ok(())
    }

    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_secs(self.oracle_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.quiz.sweep_interval_secs)
    }

    pub fn inactivity_timeout(&self) -> Result<chrono::Duration> {
        chrono::Duration::from_std(Duration::from_secs(self.quiz.inactivity_timeout_secs))
            .context("quiz.inactivity_timeout_secs is out of range")
    }

    /// Look up an oracle by name. `mock` is always available.
    pub fn oracle(&self, name: &str) -> Result<OracleConfig> {
        match self.oracles.get(name) {
            Some(config) => Ok(config.clone()),
            None if name == "mock" => Ok(OracleConfig::Mock),
            None => {
                let mut known: Vec<&str> = self.oracles.keys().map(String::as_str).collect();
                known.sort_unstable();
                anyhow::bail!(
                    "oracle '{name}' is not configured (configured: {})",
                    if known.is_empty() {
                        "none".to_string()
                    } else {
                        known.join(", ")
                    }
                )
            }
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + end + 1..]);
    }
    result
}

fn resolve_opt(s: &Option<String>) -> Option<String> {
    s.as_deref().map(resolve_env_vars)
}

/// Resolve env vars in an oracle config.
fn resolve_oracle_config(config: &OracleConfig) -> OracleConfig {
    match config {
        OracleConfig::OpenAI {
            api_key,
            base_url,
            org_id,
            model,
        } => OracleConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            base_url: resolve_opt(base_url),
            org_id: resolve_opt(org_id),
            model: resolve_opt(model),
        },
        OracleConfig::Anthropic {
            api_key,
            base_url,
            model,
        } => OracleConfig::Anthropic {
            api_key: resolve_env_vars(api_key),
            base_url: resolve_opt(base_url),
            model: resolve_opt(model),
        },
        OracleConfig::Mock => OracleConfig::Mock,
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `adaptest.toml` in the current directory
/// 2. `~/.config/adaptest/config.toml`
///
/// Environment variable overrides: `ADAPTEST_OPENAI_KEY`, `ADAPTEST_ANTHROPIC_KEY`,
/// `ADAPTEST_ALLOWED_ORIGINS` (comma-separated).
pub fn load_config() -> Result<AdaptestConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<AdaptestConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("adaptest.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|dir| dir.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match &config_path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<AdaptestConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => AdaptestConfig::default(),
    };

    apply_env_overrides(&mut config);

    config.oracles = config
        .oracles
        .iter()
        .map(|(k, v)| (k.clone(), resolve_oracle_config(v)))
        .collect();

    config.validate()?;
    tracing::debug!(path = ?config_path, oracles = config.oracles.len(), "configuration loaded");
    Ok(config)
}

fn apply_env_overrides(config: &mut AdaptestConfig) {
    if let Ok(key) = std::env::var("ADAPTEST_ANTHROPIC_KEY") {
        let entry = config
            .oracles
            .entry("anthropic".into())
            .or_insert(OracleConfig::Anthropic {
                api_key: String::new(),
                base_url: None,
                model: None,
            });
        if let OracleConfig::Anthropic { api_key, .. } = entry {
            *api_key = key;
        }
    }

    if let Ok(key) = std::env::var("ADAPTEST_OPENAI_KEY") {
        let entry = config
            .oracles
            .entry("openai".into())
            .or_insert(OracleConfig::OpenAI {
                api_key: String::new(),
                base_url: None,
                org_id: None,
                model: None,
            });
        if let OracleConfig::OpenAI { api_key, .. } = entry {
            *api_key = key;
        }
    }

    if let Ok(origins) = std::env::var("ADAPTEST_ALLOWED_ORIGINS") {
        config.allowed_origins = parse_origins(&origins);
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect()
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("adaptest"))
}

/// Create an oracle from its configuration. Networked oracles are wrapped in
/// a [`RetryingOracle`].
pub fn create_oracle(
    config: &OracleConfig,
    settings: &AdaptestConfig,
) -> Result<Arc<dyn ScoringOracle>> {
    let retries = settings.max_retries;
    let delay = settings.retry_delay();
    match config {
        OracleConfig::Anthropic {
            api_key,
            base_url,
            model,
        } => {
            require_key("anthropic", api_key)?;
            let oracle = AnthropicOracle::new(api_key, base_url.clone(), model.clone())?;
            Ok(Arc::new(RetryingOracle::new(oracle, retries, delay)))
        }
        OracleConfig::OpenAI {
            api_key,
            base_url,
            org_id,
            model,
        } => {
            require_key("openai", api_key)?;
            let oracle =
                OpenAiOracle::new(api_key, base_url.clone(), org_id.clone(), model.clone())?;
            Ok(Arc::new(RetryingOracle::new(oracle, retries, delay)))
        }
        OracleConfig::Mock => Ok(Arc::new(MockOracle::keyword())),
    }
}

fn require_key(oracle: &str, api_key: &str) -> Result<()> {
    if api_key.trim().is_empty() {
        anyhow::bail!(
            "oracle '{oracle}' has no API key (set it in adaptest.toml or ADAPTEST_{}_KEY)",
            oracle.to_uppercase()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_ADAPTEST_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_ADAPTEST_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_ADAPTEST_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("${unterminated"), "${unterminated");
        std::env::remove_var("_ADAPTEST_TEST_VAR");
    }

    #[test]
    fn default_config_is_valid() {
        let config = AdaptestConfig::default();
        assert_eq!(config.default_oracle, "mock");
        assert_eq!(config.quiz.max_questions, 15);
        assert_eq!(config.quiz.inactivity_timeout_secs, 3600);
        assert_eq!(config.quiz.sweep_interval_secs, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
default_oracle = "anthropic"
oracle_timeout_secs = 20
allowed_origins = ["http://localhost:3000"]

[oracles.anthropic]
type = "anthropic"
api_key = "sk-test"

[oracles.openai]
type = "openai"
api_key = "sk-openai"
model = "gpt-4.1-mini"

[oracles.offline]
type = "mock"

[quiz]
max_questions = 10

[policy]
high_threshold = 0.8
"#;
        let config: AdaptestConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.oracles.len(), 3);
        assert!(matches!(
            config.oracles.get("anthropic"),
            Some(OracleConfig::Anthropic { .. })
        ));
        assert!(matches!(config.oracles.get("offline"), Some(OracleConfig::Mock)));
        assert_eq!(config.quiz.max_questions, 10);
        assert_eq!(config.quiz.sweep_interval_secs, 300);
        assert_eq!(config.policy.high_threshold, 0.8);
        assert_eq!(config.policy.low_threshold, 0.3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn debug_masks_api_keys() {
        let config = OracleConfig::OpenAI {
            api_key: "sk-very-secret".into(),
            base_url: None,
            org_id: None,
            model: None,
        };
        let printed = format!("{config:?}");
        assert!(!printed.contains("sk-very-secret"));
        assert!(printed.contains("***"));
    }

    #[test]
    fn rejects_out_of_range_quiz_length() {
        let mut config = AdaptestConfig::default();
        config.quiz.max_questions = 4;
        assert!(config.validate().is_err());
        config.quiz.max_questions = 16;
        assert!(config.validate().is_err());
        config.quiz.max_questions = 5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let mut config = AdaptestConfig::default();
        config.policy.low_threshold = 0.8;
        config.policy.high_threshold = 0.2;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("invalid configuration"));
    }

    #[test]
    fn rejects_zero_durations() {
        let mut config = AdaptestConfig::default();
        config.quiz.sweep_interval_secs = 0;
        config.oracle_timeout_secs = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("sweep_interval_secs"));
        assert!(err.contains("oracle_timeout_secs"));
    }

    #[test]
    fn load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adaptest.toml");
        std::fs::write(
            &path,
            "oracle_timeout_secs = 5\n[quiz]\ninactivity_timeout_secs = 120\n",
        )
        .unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.oracle_timeout(), Duration::from_secs(5));
        assert_eq!(
            config.inactivity_timeout().unwrap(),
            chrono::Duration::seconds(120)
        );
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let err = load_config_from(Some(Path::new("/nonexistent/adaptest.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn mock_is_always_available() {
        let config = AdaptestConfig::default();
        assert!(matches!(config.oracle("mock"), Ok(OracleConfig::Mock)));
        let err = config.oracle("openai").unwrap_err().to_string();
        assert!(err.contains("not configured"));
    }

    #[test]
    fn create_oracle_requires_api_key() {
        let settings = AdaptestConfig::default();
        let config = OracleConfig::Anthropic {
            api_key: String::new(),
            base_url: None,
            model: None,
        };
        let err = create_oracle(&config, &settings).err().unwrap().to_string();
        assert!(err.contains("ADAPTEST_ANTHROPIC_KEY"));

        let oracle = create_oracle(&OracleConfig::Mock, &settings).unwrap();
        assert_eq!(oracle.name(), "mock");
    }

    #[test]
    fn created_oracles_keep_their_names() {
        let settings = AdaptestConfig::default();
        let config = OracleConfig::OpenAI {
            api_key: "sk".into(),
            base_url: Some("http://127.0.0.1:1".into()),
            org_id: None,
            model: None,
        };
        let oracle = create_oracle(&config, &settings).unwrap();
        assert_eq!(oracle.name(), "openai");
    }

    #[test]
    fn origins_are_trimmed() {
        assert_eq!(
            parse_origins(" http://a.test, ,http://b.test "),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }
}
