//! Configuration loading, validation, and management for QueryBridge.
//!
//! Loads configuration from `~/.querybridge/config.toml` (or an explicit
//! path), then applies `.env` and process environment overrides. The two
//! secrets the bot needs, the completion-service key and the Discord token,
//! normally arrive through the environment.

use querybridge_core::provider::ReasoningEffort;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variables consulted for the completion-service key, in order.
pub const API_KEY_VARS: &[&str] = &["OPENAI_KEY", "OPENAI_API_KEY", "QUERYBRIDGE_API_KEY"];

/// Environment variables consulted for the Discord bot token, in order.
pub const DISCORD_TOKEN_VARS: &[&str] = &["TOKEN", "DISCORD_TOKEN"];

/// The root configuration structure.
///
/// Maps directly to `~/.querybridge/config.toml`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Completion service settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Data source settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Conversation loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Discord channel settings
    #[serde(default)]
    pub discord: DiscordConfig,

    /// Channel → loop bridge settings
    #[serde(default)]
    pub bridge: BridgeConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("provider", &self.provider)
            .field("database", &self.database)
            .field("agent", &self.agent)
            .field("discord", &self.discord)
            .field("bridge", &self.bridge)
            .finish()
    }
}

/// Which wire protocol the completion service speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI Responses API (`/v1/responses`)
    #[default]
    Responses,
    /// OpenAI-compatible chat completions (`/v1/chat/completions`)
    Chat,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override the API base URL (e.g. a local Ollama endpoint)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    /// `"none"` leaves the reasoning parameter out (for non-reasoning models)
    #[serde(default = "default_reasoning_effort", with = "effort_setting")]
    pub reasoning_effort: Option<ReasoningEffort>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,

    /// HTTP timeout per completion request. Unset = wait indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn default_model() -> String {
    "gpt-5".into()
}
fn default_reasoning_effort() -> Option<ReasoningEffort> {
    Some(ReasoningEffort::Low)
}

/// TOML has no null, so an unset effort is spelled `"none"`.
mod effort_setting {
    use querybridge_core::provider::ReasoningEffort;
    use serde::de::IntoDeserializer;
    use serde::de::value::StrDeserializer;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<ReasoningEffort>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(effort) => effort.serialize(serializer),
            None => serializer.serialize_str("none"),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<ReasoningEffort>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.eq_ignore_ascii_case("none") {
            return Ok(None);
        }
        let value: StrDeserializer<'_, D::Error> = raw.as_str().into_deserializer();
        ReasoningEffort::deserialize(value).map(Some)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            api_key: None,
            base_url: None,
            model: default_model(),
            reasoning_effort: default_reasoning_effort(),
            max_output_tokens: None,
            timeout_secs: None,
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("reasoning_effort", &self.reasoning_effort)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Statement policy applied in front of the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlPolicy {
    /// Forward every statement untouched
    #[default]
    Passthrough,
    /// Only allow statements that read
    ReadOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Pool size. 1 serializes every query through a single connection.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_timeout_secs: Option<u64>,

    #[serde(default)]
    pub policy: SqlPolicy,
}

fn default_database_url() -> String {
    "sqlite://sampledb/db.sqlite".into()
}
fn default_max_connections() -> u32 {
    1
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            query_timeout_secs: None,
            policy: SqlPolicy::default(),
        }
    }
}

impl DatabaseConfig {
    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Cap on model rounds per question. Unset = loop until the model stops.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<u32>,

    /// Timeout for each completion call. Unset = wait indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_timeout_secs: Option<u64>,

    /// Replace the built-in domain briefing entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Load the domain briefing from a file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions_file: Option<PathBuf>,
}

impl AgentConfig {
    pub fn round_timeout(&self) -> Option<Duration> {
        self.round_timeout_secs.map(Duration::from_secs)
    }

    /// The configured instructions, if any. Inline text wins over a file.
    pub fn load_instructions(&self) -> Result<Option<String>, ConfigError> {
        if let Some(text) = &self.instructions {
            return Ok(Some(text.clone()));
        }
        let Some(path) = &self.instructions_file else {
            return Ok(None);
        };
        std::fs::read_to_string(path)
            .map(Some)
            .map_err(|e| ConfigError::ReadError {
                path: path.clone(),
                reason: e.to_string(),
            })
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default = "default_working_emoji")]
    pub working_emoji: String,

    #[serde(default = "default_done_emoji")]
    pub done_emoji: String,

    #[serde(default = "default_failed_emoji")]
    pub failed_emoji: String,

    /// Posted when answering fails (completion service down, round cap hit)
    #[serde(default = "default_failure_message")]
    pub failure_message: String,
}

fn default_working_emoji() -> String {
    "⏳".into()
}
fn default_done_emoji() -> String {
    "✅".into()
}
fn default_failed_emoji() -> String {
    "❌".into()
}
fn default_failure_message() -> String {
    "Sorry, I couldn't answer that right now.".into()
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: None,
            working_emoji: default_working_emoji(),
            done_emoji: default_done_emoji(),
            failed_emoji: default_failed_emoji(),
            failure_message: default_failure_message(),
        }
    }
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &redact(&self.token))
            .field("working_emoji", &self.working_emoji)
            .field("done_emoji", &self.done_emoji)
            .field("failed_emoji", &self.failed_emoji)
            .field("failure_message", &self.failure_message)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Maximum conversations answered at once. Unset = no limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_in_flight: Option<usize>,
}

impl AppConfig {
    /// Load configuration from `path`, or the default location when `None`.
    ///
    /// A `.env` file in the working directory is loaded into the process
    /// environment first, then environment overrides are applied:
    /// - `OPENAI_KEY` / `OPENAI_API_KEY` / `QUERYBRIDGE_API_KEY` → provider key
    /// - `TOKEN` / `DISCORD_TOKEN` → Discord token
    /// - `QUERYBRIDGE_MODEL` → model
    /// - `QUERYBRIDGE_DATABASE_URL` → database URL
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Ok(env_path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", env_path.display());
        }

        let default_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(path.unwrap_or(&default_path))?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let first = |vars: &[&str]| vars.iter().find_map(|v| lookup(v).filter(|s| !s.is_empty()));

        if let Some(key) = first(API_KEY_VARS) {
            self.provider.api_key = Some(key);
        }
        if let Some(token) = first(DISCORD_TOKEN_VARS) {
            self.discord.token = Some(token);
        }
        if let Some(model) = first(&["QUERYBRIDGE_MODEL"]) {
            self.provider.model = model;
        }
        if let Some(url) = first(&["QUERYBRIDGE_DATABASE_URL"]) {
            self.database.url = url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".querybridge")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "provider.model must not be empty".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be at least 1".into(),
            ));
        }

        if self.agent.max_rounds == Some(0) {
            return Err(ConfigError::ValidationError(
                "agent.max_rounds must be at least 1 when set".into(),
            ));
        }

        if self.bridge.max_in_flight == Some(0) {
            return Err(ConfigError::ValidationError(
                "bridge.max_in_flight must be at least 1 when set".into(),
            ));
        }

        Ok(())
    }

    /// The completion-service key, or a startup error naming where to set it.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.provider
            .api_key
            .as_deref()
            .ok_or(ConfigError::MissingSecret {
                name: "completion service API key",
                env: API_KEY_VARS[0],
            })
    }

    /// The Discord bot token, or a startup error naming where to set it.
    pub fn require_discord_token(&self) -> Result<&str, ConfigError> {
        self.discord
            .token
            .as_deref()
            .ok_or(ConfigError::MissingSecret {
                name: "Discord bot token",
                env: DISCORD_TOKEN_VARS[0],
            })
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Missing {name}: set the {env} environment variable or add it to the config file")]
    MissingSecret { name: &'static str, env: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.provider.model, "gpt-5");
        assert_eq!(config.provider.reasoning_effort, Some(ReasoningEffort::Low));
        assert_eq!(config.database.max_connections, 1);
        assert_eq!(config.database.policy, SqlPolicy::Passthrough);
        assert!(config.agent.max_rounds.is_none());
        assert!(config.agent.round_timeout().is_none());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider.model, config.provider.model);
        assert_eq!(parsed.database.url, config.database.url);
        assert_eq!(parsed.discord.working_emoji, "⏳");
    }

    #[test]
    fn zero_pool_size_rejected() {
        let mut config = AppConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_round_cap_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_rounds = Some(0);
        assert!(config.validate().is_err());
        config.agent.max_rounds = Some(3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.provider.kind, ProviderKind::Responses);
    }

    #[test]
    fn env_overrides_take_priority() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_KEY", "sk-env"),
            ("OPENAI_API_KEY", "sk-ignored"),
            ("TOKEN", "discord-env"),
            ("QUERYBRIDGE_DATABASE_URL", "sqlite::memory:"),
        ]);
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-file".into());
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.require_api_key().unwrap(), "sk-env");
        assert_eq!(config.require_discord_token().unwrap(), "discord-env");
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.provider.model, "gpt-5");
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut config = AppConfig::default();
        config.apply_env(|k| (k == "OPENAI_KEY").then(String::new));
        assert!(config.require_api_key().is_err());
    }

    #[test]
    fn missing_secrets_name_their_variable() {
        let config = AppConfig::default();
        let err = config.require_discord_token().unwrap_err();
        assert!(err.to_string().contains("TOKEN"));
        let err = config.require_api_key().unwrap_err();
        assert!(err.to_string().contains("OPENAI_KEY"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-very-secret".into());
        config.discord.token = Some("discord-very-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn parses_full_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[provider]
kind = "chat"
base_url = "http://localhost:11434/v1"
model = "qwen3:8b"
reasoning_effort = "medium"

[database]
url = "postgres://sakila@localhost/sakila"
max_connections = 4
query_timeout_secs = 30
policy = "read_only"

[agent]
max_rounds = 10

[bridge]
max_in_flight = 2
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.provider.kind, ProviderKind::Chat);
        assert_eq!(config.provider.reasoning_effort, Some(ReasoningEffort::Medium));
        assert_eq!(config.database.policy, SqlPolicy::ReadOnly);
        assert_eq!(config.database.query_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.agent.max_rounds, Some(10));
        assert_eq!(config.bridge.max_in_flight, Some(2));
    }

    #[test]
    fn reasoning_effort_can_be_turned_off() {
        let config: AppConfig = toml::from_str(
            r#"
[provider]
model = "gpt-4o-mini"
reasoning_effort = "none"
"#,
        )
        .unwrap();
        assert_eq!(config.provider.reasoning_effort, None);

        let written = toml::to_string(&config).unwrap();
        assert!(written.contains("reasoning_effort = \"none\""));
        let back: AppConfig = toml::from_str(&written).unwrap();
        assert_eq!(back.provider.reasoning_effort, None);
    }

    #[test]
    fn unknown_reasoning_effort_is_rejected() {
        let parsed: Result<AppConfig, _> = toml::from_str(
            r#"
[provider]
reasoning_effort = "extreme"
"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn instructions_inline_beats_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("briefing.md");
        std::fs::write(&path, "from file").unwrap();

        let mut agent = AgentConfig {
            instructions_file: Some(path),
            ..AgentConfig::default()
        };
        assert_eq!(agent.load_instructions().unwrap().as_deref(), Some("from file"));

        agent.instructions = Some("inline".into());
        assert_eq!(agent.load_instructions().unwrap().as_deref(), Some("inline"));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[database\nurl = 1").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }
}
