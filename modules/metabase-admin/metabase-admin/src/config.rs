use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use metabase_http::TransportConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

use crate::domain::sync::RetryPolicy;

/// Prefix of environment variables overriding the configuration.
///
/// Nested keys are separated by `__`, e.g. `METABASE_ADMIN_GRAPH_RETRY__MAX_ATTEMPTS`.
pub const ENV_PREFIX: &str = "METABASE_ADMIN_";

fn default_user_agent() -> String {
    TransportConfig::default().user_agent
}

fn default_timeout() -> Duration {
    metabase_http::config::DEFAULT_TIMEOUT
}

fn default_max_attempts() -> u32 {
    10
}

fn default_base_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_jitter() -> Duration {
    Duration::from_millis(1500)
}

/// Connection and retry settings of the admin client.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetabaseConfig {
    /// Base address of the instance, scheme included; `/api` is appended.
    pub host: String,
    #[serde(deserialize_with = "deserialize_text")]
    pub username: String,
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: SecretString,
    /// Previously issued session id to try before logging in.
    #[serde(default, deserialize_with = "deserialize_optional_secret")]
    pub session_id: Option<SecretString>,
    #[serde(default = "default_user_agent", deserialize_with = "deserialize_text")]
    pub user_agent: String,
    /// Client-level request timeout, e.g. `30s` or `1m`.
    #[serde(default = "default_timeout", deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
    #[serde(default)]
    pub graph_retry: GraphRetryConfig,
}

/// Revision-conflict retry settings of the permission graph synchronizer.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GraphRetryConfig {
    /// Maximum number of submits per update, the first one included.
    pub max_attempts: u32,
    #[serde(deserialize_with = "deserialize_duration")]
    pub base_delay: Duration,
    /// Upper bound (exclusive) of the random delay added to `base_delay`.
    #[serde(deserialize_with = "deserialize_duration")]
    pub jitter: Duration,
}

impl Default for GraphRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            jitter: default_jitter(),
        }
    }
}

impl From<&GraphRetryConfig> for RetryPolicy {
    fn from(config: &GraphRetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay,
            jitter: config.jitter,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration field '{field}': {message}")]
    Invalid { field: &'static str, message: String },
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

impl MetabaseConfig {
    /// Load from an optional YAML file overlaid with `METABASE_ADMIN_*`
    /// environment variables, then validate.
    ///
    /// # Errors
    ///
    /// - `NotFound` if `path` is given but does not exist
    /// - `Load` if the merged sources do not deserialize
    /// - `Invalid` if validation fails
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            figment = figment.merge(Yaml::file(path));
        }

        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// `Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::invalid("host", "must not be empty"));
        }
        let url = url::Url::parse(&self.host).map_err(|e| ConfigError::invalid("host", e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                "host",
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        if self.username.trim().is_empty() {
            return Err(ConfigError::invalid("username", "must not be empty"));
        }
        if self.password.expose_secret().is_empty() {
            return Err(ConfigError::invalid("password", "must not be empty"));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::invalid("timeout", "must be greater than zero"));
        }
        if self.graph_retry.max_attempts == 0 {
            return Err(ConfigError::invalid(
                "graph_retry.max_attempts",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn transport(&self) -> TransportConfig {
        TransportConfig::default()
            .with_timeout(self.timeout)
            .with_user_agent(self.user_agent.clone())
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.graph_retry)
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}

/// Accepts scalars that figment parsed as numbers or booleans: environment
/// values are never quoted, so `PASSWORD=12345678` arrives as an integer.
struct TextVisitor;

impl Visitor<'_> for TextVisitor {
    type Value = String;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
        Ok(v.to_owned())
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
        Ok(v)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_i128<E: de::Error>(self, v: i128) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_char<E: de::Error>(self, v: char) -> Result<String, E> {
        Ok(v.to_string())
    }
}

fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(TextVisitor)
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_text(deserializer).map(SecretString::from)
}

fn deserialize_optional_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_secret(deserializer).map(Some)
}
