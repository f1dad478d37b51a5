//! Configuration management for the verifier

use crate::scenario::{ApiMode, ScenarioOptions};
use entity_client::EntityClient;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    pub http: HttpConfig,
    #[serde(default)]
    pub scenario: ScenarioConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub url: String,
    /// API-mode selector. Only `rest` runs the scenario.
    #[serde(default = "default_api")]
    pub api: String,
    /// Language selector of the backend implementation. Reported only.
    #[serde(default = "default_lang")]
    pub lang: String,
}

/// Authentication headers, passed through to the backend unmodified.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Sent as `Authorization: Bearer <token>` unless `headers` sets
    /// `Authorization` explicitly.
    pub bearer_token: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Timeout for create/update calls. Default: 10
    #[serde(default = "default_write_timeout")]
    pub write_timeout_seconds: u64,
    /// Timeout for all other calls. Unset means no timeout.
    pub read_timeout_seconds: Option<u64>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default = "default_true")]
    pub verify_deleted: bool,
    #[serde(default)]
    pub verify_file: bool,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            verify_deleted: true,
            verify_file: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    #[serde(default)]
    pub file_enabled: bool,
    #[serde(default = "default_log_directory")]
    pub file_directory: String,
    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
    /// One of `minutely`, `hourly`, `daily`, `never`.
    #[serde(default = "default_log_rotation")]
    pub file_rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file_enabled: false,
            file_directory: default_log_directory(),
            file_prefix: default_log_file_prefix(),
            file_rotation: default_log_rotation(),
        }
    }
}

fn default_backend_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_api() -> String {
    "rest".to_string()
}

fn default_lang() -> String {
    "ts".to_string()
}

fn default_write_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_directory() -> String {
    "./logs".to_string()
}

fn default_log_file_prefix() -> String {
    "entity-verify".to_string()
}

fn default_log_rotation() -> String {
    "daily".to_string()
}

const LOG_ROTATIONS: [&str; 4] = ["minutely", "hourly", "daily", "never"];

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let config = Self::with_defaults()?
            // Add config file if exists (verify.toml, verify.yaml, verify.json, ...)
            .add_source(config::File::with_name("verify").required(false))
            // Override with environment variables
            // Example: VERIFY__BACKEND__URL → config.backend.url
            .add_source(
                config::Environment::with_prefix("VERIFY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    fn with_defaults(
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        config::Config::builder()
            .set_default("backend.url", default_backend_url())?
            .set_default("backend.api", default_api())?
            .set_default("backend.lang", default_lang())?
            .set_default(
                "http.write_timeout_seconds",
                default_write_timeout() as i64,
            )?
            .set_default(
                "http.connect_timeout_seconds",
                default_connect_timeout() as i64,
            )?
            .set_default("scenario.verify_deleted", default_true())?
            .set_default("scenario.verify_file", false)?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.json", false)?
            .set_default("logging.file_enabled", false)?
            .set_default("logging.file_directory", default_log_directory())?
            .set_default("logging.file_prefix", default_log_file_prefix())?
            .set_default("logging.file_rotation", default_log_rotation())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        let url = url::Url::parse(&self.backend.url)
            .map_err(|e| format!("backend.url '{}' is invalid: {e}", self.backend.url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!(
                "backend.url must use http or https, got '{}'",
                url.scheme()
            ));
        }
        if self.http.write_timeout_seconds == 0 {
            return Err("http.write_timeout_seconds must be > 0".to_string());
        }
        if self.http.read_timeout_seconds == Some(0) {
            return Err("http.read_timeout_seconds must be > 0 when set".to_string());
        }
        if !LOG_ROTATIONS.contains(&self.logging.file_rotation.to_ascii_lowercase().as_str()) {
            return Err(format!(
                "logging.file_rotation must be one of {}, got '{}'",
                LOG_ROTATIONS.join(", "),
                self.logging.file_rotation
            ));
        }
        Ok(())
    }

    /// Header mapping attached to every request.
    pub fn auth_headers(&self) -> Vec<(String, String)> {
        let explicit_authorization = self
            .auth
            .headers
            .keys()
            .any(|name| name.eq_ignore_ascii_case("authorization"));

        let mut headers = Vec::with_capacity(self.auth.headers.len() + 1);
        if let Some(token) = self.auth.bearer_token.as_deref().filter(|t| !t.is_empty()) {
            if !explicit_authorization {
                headers.push(("Authorization".to_string(), format!("Bearer {token}")));
            }
        }
        headers.extend(
            self.auth
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        headers
    }

    pub fn entity_client(&self) -> entity_client::Result<EntityClient> {
        EntityClient::builder()
            .base_url(&self.backend.url)
            .headers(self.auth_headers())
            .write_timeout(Some(Duration::from_secs(self.http.write_timeout_seconds)))
            .read_timeout(self.http.read_timeout_seconds.map(Duration::from_secs))
            .connect_timeout(Some(Duration::from_secs(self.http.connect_timeout_seconds)))
            .build()
    }

    pub fn scenario_options(&self) -> ScenarioOptions {
        ScenarioOptions {
            api: ApiMode::parse(&self.backend.api),
            lang: self.backend.lang.clone(),
            verify_deleted: self.scenario.verify_deleted,
            verify_file: self.scenario.verify_file,
            ..ScenarioOptions::default()
        }
    }
}
