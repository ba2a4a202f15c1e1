//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from an optional file named by
//! `WAYBILL_CONFIG` and from environment variables (`__` separates
//! sections, e.g. `STORE__BACKEND=nats`).
//!
//! Library sections reuse each crate's own config type:
//! [`StoreConfig`], [`SessionConfig`], [`LlmConfig`] and [`EngineConfig`].

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;
use waybill_ai::{EngineConfig, LlmConfig};
use waybill_conversation::SessionConfig;
use waybill_store::{StoreBackendKind, StoreConfig};

/// Environment variable naming an optional configuration file.
pub const CONFIG_FILE_ENV: &str = "WAYBILL_CONFIG";

/// Server configuration composed from library configs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    /// Deadline for one chat turn. Unset means no deadline.
    #[serde(default)]
    pub turn_timeout_seconds: Option<u64>,

    /// Free-form settings, consulted only for keys that are not declared above.
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl HttpConfig {
    /// `host:port` for binding.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Where a resolved setting came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingSource {
    /// A statically declared field.
    Declared,
    /// The `overrides` map.
    Override,
}

/// A setting resolved by [`ServerConfig::setting`].
#[derive(Debug, Clone, PartialEq)]
pub struct Setting {
    pub value: Value,
    pub source: SettingSource,
}

impl ServerConfig {
    /// Loads configuration from the optional file and environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value is invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            builder = builder.add_source(config::File::with_name(&path));
        }
        builder
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// The configured turn deadline.
    #[must_use]
    pub fn turn_timeout(&self) -> Option<Duration> {
        self.turn_timeout_seconds.map(Duration::from_secs)
    }

    /// Resolves a dotted setting name such as `session.ttl_seconds`.
    ///
    /// Declared fields always win. The overrides map is only consulted for
    /// names that no declared field answers to. The API key is never
    /// returned in clear.
    #[must_use]
    pub fn setting(&self, key: &str) -> Option<Setting> {
        let declared = match key {
            "server.host" => Some(json!(self.server.host)),
            "server.port" => Some(json!(self.server.port)),
            "store.backend" => Some(json!(match self.store.backend {
                StoreBackendKind::Memory => "memory",
                StoreBackendKind::Nats => "nats",
            })),
            "store.nats_url" => Some(json!(self.store.nats_url)),
            "store.bucket" => Some(json!(self.store.bucket)),
            "store.sweep_interval_seconds" => Some(json!(self.store.sweep_interval_seconds)),
            "store.nats_max_age_seconds" => Some(json!(self.store.nats_max_age_seconds)),
            "store.retry_attempts" => Some(json!(self.store.retry_attempts)),
            "store.retry_delay_ms" => Some(json!(self.store.retry_delay_ms)),
            "session.ttl_seconds" => Some(json!(self.session.ttl_seconds)),
            "session.key_prefix" => Some(json!(self.session.key_prefix)),
            "llm.base_url" => Some(json!(self.llm.base_url)),
            "llm.api_key" => Some(json!(self.llm.api_key.as_ref().map(|_| "********"))),
            "llm.model" => Some(json!(self.llm.model)),
            "llm.temperature" => Some(json!(self.llm.temperature)),
            "llm.timeout_seconds" => Some(json!(self.llm.timeout_seconds)),
            "engine.max_iterations" => Some(json!(self.engine.max_iterations)),
            "engine.history_turns" => Some(json!(self.engine.history_turns)),
            "engine.response_window_messages" => {
                Some(json!(self.engine.response_window_messages))
            }
            "turn_timeout_seconds" => Some(json!(self.turn_timeout_seconds)),
            _ => None,
        };

        match declared {
            Some(value) => Some(Setting {
                value,
                source: SettingSource::Declared,
            }),
            None => self.overrides.get(key).map(|value| Setting {
                value: Value::String(value.clone()),
                source: SettingSource::Override,
            }),
        }
    }
}
