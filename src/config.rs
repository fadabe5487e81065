use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::session::SessionSettings;
use crate::storage::StorageConfig;

const ENV_PREFIX: &str = "SIGNUP";
const DEFAULT_BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024; // 10 MiB
const DEFAULT_SESSION_MAX_AGE_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_SESSION_SECRET: &str = "your-secret-key";

/// Conventional variables honoured when the prefixed form is not set.
const CONVENTIONAL_VARS: [(&str, &str); 4] = [
    ("PORT", "SIGNUP_SERVER__PORT"),
    ("MONGODB_URI", "SIGNUP_STORAGE__URI"),
    ("SESSION_SECRET", "SIGNUP_SESSION__SECRET"),
    ("NODE_ENV", "SIGNUP_ENVIRONMENT"),
];

/// Top-level application configuration loaded from file + environment.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageSection,
    pub session: SessionSection,
    pub environment: Environment,
    pub logging: LoggingSection,
}

impl AppConfig {
    /// Load configuration from disk and the process environment.
    pub fn load() -> Result<Self> {
        let vars: config::Map<String, String> = env::vars().collect();
        Self::from_sources(vars)
    }

    /// Load configuration from disk and the given environment variables.
    pub fn from_sources(vars: config::Map<String, String>) -> Result<Self> {
        let config_path = vars
            .get("SIGNUP_CONFIG")
            .cloned()
            .unwrap_or_else(|| "config.toml".to_string());

        let mut builder = config::Config::builder();

        if Path::new(&config_path).exists() {
            builder = builder.add_source(config::File::from(PathBuf::from(&config_path)));
        }

        let mut vars = vars;
        vars.remove("SIGNUP_CONFIG");
        for (conventional, prefixed) in CONVENTIONAL_VARS {
            if vars.contains_key(prefixed) {
                continue;
            }
            if let Some(value) = vars.get(conventional).cloned() {
                vars.insert(prefixed.to_string(), value);
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(Some(vars)),
        );

        let settings = builder.build()?;
        let mut config: Self = settings
            .try_deserialize()
            .context("invalid configuration values")?;

        if config.logging.level.trim().is_empty() {
            config.logging.level = "info".to_string();
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.server.body_limit == 0 {
            bail!("server.body_limit must be greater than zero");
        }
        if self.session.collection.trim().is_empty() {
            bail!("session.collection must be specified");
        }
        if matches!(self.storage.backend, StorageBackendKind::Mongo) {
            if self.storage.uri.trim().is_empty() {
                bail!("storage.uri must be specified when backend is 'mongo'");
            }
            if self.storage.database.trim().is_empty() {
                bail!("storage.database must be specified");
            }
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Resolve storage configuration.
    pub fn storage_runtime(&self) -> StorageConfig {
        match self.storage.backend {
            StorageBackendKind::Mongo => StorageConfig::Mongo {
                uri: self.storage.uri.clone(),
                database: self.storage.database.clone(),
            },
            StorageBackendKind::Memory => StorageConfig::Memory,
        }
    }

    /// Resolve session settings; cookies are `Secure` only in production.
    pub fn session_runtime(&self) -> SessionSettings {
        SessionSettings::new(&self.session, self.is_production())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body, in bytes.
    pub body_limit: usize,
    /// Take the client address from `X-Forwarded-For` when set.
    pub trust_proxy: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            body_limit: DEFAULT_BODY_LIMIT_BYTES,
            trust_proxy: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub backend: StorageBackendKind,
    pub uri: String,
    pub database: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::Mongo,
            uri: "mongodb://localhost:27017".to_string(),
            database: "demo".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    #[default]
    Mongo,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub secret: String,
    pub collection: String,
    pub cookie_name: String,
    pub max_age_secs: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            secret: DEFAULT_SESSION_SECRET.to_string(),
            collection: "sessions".to_string(),
            cookie_name: "connect.sid".to_string(),
            max_age_secs: DEFAULT_SESSION_MAX_AGE_SECS,
        }
    }
}

/// Deployment environment. Anything other than `production` is development.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl<'de> Deserialize<'de> for Environment {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_default())
    }
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    /// Only the exact value `production` enables production behaviour.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "production" => Ok(Environment::Production),
            "development" | "test" | "" => Ok(Environment::Development),
            other => bail!("unsupported environment: {}", other),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}
