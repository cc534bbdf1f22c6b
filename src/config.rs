//! Configuration manager for passage.

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::application::usecases::{DEFAULT_STORE_TIMEOUT, TokenLifetimes};
use crate::application::error::{ApplicationError, Result};
use crate::domain::key::SigningKey;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_ADDRESS: &str = "0.0.0.0:8080";
/// Longest accepted token lifetime, ten years.
pub const MAX_LIFETIME_SECS: i64 = 10 * 365 * 24 * 60 * 60;
/// Environment variable holding the signing key.
pub const KEY_ENV: &str = "TOKEN_KEY";

/// A configuration file exists but cannot be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot open `{path}`: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed `{path}`: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Socket address the HTTP server binds to.
    pub address: String,
    /// Related to token issuance.
    pub token: Token,
    /// Related to PostgreSQL configuration.
    #[serde(skip_serializing)]
    pub postgres: Option<Postgres>,
    pub telemetry: Telemetry,
    #[serde(skip)]
    path: PathBuf,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_owned(),
            address: DEFAULT_ADDRESS.to_owned(),
            token: Token::default(),
            postgres: None,
            telemetry: Telemetry::default(),
            path: PathBuf::new(),
        }
    }
}

/// Token configuration.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Token {
    pub access_lifetime_secs: i64,
    pub refresh_lifetime_secs: i64,
    /// Bound on every store call, in milliseconds.
    pub store_timeout_ms: u64,
    /// Fallback when `TOKEN_KEY` is unset.
    #[serde(skip_serializing)]
    pub key: Option<String>,
}

impl Default for Token {
    fn default() -> Self {
        let lifetimes = TokenLifetimes::default();
        Self {
            access_lifetime_secs: lifetimes.access.num_seconds(),
            refresh_lifetime_secs: lifetimes.refresh.num_seconds(),
            store_timeout_ms: DEFAULT_STORE_TIMEOUT.as_millis() as u64,
            key: None,
        }
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("access_lifetime_secs", &self.access_lifetime_secs)
            .field("refresh_lifetime_secs", &self.refresh_lifetime_secs)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field("key", &self.key.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

impl Token {
    /// Configured lifetimes, each within `1..=MAX_LIFETIME_SECS`.
    pub fn lifetimes(&self) -> Result<TokenLifetimes> {
        Ok(TokenLifetimes {
            access: lifetime("access_lifetime_secs", self.access_lifetime_secs)?,
            refresh: lifetime(
                "refresh_lifetime_secs",
                self.refresh_lifetime_secs,
            )?,
        })
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

fn lifetime(field: &'static str, secs: i64) -> Result<TimeDelta> {
    TimeDelta::try_seconds(secs)
        .filter(|_| (1..=MAX_LIFETIME_SECS).contains(&secs))
        .ok_or(ApplicationError::InvalidLifetime {
            field,
            maximum: MAX_LIFETIME_SECS,
        })
}

/// PostgreSQL configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Postgres {
    /// Hostname:(?port) for PostgreSQL instance.
    pub address: String,
    /// Database name.
    pub database: Option<String>,
    /// Username credential to connect.
    pub username: Option<String>,
    /// Password credential to connect.
    pub password: Option<String>,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Telemetry {
    /// Export spans over OTLP.
    pub otlp: bool,
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    ///
    /// Without any file the defaults are used and [`Configuration::file`] is
    /// `None`. A file that exists but cannot be read or parsed is an error.
    pub fn read(self) -> std::result::Result<Self, ConfigError> {
        let path = if self.path.is_file() {
            self.path
        } else {
            Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Ok(Self::default());
            },
            Err(source) => return Err(ConfigError::Io { path, source }),
        };

        match serde_yaml::from_reader::<_, Configuration>(file) {
            Ok(config) => Ok(config.path(path)),
            Err(source) => Err(ConfigError::Malformed { path, source }),
        }
    }

    /// File the configuration was loaded from.
    pub fn file(&self) -> Option<&Path> {
        (!self.path.as_os_str().is_empty()).then_some(self.path.as_path())
    }

    /// Resolve the signing key, preferring `TOKEN_KEY` over `token.key`.
    pub fn signing_key(&self) -> Result<SigningKey> {
        let key = std::env::var(KEY_ENV).ok().or_else(|| self.token.key.clone());
        self.key_from(key)
    }

    fn key_from(&self, key: Option<String>) -> Result<SigningKey> {
        match key {
            Some(key) if !key.is_empty() => Ok(SigningKey::new(key)?),
            _ => Err(ApplicationError::MissingKey),
        }
    }
}
