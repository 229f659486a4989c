//! # System Parameters
//!
//! Constants shared across the crate and the environment-sourced [`Settings`]
//! used to pick and reach a backend.
//!
//! Settings are read once, missing optional values fall back to the defaults
//! listed in [`defaults`]. The mandatory Data API settings are validated only
//! when the corresponding backend is set up, so that a MongoDB deployment
//! does not need HCD or Astra credentials.

use std::collections::HashMap;
use std::time::Duration;

use crate::types::BackendKind;

/// Collection (or table) holding user records on every backend
pub const USERS_COLLECTION: &str = "users";

/// Field holding the record key
pub const RECORD_KEY_FIELD: &str = "_id";

/// Number of records written with a single bulk insert during migrations
pub const MIGRATION_BATCH_SIZE: usize = 100;

/// Maximum number of per-record errors returned in a migration report
pub const MIGRATION_REPORTED_ERRORS: usize = 5;

/// Number of times an Astra database is polled while waiting for it to be
/// active again after a keyspace creation
pub const ASTRA_ACTIVE_POLL_ATTEMPTS: usize = 120;

/// Pause between two Astra database status polls
pub const ASTRA_ACTIVE_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Environment variable names
pub mod env {
    pub const DATABASE_TYPE: &str = "DATABASE_TYPE";

    pub const MONGODB_URI: &str = "MONGODB_URI";
    pub const MONGODB_DATABASE: &str = "MONGODB_DATABASE";

    pub const HCD_API_ENDPOINT: &str = "HCD_API_ENDPOINT";
    pub const HCD_USERNAME: &str = "HCD_USERNAME";
    pub const HCD_PASSWORD: &str = "HCD_PASSWORD";
    pub const HCD_KEYSPACE: &str = "HCD_KEYSPACE";

    pub const ASTRA_DB_ID: &str = "ASTRA_DB_ID";
    pub const ASTRA_DB_REGION: &str = "ASTRA_DB_REGION";
    pub const ASTRA_DB_TOKEN: &str = "ASTRA_DB_TOKEN";
    pub const ASTRA_DB_KEYSPACE: &str = "ASTRA_DB_KEYSPACE";

    pub const MIGRATION_RECORD_FALLBACK: &str = "MIGRATION_RECORD_FALLBACK";

    pub(super) const ALL: &[&str] = &[
        DATABASE_TYPE,
        MONGODB_URI,
        MONGODB_DATABASE,
        HCD_API_ENDPOINT,
        HCD_USERNAME,
        HCD_PASSWORD,
        HCD_KEYSPACE,
        ASTRA_DB_ID,
        ASTRA_DB_REGION,
        ASTRA_DB_TOKEN,
        ASTRA_DB_KEYSPACE,
        MIGRATION_RECORD_FALLBACK,
    ];
}

/// Default values for optional settings
pub mod defaults {
    pub const MONGODB_URI: &str = "mongodb://localhost:27017/";
    pub const MONGODB_DATABASE: &str = "user_profiles";
    pub const KEYSPACE: &str = "default_keyspace";
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("unsupported database type `{0}`")]
    UnsupportedBackend(String),
    #[error("{backend} configuration incomplete, missing {}", .keys.join(", "))]
    MissingSettings {
        backend: BackendKind,
        keys: Vec<&'static str>,
    },
    #[error("invalid value `{value}` for `{key}`")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongoSettings {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HcdSettings {
    pub api_endpoint: String,
    pub username: String,
    pub password: String,
    pub keyspace: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AstraSettings {
    pub db_id: String,
    pub region: String,
    pub token: String,
    pub keyspace: String,
}

impl AstraSettings {
    /// Data API endpoint of the database
    pub fn api_endpoint(&self) -> String {
        format!(
            "https://{}-{}.apps.astra.datastax.com",
            self.db_id, self.region
        )
    }
}

/// Settings used to reach the configured backend.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Backend selected at startup
    pub backend: BackendKind,
    /// Retry records one by one when a migration batch is rejected
    pub record_fallback: bool,
    vars: HashMap<&'static str, String>,
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, which maps a variable name to its value.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars: HashMap<&'static str, String> = env::ALL
            .iter()
            .filter_map(|key| {
                lookup(*key)
                    .filter(|value| !value.trim().is_empty())
                    .map(|value| (*key, value))
            })
            .collect();

        let backend = match vars.get(env::DATABASE_TYPE) {
            Some(value) => value.trim().parse()?,
            None => BackendKind::default(),
        };

        let record_fallback = match vars.get(env::MIGRATION_RECORD_FALLBACK) {
            Some(value) => parse_flag(env::MIGRATION_RECORD_FALLBACK, value)?,
            None => false,
        };

        Ok(Self {
            backend,
            record_fallback,
            vars,
        })
    }

    /// Returns a copy of these settings bound to another backend.
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn mongodb(&self) -> MongoSettings {
        MongoSettings {
            uri: self.get_or(env::MONGODB_URI, defaults::MONGODB_URI),
            database: self.get_or(env::MONGODB_DATABASE, defaults::MONGODB_DATABASE),
        }
    }

    pub fn hcd(&self) -> Result<HcdSettings, ConfigError> {
        let [api_endpoint, username, password] = self.require(
            BackendKind::Hcd,
            [env::HCD_API_ENDPOINT, env::HCD_USERNAME, env::HCD_PASSWORD],
        )?;

        Ok(HcdSettings {
            api_endpoint,
            username,
            password,
            keyspace: self.get_or(env::HCD_KEYSPACE, defaults::KEYSPACE),
        })
    }

    pub fn astra(&self) -> Result<AstraSettings, ConfigError> {
        let [db_id, region, token] = self.require(
            BackendKind::Astra,
            [env::ASTRA_DB_ID, env::ASTRA_DB_REGION, env::ASTRA_DB_TOKEN],
        )?;

        Ok(AstraSettings {
            db_id,
            region,
            token,
            keyspace: self.get_or(env::ASTRA_DB_KEYSPACE, defaults::KEYSPACE),
        })
    }

    fn get_or(&self, key: &str, default: &str) -> String {
        self.vars
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_owned())
    }

    /// Collects all the mandatory `keys`, reporting every missing one at once.
    fn require<const N: usize>(
        &self,
        backend: BackendKind,
        keys: [&'static str; N],
    ) -> Result<[String; N], ConfigError> {
        let missing: Vec<&'static str> = keys
            .iter()
            .filter(|key| !self.vars.contains_key(**key))
            .copied()
            .collect();

        if !missing.is_empty() {
            return Err(ConfigError::MissingSettings {
                backend,
                keys: missing,
            });
        }

        Ok(keys.map(|key| self.vars.get(key).cloned().unwrap_or_default()))
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_owned(),
        }),
    }
}
