//! Configuration module
//!
//! Connection settings for the PostgreSQL backend and the tables to
//! pre-populate at startup. Values are layered: built-in defaults, then
//! `config.toml` in the platform config directory, then environment
//! variables (a `.env` file is read first by the binary).

pub mod storage;

use crate::database::schema::Table;
use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use std::time::Duration;
use tracing::warn;

/// Environment variable overriding the host
pub const ENV_HOST: &str = "GUILD_STORE_DB_HOST";
/// Environment variable overriding the port
pub const ENV_PORT: &str = "GUILD_STORE_DB_PORT";
/// Environment variable overriding the user
pub const ENV_USER: &str = "GUILD_STORE_DB_USER";
/// Environment variable overriding the password
pub const ENV_PASSWORD: &str = "GUILD_STORE_DB_PASSWORD";
/// Environment variable overriding the database name
pub const ENV_NAME: &str = "GUILD_STORE_DB_NAME";
/// Full connection URL; wins over the individual fields
pub const ENV_URL: &str = "DATABASE_URL";

/// PostgreSQL connection settings.
///
/// ```rust,ignore
/// let config = DbConfig::default()
///     .host("db.internal")
///     .database("bot")
///     .max_connections(10);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Login role
    pub user: String,
    /// Password, if the server wants one
    pub password: Option<String>,
    /// Database name
    pub database: String,
    /// Full connection URL; when set, the fields above are ignored
    pub url: Option<String>,
    /// Pool ceiling
    pub max_connections: u32,
    /// Connections kept open while idle
    pub min_connections: u32,
    /// Seconds to wait for a pooled connection
    pub acquire_timeout_secs: u64,
    /// Seconds before an idle connection is closed
    pub idle_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: None,
            database: "guild_store".to_string(),
            url: None,
            max_connections: 5,
            min_connections: 0,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl DbConfig {
    /// Sets the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the login role.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Sets the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the database name.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Sets a full connection URL, validating it first.
    pub fn url(mut self, url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        url.parse::<PgConnectOptions>()
            .map_err(|e| StoreError::Config(format!("invalid database URL: {}", e)))?;
        self.url = Some(url);
        Ok(self)
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of idle connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the acquire timeout.
    pub fn acquire_timeout_secs(mut self, secs: u64) -> Self {
        self.acquire_timeout_secs = secs;
        self
    }

    /// Sets the idle timeout.
    pub fn idle_timeout_secs(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Connection URL with the password masked, for display and logs
    pub fn connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return mask_password(url);
        }
        let auth = match &self.password {
            Some(_) => format!("{}:****", self.user),
            None => self.user.clone(),
        };
        format!(
            "postgres://{}@{}:{}/{}",
            auth, self.host, self.port, self.database
        )
    }

    /// sqlx connect options for these settings
    pub fn connect_options(&self) -> PgConnectOptions {
        if let Some(options) = self
            .url
            .as_deref()
            .and_then(|url| url.parse::<PgConnectOptions>().ok())
        {
            return options;
        }
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.database);
        match &self.password {
            Some(password) => options.password(password),
            None => options,
        }
    }
}

fn mask_password(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((auth, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match auth.split_once(':') {
        Some((user, _)) => format!("{}://{}:****@{}", scheme, user, host),
        None => url.to_string(),
    }
}

/// Everything the binary reads at startup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Connection settings
    pub database: DbConfig,
    /// Tables to load into the cache at startup
    pub chunk: Vec<String>,
}

impl Settings {
    /// Defaults, then the config file, then the process environment
    pub fn load() -> Result<Self> {
        let mut settings = storage::load()?;
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Parse settings from TOML; missing keys keep their defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| StoreError::Config(format!("failed to parse config file: {}", e)))
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let db = &mut self.database;
        if let Some(host) = lookup(ENV_HOST) {
            db.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            db.port = port
                .trim()
                .parse()
                .map_err(|_| StoreError::Config(format!("invalid {}: '{}'", ENV_PORT, port)))?;
        }
        if let Some(user) = lookup(ENV_USER) {
            db.user = user;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            db.password = Some(password);
        }
        if let Some(name) = lookup(ENV_NAME) {
            db.database = name;
        }
        if let Some(url) = lookup(ENV_URL).filter(|url| !url.is_empty()) {
            *db = std::mem::take(db).url(url)?;
        }
        Ok(())
    }

    /// The `chunk` list as tables. Unknown names are skipped with a warning.
    pub fn chunk_tables(&self) -> Vec<Table> {
        self.chunk
            .iter()
            .filter_map(|name| match name.parse::<Table>() {
                Ok(table) => Some(table),
                Err(e) => {
                    warn!(table = %name, error = %e, "Ignoring chunk entry");
                    None
                }
            })
            .collect()
    }
}
