//! Service configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// PostgreSQL connection settings.
    pub database: DatabaseConfig,

    /// Deadline for one ledger unit of work, in seconds.
    pub tx_timeout_seconds: u64,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// PostgreSQL connection settings.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    /// Server host.
    #[serde(default = "default_db_host")]
    pub host: String,
    /// Server port.
    #[serde(default = "default_db_port")]
    pub port: u16,
    /// Login role.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Database name.
    #[serde(default = "default_db_name")]
    pub name: String,
    /// Pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl DatabaseConfig {
    /// Connection options for sqlx.
    #[must_use]
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_db_host(),
            port: default_db_port(),
            user: "postgres".into(),
            password: String::new(),
            name: default_db_name(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_db_host() -> String {
    "localhost".into()
}

const fn default_db_port() -> u16 {
    5432
}

fn default_db_name() -> String {
    "points".into()
}

const fn default_max_connections() -> u32 {
    10
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let database = load_database_secrets()
            .unwrap_or_else(|| database_from(|key| std::env::var(key).ok()));
        Self::from_lookup(|key| std::env::var(key).ok(), database)
    }

    /// Build configuration from a variable lookup.
    fn from_lookup(var: impl Fn(&str) -> Option<String>, database: DatabaseConfig) -> Self {
        let listen_addr = var("LISTEN_ADDR")
            .or_else(|| var("SERVE_PORT").map(|port| format!("0.0.0.0:{port}")))
            .unwrap_or_else(|| "0.0.0.0:8080".into());

        Self {
            listen_addr,
            database,
            tx_timeout_seconds: positive(&var, "TX_TIMEOUT_SECONDS").unwrap_or(10),
            cors_origins: var("CORS_ORIGINS")
                .unwrap_or_else(|| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: parsed(&var, "MAX_BODY_BYTES").unwrap_or(1024 * 1024), // 1MB
            request_timeout_seconds: positive(&var, "REQUEST_TIMEOUT_SECONDS").unwrap_or(30),
        }
    }

    /// Deadline for one ledger unit of work.
    #[must_use]
    pub const fn tx_timeout(&self) -> Duration {
        Duration::from_secs(self.tx_timeout_seconds)
    }
}

fn parsed<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    var(key).and_then(|s| s.parse().ok())
}

/// Zero would expire every deadline immediately, so it counts as unset.
fn positive(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    parsed(var, key).filter(|&value: &u64| value > 0)
}

fn database_from(var: impl Fn(&str) -> Option<String>) -> DatabaseConfig {
    let defaults = DatabaseConfig::default();
    DatabaseConfig {
        host: var("DATABASE_HOST").unwrap_or(defaults.host),
        port: parsed(&var, "DATABASE_PORT").unwrap_or(defaults.port),
        user: var("DATABASE_USER").unwrap_or(defaults.user),
        password: var("DATABASE_PASSWORD").unwrap_or(defaults.password),
        name: var("DATABASE_NAME").unwrap_or(defaults.name),
        max_connections: parsed(&var, "DATABASE_MAX_CONNECTIONS")
            .unwrap_or(defaults.max_connections),
    }
}

/// Load database credentials from a secrets file, if one exists.
fn load_database_secrets() -> Option<DatabaseConfig> {
    let secret_paths = [".secrets/postgres.json", "../.secrets/postgres.json"];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<DatabaseConfig>(path) {
            tracing::info!(path = %path, "Loaded database secrets from file");
            return Some(secrets);
        }
    }

    tracing::debug!("Database secrets file not found, using environment variables");
    None
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            database: DatabaseConfig::default(),
            tx_timeout_seconds: 10,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}
