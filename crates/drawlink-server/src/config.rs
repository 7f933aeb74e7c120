use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use drawlink_core::DEFAULT_MAX_ATTACHMENT_BYTES;
use sqlx::postgres::PgConnectOptions;

/// Where the database lives
#[derive(Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    /// `DATABASE_URL`, already percent-encoded by whoever wrote it
    Url(String),
    /// `DB_*` variables, passed to the driver verbatim
    Parts {
        host: String,
        port: u16,
        username: String,
        password: String,
        database: String,
    },
}

impl DatabaseTarget {
    pub fn connect_options(&self) -> anyhow::Result<PgConnectOptions> {
        match self {
            DatabaseTarget::Url(url) => {
                PgConnectOptions::from_str(url).context("Invalid DATABASE_URL")
            }
            DatabaseTarget::Parts {
                host,
                port,
                username,
                password,
                database,
            } => Ok(PgConnectOptions::new()
                .host(host)
                .port(*port)
                .username(username)
                .password(password)
                .database(database)),
        }
    }
}

// Keeps credentials out of logs
impl fmt::Debug for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseTarget::Url(_) => f.write_str("Url(..)"),
            DatabaseTarget::Parts {
                host,
                port,
                username,
                database,
                ..
            } => f
                .debug_struct("Parts")
                .field("host", host)
                .field("port", port)
                .field("username", username)
                .field("database", database)
                .finish_non_exhaustive(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    pub database: DatabaseTarget,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub db_idle_timeout: Duration,
    /// Origins allowed by CORS
    pub allowed_origins: Vec<String>,
    /// Largest accepted request body
    pub body_limit_bytes: usize,
    /// Largest accepted encrypted attachment
    pub max_attachment_bytes: usize,
    /// Root directory of the attachment blob store
    pub attachments_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            database: DatabaseTarget::Parts {
                host: "localhost".to_string(),
                port: 5432,
                username: "postgres".to_string(),
                password: "postgres".to_string(),
                database: "drawlink".to_string(),
            },
            db_max_connections: 20,
            db_acquire_timeout: Duration::from_millis(2000),
            db_idle_timeout: Duration::from_millis(30_000),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5000".to_string(),
            ],
            body_limit_bytes: 10 * 1024 * 1024,
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            attachments_dir: PathBuf::from("./data/attachments"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let database = match var("DATABASE_URL") {
            Some(url) => DatabaseTarget::Url(url),
            None => DatabaseTarget::Parts {
                host: var("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
                port: parse_or(&var, "DB_PORT", 5432u16)?,
                username: var("DB_USER").unwrap_or_else(|| "postgres".to_string()),
                password: var("DB_PASSWORD").unwrap_or_else(|| "postgres".to_string()),
                database: var("DB_NAME").unwrap_or_else(|| "drawlink".to_string()),
            },
        };

        let allowed_origins = match var("ALLOWED_ORIGINS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(String::from)
                .collect(),
            None => defaults.allowed_origins,
        };

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parse_or(&var, "PORT", defaults.port)?,
            database,
            db_max_connections: parse_or(&var, "DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            db_acquire_timeout: Duration::from_millis(parse_or(&var, "DB_ACQUIRE_TIMEOUT_MS", 2000)?),
            db_idle_timeout: Duration::from_millis(parse_or(&var, "DB_IDLE_TIMEOUT_MS", 30_000)?),
            allowed_origins,
            body_limit_bytes: parse_or(&var, "BODY_LIMIT_BYTES", defaults.body_limit_bytes)?,
            max_attachment_bytes: parse_or(&var, "MAX_ATTACHMENT_BYTES", defaults.max_attachment_bytes)?,
            attachments_dir: var("ATTACHMENTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.attachments_dir),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", name, raw)),
        None => Ok(default),
    }
}
