use clap::{Parser, ValueEnum};
use jiff::SignedDuration;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const SERVER_ADDRESS_ENV: &str = "SERVER_ADDRESS";
pub const BASE_URL_ENV: &str = "BASE_URL";
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const FILE_STORAGE_PATH_ENV: &str = "FILE_STORAGE_PATH";
pub const DATABASE_DSN_ENV: &str = "DATABASE_DSN";
pub const SECRET_KEY_ENV: &str = "SECRET_KEY";
pub const REQUEST_TIMEOUT_ENV: &str = "REQUEST_TIMEOUT";
pub const DELETE_FLUSH_INTERVAL_ENV: &str = "DELETE_FLUSH_INTERVAL";

pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:8080";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_REQUEST_TIMEOUT: &str = "30s";
pub const DEFAULT_DELETE_FLUSH_INTERVAL: &str = "10s";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Storage backend selected from the configured locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    File(PathBuf),
    Postgres(String),
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::File(path) => write!(f, "file ({})", path.display()),
            // the dsn may carry credentials
            StorageBackend::Postgres(_) => write!(f, "postgres"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "burrow", about = "URL shortener HTTP server")]
pub struct Config {
    #[arg(short = 'a', long, env = SERVER_ADDRESS_ENV, default_value = DEFAULT_SERVER_ADDRESS)]
    pub server_address: SocketAddr,

    /// Prefix of returned short URLs.
    #[arg(short = 'b', long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// `tracing` filter directive, e.g. `info` or `burrow_storage=debug`.
    #[arg(short = 'l', long, env = LOG_LEVEL_ENV, default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[arg(short = 'f', long, env = FILE_STORAGE_PATH_ENV)]
    pub file_storage_path: Option<PathBuf>,

    #[arg(short = 'd', long, env = DATABASE_DSN_ENV)]
    pub database_dsn: Option<String>,

    /// Key used to sign user tokens.
    #[arg(short = 'k', long, env = SECRET_KEY_ENV, hide_env_values = true)]
    pub secret_key: String,

    #[arg(
        long,
        env = REQUEST_TIMEOUT_ENV,
        default_value = DEFAULT_REQUEST_TIMEOUT,
        value_parser = parse_duration,
    )]
    pub request_timeout: Duration,

    #[arg(
        long,
        env = DELETE_FLUSH_INTERVAL_ENV,
        default_value = DEFAULT_DELETE_FLUSH_INTERVAL,
        value_parser = parse_duration,
    )]
    pub delete_flush_interval: Duration,
}

impl Config {
    /// A database DSN wins over a file path; with neither, URLs live in memory.
    /// Empty values count as unset.
    pub fn storage_backend(&self) -> StorageBackend {
        if let Some(dsn) = self.database_dsn.as_ref().filter(|dsn| !dsn.is_empty()) {
            return StorageBackend::Postgres(dsn.clone());
        }
        if let Some(path) = self
            .file_storage_path
            .as_ref()
            .filter(|path| !path.as_os_str().is_empty())
        {
            return StorageBackend::File(path.clone());
        }
        StorageBackend::Memory
    }
}

/// Parses `30s`, `1m 30s` or ISO 8601 `PT30S` into a non-negative duration.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let signed: SignedDuration = value
        .parse()
        .map_err(|e| format!("invalid duration '{value}': {e}"))?;
    if signed.is_zero() {
        return Err(format!("duration '{value}' must be positive"));
    }
    Duration::try_from(signed).map_err(|_| format!("duration '{value}' must be positive"))
}
