//! Application configuration loaded from environment variables.

use std::time::Duration;

use projections::WorkerConfig;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `json` for JSON lines, anything else for human-readable output
/// - `DATABASE_URL`: PostgreSQL event store; in-memory when unset
/// - `PROJECTOR_WORKERS`: projector partitions (default: `4`)
/// - `PROJECTOR_MAX_ATTEMPTS`: attempts before dead-lettering (default: `3`)
/// - `PROJECTOR_RETRY_BACKOFF_MS`: base retry delay (default: `50`)
/// - `PROJECTOR_DEAD_LETTER_CAPACITY`: dead letters kept in memory (default: `10000`)
/// - `QUERY_TIMEOUT_MS`: per-query time limit (default: `5000`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub projector_workers: usize,
    pub projector_max_attempts: u32,
    pub projector_retry_backoff: Duration,
    pub projector_dead_letter_capacity: usize,
    pub query_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|value| value.trim().parse::<u64>().ok());

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|f| LogFormat::parse(&f))
                .unwrap_or(defaults.log_format),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            projector_workers: parsed("PROJECTOR_WORKERS")
                .filter(|&n| n > 0)
                .map(|n| n as usize)
                .unwrap_or(defaults.projector_workers),
            projector_max_attempts: parsed("PROJECTOR_MAX_ATTEMPTS")
                .filter(|&n| n > 0)
                .map(|n| n as u32)
                .unwrap_or(defaults.projector_max_attempts),
            projector_retry_backoff: parsed("PROJECTOR_RETRY_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.projector_retry_backoff),
            projector_dead_letter_capacity: parsed("PROJECTOR_DEAD_LETTER_CAPACITY")
                .filter(|&n| n > 0)
                .map(|n| n as usize)
                .unwrap_or(defaults.projector_dead_letter_capacity),
            query_timeout: parsed("QUERY_TIMEOUT_MS")
                .filter(|&ms| ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.query_timeout),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            workers: self.projector_workers,
            max_attempts: self.projector_max_attempts,
            retry_backoff: self.projector_retry_backoff,
            dead_letter_capacity: self.projector_dead_letter_capacity,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let workers = WorkerConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            projector_workers: workers.workers,
            projector_max_attempts: workers.max_attempts,
            projector_retry_backoff: workers.retry_backoff,
            projector_dead_letter_capacity: workers.dead_letter_capacity,
            query_timeout: Duration::from_secs(5),
        }
    }
}
