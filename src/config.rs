use std::env;
use std::path::PathBuf;

/// Runtime configuration, read from environment variables with defaults.
///
/// Environment variables:
/// - `MINISQL_DATA_DIR` - root directory for the catalog files
/// - `MINISQL_MAX_QUERY_LENGTH` - longest accepted query, in bytes
/// - `MINISQL_MAX_RESULT_ROWS` - result rows returned per query
/// - `MINISQL_MAX_QUERY_HISTORY` - per-session history entries kept
/// - `MINISQL_ALLOWED_ORIGINS` - comma-separated CORS origins
/// - `MINISQL_LOG_LEVEL` - tracing filter for the shell binary
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub max_query_length: usize,
    pub max_result_rows: usize,
    pub max_query_history: usize,
    pub allowed_origins: Vec<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("minisql_data"),
            max_query_length: 10_000,
            max_result_rows: 1_000,
            max_query_history: 100,
            allowed_origins: vec![
                "http://localhost:3000".into(),
                "http://127.0.0.1:3000".into(),
            ],
            log_level: "info".into(),
        }
    }
}

impl Config {
    /// Reads the configuration from the environment, falling back to the
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: env::var("MINISQL_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            max_query_length: env_usize("MINISQL_MAX_QUERY_LENGTH")
                .unwrap_or(defaults.max_query_length),
            max_result_rows: env_usize("MINISQL_MAX_RESULT_ROWS")
                .unwrap_or(defaults.max_result_rows),
            max_query_history: env_usize("MINISQL_MAX_QUERY_HISTORY")
                .unwrap_or(defaults.max_query_history),
            allowed_origins: env::var("MINISQL_ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.allowed_origins),
            log_level: env::var("MINISQL_LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }

    /// Points the data directory somewhere else, keeping the rest.
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok()?.parse().ok()
}
