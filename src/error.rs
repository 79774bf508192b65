use thiserror::Error;

/// Top-level error type for the monitor
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Query against {table} timed out after {timeout_ms}ms")]
    QueryTimeout { table: String, timeout_ms: u64 },
}

/// Result type alias for the monitor
pub type MonitorResult<T> = Result<T, MonitorError>;
