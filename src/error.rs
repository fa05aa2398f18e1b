use thiserror::Error;

/// Application error types
///
/// Every request-level failure maps to exactly one variant. `Connection` and
/// `Config` abort startup; the rest fail a single request.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Stable code for the error category
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Cache(_) => "CACHE_ERROR",
            AppError::Query(_) => "QUERY_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Render(_) => "RENDER_ERROR",
            AppError::Input(_) => "INPUT_ERROR",
            AppError::Connection(_) => "CONNECTION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
        }
    }
}

/// Convert redis::RedisError to AppError
impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Cache(err.to_string())
    }
}

/// Convert serde_json::Error to AppError
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convert config::ConfigError to AppError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}
