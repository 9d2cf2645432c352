use thiserror::Error;

/// Startup configuration problems. Any of these stops the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("POLYGON_API_KEY is not set")]
    MissingApiKey,

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Transient failures talking to the ticker source. Logged and retried by the poller.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("non-success response: {0}")]
    Status(reqwest::StatusCode),

    #[error("failed to decode listing: {0}")]
    Decode(String),
}

/// Failures writing the snapshot cache file. Never fatal.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
