/// Central error type for the Rally system.
#[derive(Debug, thiserror::Error)]
pub enum RallyError {
    #[error("match not found: {id}")]
    MatchNotFound { id: String },

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("request timed out after {secs}s: {operation}")]
    Timeout { operation: String, secs: u64 },

    #[error("app shell install failed for {path}: {message}")]
    InstallFailed { path: String, message: String },

    #[error("invalid url {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("database error: {0}")]
    Database(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("credential error: {message}")]
    CredentialError { message: String },

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for RallyError {
    fn from(e: serde_json::Error) -> Self {
        RallyError::Serialization(e.to_string())
    }
}
