/// Shared error type used across all DeployPilot crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("completion {provider}: {message}")]
    Completion { provider: String, message: String },

    #[error("workflow engine {endpoint}: {message}")]
    Workflow { endpoint: String, message: String },

    #[error("store: {0}")]
    Store(String),

    #[error("identifier resolution: {0}")]
    Resolve(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True when the error came from an exceeded time budget (either our
    /// own deadline or the HTTP client's).
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}
