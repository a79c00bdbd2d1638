use thiserror::Error;

pub type Result<T> = std::result::Result<T, BeaconError>;

/// Errors surfaced to callers of the orchestration API.
///
/// Only configuration problems and total backend failure are fatal; delivery
/// problems are recovered internally and never reach the instrumentation
/// call sites.
#[derive(Error, Debug)]
pub enum BeaconError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Both backends failed to initialize (primary: {primary}; fallback: {fallback})")]
    BothBackendsFailed { primary: String, fallback: String },

    #[error("Unknown backend: {id}")]
    UnknownBackend { id: String },

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Errors raised by backend adapters.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Initialization failed: {message}")]
    Init { message: String },

    #[error("Send failed: {message}")]
    Send { message: String },

    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Request timed out: {message}")]
    Timeout { message: String },

    #[error("Backend has been shut down")]
    ShutDown,
}

impl BackendError {
    pub fn init(message: impl Into<String>) -> Self {
        BackendError::Init {
            message: message.into(),
        }
    }

    pub fn send(message: impl Into<String>) -> Self {
        BackendError::Send {
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Send { .. } => true,
            BackendError::Timeout { .. } => true,
            BackendError::Init { .. } => false,
            BackendError::Encoding(_) => false,
            BackendError::ShutDown => false,
        }
    }
}
