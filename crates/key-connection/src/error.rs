use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("A connect request is already pending")]
    ConnectAlreadyPending,

    #[error("An unplug notice is already pending")]
    UnplugAlreadyPending,

    #[error("Subscription not registered: {0}")]
    NotRegistered(String),

    #[error("Failed to open device: {0}")]
    DeviceOpenFailed(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Host surface already destroyed")]
    SurfaceDestroyed,
}

pub type Result<T> = std::result::Result<T, ConnectionError>;

impl ConnectionError {
    /// Classification used when logging and by callers deciding whether a
    /// failure is their own fault.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ConnectionError::ConnectAlreadyPending => ErrorCategory::Precondition,
            ConnectionError::UnplugAlreadyPending => ErrorCategory::Precondition,
            ConnectionError::SurfaceDestroyed => ErrorCategory::Lifecycle,
            ConnectionError::NotRegistered(_) => ErrorCategory::Subscription,
            ConnectionError::DeviceOpenFailed(_) => ErrorCategory::Platform,
            ConnectionError::Platform(_) => ErrorCategory::Platform,
        }
    }

    /// True for programming errors that must be surfaced to the caller.
    pub fn is_precondition(&self) -> bool {
        self.category() == ErrorCategory::Precondition
    }

    /// Log a failure that is tolerated rather than propagated.
    pub fn log_tolerated(&self, operation: &str) {
        warn!(
            error = %self,
            category = %self.category(),
            operation,
            "Tolerated connection error"
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Precondition,
    Subscription,
    Platform,
    Lifecycle,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Precondition => write!(f, "precondition"),
            ErrorCategory::Subscription => write!(f, "subscription"),
            ErrorCategory::Platform => write!(f, "platform"),
            ErrorCategory::Lifecycle => write!(f, "lifecycle"),
        }
    }
}
