use thiserror::Error;

/// Login could not produce a usable session. Fatal for the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthenticationError {
    #[error("timed out after {secs}s waiting for {what}")]
    Timeout { what: String, secs: u64 },
    #[error("login rejected: {0}")]
    Rejected(String),
    #[error("browser driver error: {0}")]
    Driver(String),
}

/// The probe could not return a batch this iteration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("probe transport failed: {0}")]
    Transport(String),
    #[error("probe script failed: {0}")]
    Script(String),
    #[error("browser session lost: {0}")]
    SessionLost(String),
}

impl ProbeError {
    /// A lost session cannot recover by polling again.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProbeError::SessionLost(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("fragment exceeds max size: {size} > {max}")]
    Oversized { size: usize, max: usize },
    #[error("selector compile failed: {0}")]
    Selector(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("chat input control not found")]
    InputMissing,
    #[error("send transport failed: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session release failed: {0}")]
    Release(String),
}

/// Failure of the render/keyboard capability.
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("terminal io failed: {0}")]
    Io(#[from] std::io::Error),
}
