//! Communication error types and handling

use thiserror::Error;

/// Errors raised by byte sources and command sinks
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommError {
    /// Port closed or never opened
    #[error("port {port} is not connected")]
    NotConnected { port: String },
    /// Underlying transport failure
    #[error("I/O error on {port}: {details}")]
    Io { port: String, details: String },
    /// Encoded sentence longer than the line limit
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLong { len: usize, max: usize },
    /// Command payload cannot be framed as a sentence
    #[error("invalid command payload: {details}")]
    InvalidPayload { details: String },
    /// Requested command preset slot does not exist or is empty
    #[error("no command preset in slot {index}")]
    UnknownPreset { index: usize },
}

/// Result type for communication operations
pub type CommResult<T> = Result<T, CommError>;

/// Error recovery strategy for communication failures
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecoveryStrategy {
    /// Retry on the next poll
    Retry,
    /// Wait and then retry
    RetryWithDelay { delay_ms: u32 },
    /// Drop the request and continue
    Skip,
}

impl CommError {
    /// Recommended recovery strategy for this error
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            CommError::NotConnected { .. } => RecoveryStrategy::RetryWithDelay { delay_ms: 1000 },
            CommError::Io { .. } => RecoveryStrategy::Retry,
            CommError::FrameTooLong { .. }
            | CommError::InvalidPayload { .. }
            | CommError::UnknownPreset { .. } => RecoveryStrategy::Skip,
        }
    }

    /// Whether retrying the same operation can succeed
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.recovery_strategy(), RecoveryStrategy::Skip)
    }
}
