//! Engine connector error types.

use std::time::Duration;

use thiserror::Error;

/// Errors from calls to the remote process engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid engine address '{0}'")]
    InvalidAddress(String),

    #[error("failed to connect to engine at {address}: {reason}")]
    Connect { address: String, reason: String },

    #[error("engine call timed out after {0:?}")]
    Timeout(Duration),

    #[error("engine request failed: {0}")]
    Request(String),

    #[error("engine replied with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode engine reply: {0}")]
    Decode(String),

    #[error("engine returned an empty process id")]
    EmptyProcessId,
}

pub type EngineResult<T> = Result<T, EngineError>;
