//! Endpoint rewriter error types.

use std::path::PathBuf;

use thiserror::Error;

/// Hard failures of a rewrite run. Unresolved bindings are not errors; they
/// are reported through [`crate::RewriteReport`].
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("inbound port type of the process could not be determined: {0}")]
    PortTypeUnknown(String),

    #[error("invalid descriptor pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type RewriteResult<T> = Result<T, RewriteError>;
