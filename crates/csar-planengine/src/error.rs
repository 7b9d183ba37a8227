//! Plan engine error types.

use csar_core::CsarId;
use csar_engine::EngineError;
use csar_rewrite::RewriteError;
use csar_tracker::StateError;
use thiserror::Error;

/// Errors from the plan deployment pipeline, one variant per failing stage.
#[derive(Debug, Error)]
pub enum PlanEngineError {
    #[error("plan artifact '{reference}' of CSAR {csar_id} not found")]
    ArtifactNotFound { csar_id: CsarId, reference: String },

    #[error("plan artifact '{reference}' is not a usable zip archive: {reason}")]
    BadArtifactFormat { reference: String, reason: String },

    #[error("failed to read plan artifact '{reference}': {reason}")]
    ArtifactAccess { reference: String, reason: String },

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("workspace I/O error: {0}")]
    Workspace(#[from] std::io::Error),

    #[error("inbound port type of the plan cannot be determined: {0}")]
    EndpointResolutionFatal(String),

    #[error("endpoint rewriting failed: {0}")]
    Rewrite(#[source] RewriteError),

    #[error("engine deployment failed: {0}")]
    EngineDeployFailed(#[source] EngineError),

    #[error("engine undeployment failed: {0}")]
    EngineUndeployFailed(#[source] EngineError),

    #[error("endpoint query for process {process_id} failed: {source}")]
    EndpointQueryFailed {
        process_id: String,
        #[source]
        source: EngineError,
    },

    #[error("process {process_id} deployed but no callable endpoint among [{roles}]")]
    NoClientEndpoint { process_id: String, roles: String },

    #[error("deployment result incomplete, missing {}", .missing.join(", "))]
    MissingDeploymentResult { missing: Vec<&'static str> },

    #[error("persistence failure: {0}")]
    Persistence(#[from] StateError),
}

impl From<RewriteError> for PlanEngineError {
    fn from(err: RewriteError) -> Self {
        match err {
            RewriteError::PortTypeUnknown(reason) => Self::EndpointResolutionFatal(reason),
            other => Self::Rewrite(other),
        }
    }
}

pub type PlanEngineResult<T> = Result<T, PlanEngineError>;
