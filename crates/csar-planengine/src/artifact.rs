//! Artifact resolution: turning a plan reference into package bytes.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use csar_core::CsarId;
use csar_engine::EnginePackage;
use tracing::debug;

use crate::error::{PlanEngineError, PlanEngineResult};

/// Looks up the packaged plan a CSAR refers to.
#[async_trait]
pub trait ArtifactResolver: Send + Sync {
    /// `Ok(None)` when the reference does not name a file of the CSAR.
    async fn resolve(
        &self,
        csar_id: &CsarId,
        reference: &str,
    ) -> PlanEngineResult<Option<EnginePackage>>;
}

/// Resolves references against unpacked CSARs at `{root}/{csar_id}/{reference}`.
#[derive(Debug, Clone)]
pub struct FsArtifactResolver {
    root: PathBuf,
}

impl FsArtifactResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Only plain relative paths stay inside the CSAR directory.
fn is_contained(reference: &str) -> bool {
    let path = Path::new(reference);
    !reference.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

#[async_trait]
impl ArtifactResolver for FsArtifactResolver {
    async fn resolve(
        &self,
        csar_id: &CsarId,
        reference: &str,
    ) -> PlanEngineResult<Option<EnginePackage>> {
        if !is_contained(reference) {
            debug!(csar = %csar_id, reference, "reference leaves the CSAR directory");
            return Ok(None);
        }
        let path = self.root.join(csar_id.as_str()).join(reference);
        let access = |e: std::io::Error| PlanEngineError::ArtifactAccess {
            reference: reference.to_string(),
            reason: e.to_string(),
        };

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                debug!(path = %path.display(), "plan reference is not a file");
                return Ok(None);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "plan reference not found");
                return Ok(None);
            }
            Err(e) => return Err(access(e)),
        }

        let bytes = tokio::fs::read(&path).await.map_err(access)?;
        let name = path
            .file_name()
            .map_or_else(|| reference.to_string(), |name| name.to_string_lossy().into_owned());
        debug!(path = %path.display(), bytes = bytes.len(), "plan package read");
        Ok(Some(EnginePackage::new(name, bytes)))
    }
}
