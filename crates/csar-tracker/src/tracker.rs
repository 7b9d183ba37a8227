//! Deployment state tracker: business rules over the record store.
//!
//! The container consults the tracker before running operations against a
//! CSAR, IA, or plan: a plan may only be invoked while its tracked state is
//! `Deployed`, and every entry into an in-flight phase is counted as an
//! attempt.
//!
//! # Attempt counting
//!
//! ```text
//! stored state   new state     attempt
//! ───────────    ───────────   ──────────────────
//! Deployed    →  Undeploying   reset to 0, then +1
//! any / none  →  Deploying     +1
//! any / none  →  Undeploying   +1
//! any / none  →  Deployed      unchanged
//! any / none  →  Undeployed    unchanged
//! ```

use csar_core::{ArtifactDeploymentInfo, ArtifactKind, ArtifactState, CsarId, CsarProcessState};
use tracing::{debug, info};

use crate::error::StateResult;
use crate::store::{CsarPurge, StateStore};

/// Compute the record to persist when `new_state` is stored for an artifact.
pub fn apply_transition(
    existing: Option<ArtifactDeploymentInfo>,
    csar_id: &CsarId,
    rel_path: &str,
    new_state: ArtifactState,
) -> ArtifactDeploymentInfo {
    let mut info = match existing {
        Some(mut stored) => {
            if stored.state == ArtifactState::Deployed && new_state == ArtifactState::Undeploying {
                debug!(csar = %csar_id, path = rel_path, "deployed artifact is now undeploying, attempt count reset");
                stored.attempt = 0;
            }
            stored.state = new_state;
            stored
        }
        None => ArtifactDeploymentInfo::new(csar_id.clone(), rel_path, new_state),
    };
    if new_state.is_in_flight() {
        info.attempt = info.attempt.saturating_add(1);
    }
    info
}

/// Tracks deployment progress of CSARs and their packaged artifacts.
#[derive(Clone)]
pub struct DeploymentTracker {
    store: StateStore,
}

impl DeploymentTracker {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    /// The underlying record store (endpoint CRUD lives there).
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    // ── CSAR lifecycle ─────────────────────────────────────────────

    /// Store the lifecycle state of a CSAR, overwriting any previous one.
    pub fn store_csar_state(&self, csar_id: &CsarId, state: CsarProcessState) -> StateResult<()> {
        let previous = self.store.put_csar_state(csar_id, state)?;
        match previous {
            Some(previous) => info!(csar = %csar_id, %previous, new = %state, "CSAR state stored"),
            None => info!(csar = %csar_id, new = %state, "CSAR state stored"),
        }
        Ok(())
    }

    pub fn csar_state(&self, csar_id: &CsarId) -> StateResult<Option<CsarProcessState>> {
        let state = self.store.get_csar_state(csar_id)?;
        match state {
            Some(state) => debug!(csar = %csar_id, %state, "CSAR state retrieved"),
            None => debug!(csar = %csar_id, "no CSAR state stored"),
        }
        Ok(state)
    }

    /// Remove the lifecycle state of a CSAR; a missing record is a no-op.
    pub fn delete_csar_state(&self, csar_id: &CsarId) -> StateResult<()> {
        let existed = self.store.delete_csar_state(csar_id)?;
        debug!(csar = %csar_id, existed, "CSAR state deleted");
        Ok(())
    }

    /// Remove the CSAR state together with all its artifact and endpoint records.
    pub fn delete_csar(&self, csar_id: &CsarId) -> StateResult<CsarPurge> {
        let purge = self.store.delete_csar(csar_id)?;
        info!(
            csar = %csar_id,
            ias = purge.implementation_artifacts,
            plans = purge.plans,
            endpoints = purge.endpoints,
            "CSAR deployment records deleted"
        );
        Ok(purge)
    }

    // ── Artifacts ──────────────────────────────────────────────────

    /// Store a new deployment state for an IA or plan, applying the
    /// attempt-count rules atomically.
    pub fn store_artifact_state(
        &self,
        kind: ArtifactKind,
        csar_id: &CsarId,
        rel_path: &str,
        state: ArtifactState,
    ) -> StateResult<ArtifactDeploymentInfo> {
        info!(csar = %csar_id, %kind, path = rel_path, %state, "storing deployment state");
        let stored = self.store.update_artifact(kind, csar_id, rel_path, |existing| {
            apply_transition(existing, csar_id, rel_path, state)
        })?;
        info!(
            csar = %csar_id,
            %kind,
            path = rel_path,
            state = %stored.state,
            attempt = stored.attempt,
            "deployment state stored"
        );
        Ok(stored)
    }

    pub fn artifact_state(
        &self,
        kind: ArtifactKind,
        csar_id: &CsarId,
        rel_path: &str,
    ) -> StateResult<Option<ArtifactDeploymentInfo>> {
        let info = self.store.get_artifact(kind, csar_id, rel_path)?;
        if info.is_none() {
            debug!(csar = %csar_id, %kind, path = rel_path, "no deployment info stored");
        }
        Ok(info)
    }

    pub fn list_artifact_states(
        &self,
        kind: ArtifactKind,
        csar_id: &CsarId,
    ) -> StateResult<Vec<ArtifactDeploymentInfo>> {
        let infos = self.store.list_artifacts(kind, csar_id)?;
        debug!(csar = %csar_id, %kind, count = infos.len(), "deployment infos retrieved");
        Ok(infos)
    }

    /// Whether the container may invoke the plan at `rel_path`.
    pub fn plan_invocable(&self, csar_id: &CsarId, rel_path: &str) -> StateResult<bool> {
        Ok(self
            .artifact_state(ArtifactKind::Plan, csar_id, rel_path)?
            .is_some_and(|info| info.state == ArtifactState::Deployed))
    }
}
