//! Container-side deployment commands.
//!
//! Wraps a [`PlanEnginePlugin`] with the tracked plan state: the in-flight
//! state (and its attempt) is recorded and any stale endpoint dropped
//! before the pipeline runs, the terminal state only after it succeeds. A
//! failed run leaves the artifact in its in-flight state so a retry is
//! counted.

use std::fmt;
use std::sync::Arc;

use csar_core::{ArtifactKind, ArtifactState, CsarId, QName};
use csar_tracker::DeploymentTracker;
use tracing::{error, info, warn};

use crate::deployer::PlanEnginePlugin;

/// Boolean result plus a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentOutcome {
    pub success: bool,
    pub reason: String,
}

impl DeploymentOutcome {
    fn succeeded(reason: impl Into<String>) -> Self {
        Self {
            success: true,
            reason: reason.into(),
        }
    }

    fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for DeploymentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success { "ok" } else { "failed" };
        write!(f, "{status}: {}", self.reason)
    }
}

pub struct DeploymentControl {
    tracker: DeploymentTracker,
    plugin: Arc<dyn PlanEnginePlugin>,
}

impl DeploymentControl {
    pub fn new(tracker: DeploymentTracker, plugin: Arc<dyn PlanEnginePlugin>) -> Self {
        Self { tracker, plugin }
    }

    pub fn tracker(&self) -> &DeploymentTracker {
        &self.tracker
    }

    /// Deploy the plan stored at `rel_path` of the CSAR.
    pub async fn deploy_plan(&self, csar_id: &CsarId, plan_id: &QName, rel_path: &str) -> DeploymentOutcome {
        if let Err(e) =
            self.tracker
                .store_artifact_state(ArtifactKind::Plan, csar_id, rel_path, ArtifactState::Deploying)
        {
            error!(csar = %csar_id, path = rel_path, error = %e, "could not record deployment start");
            return DeploymentOutcome::failed(format!("could not record deployment start: {e}"));
        }
        // An endpoint only exists while the plan is deployed.
        match self.tracker.store().remove_endpoint(csar_id, plan_id) {
            Ok(true) => info!(csar = %csar_id, plan = %plan_id, "endpoint of previous deployment removed"),
            Ok(false) => {}
            Err(e) => {
                error!(csar = %csar_id, plan = %plan_id, error = %e, "could not remove previous endpoint");
                return DeploymentOutcome::failed(format!("could not remove previous endpoint: {e}"));
            }
        }

        let endpoint = match self.plugin.deploy_plan(plan_id, rel_path, csar_id).await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                warn!(csar = %csar_id, plan = %plan_id, error = %e, "plan deployment failed");
                return DeploymentOutcome::failed(e.to_string());
            }
        };

        match self
            .tracker
            .store_artifact_state(ArtifactKind::Plan, csar_id, rel_path, ArtifactState::Deployed)
        {
            Ok(_) => {
                info!(csar = %csar_id, plan = %plan_id, address = %endpoint.address, "plan ready");
                DeploymentOutcome::succeeded(format!(
                    "plan {plan_id} deployed at {}",
                    endpoint.address
                ))
            }
            Err(e) => {
                error!(csar = %csar_id, path = rel_path, error = %e, "could not record deployed state");
                DeploymentOutcome::failed(format!(
                    "plan {plan_id} deployed but its state could not be recorded: {e}"
                ))
            }
        }
    }

    /// Undeploy the plan stored at `rel_path` of the CSAR.
    pub async fn undeploy_plan(&self, csar_id: &CsarId, plan_id: &QName, rel_path: &str) -> DeploymentOutcome {
        if let Err(e) =
            self.tracker
                .store_artifact_state(ArtifactKind::Plan, csar_id, rel_path, ArtifactState::Undeploying)
        {
            error!(csar = %csar_id, path = rel_path, error = %e, "could not record undeployment start");
            return DeploymentOutcome::failed(format!("could not record undeployment start: {e}"));
        }

        if let Err(e) = self.plugin.undeploy_plan(plan_id, rel_path, csar_id).await {
            warn!(csar = %csar_id, plan = %plan_id, error = %e, "plan undeployment failed");
            return DeploymentOutcome::failed(e.to_string());
        }

        match self
            .tracker
            .store_artifact_state(ArtifactKind::Plan, csar_id, rel_path, ArtifactState::Undeployed)
        {
            Ok(_) => DeploymentOutcome::succeeded(format!("plan {plan_id} undeployed")),
            Err(e) => {
                error!(csar = %csar_id, path = rel_path, error = %e, "could not record undeployed state");
                DeploymentOutcome::failed(format!(
                    "plan {plan_id} undeployed but its state could not be recorded: {e}"
                ))
            }
        }
    }
}
