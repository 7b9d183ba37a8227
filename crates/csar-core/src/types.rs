//! Lifecycle states and deployment records shared across the container.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ids::{CsarId, IdError, QName};

/// Match `input` against the display labels of `all`, ignoring case and
/// accepting `-` for `_`.
fn parse_label<T: Copy + fmt::Display>(all: &[T], input: &str) -> Result<T, IdError> {
    let wanted = input.trim().replace('-', "_").to_ascii_uppercase();
    all.iter()
        .copied()
        .find(|candidate| candidate.to_string() == wanted)
        .ok_or_else(|| IdError::UnknownState(input.to_string()))
}

/// CSAR-level lifecycle state. One live value per CSAR; stores overwrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CsarProcessState {
    Stored,
    Processing,
    Processed,
    IaDeploymentActive,
    IasDeployed,
    PlanDeploymentActive,
    PlansDeployed,
    Error,
    Deleting,
    Deleted,
}

impl fmt::Display for CsarProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CsarProcessState::Stored => "STORED",
            CsarProcessState::Processing => "PROCESSING",
            CsarProcessState::Processed => "PROCESSED",
            CsarProcessState::IaDeploymentActive => "IA_DEPLOYMENT_ACTIVE",
            CsarProcessState::IasDeployed => "IAS_DEPLOYED",
            CsarProcessState::PlanDeploymentActive => "PLAN_DEPLOYMENT_ACTIVE",
            CsarProcessState::PlansDeployed => "PLANS_DEPLOYED",
            CsarProcessState::Error => "ERROR",
            CsarProcessState::Deleting => "DELETING",
            CsarProcessState::Deleted => "DELETED",
        };
        f.write_str(label)
    }
}

impl CsarProcessState {
    pub const ALL: [CsarProcessState; 10] = [
        CsarProcessState::Stored,
        CsarProcessState::Processing,
        CsarProcessState::Processed,
        CsarProcessState::IaDeploymentActive,
        CsarProcessState::IasDeployed,
        CsarProcessState::PlanDeploymentActive,
        CsarProcessState::PlansDeployed,
        CsarProcessState::Error,
        CsarProcessState::Deleting,
        CsarProcessState::Deleted,
    ];
}

impl FromStr for CsarProcessState {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_label(&Self::ALL, s)
    }
}

/// Deployment phase of a single implementation artifact or plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactState {
    Deploying,
    Deployed,
    Undeploying,
    Undeployed,
}

impl ArtifactState {
    pub const ALL: [ArtifactState; 4] = [
        ArtifactState::Deploying,
        ArtifactState::Deployed,
        ArtifactState::Undeploying,
        ArtifactState::Undeployed,
    ];

    /// Deploying and undeploying are the phases that count as an attempt.
    pub fn is_in_flight(self) -> bool {
        matches!(self, ArtifactState::Deploying | ArtifactState::Undeploying)
    }
}

impl fmt::Display for ArtifactState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ArtifactState::Deploying => "DEPLOYING",
            ArtifactState::Deployed => "DEPLOYED",
            ArtifactState::Undeploying => "UNDEPLOYING",
            ArtifactState::Undeployed => "UNDEPLOYED",
        };
        f.write_str(label)
    }
}

impl FromStr for ArtifactState {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_label(&Self::ALL, s)
    }
}

/// Which family of packaged artifacts a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    ImplementationArtifact,
    Plan,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::ImplementationArtifact => f.write_str("IA"),
            ArtifactKind::Plan => f.write_str("Plan"),
        }
    }
}

/// Tracked deployment info of one artifact, keyed by `(csar_id, rel_path)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDeploymentInfo {
    pub csar_id: CsarId,
    /// Path of the artifact relative to the CSAR root.
    pub rel_path: String,
    pub state: ArtifactState,
    /// Number of deploy/undeploy attempts in the current cycle.
    pub attempt: u32,
}

impl ArtifactDeploymentInfo {
    pub fn new(csar_id: CsarId, rel_path: impl Into<String>, state: ArtifactState) -> Self {
        Self {
            csar_id,
            rel_path: rel_path.into(),
            state,
            attempt: 0,
        }
    }

    /// Composite key: `{csar_id}/{rel_path}`.
    pub fn table_key(&self) -> String {
        artifact_key(&self.csar_id, &self.rel_path)
    }
}

/// Callable endpoint of a deployed plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEndpoint {
    /// Network address the container invokes the process on.
    pub address: String,
    /// Port type of the process' inbound interface.
    pub port_type: QName,
    pub csar_id: CsarId,
    pub plan_id: QName,
}

impl ResolvedEndpoint {
    /// Composite key: `{csar_id}/{plan_id}`.
    pub fn table_key(&self) -> String {
        endpoint_key(&self.csar_id, &self.plan_id)
    }
}

pub fn artifact_key(csar_id: &CsarId, rel_path: &str) -> String {
    format!("{csar_id}/{rel_path}")
}

pub fn endpoint_key(csar_id: &CsarId, plan_id: &QName) -> String {
    format!("{csar_id}/{plan_id}")
}

/// Prefix shared by every composite key of one CSAR.
pub fn csar_prefix(csar_id: &CsarId) -> String {
    format!("{csar_id}/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_parse_from_labels() {
        assert_eq!("deployed".parse::<ArtifactState>(), Ok(ArtifactState::Deployed));
        assert_eq!("UNDEPLOYING".parse::<ArtifactState>(), Ok(ArtifactState::Undeploying));
        assert_eq!(
            "plan-deployment-active".parse::<CsarProcessState>(),
            Ok(CsarProcessState::PlanDeploymentActive)
        );
        assert_eq!(
            "stale".parse::<ArtifactState>(),
            Err(IdError::UnknownState("stale".to_string()))
        );
        for state in CsarProcessState::ALL {
            assert_eq!(state.to_string().parse::<CsarProcessState>(), Ok(state));
        }
    }

    #[test]
    fn in_flight_states() {
        assert!(ArtifactState::Deploying.is_in_flight());
        assert!(ArtifactState::Undeploying.is_in_flight());
        assert!(!ArtifactState::Deployed.is_in_flight());
        assert!(!ArtifactState::Undeployed.is_in_flight());
    }

    #[test]
    fn keys_are_scoped_by_csar() {
        let csar = CsarId::new("app.csar").unwrap();
        let info = ArtifactDeploymentInfo::new(csar.clone(), "Plans/build.zip", ArtifactState::Deploying);
        assert_eq!(info.table_key(), "app.csar/Plans/build.zip");
        assert!(info.table_key().starts_with(&csar_prefix(&csar)));
        assert_eq!(info.attempt, 0);
    }
}
