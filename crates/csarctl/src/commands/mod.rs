pub mod deploy;
pub mod endpoints;
pub mod state;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use csar_core::{ChainResolver, ContainerConfig, StaticResolver};
use csar_engine::{EngineCredentials, HttpEngineConnector};
use csar_planengine::{DeploymentControl, FsArtifactResolver, PlanDeployer};
use csar_tracker::{DeploymentTracker, StateStore};
use tracing::debug;

/// Configuration plus the opened record store.
pub struct Container {
    pub config: ContainerConfig,
    pub store: StateStore,
}

impl Container {
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        let config = ContainerConfig::load_or_default(config_path)?;
        let db_path = &config.database.path;
        if let Some(parent) = db_path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let store = StateStore::open(db_path)
            .with_context(|| format!("opening state store {}", db_path.display()))?;
        debug!(path = %db_path.display(), "state store opened");
        Ok(Self { config, store })
    }

    pub fn tracker(&self) -> DeploymentTracker {
        DeploymentTracker::new(self.store.clone())
    }

    /// Wire the WS-BPEL deployer against the configured engine.
    ///
    /// Endpoints are resolved from the static `[endpoints]` table first,
    /// then from plans already deployed in the same CSAR.
    pub fn control(&self) -> DeploymentControl {
        let engine_config = &self.config.engine;
        let resolver = ChainResolver::new()
            .push(StaticResolver::new(self.config.endpoints.clone()))
            .push(self.store.clone());
        let engine =
            HttpEngineConnector::new().with_timeout(Duration::from_secs(engine_config.timeout_secs));
        let credentials = EngineCredentials::new(
            engine_config.address.clone(),
            engine_config.login.clone(),
            engine_config.password.clone(),
        );

        let deployer = PlanDeployer::new(
            self.store.clone(),
            Arc::new(FsArtifactResolver::new(self.config.plans.csar_root.clone())),
            Arc::new(engine),
            Arc::new(resolver),
            credentials,
        )
        .with_compensation(self.config.plans.compensate_unreachable);

        DeploymentControl::new(self.tracker(), Arc::new(deployer))
    }
}
