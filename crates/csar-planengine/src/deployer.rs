//! WS-BPEL plan deployer.
//!
//! # Deploy
//!
//! ```text
//! FETCH ─► REWRITE ─► PACKAGE ─► ENGINE_DEPLOY ─► RESOLVE_ENDPOINT ─► PERSIST
//! ```
//!
//! Each stage short-circuits the rest on a hard failure. Once the engine
//! has accepted the package, a failure to find a callable endpoint leaves a
//! process nobody can reach; with compensation enabled the package is
//! undeployed again before the failure is reported.
//!
//! # Undeploy
//!
//! Fetch the original package, undeploy it, then drop the stored endpoint
//! whatever the engine said. Only the engine outcome decides the result.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use csar_core::{CsarId, EndpointResolver, QName, ResolvedEndpoint};
use csar_engine::{EngineConnector, EngineCredentials, EngineError, EnginePackage};
use csar_rewrite::{CLIENT_PARTNER_LINK, EndpointRewriter};
use csar_tracker::StateStore;
use tracing::{debug, info, warn};

use crate::archive;
use crate::artifact::ArtifactResolver;
use crate::error::{PlanEngineError, PlanEngineResult};
use crate::swap::Swappable;
use crate::workspace::PlanWorkspace;

/// Namespace identifying executable WS-BPEL 2.0 processes.
pub const WS_BPEL_20: &str = "http://docs.oasis-open.org/wsbpel/2.0/process/executable";

const CAPABILITIES: &[&str] = &["WS-BPEL 2.0", "BPEL4RESTLight", "WSDL 1.1 SOAP/HTTP"];

/// A plan engine the container can hand plans of one language to.
#[async_trait]
pub trait PlanEnginePlugin: Send + Sync {
    /// Plan language this plugin deploys.
    fn language(&self) -> &str;

    fn capabilities(&self) -> Vec<String>;

    /// Deploy the plan at `reference` and register its endpoint.
    async fn deploy_plan(
        &self,
        plan_id: &QName,
        reference: &str,
        csar_id: &CsarId,
    ) -> PlanEngineResult<ResolvedEndpoint>;

    /// Undeploy the plan at `reference` and drop its endpoint.
    async fn undeploy_plan(
        &self,
        plan_id: &QName,
        reference: &str,
        csar_id: &CsarId,
    ) -> PlanEngineResult<()>;
}

/// Pick the endpoint the container invokes the process on.
///
/// A single endpoint is taken as is; otherwise the `client` partner role
/// wins; anything else is ambiguous.
pub fn select_endpoint(endpoints: &HashMap<String, String>) -> Option<&str> {
    if endpoints.len() == 1 {
        return endpoints.values().next().map(String::as_str);
    }
    endpoints.get(CLIENT_PARTNER_LINK).map(String::as_str)
}

/// Validate the deployment result, naming every missing part.
fn complete_endpoint(
    process_id: &str,
    address: &str,
    port_type: QName,
    csar_id: &CsarId,
    plan_id: &QName,
) -> PlanEngineResult<ResolvedEndpoint> {
    let mut missing = Vec::new();
    if process_id.trim().is_empty() {
        missing.push("process id");
    }
    if address.trim().is_empty() {
        missing.push("endpoint");
    }
    if port_type.local.is_empty() {
        missing.push("port type");
    }
    if !missing.is_empty() {
        return Err(PlanEngineError::MissingDeploymentResult { missing });
    }
    Ok(ResolvedEndpoint {
        address: address.to_string(),
        port_type,
        csar_id: csar_id.clone(),
        plan_id: plan_id.clone(),
    })
}

/// Unpack, rewrite, and repack a plan package; returns the new archive and
/// the process' inbound port type.
fn rewrite_package(
    csar_id: &CsarId,
    reference: &str,
    bytes: &[u8],
    resolver: &dyn EndpointResolver,
) -> PlanEngineResult<(Vec<u8>, QName)> {
    let entries = archive::extract(bytes).map_err(|e| PlanEngineError::BadArtifactFormat {
        reference: reference.to_string(),
        reason: e.to_string(),
    })?;
    let workspace = PlanWorkspace::new()?;
    let files = workspace.unpack(&entries)?;
    debug!(
        csar = %csar_id,
        files = files.len(),
        workspace = %workspace.path().display(),
        "plan unpacked"
    );

    let report = EndpointRewriter::new(resolver)?.rewrite(csar_id, &files)?;
    if !report.is_complete() {
        warn!(
            csar = %csar_id,
            unresolved = ?report.unresolved,
            "not all endpoints used by the plan have been changed"
        );
    }

    let packed = archive::pack(&workspace.collect()?)?;
    Ok((packed, report.port_type))
}

/// Deploys packaged WS-BPEL plans to a process engine.
pub struct PlanDeployer {
    store: StateStore,
    artifacts: Swappable<dyn ArtifactResolver>,
    engine: Swappable<dyn EngineConnector>,
    endpoints: Swappable<dyn EndpointResolver>,
    credentials: EngineCredentials,
    compensate_unreachable: bool,
}

impl PlanDeployer {
    pub fn new(
        store: StateStore,
        artifacts: Arc<dyn ArtifactResolver>,
        engine: Arc<dyn EngineConnector>,
        endpoints: Arc<dyn EndpointResolver>,
        credentials: EngineCredentials,
    ) -> Self {
        Self {
            store,
            artifacts: Swappable::new(artifacts),
            engine: Swappable::new(engine),
            endpoints: Swappable::new(endpoints),
            credentials,
            compensate_unreachable: true,
        }
    }

    /// Whether to undeploy a process again when it has no callable endpoint.
    pub fn with_compensation(mut self, enabled: bool) -> Self {
        self.compensate_unreachable = enabled;
        self
    }

    pub fn artifacts(&self) -> &Swappable<dyn ArtifactResolver> {
        &self.artifacts
    }

    pub fn engine(&self) -> &Swappable<dyn EngineConnector> {
        &self.engine
    }

    pub fn endpoint_resolver(&self) -> &Swappable<dyn EndpointResolver> {
        &self.endpoints
    }

    async fn fetch(&self, csar_id: &CsarId, reference: &str) -> PlanEngineResult<EnginePackage> {
        let package = self
            .artifacts
            .current()
            .resolve(csar_id, reference)
            .await?
            .ok_or_else(|| PlanEngineError::ArtifactNotFound {
                csar_id: csar_id.clone(),
                reference: reference.to_string(),
            })?;

        let zip_named = package.name.to_ascii_lowercase().ends_with(".zip");
        if !zip_named || !archive::is_zip(&package.bytes) {
            debug!(reference, name = %package.name, "plan reference is not a zip file");
            return Err(PlanEngineError::BadArtifactFormat {
                reference: reference.to_string(),
                reason: "not a zip file".to_string(),
            });
        }
        Ok(package)
    }

    async fn compensate(&self, engine: &dyn EngineConnector, package: &EnginePackage, process_id: &str) {
        if !self.compensate_unreachable {
            warn!(%process_id, "process stays deployed on the engine without a tracked endpoint");
            return;
        }
        match engine.undeploy(package, &self.credentials).await {
            Ok(()) => info!(%process_id, package = %package.name, "unreachable process undeployed again"),
            Err(e) => warn!(%process_id, error = %e, "compensating undeploy failed"),
        }
    }
}

#[async_trait]
impl PlanEnginePlugin for PlanDeployer {
    fn language(&self) -> &str {
        WS_BPEL_20
    }

    fn capabilities(&self) -> Vec<String> {
        CAPABILITIES.iter().map(|capability| capability.to_string()).collect()
    }

    async fn deploy_plan(
        &self,
        plan_id: &QName,
        reference: &str,
        csar_id: &CsarId,
    ) -> PlanEngineResult<ResolvedEndpoint> {
        info!(csar = %csar_id, plan = %plan_id, reference, "deploying plan");
        let fetched = self.fetch(csar_id, reference).await?;

        let resolver = self.endpoints.current();
        let csar = csar_id.clone();
        let archive_ref = reference.to_string();
        let original = fetched.bytes.clone();
        let (packed, port_type) = tokio::task::spawn_blocking(move || {
            rewrite_package(&csar, &archive_ref, &original, resolver.as_ref())
        })
        .await
        .map_err(|e| PlanEngineError::Workspace(std::io::Error::other(e)))??;
        let package = EnginePackage::new(fetched.name, packed);
        debug!(
            package = %package.name,
            digest = %archive::digest(&package.bytes),
            bytes = package.bytes.len(),
            "plan repackaged"
        );

        let engine = self.engine.current();
        let process_id = engine
            .deploy(&package, &self.credentials)
            .await
            .map_err(PlanEngineError::EngineDeployFailed)?;
        if process_id.trim().is_empty() {
            return Err(PlanEngineError::EngineDeployFailed(EngineError::EmptyProcessId));
        }

        let endpoints = match engine.endpoints_for_process(&process_id, &self.credentials).await {
            Ok(endpoints) => endpoints,
            Err(source) => {
                self.compensate(engine.as_ref(), &package, &process_id).await;
                return Err(PlanEngineError::EndpointQueryFailed { process_id, source });
            }
        };
        debug!(%process_id, ?endpoints, "engine endpoints of process");

        let Some(address) = select_endpoint(&endpoints) else {
            warn!(
                csar = %csar_id,
                plan = %plan_id,
                %process_id,
                "no endpoint could be determined, the container cannot instantiate this plan"
            );
            self.compensate(engine.as_ref(), &package, &process_id).await;
            let mut roles: Vec<&str> = endpoints.keys().map(String::as_str).collect();
            roles.sort_unstable();
            return Err(PlanEngineError::NoClientEndpoint {
                process_id,
                roles: roles.join(", "),
            });
        };

        let endpoint = match complete_endpoint(&process_id, address, port_type, csar_id, plan_id) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                warn!(csar = %csar_id, plan = %plan_id, %process_id, error = %e, "engine result unusable");
                self.compensate(engine.as_ref(), &package, &process_id).await;
                return Err(e);
            }
        };
        self.store.put_endpoint(&endpoint)?;
        info!(
            csar = %csar_id,
            plan = %plan_id,
            %process_id,
            address = %endpoint.address,
            port_type = %endpoint.port_type,
            "plan deployed"
        );
        Ok(endpoint)
    }

    async fn undeploy_plan(
        &self,
        plan_id: &QName,
        reference: &str,
        csar_id: &CsarId,
    ) -> PlanEngineResult<()> {
        info!(csar = %csar_id, plan = %plan_id, reference, "undeploying plan");
        let package = self.fetch(csar_id, reference).await?;
        let outcome = self.engine.current().undeploy(&package, &self.credentials).await;

        match self.store.remove_endpoint(csar_id, plan_id) {
            Ok(true) => debug!(csar = %csar_id, plan = %plan_id, "endpoint removed"),
            Ok(false) => warn!(
                csar = %csar_id,
                plan = %plan_id,
                "no endpoint stored for plan, nothing to remove"
            ),
            Err(e) => warn!(csar = %csar_id, plan = %plan_id, error = %e, "failed to remove endpoint"),
        }

        match outcome {
            Ok(()) => {
                info!(csar = %csar_id, plan = %plan_id, "plan undeployed");
                Ok(())
            }
            Err(e) => {
                warn!(csar = %csar_id, plan = %plan_id, error = %e, "plan undeployment failed");
                Err(PlanEngineError::EngineUndeployFailed(e))
            }
        }
    }
}
