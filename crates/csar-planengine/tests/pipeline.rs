//! End-to-end deploy/undeploy pipeline tests.
//!
//! Runs the deployer and the deployment control against an in-memory
//! store, in-memory artifacts, and a scripted engine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use csar_core::{ArtifactKind, ArtifactState, CsarId, EndpointResolver, QName, StaticResolver};
use csar_engine::{EngineConnector, EngineCredentials, EngineError, EnginePackage, EngineResult};
use csar_planengine::archive::{self, ArchiveEntry};
use csar_planengine::{
    ArtifactResolver, DeploymentControl, PlanDeployer, PlanEngineError, PlanEnginePlugin,
    PlanEngineResult,
};
use csar_tracker::{DeploymentTracker, StateStore};

const PLAN_PATH: &str = "Plans/BuildPlan.zip";
const PLAN_NS: &str = "http://example.org/plans/build";

const DEPLOY_XML: &str = r#"<deploy xmlns="http://www.apache.org/ode/schemas/dd/2007/03"
        xmlns:plan="http://example.org/plans/build" xmlns:db="http://example.org/ia/db">
  <process name="plan:BuildPlan">
    <provide partnerLink="client">
      <service name="plan:BuildPlanService" port="BuildPlanPort"/>
    </provide>
    <invoke partnerLink="dbPL">
      <service name="db:DbService" port="DbPort"/>
    </invoke>
  </process>
</deploy>"#;

const PLAN_WSDL: &str = r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
    xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
    xmlns:tns="http://example.org/plans/build"
    targetNamespace="http://example.org/plans/build">
  <binding name="BuildPlanBinding" type="tns:BuildPlanPT"/>
  <service name="BuildPlanService">
    <port name="BuildPlanPort" binding="tns:BuildPlanBinding">
      <soap:address location="http://localhost:9763/services/BuildPlan"/>
    </port>
  </service>
</definitions>"#;

const DB_WSDL: &str = r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/"
    xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
    xmlns:tns="http://example.org/ia/db"
    targetNamespace="http://example.org/ia/db">
  <binding name="DbBinding" type="tns:DbPT"/>
  <service name="DbService">
    <port name="DbPort" binding="tns:DbBinding">
      <soap:address location="http://placeholder:8080/db"/>
    </port>
  </service>
</definitions>"#;

const DB_ADDRESS: &str = "http://10.0.0.5:8080/db";
const PROCESS_ADDRESS: &str = "http://engine:9763/processes/BuildPlan";

// ── Fakes ──────────────────────────────────────────────────────────

#[derive(Default)]
struct MemoryArtifacts {
    packages: HashMap<(String, String), EnginePackage>,
}

impl MemoryArtifacts {
    fn with(mut self, csar: &str, reference: &str, package: EnginePackage) -> Self {
        self.packages
            .insert((csar.to_string(), reference.to_string()), package);
        self
    }
}

#[async_trait]
impl ArtifactResolver for MemoryArtifacts {
    async fn resolve(
        &self,
        csar_id: &CsarId,
        reference: &str,
    ) -> PlanEngineResult<Option<EnginePackage>> {
        Ok(self
            .packages
            .get(&(csar_id.to_string(), reference.to_string()))
            .cloned())
    }
}

/// Engine whose replies are fixed up front; records every call.
struct ScriptedEngine {
    process_id: Option<String>,
    endpoints: HashMap<String, String>,
    undeploy_ok: bool,
    endpoints_ok: bool,
    calls: Mutex<Vec<String>>,
    deployed: Mutex<Vec<EnginePackage>>,
}

impl ScriptedEngine {
    fn new(process_id: Option<&str>, endpoints: &[(&str, &str)]) -> Self {
        Self {
            process_id: process_id.map(str::to_string),
            endpoints: endpoints
                .iter()
                .map(|(role, uri)| (role.to_string(), uri.to_string()))
                .collect(),
            undeploy_ok: true,
            endpoints_ok: true,
            calls: Mutex::new(Vec::new()),
            deployed: Mutex::new(Vec::new()),
        }
    }

    fn healthy() -> Self {
        Self::new(Some("BuildPlan-1"), &[("client", PROCESS_ADDRESS), ("callback", "http://engine:9763/cb")])
    }

    fn failing_undeploy(mut self) -> Self {
        self.undeploy_ok = false;
        self
    }

    fn failing_endpoint_query(mut self) -> Self {
        self.endpoints_ok = false;
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EngineConnector for ScriptedEngine {
    async fn deploy(
        &self,
        package: &EnginePackage,
        _credentials: &EngineCredentials,
    ) -> EngineResult<String> {
        self.calls.lock().unwrap().push(format!("deploy:{}", package.name));
        self.deployed.lock().unwrap().push(package.clone());
        self.process_id.clone().ok_or(EngineError::Status {
            status: 500,
            body: "engine down".to_string(),
        })
    }

    async fn undeploy(
        &self,
        package: &EnginePackage,
        _credentials: &EngineCredentials,
    ) -> EngineResult<()> {
        self.calls.lock().unwrap().push(format!("undeploy:{}", package.name));
        if self.undeploy_ok {
            Ok(())
        } else {
            Err(EngineError::Status {
                status: 503,
                body: "busy".to_string(),
            })
        }
    }

    async fn endpoints_for_process(
        &self,
        process_id: &str,
        _credentials: &EngineCredentials,
    ) -> EngineResult<HashMap<String, String>> {
        self.calls.lock().unwrap().push(format!("endpoints:{process_id}"));
        if !self.endpoints_ok {
            return Err(EngineError::Timeout(Duration::from_secs(30)));
        }
        Ok(self.endpoints.clone())
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn csar() -> CsarId {
    CsarId::new("app.csar").unwrap()
}

fn plan_id() -> QName {
    QName::new(PLAN_NS, "BuildPlan")
}

fn plan_package(files: &[(&str, &str)]) -> EnginePackage {
    let entries: Vec<_> = files
        .iter()
        .map(|(path, content)| ArchiveEntry::new(*path, content.as_bytes().to_vec()))
        .collect();
    EnginePackage::new("BuildPlan.zip", archive::pack(&entries).unwrap())
}

fn build_plan() -> EnginePackage {
    plan_package(&[
        ("deploy.xml", DEPLOY_XML),
        ("BuildPlan.wsdl", PLAN_WSDL),
        ("wsdl/db.wsdl", DB_WSDL),
    ])
}

struct Harness {
    store: StateStore,
    engine: Arc<ScriptedEngine>,
    deployer: Arc<PlanDeployer>,
}

impl Harness {
    fn new(engine: ScriptedEngine, package: Option<EnginePackage>) -> Self {
        let store = StateStore::open_in_memory().unwrap();
        let engine = Arc::new(engine);
        let mut artifacts = MemoryArtifacts::default();
        if let Some(package) = package {
            artifacts = artifacts.with("app.csar", PLAN_PATH, package);
        }
        let resolver: Arc<dyn EndpointResolver> = Arc::new(
            StaticResolver::default().with("{http://example.org/ia/db}DbPT", DB_ADDRESS),
        );
        let deployer = PlanDeployer::new(
            store.clone(),
            Arc::new(artifacts),
            engine.clone(),
            resolver,
            EngineCredentials::new("http://engine:9763", "admin", "admin"),
        );
        Self {
            store,
            engine,
            deployer: Arc::new(deployer),
        }
    }

    fn control(&self) -> DeploymentControl {
        DeploymentControl::new(DeploymentTracker::new(self.store.clone()), self.deployer.clone())
    }

    fn plan_state(&self) -> Option<(ArtifactState, u32)> {
        self.store
            .get_artifact(ArtifactKind::Plan, &csar(), PLAN_PATH)
            .unwrap()
            .map(|info| (info.state, info.attempt))
    }
}

// ── Deploy ─────────────────────────────────────────────────────────

#[tokio::test]
async fn deploy_registers_endpoint_and_marks_plan_deployed() {
    let harness = Harness::new(ScriptedEngine::healthy(), Some(build_plan()));

    let outcome = harness.control().deploy_plan(&csar(), &plan_id(), PLAN_PATH).await;
    assert!(outcome.success, "{outcome}");

    let endpoint = harness.store.get_endpoint(&csar(), &plan_id()).unwrap().unwrap();
    assert_eq!(endpoint.address, PROCESS_ADDRESS);
    assert_eq!(endpoint.port_type, QName::new(PLAN_NS, "BuildPlanPT"));
    assert_eq!(harness.plan_state(), Some((ArtifactState::Deployed, 1)));
    assert_eq!(
        harness.engine.calls(),
        vec!["deploy:BuildPlan.zip".to_string(), "endpoints:BuildPlan-1".to_string()]
    );
}

#[tokio::test]
async fn shipped_package_carries_rewritten_addresses() {
    let harness = Harness::new(ScriptedEngine::healthy(), Some(build_plan()));
    harness
        .deployer
        .deploy_plan(&plan_id(), PLAN_PATH, &csar())
        .await
        .unwrap();

    let shipped = harness.engine.deployed.lock().unwrap()[0].clone();
    let entries = archive::extract(&shipped.bytes).unwrap();
    let db = entries.iter().find(|entry| entry.path == "wsdl/db.wsdl").unwrap();
    let db = String::from_utf8(db.bytes.clone()).unwrap();
    assert!(db.contains(DB_ADDRESS));
    assert!(!db.contains("placeholder"));

    let descriptor = entries.iter().find(|entry| entry.path == "deploy.xml").unwrap();
    assert_eq!(descriptor.bytes, DEPLOY_XML.as_bytes());
}

#[tokio::test]
async fn engine_failure_short_circuits_the_pipeline() {
    let harness = Harness::new(ScriptedEngine::new(None, &[]), Some(build_plan()));

    let outcome = harness.control().deploy_plan(&csar(), &plan_id(), PLAN_PATH).await;
    assert!(!outcome.success);
    assert!(outcome.reason.contains("engine deployment failed"), "{outcome}");

    assert!(harness.store.get_endpoint(&csar(), &plan_id()).unwrap().is_none());
    assert_eq!(harness.plan_state(), Some((ArtifactState::Deploying, 1)));
    assert_eq!(harness.engine.calls(), vec!["deploy:BuildPlan.zip".to_string()]);
}

#[tokio::test]
async fn retried_deploy_counts_attempts() {
    let harness = Harness::new(ScriptedEngine::new(None, &[]), Some(build_plan()));
    let control = harness.control();

    control.deploy_plan(&csar(), &plan_id(), PLAN_PATH).await;
    control.deploy_plan(&csar(), &plan_id(), PLAN_PATH).await;
    assert_eq!(harness.plan_state(), Some((ArtifactState::Deploying, 2)));
}

#[tokio::test]
async fn ambiguous_endpoints_fail_and_compensate() {
    let engine = ScriptedEngine::new(Some("BuildPlan-1"), &[("a", "http://a"), ("b", "http://b")]);
    let harness = Harness::new(engine, Some(build_plan()));

    let err = harness
        .deployer
        .deploy_plan(&plan_id(), PLAN_PATH, &csar())
        .await
        .unwrap_err();
    match err {
        PlanEngineError::NoClientEndpoint { process_id, roles } => {
            assert_eq!(process_id, "BuildPlan-1");
            assert_eq!(roles, "a, b");
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(harness.store.get_endpoint(&csar(), &plan_id()).unwrap().is_none());
    assert_eq!(
        harness.engine.calls(),
        vec![
            "deploy:BuildPlan.zip".to_string(),
            "endpoints:BuildPlan-1".to_string(),
            "undeploy:BuildPlan.zip".to_string(),
        ]
    );
}

#[tokio::test]
async fn compensation_can_be_disabled() {
    let store = StateStore::open_in_memory().unwrap();
    let engine = Arc::new(ScriptedEngine::new(Some("BuildPlan-1"), &[]));
    let deployer = PlanDeployer::new(
        store,
        Arc::new(MemoryArtifacts::default().with("app.csar", PLAN_PATH, build_plan())),
        engine.clone(),
        Arc::new(StaticResolver::default()),
        EngineCredentials::new("http://engine:9763", "admin", "admin"),
    )
    .with_compensation(false);

    let err = deployer.deploy_plan(&plan_id(), PLAN_PATH, &csar()).await.unwrap_err();
    assert!(matches!(err, PlanEngineError::NoClientEndpoint { .. }));
    assert!(!engine.calls().iter().any(|call| call.starts_with("undeploy:")));
}

#[tokio::test]
async fn failed_endpoint_query_compensates() {
    let harness = Harness::new(ScriptedEngine::healthy().failing_endpoint_query(), Some(build_plan()));

    let err = harness
        .deployer
        .deploy_plan(&plan_id(), PLAN_PATH, &csar())
        .await
        .unwrap_err();
    match err {
        PlanEngineError::EndpointQueryFailed { process_id, .. } => assert_eq!(process_id, "BuildPlan-1"),
        other => panic!("unexpected error: {other}"),
    }

    assert!(harness.store.get_endpoint(&csar(), &plan_id()).unwrap().is_none());
    assert_eq!(
        harness.engine.calls(),
        vec![
            "deploy:BuildPlan.zip".to_string(),
            "endpoints:BuildPlan-1".to_string(),
            "undeploy:BuildPlan.zip".to_string(),
        ]
    );
}

#[tokio::test]
async fn single_endpoint_is_used_whatever_its_role() {
    let engine = ScriptedEngine::new(Some("BuildPlan-1"), &[("x", "http://engine:9763/x")]);
    let harness = Harness::new(engine, Some(build_plan()));

    let outcome = harness.control().deploy_plan(&csar(), &plan_id(), PLAN_PATH).await;
    assert!(outcome.success, "{outcome}");

    let endpoint = harness.store.get_endpoint(&csar(), &plan_id()).unwrap().unwrap();
    assert_eq!(endpoint.address, "http://engine:9763/x");
    assert!(!harness.engine.calls().iter().any(|call| call.starts_with("undeploy:")));
}

#[tokio::test]
async fn blank_endpoint_address_compensates() {
    let engine = ScriptedEngine::new(Some("BuildPlan-1"), &[("client", " ")]);
    let harness = Harness::new(engine, Some(build_plan()));

    let err = harness
        .deployer
        .deploy_plan(&plan_id(), PLAN_PATH, &csar())
        .await
        .unwrap_err();
    match err {
        PlanEngineError::MissingDeploymentResult { missing } => assert_eq!(missing, vec!["endpoint"]),
        other => panic!("unexpected error: {other}"),
    }

    assert!(harness.store.get_endpoint(&csar(), &plan_id()).unwrap().is_none());
    assert_eq!(
        harness.engine.calls().last().map(String::as_str),
        Some("undeploy:BuildPlan.zip")
    );
}

#[tokio::test]
async fn failed_redeploy_drops_previous_endpoint() {
    let harness = Harness::new(ScriptedEngine::healthy(), Some(build_plan()));
    let control = harness.control();

    assert!(control.deploy_plan(&csar(), &plan_id(), PLAN_PATH).await.success);
    assert!(harness.store.get_endpoint(&csar(), &plan_id()).unwrap().is_some());

    harness.deployer.engine().replace(Arc::new(ScriptedEngine::new(None, &[])));
    let outcome = control.deploy_plan(&csar(), &plan_id(), PLAN_PATH).await;

    assert!(!outcome.success);
    assert_eq!(harness.plan_state(), Some((ArtifactState::Deploying, 2)));
    assert!(harness.store.get_endpoint(&csar(), &plan_id()).unwrap().is_none());
    assert!(
        harness
            .store
            .find_endpoint_by_port_type(&csar(), &QName::new(PLAN_NS, "BuildPlanPT"))
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn missing_artifact_is_reported_without_engine_calls() {
    let harness = Harness::new(ScriptedEngine::healthy(), None);

    let err = harness
        .deployer
        .deploy_plan(&plan_id(), PLAN_PATH, &csar())
        .await
        .unwrap_err();
    assert!(matches!(err, PlanEngineError::ArtifactNotFound { .. }));
    assert!(harness.engine.calls().is_empty());
}

#[tokio::test]
async fn non_zip_artifact_is_a_bad_format() {
    let package = EnginePackage::new("BuildPlan.zip", b"<process/>".to_vec());
    let harness = Harness::new(ScriptedEngine::healthy(), Some(package));

    let err = harness
        .deployer
        .deploy_plan(&plan_id(), PLAN_PATH, &csar())
        .await
        .unwrap_err();
    assert!(matches!(err, PlanEngineError::BadArtifactFormat { .. }));
    assert!(harness.engine.calls().is_empty());
}

#[tokio::test]
async fn corrupt_zip_is_a_bad_format() {
    let package = EnginePackage::new("BuildPlan.zip", b"PK\x03\x04 truncated".to_vec());
    let harness = Harness::new(ScriptedEngine::healthy(), Some(package));

    let err = harness
        .deployer
        .deploy_plan(&plan_id(), PLAN_PATH, &csar())
        .await
        .unwrap_err();
    assert!(matches!(err, PlanEngineError::BadArtifactFormat { .. }), "{err}");
    assert!(harness.engine.calls().is_empty());
}

#[tokio::test]
async fn unknown_inbound_port_type_aborts_before_engine() {
    let package = plan_package(&[("deploy.xml", DEPLOY_XML), ("wsdl/db.wsdl", DB_WSDL)]);
    let harness = Harness::new(ScriptedEngine::healthy(), Some(package));

    let err = harness
        .deployer
        .deploy_plan(&plan_id(), PLAN_PATH, &csar())
        .await
        .unwrap_err();
    assert!(matches!(err, PlanEngineError::EndpointResolutionFatal(_)));
    assert!(harness.engine.calls().is_empty());
}

#[tokio::test]
async fn unresolved_bindings_do_not_block_deployment() {
    let store = StateStore::open_in_memory().unwrap();
    let engine = Arc::new(ScriptedEngine::healthy());
    let deployer = PlanDeployer::new(
        store.clone(),
        Arc::new(MemoryArtifacts::default().with("app.csar", PLAN_PATH, build_plan())),
        engine.clone(),
        Arc::new(StaticResolver::default()),
        EngineCredentials::new("http://engine:9763", "admin", "admin"),
    );

    let endpoint = deployer.deploy_plan(&plan_id(), PLAN_PATH, &csar()).await.unwrap();
    assert_eq!(endpoint.address, PROCESS_ADDRESS);
    assert!(store.get_endpoint(&csar(), &plan_id()).unwrap().is_some());
}

#[tokio::test]
async fn swapped_engine_is_used_by_later_calls() {
    let harness = Harness::new(ScriptedEngine::new(None, &[]), Some(build_plan()));
    assert!(
        harness
            .deployer
            .deploy_plan(&plan_id(), PLAN_PATH, &csar())
            .await
            .is_err()
    );

    let replacement = Arc::new(ScriptedEngine::healthy());
    harness.deployer.engine().replace(replacement.clone());
    harness
        .deployer
        .deploy_plan(&plan_id(), PLAN_PATH, &csar())
        .await
        .unwrap();
    assert_eq!(harness.engine.calls().len(), 1);
    assert_eq!(replacement.calls().len(), 2);
}

// ── Undeploy ───────────────────────────────────────────────────────

#[tokio::test]
async fn full_lifecycle_follows_attempt_rules() {
    let harness = Harness::new(ScriptedEngine::healthy(), Some(build_plan()));
    let control = harness.control();

    assert!(control.deploy_plan(&csar(), &plan_id(), PLAN_PATH).await.success);
    assert_eq!(harness.plan_state(), Some((ArtifactState::Deployed, 1)));
    assert!(control.tracker().plan_invocable(&csar(), PLAN_PATH).unwrap());

    let outcome = control.undeploy_plan(&csar(), &plan_id(), PLAN_PATH).await;
    assert!(outcome.success, "{outcome}");
    assert_eq!(harness.plan_state(), Some((ArtifactState::Undeployed, 1)));
    assert!(!control.tracker().plan_invocable(&csar(), PLAN_PATH).unwrap());
    assert!(harness.store.get_endpoint(&csar(), &plan_id()).unwrap().is_none());
}

#[tokio::test]
async fn undeploy_without_endpoint_reports_engine_outcome() {
    let harness = Harness::new(ScriptedEngine::healthy(), Some(build_plan()));

    harness
        .deployer
        .undeploy_plan(&plan_id(), PLAN_PATH, &csar())
        .await
        .unwrap();
    assert_eq!(harness.engine.calls(), vec!["undeploy:BuildPlan.zip".to_string()]);
}

#[tokio::test]
async fn failed_undeploy_still_drops_endpoint() {
    let harness = Harness::new(ScriptedEngine::healthy().failing_undeploy(), Some(build_plan()));
    let control = harness.control();

    assert!(control.deploy_plan(&csar(), &plan_id(), PLAN_PATH).await.success);
    let outcome = control.undeploy_plan(&csar(), &plan_id(), PLAN_PATH).await;

    assert!(!outcome.success);
    assert!(outcome.reason.contains("engine undeployment failed"), "{outcome}");
    assert!(harness.store.get_endpoint(&csar(), &plan_id()).unwrap().is_none());
    assert_eq!(harness.plan_state(), Some((ArtifactState::Undeploying, 1)));

    // A retry of the same phase counts as another attempt.
    control.undeploy_plan(&csar(), &plan_id(), PLAN_PATH).await;
    assert_eq!(harness.plan_state(), Some((ArtifactState::Undeploying, 2)));
}
