//! csar-planengine: plan deployment orchestrator.
//!
//! Takes a packaged WS-BPEL plan out of a CSAR, rewires its endpoints to the
//! services the container currently knows, ships it to the process engine,
//! and registers the resulting callable endpoint. Undeployment reverses
//! this.
//!
//! # Architecture
//!
//! ```text
//! DeploymentControl          tracked plan state around each run
//!   └── PlanEnginePlugin     (PlanDeployer for WS-BPEL 2.0)
//!         ├── ArtifactResolver     reference → package bytes
//!         ├── archive + workspace  unzip / rezip in a temp dir
//!         ├── EndpointRewriter     (csar-rewrite)
//!         ├── EngineConnector      (csar-engine)
//!         └── StateStore           resolved endpoints (csar-tracker)
//! ```
//!
//! Collaborators are injected as trait objects and can be replaced at
//! runtime through [`Swappable`].

pub mod archive;
pub mod artifact;
pub mod control;
pub mod deployer;
pub mod error;
pub mod swap;
pub mod workspace;

pub use artifact::{ArtifactResolver, FsArtifactResolver};
pub use control::{DeploymentControl, DeploymentOutcome};
pub use deployer::{PlanDeployer, PlanEnginePlugin, WS_BPEL_20, select_endpoint};
pub use error::{PlanEngineError, PlanEngineResult};
pub use swap::Swappable;
pub use workspace::PlanWorkspace;
