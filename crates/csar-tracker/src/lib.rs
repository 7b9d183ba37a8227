//! csar-tracker: deployment record store and state tracker.
//!
//! Backed by [redb](https://docs.rs/redb), persists the lifecycle state of
//! each CSAR, the deployment state and attempt count of every implementation
//! artifact and plan, and the resolved endpoints of deployed plans.
//!
//! # Architecture
//!
//! ```text
//! DeploymentTracker        attempt-count and transition rules, logging
//!   └── StateStore         typed CRUD, one redb transaction per call
//!         ├── csar_states        {csar_id}
//!         ├── ia_deployments     {csar_id}/{rel_path}
//!         ├── plan_deployments   {csar_id}/{rel_path}
//!         └── plan_endpoints     {csar_id}/{plan_id}
//! ```
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and is opened once per process, then shared by every orchestrator.

pub mod error;
pub mod store;
pub mod tables;
pub mod tracker;

pub use error::{StateError, StateResult};
pub use store::{CsarPurge, StateStore};
pub use tracker::{DeploymentTracker, apply_transition};
