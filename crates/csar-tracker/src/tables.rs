//! redb table definitions for the deployment record store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized records).
//! Composite keys follow the pattern `{csar_id}/{rest}`; CSAR ids never
//! contain `/`, so `{csar_id}/` is a safe prefix for per-CSAR scans.

use csar_core::ArtifactKind;
use redb::TableDefinition;

/// CSAR lifecycle state keyed by `{csar_id}`.
pub const CSAR_STATES: TableDefinition<&str, &[u8]> = TableDefinition::new("csar_states");

/// Implementation artifact deployment info keyed by `{csar_id}/{rel_path}`.
pub const IA_DEPLOYMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("ia_deployments");

/// Plan deployment info keyed by `{csar_id}/{rel_path}`.
pub const PLAN_DEPLOYMENTS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("plan_deployments");

/// Resolved plan endpoints keyed by `{csar_id}/{plan_id}`.
pub const PLAN_ENDPOINTS: TableDefinition<&str, &[u8]> = TableDefinition::new("plan_endpoints");

/// Table holding deployment info for the given artifact kind.
pub fn deployments_table(kind: ArtifactKind) -> TableDefinition<'static, &'static str, &'static [u8]> {
    match kind {
        ArtifactKind::ImplementationArtifact => IA_DEPLOYMENTS,
        ArtifactKind::Plan => PLAN_DEPLOYMENTS,
    }
}
