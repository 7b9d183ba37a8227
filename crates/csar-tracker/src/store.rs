//! StateStore: redb-backed deployment record persistence.
//!
//! Provides typed CRUD operations over CSAR lifecycle states, IA and plan
//! deployment infos, and resolved plan endpoints. All values are
//! JSON-serialized into redb's `&[u8]` value columns. The store supports
//! both on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use csar_core::{
    ArtifactDeploymentInfo, ArtifactKind, CsarId, CsarProcessState, EndpointResolver, QName,
    ResolvedEndpoint, ServiceRef, artifact_key, csar_prefix, endpoint_key,
};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{StateError, StateResult};
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

type Table = TableDefinition<'static, &'static str, &'static [u8]>;

/// Keys starting with `prefix`; the first failed read aborts the scan.
fn keys_with_prefix<E: std::fmt::Display>(
    entries: impl IntoIterator<Item = Result<String, E>>,
    prefix: &str,
) -> StateResult<Vec<String>> {
    let mut keys = Vec::new();
    for entry in entries {
        let key = entry.map_err(map_err!(Read))?;
        if key.starts_with(prefix) {
            keys.push(key);
        }
    }
    Ok(keys)
}

/// Counts of records removed by [`StateStore::delete_csar`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CsarPurge {
    pub csar_state: bool,
    pub implementation_artifacts: u32,
    pub plans: u32,
    pub endpoints: u32,
}

/// Thread-safe record store backed by redb.
///
/// Every mutation runs in its own write transaction. redb admits one writer
/// at a time, so a read-modify-write inside [`StateStore::update_artifact`]
/// is atomic with respect to all other writers.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent record store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "record store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory record store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory record store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        for table in [CSAR_STATES, IA_DEPLOYMENTS, PLAN_DEPLOYMENTS, PLAN_ENDPOINTS] {
            txn.open_table(table).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get_value<T: DeserializeOwned>(&self, table: Table, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let value = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Insert `value` under `key` and return the value it replaced.
    fn put_value<T: Serialize + DeserializeOwned>(
        &self,
        table: Table,
        key: &str,
        value: &T,
    ) -> StateResult<Option<T>> {
        let bytes = serde_json::to_vec(value).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let previous = {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            let old = table
                .insert(key, bytes.as_slice())
                .map_err(map_err!(Write))?;
            match old {
                Some(guard) => Some(
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?,
                ),
                None => None,
            }
        };
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(previous)
    }

    fn remove_value(&self, table: Table, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    fn list_with_prefix<T: DeserializeOwned>(
        &self,
        table: Table,
        prefix: &str,
    ) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(prefix) {
                let record = serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(record);
            }
        }
        Ok(results)
    }

    // ── CSAR lifecycle ─────────────────────────────────────────────

    /// Upsert the lifecycle state of a CSAR. Returns the previous state.
    pub fn put_csar_state(
        &self,
        csar_id: &CsarId,
        state: CsarProcessState,
    ) -> StateResult<Option<CsarProcessState>> {
        self.put_value(CSAR_STATES, csar_id.as_str(), &state)
    }

    pub fn get_csar_state(&self, csar_id: &CsarId) -> StateResult<Option<CsarProcessState>> {
        self.get_value(CSAR_STATES, csar_id.as_str())
    }

    /// Delete the lifecycle state of a CSAR. Returns true if it existed.
    pub fn delete_csar_state(&self, csar_id: &CsarId) -> StateResult<bool> {
        self.remove_value(CSAR_STATES, csar_id.as_str())
    }

    // ── Artifact deployment infos ──────────────────────────────────

    /// Read, transform, and write one artifact record in a single write
    /// transaction.
    ///
    /// `transition` receives the stored record (if any) and returns the
    /// record to persist.
    pub fn update_artifact<F>(
        &self,
        kind: ArtifactKind,
        csar_id: &CsarId,
        rel_path: &str,
        transition: F,
    ) -> StateResult<ArtifactDeploymentInfo>
    where
        F: FnOnce(Option<ArtifactDeploymentInfo>) -> ArtifactDeploymentInfo,
    {
        let key = artifact_key(csar_id, rel_path);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let updated = {
            let mut table = txn
                .open_table(deployments_table(kind))
                .map_err(map_err!(Table))?;
            let existing: Option<ArtifactDeploymentInfo> =
                match table.get(key.as_str()).map_err(map_err!(Read))? {
                    Some(guard) => Some(
                        serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?,
                    ),
                    None => None,
                };
            let updated = transition(existing);
            let bytes = serde_json::to_vec(&updated).map_err(map_err!(Serialize))?;
            table
                .insert(key.as_str(), bytes.as_slice())
                .map_err(map_err!(Write))?;
            updated
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, %kind, state = %updated.state, attempt = updated.attempt, "artifact info stored");
        Ok(updated)
    }

    pub fn get_artifact(
        &self,
        kind: ArtifactKind,
        csar_id: &CsarId,
        rel_path: &str,
    ) -> StateResult<Option<ArtifactDeploymentInfo>> {
        self.get_value(deployments_table(kind), &artifact_key(csar_id, rel_path))
    }

    /// List all artifact infos of one kind for a CSAR.
    pub fn list_artifacts(
        &self,
        kind: ArtifactKind,
        csar_id: &CsarId,
    ) -> StateResult<Vec<ArtifactDeploymentInfo>> {
        self.list_with_prefix(deployments_table(kind), &csar_prefix(csar_id))
    }

    // ── Plan endpoints ─────────────────────────────────────────────

    /// Insert or replace the endpoint of a plan.
    pub fn put_endpoint(&self, endpoint: &ResolvedEndpoint) -> StateResult<()> {
        let key = endpoint.table_key();
        self.put_value(PLAN_ENDPOINTS, &key, endpoint)?;
        debug!(%key, address = %endpoint.address, "plan endpoint stored");
        Ok(())
    }

    pub fn get_endpoint(
        &self,
        csar_id: &CsarId,
        plan_id: &QName,
    ) -> StateResult<Option<ResolvedEndpoint>> {
        self.get_value(PLAN_ENDPOINTS, &endpoint_key(csar_id, plan_id))
    }

    /// Delete the endpoint of a plan. Returns true if it existed.
    pub fn remove_endpoint(&self, csar_id: &CsarId, plan_id: &QName) -> StateResult<bool> {
        let key = endpoint_key(csar_id, plan_id);
        let existed = self.remove_value(PLAN_ENDPOINTS, &key)?;
        debug!(%key, existed, "plan endpoint deleted");
        Ok(existed)
    }

    pub fn list_endpoints(&self, csar_id: &CsarId) -> StateResult<Vec<ResolvedEndpoint>> {
        self.list_with_prefix(PLAN_ENDPOINTS, &csar_prefix(csar_id))
    }

    /// First stored endpoint of the CSAR implementing `port_type`.
    pub fn find_endpoint_by_port_type(
        &self,
        csar_id: &CsarId,
        port_type: &QName,
    ) -> StateResult<Option<ResolvedEndpoint>> {
        Ok(self
            .list_endpoints(csar_id)?
            .into_iter()
            .find(|endpoint| &endpoint.port_type == port_type))
    }

    // ── CSAR removal ───────────────────────────────────────────────

    /// Remove every record owned by a CSAR in one write transaction.
    pub fn delete_csar(&self, csar_id: &CsarId) -> StateResult<CsarPurge> {
        let prefix = csar_prefix(csar_id);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut purge = CsarPurge::default();
        {
            let mut states = txn.open_table(CSAR_STATES).map_err(map_err!(Table))?;
            purge.csar_state = states
                .remove(csar_id.as_str())
                .map_err(map_err!(Write))?
                .is_some();
        }
        for (table, counter) in [
            (IA_DEPLOYMENTS, &mut purge.implementation_artifacts),
            (PLAN_DEPLOYMENTS, &mut purge.plans),
            (PLAN_ENDPOINTS, &mut purge.endpoints),
        ] {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            let keys = keys_with_prefix(
                table
                    .iter()
                    .map_err(map_err!(Read))?
                    .map(|entry| entry.map(|(key, _)| key.value().to_string())),
                &prefix,
            )?;
            for key in &keys {
                table.remove(key.as_str()).map_err(map_err!(Write))?;
            }
            *counter = keys.len() as u32;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(csar = %csar_id, ?purge, "CSAR records deleted");
        Ok(purge)
    }
}

/// Lets plans be rewired against endpoints of other plans in the same CSAR.
impl EndpointResolver for StateStore {
    fn resolve(&self, csar_id: &CsarId, service: &ServiceRef) -> Option<String> {
        let ServiceRef::PortType(port_type) = service else {
            return None;
        };
        match self.find_endpoint_by_port_type(csar_id, port_type) {
            Ok(found) => found.map(|endpoint| endpoint.address),
            Err(e) => {
                warn!(csar = %csar_id, %port_type, error = %e, "endpoint lookup failed");
                None
            }
        }
    }
}
