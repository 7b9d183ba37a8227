//! csar-engine: connector to the remote process engine.
//!
//! The engine accepts packaged plans, hands back a process id, and reports
//! the endpoints of a running process keyed by partner role. The
//! [`EngineConnector`] trait is the seam the orchestrator depends on;
//! [`HttpEngineConnector`] talks to an engine over plain HTTP/1.1.

pub mod error;
mod client;

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

pub use error::{EngineError, EngineResult};
pub use client::HttpEngineConnector;

/// Address and login of the engine, supplied with every call.
#[derive(Clone, PartialEq, Eq)]
pub struct EngineCredentials {
    pub address: String,
    pub login: String,
    pub password: String,
}

impl EngineCredentials {
    pub fn new(
        address: impl Into<String>,
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            login: login.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for EngineCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineCredentials")
            .field("address", &self.address)
            .field("login", &self.login)
            .field("password", &"***")
            .finish()
    }
}

/// A packaged plan as shipped to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnginePackage {
    /// File name of the archive, e.g. `BuildPlan.zip`.
    pub name: String,
    pub bytes: Bytes,
}

impl EnginePackage {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Capability set of a process engine.
///
/// Calls are not retried; a failure is reported to the caller as is.
#[async_trait]
pub trait EngineConnector: Send + Sync {
    /// Deploy `package` and return the id of the created process.
    async fn deploy(
        &self,
        package: &EnginePackage,
        credentials: &EngineCredentials,
    ) -> EngineResult<String>;

    /// Undeploy the process created from `package`.
    async fn undeploy(
        &self,
        package: &EnginePackage,
        credentials: &EngineCredentials,
    ) -> EngineResult<()>;

    /// Endpoints of a deployed process, keyed by partner role name.
    async fn endpoints_for_process(
        &self,
        process_id: &str,
        credentials: &EngineCredentials,
    ) -> EngineResult<HashMap<String, String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_password() {
        let credentials = EngineCredentials::new("http://engine:9763", "admin", "s3cret");
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("s3cret"));
    }
}
