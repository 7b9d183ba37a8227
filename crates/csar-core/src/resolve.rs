//! Endpoint resolution contract used when rewiring plan bindings.

use std::collections::HashMap;
use std::fmt;

use crate::ids::{CsarId, QName};

/// Abstract reference to a service a plan talks to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServiceRef {
    /// A WSDL port, identified by the port type it implements.
    PortType(QName),
    /// A REST-light target, identified by the `host[:port]` of its uri.
    Authority(String),
}

impl fmt::Display for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceRef::PortType(name) => write!(f, "port-type {name}"),
            ServiceRef::Authority(authority) => write!(f, "authority {authority}"),
        }
    }
}

/// Maps a service reference to its currently valid address.
pub trait EndpointResolver: Send + Sync {
    /// Returns `None` when no current address is known.
    fn resolve(&self, csar_id: &CsarId, service: &ServiceRef) -> Option<String>;
}

/// Resolver backed by a fixed table, shared by every CSAR.
///
/// Keys are the rendered port type (`{ns}Local`) or a `host[:port]`
/// authority, matching the `[endpoints]` section of `csar.toml`.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    entries: HashMap<String, String>,
}

impl StaticResolver {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }

    pub fn with(mut self, key: impl Into<String>, address: impl Into<String>) -> Self {
        self.entries.insert(key.into(), address.into());
        self
    }
}

impl EndpointResolver for StaticResolver {
    fn resolve(&self, _csar_id: &CsarId, service: &ServiceRef) -> Option<String> {
        let key = match service {
            ServiceRef::PortType(name) => name.to_string(),
            ServiceRef::Authority(authority) => authority.clone(),
        };
        self.entries.get(&key).cloned()
    }
}

/// Tries each resolver in order and returns the first hit.
#[derive(Default)]
pub struct ChainResolver {
    resolvers: Vec<Box<dyn EndpointResolver>>,
}

impl ChainResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, resolver: impl EndpointResolver + 'static) -> Self {
        self.resolvers.push(Box::new(resolver));
        self
    }
}

impl EndpointResolver for ChainResolver {
    fn resolve(&self, csar_id: &CsarId, service: &ServiceRef) -> Option<String> {
        self.resolvers
            .iter()
            .find_map(|resolver| resolver.resolve(csar_id, service))
    }
}
