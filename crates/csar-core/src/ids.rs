//! Identifiers for CSARs, plans, and WSDL port types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("CSAR id must not be empty")]
    EmptyCsarId,
    #[error("CSAR id must not contain '/': {0}")]
    SeparatorInCsarId(String),
    #[error("invalid qualified name: {0}")]
    InvalidQName(String),
    #[error("unknown state: {0}")]
    UnknownState(String),
}

/// Identity of a stored CSAR, usually its file name (`app.csar`).
///
/// The record store builds composite keys as `{csar_id}/{rest}`, so a CSAR
/// id never contains `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CsarId(String);

impl CsarId {
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(IdError::EmptyCsarId);
        }
        if id.contains('/') {
            return Err(IdError::SeparatorInCsarId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CsarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CsarId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CsarId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CsarId> for String {
    fn from(id: CsarId) -> Self {
        id.0
    }
}

/// XML qualified name, rendered as `{namespace}local`.
///
/// Used for plan ids and for the port type of a process' inbound interface.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QName {
    pub namespace: String,
    pub local: String,
}

impl QName {
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local: local.into(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.local)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local)
        }
    }
}

impl FromStr for QName {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, local) = match s.strip_prefix('{') {
            Some(rest) => rest
                .split_once('}')
                .ok_or_else(|| IdError::InvalidQName(s.to_string()))?,
            None => ("", s),
        };
        if local.is_empty() || local.contains(['{', '}']) {
            return Err(IdError::InvalidQName(s.to_string()));
        }
        Ok(Self::new(namespace, local))
    }
}

impl TryFrom<String> for QName {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<QName> for String {
    fn from(name: QName) -> Self {
        name.to_string()
    }
}
