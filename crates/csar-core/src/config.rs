//! csar.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const REDACTED: &str = "<redacted>";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub plans: PlansConfig,
    /// Static endpoint table: port type (`{ns}Local`) or `host[:port]` → address.
    #[serde(default)]
    pub endpoints: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("csar-deployments.redb"),
        }
    }
}

/// Address and credentials of the remote process engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub address: String,
    pub login: String,
    pub password: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            address: "http://localhost:9763/engine".to_string(),
            login: "admin".to_string(),
            password: "admin".to_string(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlansConfig {
    /// Directory holding one unpacked directory per CSAR id.
    pub csar_root: PathBuf,
    /// Undeploy a process again when no callable endpoint could be selected.
    #[serde(default = "default_compensate")]
    pub compensate_unreachable: bool,
}

fn default_compensate() -> bool {
    true
}

impl Default for PlansConfig {
    fn default() -> Self {
        Self {
            csar_root: PathBuf::from("csars"),
            compensate_unreachable: default_compensate(),
        }
    }
}

impl ContainerConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ContainerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
    /// Copy safe to print: the engine password is masked.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if !config.engine.password.is_empty() {
            config.engine.password = REDACTED.to_string();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let config: ContainerConfig = toml::from_str("").unwrap();
        assert_eq!(config.engine.timeout_secs, 30);
        assert!(config.plans.compensate_unreachable);
        assert!(config.endpoints.is_empty());
    }

    #[test]
    fn test_parse_full() {
        let toml_str = r#"
[database]
path = "/var/lib/csar/deployments.redb"

[engine]
address = "https://bps.internal:9443/engine"
login = "deployer"
password = "secret"

[plans]
csar_root = "/var/lib/csar/csars"
compensate_unreachable = false

[endpoints]
"{http://example.org/ia}DbPort" = "http://10.0.0.5:8080/db"
"#;
        let config: ContainerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.engine.login, "deployer");
        assert_eq!(config.engine.timeout_secs, 30);
        assert!(!config.plans.compensate_unreachable);
        assert_eq!(
            config.endpoints.get("{http://example.org/ia}DbPort").map(String::as_str),
            Some("http://10.0.0.5:8080/db")
        );
    }

    #[test]
    fn test_redacted_hides_password() {
        let mut config = ContainerConfig::default();
        config.engine.password = "s3cret-pw".to_string();

        let printed = config.redacted().to_toml_string().unwrap();
        assert!(!printed.contains("s3cret-pw"));
        assert!(printed.contains("<redacted>"));
        assert_eq!(config.redacted().engine.login, "admin");
        assert_eq!(config.engine.password, "s3cret-pw");
    }

    #[test]
    fn test_roundtrip_defaults() {
        let toml_str = ContainerConfig::default().to_toml_string().unwrap();
        assert!(toml_str.contains("[engine]"));
    }
}
