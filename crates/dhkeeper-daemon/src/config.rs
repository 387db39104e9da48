//! Daemon configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use dhkeeper_core::{DhGroup, ServerInstance};

use crate::error::{DaemonError, Result};

/// Default seconds between freshness passes (check every 10 mins)
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 600;

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Seconds between scheduler passes
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Name of the DH group written into cache files
    #[serde(default = "default_dh_group")]
    pub dh_group: String,

    /// Optional crypto acceleration engine to attach at startup
    #[serde(default)]
    pub crypto_engine: Option<String>,

    /// Server instances whose cache files we maintain, in priority order
    pub instances: Vec<ServerInstance>,
}

fn default_check_interval() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

fn default_dh_group() -> String {
    DhGroup::Ffdhe2048.name().to_string()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            dh_group: default_dh_group(),
            crypto_engine: None,
            instances: vec![ServerInstance::new(
                "default",
                Self::default_params_path(),
            )],
        }
    }
}

impl DaemonConfig {
    fn default_params_path() -> PathBuf {
        dirs::state_dir()
            .unwrap_or_else(|| PathBuf::from("/var/lib"))
            .join("dhkeeper")
            .join(dhkeeper_core::DEFAULT_PARAMS_FILENAME)
    }

    /// Load configuration from file
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject configurations the daemon cannot act on
    pub fn validate(&self) -> Result<()> {
        if self.check_interval_secs == 0 {
            return Err(DaemonError::Config(
                "check_interval_secs must be greater than 0".to_string(),
            ));
        }
        DhGroup::from_name(&self.dh_group)
            .map_err(|err| DaemonError::Config(err.to_string()))?;
        Ok(())
    }

    /// The configured DH group, validated at load time
    pub fn group(&self) -> Result<DhGroup> {
        Ok(DhGroup::from_name(&self.dh_group)?)
    }

    /// Create parent directories of every instance's cache file
    pub fn ensure_directories(&self) -> Result<()> {
        for instance in &self.instances {
            if let Some(parent) = instance.params_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

/// Helper module for dirs crate functionality
mod dirs {
    use std::path::PathBuf;

    pub fn state_dir() -> Option<PathBuf> {
        std::env::var_os("XDG_STATE_HOME")
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/state"))
            })
    }
}
