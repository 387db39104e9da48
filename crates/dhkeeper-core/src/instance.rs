//! Configured server instances
//!
//! One `ServerInstance` per TLS-capable listener group. Instances are built
//! from configuration at startup and read-only afterward; several instances
//! may point at the same cache file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::freshness::MasterIdentity;

/// One configured service whose DH parameter cache file we maintain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInstance {
    /// Instance name, used in logs only
    pub name: String,

    /// Skip parameter maintenance for this instance entirely
    #[serde(default)]
    pub disable_params: bool,

    /// Path of the parameters cache file
    pub params_path: PathBuf,

    /// Hours between time-based regenerations. 0 disables time-based
    /// refresh: the file is regenerated only when missing or invalid.
    #[serde(default = "default_regenerate_interval")]
    pub regenerate_interval_hours: u64,

    /// Owner uid a trusted cache file must have. Defaults to the
    /// daemon's effective uid.
    #[serde(default)]
    pub expected_uid: Option<u32>,

    /// Owner gid a trusted cache file must have. Defaults to the
    /// daemon's effective gid.
    #[serde(default)]
    pub expected_gid: Option<u32>,
}

fn default_regenerate_interval() -> u64 {
    crate::DEFAULT_REGENERATE_INTERVAL_HOURS
}

impl ServerInstance {
    /// Create an instance with default policy for the given cache path
    pub fn new(name: impl Into<String>, params_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            disable_params: false,
            params_path: params_path.into(),
            regenerate_interval_hours: crate::DEFAULT_REGENERATE_INTERVAL_HOURS,
            expected_uid: None,
            expected_gid: None,
        }
    }

    /// The (uid, gid) a trusted cache file must be owned by
    pub fn expected_owner(&self, identity: &MasterIdentity) -> (u32, u32) {
        (
            self.expected_uid.unwrap_or(identity.uid),
            self.expected_gid.unwrap_or(identity.gid),
        )
    }
}
