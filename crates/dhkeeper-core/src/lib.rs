//! Dhkeeper Core - Shared types and policy for the DH parameter cache
//!
//! This crate provides the foundational pieces of the dhkeeper parameter
//! cache manager: the per-service instance description, the cache-file
//! freshness inspector, and the PEM encoding of the parameters themselves.

pub mod error;
pub mod freshness;
pub mod instance;
pub mod params;

pub use error::{CoreError, Result};
pub use freshness::{classify, inspect, CacheFileState, FreshnessVerdict, MasterIdentity};
pub use instance::ServerInstance;
pub use params::DhGroup;

/// File mode of a published parameters file
pub const PARAMS_FILE_MODE: u32 = 0o644;

/// Suffix of the in-progress temporary file next to the target
pub const TEMP_SUFFIX: &str = ".tmp";

/// Default file name for a parameters cache file
pub const DEFAULT_PARAMS_FILENAME: &str = "dh-params.pem";

/// Default regeneration interval in hours (one week)
pub const DEFAULT_REGENERATE_INTERVAL_HOURS: u64 = 168;
