//! Dhkeeper Daemon - DH parameter cache maintenance
//!
//! This crate provides:
//! - Periodic freshness passes over configured server instances
//! - Supervision of the isolated parameter-generation worker process
//! - Atomic publication of regenerated parameter files
//! - A reference-counted guard around the process-wide crypto environment

pub mod config;
pub mod crypto;
pub mod error;
pub mod scheduler;
pub mod supervisor;
pub mod worker;

pub use config::DaemonConfig;
pub use crypto::{CryptoContext, CryptoGuard, SoftwareBackend};
pub use error::{DaemonError, Result};
pub use scheduler::Scheduler;
pub use supervisor::{GenerationSession, Supervisor, WorkerCommand, WorkerExit};
