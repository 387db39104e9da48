//! Generation worker supervision
//!
//! At most one generation runs at a time, process-wide. The supervisor
//! creates the temporary output file, hands the open descriptor to an
//! isolated worker process as its stdout, and clears the session when a
//! reaper task observes the worker's exit. It never blocks on the worker.

use std::fs::{self, OpenOptions, Permissions};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use dhkeeper_core::{DhGroup, ServerInstance, PARAMS_FILE_MODE, TEMP_SUFFIX};

use crate::error::{DaemonError, Result};

/// Completion notice posted by the reaper task when a worker exits
#[derive(Debug)]
pub struct WorkerExit {
    pub pid: u32,
    /// `None` when waiting on the child itself failed
    pub status: Option<ExitStatus>,
}

/// The single in-flight generation
#[derive(Debug, Clone)]
pub struct GenerationSession {
    pub target_path: PathBuf,
    pub temp_path: PathBuf,
    pub pid: u32,
}

/// Builds the command line of the isolated generation worker
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Re-exec the current executable with the hidden `generate` subcommand
    pub fn from_current_exe(group: DhGroup) -> Result<Self> {
        Ok(Self::new(
            std::env::current_exe()?,
            vec![
                "generate".to_string(),
                "--group".to_string(),
                group.name().to_string(),
            ],
        ))
    }

    fn build(&self, temp: &Path, target: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--temp")
            .arg(temp)
            .arg("--target")
            .arg(target);
        cmd
    }
}

/// Supervises the single outstanding generation worker
pub struct Supervisor {
    worker: WorkerCommand,
    exit_tx: mpsc::UnboundedSender<WorkerExit>,
    session: Option<GenerationSession>,
}

impl Supervisor {
    pub fn new(worker: WorkerCommand, exit_tx: mpsc::UnboundedSender<WorkerExit>) -> Self {
        Self {
            worker,
            exit_tx,
            session: None,
        }
    }

    /// Whether a generation is currently in flight
    pub fn in_progress(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&GenerationSession> {
        self.session.as_ref()
    }

    /// Launch a worker regenerating the instance's cache file.
    ///
    /// A no-op while any generation is in flight, regardless of path.
    /// Temp-file creation failure is unrecoverable and propagates; a spawn
    /// failure is logged and retried on a later pass.
    pub fn request_generation(&mut self, instance: &ServerInstance) -> Result<()> {
        if let Some(session) = &self.session {
            debug!(
                "generation of {} already in progress, ignoring request for {}",
                session.target_path.display(),
                instance.name
            );
            return Ok(());
        }

        let target = instance.params_path.clone();
        let temp = temp_path(&target);

        // Leftover from a crashed prior attempt
        let _ = fs::remove_file(&temp);

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(PARAMS_FILE_MODE)
            .open(&temp)
            .map_err(|source| DaemonError::TempFileCreate {
                path: temp.clone(),
                source,
            })?;
        // Exact final mode, independent of the process umask
        file.set_permissions(Permissions::from_mode(PARAMS_FILE_MODE))?;

        let mut cmd = self.worker.build(&temp, &target);
        cmd.stdout(Stdio::from(file));

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                error!("spawning generation worker failed: {}", err);
                let _ = fs::remove_file(&temp);
                return Ok(());
            }
        };

        let pid = child.id().unwrap_or(0);
        info!(
            "generating DH parameters into {} (worker pid {})",
            target.display(),
            pid
        );
        self.session = Some(GenerationSession {
            target_path: target,
            temp_path: temp,
            pid,
        });

        let exit_tx = self.exit_tx.clone();
        tokio::spawn(async move {
            let status = child.wait().await;
            let _ = exit_tx.send(WorkerExit {
                pid,
                status: status.ok(),
            });
        });

        Ok(())
    }

    /// Clear the session for an observed worker exit.
    ///
    /// Exit status does not affect session bookkeeping: a crashed worker
    /// never renamed, so the target simply stays stale for the next pass.
    pub fn session_finished(&mut self, exit: WorkerExit) {
        let Some(session) = self.session.take() else {
            warn!("worker exit for pid {} with no generation in progress", exit.pid);
            return;
        };

        if session.pid != exit.pid {
            warn!(
                "worker exit pid {} does not match tracked pid {}",
                exit.pid, session.pid
            );
        }

        match exit.status {
            Some(status) if status.success() => {
                info!(
                    "DH parameter generation for {} finished",
                    session.target_path.display()
                );
            }
            Some(status) => {
                warn!(
                    "DH parameter worker for {} exited with {}",
                    session.target_path.display(),
                    status
                );
            }
            None => {
                warn!("wait() failed for DH parameter worker pid {}", exit.pid);
            }
        }
    }
}

/// `<target>.tmp` next to the target file
pub fn temp_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}
