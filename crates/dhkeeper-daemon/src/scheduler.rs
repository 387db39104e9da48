//! Periodic freshness passes
//!
//! A timer-driven loop walks the configured instances in order and asks the
//! supervisor for at most one regeneration per pass. Worker completions
//! arrive on the same loop through the exit channel, so all session state
//! is touched from a single task.

use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use dhkeeper_core::{freshness, MasterIdentity, ServerInstance};

use crate::error::Result;
use crate::supervisor::{Supervisor, WorkerExit};

/// Walks instances on a fixed interval and triggers regeneration
pub struct Scheduler {
    instances: Vec<ServerInstance>,
    identity: MasterIdentity,
    check_interval: Duration,
    supervisor: Supervisor,
    exit_rx: mpsc::UnboundedReceiver<WorkerExit>,
}

impl Scheduler {
    pub fn new(
        instances: Vec<ServerInstance>,
        identity: MasterIdentity,
        check_interval: Duration,
        supervisor: Supervisor,
        exit_rx: mpsc::UnboundedReceiver<WorkerExit>,
    ) -> Self {
        Self {
            instances,
            identity,
            check_interval,
            supervisor,
            exit_rx,
        }
    }

    /// One freshness pass: skipped entirely while a generation is in
    /// flight, otherwise the first non-fresh instance wins the tick.
    pub fn run_pass(&mut self) -> Result<()> {
        if self.supervisor.in_progress() {
            debug!("generation in progress, skipping freshness pass");
            return Ok(());
        }

        let now = SystemTime::now();
        let identity = self.identity;
        let stale = self.instances.iter().find_map(|instance| {
            let verdict = freshness::inspect(instance, &identity, now);
            verdict
                .requires_generation()
                .then(|| (instance.clone(), verdict))
        });

        let Some((instance, verdict)) = stale else {
            return Ok(());
        };

        if verdict.never_generated() {
            info!(
                "Generating Diffie-Hellman parameters for the first time. \
                 This may take a while.."
            );
        } else {
            info!(
                "parameters file {} for {} is {:?}, regenerating",
                instance.params_path.display(),
                instance.name,
                verdict
            );
        }

        self.supervisor.request_generation(&instance)
    }

    /// Drive passes until a fatal error. The first tick fires immediately.
    pub async fn run(mut self) -> Result<()> {
        let mut ticker = interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.run_pass()?,
                Some(exit) = self.exit_rx.recv() => {
                    self.supervisor.session_finished(exit);
                }
            }
        }
    }
}
