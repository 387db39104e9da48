//! End-to-end generation through the real worker binary
//!
//! Exercises the supervisor against the actual `dhkeeperd generate`
//! subcommand: descriptor hand-off, atomic publication, and the
//! crash-before-rename path.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc::unbounded_channel;
use tokio::time::timeout;

use dhkeeper_core::ServerInstance;
use dhkeeper_daemon::supervisor::{temp_path, Supervisor, WorkerCommand};

fn real_worker(group: &str) -> WorkerCommand {
    WorkerCommand::new(
        env!("CARGO_BIN_EXE_dhkeeperd"),
        vec![
            "generate".to_string(),
            "--group".to_string(),
            group.to_string(),
        ],
    )
}

#[tokio::test]
async fn generation_publishes_a_complete_file_atomically() {
    let dir = TempDir::new().unwrap();
    let instance = ServerInstance::new("imap", dir.path().join("dh-params.pem"));

    let (tx, mut rx) = unbounded_channel();
    let mut supervisor = Supervisor::new(real_worker("ffdhe2048"), tx);
    supervisor.request_generation(&instance).unwrap();
    assert!(supervisor.in_progress());

    let exit = timeout(Duration::from_secs(30), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(exit.status.unwrap().success());
    supervisor.session_finished(exit);
    assert!(!supervisor.in_progress());

    let pem = fs::read_to_string(&instance.params_path).unwrap();
    assert!(pem.starts_with("-----BEGIN DH PARAMETERS-----"));
    assert!(pem.trim_end().ends_with("-----END DH PARAMETERS-----"));
    assert!(!temp_path(&instance.params_path).exists());

    // Published with the exact mode, independent of the test umask
    let mode = fs::metadata(&instance.params_path)
        .unwrap()
        .permissions()
        .mode()
        & 0o777;
    assert_eq!(mode, 0o644);
}

#[tokio::test]
async fn failed_worker_leaves_previous_parameters_in_place() {
    let dir = TempDir::new().unwrap();
    let instance = ServerInstance::new("imap", dir.path().join("dh-params.pem"));
    fs::write(&instance.params_path, b"previous parameters").unwrap();

    let (tx, mut rx) = unbounded_channel();
    let mut supervisor = Supervisor::new(real_worker("not-a-group"), tx);
    supervisor.request_generation(&instance).unwrap();

    let exit = timeout(Duration::from_secs(30), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(!exit.status.unwrap().success());
    supervisor.session_finished(exit);
    assert!(!supervisor.in_progress());

    // Target untouched, leftover temp still present until the next
    // attempt replaces it.
    assert_eq!(
        fs::read(&instance.params_path).unwrap(),
        b"previous parameters"
    );
    assert!(temp_path(&instance.params_path).exists());

    supervisor.request_generation(&instance).unwrap();
    assert!(supervisor.in_progress());
    let exit = timeout(Duration::from_secs(30), rx.recv())
        .await
        .unwrap()
        .unwrap();
    supervisor.session_finished(exit);
}
