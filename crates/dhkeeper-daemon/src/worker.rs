//! Generation worker entry point
//!
//! Runs inside the isolated child process spawned by the supervisor. The
//! supervisor hands over the open temporary file as our stdout; we encode
//! the parameters into it, flush with error checking, and atomically
//! rename the temporary file over the target. A reader of the target path
//! therefore only ever sees a complete parameters file.

use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::info;

use dhkeeper_core::{params, DhGroup};

use crate::error::{DaemonError, Result};

/// Encode into the already-open descriptor, then publish temp over target
pub fn write_and_publish<W: Write>(
    group: DhGroup,
    out: &mut W,
    temp: &Path,
    target: &Path,
) -> Result<()> {
    params::write_pem(group, out)?;
    out.flush().map_err(|source| DaemonError::Flush {
        path: temp.to_path_buf(),
        source,
    })?;

    fs::rename(temp, target).map_err(|source| DaemonError::Rename {
        from: temp.to_path_buf(),
        to: target.to_path_buf(),
        source,
    })?;

    info!("{} parameters published to {}", group, target.display());
    Ok(())
}

/// `generate` subcommand body: stdout is the temporary file
pub fn run_generation(group: DhGroup, temp: &Path, target: &Path) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write_and_publish(group, &mut out, temp, target)
}
