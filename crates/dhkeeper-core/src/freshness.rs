//! Cache-file freshness inspection
//!
//! Classifies a parameter cache file as fresh, stale, missing, corrupt, or
//! owned by the wrong identity. The filesystem probe and the policy decision
//! are separate so the policy can be tested without manufacturing mtimes.

use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{error, warn};

use crate::instance::ServerInstance;

/// Effective identity of the process that owns trusted cache files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterIdentity {
    pub uid: u32,
    pub gid: u32,
}

/// Filesystem facts about a cache file, recomputed on every inspection
#[derive(Debug, Clone)]
pub struct CacheFileState {
    pub exists: bool,
    pub size_bytes: u64,
    pub mtime: SystemTime,
    pub owner_uid: u32,
    pub owner_gid: u32,
}

impl CacheFileState {
    /// State of a file that has never been generated
    pub fn missing() -> Self {
        Self {
            exists: false,
            size_bytes: 0,
            mtime: UNIX_EPOCH,
            owner_uid: 0,
            owner_gid: 0,
        }
    }
}

/// Outcome of inspecting one instance's cache file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessVerdict {
    /// Usable as-is, nothing to do this tick
    Fresh,
    /// Older than the instance's regeneration interval
    Stale,
    /// Never generated, or removed out from under us
    Missing,
    /// Present but zero-sized
    Corrupt,
    /// Owner uid/gid differ from the expected master identity
    PermissionMismatch,
}

impl FreshnessVerdict {
    /// Whether this verdict asks for a new generation run
    pub fn requires_generation(self) -> bool {
        self != FreshnessVerdict::Fresh
    }

    /// Whether the file has effectively never been generated
    pub fn never_generated(self) -> bool {
        matches!(self, FreshnessVerdict::Missing | FreshnessVerdict::Corrupt)
    }
}

/// Pure policy decision over an already-probed file state
pub fn classify(
    state: &CacheFileState,
    instance: &ServerInstance,
    identity: &MasterIdentity,
    now: SystemTime,
) -> FreshnessVerdict {
    if instance.disable_params {
        return FreshnessVerdict::Fresh;
    }
    if !state.exists {
        return FreshnessVerdict::Missing;
    }
    if state.size_bytes == 0 {
        return FreshnessVerdict::Corrupt;
    }

    let (uid, gid) = instance.expected_owner(identity);
    if state.owner_uid != uid || state.owner_gid != gid {
        return FreshnessVerdict::PermissionMismatch;
    }

    // With an interval of 0 there is no time-based refresh at all.
    if instance.regenerate_interval_hours > 0 {
        let interval =
            Duration::from_secs(instance.regenerate_interval_hours.saturating_mul(3600));
        match state.mtime.checked_add(interval) {
            Some(refresh_due) if refresh_due < now => return FreshnessVerdict::Stale,
            _ => {}
        }
    }

    FreshnessVerdict::Fresh
}

/// Read the current filesystem state of a cache file (lstat, no follow)
pub fn probe(path: &Path) -> io::Result<CacheFileState> {
    match fs::symlink_metadata(path) {
        Ok(meta) => Ok(CacheFileState {
            exists: true,
            size_bytes: meta.len(),
            mtime: meta.modified()?,
            owner_uid: meta.uid(),
            owner_gid: meta.gid(),
        }),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(CacheFileState::missing()),
        Err(err) => Err(err),
    }
}

/// Inspect one instance's cache file and decide whether it needs
/// regeneration.
///
/// A zero-sized file is deleted best-effort on the way through. Unexpected
/// stat errors are logged and reported as `Fresh` so a transient filesystem
/// problem cannot trigger a generation storm.
pub fn inspect(
    instance: &ServerInstance,
    identity: &MasterIdentity,
    now: SystemTime,
) -> FreshnessVerdict {
    if instance.disable_params {
        return FreshnessVerdict::Fresh;
    }

    let state = match probe(&instance.params_path) {
        Ok(state) => state,
        Err(err) => {
            error!(
                "lstat() failed for parameters file {}: {}",
                instance.params_path.display(),
                err
            );
            return FreshnessVerdict::Fresh;
        }
    };

    if state.exists && state.size_bytes == 0 {
        if let Err(err) = fs::remove_file(&instance.params_path) {
            warn!(
                "unlink({}) failed: {}",
                instance.params_path.display(),
                err
            );
        }
    }

    classify(&state, instance, identity, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn test_instance(path: &Path, interval_hours: u64) -> ServerInstance {
        let mut instance = ServerInstance::new("imap", path);
        instance.regenerate_interval_hours = interval_hours;
        instance
    }

    fn owned_state(age_secs: u64, size: u64, identity: &MasterIdentity) -> CacheFileState {
        CacheFileState {
            exists: true,
            size_bytes: size,
            mtime: SystemTime::now() - Duration::from_secs(age_secs),
            owner_uid: identity.uid,
            owner_gid: identity.gid,
        }
    }

    const IDENTITY: MasterIdentity = MasterIdentity { uid: 1000, gid: 1000 };

    #[test]
    fn disabled_instance_is_always_fresh() {
        let mut instance = test_instance(Path::new("/nonexistent/dh.pem"), 1);
        instance.disable_params = true;

        let verdict = inspect(&instance, &IDENTITY, SystemTime::now());
        assert_eq!(verdict, FreshnessVerdict::Fresh);
    }

    #[test]
    fn missing_file_requires_generation() {
        let dir = TempDir::new().unwrap();
        let instance = test_instance(&dir.path().join("dh.pem"), 1);

        let verdict = inspect(&instance, &IDENTITY, SystemTime::now());
        assert_eq!(verdict, FreshnessVerdict::Missing);
        assert!(verdict.requires_generation());
        assert!(verdict.never_generated());
    }

    #[test]
    fn zero_size_file_is_corrupt_and_deleted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dh.pem");
        fs::write(&path, b"").unwrap();
        let instance = test_instance(&path, 1);

        let verdict = inspect(&instance, &IDENTITY, SystemTime::now());
        assert_eq!(verdict, FreshnessVerdict::Corrupt);
        assert!(!path.exists());
    }

    #[test]
    fn owner_mismatch_overrides_age() {
        let instance = test_instance(Path::new("/tmp/dh.pem"), 1);
        let mut state = owned_state(60, 512, &IDENTITY);
        state.owner_uid = IDENTITY.uid + 1;

        let verdict = classify(&state, &instance, &IDENTITY, SystemTime::now());
        assert_eq!(verdict, FreshnessVerdict::PermissionMismatch);
    }

    #[test]
    fn stale_after_interval_elapses() {
        let instance = test_instance(Path::new("/tmp/dh.pem"), 1);
        let now = SystemTime::now();

        let old = owned_state(7200, 512, &IDENTITY);
        assert_eq!(classify(&old, &instance, &IDENTITY, now), FreshnessVerdict::Stale);

        let recent = owned_state(60, 512, &IDENTITY);
        assert_eq!(classify(&recent, &instance, &IDENTITY, now), FreshnessVerdict::Fresh);
    }

    #[test]
    fn interval_zero_never_goes_time_stale() {
        let instance = test_instance(Path::new("/tmp/dh.pem"), 0);
        let ancient = owned_state(10 * 365 * 24 * 3600, 512, &IDENTITY);

        let verdict = classify(&ancient, &instance, &IDENTITY, SystemTime::now());
        assert_eq!(verdict, FreshnessVerdict::Fresh);
    }

    #[test]
    fn interval_zero_still_regenerates_missing_and_corrupt() {
        let instance = test_instance(Path::new("/tmp/dh.pem"), 0);

        let missing = CacheFileState::missing();
        assert_eq!(
            classify(&missing, &instance, &IDENTITY, SystemTime::now()),
            FreshnessVerdict::Missing
        );

        let empty = owned_state(60, 0, &IDENTITY);
        assert_eq!(
            classify(&empty, &instance, &IDENTITY, SystemTime::now()),
            FreshnessVerdict::Corrupt
        );
    }

    #[test]
    fn freshly_written_file_inspects_fresh() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dh.pem");
        fs::write(&path, b"-----BEGIN DH PARAMETERS-----").unwrap();
        let meta = fs::metadata(&path).unwrap();
        let identity = MasterIdentity { uid: meta.uid(), gid: meta.gid() };
        let instance = test_instance(&path, 1);

        let verdict = inspect(&instance, &identity, SystemTime::now());
        assert_eq!(verdict, FreshnessVerdict::Fresh);
        assert!(path.exists());
    }

    proptest! {
        #[test]
        fn disabled_wins_over_everything(size in 0u64..1_000_000, age in 0u64..1_000_000_000, uid_off in 0u32..3) {
            let mut instance = test_instance(Path::new("/tmp/dh.pem"), 1);
            instance.disable_params = true;
            let mut state = owned_state(age, size, &IDENTITY);
            state.owner_uid = IDENTITY.uid + uid_off;
            prop_assert_eq!(classify(&state, &instance, &IDENTITY, SystemTime::now()), FreshnessVerdict::Fresh);
        }

        #[test]
        fn nonempty_owned_file_with_interval_zero_is_fresh(size in 1u64..1_000_000, age in 0u64..1_000_000_000) {
            let instance = test_instance(Path::new("/tmp/dh.pem"), 0);
            let state = owned_state(age, size, &IDENTITY);
            prop_assert_eq!(classify(&state, &instance, &IDENTITY, SystemTime::now()), FreshnessVerdict::Fresh);
        }
    }
}
