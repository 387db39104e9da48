//! Process-wide crypto environment guard
//!
//! Reference-counted acquire/release around the underlying crypto
//! environment: one-time initialization on the first acquire, full teardown
//! when the last guard is released, and at most one acceleration engine
//! attached as the default provider. The environment lives in an explicit
//! context object owned by whoever performs startup and shutdown, not in a
//! hidden static.

use std::io;
use std::sync::{Arc, Mutex};

use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, warn};

use crate::error::{DaemonError, Result};

/// Hooks into the underlying crypto environment
pub trait CryptoBackend: Send {
    /// One-time setup: error-string tables, algorithm registration
    fn initialize(&mut self);

    /// Best-effort entropy pool priming; failure must not abort startup
    fn prime_entropy(&mut self) -> io::Result<()>;

    /// Full teardown after the engine, if any, has been detached
    fn teardown(&mut self);

    /// Resolve a named acceleration engine, if the backend knows it
    fn find_engine(&mut self, id: &str) -> Option<Box<dyn CryptoEngine>>;
}

/// A named acceleration backend
pub trait CryptoEngine: Send {
    fn id(&self) -> &str;

    fn init(&mut self) -> std::result::Result<(), String>;

    /// Activate as the default provider for all algorithm classes
    fn set_default(&mut self) -> std::result::Result<(), String>;

    fn finish(&mut self);
}

struct ContextInner {
    backend: Box<dyn CryptoBackend>,
    refcount: usize,
    engine: Option<Box<dyn CryptoEngine>>,
}

/// Process-wide crypto environment with scoped acquisition
#[derive(Clone)]
pub struct CryptoContext {
    inner: Arc<Mutex<ContextInner>>,
}

impl CryptoContext {
    pub fn new(backend: Box<dyn CryptoBackend>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ContextInner {
                backend,
                refcount: 0,
                engine: None,
            })),
        }
    }

    /// Take a reference on the environment, initializing it on 0 -> 1
    pub fn acquire(&self) -> CryptoGuard {
        let mut inner = self.lock();
        inner.refcount += 1;
        if inner.refcount == 1 {
            inner.backend.initialize();
            if let Err(err) = inner.backend.prime_entropy() {
                debug!("entropy pool priming failed: {}", err);
            }
        }
        CryptoGuard {
            inner: Arc::clone(&self.inner),
            released: false,
        }
    }

    /// Whether any holder still references the environment
    pub fn is_active(&self) -> bool {
        self.lock().refcount > 0
    }

    /// Attach a named acceleration engine as the default provider.
    ///
    /// Idempotent success when an engine is already attached. On any
    /// failure the partially-initialized handle is dropped, never kept.
    pub fn select_engine(&self, id: &str) -> Result<()> {
        let mut inner = self.lock();
        if inner.engine.is_some() {
            return Ok(());
        }

        let mut engine = inner
            .backend
            .find_engine(id)
            .ok_or_else(|| DaemonError::UnknownEngine(id.to_string()))?;
        engine
            .init()
            .map_err(|err| DaemonError::EngineInit(id.to_string(), err))?;
        engine
            .set_default()
            .map_err(|err| DaemonError::EngineActivate(id.to_string(), err))?;

        inner.engine = Some(engine);
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ContextInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Scoped reference on the crypto environment
pub struct CryptoGuard {
    inner: Arc<Mutex<ContextInner>>,
    released: bool,
}

impl CryptoGuard {
    /// Drop this reference. Returns whether the environment is still
    /// active, so the caller can tell "I was the last holder" apart from
    /// "others remain".
    pub fn release(mut self) -> bool {
        self.release_inner()
    }

    fn release_inner(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;

        let mut inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        debug_assert!(inner.refcount > 0);
        inner.refcount = inner.refcount.saturating_sub(1);
        if inner.refcount > 0 {
            return true;
        }

        if let Some(mut engine) = inner.engine.take() {
            engine.finish();
        }
        inner.backend.teardown();
        false
    }
}

impl Drop for CryptoGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// Software-only backend: primes the OS entropy source, knows no engines
pub struct SoftwareBackend;

impl SoftwareBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoBackend for SoftwareBackend {
    fn initialize(&mut self) {
        debug!("crypto environment initialized");
    }

    fn prime_entropy(&mut self) -> io::Result<()> {
        // One read so the entropy source is open before any privilege
        // drop; not having entropy yet is tolerated.
        let mut buf = [0u8; 1];
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))
    }

    fn teardown(&mut self) {
        debug!("crypto environment torn down");
    }

    fn find_engine(&mut self, id: &str) -> Option<Box<dyn CryptoEngine>> {
        warn!("no acceleration engines built in, '{}' unavailable", id);
        None
    }
}
