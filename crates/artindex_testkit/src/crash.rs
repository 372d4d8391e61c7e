//! Crash and I/O failure simulation.
//!
//! [`CrashableBackend`] wraps a real backend and fails writes, flushes or
//! syncs on command. The store under test owns the backend, so the failure
//! switches live in a cloneable [`CrashSwitch`] the test keeps.
//!
//! ## Usage
//!
//! ```rust
//! use artindex_storage::{InMemoryBackend, StorageBackend};
//! use artindex_testkit::CrashableBackend;
//!
//! let mut backend = CrashableBackend::new(Box::new(InMemoryBackend::new()));
//! let switch = backend.switch();
//!
//! switch.crash_after(4);
//! assert!(backend.append(b"torn record").is_err());
//! assert_eq!(backend.size().unwrap(), 4);
//! ```

use artindex_storage::{StorageBackend, StorageError, StorageResult};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct CrashState {
    write_budget: AtomicUsize,
    bytes_written: AtomicUsize,
    flush_failures: AtomicUsize,
    crashed: AtomicBool,
}

impl Default for CrashState {
    fn default() -> Self {
        Self {
            write_budget: AtomicUsize::new(usize::MAX),
            bytes_written: AtomicUsize::new(0),
            flush_failures: AtomicUsize::new(0),
            crashed: AtomicBool::new(false),
        }
    }
}

/// Remote control for a [`CrashableBackend`].
#[derive(Debug, Clone, Default)]
pub struct CrashSwitch {
    state: Arc<CrashState>,
}

impl CrashSwitch {
    /// Lets `bytes` more bytes through, then fails every append. The append
    /// that crosses the limit writes its leading part, leaving a torn tail.
    pub fn crash_after(&self, bytes: usize) {
        let written = self.state.bytes_written.load(Ordering::SeqCst);
        self.state
            .write_budget
            .store(written.saturating_add(bytes), Ordering::SeqCst);
    }

    /// Fails the next `count` flush or sync calls.
    pub fn fail_next_flushes(&self, count: usize) {
        self.state.flush_failures.store(count, Ordering::SeqCst);
    }

    /// Clears every armed failure.
    pub fn reset(&self) {
        self.state.write_budget.store(usize::MAX, Ordering::SeqCst);
        self.state.flush_failures.store(0, Ordering::SeqCst);
        self.state.crashed.store(false, Ordering::SeqCst);
    }

    /// Returns true once any simulated failure fired.
    #[must_use]
    pub fn has_crashed(&self) -> bool {
        self.state.crashed.load(Ordering::SeqCst)
    }

    /// Bytes accepted by the wrapped backend so far.
    #[must_use]
    pub fn bytes_written(&self) -> usize {
        self.state.bytes_written.load(Ordering::SeqCst)
    }

    fn take_flush_failure(&self) -> bool {
        let taken = self
            .state
            .flush_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if taken {
            self.state.crashed.store(true, Ordering::SeqCst);
        }
        taken
    }
}

/// A storage backend that fails on command.
pub struct CrashableBackend {
    inner: Box<dyn StorageBackend>,
    switch: CrashSwitch,
}

impl CrashableBackend {
    /// Wraps `inner` with every failure disarmed.
    pub fn new(inner: Box<dyn StorageBackend>) -> Self {
        Self {
            inner,
            switch: CrashSwitch::default(),
        }
    }

    /// Returns a handle controlling this backend.
    #[must_use]
    pub fn switch(&self) -> CrashSwitch {
        self.switch.clone()
    }
}

fn simulated(what: &str) -> StorageError {
    StorageError::Io(io::Error::other(format!("simulated {what}")))
}

impl StorageBackend for CrashableBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        let state = &self.switch.state;
        let written = state.bytes_written.load(Ordering::SeqCst);
        let budget = state.write_budget.load(Ordering::SeqCst);

        if written.saturating_add(bytes.len()) > budget {
            state.crashed.store(true, Ordering::SeqCst);
            let partial = budget.saturating_sub(written);
            if partial > 0 {
                self.inner.append(&bytes[..partial])?;
                state.bytes_written.fetch_add(partial, Ordering::SeqCst);
            }
            return Err(simulated("crash during write"));
        }

        let offset = self.inner.append(bytes)?;
        state.bytes_written.fetch_add(bytes.len(), Ordering::SeqCst);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.switch.take_flush_failure() {
            return Err(simulated("flush failure"));
        }
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.switch.take_flush_failure() {
            return Err(simulated("sync failure"));
        }
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.inner.truncate(new_size)
    }
}

impl std::fmt::Debug for CrashableBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrashableBackend")
            .field("switch", &self.switch)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artindex_storage::InMemoryBackend;

    fn backend() -> (CrashableBackend, CrashSwitch) {
        let backend = CrashableBackend::new(Box::new(InMemoryBackend::new()));
        let switch = backend.switch();
        (backend, switch)
    }

    #[test]
    fn passes_through_when_disarmed() {
        let (mut backend, switch) = backend();
        let offset = backend.append(b"test data").unwrap();
        backend.flush().unwrap();
        backend.sync().unwrap();

        assert_eq!(backend.read_at(offset, 9).unwrap(), b"test data");
        assert!(!switch.has_crashed());
        assert_eq!(switch.bytes_written(), 9);
    }

    #[test]
    fn crossing_write_is_torn() {
        let (mut backend, switch) = backend();
        backend.append(b"header").unwrap();
        switch.crash_after(3);

        assert!(backend.append(b"record").is_err());
        assert!(switch.has_crashed());
        assert_eq!(backend.size().unwrap(), 9);
        assert!(backend.append(b"more").is_err());

        switch.reset();
        backend.append(b"more").unwrap();
        assert_eq!(backend.size().unwrap(), 13);
    }

    #[test]
    fn flush_failures_are_counted() {
        let (mut backend, switch) = backend();
        switch.fail_next_flushes(2);

        assert!(backend.flush().is_err());
        assert!(backend.sync().is_err());
        backend.flush().unwrap();
        backend.sync().unwrap();
    }
}
