//! Store-scoped advisory file locks.
//!
//! Each learned-state store has its own `<store>.lock` file in the database
//! directory. A lock is held only for one read-modify-write; acquisition is a
//! bounded wait that gives up with [`StoreError::Busy`].

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

use crate::storage::StoreError;

/// Interval between non-blocking lock attempts
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A held file lock that releases on drop
pub struct FileLock {
    #[allow(dead_code)]
    file: File,
}

impl FileLock {
    fn open(dir: &Path, store_id: &str) -> io::Result<File> {
        std::fs::create_dir_all(dir)?;
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(format!("{store_id}.lock")))
    }

    /// Attempt to acquire the lock once.
    /// Returns a `WouldBlock` error if another holder has it.
    #[cfg(test)]
    pub fn try_acquire(dir: &Path, store_id: &str) -> io::Result<Self> {
        let file = Self::open(dir, store_id)?;
        Self::try_lock_exclusive(&file)?;
        Ok(FileLock { file })
    }

    /// Poll for the lock until `timeout` elapses.
    pub fn acquire_timeout(dir: &Path, store_id: &str, timeout: Duration) -> io::Result<Self> {
        let file = Self::open(dir, store_id)?;
        let deadline = Instant::now() + timeout;

        loop {
            match Self::try_lock_exclusive(&file) {
                Ok(()) => return Ok(FileLock { file }),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(e);
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(e),
            }
        }
    }

    #[cfg(unix)]
    fn try_lock_exclusive(file: &File) -> io::Result<()> {
        let fd = file.as_raw_fd();
        let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
        if result != 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock
                || err.raw_os_error() == Some(libc::EWOULDBLOCK)
                || err.raw_os_error() == Some(libc::EAGAIN)
            {
                return Err(io::Error::new(
                    io::ErrorKind::WouldBlock,
                    "store is locked by another process",
                ));
            }
            return Err(err);
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn try_lock_exclusive(_file: &File) -> io::Result<()> {
        // No advisory locking outside unix
        Ok(())
    }
}

#[cfg(unix)]
impl Drop for FileLock {
    fn drop(&mut self) {
        let fd = self.file.as_raw_fd();
        // Release the lock - ignore errors on drop
        unsafe { libc::flock(fd, libc::LOCK_UN) };
    }
}

/// Lock settings shared by every store of one database directory.
#[derive(Clone, Debug)]
pub struct StoreLock {
    dir: PathBuf,
    timeout: Duration,
}

impl StoreLock {
    pub fn new(dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            timeout,
        }
    }

    /// Run `f` while holding the exclusive lock of `store_id`.
    ///
    /// Must not be nested for the same store: the inner call would wait on
    /// the outer one and fail with `Busy`.
    pub fn with_lock<T, E>(&self, store_id: &str, f: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let _guard = FileLock::acquire_timeout(&self.dir, store_id, self.timeout).map_err(|e| {
            if e.kind() == io::ErrorKind::WouldBlock {
                log::warn!("lock wait on '{store_id}' timed out after {:?}", self.timeout);
                StoreError::Busy(store_id.to_string())
            } else {
                StoreError::Io(e)
            }
        })?;

        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let tmp = tempfile::tempdir().unwrap();

        let lock1 = FileLock::try_acquire(tmp.path(), "feedback");
        assert!(lock1.is_ok(), "First lock should succeed");

        let lock2 = FileLock::try_acquire(tmp.path(), "feedback");
        assert!(lock2.is_err(), "Second lock should fail");

        // Other stores are independent
        assert!(FileLock::try_acquire(tmp.path(), "synonyms").is_ok());

        drop(lock1);

        let lock3 = FileLock::try_acquire(tmp.path(), "feedback");
        assert!(lock3.is_ok(), "Third lock should succeed after release");
    }

    #[cfg(unix)]
    #[test]
    fn with_lock_reports_busy_after_bounded_wait() {
        let tmp = tempfile::tempdir().unwrap();
        let locks = StoreLock::new(tmp.path(), Duration::from_millis(50));

        let _held = FileLock::try_acquire(tmp.path(), "patterns").unwrap();

        let started = Instant::now();
        let result: Result<(), StoreError> = locks.with_lock("patterns", || Ok(()));
        assert!(matches!(result, Err(StoreError::Busy(ref id)) if id == "patterns"));
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn with_lock_runs_closure_and_releases() {
        let tmp = tempfile::tempdir().unwrap();
        let locks = StoreLock::new(tmp.path(), Duration::from_millis(50));

        let value: Result<u32, StoreError> = locks.with_lock("weights", || Ok(7));
        assert_eq!(value.unwrap(), 7);

        // Released after the closure returned
        assert!(FileLock::try_acquire(tmp.path(), "weights").is_ok());
    }
}
