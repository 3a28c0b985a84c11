use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const LOCK_FILE: &str = ".lock";

/// Longest pause between two attempts while waiting for the lock
const MAX_BACKOFF: Duration = Duration::from_millis(100);

/// Exclusive advisory lock on a data directory.
///
/// A [`JsonFileStore`](super::store::JsonFileStore) takes it before reading
/// `checklist.json` and keeps it until the store is dropped, so one `pl`
/// process loads, edits and saves before the next one reads.
///
/// The lock file is never removed: every waiter has to contend on the same
/// inode.
#[derive(Debug)]
pub struct DirLock {
    _file: File,
    path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not open lock file {path}: {source}")]
    CreateError { path: PathBuf, source: io::Error },
    #[error("could not lock {path}: {source}")]
    LockFailed { path: PathBuf, source: io::Error },
    #[error("timed out after {waited:?} waiting for {path}: another pathlist process is using it")]
    Timeout { path: PathBuf, waited: Duration },
}

impl DirLock {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Lock `data_dir`, waiting up to `timeout` for another holder to let go
    pub fn acquire(data_dir: &Path, timeout: Duration) -> Result<Self, LockError> {
        let path = data_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| LockError::CreateError {
                path: path.clone(),
                source: e,
            })?;

        let deadline = Instant::now() + timeout;
        let mut backoff = Duration::from_millis(5);
        loop {
            match lock_exclusive(&file) {
                Ok(()) => {
                    tracing::trace!(path = %path.display(), "data directory locked");
                    return Ok(DirLock { _file: file, path });
                }
                Err(e) if is_contended(&e) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        tracing::warn!(path = %path.display(), "gave up waiting for data directory lock");
                        return Err(LockError::Timeout { path, waited: timeout });
                    }
                    std::thread::sleep(backoff.min(left));
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
                Err(e) => return Err(LockError::LockFailed { path, source: e }),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_contended(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted)
}

/// Non-blocking exclusive flock. Released when the file handle closes.
#[cfg(unix)]
fn lock_exclusive(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;
    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn lock_exclusive(_file: &File) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn relocking_after_drop_succeeds_and_keeps_the_file() {
        let tmp = TempDir::new().unwrap();
        let lock = DirLock::acquire(tmp.path(), DirLock::DEFAULT_TIMEOUT).unwrap();
        assert_eq!(lock.path(), tmp.path().join(LOCK_FILE));
        drop(lock);
        assert!(tmp.path().join(LOCK_FILE).exists());
        assert!(DirLock::acquire(tmp.path(), Duration::ZERO).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn second_holder_times_out() {
        let tmp = TempDir::new().unwrap();
        let _held = DirLock::acquire(tmp.path(), DirLock::DEFAULT_TIMEOUT).unwrap();
        let second = DirLock::acquire(tmp.path(), Duration::from_millis(50));
        assert!(matches!(second, Err(LockError::Timeout { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn waiter_gets_the_lock_once_released() {
        let tmp = TempDir::new().unwrap();
        let held = DirLock::acquire(tmp.path(), DirLock::DEFAULT_TIMEOUT).unwrap();
        let dir = tmp.path().to_path_buf();
        let waiter = std::thread::spawn(move || DirLock::acquire(&dir, Duration::from_secs(5)).is_ok());
        std::thread::sleep(Duration::from_millis(30));
        drop(held);
        assert!(waiter.join().unwrap());
    }
}
