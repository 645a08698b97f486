use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub const LOCK_FILE: &str = ".lock";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const POLL: Duration = Duration::from_millis(10);

/// Exclusive hold on a project's write path.
///
/// A writer takes it before reading `nodes.json` and releases it after the
/// journal line is appended, so the journal records mutations in the order
/// they reached the node file and viewers replay them in that order. Readers
/// and viewers never take it.
///
/// The flock is released when the handle drops. The lock file itself stays:
/// unlinking it would let a later writer lock a fresh file while an earlier
/// one still holds the old inode.
pub struct WriteLock {
    _file: File,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not create lock file at {path}: {source}")]
    CreateError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("timed out waiting for {path}: another wbs process is writing")]
    Timeout { path: PathBuf },
}

impl WriteLock {
    /// Wait up to `timeout` for the project's write lock
    pub fn acquire(wbs_dir: &Path, timeout: Duration) -> Result<Self, LockError> {
        let path = wbs_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockError::CreateError {
                path: path.clone(),
                source,
            })?;

        let deadline = Instant::now() + timeout;
        while try_flock(&file).is_err() {
            if Instant::now() >= deadline {
                return Err(LockError::Timeout { path });
            }
            std::thread::sleep(POLL);
        }
        Ok(WriteLock { _file: file })
    }
}

#[cfg(unix)]
fn try_flock(file: &File) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;
    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn try_flock(_file: &File) -> std::io::Result<()> {
    Ok(())
}
