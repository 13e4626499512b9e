//! Exclusive lock on a workspace.
//!
//! A build owns the single working directory and the build VM defined in
//! it, so two builds against the same workspace would tear down each
//! other's VM. The lock is an `flock` on `{base}/.boxforge.lock`.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use boxforge_shared::errors::{ForgeError, ForgeResult};

pub const LOCK_FILE: &str = ".boxforge.lock";

/// Held for the duration of a build; released on drop or process exit.
#[derive(Debug)]
pub struct WorkspaceLock {
    file: File,
    path: PathBuf,
}

impl WorkspaceLock {
    /// Take the lock without blocking.
    ///
    /// Fails with [`ForgeError::Config`] when another process holds it.
    pub fn acquire(base_dir: &Path) -> ForgeResult<Self> {
        std::fs::create_dir_all(base_dir)
            .map_err(|e| ForgeError::Storage(format!("failed to create workspace dir: {e}")))?;

        let path = base_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| ForgeError::Storage(format!("failed to open lock file: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;

            let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
            if result != 0 {
                let err = std::io::Error::last_os_error();
                return Err(if err.kind() == std::io::ErrorKind::WouldBlock {
                    ForgeError::Config(format!(
                        "another build is already running in {}",
                        base_dir.display()
                    ))
                } else {
                    ForgeError::Storage(format!("failed to acquire workspace lock: {err}"))
                });
            }
        }

        tracing::debug!(lock_path = %path.display(), "Acquired workspace lock");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }

        tracing::debug!(lock_path = %self.path.display(), "Released workspace lock");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_fails_until_drop() {
        let temp = TempDir::new().unwrap();

        let lock = WorkspaceLock::acquire(temp.path()).unwrap();
        assert_eq!(lock.path(), temp.path().join(LOCK_FILE));

        let err = WorkspaceLock::acquire(temp.path()).unwrap_err();
        assert!(err.to_string().contains("another build"));

        drop(lock);
        WorkspaceLock::acquire(temp.path()).unwrap();
    }

    #[test]
    fn test_workspaces_are_independent() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();

        let _la = WorkspaceLock::acquire(a.path()).unwrap();
        let _lb = WorkspaceLock::acquire(b.path()).unwrap();
    }
}
