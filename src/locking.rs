//! Single-instance daemon lock.
//!
//! An `flock`-backed advisory lock on a PID file under the state
//! directory, the direct analogue of the Python reference's
//! `fcntl.flock`-based `DaemonLock`. The OS releases the lock when the
//! process exits, so there is no explicit unlock path.

use std::fs::{File, OpenOptions};
use std::io::Write;

use fs2::FileExt;

use crate::config::pid_path;
use crate::error::PrismisError;

pub struct DaemonLock {
    _file: File,
}

impl DaemonLock {
    /// Acquire the lock or fail with [`PrismisError::LockHeld`] if another
    /// daemon instance already holds it.
    pub fn acquire() -> Result<Self, PrismisError> {
        let path = pid_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PrismisError::Config(format!("cannot create {}: {e}", parent.display())))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&path)
            .map_err(|e| PrismisError::Config(format!("cannot open {}: {e}", path.display())))?;

        file.try_lock_exclusive().map_err(|_| PrismisError::LockHeld)?;

        let _ = write!(file, "{}", std::process::id());
        let _ = file.flush();

        Ok(DaemonLock { _file: file })
    }
}
