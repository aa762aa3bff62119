//! Per-port advisory locking.
//!
//! Cross-platform (fs2) advisory lock on a small file derived from the port name,
//! so two divelink processes never talk to the same cable at once.
//!
//! Lock file path: <lock_dir>/divelink-<sanitized port>.lock (lock_dir = temp dir by default).
//! Lock is released on Drop.

use fs2::FileExt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::error::{DeviceError, Result};

pub struct PortLock {
    file: std::fs::File,
    path: PathBuf,
}

impl PortLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PortLock {
    fn drop(&mut self) {
        // unlock errors on drop are ignored
        let _ = self.file.unlock();
    }
}

/// "/dev/ttyUSB0" -> "dev_ttyUSB0", "COM3" -> "COM3"
fn sanitize(port: &str) -> String {
    let s: String = port
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    s.trim_matches('_').to_string()
}

pub fn lock_file_path(lock_dir: &Path, port: &str) -> PathBuf {
    lock_dir.join(format!("divelink-{}.lock", sanitize(port)))
}

/// Try to take the port lock. Returns PortInUse if another holder has it.
pub fn try_lock_port(lock_dir: &Path, port: &str) -> Result<PortLock> {
    let path = lock_file_path(lock_dir, port);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&path)?;
    file.try_lock_exclusive()
        .map_err(|_| DeviceError::PortInUse(format!("{} (lock {})", port, path.display())))?;
    Ok(PortLock { file, path })
}
