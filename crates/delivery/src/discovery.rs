//! Legacy discovery of stray pending files.
//!
//! Other installers and older components of the host application may
//! have left sealed pending files in well-known directories. When any
//! are found the delivery channel is eligible for an eager forced
//! `start`, so the strays get uploaded without waiting for the host to
//! start the channel on its own schedule.

use std::path::PathBuf;

use tracing::debug;

use crate::store::pending_files_in;

/// Per-OS environment variables naming directories where other
/// installers historically dropped pending files.
#[cfg(windows)]
const LEGACY_ENV_DIRS: &[&str] = &["TEMP", "LOCALAPPDATA"];
#[cfg(not(windows))]
const LEGACY_ENV_DIRS: &[&str] = &["TMPDIR", "XDG_CACHE_HOME"];

/// Scan the well-known directories for stray pending files.
pub fn stray_pending_files() -> Vec<PathBuf> {
    let dirs: Vec<PathBuf> = LEGACY_ENV_DIRS
        .iter()
        .filter_map(std::env::var_os)
        .map(PathBuf::from)
        .collect();
    stray_pending_files_in(&dirs)
}

/// Scan explicit directories for stray pending files. Directories that
/// are missing or unreadable contribute nothing.
pub fn stray_pending_files_in(dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut strays = Vec::new();
    for dir in dirs {
        if let Ok(mut found) = pending_files_in(dir) {
            strays.append(&mut found);
        }
    }
    if !strays.is_empty() {
        debug!(count = strays.len(), "stray pending files discovered");
    }
    strays
}

/// Whether legacy discovery found anything. When true the host should
/// force an eager `start` of the delivery channel to upload the strays.
pub fn wants_eager_start() -> bool {
    !stray_pending_files().is_empty()
}

#[cfg(test)]
#[path = "discovery_test.rs"]
mod discovery_test;
