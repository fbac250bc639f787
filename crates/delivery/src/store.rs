//! On-disk persisted queue for accepted events.
//!
//! One storage folder per instrumentation key. Accepted events are
//! appended as JSON lines to an open batch file and flushed before the
//! event counts as delivered to the channel boundary; sealing renames the
//! file to the `.pend.jsonl` extension, which marks it ready for upload.
//!
//! The folder is shared across host processes, so writers coordinate
//! through an advisory lock file: created with `create_new`, holding the
//! owner pid, removed on drop. A process that cannot get the lock does
//! not write.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use beacon_events::TelemetryEvent;

use crate::error::{DeliveryError, Result};

/// Extension marking a sealed batch ready for upload.
pub const PENDING_EXTENSION: &str = "pend.jsonl";

/// Name of the per-folder advisory lock file.
const LOCK_FILE: &str = "storage.lock";

const LOCK_RETRIES: u32 = 5;
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(20);

/// Advisory cross-process lock on a storage folder.
///
/// Held for the lifetime of the owning [`PendingStore`]; the lock file is
/// removed on drop.
#[derive(Debug)]
pub struct DirLock {
    path: PathBuf,
}

impl DirLock {
    /// Acquire the lock in `folder`, retrying briefly before giving up
    /// with [`DeliveryError::LockHeld`].
    pub fn acquire(folder: &Path) -> Result<Self> {
        let path = folder.join(LOCK_FILE);
        for attempt in 0..LOCK_RETRIES {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    // Best-effort owner tag for post-mortem inspection.
                    let _ = write!(file, "{}", std::process::id());
                    trace!(path = %path.display(), "storage lock acquired");
                    return Ok(Self { path });
                }
                Err(error) if error.kind() == ErrorKind::AlreadyExists => {
                    trace!(attempt, path = %path.display(), "storage lock contested");
                    std::thread::sleep(LOCK_RETRY_DELAY);
                }
                Err(error) => return Err(error.into()),
            }
        }
        Err(DeliveryError::LockHeld { path })
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        if let Err(error) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), %error, "failed to remove storage lock");
        }
    }
}

struct OpenBatch {
    writer: BufWriter<File>,
    path: PathBuf,
    events: u64,
}

/// Durable pending-event store for one instrumentation key.
pub struct PendingStore {
    folder: PathBuf,
    open: Mutex<Option<OpenBatch>>,
    batch_seq: AtomicU64,
    _lock: DirLock,
}

impl PendingStore {
    /// Open (creating if needed) the storage folder for
    /// `instrumentation_key` under `root` and take its advisory lock.
    pub fn open(root: &Path, instrumentation_key: &str) -> Result<Self> {
        let folder = root.join(instrumentation_key);
        fs::create_dir_all(&folder)?;
        let lock = DirLock::acquire(&folder)?;
        debug!(folder = %folder.display(), "pending store opened");
        Ok(Self {
            folder,
            open: Mutex::new(None),
            batch_seq: AtomicU64::new(0),
            _lock: lock,
        })
    }

    /// Storage folder of this store.
    #[inline]
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Durably append one event to the open batch.
    ///
    /// The line is flushed before returning, so a crash after `append`
    /// never loses the event.
    pub fn append(&self, event: &TelemetryEvent) -> Result<()> {
        let line = serde_json::to_string(event)
            .map_err(|error| std::io::Error::new(ErrorKind::InvalidData, error))?;

        let mut open = self.open.lock();
        if open.is_none() {
            *open = Some(self.new_batch()?);
        }
        if let Some(batch) = open.as_mut() {
            writeln!(batch.writer, "{line}")?;
            batch.writer.flush()?;
            batch.events += 1;
        }
        Ok(())
    }

    /// Seal the open batch: close it and rename it to the pending
    /// extension. Returns the sealed path, or `None` when the open batch
    /// is empty or absent.
    pub fn seal(&self) -> Result<Option<PathBuf>> {
        let Some(batch) = self.open.lock().take() else {
            return Ok(None);
        };
        if batch.events == 0 {
            let _ = fs::remove_file(&batch.path);
            return Ok(None);
        }
        // Dropping the writer closes the file after the final flush.
        drop(batch.writer);

        let sealed = batch.path.with_extension(PENDING_EXTENSION);
        fs::rename(&batch.path, &sealed)?;
        debug!(path = %sealed.display(), events = batch.events, "batch sealed");
        Ok(Some(sealed))
    }

    /// Sealed batches waiting for upload, oldest first.
    pub fn sealed_batches(&self) -> Result<Vec<PathBuf>> {
        let mut batches = pending_files_in(&self.folder)?;
        batches.sort();
        Ok(batches)
    }

    /// Remove an uploaded batch. A file that vanished concurrently is
    /// not an error.
    pub fn remove(&self, batch: &Path) -> Result<()> {
        match fs::remove_file(batch) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    fn new_batch(&self) -> Result<OpenBatch> {
        let seq = self.batch_seq.fetch_add(1, Ordering::Relaxed);
        let path = self
            .folder
            .join(format!("batch-{}-{seq}.jsonl", std::process::id()));
        let file = OpenOptions::new().create_new(true).write(true).open(&path)?;
        trace!(path = %path.display(), "batch opened");
        Ok(OpenBatch {
            writer: BufWriter::new(file),
            path,
            events: 0,
        })
    }
}

/// Sealed pending files directly inside `folder`.
pub(crate) fn pending_files_in(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(found),
        Err(error) => return Err(error.into()),
    };
    for entry in entries {
        let path = entry?.path();
        if path.is_file()
            && path
                .to_string_lossy()
                .ends_with(&format!(".{PENDING_EXTENSION}"))
        {
            found.push(path);
        }
    }
    Ok(found)
}

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;
