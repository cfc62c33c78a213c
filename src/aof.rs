//! Append-only file persistence.
//!
//! Every accepted write request is appended to the file in its wire format, so the file is a
//! plain concatenation of RESP arrays with no header or checksum. Appends only hand the bytes to
//! the OS; a background task syncs the file to stable storage once per interval when something
//! was written since the last sync. On startup the file is replayed front to back to rebuild the
//! store before any client is served.

use futures::StreamExt;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use thiserror::Error as ThisError;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::{self, Duration, MissedTickBehavior};
use tokio_util::codec::FramedRead;
use tracing::{debug, error, info, instrument};

use crate::codec::FrameCodec;
use crate::frame::{self, Frame};

#[derive(Debug, ThisError)]
pub enum AofError {
    #[error("append-only file I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("append-only file is corrupt: {0}")]
    Decode(#[from] frame::Error),
    #[error("failed to replay entry {entry}: {source}")]
    Apply { entry: usize, source: crate::Error },
    #[error("append-only file is closed")]
    Closed,
}

/// Handle to the append-only file. Cheap to clone, every clone writes to the same file.
///
/// A single lock serializes appends, periodic syncs, replay and close.
#[derive(Clone)]
pub struct Aof {
    inner: Arc<Shared>,
}

struct Shared {
    path: PathBuf,
    state: Mutex<State>,
}

struct State {
    /// `None` once the file has been closed.
    file: Option<File>,
    /// Set by appends, cleared when the file is synced.
    dirty: bool,
}

impl Aof {
    /// Opens the file at `path`, creating it and its parent directories if needed, and starts the
    /// background task syncing it every `fsync_interval`.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn open(path: impl AsRef<Path>, fsync_interval: Duration) -> Result<Aof, AofError> {
        let path = path.as_ref().to_path_buf();

        if fsync_interval.is_zero() {
            return Err(AofError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "fsync interval must be non-zero",
            )));
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .await?;
        let len = file.seek(SeekFrom::End(0)).await?;

        info!(path = %path.display(), bytes = len, "append-only file opened");

        let inner = Arc::new(Shared {
            path,
            state: Mutex::new(State {
                file: Some(file),
                dirty: false,
            }),
        });

        tokio::spawn(sync_periodically(Arc::downgrade(&inner), fsync_interval));

        Ok(Self { inner })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Appends the serialized `frame` to the file. The data reaches the OS before this returns,
    /// but it is only synced to stable storage by the background task.
    pub async fn append(&self, frame: &Frame) -> Result<(), AofError> {
        let mut state = self.inner.state.lock().await;
        let file = state.file.as_mut().ok_or(AofError::Closed)?;
        let offset = file.stream_position().await?;

        if let Err(e) = write_entry(file, &frame.serialize()).await {
            // A partial entry would make every later entry unreplayable.
            if let Err(rollback) = truncate_to(file, offset).await {
                error!(error = %rollback, offset, "failed to roll back partial append");
            }
            return Err(e.into());
        }
        state.dirty = true;

        Ok(())
    }

    /// Decodes every entry from the start of the file and hands it to `apply`, in write order.
    /// Returns the number of entries replayed.
    ///
    /// Replay stops at the first decode error, including an entry cut short by a crash in the
    /// middle of a write, or at the first error returned by `apply`.
    #[instrument(name = "replay", skip_all, fields(path = %self.inner.path.display()))]
    pub async fn replay<F>(&self, mut apply: F) -> Result<usize, AofError>
    where
        F: FnMut(Frame) -> Result<(), crate::Error>,
    {
        let mut state = self.inner.state.lock().await;
        let file = state.file.as_mut().ok_or(AofError::Closed)?;

        file.seek(SeekFrom::Start(0)).await?;

        let mut count = 0;
        let result = {
            let mut entries = FramedRead::new(&mut *file, FrameCodec::new());
            loop {
                let frame = match entries.next().await {
                    Some(Ok(frame)) => frame,
                    Some(Err(err)) => break Err(AofError::from(err)),
                    None => break Ok(()),
                };

                debug!(entry = count, %frame, "replaying entry");

                if let Err(source) = apply(frame) {
                    break Err(AofError::Apply {
                        entry: count,
                        source,
                    });
                }
                count += 1;
            }
        };

        // Appends continue at the end, whatever happened above.
        file.seek(SeekFrom::End(0)).await?;
        result?;

        info!(entries = count, "append-only file replayed");
        Ok(count)
    }

    /// Syncs the file if anything was appended since the last sync. Returns whether a sync
    /// happened.
    pub async fn sync_if_dirty(&self) -> Result<bool, AofError> {
        self.inner.sync_if_dirty().await
    }

    /// Whether there are appends that have not been synced yet.
    pub async fn is_dirty(&self) -> bool {
        self.inner.state.lock().await.dirty
    }

    /// Flushes and syncs the file, then releases it. Later appends fail with [`AofError::Closed`]
    /// and the background task stops.
    pub async fn close(&self) -> Result<(), AofError> {
        let mut state = self.inner.state.lock().await;

        if let Some(mut file) = state.file.take() {
            file.flush().await?;
            file.sync_all().await?;
            state.dirty = false;
            info!(path = %self.inner.path.display(), "append-only file closed");
        }

        Ok(())
    }
}

impl Shared {
    async fn sync_if_dirty(&self) -> Result<bool, AofError> {
        let mut state = self.state.lock().await;
        if !state.dirty {
            return Ok(false);
        }

        let file = state.file.as_mut().ok_or(AofError::Closed)?;
        file.sync_data().await?;
        state.dirty = false;

        Ok(true)
    }

    async fn is_closed(&self) -> bool {
        self.state.lock().await.file.is_none()
    }
}

async fn write_entry(file: &mut File, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await
}

async fn truncate_to(file: &mut File, len: u64) -> io::Result<()> {
    file.set_len(len).await?;
    file.seek(SeekFrom::Start(len)).await?;
    Ok(())
}

/// Syncs the file once per `interval` until it is closed or every [`Aof`] handle is dropped.
async fn sync_periodically(weak: Weak<Shared>, interval: Duration) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Skip the immediate first tick.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let Some(shared) = weak.upgrade() else {
            break;
        };
        if shared.is_closed().await {
            break;
        }

        // A failed sync leaves the dirty flag set, so the next tick retries.
        match shared.sync_if_dirty().await {
            Ok(true) => debug!(path = %shared.path.display(), "append-only file synced"),
            Ok(false) => {}
            Err(e) => error!(
                error = %e,
                path = %shared.path.display(),
                "failed to sync append-only file"
            ),
        }
    }

    debug!("append-only file sync task stopped");
}
