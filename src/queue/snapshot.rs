// Queue snapshot persistence

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc::UnboundedReceiver, task::JoinHandle};

use crate::{log::Logger, log_debug, log_error, log_info, log_warning};

/// Persisted copy of the queue state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Queued stream keys, lead first
    pub queue: Vec<String>,

    /// Most recently evicted lead
    #[serde(default)]
    pub last_streamer: Option<String>,

    /// Blocking toggle
    #[serde(default)]
    pub blocking_enabled: bool,

    /// Revision of the state
    #[serde(default)]
    pub revision: u64,

    /// RFC 3339 time of the write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
}

/// Loads the snapshot from a file
///
/// # Return value
///
/// Returns None if the file does not exist or cannot be parsed.
/// A broken file is logged and ignored, so the process can still start.
pub async fn load_queue_snapshot(logger: &Logger, path: &Path) -> Option<QueueSnapshot> {
    let content = match tokio::fs::read(path).await {
        Ok(c) => c,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                log_error!(
                    logger,
                    format!("Could not read snapshot {}: {}", path.display(), e)
                );
            }

            return None;
        }
    };

    match serde_json::from_slice::<QueueSnapshot>(&content) {
        Ok(s) => {
            log_info!(
                logger,
                format!(
                    "Restored {} queued stream(s) from {}",
                    s.queue.len(),
                    path.display()
                )
            );

            Some(s)
        }
        Err(e) => {
            log_warning!(
                logger,
                format!("Ignoring invalid snapshot {}: {}", path.display(), e)
            );

            None
        }
    }
}

/// Writes a snapshot to a file, through a temporary file and a rename
pub async fn write_queue_snapshot(path: &Path, snapshot: &QueueSnapshot) -> std::io::Result<()> {
    let mut stamped = snapshot.clone();
    stamped.saved_at = Some(Utc::now().to_rfc3339());

    let data = serde_json::to_vec_pretty(&stamped)?;

    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");
    let tmp_path = PathBuf::from(tmp_path);

    tokio::fs::write(&tmp_path, data).await?;
    tokio::fs::rename(&tmp_path, path).await
}

/// Spawns the task writing queue snapshots to disk
///
/// Snapshots may arrive out of revision order. When several are pending
/// only the one with the highest revision is written, and a revision
/// never replaces a newer one already on disk.
///
/// # Arguments
///
/// * `logger` - The logger
/// * `path` - The snapshot file
/// * `receiver` - Receiver of the snapshots
pub fn spawn_task_snapshot_writer(
    logger: Arc<Logger>,
    path: PathBuf,
    mut receiver: UnboundedReceiver<QueueSnapshot>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_written: Option<u64> = None;

        while let Some(mut snapshot) = receiver.recv().await {
            while let Ok(pending) = receiver.try_recv() {
                if pending.revision > snapshot.revision {
                    snapshot = pending;
                }
            }

            if last_written.is_some_and(|r| r >= snapshot.revision) {
                continue;
            }

            match write_queue_snapshot(&path, &snapshot).await {
                Ok(_) => {
                    last_written = Some(snapshot.revision);

                    log_debug!(
                        logger,
                        format!(
                            "Saved snapshot revision {} ({} queued)",
                            snapshot.revision,
                            snapshot.queue.len()
                        )
                    );
                }
                Err(e) => {
                    log_error!(
                        logger,
                        format!("Could not write snapshot {}: {}", path.display(), e)
                    );
                }
            }
        }

        log_debug!(logger, "Snapshot channel closed");
    })
}
