//! Transfer queue with progress tracking and cancellation
//!
//! Each download/upload runs on its own worker thread against the shared
//! transport, reporting progress and completion through per-task channels.
//! All queue mutation happens on the owning thread inside `pump()`; worker
//! threads never touch shared state directly.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::transport::{SharedTransport, TransportError};

/// Identifier of a transfer task, unique for the session lifetime
pub type TaskId = u64;

/// Direction of a transfer
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TransferKind {
    Download,
    Upload,
}

/// Result delivered by a transfer worker thread
enum TransferOutcome {
    Downloaded(Vec<u8>),
    Uploaded,
    Failed(TransportError),
}

/// One in-flight transfer
struct TransferTask {
    id: TaskId,
    kind: TransferKind,
    display_name: String,
    total_bytes: u64,
    /// Highest progress value observed; never moves backward
    transferred_bytes: u64,
    remote_path: String,
    local_target: Option<PathBuf>,
    /// Remote mtime, restored on the finalized download
    remote_modified: Option<SystemTime>,
    cancel: Arc<AtomicBool>,
    progress_rx: Receiver<u64>,
    done_rx: Receiver<TransferOutcome>,
}

/// Read-only view of a queued transfer
#[derive(Clone, Debug)]
pub struct TransferSnapshot {
    pub id: TaskId,
    pub kind: TransferKind,
    pub display_name: String,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    pub remote_path: String,
    pub local_target: Option<PathBuf>,
}

/// Event delivered to transfer subscribers
#[derive(Clone, Debug)]
pub enum TransferEvent {
    Progress {
        id: TaskId,
        transferred_bytes: u64,
        total_bytes: u64,
    },
    Completed {
        id: TaskId,
        kind: TransferKind,
        display_name: String,
        local_target: Option<PathBuf>,
    },
    Failed {
        id: TaskId,
        kind: TransferKind,
        display_name: String,
        error: String,
    },
}

/// The set of transfers currently in flight, owned by the browsing session
pub struct TransferQueue {
    transport: SharedTransport,
    tasks: Vec<TransferTask>,
    next_id: TaskId,
    subscribers: Vec<Sender<TransferEvent>>,
}

impl TransferQueue {
    pub(crate) fn new(transport: SharedTransport) -> Self {
        Self {
            transport,
            tasks: Vec::new(),
            next_id: 1,
            subscribers: Vec::new(),
        }
    }

    /// Start downloading a remote file to `local_target`.
    pub(crate) fn start_download(
        &mut self,
        remote_path: &str,
        display_name: &str,
        total_bytes: u64,
        remote_modified: Option<SystemTime>,
        local_target: &Path,
    ) -> TaskId {
        let id = self.allocate_id();
        let cancel = Arc::new(AtomicBool::new(false));
        let (progress_tx, progress_rx) = channel::<u64>();
        let (done_tx, done_rx) = channel::<TransferOutcome>();

        let transport = Arc::clone(&self.transport);
        let path = remote_path.to_string();
        let flag = Arc::clone(&cancel);
        thread::spawn(move || {
            let sent = AtomicU64::new(0);
            let progress = |chunk: u64| {
                let done = sent.fetch_add(chunk, Ordering::Relaxed) + chunk;
                let _ = progress_tx.send(done);
            };
            let result = match transport.lock() {
                Ok(mut t) => t.download(&path, &progress, flag.as_ref()),
                Err(_) => Err(TransportError::Other("transport lock poisoned".to_string())),
            };
            let outcome = match result {
                Ok(data) => TransferOutcome::Downloaded(data),
                Err(e) => TransferOutcome::Failed(e),
            };
            // The receiver is gone when the task was cancelled or the
            // session torn down; the outcome is dropped either way.
            let _ = done_tx.send(outcome);
        });

        debug!(id, remote_path, "download started");
        self.tasks.push(TransferTask {
            id,
            kind: TransferKind::Download,
            display_name: display_name.to_string(),
            total_bytes,
            transferred_bytes: 0,
            remote_path: remote_path.to_string(),
            local_target: Some(local_target.to_path_buf()),
            remote_modified,
            cancel,
            progress_rx,
            done_rx,
        });
        id
    }

    /// Start uploading `data` to a remote path.
    pub(crate) fn start_upload(&mut self, data: Vec<u8>, remote_path: &str) -> TaskId {
        let id = self.allocate_id();
        let cancel = Arc::new(AtomicBool::new(false));
        let (progress_tx, progress_rx) = channel::<u64>();
        let (done_tx, done_rx) = channel::<TransferOutcome>();
        let total_bytes = data.len() as u64;

        let transport = Arc::clone(&self.transport);
        let path = remote_path.to_string();
        let flag = Arc::clone(&cancel);
        thread::spawn(move || {
            let sent = AtomicU64::new(0);
            let progress = |chunk: u64| {
                let done = sent.fetch_add(chunk, Ordering::Relaxed) + chunk;
                let _ = progress_tx.send(done);
            };
            let result = match transport.lock() {
                Ok(mut t) => t.upload(&data, &path, &progress, flag.as_ref()),
                Err(_) => Err(TransportError::Other("transport lock poisoned".to_string())),
            };
            let outcome = match result {
                Ok(()) => TransferOutcome::Uploaded,
                Err(e) => TransferOutcome::Failed(e),
            };
            let _ = done_tx.send(outcome);
        });

        debug!(id, remote_path, "upload started");
        self.tasks.push(TransferTask {
            id,
            kind: TransferKind::Upload,
            display_name: crate::tree::file_name(remote_path).to_string(),
            total_bytes,
            transferred_bytes: 0,
            remote_path: remote_path.to_string(),
            local_target: None,
            remote_modified: None,
            cancel,
            progress_rx,
            done_rx,
        });
        id
    }

    /// Signal cancellation and remove the task immediately. The worker's
    /// eventual completion lands on a dropped channel and is swallowed.
    pub fn cancel(&mut self, id: TaskId) {
        if let Some(index) = self.tasks.iter().position(|t| t.id == id) {
            let task = self.tasks.remove(index);
            task.cancel.store(true, Ordering::Relaxed);
            debug!(id, "transfer cancelled");
        }
    }

    /// Ordered view of the in-flight transfers.
    pub fn snapshot(&self) -> Vec<TransferSnapshot> {
        self.tasks
            .iter()
            .map(|t| TransferSnapshot {
                id: t.id,
                kind: t.kind,
                display_name: t.display_name.clone(),
                total_bytes: t.total_bytes,
                transferred_bytes: t.transferred_bytes,
                remote_path: t.remote_path.clone(),
                local_target: t.local_target.clone(),
            })
            .collect()
    }

    /// Whether any transfer is still in flight (shutdown guard).
    pub fn has_active_tasks(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Obtain a typed event channel fed by this queue.
    pub fn subscribe(&mut self) -> Receiver<TransferEvent> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    /// Drain worker channels, apply progress, finalize completed tasks.
    /// Must be called from the owning context.
    pub(crate) fn pump(&mut self) -> Vec<TransferEvent> {
        let mut events = Vec::new();
        let mut index = 0;
        while index < self.tasks.len() {
            let mut advanced = false;
            {
                let task = &mut self.tasks[index];
                while let Ok(done) = task.progress_rx.try_recv() {
                    // Out-of-order progress never moves the value backward.
                    if done > task.transferred_bytes {
                        task.transferred_bytes = done;
                        advanced = true;
                    }
                }
            }
            if advanced {
                let task = &self.tasks[index];
                events.push(TransferEvent::Progress {
                    id: task.id,
                    transferred_bytes: task.transferred_bytes,
                    total_bytes: task.total_bytes,
                });
            }

            match self.tasks[index].done_rx.try_recv() {
                Ok(outcome) => {
                    let task = self.tasks.remove(index);
                    events.push(finish(task, outcome));
                }
                Err(_) => index += 1,
            }
        }

        for event in &events {
            self.subscribers.retain(|s| s.send(event.clone()).is_ok());
        }
        events
    }

    fn allocate_id(&mut self) -> TaskId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl Drop for TransferQueue {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.cancel.store(true, Ordering::Relaxed);
        }
    }
}

/// Finalize a terminal task and produce its event.
fn finish(task: TransferTask, outcome: TransferOutcome) -> TransferEvent {
    match outcome {
        TransferOutcome::Downloaded(data) => {
            let finalized = match task.local_target.as_deref() {
                Some(target) => finalize_download(target, &data, task.remote_modified),
                None => Ok(()),
            };
            match finalized {
                Ok(()) => {
                    debug!(id = task.id, "download finished");
                    TransferEvent::Completed {
                        id: task.id,
                        kind: task.kind,
                        display_name: task.display_name,
                        local_target: task.local_target,
                    }
                }
                Err(e) => {
                    warn!(id = task.id, error = %e, "download finalize failed");
                    TransferEvent::Failed {
                        id: task.id,
                        kind: task.kind,
                        display_name: task.display_name,
                        error: e.to_string(),
                    }
                }
            }
        }
        TransferOutcome::Uploaded => {
            debug!(id = task.id, "upload finished");
            TransferEvent::Completed {
                id: task.id,
                kind: task.kind,
                display_name: task.display_name,
                local_target: None,
            }
        }
        TransferOutcome::Failed(e) => {
            warn!(id = task.id, error = %e, "transfer failed");
            TransferEvent::Failed {
                id: task.id,
                kind: task.kind,
                display_name: task.display_name,
                error: e.to_string(),
            }
        }
    }
}

/// Write the downloaded bytes and restore the remote modification time.
fn finalize_download(
    target: &Path,
    data: &[u8],
    modified: Option<SystemTime>,
) -> io::Result<()> {
    fs::write(target, data)?;
    if let Some(mtime) = modified {
        // Best-effort, the file data is already written.
        let _ = filetime::set_file_mtime(target, filetime::FileTime::from_system_time(mtime));
    }
    Ok(())
}
