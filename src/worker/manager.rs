//! Worker thread driving structural transport calls.

use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;

use tracing::debug;

use crate::transport::{SharedTransport, Transport, TransportError, TransportResult};
use crate::tree::join_path;
use crate::worker::{OpRequest, OpResponse};

/// Runs structural operations against the shared transport on a background
/// thread.
///
/// Requests are sent via `send()` and responses polled via `try_recv()`.
/// The thread terminates when the OpWorker is dropped.
pub struct OpWorker {
    tx: Sender<OpRequest>,
    rx: Receiver<OpResponse>,
}

impl OpWorker {
    /// Spawn a worker bound to the session's transport.
    #[must_use]
    pub fn new(transport: SharedTransport) -> Self {
        let (req_tx, req_rx) = channel::<OpRequest>();
        let (res_tx, res_rx) = channel::<OpResponse>();

        thread::spawn(move || {
            while let Ok(request) = req_rx.recv() {
                handle_request(request, &transport, &res_tx);
            }
        });

        Self {
            tx: req_tx,
            rx: res_rx,
        }
    }

    /// Send a request to the worker.
    pub fn send(&self, req: OpRequest) {
        // Send errors only occur if the worker thread has exited.
        let _ = self.tx.send(req);
    }

    /// Try to receive a response without blocking.
    #[must_use]
    pub fn try_recv(&self) -> Option<OpResponse> {
        self.rx.try_recv().ok()
    }
}

fn handle_request(req: OpRequest, transport: &SharedTransport, tx: &Sender<OpResponse>) {
    debug!(?req, "worker request");
    let response = match req {
        OpRequest::List { path } => {
            let result = with_transport(transport, |t| t.list(&path));
            OpResponse::Listed { path, result }
        }
        OpRequest::Move {
            src,
            dest_dir,
            new_name,
        } => {
            let dest = join_path(&dest_dir, &new_name);
            let result = with_transport(transport, |t| t.rename(&src, &dest));
            OpResponse::Moved {
                src,
                dest_dir,
                new_name,
                result,
            }
        }
        OpRequest::Copy {
            src,
            dest_dir,
            new_name,
        } => {
            let dest = join_path(&dest_dir, &new_name);
            let result = with_transport(transport, |t| t.copy(&src, &dest));
            OpResponse::Copied {
                src,
                dest_dir,
                new_name,
                result,
            }
        }
        OpRequest::Remove { path, is_dir } => {
            let result = with_transport(transport, |t| {
                if is_dir {
                    t.remove_directory(&path)
                } else {
                    t.remove_file(&path)
                }
            });
            OpResponse::Removed { path, result }
        }
    };
    let _ = tx.send(response);
}

fn with_transport<T>(
    transport: &SharedTransport,
    op: impl FnOnce(&mut dyn Transport) -> TransportResult<T>,
) -> TransportResult<T> {
    match transport.lock() {
        Ok(mut guard) => op(guard.as_mut()),
        // Mutex was poisoned (previous holder panicked)
        Err(_) => Err(TransportError::Other("transport lock poisoned".to_string())),
    }
}
