//! Browsing session: the owning context for one connected remote root
//!
//! A `BrowsingSession` exclusively owns the cached entry tree, the transfer
//! queue, and the navigation history. Transport calls run on background
//! threads; their results marshal back through channels and are applied to
//! shared state only inside [`BrowsingSession::pump`], which the embedding
//! event loop calls from the single owning context.

pub mod queue;
mod reconcile;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::mpsc::Receiver;

use tracing::{debug, warn};

use crate::config::Config;
use crate::errors::{Error, Result};
use crate::history::NavigationHistory;
use crate::transport::{
    Credentials, DirEntry, SharedTransport, Transport, TransportError,
};
use crate::tree::sort::{self, SortKey, SortSpec};
use crate::tree::{self, LoadState, RemoteEntry};
use crate::worker::{OpRequest, OpResponse, OpWorker};
use self::queue::{TaskId, TransferEvent, TransferQueue, TransferSnapshot};

/// Location shown after connecting when the credentials carry no
/// initial path (the transport's home directory).
const DEFAULT_LOCATION: &str = ".";

/// State change applied during [`BrowsingSession::pump`]
#[derive(Clone, Debug)]
pub enum SessionEvent {
    /// A directory listing arrived and populated the tree
    DirectoryLoaded { path: String },
    /// A directory listing failed; the entry can be expanded again
    LoadFailed { path: String, error: String },
    /// A move completed and the tree was updated
    Moved { src: String, dest: String },
    /// A copy completed and the tree was updated
    Copied { src: String, dest: String },
    /// A delete completed and the entry was detached
    Removed { path: String },
    /// A structural operation failed; the tree was left untouched
    OperationFailed { path: String, error: String },
    /// Transfer queue activity
    Transfer(TransferEvent),
}

/// One connected remote root: tree + queue + history
pub struct BrowsingSession {
    transport: SharedTransport,
    worker: OpWorker,
    queue: TransferQueue,
    history: NavigationHistory,
    root: Option<RemoteEntry>,
    /// Presentation-only flags; cached children survive a collapse
    expanded: HashSet<String>,
    sort: SortSpec,
    filter: Option<String>,
}

impl BrowsingSession {
    /// Create a session over a transport, with default preferences.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::with_config(transport, &Config::default())
    }

    /// Create a session over a transport, taking the default sort order
    /// from `config`.
    pub fn with_config(transport: impl Transport + 'static, config: &Config) -> Self {
        let transport = crate::transport::shared(transport);
        Self {
            worker: OpWorker::new(Arc::clone(&transport)),
            queue: TransferQueue::new(Arc::clone(&transport)),
            transport,
            history: NavigationHistory::new(),
            root: None,
            expanded: HashSet::new(),
            sort: config.sorting,
            filter: None,
        }
    }

    /// Connect and enter the initial location.
    pub fn connect(&mut self, credentials: &Credentials) -> Result<()> {
        let location = credentials
            .initial_path
            .clone()
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string());
        self.lock_transport()?.connect(credentials)?;
        debug!(host = %credentials.host, "connected");
        self.history.clear();
        self.goto(&location)
    }

    pub fn is_connected(&self) -> bool {
        self.transport
            .lock()
            .map(|t| t.is_connected())
            .unwrap_or(false)
    }

    // ---- tree access -------------------------------------------------

    /// Root entry of the current location, once connected
    pub fn root(&self) -> Option<&RemoteEntry> {
        self.root.as_ref()
    }

    /// Entry at an absolute remote path, if cached
    pub fn entry(&self, path: &str) -> Option<&RemoteEntry> {
        tree::find(self.root.as_ref()?, path)
    }

    // ---- lazy loading ------------------------------------------------

    /// Expand a directory, fetching its children on first expansion only.
    /// Expanding an entry that is already Loading or Loaded issues no new
    /// request.
    pub fn expand(&mut self, path: &str) -> Result<()> {
        let Some(root) = self.root.as_mut() else {
            return Err(not_connected());
        };
        let Some(entry) = tree::find_mut(root, path) else {
            return Err(Error::InvalidOperation(format!("unknown path: {path}")));
        };
        if !entry.is_dir {
            return Err(Error::InvalidOperation(format!(
                "not a directory: {path}"
            )));
        }
        let needs_load = entry.load_state == LoadState::NotLoaded;
        if needs_load {
            entry.load_state = LoadState::Loading;
        }
        self.expanded.insert(path.to_string());
        if needs_load {
            debug!(path, "listing directory");
            self.worker.send(OpRequest::List {
                path: path.to_string(),
            });
        }
        Ok(())
    }

    /// Collapse a directory. Cached children survive; re-expanding a
    /// Loaded node does not re-fetch.
    pub fn collapse(&mut self, path: &str) {
        self.expanded.remove(path);
    }

    pub fn is_expanded(&self, path: &str) -> bool {
        self.expanded.contains(path)
    }

    /// Discard a directory's cached subtree and fetch it again. The entry
    /// is replaced by a fresh node, so per-node load-state monotonicity is
    /// preserved.
    pub fn refresh(&mut self, path: &str) -> Result<()> {
        let Some(root) = self.root.as_mut() else {
            return Err(not_connected());
        };
        let Some(entry) = tree::find_mut(root, path) else {
            return Err(Error::InvalidOperation(format!("unknown path: {path}")));
        };
        if !entry.is_dir {
            return Err(Error::InvalidOperation(format!(
                "not a directory: {path}"
            )));
        }
        let mut fresh = RemoteEntry::directory(path);
        fresh.created = entry.created;
        fresh.modified = entry.modified;
        fresh.permissions = entry.permissions;
        fresh.load_state = LoadState::Loading;
        *entry = fresh;
        debug!(path, "refreshing directory");
        self.worker.send(OpRequest::List {
            path: path.to_string(),
        });
        Ok(())
    }

    // ---- sorting and filtering --------------------------------------

    /// Set the sort order and reorder every loaded directory.
    pub fn set_sort(&mut self, key: SortKey, ascending: bool) {
        self.sort = SortSpec { key, ascending };
        let spec = self.sort;
        if let Some(root) = self.root.as_mut() {
            sort::sort_tree(root, spec);
        }
    }

    pub fn sort_spec(&self) -> SortSpec {
        self.sort
    }

    /// Activate the substring filter; an empty pattern disables it.
    pub fn set_filter(&mut self, pattern: &str) {
        self.filter = (!pattern.is_empty()).then(|| pattern.to_string());
    }

    pub fn clear_filter(&mut self) {
        self.filter = None;
    }

    pub fn filter_pattern(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Flat filtered view over the loaded tree while a filter is active.
    /// `None` when no filter is set; the tree itself is never mutated.
    pub fn filter_results(&self) -> Option<Vec<&RemoteEntry>> {
        let pattern = self.filter.as_deref()?;
        let root = self.root.as_ref()?;
        Some(sort::filter_tree(root, pattern))
    }

    // ---- navigation --------------------------------------------------

    /// Visit a new location, truncating the forward history.
    pub fn goto(&mut self, location: &str) -> Result<()> {
        self.history.goto(location);
        self.enter(location.to_string())
    }

    /// Go back one location.
    pub fn back(&mut self) -> Result<()> {
        if !self.history.back() {
            return Err(Error::InvalidOperation(
                "already at the oldest location".to_string(),
            ));
        }
        self.enter_current()
    }

    /// Go forward one location.
    pub fn forward(&mut self) -> Result<()> {
        if !self.history.forward() {
            return Err(Error::InvalidOperation(
                "already at the newest location".to_string(),
            ));
        }
        self.enter_current()
    }

    /// Go back up to `steps` locations (history menu jumps).
    pub fn back_by(&mut self, steps: usize) -> Result<usize> {
        let moved = self.history.back_by(steps);
        if moved == 0 {
            return Err(Error::InvalidOperation(
                "already at the oldest location".to_string(),
            ));
        }
        self.enter_current()?;
        Ok(moved)
    }

    /// Go forward up to `steps` locations.
    pub fn forward_by(&mut self, steps: usize) -> Result<usize> {
        let moved = self.history.forward_by(steps);
        if moved == 0 {
            return Err(Error::InvalidOperation(
                "already at the newest location".to_string(),
            ));
        }
        self.enter_current()?;
        Ok(moved)
    }

    pub fn current_location(&self) -> Option<&str> {
        self.history.current()
    }

    /// The visited-location history (read-only)
    pub fn history(&self) -> &NavigationHistory {
        &self.history
    }

    /// Locations available to "back", nearest first (menu construction)
    pub fn back_candidates(&self) -> Vec<&str> {
        self.history.back_candidates()
    }

    /// Locations available to "forward", nearest first
    pub fn forward_candidates(&self) -> Vec<&str> {
        self.history.forward_candidates()
    }

    // ---- transfer queue ----------------------------------------------

    /// Ordered snapshot of the in-flight transfers.
    pub fn queue_snapshot(&self) -> Vec<TransferSnapshot> {
        self.queue.snapshot()
    }

    /// Cancel a transfer; it disappears from snapshots immediately.
    pub fn cancel_transfer(&mut self, id: TaskId) {
        self.queue.cancel(id);
    }

    /// Obtain a typed transfer event channel.
    pub fn subscribe_transfers(&mut self) -> Receiver<TransferEvent> {
        self.queue.subscribe()
    }

    /// Whether any transfer is still running (shutdown guard).
    pub fn has_active_transfers(&self) -> bool {
        self.queue.has_active_tasks()
    }

    // ---- event pump --------------------------------------------------

    /// Drain background results and apply them to the tree and queue.
    /// All shared-state mutation happens here, on the owning context.
    pub fn pump(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Some(response) = self.worker.try_recv() {
            self.apply_response(response, &mut events);
        }
        for event in self.queue.pump() {
            events.push(SessionEvent::Transfer(event));
        }
        events
    }

    fn apply_response(&mut self, response: OpResponse, events: &mut Vec<SessionEvent>) {
        match response {
            OpResponse::Listed { path, result } => self.apply_listing(path, result, events),
            OpResponse::Moved {
                src,
                dest_dir,
                new_name,
                result,
            } => match result {
                Ok(()) => self.apply_move(src, dest_dir, new_name, events),
                Err(e) => {
                    warn!(src, error = %e, "move failed");
                    events.push(SessionEvent::OperationFailed {
                        path: src,
                        error: e.to_string(),
                    });
                }
            },
            OpResponse::Copied {
                src,
                dest_dir,
                new_name,
                result,
            } => match result {
                Ok(()) => self.apply_copy(src, dest_dir, new_name, events),
                Err(e) => {
                    warn!(src, error = %e, "copy failed");
                    events.push(SessionEvent::OperationFailed {
                        path: src,
                        error: e.to_string(),
                    });
                }
            },
            OpResponse::Removed { path, result } => match result {
                Ok(()) => {
                    if let Some(root) = self.root.as_mut() {
                        tree::remove(root, &path);
                    }
                    self.expanded.remove(&path);
                    events.push(SessionEvent::Removed { path });
                }
                Err(e) => {
                    warn!(path, error = %e, "delete failed");
                    events.push(SessionEvent::OperationFailed {
                        path,
                        error: e.to_string(),
                    });
                }
            },
        }
    }

    fn apply_listing(
        &mut self,
        path: String,
        result: std::result::Result<Vec<DirEntry>, TransportError>,
        events: &mut Vec<SessionEvent>,
    ) {
        let spec = self.sort;
        let Some(root) = self.root.as_mut() else {
            return;
        };
        let Some(entry) = tree::find_mut(root, &path) else {
            warn!(path, "dropping listing for an entry no longer in the tree");
            return;
        };
        if entry.load_state != LoadState::Loading {
            // Only the in-flight load may populate the entry.
            return;
        }
        match result {
            Ok(listing) => {
                let mut children: Vec<RemoteEntry> = listing
                    .into_iter()
                    .map(|e| RemoteEntry::from_listing(&path, e))
                    .collect();
                sort::sort_children(&mut children, spec);
                debug!(path, count = children.len(), "directory loaded");
                entry.children = Some(children);
                entry.load_state = LoadState::Loaded;
                events.push(SessionEvent::DirectoryLoaded { path });
            }
            Err(e) => {
                // Revert so a future expand can retry; no automatic retry.
                entry.load_state = LoadState::NotLoaded;
                warn!(path, error = %e, "listing failed");
                events.push(SessionEvent::LoadFailed {
                    path,
                    error: e.to_string(),
                });
            }
        }
    }

    fn apply_move(
        &mut self,
        src: String,
        dest_dir: String,
        new_name: String,
        events: &mut Vec<SessionEvent>,
    ) {
        let Some(root) = self.root.as_mut() else {
            return;
        };
        let dest_path = tree::join_path(&dest_dir, &new_name);
        if let Some(mut entry) = tree::remove(root, &src) {
            tree::rebase(&mut entry, &dest_path);
            if let Some(dest) = tree::find_mut(root, &dest_dir)
                && dest.load_state == LoadState::Loaded
                && let Some(children) = dest.children.as_mut()
            {
                children.push(entry);
            }
            // An unloaded destination picks the entry up on its next expand.
        } else {
            warn!(src, "moved entry no longer in the tree");
        }
        debug!(src, dest = %dest_path, "move applied");
        events.push(SessionEvent::Moved {
            src,
            dest: dest_path,
        });
    }

    fn apply_copy(
        &mut self,
        src: String,
        dest_dir: String,
        new_name: String,
        events: &mut Vec<SessionEvent>,
    ) {
        let Some(root) = self.root.as_mut() else {
            return;
        };
        let dest_path = tree::join_path(&dest_dir, &new_name);
        // The source stays untouched; a loaded destination receives a
        // rebased clone of the cached subtree.
        if let Some(mut clone) = tree::find(root, &src).cloned() {
            tree::rebase(&mut clone, &dest_path);
            if let Some(dest) = tree::find_mut(root, &dest_dir)
                && dest.load_state == LoadState::Loaded
                && let Some(children) = dest.children.as_mut()
            {
                children.push(clone);
            }
        }
        debug!(src, dest = %dest_path, "copy applied");
        events.push(SessionEvent::Copied {
            src,
            dest: dest_path,
        });
    }

    fn enter_current(&mut self) -> Result<()> {
        let Some(location) = self.history.current().map(str::to_string) else {
            return Err(Error::InvalidOperation("history is empty".to_string()));
        };
        self.enter(location)
    }

    /// Replace the tree with a fresh root for `location` and start loading
    /// it. Navigation drops the active filter, as a reload does.
    fn enter(&mut self, location: String) -> Result<()> {
        self.root = Some(RemoteEntry::directory(&location));
        self.expanded.clear();
        self.filter = None;
        self.expand(&location)
    }

    fn lock_transport(&self) -> Result<std::sync::MutexGuard<'_, Box<dyn Transport>>> {
        self.transport.lock().map_err(|_| {
            Error::Transport(TransportError::Other(
                "transport lock poisoned".to_string(),
            ))
        })
    }
}

fn not_connected() -> Error {
    Error::InvalidOperation("session is not connected".to_string())
}
