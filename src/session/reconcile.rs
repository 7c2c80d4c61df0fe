//! Move/copy reconciliation and transfer intents
//!
//! Translates drag/drop and explicit copy/move/delete requests into
//! transport calls plus consistent tree mutations. Validation and conflict
//! resolution happen synchronously before any transport call; the tree only
//! mutates in `pump()` once the transport reports success.

use std::path::Path;

use tracing::debug;

use crate::errors::{Error, Result};
use crate::naming;
use crate::session::queue::TaskId;
use crate::session::{BrowsingSession, not_connected};
use crate::tree::{self, RemoteEntry};
use crate::worker::OpRequest;

impl BrowsingSession {
    /// Request moving the entry at `src` into the directory at `dest_dir`.
    /// Conflicting names are resolved against the destination's loaded
    /// children. Dropping an entry onto its current parent is a no-op.
    pub fn request_move(&mut self, src: &str, dest_dir: &str) -> Result<()> {
        let Some(new_name) = self.validate_drop(src, dest_dir)? else {
            return Ok(());
        };
        debug!(src, dest_dir, new_name, "move requested");
        self.worker.send(OpRequest::Move {
            src: src.to_string(),
            dest_dir: dest_dir.to_string(),
            new_name,
        });
        Ok(())
    }

    /// Request copying the entry at `src` into the directory at `dest_dir`,
    /// leaving the source untouched.
    pub fn request_copy(&mut self, src: &str, dest_dir: &str) -> Result<()> {
        let Some(new_name) = self.validate_drop(src, dest_dir)? else {
            return Ok(());
        };
        debug!(src, dest_dir, new_name, "copy requested");
        self.worker.send(OpRequest::Copy {
            src: src.to_string(),
            dest_dir: dest_dir.to_string(),
            new_name,
        });
        Ok(())
    }

    /// Copy an entry next to itself under a conflict-resolved name.
    pub fn duplicate(&mut self, path: &str) -> Result<()> {
        let entry = self.known_entry(path)?;
        let name = entry.name.clone();
        let Some(parent) = tree::parent_path(path) else {
            return Err(Error::InvalidOperation(
                "cannot duplicate the current location".to_string(),
            ));
        };
        let taken = self.known_entry(&parent)?.loaded_child_names();
        let new_name = naming::resolve(&name, &taken)?;
        debug!(path, new_name, "duplicate requested");
        self.worker.send(OpRequest::Copy {
            src: path.to_string(),
            dest_dir: parent,
            new_name,
        });
        Ok(())
    }

    /// Request deleting the entry at `path`. The tree entry is detached
    /// only once the transport confirms the removal.
    pub fn request_delete(&mut self, path: &str) -> Result<()> {
        let entry = self.known_entry(path)?;
        let is_dir = entry.is_dir;
        if self.root.as_ref().is_some_and(|r| r.path == path) {
            return Err(Error::InvalidOperation(
                "cannot delete the current location".to_string(),
            ));
        }
        debug!(path, "delete requested");
        self.worker.send(OpRequest::Remove {
            path: path.to_string(),
            is_dir,
        });
        Ok(())
    }

    /// Download the file at `path` to an explicit local target.
    pub fn start_download(&mut self, path: &str, local_target: &Path) -> Result<TaskId> {
        let entry = self.known_entry(path)?;
        if entry.is_dir {
            return Err(Error::InvalidOperation(format!(
                "cannot download a directory: {path}"
            )));
        }
        let (remote_path, name, size, modified) = (
            entry.path.clone(),
            entry.name.clone(),
            entry.size,
            entry.modified,
        );
        Ok(self
            .queue
            .start_download(&remote_path, &name, size, modified, local_target))
    }

    /// Download the file at `path` into a local directory, probing the
    /// filesystem for a conflict-free target name.
    pub fn download_to_dir(&mut self, path: &str, dest_dir: &Path) -> Result<TaskId> {
        let entry = self.known_entry(path)?;
        if entry.is_dir {
            return Err(Error::InvalidOperation(format!(
                "cannot download a directory: {path}"
            )));
        }
        let file_name = naming::resolve_local(dest_dir, &entry.name)?;
        let (remote_path, name, size, modified) = (
            entry.path.clone(),
            entry.name.clone(),
            entry.size,
            entry.modified,
        );
        let target = dest_dir.join(file_name);
        Ok(self
            .queue
            .start_download(&remote_path, &name, size, modified, &target))
    }

    /// Upload bytes to an explicit remote path.
    pub fn start_upload(&mut self, data: Vec<u8>, remote_path: &str) -> Result<TaskId> {
        if self.root.is_none() {
            return Err(not_connected());
        }
        Ok(self.queue.start_upload(data, remote_path))
    }

    /// Route a cross-origin drop (a local file from outside the managed
    /// tree) through the upload path, resolving name conflicts against the
    /// destination's loaded children.
    pub fn drop_external(&mut self, local_source: &Path, dest_dir: &str) -> Result<TaskId> {
        let dest = self.known_entry(dest_dir)?;
        if !dest.is_dir {
            return Err(Error::InvalidOperation(format!(
                "destination is not a directory: {dest_dir}"
            )));
        }
        let taken = dest.loaded_child_names();
        let name = local_source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Error::InvalidOperation(format!(
                    "source has no usable file name: {}",
                    local_source.display()
                ))
            })?;
        let new_name = naming::resolve(name, &taken)?;
        let remote_path = tree::join_path(dest_dir, &new_name);
        let data = std::fs::read(local_source)?;
        debug!(source = %local_source.display(), remote_path, "external drop");
        Ok(self.queue.start_upload(data, &remote_path))
    }

    /// Shared validation for move/copy drops. Returns the resolved
    /// destination name, or `None` for a same-parent drop (nothing to do).
    fn validate_drop(&self, src: &str, dest_dir: &str) -> Result<Option<String>> {
        let root = self.root.as_ref().ok_or_else(not_connected)?;
        let src_entry = tree::find(root, src)
            .ok_or_else(|| Error::InvalidOperation(format!("unknown source: {src}")))?;
        let dest = tree::find(root, dest_dir).ok_or_else(|| {
            Error::InvalidOperation(format!("unknown destination: {dest_dir}"))
        })?;
        if !dest.is_dir {
            return Err(Error::InvalidOperation(format!(
                "destination is not a directory: {dest_dir}"
            )));
        }
        if tree::is_same_or_descendant(src, dest_dir) {
            return Err(Error::InvalidOperation(format!(
                "cannot drop {src} into itself or its own subtree"
            )));
        }
        if tree::parent_path(src).as_deref() == Some(dest_dir) {
            return Ok(None);
        }
        let taken = dest.loaded_child_names();
        Ok(Some(naming::resolve(&src_entry.name, &taken)?))
    }

    fn known_entry(&self, path: &str) -> Result<&RemoteEntry> {
        let root = self.root.as_ref().ok_or_else(not_connected)?;
        tree::find(root, path)
            .ok_or_else(|| Error::InvalidOperation(format!("unknown path: {path}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionEvent;
    use crate::session::queue::TransferEvent;
    use crate::transport::Credentials;
    use crate::transport::mock::{CallLog, MockTransport, listed};
    use std::thread;
    use std::time::Duration;

    fn credentials() -> Credentials {
        Credentials::with_password("user".to_string(), "host".to_string(), "pw".to_string())
            .initial_path("/".to_string())
    }

    fn drain_until(
        session: &mut BrowsingSession,
        mut pred: impl FnMut(&SessionEvent) -> bool,
    ) -> Vec<SessionEvent> {
        let mut seen = Vec::new();
        for _ in 0..500 {
            for event in session.pump() {
                let hit = pred(&event);
                seen.push(event);
                if hit {
                    return seen;
                }
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("timed out waiting for session event; saw {seen:?}");
    }

    fn wait_loaded(session: &mut BrowsingSession, path: &str) {
        drain_until(session, |e| {
            matches!(e, SessionEvent::DirectoryLoaded { path: p } if p == path)
        });
    }

    /// root "/" with a.txt and directories b and c; b contains sub/ and x.txt
    fn scripted_mock() -> MockTransport {
        MockTransport::new()
            .with_listing(
                "/",
                vec![
                    listed("a.txt", false, 10, 100),
                    listed("b", true, 0, 50),
                    listed("c", true, 0, 60),
                ],
            )
            .with_listing(
                "/b",
                vec![listed("sub", true, 0, 1), listed("x.txt", false, 5, 5)],
            )
            .with_listing("/b/sub", vec![])
            .with_listing("/c", vec![])
    }

    fn ready_session(mock: MockTransport) -> (BrowsingSession, CallLog) {
        let log = mock.log.clone();
        let mut session = BrowsingSession::new(mock);
        session.connect(&credentials()).unwrap();
        wait_loaded(&mut session, "/");
        (session, log)
    }

    fn child_names(session: &BrowsingSession, path: &str) -> Vec<String> {
        session
            .entry(path)
            .and_then(|e| e.loaded_children())
            .map(|c| c.iter().map(|e| e.name.clone()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_move_into_loaded_directory() {
        let (mut session, log) = ready_session(scripted_mock());
        session.expand("/b").unwrap();
        wait_loaded(&mut session, "/b");

        session.request_move("/a.txt", "/b").unwrap();
        drain_until(&mut session, |e| matches!(e, SessionEvent::Moved { .. }));

        assert_eq!(child_names(&session, "/"), vec!["b", "c"]);
        assert_eq!(child_names(&session, "/b"), vec!["sub", "x.txt", "a.txt"]);
        assert_eq!(
            session.entry("/b/a.txt").map(|e| e.name.clone()),
            Some("a.txt".to_string())
        );
        assert_eq!(log.count_matching("rename"), 1);
        assert!(log.calls().contains(&"rename /a.txt -> /b/a.txt".to_string()));
    }

    #[test]
    fn test_move_resolves_name_conflict() {
        let mock = scripted_mock().with_listing("/b", vec![listed("a.txt", false, 5, 5)]);
        let (mut session, log) = ready_session(mock);
        session.expand("/b").unwrap();
        wait_loaded(&mut session, "/b");

        session.request_move("/a.txt", "/b").unwrap();
        drain_until(&mut session, |e| matches!(e, SessionEvent::Moved { .. }));

        assert!(log.calls().contains(&"rename /a.txt -> /b/a 1.txt".to_string()));
        assert!(session.entry("/b/a 1.txt").is_some());
        assert!(session.entry("/a.txt").is_none());
    }

    #[test]
    fn test_move_into_unloaded_directory_defers_insert() {
        let (mut session, log) = ready_session(scripted_mock());

        // "/c" was never expanded; the move succeeds remotely but the
        // entry is not appended locally
        session.request_move("/a.txt", "/c").unwrap();
        drain_until(&mut session, |e| matches!(e, SessionEvent::Moved { .. }));

        assert!(session.entry("/a.txt").is_none());
        assert!(session.entry("/c/a.txt").is_none());
        assert_eq!(log.count_matching("rename"), 1);
        // its next expand naturally picks the entry up (nothing cached)
        assert_eq!(
            session.entry("/c").map(|e| e.load_state),
            Some(crate::tree::LoadState::NotLoaded)
        );
    }

    #[test]
    fn test_self_and_descendant_drops_rejected() {
        let (mut session, log) = ready_session(scripted_mock());
        session.expand("/b").unwrap();
        wait_loaded(&mut session, "/b");

        assert!(matches!(
            session.request_move("/b", "/b"),
            Err(Error::InvalidOperation(_))
        ));
        // dropping into a descendant of the dragged directory
        let mock_calls = log.calls().len();
        assert!(matches!(
            session.request_move("/b", "/b/sub"),
            Err(Error::InvalidOperation(_))
        ));
        assert_eq!(log.count_matching("rename"), 0);
        assert_eq!(log.calls().len(), mock_calls);
    }

    #[test]
    fn test_drop_onto_file_rejected() {
        let (mut session, log) = ready_session(scripted_mock());
        assert!(matches!(
            session.request_move("/b", "/a.txt"),
            Err(Error::InvalidOperation(_))
        ));
        assert_eq!(log.count_matching("rename"), 0);
    }

    #[test]
    fn test_same_parent_drop_is_noop() {
        let (mut session, log) = ready_session(scripted_mock());
        session.request_move("/a.txt", "/").unwrap();
        let _ = session.pump();
        assert_eq!(log.count_matching("rename"), 0);
        assert!(session.entry("/a.txt").is_some());
    }

    #[test]
    fn test_failed_move_leaves_tree_untouched() {
        let mut mock = scripted_mock();
        mock.fail_rename = true;
        let (mut session, _log) = ready_session(mock);
        session.expand("/b").unwrap();
        wait_loaded(&mut session, "/b");

        session.request_move("/a.txt", "/b").unwrap();
        drain_until(&mut session, |e| {
            matches!(e, SessionEvent::OperationFailed { .. })
        });

        assert!(session.entry("/a.txt").is_some());
        assert_eq!(child_names(&session, "/b"), vec!["sub", "x.txt"]);
    }

    #[test]
    fn test_copy_leaves_source_in_place() {
        let (mut session, log) = ready_session(scripted_mock());
        session.expand("/b").unwrap();
        wait_loaded(&mut session, "/b");

        session.request_copy("/a.txt", "/b").unwrap();
        drain_until(&mut session, |e| matches!(e, SessionEvent::Copied { .. }));

        assert!(session.entry("/a.txt").is_some());
        assert!(session.entry("/b/a.txt").is_some());
        assert!(log.calls().contains(&"copy /a.txt -> /b/a.txt".to_string()));
    }

    #[test]
    fn test_moved_directory_rebases_descendants() {
        let (mut session, _log) = ready_session(scripted_mock());
        session.expand("/b").unwrap();
        wait_loaded(&mut session, "/b");
        session.expand("/c").unwrap();
        wait_loaded(&mut session, "/c");

        session.request_move("/b", "/c").unwrap();
        drain_until(&mut session, |e| matches!(e, SessionEvent::Moved { .. }));

        assert!(session.entry("/b").is_none());
        assert_eq!(
            session.entry("/c/b/x.txt").map(|e| e.path.clone()),
            Some("/c/b/x.txt".to_string())
        );
    }

    #[test]
    fn test_duplicate_copies_beside_source() {
        let (mut session, log) = ready_session(scripted_mock());

        session.duplicate("/a.txt").unwrap();
        drain_until(&mut session, |e| matches!(e, SessionEvent::Copied { .. }));

        assert!(log.calls().contains(&"copy /a.txt -> /a 1.txt".to_string()));
        assert!(session.entry("/a 1.txt").is_some());
        assert!(session.entry("/a.txt").is_some());
    }

    #[test]
    fn test_delete_detaches_after_success() {
        let (mut session, log) = ready_session(scripted_mock());

        session.request_delete("/a.txt").unwrap();
        drain_until(&mut session, |e| matches!(e, SessionEvent::Removed { .. }));
        assert!(session.entry("/a.txt").is_none());
        assert_eq!(log.count_matching("remove_file /a.txt"), 1);

        session.request_delete("/b").unwrap();
        drain_until(&mut session, |e| matches!(e, SessionEvent::Removed { .. }));
        assert!(session.entry("/b").is_none());
        assert_eq!(log.count_matching("remove_directory /b"), 1);
    }

    #[test]
    fn test_failed_delete_keeps_entry() {
        let mut mock = scripted_mock();
        mock.fail_remove = true;
        let (mut session, _log) = ready_session(mock);

        session.request_delete("/a.txt").unwrap();
        drain_until(&mut session, |e| {
            matches!(e, SessionEvent::OperationFailed { .. })
        });
        assert!(session.entry("/a.txt").is_some());
    }

    #[test]
    fn test_external_drop_uploads_with_resolved_name() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("x.txt");
        std::fs::write(&local, b"payload").unwrap();

        let mock = scripted_mock();
        let uploads = std::sync::Arc::clone(&mock.uploads);
        let (mut session, _log) = ready_session(mock);
        session.expand("/b").unwrap();
        wait_loaded(&mut session, "/b");

        // "/b" already contains x.txt, so the upload lands on "x 1.txt"
        session.drop_external(&local, "/b").unwrap();
        drain_until(&mut session, |e| {
            matches!(
                e,
                SessionEvent::Transfer(TransferEvent::Completed { .. })
            )
        });
        assert_eq!(
            uploads.lock().unwrap().get("/b/x 1.txt").map(Vec::as_slice),
            Some(&b"payload"[..])
        );
    }

    #[test]
    fn test_download_rejects_directories() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, _log) = ready_session(scripted_mock());
        assert!(matches!(
            session.start_download("/b", &dir.path().join("b")),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_download_to_dir_avoids_local_collision() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"existing").unwrap();

        let mock = scripted_mock().with_file("/a.txt", b"remote data");
        let (mut session, _log) = ready_session(mock);

        session.download_to_dir("/a.txt", dir.path()).unwrap();
        drain_until(&mut session, |e| {
            matches!(
                e,
                SessionEvent::Transfer(TransferEvent::Completed { .. })
            )
        });
        assert_eq!(
            std::fs::read(dir.path().join("a 1.txt")).unwrap(),
            b"remote data"
        );
        assert_eq!(
            std::fs::read(dir.path().join("a.txt")).unwrap(),
            b"existing"
        );
    }
}
