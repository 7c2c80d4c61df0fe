//! Scripted transport for tests
//!
//! Records every call and serves pre-seeded listings and file contents.
//! Streaming operations deliver data in small chunks so progress and
//! cancellation paths get exercised.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, UNIX_EPOCH};

use super::{Credentials, DirEntry, Transport, TransportError, TransportResult};

const CHUNK: usize = 4;

/// Shared, cloneable record of the transport calls made so far
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn record(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count_matching(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

/// Build a listing record with a fixed timestamp
pub fn listed(name: &str, is_dir: bool, size: u64, mtime: u64) -> DirEntry {
    let stamp = Some(UNIX_EPOCH + Duration::from_secs(mtime));
    DirEntry {
        name: name.to_string(),
        is_dir,
        size: if is_dir { 0 } else { size },
        created: stamp,
        modified: stamp,
        permissions: if is_dir { 0o755 } else { 0o644 },
    }
}

/// In-memory transport double with scripted contents
pub struct MockTransport {
    pub listings: HashMap<String, Vec<DirEntry>>,
    pub files: HashMap<String, Vec<u8>>,
    pub log: CallLog,
    /// Uploaded payloads, keyed by destination path
    pub uploads: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    /// While set, streaming operations spin (still honoring cancel)
    pub hold: Option<Arc<AtomicBool>>,
    pub fail_list: bool,
    pub fail_rename: bool,
    pub fail_copy: bool,
    pub fail_remove: bool,
    connected: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            listings: HashMap::new(),
            files: HashMap::new(),
            log: CallLog::default(),
            uploads: Arc::new(Mutex::new(HashMap::new())),
            hold: None,
            fail_list: false,
            fail_rename: false,
            fail_copy: false,
            fail_remove: false,
            connected: false,
        }
    }

    pub fn with_listing(mut self, path: &str, entries: Vec<DirEntry>) -> Self {
        self.listings.insert(path.to_string(), entries);
        self
    }

    pub fn with_file(mut self, path: &str, data: &[u8]) -> Self {
        self.files.insert(path.to_string(), data.to_vec());
        self
    }

    fn wait_if_held(&self, cancel: &AtomicBool) -> TransportResult<()> {
        if let Some(hold) = &self.hold {
            while hold.load(Ordering::Relaxed) {
                if cancel.load(Ordering::Relaxed) {
                    return Err(TransportError::Cancelled);
                }
                std::thread::sleep(Duration::from_millis(1));
            }
        }
        Ok(())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn connect(&mut self, _credentials: &Credentials) -> TransportResult<()> {
        self.log.record("connect");
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn list(&mut self, path: &str) -> TransportResult<Vec<DirEntry>> {
        self.log.record(format!("list {path}"));
        if self.fail_list {
            return Err(TransportError::Other("scripted list failure".to_string()));
        }
        self.listings
            .get(path)
            .cloned()
            .ok_or_else(|| TransportError::NotFound(path.to_string()))
    }

    fn download(
        &mut self,
        path: &str,
        progress: &dyn Fn(u64),
        cancel: &AtomicBool,
    ) -> TransportResult<Vec<u8>> {
        self.log.record(format!("download {path}"));
        let data = self
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| TransportError::NotFound(path.to_string()))?;

        let mut out = Vec::new();
        for chunk in data.chunks(CHUNK) {
            self.wait_if_held(cancel)?;
            if cancel.load(Ordering::Relaxed) {
                return Err(TransportError::Cancelled);
            }
            out.extend_from_slice(chunk);
            progress(chunk.len() as u64);
        }
        Ok(out)
    }

    fn upload(
        &mut self,
        data: &[u8],
        dest: &str,
        progress: &dyn Fn(u64),
        cancel: &AtomicBool,
    ) -> TransportResult<()> {
        self.log.record(format!("upload {dest}"));
        for chunk in data.chunks(CHUNK) {
            self.wait_if_held(cancel)?;
            if cancel.load(Ordering::Relaxed) {
                return Err(TransportError::Cancelled);
            }
            progress(chunk.len() as u64);
        }
        self.uploads
            .lock()
            .unwrap()
            .insert(dest.to_string(), data.to_vec());
        Ok(())
    }

    fn rename(&mut self, src: &str, dest: &str) -> TransportResult<()> {
        self.log.record(format!("rename {src} -> {dest}"));
        if self.fail_rename {
            return Err(TransportError::Other("scripted rename failure".to_string()));
        }
        Ok(())
    }

    fn copy(&mut self, src: &str, dest: &str) -> TransportResult<()> {
        self.log.record(format!("copy {src} -> {dest}"));
        if self.fail_copy {
            return Err(TransportError::Other("scripted copy failure".to_string()));
        }
        Ok(())
    }

    fn remove_file(&mut self, path: &str) -> TransportResult<()> {
        self.log.record(format!("remove_file {path}"));
        if self.fail_remove {
            return Err(TransportError::Other("scripted remove failure".to_string()));
        }
        Ok(())
    }

    fn remove_directory(&mut self, path: &str) -> TransportResult<()> {
        self.log.record(format!("remove_directory {path}"));
        if self.fail_remove {
            return Err(TransportError::Other("scripted remove failure".to_string()));
        }
        Ok(())
    }
}
