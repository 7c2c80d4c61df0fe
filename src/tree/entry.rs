//! Remote entry representation

use std::time::SystemTime;

use crate::transport::DirEntry;

/// Load state of a directory entry's children.
///
/// Transitions are monotonic per entry object: NotLoaded -> Loading ->
/// Loaded. A failed listing reverts to NotLoaded so a later expand can
/// retry, which is the only backward edge.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum LoadState {
    #[default]
    NotLoaded,
    Loading,
    Loaded,
}

/// One file or directory node in the cached remote tree
#[derive(Clone, Debug)]
pub struct RemoteEntry {
    /// Absolute remote identifier, unique among siblings
    pub path: String,
    /// Entry name (last path component)
    pub name: String,
    /// Whether this is a directory
    pub is_dir: bool,
    /// Size in bytes (0 for directories)
    pub size: u64,
    /// Creation time, if the transport reports one
    pub created: Option<SystemTime>,
    /// Last modification time
    pub modified: Option<SystemTime>,
    /// Permission bits (9-bit rwxrwxrwx)
    pub permissions: u32,
    /// Cached children; present exactly when `is_dir` is true
    pub children: Option<Vec<RemoteEntry>>,
    /// Whether `children` has been fetched from the transport
    pub load_state: LoadState,
}

impl RemoteEntry {
    /// Create an unloaded directory node for the given remote path
    pub fn directory(path: &str) -> Self {
        Self {
            path: path.to_string(),
            name: super::file_name(path).to_string(),
            is_dir: true,
            size: 0,
            created: None,
            modified: None,
            permissions: 0,
            children: Some(Vec::new()),
            load_state: LoadState::NotLoaded,
        }
    }

    /// Create an entry from a transport listing record, rooted under `parent_path`
    pub fn from_listing(parent_path: &str, entry: DirEntry) -> Self {
        let path = super::join_path(parent_path, &entry.name);
        Self {
            path,
            name: entry.name,
            is_dir: entry.is_dir,
            size: if entry.is_dir { 0 } else { entry.size },
            created: entry.created,
            modified: entry.modified,
            permissions: entry.permissions & 0o777,
            children: entry.is_dir.then(Vec::new),
            load_state: LoadState::NotLoaded,
        }
    }

    /// Whether this entry's children have been fetched
    pub fn is_loaded(&self) -> bool {
        self.load_state == LoadState::Loaded
    }

    /// Children of a loaded directory; `None` for files and unloaded directories
    pub fn loaded_children(&self) -> Option<&[RemoteEntry]> {
        if self.is_loaded() {
            self.children.as_deref()
        } else {
            None
        }
    }

    /// Names of this directory's loaded children (empty when unloaded)
    pub fn loaded_child_names(&self) -> Vec<String> {
        self.loaded_children()
            .map(|children| children.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Render the entry's permission bits as `rwxrwxrwx`
    pub fn permissions_string(&self) -> String {
        permissions_string(self.permissions)
    }
}

/// Render 9-bit permission bits as `rwxrwxrwx`
pub fn permissions_string(permissions: u32) -> String {
    let mut out = String::with_capacity(9);
    for shift in [6u32, 3, 0] {
        let bits = (permissions >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}
