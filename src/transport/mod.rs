//! Remote file-transport capability
//!
//! The browsing core drives every remote operation through the [`Transport`]
//! trait, allowing sessions to work against:
//! - SFTP servers (the built-in [`SftpTransport`])
//! - Any other backend able to list, stream, rename, copy, and delete
//!
//! Transport calls are blocking; the session runs them on background
//! threads and marshals results back to the owning context. Streaming
//! operations report chunk sizes through a progress callback and honor a
//! cooperative cancel flag checked between chunks.

mod sftp;

#[cfg(test)]
pub mod mock;

pub use sftp::SftpTransport;

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use thiserror::Error;

/// Error type for transport operations
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("{0}")]
    Other(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// One entry of a remote directory listing, as reported by the transport.
///
/// Paths are not part of the record; the caller joins `name` onto the
/// listed directory itself.
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// Entry name (no path separators)
    pub name: String,
    /// Whether this is a directory
    pub is_dir: bool,
    /// Size in bytes (0 for directories)
    pub size: u64,
    /// Creation time, if the backend reports one
    pub created: Option<SystemTime>,
    /// Last modification time
    pub modified: Option<SystemTime>,
    /// Permission bits (9-bit rwxrwxrwx)
    pub permissions: u32,
}

/// Authentication method for a remote host
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// Password authentication
    Password(String),
    /// Key authentication
    Key {
        /// Path to private key file
        private_key: PathBuf,
        /// Passphrase for key (if encrypted)
        passphrase: Option<String>,
    },
    /// Agent authentication
    Agent,
}

/// Connection credentials for a remote host
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Username
    pub user: String,
    /// Hostname or IP address
    pub host: String,
    /// Port (default 22)
    pub port: u16,
    /// Initial remote location (optional; defaults to the home directory)
    pub initial_path: Option<String>,
    /// Authentication method
    pub auth: AuthMethod,
}

impl Credentials {
    /// Create credentials with password auth
    pub fn with_password(user: String, host: String, password: String) -> Self {
        Self {
            user,
            host,
            port: 22,
            initial_path: None,
            auth: AuthMethod::Password(password),
        }
    }

    /// Create credentials with key auth
    pub fn with_key(user: String, host: String, private_key: PathBuf) -> Self {
        Self {
            user,
            host,
            port: 22,
            initial_path: None,
            auth: AuthMethod::Key {
                private_key,
                passphrase: None,
            },
        }
    }

    /// Create credentials with agent auth
    pub fn with_agent(user: String, host: String) -> Self {
        Self {
            user,
            host,
            port: 22,
            initial_path: None,
            auth: AuthMethod::Agent,
        }
    }

    /// Set port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set initial remote location
    pub fn initial_path(mut self, path: String) -> Self {
        self.initial_path = Some(path);
        self
    }

    /// Get display name for this connection
    pub fn display_name(&self) -> String {
        if self.port != 22 {
            format!("{}@{}:{}", self.user, self.host, self.port)
        } else {
            format!("{}@{}", self.user, self.host)
        }
    }
}

/// Trait for remote file-transport backends
///
/// All paths are absolute remote identifiers in Unix syntax. Streaming
/// calls invoke `progress` with the byte count of each chunk moved and
/// check `cancel` between chunks, returning [`TransportError::Cancelled`]
/// when it is set.
pub trait Transport: Send {
    /// Connect and authenticate against the remote host
    fn connect(&mut self, credentials: &Credentials) -> TransportResult<()>;

    /// Check if this transport is connected/ready
    fn is_connected(&self) -> bool;

    /// Disconnect from the remote host
    fn disconnect(&mut self);

    /// List directory contents
    fn list(&mut self, path: &str) -> TransportResult<Vec<DirEntry>>;

    /// Download a file, returning its contents
    fn download(
        &mut self,
        path: &str,
        progress: &dyn Fn(u64),
        cancel: &AtomicBool,
    ) -> TransportResult<Vec<u8>>;

    /// Upload file contents to a remote path
    fn upload(
        &mut self,
        data: &[u8],
        dest: &str,
        progress: &dyn Fn(u64),
        cancel: &AtomicBool,
    ) -> TransportResult<()>;

    /// Rename/move a file or directory
    fn rename(&mut self, src: &str, dest: &str) -> TransportResult<()>;

    /// Copy a file or directory (within the remote host)
    fn copy(&mut self, src: &str, dest: &str) -> TransportResult<()>;

    /// Delete a file
    fn remove_file(&mut self, path: &str) -> TransportResult<()>;

    /// Delete a directory and its contents
    fn remove_directory(&mut self, path: &str) -> TransportResult<()>;
}

/// A transport handle shareable across the session's worker threads.
pub type SharedTransport = Arc<Mutex<Box<dyn Transport>>>;

/// Wrap a transport for use by a browsing session.
pub fn shared(transport: impl Transport + 'static) -> SharedTransport {
    Arc::new(Mutex::new(Box::new(transport)))
}
