//! SFTP transport over ssh2

use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, UNIX_EPOCH};

use tracing::debug;

use super::{AuthMethod, Credentials, DirEntry, Transport, TransportError, TransportResult};
use crate::tree::join_path;

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// SFTP-backed transport using ssh2
pub struct SftpTransport {
    session: Option<ssh2::Session>,
    sftp: Option<ssh2::Sftp>,
    chunk_size: usize,
}

impl SftpTransport {
    /// Create a disconnected SFTP transport
    pub fn new() -> Self {
        Self {
            session: None,
            sftp: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Create a transport with a custom streaming chunk size
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            session: None,
            sftp: None,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Get the SFTP handle; fails when not connected
    fn sftp(&mut self) -> TransportResult<&mut ssh2::Sftp> {
        self.sftp
            .as_mut()
            .ok_or_else(|| TransportError::Connection("not connected".to_string()))
    }

    /// Convert ssh2 error to transport error
    fn map_ssh_error(e: ssh2::Error) -> TransportError {
        match e.code() {
            ssh2::ErrorCode::Session(_) => TransportError::Connection(e.to_string()),
            _ => TransportError::Other(e.to_string()),
        }
    }

    /// Build a DirEntry from an SFTP stat
    fn dir_entry_from_stat(name: String, stat: &ssh2::FileStat) -> DirEntry {
        let is_dir = stat.is_dir();
        let modified = stat.mtime.map(|t| UNIX_EPOCH + Duration::from_secs(t));
        DirEntry {
            name,
            is_dir,
            size: if is_dir { 0 } else { stat.size.unwrap_or(0) },
            // SFTP reports no creation time; mirror the modification time
            created: modified,
            modified,
            permissions: stat.perm.unwrap_or(0) & 0o777,
        }
    }

    fn read_file(&mut self, path: &str) -> TransportResult<Vec<u8>> {
        let sftp = self.sftp()?;
        let mut file = sftp.open(Path::new(path)).map_err(Self::map_ssh_error)?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).map_err(TransportError::Io)?;
        Ok(contents)
    }

    fn write_file(&mut self, path: &str, data: &[u8]) -> TransportResult<()> {
        let sftp = self.sftp()?;
        let mut file = sftp.create(Path::new(path)).map_err(Self::map_ssh_error)?;
        file.write_all(data).map_err(TransportError::Io)?;
        Ok(())
    }
}

impl Default for SftpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SftpTransport {
    fn connect(&mut self, credentials: &Credentials) -> TransportResult<()> {
        let addr = format!("{}:{}", credentials.host, credentials.port);
        let tcp = TcpStream::connect(&addr).map_err(|e| {
            TransportError::Connection(format!("Failed to connect to {}: {}", addr, e))
        })?;

        let mut session = ssh2::Session::new().map_err(|e| {
            TransportError::Connection(format!("Failed to create session: {}", e))
        })?;

        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| TransportError::Connection(format!("SSH handshake failed: {}", e)))?;

        // Keepalive prevents connection timeout during long browses
        session.set_keepalive(true, 10);

        match &credentials.auth {
            AuthMethod::Password(password) => {
                session
                    .userauth_password(&credentials.user, password)
                    .map_err(|e| TransportError::Auth(format!("Password auth failed: {}", e)))?;
            }
            AuthMethod::Key {
                private_key,
                passphrase,
            } => {
                session
                    .userauth_pubkey_file(
                        &credentials.user,
                        None,
                        private_key,
                        passphrase.as_deref(),
                    )
                    .map_err(|e| TransportError::Auth(format!("Key auth failed: {}", e)))?;
            }
            AuthMethod::Agent => {
                let mut agent = session.agent().map_err(|e| {
                    TransportError::Auth(format!("Failed to connect to agent: {}", e))
                })?;
                agent.connect().map_err(|e| {
                    TransportError::Auth(format!("Failed to connect to agent: {}", e))
                })?;
                agent.list_identities().map_err(|e| {
                    TransportError::Auth(format!("Failed to list agent identities: {}", e))
                })?;

                let mut authenticated = false;
                for identity in agent.identities().unwrap_or_default() {
                    if agent.userauth(&credentials.user, &identity).is_ok() {
                        authenticated = true;
                        break;
                    }
                }
                if !authenticated {
                    return Err(TransportError::Auth(
                        "No valid identity found in agent".to_string(),
                    ));
                }
            }
        }

        if !session.authenticated() {
            return Err(TransportError::Auth("Authentication failed".to_string()));
        }

        let sftp = session
            .sftp()
            .map_err(|e| TransportError::Connection(format!("Failed to open SFTP: {}", e)))?;

        debug!(host = %credentials.host, "SFTP session established");
        self.session = Some(session);
        self.sftp = Some(sftp);

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| s.authenticated())
            .unwrap_or(false)
    }

    fn disconnect(&mut self) {
        self.sftp = None;
        if let Some(session) = self.session.take() {
            let _ = session.disconnect(None, "Goodbye", None);
        }
    }

    fn list(&mut self, path: &str) -> TransportResult<Vec<DirEntry>> {
        let path = if path.is_empty() { "/" } else { path };
        let sftp = self.sftp()?;
        let mut dir = sftp.opendir(Path::new(path)).map_err(Self::map_ssh_error)?;

        let mut entries = Vec::new();
        while let Ok((entry_path, stat)) = dir.readdir() {
            let name = entry_path
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();

            // Skip . and .. and problematic names
            if name.is_empty() || name == "." || name == ".." || name.contains('/') {
                continue;
            }

            entries.push(Self::dir_entry_from_stat(name, &stat));
        }

        Ok(entries)
    }

    fn download(
        &mut self,
        path: &str,
        progress: &dyn Fn(u64),
        cancel: &AtomicBool,
    ) -> TransportResult<Vec<u8>> {
        let chunk_size = self.chunk_size;
        let sftp = self.sftp()?;
        let mut file = sftp.open(Path::new(path)).map_err(Self::map_ssh_error)?;

        let mut data = Vec::new();
        let mut buf = vec![0u8; chunk_size];
        loop {
            if cancel.load(Ordering::Relaxed) {
                return Err(TransportError::Cancelled);
            }
            let n = file.read(&mut buf).map_err(TransportError::Io)?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            progress(n as u64);
        }

        Ok(data)
    }

    fn upload(
        &mut self,
        data: &[u8],
        dest: &str,
        progress: &dyn Fn(u64),
        cancel: &AtomicBool,
    ) -> TransportResult<()> {
        let chunk_size = self.chunk_size;
        let sftp = self.sftp()?;
        let mut file = sftp.create(Path::new(dest)).map_err(Self::map_ssh_error)?;

        for chunk in data.chunks(chunk_size) {
            if cancel.load(Ordering::Relaxed) {
                // Clean up the partial file before reporting cancellation
                drop(file);
                let _ = sftp.unlink(Path::new(dest));
                return Err(TransportError::Cancelled);
            }
            file.write_all(chunk).map_err(TransportError::Io)?;
            progress(chunk.len() as u64);
        }

        Ok(())
    }

    fn rename(&mut self, src: &str, dest: &str) -> TransportResult<()> {
        let sftp = self.sftp()?;
        sftp.rename(Path::new(src), Path::new(dest), None)
            .map_err(Self::map_ssh_error)
    }

    fn copy(&mut self, src: &str, dest: &str) -> TransportResult<()> {
        // SFTP has no native copy: files stream read + write, directories
        // copy recursively.
        let is_dir = {
            let sftp = self.sftp()?;
            sftp.stat(Path::new(src))
                .map_err(Self::map_ssh_error)?
                .is_dir()
        };

        if is_dir {
            {
                let sftp = self.sftp()?;
                sftp.mkdir(Path::new(dest), 0o755)
                    .map_err(Self::map_ssh_error)?;
            }
            for entry in self.list(src)? {
                let from = join_path(src, &entry.name);
                let to = join_path(dest, &entry.name);
                self.copy(&from, &to)?;
            }
            Ok(())
        } else {
            let data = self.read_file(src)?;
            self.write_file(dest, &data)
        }
    }

    fn remove_file(&mut self, path: &str) -> TransportResult<()> {
        let sftp = self.sftp()?;
        sftp.unlink(Path::new(path)).map_err(Self::map_ssh_error)
    }

    fn remove_directory(&mut self, path: &str) -> TransportResult<()> {
        // Contents first; SFTP rmdir requires an empty directory
        for entry in self.list(path)? {
            let entry_path = join_path(path, &entry.name);
            if entry.is_dir {
                self.remove_directory(&entry_path)?;
            } else {
                self.remove_file(&entry_path)?;
            }
        }
        let sftp = self.sftp()?;
        sftp.rmdir(Path::new(path)).map_err(Self::map_ssh_error)
    }
}

impl Drop for SftpTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}
