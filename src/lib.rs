//! Spyglass - a client-side model for browsing and transferring files on a
//! remote host.
//!
//! The crate is UI-agnostic: it owns a lazily-populated cache of remote
//! file metadata, a concurrent transfer queue with progress and
//! cancellation, and a reconciler that turns move/copy/delete intents into
//! transport calls plus consistent tree mutations. Rendering, credential
//! storage, and bookmarks live in the embedding application.
//!
//! A [`BrowsingSession`] owns the tree, queue, and navigation history for
//! one connected remote root. Transport calls run on background threads;
//! the embedding event loop calls [`BrowsingSession::pump`] from the owning
//! context to apply their results.
//!
//! ```no_run
//! use spyglass::{BrowsingSession, Config, Credentials, SftpTransport};
//!
//! fn main() -> spyglass::Result<()> {
//!     let config = Config::load();
//!     let transport = SftpTransport::with_chunk_size(config.transfers.chunk_size);
//!     let mut session = BrowsingSession::with_config(transport, &config);
//!     session.connect(&Credentials::with_password(
//!         "demo".to_string(),
//!         "files.example.com".to_string(),
//!         "secret".to_string(),
//!     ))?;
//!     loop {
//!         for event in session.pump() {
//!             println!("{event:?}");
//!         }
//!     }
//! }
//! ```

pub mod config;
pub mod errors;
pub mod history;
pub mod naming;
pub mod session;
pub mod transport;
pub mod tree;

mod worker;

pub use config::Config;
pub use errors::{Error, Result};
pub use history::NavigationHistory;
pub use session::queue::{TaskId, TransferEvent, TransferKind, TransferSnapshot};
pub use session::{BrowsingSession, SessionEvent};
pub use transport::{
    AuthMethod, Credentials, DirEntry, SftpTransport, Transport, TransportError,
};
pub use tree::entry::{LoadState, RemoteEntry};
pub use tree::sort::{SortKey, SortSpec};
