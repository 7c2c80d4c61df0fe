use thiserror::Error;

use crate::transport::TransportError;

/// Errors surfaced by the browsing core.
///
/// Every failure is recoverable by retrying the specific operation; the
/// tree, queue, and history are never left partially mutated.
#[derive(Error, Debug)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("no free name for \"{0}\" within 999 attempts")]
    NameSpaceExhausted(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
