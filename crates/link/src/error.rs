//! Link-level faults.

use std::io;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    /// Listing paired devices failed (adapter missing, permission denied).
    #[error("device listing failed: {0}")]
    Discovery(#[source] io::Error),
    /// The handshake did not finish before the deadline.
    #[error("timeout")]
    ConnectTimeout(Duration),
    #[error("{0}")]
    ConnectFailed(#[source] io::Error),
    #[error("read failed: {0}")]
    ReadFailed(#[source] io::Error),
    #[error("stream closed by remote")]
    RemoteClosed,
    /// Closed locally; pending reads are unblocked with this.
    #[error("connection closed")]
    Closed,
    #[error("write failed: {0}")]
    WriteFailed(#[source] io::Error),
}

impl LinkError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, LinkError::ConnectTimeout(_))
    }

    pub fn is_refused(&self) -> bool {
        matches!(self, LinkError::ConnectFailed(e) if e.kind() == io::ErrorKind::ConnectionRefused)
    }

    pub(crate) fn from_read(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            LinkError::RemoteClosed
        } else {
            LinkError::ReadFailed(err)
        }
    }
}
