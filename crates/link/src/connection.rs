//! A live link to the board.
//!
//! The stream is split into a [`LinkReader`] and a [`LinkWriter`] so the read
//! loop and the writer can run in separate tasks. Both share a [`CloseHandle`];
//! closing it is idempotent and unblocks a pending `read_byte`.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::watch;

use crate::error::LinkError;

/// Shared, idempotent close signal for one connection.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CloseHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CloseHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Close the link. Returns `true` only for the call that actually closed it.
    pub fn close(&self) -> bool {
        self.tx.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        })
    }

    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

async fn wait_closed(mut rx: watch::Receiver<bool>) {
    loop {
        let closed = *rx.borrow_and_update();
        if closed || rx.changed().await.is_err() {
            return;
        }
    }
}

pub struct LinkReader<S> {
    inner: ReadHalf<S>,
    closer: CloseHandle,
}

impl<S: AsyncRead + Unpin> LinkReader<S> {
    /// Blocking read of exactly one byte. Fails with [`LinkError::Closed`] as
    /// soon as the link is closed locally.
    pub async fn read_byte(&mut self) -> Result<u8, LinkError> {
        if self.closer.is_closed() {
            return Err(LinkError::Closed);
        }
        let closed = wait_closed(self.closer.subscribe());
        tokio::select! {
            biased;
            _ = closed => Err(LinkError::Closed),
            read = self.inner.read_u8() => read.map_err(LinkError::from_read),
        }
    }
}

pub struct LinkWriter<S> {
    inner: WriteHalf<S>,
    closer: CloseHandle,
}

impl<S: AsyncWrite + Unpin> LinkWriter<S> {
    /// Write the whole buffer and flush. Failures do not close the link.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        if self.closer.is_closed() {
            return Err(LinkError::Closed);
        }
        self.inner
            .write_all(bytes)
            .await
            .map_err(LinkError::WriteFailed)?;
        self.inner.flush().await.map_err(LinkError::WriteFailed)
    }

    /// Half-close the outgoing direction.
    pub async fn shutdown(&mut self) -> Result<(), LinkError> {
        self.inner.shutdown().await.map_err(LinkError::WriteFailed)
    }
}

/// Exclusive owner of one opened stream.
pub struct Connection<S> {
    device: String,
    reader: LinkReader<S>,
    writer: LinkWriter<S>,
    closer: CloseHandle,
}

impl<S: AsyncRead + AsyncWrite> Connection<S> {
    pub fn new(device: impl Into<String>, stream: S) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        let closer = CloseHandle::new();
        Self {
            device: device.into(),
            reader: LinkReader {
                inner: read_half,
                closer: closer.clone(),
            },
            writer: LinkWriter {
                inner: write_half,
                closer: closer.clone(),
            },
            closer,
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn close_handle(&self) -> CloseHandle {
        self.closer.clone()
    }

    pub fn close(&self) -> bool {
        self.closer.close()
    }

    pub fn into_split(self) -> (LinkReader<S>, LinkWriter<S>, CloseHandle) {
        (self.reader, self.writer, self.closer)
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    pub async fn read_byte(&mut self) -> Result<u8, LinkError> {
        self.reader.read_byte().await
    }

    pub async fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        self.writer.write(bytes).await
    }
}
