//! TCP transport, used for the simulated board and for tests.

use std::io;
use std::net::SocketAddr;

use tokio::net::{lookup_host, TcpStream};
use tracing::debug;

use crate::transport::Transport;

/// Treats `host:port` as the device identity. A lookup failure means the
/// device is not reachable yet, not a listing failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl TcpTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for TcpTransport {
    type Device = SocketAddr;
    type Stream = TcpStream;

    async fn find_paired(&self, identity: &str) -> io::Result<Option<SocketAddr>> {
        match lookup_host(identity).await {
            Ok(mut addrs) => Ok(addrs.next()),
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Err(e),
            Err(e) => {
                debug!(identity, error = %e, "lookup failed");
                Ok(None)
            }
        }
    }

    async fn open(&self, device: &SocketAddr) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(device).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}
