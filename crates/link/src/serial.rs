//! Serial-port transport.
//!
//! A paired Bluetooth board shows up as an RFCOMM/SPP serial port (or a USB
//! serial adapter during bench testing). The blocking `serialport` handle is
//! bridged to async with two threads: `serial-rx` forwards incoming chunks
//! into a channel, `serial-tx` drains outgoing frames onto the port and
//! reports one result per frame back to the stream. A failed write surfaces
//! from `poll_flush` and leaves the read side running.

use std::fmt;
use std::io::{self, Read, Write};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread;
use std::time::Duration;

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::transport::Transport;

const READ_CHUNK: usize = 64;
const INCOMING_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialDevice {
    pub port_name: String,
}

impl fmt::Display for SerialDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.port_name)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SerialTransport {
    pub baud_rate: u32,
    /// How long a blocking read waits before rechecking for shutdown.
    pub poll_interval: Duration,
}

impl Default for SerialTransport {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl SerialTransport {
    pub fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            ..Self::default()
        }
    }
}

fn normalize(identity: &str) -> String {
    identity
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Match by port name, or by the hardware address / serial number the OS
/// reports for the port.
fn matches(port: &SerialPortInfo, identity: &str) -> bool {
    if port.port_name == identity {
        return true;
    }
    let wanted = normalize(identity);
    if wanted.is_empty() {
        return false;
    }
    match &port.port_type {
        SerialPortType::UsbPort(usb) => [usb.serial_number.as_deref(), usb.product.as_deref()]
            .into_iter()
            .flatten()
            .any(|field| field == identity || normalize(field).contains(&wanted)),
        _ => normalize(&port.port_name).contains(&wanted),
    }
}

impl Transport for SerialTransport {
    type Device = SerialDevice;
    type Stream = SerialStream;

    async fn find_paired(&self, identity: &str) -> io::Result<Option<SerialDevice>> {
        let ports = tokio::task::spawn_blocking(serialport::available_ports)
            .await
            .map_err(io::Error::other)??;
        let found = ports
            .iter()
            .find(|port| matches(port, identity))
            .map(|port| SerialDevice {
                port_name: port.port_name.clone(),
            });
        if found.is_none() {
            debug!(identity, candidates = ports.len(), "no matching serial port");
        }
        Ok(found)
    }

    async fn open(&self, device: &SerialDevice) -> io::Result<SerialStream> {
        let port_name = device.port_name.clone();
        let baud_rate = self.baud_rate;
        let poll_interval = self.poll_interval;
        let port = tokio::task::spawn_blocking(move || {
            serialport::new(port_name, baud_rate)
                .timeout(poll_interval)
                .open()
        })
        .await
        .map_err(io::Error::other)??;
        SerialStream::spawn(port)
    }
}

/// Async byte stream over a blocking serial port.
pub struct SerialStream {
    incoming: mpsc::Receiver<io::Result<Vec<u8>>>,
    pending: Vec<u8>,
    pos: usize,
    outgoing: mpsc::UnboundedSender<Vec<u8>>,
    written: mpsc::UnboundedReceiver<io::Result<()>>,
    /// Frames handed to `serial-tx` whose result has not been collected.
    in_flight: usize,
    shutdown: Arc<AtomicBool>,
}

impl SerialStream {
    fn spawn(port: Box<dyn SerialPort>) -> io::Result<Self> {
        let mut reader = port.try_clone()?;
        let mut writer = port;
        let shutdown = Arc::new(AtomicBool::new(false));
        let (in_tx, incoming) = mpsc::channel(INCOMING_CAPACITY);
        let (outgoing, mut out_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (done_tx, written) = mpsc::unbounded_channel();

        let rx_shutdown = shutdown.clone();
        thread::Builder::new()
            .name("serial-rx".into())
            .spawn(move || {
                let mut buf = [0u8; READ_CHUNK];
                while !rx_shutdown.load(Ordering::Acquire) {
                    match reader.read(&mut buf) {
                        Ok(0) => continue,
                        Ok(n) => {
                            if in_tx.blocking_send(Ok(buf[..n].to_vec())).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
                        Err(e) => {
                            let _ = in_tx.blocking_send(Err(e));
                            break;
                        }
                    }
                }
            })?;

        thread::Builder::new()
            .name("serial-tx".into())
            .spawn(move || {
                while let Some(frame) = out_rx.blocking_recv() {
                    let result = writer.write_all(&frame).and_then(|_| writer.flush());
                    if let Err(e) = &result {
                        warn!(error = %e, len = frame.len(), "serial write failed");
                    }
                    if done_tx.send(result).is_err() {
                        break;
                    }
                }
            })?;

        Ok(Self {
            incoming,
            pending: Vec::new(),
            pos: 0,
            outgoing,
            written,
            in_flight: 0,
            shutdown,
        })
    }
}

impl Drop for SerialStream {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
    }
}

impl AsyncRead for SerialStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        if this.pos >= this.pending.len() {
            match this.incoming.poll_recv(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    this.pending = chunk;
                    this.pos = 0;
                }
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Err(e)),
                // Reader thread gone: end of stream.
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Pending => return Poll::Pending,
            }
        }
        let available = &this.pending[this.pos..];
        let n = available.len().min(buf.remaining());
        buf.put_slice(&available[..n]);
        this.pos += n;
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for SerialStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.shutdown.load(Ordering::Acquire) {
            return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
        }
        match self.outgoing.send(buf.to_vec()) {
            Ok(()) => {
                self.in_flight += 1;
                Poll::Ready(Ok(buf.len()))
            }
            Err(_) => Poll::Ready(Err(io::ErrorKind::BrokenPipe.into())),
        }
    }

    /// Waits until every queued frame has reached the port. The first failed
    /// frame is returned as the error; later frames are still collected by the
    /// next flush.
    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = &mut *self;
        while this.in_flight > 0 {
            match this.written.poll_recv(cx) {
                Poll::Ready(Some(result)) => {
                    this.in_flight -= 1;
                    result?;
                }
                Poll::Ready(None) => {
                    this.in_flight = 0;
                    return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.shutdown.store(true, Ordering::Release);
        Poll::Ready(Ok(()))
    }
}
