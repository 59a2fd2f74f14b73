//! Transport seam, discovery, and connect-with-timeout.

use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::error::LinkError;

/// Something that can find the paired board and open a byte stream to it.
pub trait Transport: Send + Sync + 'static {
    type Device: Clone + fmt::Display + Send + Sync + 'static;
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// One look at the already-paired devices. `Ok(None)` means "not yet".
    fn find_paired(
        &self,
        identity: &str,
    ) -> impl Future<Output = io::Result<Option<Self::Device>>> + Send;

    /// Blocking handshake with the device.
    fn open(&self, device: &Self::Device) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Floor for every discovery delay, so a zero setting never spins.
pub const MIN_BACKOFF: Duration = Duration::from_millis(1);

/// Bounded exponential backoff between discovery polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(2),
        }
    }
}

impl Backoff {
    fn first(&self) -> Duration {
        self.initial.max(MIN_BACKOFF)
    }

    fn next(&self, current: Duration) -> Duration {
        current
            .saturating_mul(2)
            .min(self.max)
            .max(self.initial)
            .max(MIN_BACKOFF)
    }
}

/// Poll the paired-device list until `identity` shows up.
///
/// There is no upper bound on the wait; cancel by dropping the future.
pub async fn discover<T: Transport>(
    transport: &T,
    identity: &str,
    backoff: Backoff,
) -> Result<T::Device, LinkError> {
    let mut delay = backoff.first();
    let mut polls: u32 = 0;
    loop {
        polls += 1;
        match transport.find_paired(identity).await {
            Ok(Some(device)) => {
                info!(%device, polls, "paired device found");
                return Ok(device);
            }
            Ok(None) => {
                debug!(identity, polls, ?delay, "device not paired yet");
            }
            Err(e) => {
                warn!(identity, error = %e, "device listing failed");
                return Err(LinkError::Discovery(e));
            }
        }
        tokio::time::sleep(delay).await;
        delay = backoff.next(delay);
    }
}

/// Open `device`, racing the handshake against `timeout`.
///
/// A handshake that completes at or after the deadline counts as a timeout;
/// the late stream is dropped. On every failure path the partially opened
/// stream is discarded.
pub async fn connect<T: Transport>(
    transport: &T,
    device: &T::Device,
    timeout: Duration,
) -> Result<Connection<T::Stream>, LinkError> {
    let deadline = Instant::now() + timeout;
    debug!(%device, ?timeout, "connecting");

    tokio::select! {
        biased;
        _ = tokio::time::sleep_until(deadline) => {
            warn!(%device, ?timeout, "connect timed out");
            Err(LinkError::ConnectTimeout(timeout))
        }
        opened = transport.open(device) => {
            let stream = opened.map_err(|e| {
                warn!(%device, error = %e, "connect failed");
                LinkError::ConnectFailed(e)
            })?;
            if Instant::now() >= deadline {
                warn!(%device, ?timeout, "connect finished at the deadline");
                return Err(LinkError::ConnectTimeout(timeout));
            }
            info!(%device, "connected");
            Ok(Connection::new(device.to_string(), stream))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::io::DuplexStream;

    /// Becomes visible after `hidden_polls` polls; handshake takes `delay`.
    struct FakeTransport {
        hidden_polls: u32,
        polls: Arc<AtomicU32>,
        delay: Duration,
        refuse: bool,
    }

    impl FakeTransport {
        fn new(hidden_polls: u32, delay: Duration) -> Self {
            Self {
                hidden_polls,
                polls: Arc::new(AtomicU32::new(0)),
                delay,
                refuse: false,
            }
        }
    }

    impl Transport for FakeTransport {
        type Device = String;
        type Stream = DuplexStream;

        async fn find_paired(&self, identity: &str) -> io::Result<Option<String>> {
            let seen = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok((seen > self.hidden_polls).then(|| identity.to_string()))
        }

        async fn open(&self, _device: &String) -> io::Result<DuplexStream> {
            tokio::time::sleep(self.delay).await;
            if self.refuse {
                return Err(io::Error::from(io::ErrorKind::ConnectionRefused));
            }
            let (near, _far) = tokio::io::duplex(8);
            Ok(near)
        }
    }

    #[test]
    fn backoff_doubles_up_to_max() {
        let backoff = Backoff {
            initial: Duration::from_millis(100),
            max: Duration::from_millis(350),
        };
        assert_eq!(backoff.next(Duration::from_millis(100)), Duration::from_millis(200));
        assert_eq!(backoff.next(Duration::from_millis(200)), Duration::from_millis(350));
        assert_eq!(backoff.next(Duration::from_millis(350)), Duration::from_millis(350));
    }

    #[test]
    fn zero_backoff_still_waits() {
        let backoff = Backoff {
            initial: Duration::ZERO,
            max: Duration::ZERO,
        };
        assert_eq!(backoff.first(), MIN_BACKOFF);
        assert_eq!(backoff.next(Duration::ZERO), MIN_BACKOFF);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_backoff_discovery_does_not_spin() {
        let transport = FakeTransport::new(u32::MAX, Duration::ZERO);
        let backoff = Backoff {
            initial: Duration::ZERO,
            max: Duration::ZERO,
        };
        let result = tokio::time::timeout(
            Duration::from_millis(50),
            discover(&transport, "missing", backoff),
        )
        .await;
        assert!(result.is_err());
        assert!(transport.polls.load(Ordering::SeqCst) <= 51);
    }

    #[tokio::test(start_paused = true)]
    async fn discover_polls_until_paired() {
        let transport = FakeTransport::new(3, Duration::ZERO);
        let device = discover(&transport, "00:13:EF:00:17:27", Backoff::default())
            .await
            .unwrap();
        assert_eq!(device, "00:13:EF:00:17:27");
        assert_eq!(transport.polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn discover_is_cancellable() {
        let transport = FakeTransport::new(u32::MAX, Duration::ZERO);
        let result = tokio::time::timeout(
            Duration::from_secs(30),
            discover(&transport, "missing", Backoff::default()),
        )
        .await;
        assert!(result.is_err());
        // Backoff caps the poll rate.
        assert!(transport.polls.load(Ordering::SeqCst) < 30);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_just_before_deadline_succeeds() {
        let transport = FakeTransport::new(0, Duration::from_millis(4999));
        let conn = connect(&transport, &"board".to_string(), Duration::from_millis(5000)).await;
        assert!(conn.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn connect_at_deadline_times_out() {
        let transport = FakeTransport::new(0, Duration::from_millis(5000));
        let err = connect(&transport, &"board".to_string(), Duration::from_millis(5000))
            .await
            .err()
            .unwrap();
        assert!(err.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn connect_after_deadline_times_out() {
        let transport = FakeTransport::new(0, Duration::from_millis(5001));
        let err = connect(&transport, &"board".to_string(), Duration::from_millis(5000))
            .await
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "timeout");
    }

    #[tokio::test(start_paused = true)]
    async fn refused_connect_reports_cause() {
        let mut transport = FakeTransport::new(0, Duration::from_millis(10));
        transport.refuse = true;
        let err = connect(&transport, &"board".to_string(), Duration::from_secs(5))
            .await
            .err()
            .unwrap();
        assert!(err.is_refused());
    }
}
