//! Drive a [`DeviceSimulator`] over any byte stream.

use simon_remote_core::DeviceSimulator;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

/// Serve one controller until it disconnects. Returns the simulator so
/// callers can inspect the final sequence.
pub async fn run_simulated_device<S>(
    mut stream: S,
    mut device: DeviceSimulator,
) -> std::io::Result<DeviceSimulator>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = [0u8; 256];
    let mut replies = Vec::new();
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            debug!("controller hung up");
            return Ok(device);
        }
        for &byte in &buf[..n] {
            device.feed(byte, &mut replies);
        }
        if !replies.is_empty() {
            trace!(bytes = ?replies, "device reply");
            stream.write_all(&replies).await?;
            stream.flush().await?;
            replies.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simon_remote_core::{Signal, SignalCodec};
    use simon_remote_types::RESTART_SEQUENCE;

    #[tokio::test]
    async fn answers_restart_with_first_step() {
        let codec = SignalCodec::default();
        let (mut controller, board) = tokio::io::duplex(64);
        let server = tokio::spawn(run_simulated_device(board, DeviceSimulator::new(codec, 7)));

        controller.write_all(&[RESTART_SEQUENCE]).await.unwrap();
        let step = controller.read_u8().await.unwrap();
        assert!(matches!(codec.decode(step), Some(Signal::SequenceStep(_))));

        drop(controller);
        let device = server.await.unwrap().unwrap();
        assert_eq!(device.sequence().len(), 1);
    }
}
