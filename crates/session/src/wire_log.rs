//! Append-only JSON-lines record of every byte frame on the link.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Rx,
    Tx,
}

#[derive(Debug, Clone, Serialize)]
pub struct WireRecord {
    pub dir: Direction,
    pub ts: u64,
    pub bytes: Vec<u8>,
}

/// Cheap, cloneable sender side. Records are dropped silently once the
/// writer task has stopped.
#[derive(Debug, Clone)]
pub struct WireLog {
    tx: mpsc::UnboundedSender<WireRecord>,
}

impl WireLog {
    /// Spawn the writer task appending to `path`.
    pub fn spawn(path: String) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<WireRecord>();
        let task = tokio::spawn(async move {
            let mut file = match OpenOptions::new().create(true).append(true).open(&path).await {
                Ok(f) => f,
                Err(e) => {
                    warn!(%path, error = %e, "wire log disabled");
                    return;
                }
            };

            let mut buf: Vec<u8> = Vec::with_capacity(256);
            while let Some(rec) = rx.recv().await {
                buf.clear();
                if serde_json::to_writer(&mut buf, &rec).is_err() {
                    continue;
                }
                buf.push(b'\n');
                if file.write_all(&buf).await.is_err() || file.flush().await.is_err() {
                    break;
                }
            }

            let _ = file.flush().await;
        });
        (Self { tx }, task)
    }

    pub fn rx(&self, bytes: &[u8]) {
        self.record(Direction::Rx, bytes);
    }

    pub fn tx(&self, bytes: &[u8]) {
        self.record(Direction::Tx, bytes);
    }

    fn record(&self, dir: Direction, bytes: &[u8]) {
        let _ = self.tx.send(WireRecord {
            dir,
            ts: current_timestamp_ms(),
            bytes: bytes.to_vec(),
        });
    }
}

fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
