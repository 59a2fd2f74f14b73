//! Simulated Simon Says board served over TCP.
//!
//! Each accepted connection gets its own board. Point the controller at it
//! with `SIMON_TRANSPORT=tcp SIMON_DEVICE=127.0.0.1:7878`.
//!
//! Environment:
//! - `SIMON_SIM_ADDR`: listen address (default `127.0.0.1:7878`)
//! - `SIMON_SIM_SEED`: first board seed (default: derived from the clock)
//! - `SIMON_SIM_ROUNDS`: rounds until `GameWon` (default 25)
//! - `SIMON_STEP_BASE`: step opcode base, as for the controller

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use simon_remote::core::DeviceSimulator;
use simon_remote::link::run_simulated_device;
use simon_remote::session::SessionConfig;
use simon_remote::types::MAX_ROUNDS;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let addr = std::env::var("SIMON_SIM_ADDR").unwrap_or_else(|_| "127.0.0.1:7878".to_string());
    let mut seed = std::env::var("SIMON_SIM_SEED")
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or_else(clock_seed);
    let rounds = std::env::var("SIMON_SIM_ROUNDS")
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(MAX_ROUNDS);
    let codec = SessionConfig::from_env()
        .codec()
        .context("invalid SIMON_STEP_BASE")?;

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(addr = %listener.local_addr()?, rounds, "simulated board listening");

    loop {
        let (socket, peer) = listener.accept().await?;
        socket.set_nodelay(true)?;
        let board = DeviceSimulator::new(codec, seed).with_max_rounds(rounds);
        info!(%peer, seed, "controller connected");
        seed = seed.wrapping_add(1);

        tokio::spawn(async move {
            match run_simulated_device(socket, board).await {
                Ok(board) => info!(%peer, rounds = board.sequence().len(), "controller left"),
                Err(e) => warn!(%peer, error = %e, "connection failed"),
            }
        });
    }
}

fn clock_seed() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() ^ d.as_secs() as u32)
        .unwrap_or(1)
}
