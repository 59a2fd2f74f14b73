//! Terminal Simon Says controller (default binary).
//!
//! Connects to the board, shows the session state, and turns key presses into
//! moves. Configuration comes from `SIMON_*` environment variables; set
//! `SIMON_LOG` to get tracing output on stderr.

use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyEvent};
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use simon_remote::input::{map_key, PlayerInput};
use simon_remote::link::{SerialTransport, TcpTransport, Transport};
use simon_remote::session::{JsonFileScoreStore, ScoreStore, Session, SessionConfig};
use simon_remote::status::{StatusRenderer, StatusView};
use simon_remote::types::GameState;

const KEY_POLL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::var_os("SIMON_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    let config = SessionConfig::from_env();
    let store = JsonFileScoreStore::new(
        std::env::var("SIMON_SCORE_PATH").unwrap_or_else(|_| "simon-score.json".to_string()),
    );
    let transport = std::env::var("SIMON_TRANSPORT").unwrap_or_else(|_| "serial".to_string());
    let baud = std::env::var("SIMON_BAUD")
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(9600);

    let mut term = StatusRenderer::new();
    term.enter()?;

    let result = match transport.trim().to_lowercase().as_str() {
        "tcp" => run(&mut term, config, TcpTransport::new(), store).await,
        _ => run(&mut term, config, SerialTransport::new(baud), store).await,
    };

    // Always try to restore terminal state.
    let _ = term.exit();
    result
}

async fn run<T: Transport, St: ScoreStore>(
    term: &mut StatusRenderer,
    config: SessionConfig,
    transport: T,
    store: St,
) -> Result<()> {
    let mut view = StatusView::new(config.device.clone());
    let session = Session::spawn(config, transport, store)?;
    let mut states = session.subscribe();
    let mut scores = session.subscribe_scores();
    let mut keys = spawn_key_reader()?;

    session.start()?;
    view.scores = session.scores();
    term.draw(&view)?;

    loop {
        tokio::select! {
            key = keys.recv() => {
                let Some(key) = key else { break };
                let Some(input) = map_key(key, view.mode) else { continue };
                let sent = match input {
                    PlayerInput::Quit => break,
                    PlayerInput::Move(mv) => session.submit_move(mv),
                    PlayerInput::SelectMode(mode) => {
                        if matches!(
                            view.state,
                            GameState::ConnectionSuccessful | GameState::GameOver(_) | GameState::GameWon
                        ) {
                            view.mode = mode;
                        }
                        session.select_mode(mode)
                    }
                    PlayerInput::NewGame => session.begin_round(),
                    PlayerInput::Abandon => session.abandon_game(),
                    PlayerInput::Retry => session.retry_connection(),
                };
                if let Err(e) = sent {
                    warn!(error = %e, ?input, "input dropped");
                }
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                view.state = states.borrow_and_update().clone();
                if let GameState::UserInput(mode) = view.state {
                    view.mode = mode;
                }
            }
            changed = scores.changed() => {
                if changed.is_err() {
                    break;
                }
                view.scores = *scores.borrow_and_update();
            }
        }
        term.draw(&view)?;
    }

    session.shutdown().await;
    Ok(())
}

/// Terminal events are read on a plain thread; crossterm's reader blocks.
fn spawn_key_reader() -> Result<mpsc::Receiver<KeyEvent>> {
    let (tx, rx) = mpsc::channel(32);
    std::thread::Builder::new()
        .name("keys".into())
        .spawn(move || loop {
            match event::poll(KEY_POLL) {
                Ok(true) => match event::read() {
                    Ok(Event::Key(key)) => {
                        if tx.blocking_send(key).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(_) => break,
                },
                Ok(false) => {
                    if tx.is_closed() {
                        break;
                    }
                }
                Err(_) => break,
            }
        })?;
    Ok(rx)
}
