//! Simon Says session control.
//!
//! [`Session::spawn`] starts the task that owns the game machine and the
//! link to the board; the returned [`Session`] is the only way in.
//!
//! ```no_run
//! use simon_remote_link::TcpTransport;
//! use simon_remote_session::{MemoryScoreStore, Session, SessionConfig};
//! use simon_remote_types::{Color, GameState};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = SessionConfig {
//!     device: "127.0.0.1:7878".into(),
//!     ..SessionConfig::default()
//! };
//! let session = Session::spawn(config, TcpTransport::new(), MemoryScoreStore::new())?;
//! let mut states = session.subscribe();
//! session.start()?;
//! states.wait_for(|s| *s == GameState::ConnectionSuccessful).await?;
//! session.submit_move(Color::Green)?;
//! session.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod session;
pub mod store;
pub mod wire_log;

pub use config::SessionConfig;
pub use session::{Session, SessionCommand, SessionError};
pub use store::{JsonFileScoreStore, MemoryScoreStore, ScoreStore};
pub use wire_log::{Direction, WireLog, WireRecord};
