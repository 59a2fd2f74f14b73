//! Core types module - shared data structures and wire constants
//!
//! This module defines the fundamental types used throughout the controller.
//! All types are pure data structures with no external dependencies, making them
//! usable in any context (state machine, link plumbing, terminal front-end).
//!
//! # Wire Constants
//!
//! The board speaks single-byte opcodes with no framing:
//!
//! | Constant | Value | Direction |
//! |----------|-------|-----------|
//! | `SESSION_ENDED` | 0xA0 | controller → device |
//! | `REPEATING_FINISHED` | 0xA1 | controller → device |
//! | `RESTART_SEQUENCE` | 0xA2 | controller → device |
//! | `GAME_WON` | 0xA3 | device → controller |
//! | `WRONG_SEQUENCE_BASE` | 0xC0 | device → controller |
//! | `DEFAULT_STEP_BASE` | 0xD0 | device → controller |
//!
//! # Move Slots
//!
//! Colour taps and swipe gestures share the same four slot ids:
//!
//! | Slot | Colour | Swipe |
//! |------|--------|-------|
//! | 2 | green | up |
//! | 3 | yellow | right |
//! | 4 | red | down |
//! | 5 | blue | left |
//!
//! # Examples
//!
//! ```
//! use simon_remote_types::{Color, InputMode, Move, Swipe};
//!
//! assert_eq!(Move::from(Color::Red), Move::new(4));
//! assert_eq!(Move::from(Swipe::Left), Move::from(Color::Blue));
//! assert_eq!(InputMode::from_str("swipe"), Some(InputMode::Swipe));
//! ```

use std::fmt;

/// Terminate the round / close the session.
pub const SESSION_ENDED: u8 = 0xA0;

/// The player finished replaying the shown sequence.
pub const REPEATING_FINISHED: u8 = 0xA1;

/// Start a new game.
pub const RESTART_SEQUENCE: u8 = 0xA2;

/// The player reached the maximum round count.
pub const GAME_WON: u8 = 0xA3;

/// First byte of the wrong-sequence range; `byte - base` is the final score.
pub const WRONG_SEQUENCE_BASE: u8 = 0xC0;

/// Default first byte of the sequence-step range; `byte - base` is the move id.
pub const DEFAULT_STEP_BASE: u8 = 0xD0;

/// Maximum number of moves a sequence (and a replay buffer) can hold.
pub const SEQUENCE_CAPACITY: usize = 500;

/// Round count at which the stock board firmware declares the game won.
pub const MAX_ROUNDS: usize = 25;

/// Default hardware address of the paired board.
pub const DEFAULT_DEVICE_ADDRESS: &str = "00:13:EF:00:17:27";

/// Default connect timeout in milliseconds.
pub const CONNECT_TIMEOUT_MS: u64 = 5000;


/// A single UI/action slot, one byte wide on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Move(u8);

impl Move {
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    pub const fn id(self) -> u8 {
        self.0
    }

    /// Whether this id is one of the four slots the player can produce.
    pub fn is_player_slot(self) -> bool {
        (2..=5).contains(&self.0)
    }
}

impl From<u8> for Move {
    fn from(id: u8) -> Self {
        Self(id)
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four tappable colours of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Green,
    Yellow,
    Red,
    Blue,
}

impl Color {
    pub const ALL: [Color; 4] = [Color::Green, Color::Yellow, Color::Red, Color::Blue];

    pub fn as_str(self) -> &'static str {
        match self {
            Color::Green => "green",
            Color::Yellow => "yellow",
            Color::Red => "red",
            Color::Blue => "blue",
        }
    }
}

impl From<Color> for Move {
    fn from(color: Color) -> Self {
        match color {
            Color::Green => Move(2),
            Color::Yellow => Move(3),
            Color::Red => Move(4),
            Color::Blue => Move(5),
        }
    }
}

/// Swipe directions, reduced to the same slot ids as the colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Swipe {
    Up,
    Right,
    Down,
    Left,
}

impl Swipe {
    pub fn as_str(self) -> &'static str {
        match self {
            Swipe::Up => "up",
            Swipe::Right => "right",
            Swipe::Down => "down",
            Swipe::Left => "left",
        }
    }
}

impl From<Swipe> for Move {
    fn from(swipe: Swipe) -> Self {
        match swipe {
            Swipe::Up => Move(2),
            Swipe::Right => Move(3),
            Swipe::Down => Move(4),
            Swipe::Left => Move(5),
        }
    }
}

/// How the player enters moves for the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InputMode {
    /// Tap one of the four coloured buttons.
    #[default]
    ColorTap,
    /// Swipe in one of four directions.
    Swipe,
}

impl InputMode {
    /// Parse an input mode from string (case-insensitive)
    ///
    /// # Examples
    ///
    /// ```
    /// use simon_remote_types::InputMode;
    ///
    /// assert_eq!(InputMode::from_str("colors"), Some(InputMode::ColorTap));
    /// assert_eq!(InputMode::from_str("Swipe"), Some(InputMode::Swipe));
    /// assert_eq!(InputMode::from_str("voice"), None);
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "color" | "colors" | "colortap" | "tap" => Some(InputMode::ColorTap),
            "swipe" | "swipes" | "gesture" => Some(InputMode::Swipe),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InputMode::ColorTap => "colors",
            InputMode::Swipe => "swipe",
        }
    }
}

/// The single current state of a game session.
///
/// Transitions are owned by the state machine; observers only ever see values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum GameState {
    /// Session created but not started yet.
    #[default]
    Idle,
    Connecting,
    ConnectionSuccessful,
    ConnectionError(String),
    /// Waiting for the device to show the next step.
    AwaitGameInput,
    /// The player is replaying the sequence.
    UserInput(InputMode),
    GameOver(u32),
    GameWon,
    Disconnected(String),
}

impl GameState {
    /// States in which a live link exists.
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            GameState::ConnectionSuccessful
                | GameState::AwaitGameInput
                | GameState::UserInput(_)
                | GameState::GameOver(_)
                | GameState::GameWon
        )
    }

    /// States from which `retry_connection` starts a fresh attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GameState::Idle | GameState::ConnectionError(_) | GameState::Disconnected(_)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            GameState::Idle => "idle",
            GameState::Connecting => "connecting",
            GameState::ConnectionSuccessful => "connectionSuccessful",
            GameState::ConnectionError(_) => "connectionError",
            GameState::AwaitGameInput => "awaitGameInput",
            GameState::UserInput(_) => "userInput",
            GameState::GameOver(_) => "gameOver",
            GameState::GameWon => "gameWon",
            GameState::Disconnected(_) => "disconnected",
        }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameState::ConnectionError(msg) => write!(f, "connection error ({msg})"),
            GameState::Disconnected(reason) => write!(f, "disconnected ({reason})"),
            GameState::UserInput(mode) => write!(f, "your turn ({})", mode.as_str()),
            GameState::GameOver(score) => write!(f, "game over, score {score}"),
            other => f.write_str(other.name()),
        }
    }
}

/// Current and best score, published next to the game state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScoreBoard {
    pub score: u32,
    pub max_score: u32,
}
