//! Status screen for the terminal controller.
//!
//! The view is a handful of text lines built from the latest published state
//! and score; [`StatusRenderer`] redraws them in place on the alternate screen.

use std::io::{self, Write};

use anyhow::Result;
use crossterm::{
    cursor,
    style::{Attribute, Print, ResetColor, SetAttribute},
    terminal, QueueableCommand,
};

use crate::types::{GameState, InputMode, ScoreBoard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusView {
    pub device: String,
    pub state: GameState,
    pub scores: ScoreBoard,
    pub mode: InputMode,
}

impl StatusView {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            state: GameState::Idle,
            scores: ScoreBoard::default(),
            mode: InputMode::default(),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("Simon Says remote  [{}]", self.device),
            String::new(),
            format!("State: {}", self.state),
            format!("Score: {}   Best: {}", self.scores.score, self.scores.max_score),
            format!("Input: {}", self.mode.as_str()),
            String::new(),
            hint(&self.state).to_string(),
            "n new game  x leave game  r retry  q quit".to_string(),
        ]
    }
}

fn hint(state: &GameState) -> &'static str {
    match state {
        GameState::Idle => "press r to connect",
        GameState::Connecting => "looking for the board...",
        GameState::ConnectionSuccessful => "press c for colours or g for gestures",
        GameState::ConnectionError(_) | GameState::Disconnected(_) => "press r to retry",
        GameState::AwaitGameInput => "watch the board",
        GameState::UserInput(InputMode::ColorTap) => "repeat: 1 green  2 yellow  3 red  4 blue",
        GameState::UserInput(InputMode::Swipe) => "repeat with the arrows or w a s d",
        GameState::GameOver(_) => "c / g to play again",
        GameState::GameWon => "you won! c / g to play again",
    }
}

pub struct StatusRenderer {
    stdout: io::Stdout,
    buf: Vec<u8>,
}

impl Default for StatusRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusRenderer {
    pub fn new() -> Self {
        Self {
            stdout: io::stdout(),
            buf: Vec::with_capacity(4 * 1024),
        }
    }

    pub fn enter(&mut self) -> Result<()> {
        terminal::enable_raw_mode()?;
        self.buf.clear();
        self.buf.queue(terminal::EnterAlternateScreen)?;
        self.buf.queue(cursor::Hide)?;
        self.flush_buf()
    }

    pub fn exit(&mut self) -> Result<()> {
        self.buf.clear();
        self.buf.queue(ResetColor)?;
        self.buf.queue(SetAttribute(Attribute::Reset))?;
        self.buf.queue(cursor::Show)?;
        self.buf.queue(terminal::LeaveAlternateScreen)?;
        self.flush_buf()?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    pub fn draw(&mut self, view: &StatusView) -> Result<()> {
        self.buf.clear();
        encode_into(view, &mut self.buf)?;
        self.flush_buf()
    }

    fn flush_buf(&mut self) -> Result<()> {
        self.stdout.write_all(&self.buf)?;
        self.stdout.flush()?;
        Ok(())
    }
}

/// Encode a full redraw of `view` into `out` without touching stdout.
pub fn encode_into(view: &StatusView, out: &mut Vec<u8>) -> Result<()> {
    out.queue(terminal::Clear(terminal::ClearType::All))?;
    for (row, line) in view.lines().iter().enumerate() {
        out.queue(cursor::MoveTo(0, row as u16))?;
        if row == 0 {
            out.queue(SetAttribute(Attribute::Bold))?;
            out.queue(Print(line))?;
            out.queue(SetAttribute(Attribute::Reset))?;
        } else {
            out.queue(Print(line))?;
        }
    }
    Ok(())
}
