//! Signal codec - byte <-> semantic event mapping
//!
//! The board has no framing, so value ranges double as data and opcode.
//! Control bytes are matched first, then the step range, then the
//! wrong-sequence range. Everything else is unrecognized and dropped.

use thiserror::Error;

use crate::types::{
    Move, DEFAULT_STEP_BASE, GAME_WON, REPEATING_FINISHED, RESTART_SEQUENCE, SESSION_ENDED,
    WRONG_SEQUENCE_BASE,
};

/// One decoded semantic event derived from a single wire byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    RestartSequence,
    RepeatingFinished,
    SessionEnded,
    GameWon,
    /// The player made a mistake; payload is the final score.
    WrongSequence(u8),
    /// The device appended one move to its sequence.
    SequenceStep(Move),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("step base {0:#04x} must be greater than {base:#04x}", base = WRONG_SEQUENCE_BASE)]
    InvalidStepBase(u8),
}

/// Stateless mapping between wire bytes and [`Signal`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalCodec {
    step_base: u8,
}

impl Default for SignalCodec {
    fn default() -> Self {
        Self {
            step_base: DEFAULT_STEP_BASE,
        }
    }
}

impl SignalCodec {
    pub fn new(step_base: u8) -> Result<Self, CodecError> {
        if step_base <= WRONG_SEQUENCE_BASE {
            return Err(CodecError::InvalidStepBase(step_base));
        }
        Ok(Self { step_base })
    }

    pub fn step_base(&self) -> u8 {
        self.step_base
    }

    /// Number of distinct scores a `WrongSequence` byte can carry.
    pub fn wrong_sequence_span(&self) -> u8 {
        self.step_base - WRONG_SEQUENCE_BASE
    }

    /// Decode one byte. `None` means unrecognized.
    pub fn decode(&self, byte: u8) -> Option<Signal> {
        match byte {
            SESSION_ENDED => Some(Signal::SessionEnded),
            REPEATING_FINISHED => Some(Signal::RepeatingFinished),
            RESTART_SEQUENCE => Some(Signal::RestartSequence),
            GAME_WON => Some(Signal::GameWon),
            b if b >= self.step_base => Some(Signal::SequenceStep(Move::new(b - self.step_base))),
            b if b >= WRONG_SEQUENCE_BASE => Some(Signal::WrongSequence(b - WRONG_SEQUENCE_BASE)),
            _ => None,
        }
    }

    /// Encode a signal, or `None` when its payload does not fit its range.
    pub fn encode(&self, signal: Signal) -> Option<u8> {
        match signal {
            Signal::SessionEnded => Some(SESSION_ENDED),
            Signal::RepeatingFinished => Some(REPEATING_FINISHED),
            Signal::RestartSequence => Some(RESTART_SEQUENCE),
            Signal::GameWon => Some(GAME_WON),
            Signal::WrongSequence(score) => {
                (score < self.wrong_sequence_span()).then(|| WRONG_SEQUENCE_BASE + score)
            }
            Signal::SequenceStep(mv) => self.step_base.checked_add(mv.id()),
        }
    }

    /// Player moves travel as their raw slot id.
    pub fn encode_move(&self, mv: Move) -> u8 {
        mv.id()
    }

    /// A move id the device could mistake for an opcode is not sendable.
    pub fn is_sendable(&self, mv: Move) -> bool {
        mv.id() < SESSION_ENDED
    }

    /// `RepeatingFinished` followed by the replayed moves, written as one frame.
    pub fn replay_frame(&self, moves: &[Move]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(moves.len() + 1);
        frame.push(REPEATING_FINISHED);
        frame.extend(moves.iter().map(|&mv| self.encode_move(mv)));
        frame
    }
}
