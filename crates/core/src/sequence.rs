//! Bounded move lists for the device sequence and the player's replay.

use arrayvec::ArrayVec;
use thiserror::Error;

use crate::types::{Move, SEQUENCE_CAPACITY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("sequence overflow: capacity {capacity} exceeded")]
    SequenceOverflow { capacity: usize },
}

/// Append-only list of moves with a fixed capacity (no heap).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveList {
    moves: ArrayVec<Move, SEQUENCE_CAPACITY>,
}

/// The device-authoritative move list for the current game.
pub type Sequence = MoveList;

/// The moves the player has replayed so far in the current round.
pub type PlayerBuffer = MoveList;

impl MoveList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.moves.is_full()
    }

    pub fn capacity(&self) -> usize {
        SEQUENCE_CAPACITY
    }

    /// Append a move. Past capacity this is a protocol error; nothing is truncated.
    pub fn push(&mut self, mv: Move) -> Result<(), ProtocolError> {
        self.moves
            .try_push(mv)
            .map_err(|_| ProtocolError::SequenceOverflow {
                capacity: SEQUENCE_CAPACITY,
            })
    }

    pub fn clear(&mut self) {
        self.moves.clear();
    }

    pub fn as_slice(&self) -> &[Move] {
        &self.moves
    }

    pub fn get(&self, index: usize) -> Option<Move> {
        self.moves.get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_until_capacity_then_reject() {
        let mut seq = Sequence::new();
        for i in 0..SEQUENCE_CAPACITY {
            assert!(seq.push(Move::new((i % 4) as u8 + 2)).is_ok());
        }
        assert!(seq.is_full());
        assert_eq!(
            seq.push(Move::new(2)),
            Err(ProtocolError::SequenceOverflow {
                capacity: SEQUENCE_CAPACITY
            })
        );
        assert_eq!(seq.len(), SEQUENCE_CAPACITY);
    }

    #[test]
    fn clear_resets_length() {
        let mut seq = Sequence::new();
        seq.push(Move::new(3)).unwrap();
        seq.push(Move::new(4)).unwrap();
        assert_eq!(seq.as_slice(), &[Move::new(3), Move::new(4)]);
        seq.clear();
        assert!(seq.is_empty());
        assert_eq!(seq.get(0), None);
    }
}
