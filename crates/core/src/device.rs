//! Simulated LED/button board
//!
//! Mirrors what the board firmware does with the controller's bytes, so the
//! controller can be exercised without hardware:
//!
//! - `RestartSequence`: start a new game and show the first step
//! - `RepeatingFinished` + N move bytes: check the replay, then show the next
//!   step, report `WrongSequence(score)`, or `GameWon` after the last round
//! - `SessionEnded`: forget the current game

use crate::codec::{Signal, SignalCodec};
use crate::rng::SimpleRng;
use crate::sequence::Sequence;
use crate::types::{Move, MAX_ROUNDS, REPEATING_FINISHED, RESTART_SEQUENCE, SESSION_ENDED};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    /// A step was shown; waiting for `RepeatingFinished`.
    Showing,
    Replaying { received: usize, correct: bool },
    Finished,
}

#[derive(Debug, Clone)]
pub struct DeviceSimulator {
    codec: SignalCodec,
    rng: SimpleRng,
    sequence: Sequence,
    max_rounds: usize,
    phase: Phase,
}

impl DeviceSimulator {
    pub fn new(codec: SignalCodec, seed: u32) -> Self {
        Self {
            codec,
            rng: SimpleRng::new(seed),
            sequence: Sequence::new(),
            max_rounds: MAX_ROUNDS,
            phase: Phase::Idle,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.clamp(1, self.sequence.capacity());
        self
    }

    pub fn sequence(&self) -> &[Move] {
        self.sequence.as_slice()
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Feed one byte from the controller; replies are appended to `out`.
    pub fn feed(&mut self, byte: u8, out: &mut Vec<u8>) {
        if let Phase::Replaying { received, correct } = self.phase {
            let expected = self.sequence.get(received);
            let correct = correct && expected == Some(Move::new(byte));
            let received = received + 1;
            if received < self.sequence.len() {
                self.phase = Phase::Replaying { received, correct };
            } else if correct {
                self.round_passed(out);
            } else {
                self.game_lost(out);
            }
            return;
        }

        match byte {
            RESTART_SEQUENCE => {
                self.sequence.clear();
                self.show_next(out);
            }
            REPEATING_FINISHED if self.phase == Phase::Showing => {
                self.phase = Phase::Replaying {
                    received: 0,
                    correct: true,
                };
            }
            SESSION_ENDED => {
                self.sequence.clear();
                self.phase = Phase::Idle;
            }
            _ => {}
        }
    }

    fn show_next(&mut self, out: &mut Vec<u8>) {
        let mv = self.rng.next_slot();
        if self.sequence.push(mv).is_err() {
            self.game_won(out);
            return;
        }
        if let Some(byte) = self.codec.encode(Signal::SequenceStep(mv)) {
            out.push(byte);
        }
        self.phase = Phase::Showing;
    }

    fn round_passed(&mut self, out: &mut Vec<u8>) {
        if self.sequence.len() >= self.max_rounds {
            self.game_won(out);
        } else {
            self.show_next(out);
        }
    }

    fn game_won(&mut self, out: &mut Vec<u8>) {
        if let Some(byte) = self.codec.encode(Signal::GameWon) {
            out.push(byte);
        }
        self.phase = Phase::Finished;
    }

    fn game_lost(&mut self, out: &mut Vec<u8>) {
        // The score byte saturates at the top of its range.
        let completed = self.sequence.len().saturating_sub(1);
        let ceiling = self.codec.wrong_sequence_span() - 1;
        let score = completed.min(usize::from(ceiling)) as u8;
        if let Some(byte) = self.codec.encode(Signal::WrongSequence(score)) {
            out.push(byte);
        }
        self.phase = Phase::Finished;
    }
}
