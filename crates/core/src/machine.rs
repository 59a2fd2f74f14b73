//! Game state machine - pure transitions over `GameState`
//!
//! The machine owns the device sequence, the player's replay buffer and the
//! score. Every trigger returns an [`Outcome`] describing what the caller must
//! do: publish transitions, write frames to the device, persist a new best
//! score. Triggers that are not defined for the current state are no-ops and
//! return an empty outcome.
//!
//! # Transitions
//!
//! | From | Trigger | To |
//! |------|---------|----|
//! | any | `connecting` | `Connecting` |
//! | `Connecting` | `connected` | `ConnectionSuccessful` |
//! | `Connecting` | `connect_failed` | `ConnectionError` |
//! | `ConnectionSuccessful`, `GameOver`, `GameWon` | `select_mode` | `UserInput(mode)`, `AwaitGameInput` |
//! | connected | `begin_round` | `AwaitGameInput` |
//! | `AwaitGameInput` | `SequenceStep` | `UserInput(mode)` |
//! | `UserInput` | replay complete | `AwaitGameInput` |
//! | connected | `WrongSequence(d)` | `GameOver(d)` |
//! | connected | `GameWon` | `GameWon` |
//! | connected | `abandon` | `ConnectionSuccessful` |
//! | not `Idle`/`Disconnected` | `link_lost` | `Disconnected` |

use arrayvec::ArrayVec;

use crate::codec::{Signal, SignalCodec};
use crate::sequence::{PlayerBuffer, ProtocolError, Sequence};
use crate::types::{GameState, InputMode, Move, ScoreBoard, SESSION_ENDED, RESTART_SEQUENCE};

/// Bytes written to the device as one uninterrupted message.
pub type Frame = Vec<u8>;

/// Side effects of one trigger, in the order the caller must apply them:
/// frames first, then persistence, then transitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    pub frames: ArrayVec<Frame, 2>,
    pub persist_max: Option<u32>,
    pub transitions: ArrayVec<GameState, 2>,
}

impl Outcome {
    pub fn is_noop(&self) -> bool {
        self.frames.is_empty() && self.persist_max.is_none() && self.transitions.is_empty()
    }

    fn frame(&mut self, frame: Frame) {
        let _ = self.frames.try_push(frame);
    }

    fn enter(&mut self, state: GameState) {
        let _ = self.transitions.try_push(state);
    }
}

#[derive(Debug, Clone)]
pub struct GameMachine {
    codec: SignalCodec,
    state: GameState,
    mode: InputMode,
    sequence: Sequence,
    buffer: PlayerBuffer,
    score: u32,
    /// Set by `WrongSequence`/`GameWon`; cleared by the next round reset.
    score_frozen: bool,
    stored_max: u32,
}

impl GameMachine {
    pub fn new(codec: SignalCodec) -> Self {
        Self {
            codec,
            state: GameState::Idle,
            mode: InputMode::default(),
            sequence: Sequence::new(),
            buffer: PlayerBuffer::new(),
            score: 0,
            score_frozen: false,
            stored_max: 0,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn buffer(&self) -> &PlayerBuffer {
        &self.buffer
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn stored_max(&self) -> u32 {
        self.stored_max
    }

    pub fn score_frozen(&self) -> bool {
        self.score_frozen
    }

    pub fn score_board(&self) -> ScoreBoard {
        ScoreBoard {
            score: self.score,
            max_score: self.stored_max,
        }
    }

    /// Refresh the persisted best score (read once per session start).
    pub fn set_stored_max(&mut self, max: u32) {
        self.stored_max = max;
    }

    pub fn connecting(&mut self) -> Outcome {
        let mut out = Outcome::default();
        self.reset_round();
        self.transition(&mut out, GameState::Connecting);
        out
    }

    pub fn connected(&mut self) -> Outcome {
        let mut out = Outcome::default();
        if self.state == GameState::Connecting {
            self.transition(&mut out, GameState::ConnectionSuccessful);
        }
        out
    }

    pub fn connect_failed(&mut self, message: impl Into<String>) -> Outcome {
        let mut out = Outcome::default();
        if self.state == GameState::Connecting {
            self.transition(&mut out, GameState::ConnectionError(message.into()));
        }
        out
    }

    /// The link went away. Emits `Disconnected` at most once per connection.
    pub fn link_lost(&mut self, reason: impl Into<String>) -> Outcome {
        let mut out = Outcome::default();
        if !matches!(self.state, GameState::Idle | GameState::Disconnected(_)) {
            self.transition(&mut out, GameState::Disconnected(reason.into()));
        }
        out
    }

    /// Fix the input style and start the first round.
    pub fn select_mode(&mut self, mode: InputMode) -> Outcome {
        let mut out = Outcome::default();
        if !matches!(
            self.state,
            GameState::ConnectionSuccessful | GameState::GameOver(_) | GameState::GameWon
        ) {
            return out;
        }
        self.mode = mode;
        self.transition(&mut out, GameState::UserInput(mode));
        self.restart(&mut out);
        out
    }

    /// Reset sequence, buffer and score and ask the device for a new game.
    pub fn begin_round(&mut self) -> Outcome {
        let mut out = Outcome::default();
        if self.state.is_connected() {
            self.restart(&mut out);
        }
        out
    }

    /// Leave the current game but keep the link. The device is told in every
    /// connected state, including between games.
    pub fn abandon(&mut self) -> Outcome {
        let mut out = Outcome::default();
        if !self.state.is_connected() {
            return out;
        }
        out.frame(vec![SESSION_ENDED]);
        self.reset_round();
        if self.state != GameState::ConnectionSuccessful {
            self.transition(&mut out, GameState::ConnectionSuccessful);
        }
        out
    }

    /// Buffer one player move; completes the round when the replay is as long
    /// as the sequence.
    pub fn submit_move(&mut self, mv: Move) -> Outcome {
        let mut out = Outcome::default();
        if !matches!(self.state, GameState::UserInput(_)) || !self.codec.is_sendable(mv) {
            return out;
        }
        if self.buffer.len() >= self.sequence.len() || self.buffer.push(mv).is_err() {
            return out;
        }
        if self.buffer.len() == self.sequence.len() {
            out.frame(self.codec.replay_frame(self.buffer.as_slice()));
            self.buffer.clear();
            self.transition(&mut out, GameState::AwaitGameInput);
        }
        out
    }

    /// Apply one decoded device signal.
    ///
    /// Signals arriving while no link is up are stale and ignored. An append
    /// past the sequence capacity is fatal for the connection.
    pub fn on_signal(&mut self, signal: Signal) -> Result<Outcome, ProtocolError> {
        let mut out = Outcome::default();
        if !self.state.is_connected() {
            return Ok(out);
        }

        match signal {
            Signal::SequenceStep(mv) => {
                let completed = self.sequence.len() as u32;
                self.sequence.push(mv)?;
                self.buffer.clear();
                if !self.score_frozen && completed > self.score {
                    self.score = completed;
                    self.check_best(&mut out);
                }
                if self.state == GameState::AwaitGameInput {
                    self.transition(&mut out, GameState::UserInput(self.mode));
                }
            }
            Signal::WrongSequence(final_score) => {
                if !self.score_frozen {
                    self.score = self.score.max(u32::from(final_score));
                    self.score_frozen = true;
                    self.check_best(&mut out);
                }
                self.transition(&mut out, GameState::GameOver(u32::from(final_score)));
            }
            Signal::GameWon => {
                if !self.score_frozen {
                    self.score = self.score.max(self.sequence.len() as u32);
                    self.score_frozen = true;
                    self.check_best(&mut out);
                }
                self.transition(&mut out, GameState::GameWon);
            }
            // Controller-bound opcodes echoed back by the device carry no meaning here.
            Signal::RestartSequence | Signal::RepeatingFinished | Signal::SessionEnded => {}
        }

        Ok(out)
    }

    fn restart(&mut self, out: &mut Outcome) {
        self.reset_round();
        out.frame(vec![RESTART_SEQUENCE]);
        self.transition(out, GameState::AwaitGameInput);
    }

    fn reset_round(&mut self) {
        self.sequence.clear();
        self.buffer.clear();
        self.score = 0;
        self.score_frozen = false;
    }

    fn check_best(&mut self, out: &mut Outcome) {
        if self.score > self.stored_max {
            self.stored_max = self.score;
            out.persist_max = Some(self.score);
        }
    }

    fn transition(&mut self, out: &mut Outcome, next: GameState) {
        self.state = next.clone();
        out.enter(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GAME_WON, REPEATING_FINISHED};

    fn step(id: u8) -> Signal {
        Signal::SequenceStep(Move::new(id))
    }

    fn connected_machine() -> GameMachine {
        let mut m = GameMachine::new(SignalCodec::default());
        m.connecting();
        m.connected();
        m
    }

    fn playing_machine(mode: InputMode) -> GameMachine {
        let mut m = connected_machine();
        m.select_mode(mode);
        m
    }

    #[test]
    fn test_connect_lifecycle() {
        let mut m = GameMachine::new(SignalCodec::default());
        assert_eq!(*m.state(), GameState::Idle);

        let out = m.connecting();
        assert_eq!(out.transitions.as_slice(), &[GameState::Connecting]);

        let out = m.connected();
        assert_eq!(out.transitions.as_slice(), &[GameState::ConnectionSuccessful]);

        // A second success report is stale.
        assert!(m.connected().is_noop());
    }

    #[test]
    fn test_connect_failure_is_retryable() {
        let mut m = GameMachine::new(SignalCodec::default());
        m.connecting();
        let out = m.connect_failed("timeout");
        assert_eq!(
            out.transitions.as_slice(),
            &[GameState::ConnectionError("timeout".into())]
        );
        assert!(m.state().is_retryable());

        let out = m.connecting();
        assert_eq!(out.transitions.as_slice(), &[GameState::Connecting]);
    }

    #[test]
    fn test_select_mode_starts_round() {
        let mut m = connected_machine();
        let out = m.select_mode(InputMode::Swipe);
        assert_eq!(
            out.transitions.as_slice(),
            &[GameState::UserInput(InputMode::Swipe), GameState::AwaitGameInput]
        );
        assert_eq!(out.frames.as_slice(), &[vec![RESTART_SEQUENCE]]);
        assert_eq!(m.mode(), InputMode::Swipe);
    }

    #[test]
    fn test_steps_and_replays_alternate_states() {
        let mut m = playing_machine(InputMode::ColorTap);

        let out = m.on_signal(step(2)).unwrap();
        assert_eq!(
            out.transitions.as_slice(),
            &[GameState::UserInput(InputMode::ColorTap)]
        );

        let out = m.submit_move(Move::new(2));
        assert_eq!(out.frames.as_slice(), &[vec![REPEATING_FINISHED, 2]]);
        assert_eq!(out.transitions.as_slice(), &[GameState::AwaitGameInput]);
        assert!(m.buffer().is_empty());

        let out = m.on_signal(step(4)).unwrap();
        assert_eq!(
            out.transitions.as_slice(),
            &[GameState::UserInput(InputMode::ColorTap)]
        );
        assert_eq!(m.sequence().as_slice(), &[Move::new(2), Move::new(4)]);
    }

    #[test]
    fn test_replay_needs_full_length() {
        let mut m = playing_machine(InputMode::ColorTap);
        m.on_signal(step(3)).unwrap();
        m.submit_move(Move::new(3));
        m.on_signal(step(5)).unwrap();

        let out = m.submit_move(Move::new(3));
        assert!(out.is_noop());
        assert_eq!(m.buffer().len(), 1);

        let out = m.submit_move(Move::new(5));
        assert_eq!(out.frames.as_slice(), &[vec![REPEATING_FINISHED, 3, 5]]);
        assert_eq!(*m.state(), GameState::AwaitGameInput);
    }

    #[test]
    fn test_step_outside_await_still_appends() {
        let mut m = playing_machine(InputMode::ColorTap);
        m.on_signal(step(2)).unwrap();
        assert!(matches!(m.state(), GameState::UserInput(_)));

        let out = m.on_signal(step(4)).unwrap();
        assert!(out.transitions.is_empty());
        assert_eq!(m.sequence().len(), 2);
        assert!(matches!(m.state(), GameState::UserInput(_)));
    }

    #[test]
    fn test_moves_ignored_outside_user_input() {
        let mut m = playing_machine(InputMode::ColorTap);
        assert_eq!(*m.state(), GameState::AwaitGameInput);
        assert!(m.submit_move(Move::new(2)).is_noop());
        assert!(m.buffer().is_empty());
    }

    #[test]
    fn test_opcode_valued_moves_are_rejected() {
        let mut m = playing_machine(InputMode::ColorTap);
        m.on_signal(step(2)).unwrap();
        assert!(m.submit_move(Move::new(GAME_WON)).is_noop());
        assert!(m.buffer().is_empty());
    }

    #[test]
    fn test_score_counts_completed_rounds() {
        let mut m = playing_machine(InputMode::ColorTap);
        m.on_signal(step(2)).unwrap();
        assert_eq!(m.score(), 0);
        m.submit_move(Move::new(2));
        m.on_signal(step(3)).unwrap();
        assert_eq!(m.score(), 1);
        m.submit_move(Move::new(2));
        m.submit_move(Move::new(3));
        m.on_signal(step(4)).unwrap();
        assert_eq!(m.score(), 2);
    }

    #[test]
    fn test_wrong_sequence_persists_only_new_best() {
        let mut m = playing_machine(InputMode::ColorTap);
        m.set_stored_max(5);
        let out = m.on_signal(Signal::WrongSequence(7)).unwrap();
        assert_eq!(out.persist_max, Some(7));
        assert_eq!(out.transitions.as_slice(), &[GameState::GameOver(7)]);
        assert_eq!(m.stored_max(), 7);

        let mut m = playing_machine(InputMode::ColorTap);
        m.set_stored_max(5);
        let out = m.on_signal(Signal::WrongSequence(3)).unwrap();
        assert_eq!(out.persist_max, None);
        assert_eq!(*m.state(), GameState::GameOver(3));
    }

    #[test]
    fn test_score_frozen_after_game_over() {
        let mut m = playing_machine(InputMode::ColorTap);
        for id in [2, 3, 4] {
            m.on_signal(step(id)).unwrap();
        }
        m.on_signal(Signal::WrongSequence(2)).unwrap();
        assert!(m.score_frozen());
        let frozen = m.score();

        m.on_signal(step(5)).unwrap();
        m.on_signal(step(5)).unwrap();
        m.on_signal(Signal::WrongSequence(9)).unwrap();
        assert_eq!(m.score(), frozen);
        assert_eq!(*m.state(), GameState::GameOver(9));

        m.begin_round();
        assert_eq!(m.score(), 0);
        assert!(!m.score_frozen());
        assert!(m.sequence().is_empty());
    }

    #[test]
    fn test_game_won_keeps_buffers() {
        let mut m = playing_machine(InputMode::Swipe);
        for id in [2, 3] {
            m.on_signal(step(id)).unwrap();
        }
        let out = m.on_signal(Signal::GameWon).unwrap();
        assert_eq!(out.transitions.as_slice(), &[GameState::GameWon]);
        assert_eq!(m.score(), 2);
        assert_eq!(out.persist_max, Some(2));
        assert_eq!(m.sequence().len(), 2);
    }

    #[test]
    fn test_sequence_overflow_is_fatal() {
        let mut m = playing_machine(InputMode::ColorTap);
        for _ in 0..crate::types::SEQUENCE_CAPACITY {
            m.on_signal(step(2)).unwrap();
        }
        assert_eq!(
            m.on_signal(step(2)),
            Err(ProtocolError::SequenceOverflow {
                capacity: crate::types::SEQUENCE_CAPACITY
            })
        );
        assert_eq!(m.sequence().len(), crate::types::SEQUENCE_CAPACITY);
    }

    #[test]
    fn test_abandon_keeps_link() {
        let mut m = playing_machine(InputMode::ColorTap);
        m.on_signal(step(2)).unwrap();
        let out = m.abandon();
        assert_eq!(out.frames.as_slice(), &[vec![SESSION_ENDED]]);
        assert_eq!(out.transitions.as_slice(), &[GameState::ConnectionSuccessful]);
        assert!(m.sequence().is_empty());
    }

    #[test]
    fn test_abandon_between_games_still_tells_device() {
        let mut m = GameMachine::new(SignalCodec::default());
        m.connecting();
        m.connected();
        let out = m.abandon();
        assert_eq!(out.frames.as_slice(), &[vec![SESSION_ENDED]]);
        assert!(out.transitions.is_empty());
        assert_eq!(*m.state(), GameState::ConnectionSuccessful);

        let mut idle = GameMachine::new(SignalCodec::default());
        assert!(idle.abandon().is_noop());
    }

    #[test]
    fn test_link_lost_emits_once() {
        let mut m = playing_machine(InputMode::ColorTap);
        let out = m.link_lost("stream closed by remote");
        assert_eq!(
            out.transitions.as_slice(),
            &[GameState::Disconnected("stream closed by remote".into())]
        );
        assert!(m.link_lost("again").is_noop());
        assert!(m.on_signal(step(2)).unwrap().is_noop());
    }

    #[test]
    fn test_echoed_control_signals_are_noops() {
        let mut m = playing_machine(InputMode::ColorTap);
        for signal in [
            Signal::RestartSequence,
            Signal::RepeatingFinished,
            Signal::SessionEnded,
        ] {
            assert!(m.on_signal(signal).unwrap().is_noop());
        }
        assert_eq!(*m.state(), GameState::AwaitGameInput);
    }

    #[derive(Clone, Copy, Debug)]
    enum Trigger {
        Connecting,
        Connected,
        ConnectFailed,
        LinkLost,
        SelectMode,
        BeginRound,
        Abandon,
        Move,
        Step,
        Wrong,
        Won,
        Echo,
    }

    const TRIGGERS: [Trigger; 12] = [
        Trigger::Connecting,
        Trigger::Connected,
        Trigger::ConnectFailed,
        Trigger::LinkLost,
        Trigger::SelectMode,
        Trigger::BeginRound,
        Trigger::Abandon,
        Trigger::Move,
        Trigger::Step,
        Trigger::Wrong,
        Trigger::Won,
        Trigger::Echo,
    ];

    fn fire(m: &mut GameMachine, trigger: Trigger) -> Outcome {
        match trigger {
            Trigger::Connecting => m.connecting(),
            Trigger::Connected => m.connected(),
            Trigger::ConnectFailed => m.connect_failed("refused"),
            Trigger::LinkLost => m.link_lost("gone"),
            Trigger::SelectMode => m.select_mode(InputMode::Swipe),
            Trigger::BeginRound => m.begin_round(),
            Trigger::Abandon => m.abandon(),
            Trigger::Move => m.submit_move(Move::new(2)),
            Trigger::Step => m.on_signal(step(2)).unwrap(),
            Trigger::Wrong => m.on_signal(Signal::WrongSequence(1)).unwrap(),
            Trigger::Won => m.on_signal(Signal::GameWon).unwrap(),
            Trigger::Echo => m.on_signal(Signal::RestartSequence).unwrap(),
        }
    }

    fn reachable_machines() -> Vec<GameMachine> {
        let paths: &[&[Trigger]] = &[
            &[],
            &[Trigger::Connecting],
            &[Trigger::Connecting, Trigger::Connected],
            &[Trigger::Connecting, Trigger::ConnectFailed],
            &[Trigger::Connecting, Trigger::Connected, Trigger::SelectMode],
            &[Trigger::Connecting, Trigger::Connected, Trigger::SelectMode, Trigger::Step],
            &[Trigger::Connecting, Trigger::Connected, Trigger::SelectMode, Trigger::Wrong],
            &[Trigger::Connecting, Trigger::Connected, Trigger::SelectMode, Trigger::Won],
            &[Trigger::Connecting, Trigger::Connected, Trigger::LinkLost],
        ];
        paths
            .iter()
            .map(|path| {
                let mut m = GameMachine::new(SignalCodec::default());
                for &t in path.iter() {
                    fire(&mut m, t);
                }
                m
            })
            .collect()
    }

    #[test]
    fn test_every_trigger_is_defined_in_every_state() {
        for machine in reachable_machines() {
            for trigger in TRIGGERS {
                let mut m = machine.clone();
                let before = m.state().clone();
                let out = fire(&mut m, trigger);
                match out.transitions.last() {
                    Some(last) => assert_eq!(last, m.state(), "{before:?} + {trigger:?}"),
                    None => assert_eq!(&before, m.state(), "{before:?} + {trigger:?}"),
                }
                if !before.is_connected() {
                    assert!(out.frames.is_empty(), "{before:?} + {trigger:?} wrote a frame");
                }
            }
        }
    }
}
