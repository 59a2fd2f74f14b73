//! Core game logic module - pure, deterministic, and testable
//!
//! This module contains the wire codec, the game state machine and a simulated
//! board. It has **zero dependencies** on terminals, sockets, or serial ports,
//! making it:
//!
//! - **Deterministic**: the same signals always produce the same transitions
//! - **Testable**: every trigger can be driven directly from unit tests
//! - **Portable**: the same machine runs behind any transport
//!
//! # Module Structure
//!
//! - [`codec`]: single-byte opcodes to [`Signal`] events and back
//! - [`sequence`]: bounded move lists for the device sequence and the replay
//! - [`machine`]: the [`GameMachine`] transition table
//! - [`device`]: a [`DeviceSimulator`] that behaves like the board firmware
//! - [`rng`]: seeded move generation for the simulator
//!
//! # Example
//!
//! ```
//! use simon_remote_core::{GameMachine, Signal, SignalCodec};
//! use simon_remote_types::{GameState, InputMode, Move};
//!
//! let codec = SignalCodec::default();
//! let mut game = GameMachine::new(codec);
//! game.connecting();
//! game.connected();
//! game.select_mode(InputMode::ColorTap);
//!
//! // The device shows one step.
//! let step = codec.decode(0xD3).unwrap();
//! assert_eq!(step, Signal::SequenceStep(Move::new(3)));
//! game.on_signal(step).unwrap();
//! assert_eq!(*game.state(), GameState::UserInput(InputMode::ColorTap));
//!
//! // Replaying it hands the turn back to the device.
//! let out = game.submit_move(Move::new(3));
//! assert_eq!(out.frames[0], vec![0xA1, 3]);
//! assert_eq!(*game.state(), GameState::AwaitGameInput);
//! ```

pub mod codec;
pub mod device;
pub mod machine;
pub mod rng;
pub mod sequence;

pub use simon_remote_types as types;

// Re-export commonly used types for convenience
pub use codec::{CodecError, Signal, SignalCodec};
pub use device::DeviceSimulator;
pub use machine::{Frame, GameMachine, Outcome};
pub use rng::SimpleRng;
pub use sequence::{MoveList, PlayerBuffer, ProtocolError, Sequence};
