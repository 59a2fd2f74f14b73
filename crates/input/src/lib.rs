//! Terminal input module.
//!
//! Maps `crossterm` key events into [`PlayerInput`]. Which keys count as a
//! move depends on the session's [`InputMode`](crate::types::InputMode):
//! digits tap colours, arrows and `wasd` swipe.

pub mod map;

pub use simon_remote_types as types;

pub use map::{map_key, should_quit, PlayerInput};
