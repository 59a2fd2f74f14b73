//! Simon Says remote (workspace facade crate).
//!
//! Re-exports the member crates as `simon_remote::{core, input, link, session, types}`
//! and hosts the terminal status view shared by the binaries.

pub mod status;

pub use simon_remote_core as core;
pub use simon_remote_input as input;
pub use simon_remote_link as link;
pub use simon_remote_session as session;
pub use simon_remote_types as types;
