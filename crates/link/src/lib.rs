//! Byte link to the Simon Says board.
//!
//! - [`transport`]: the [`Transport`] seam plus [`discover`] and [`connect`]
//! - [`connection`]: an opened [`Connection`], split into reader and writer
//! - [`serial`]: Bluetooth SPP / USB serial ports
//! - [`tcp`]: TCP, for the simulated board
//! - [`sim`]: serve a [`DeviceSimulator`](simon_remote_core::DeviceSimulator) over a stream

pub mod connection;
pub mod error;
pub mod serial;
pub mod sim;
pub mod tcp;
pub mod transport;

pub use connection::{CloseHandle, Connection, LinkReader, LinkWriter};
pub use error::LinkError;
pub use serial::{SerialDevice, SerialStream, SerialTransport};
pub use sim::run_simulated_device;
pub use tcp::TcpTransport;
pub use transport::{connect, discover, Backoff, Transport, MIN_BACKOFF};
