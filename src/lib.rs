//! # Relayboard
//!
//! Driver for serial-attached relay/GPIO expansion boards:
//! - Opens the board's serial line (8-N-1, no flow control)
//! - Polls every relay channel on a fixed tick
//! - Decodes replies into a consistent status snapshot
//! - Notifies subscribers whenever a value is read or the link changes
//!
//! ## Example
//!
//! ```rust,no_run
//! use relayboard::{BoardEvent, PortConfig, RelayBoard};
//!
//! #[tokio::main]
//! async fn main() {
//!     let board = RelayBoard::new();
//!     let mut events = board.subscribe();
//!
//!     if !board.connect(PortConfig::new("/dev/ttyACM0", 115200)).await {
//!         return;
//!     }
//!
//!     while let Ok(event) = events.recv().await {
//!         if let BoardEvent::UpdateAvailable(status) = event {
//!             println!("Relays: {:?}", status.relay);
//!         }
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::config::{ConfigError, DriverSettings};
pub use crate::core::board::{BoardError, RelayBoard};
pub use crate::core::connection::{ConnectionManager, ConnectionState};
pub use crate::core::protocol::{Channel, Reply, ResponseParser, GPIO_COUNT, RELAY_COUNT};
pub use crate::core::scheduler::PollScheduler;
pub use crate::core::status::{BoardEvent, Status, StatusStore};
pub use crate::core::transport::{
    list_ports, Connector, Line, LineError, LoopbackConnector, LoopbackDevice, PortConfig,
    PortInfo, SerialConnector, DEFAULT_BAUD_RATE, DEFAULT_PORT,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
