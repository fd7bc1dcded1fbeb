//! Transport layer for the board's serial link
//!
//! Supports:
//! - Serial ports (USB CDC-ACM, USB-Serial adapters)
//! - In-memory loopback lines for simulation and testing

mod loopback;
mod serial;

pub use loopback::{LoopbackConnector, LoopbackDevice};
pub use serial::{list_ports, PortConfig, PortInfo, SerialConnector, DEFAULT_BAUD_RATE, DEFAULT_PORT};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Transport error types
#[derive(Error, Debug)]
pub enum LineError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A bidirectional byte line to the board.
///
/// Anything that can be read from and written to asynchronously qualifies:
/// a `tokio_serial::SerialStream` in production, a `tokio::io::DuplexStream`
/// under simulation.
pub trait Line: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> Line for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Opens lines for a port configuration
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a line using an already-resolved configuration
    async fn open(&self, config: &PortConfig) -> Result<Box<dyn Line>, LineError>;
}
