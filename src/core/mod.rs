//! Core module containing the board driver
//!
//! This module provides:
//! - Transport layer for the serial link (real ports and in-memory loopback)
//! - Board command language and reply decoding
//! - Poll scheduling across relay (and optionally GPIO) channels
//! - Status snapshot store with change notifications
//! - Connection management running the single dispatch loop
//! - The public `RelayBoard` handle

pub mod board;
pub mod connection;
pub mod protocol;
pub mod scheduler;
pub mod status;
pub mod transport;
