//! In-memory loopback lines
//!
//! `LoopbackConnector` hands the driver one end of a `tokio::io::duplex`
//! pair per `open` and passes the other end out as a [`LoopbackDevice`],
//! which plays the board: it sees every command the driver writes and can
//! inject replies.

use super::{Connector, Line, LineError, PortConfig};
use async_trait::async_trait;
use bytes::BytesMut;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tracing::trace;

const LOOPBACK_BUFFER: usize = 64 * 1024;

#[derive(Debug)]
struct LoopbackState {
    available: bool,
    opened: Vec<PortConfig>,
}

/// Connector producing in-memory lines
#[derive(Debug, Clone)]
pub struct LoopbackConnector {
    devices: mpsc::UnboundedSender<LoopbackDevice>,
    state: Arc<Mutex<LoopbackState>>,
}

impl LoopbackConnector {
    /// Create a connector and the receiver its device ends are delivered on
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LoopbackDevice>) {
        let (devices, rx) = mpsc::unbounded_channel();
        let connector = Self {
            devices,
            state: Arc::new(Mutex::new(LoopbackState {
                available: true,
                opened: Vec::new(),
            })),
        };
        (connector, rx)
    }

    /// Make subsequent opens succeed or fail
    pub fn set_available(&self, available: bool) {
        self.state.lock().available = available;
    }

    /// Configurations of every successful open, oldest first
    pub fn opened(&self) -> Vec<PortConfig> {
        self.state.lock().opened.clone()
    }
}

#[async_trait]
impl Connector for LoopbackConnector {
    async fn open(&self, config: &PortConfig) -> Result<Box<dyn Line>, LineError> {
        {
            let mut state = self.state.lock();
            if !state.available {
                return Err(LineError::PortNotFound(config.path.clone()));
            }
            state.opened.push(config.clone());
        }

        let (driver_end, device_end) = tokio::io::duplex(LOOPBACK_BUFFER);
        let device = LoopbackDevice {
            config: config.clone(),
            stream: device_end,
            pending: BytesMut::new(),
        };
        self.devices
            .send(device)
            .map_err(|_| LineError::ConnectionFailed("loopback receiver dropped".to_string()))?;

        Ok(Box::new(driver_end))
    }
}

/// The board side of a loopback line
#[derive(Debug)]
pub struct LoopbackDevice {
    config: PortConfig,
    stream: DuplexStream,
    pending: BytesMut,
}

impl LoopbackDevice {
    /// Configuration the driver opened this line with
    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    /// Next `\r`-terminated command written by the driver, without the terminator.
    ///
    /// Returns `None` once the driver has closed its end and every buffered
    /// command has been consumed.
    pub async fn read_command(&mut self) -> Option<String> {
        loop {
            if let Some(pos) = self.pending.iter().position(|b| *b == b'\r') {
                let line = self.pending.split_to(pos + 1);
                let command = String::from_utf8_lossy(&line[..pos]).into_owned();
                trace!("loopback rx {:?}", command);
                return Some(command);
            }
            match self.stream.read_buf(&mut self.pending).await {
                Ok(0) | Err(_) => return None,
                Ok(_) => {}
            }
        }
    }

    /// Write raw bytes towards the driver
    pub async fn reply(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.stream.write_all(data).await?;
        self.stream.flush().await
    }

    /// Answer commands like a real board until the driver closes the line.
    ///
    /// Reads reply with the current channel value followed by `\n\r`; writes
    /// update the simulated state and produce no reply.
    pub async fn simulate(mut self, mut relay: [i32; 4], mut gpio: [i32; 8]) {
        while let Some(command) = self.read_command().await {
            let parts: Vec<&str> = command.split_whitespace().collect();
            let reply = match parts.as_slice() {
                ["relay", "read", n] => read_slot(&relay, n),
                ["gpio", "read", n] => read_slot(&gpio, n),
                ["relay", "on", n] => write_slot(&mut relay, n, 1),
                ["relay", "off", n] => write_slot(&mut relay, n, 0),
                ["gpio", "set", n] => write_slot(&mut gpio, n, 1),
                ["gpio", "clear", n] => write_slot(&mut gpio, n, 0),
                _ => None,
            };
            if let Some(value) = reply {
                if self.reply(format!("{}\n\r", value).as_bytes()).await.is_err() {
                    break;
                }
            }
        }
    }
}

fn read_slot(slots: &[i32], index: &str) -> Option<i32> {
    index.parse::<usize>().ok().and_then(|i| slots.get(i).copied())
}

fn write_slot(slots: &mut [i32], index: &str, value: i32) -> Option<i32> {
    if let Some(slot) = index.parse::<usize>().ok().and_then(|i| slots.get_mut(i)) {
        *slot = value;
    }
    None
}
