//! Public handle to a relay board
//!
//! A [`RelayBoard`] spawns the dispatch loop that owns the line and talks to
//! it over a command channel. State reads (`is_connected`,
//! `get_updated_data`) never wait on the loop.

use crate::config::DriverSettings;
use crate::core::connection::{Command, ConnectionManager, ConnectionState};
use crate::core::protocol::{Channel, GPIO_COUNT, RELAY_COUNT};
use crate::core::status::{BoardEvent, Status};
use crate::core::transport::{Connector, LineError, PortConfig, SerialConnector};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

const COMMAND_QUEUE: usize = 32;

/// Board driver errors
#[derive(Error, Debug)]
pub enum BoardError {
    /// The line could not be opened
    #[error("Connection failed: {0}")]
    Connect(#[source] LineError),

    /// The open line failed
    #[error("Line error: {0}")]
    Line(#[from] LineError),

    /// A control call was made without an open line
    #[error("Not connected to board")]
    NotConnected,

    /// Channel index outside the bank
    #[error("Invalid {bank} channel {index} (board has {count})")]
    InvalidChannel {
        /// "relay" or "gpio"
        bank: &'static str,
        /// Requested index
        index: usize,
        /// Channels in the bank
        count: usize,
    },

    /// The dispatch loop is gone
    #[error("Board driver stopped")]
    DriverStopped,
}

/// Handle to a relay/GPIO board driver
pub struct RelayBoard {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<Status>,
    state: watch::Receiver<ConnectionState>,
    events: broadcast::Sender<BoardEvent>,
}

impl RelayBoard {
    /// Driver for real serial ports with default settings.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new() -> Self {
        Self::with_settings(DriverSettings::default())
    }

    /// Driver for real serial ports
    pub fn with_settings(settings: DriverSettings) -> Self {
        Self::with_connector(SerialConnector, settings)
    }

    /// Driver opening its lines through `connector`
    pub fn with_connector(connector: impl Connector + 'static, settings: DriverSettings) -> Self {
        let manager = ConnectionManager::new(Box::new(connector), settings);
        let status = manager.store().watch();
        let events = manager.store().events();
        let state = manager.state();

        let (commands, rx) = mpsc::channel(COMMAND_QUEUE);
        tokio::spawn(manager.run(rx));

        Self {
            commands,
            status,
            state,
            events,
        }
    }

    async fn request<T>(
        &self,
        command: Command,
        reply: oneshot::Receiver<T>,
    ) -> Result<T, BoardError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| BoardError::DriverStopped)?;
        reply.await.map_err(|_| BoardError::DriverStopped)
    }

    /// Connect to the board, returning whether the line opened.
    ///
    /// Empty path / zero baud rate fall back to the configured port, then to
    /// the built-in defaults. Connecting while connected reconnects.
    pub async fn connect(&self, config: PortConfig) -> bool {
        self.try_connect(config).await.is_ok()
    }

    /// Like [`connect`](Self::connect), reporting why it failed.
    /// Returns the configuration actually used.
    pub async fn try_connect(&self, config: PortConfig) -> Result<PortConfig, BoardError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Connect { config, reply }, rx).await?
    }

    /// Stop polling and close the line.
    ///
    /// When this returns no further query is sent and no further reply is
    /// decoded for the closed line.
    pub async fn disconnect(&self) {
        let (reply, rx) = oneshot::channel();
        // A stopped driver holds no line.
        let _ = self.request(Command::Disconnect { reply }, rx).await;
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Current connection state
    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Snapshot of the latest channel values
    pub fn get_updated_data(&self) -> Status {
        *self.status.borrow()
    }

    /// Subscribe to update and connection notifications
    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.events.subscribe()
    }

    /// Switch relay `channel` on or off
    pub async fn set_relay(&self, channel: usize, on: bool) -> Result<(), BoardError> {
        let channel = Channel::relay(channel).ok_or(BoardError::InvalidChannel {
            bank: "relay",
            index: channel,
            count: RELAY_COUNT,
        })?;
        self.write(channel, on).await
    }

    /// Drive GPIO `channel` high or low
    pub async fn set_gpio(&self, channel: usize, on: bool) -> Result<(), BoardError> {
        let channel = Channel::gpio(channel).ok_or(BoardError::InvalidChannel {
            bank: "gpio",
            index: channel,
            count: GPIO_COUNT,
        })?;
        self.write(channel, on).await
    }

    async fn write(&self, channel: Channel, on: bool) -> Result<(), BoardError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Write { channel, on, reply }, rx).await?
    }
}

impl Default for RelayBoard {
    fn default() -> Self {
        Self::new()
    }
}
