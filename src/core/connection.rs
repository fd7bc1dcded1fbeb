//! Connection management
//!
//! The [`ConnectionManager`] owns the line, the poll timer, the reply parser
//! and the status store. It runs as a single dispatch loop that multiplexes
//! three event sources:
//! - caller commands (connect, disconnect, channel writes)
//! - poll ticks
//! - inbound data on the line
//!
//! Because everything happens on that one task, tearing the link down inside
//! a command handler guarantees no tick or reply for it is processed later.
//! Outbound bytes are queued on the link and drained by a select branch, so a
//! board that stops reading never keeps the loop from taking commands.

use crate::config::DriverSettings;
use crate::core::board::BoardError;
use crate::core::protocol::{Channel, Reply, ResponseParser};
use crate::core::scheduler::PollScheduler;
use crate::core::status::StatusStore;
use crate::core::transport::{Connector, Line, PortConfig};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Unsent bytes tolerated before the board is considered stalled
pub const MAX_OUTBOUND: usize = 1024;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Not connected
    #[default]
    Disconnected,
    /// Line open and polling
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// Requests handled by the dispatch loop
pub(crate) enum Command {
    Connect {
        config: PortConfig,
        reply: oneshot::Sender<Result<PortConfig, BoardError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Write {
        channel: Channel,
        on: bool,
        reply: oneshot::Sender<Result<(), BoardError>>,
    },
}

/// Everything tied to one open line
struct Link {
    config: PortConfig,
    reader: ReadHalf<Box<dyn Line>>,
    writer: WriteHalf<Box<dyn Line>>,
    ticker: Interval,
    inbound: BytesMut,
    outbound: BytesMut,
}

enum LinkEvent {
    Tick,
    Read(std::io::Result<usize>),
    Wrote(std::io::Result<usize>),
}

/// Owner of the serial line and the polling schedule
pub struct ConnectionManager {
    connector: Box<dyn Connector>,
    settings: DriverSettings,
    link: Option<Link>,
    scheduler: PollScheduler,
    parser: ResponseParser,
    last_queried: Option<Channel>,
    store: StatusStore,
    state: watch::Sender<ConnectionState>,
}

impl ConnectionManager {
    /// Create a disconnected manager
    pub fn new(connector: Box<dyn Connector>, settings: DriverSettings) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            scheduler: PollScheduler::new(settings.poll_gpio),
            store: StatusStore::new(settings.event_capacity),
            settings,
            link: None,
            parser: ResponseParser::new(),
            last_queried: None,
            state,
        }
    }

    /// Status store fed by this manager
    pub fn store(&self) -> &StatusStore {
        &self.store
    }

    /// Receiver tracking the connection state
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Channel the most recent query addressed
    pub fn last_queried(&self) -> Option<Channel> {
        self.last_queried
    }

    /// Open a line and start polling.
    ///
    /// An existing connection is fully torn down first. Unset port fields are
    /// filled from the settings, then from the built-in defaults; the resolved
    /// configuration is returned.
    pub async fn connect(&mut self, request: &PortConfig) -> Result<PortConfig, BoardError> {
        if self.link.is_some() {
            self.disconnect();
        }

        let config = request.resolve(&self.settings.port);
        let line = match self.connector.open(&config).await {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to open {}: {}", config, e);
                return Err(BoardError::Connect(e));
            }
        };

        let (reader, writer) = tokio::io::split(line);
        let period = self.settings.poll_interval();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.scheduler.reset();
        self.parser.clear();
        self.last_queried = None;
        self.link = Some(Link {
            config: config.clone(),
            reader,
            writer,
            ticker,
            inbound: BytesMut::with_capacity(256),
            outbound: BytesMut::with_capacity(256),
        });
        self.set_state(ConnectionState::Connected);

        info!(
            "Connected to board on {}, polling every {:?}",
            config, period
        );
        Ok(config)
    }

    /// Stop polling and close the line. No-op when already disconnected.
    pub fn disconnect(&mut self) {
        if let Some(link) = self.link.take() {
            info!("Disconnected from {}", link.config);
            self.close(link);
        }
    }

    fn link_lost(&mut self, reason: &str) {
        if let Some(link) = self.link.take() {
            warn!("Lost link to {}: {}", link.config, reason);
            self.close(link);
        }
    }

    fn close(&mut self, link: Link) {
        drop(link);
        self.last_queried = None;
        self.parser.clear();
        self.set_state(ConnectionState::Disconnected);
    }

    fn set_state(&self, state: ConnectionState) {
        if *self.state.borrow() != state {
            self.state.send_replace(state);
            self.store.notify_state(state);
        }
    }

    /// Queue the next poll query.
    ///
    /// Whatever partial reply is still buffered belongs to the previous query
    /// and is dropped here.
    pub fn on_tick(&mut self) {
        if self.link.is_none() {
            return;
        }

        if let Some(stale) = self.parser.flush_partial() {
            warn!("Discarding unterminated reply {:?}", stale);
        }

        let channel = self.scheduler.advance();
        self.last_queried = Some(channel);
        trace!("Querying {}", channel);
        self.queue(channel.read_command().as_bytes());
    }

    /// Decode inbound bytes and publish every value they carry
    pub fn on_inbound(&mut self, data: &[u8]) {
        for reply in self.parser.push(data) {
            match (reply, self.last_queried) {
                (Reply::Value(value), Some(channel)) => {
                    debug!("{} = {}", channel, value);
                    self.store.publish(channel, value);
                }
                (Reply::Value(value), None) => {
                    debug!("Discarding value {} received before any query", value);
                }
                (Reply::Malformed(text), _) => {
                    warn!("Discarding malformed reply {:?}", text);
                }
            }
        }
    }

    /// Queue an output command for `channel`
    pub fn write_channel(&mut self, channel: Channel, on: bool) -> Result<(), BoardError> {
        if !channel.is_valid() {
            return Err(BoardError::InvalidChannel {
                bank: channel.bank(),
                index: channel.index(),
                count: channel.bank_size(),
            });
        }
        if self.link.is_none() {
            return Err(BoardError::NotConnected);
        }

        let command = channel.write_command(on);
        debug!("Sending {:?}", command.trim_end());
        self.queue(command.as_bytes());

        if self.link.is_some() {
            Ok(())
        } else {
            Err(BoardError::NotConnected)
        }
    }

    /// Bytes queued on the open line but not yet written
    pub fn pending_output(&self) -> usize {
        self.link.as_ref().map_or(0, |link| link.outbound.len())
    }

    fn queue(&mut self, data: &[u8]) {
        let Some(link) = self.link.as_mut() else {
            return;
        };

        link.outbound.extend_from_slice(data);
        if link.outbound.len() > MAX_OUTBOUND {
            let unsent = link.outbound.len();
            self.link_lost(&format!("board stopped reading ({} bytes unsent)", unsent));
        }
    }

    async fn handle_command(&mut self, command: Command) {
        // A caller that gave up waiting does not stop the work from happening.
        match command {
            Command::Connect { config, reply } => {
                let _ = reply.send(self.connect(&config).await);
            }
            Command::Disconnect { reply } => {
                self.disconnect();
                let _ = reply.send(());
            }
            Command::Write { channel, on, reply } => {
                let _ = reply.send(self.write_channel(channel, on));
            }
        }
    }

    fn handle_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Tick => self.on_tick(),
            LinkEvent::Read(Ok(0)) => self.link_lost("line closed"),
            LinkEvent::Read(Ok(_)) => {
                let data = match self.link.as_mut() {
                    Some(link) => link.inbound.split().freeze(),
                    None => return,
                };
                trace!("rx {} bytes", data.len());
                self.on_inbound(&data);
            }
            LinkEvent::Read(Err(e)) => self.link_lost(&format!("read failed: {}", e)),
            LinkEvent::Wrote(Ok(0)) => self.link_lost("line refused data"),
            LinkEvent::Wrote(Ok(n)) => trace!("tx {} bytes", n),
            LinkEvent::Wrote(Err(e)) => self.link_lost(&format!("write failed: {}", e)),
        }
    }

    /// Run the dispatch loop until every command sender is dropped
    pub(crate) async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                event = next_event(&mut self.link) => self.handle_event(event),
            }
        }

        self.disconnect();
        debug!("Board dispatch loop finished");
    }
}

/// Wait for the next tick, inbound data or a finished write; never resolves
/// without a link
async fn next_event(link: &mut Option<Link>) -> LinkEvent {
    let Some(link) = link else {
        return std::future::pending().await;
    };

    tokio::select! {
        biased;

        read = link.reader.read_buf(&mut link.inbound) => LinkEvent::Read(read),
        wrote = link.writer.write_buf(&mut link.outbound), if !link.outbound.is_empty() => {
            LinkEvent::Wrote(wrote)
        }
        _ = link.ticker.tick() => LinkEvent::Tick,
    }
}
