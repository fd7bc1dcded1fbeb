//! Latest known board state and change notifications

use crate::core::connection::ConnectionState;
use crate::core::protocol::{Channel, GPIO_COUNT, RELAY_COUNT};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

/// Snapshot of every channel value last read from the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Status {
    /// Relay values, indexed by relay channel
    pub relay: [i32; RELAY_COUNT],
    /// GPIO values, indexed by GPIO channel
    pub gpio: [i32; GPIO_COUNT],
}

impl Status {
    /// Value last read for `channel`, `None` if the board has no such channel
    pub fn value(&self, channel: Channel) -> Option<i32> {
        match channel {
            Channel::Relay(_) => self.relay.get(channel.index()).copied(),
            Channel::Gpio(_) => self.gpio.get(channel.index()).copied(),
        }
    }

    /// Copy of this snapshot with one channel replaced.
    /// Channels the board does not have leave it unchanged.
    #[must_use]
    pub fn with_value(mut self, channel: Channel, value: i32) -> Self {
        let slot = match channel {
            Channel::Relay(_) => self.relay.get_mut(channel.index()),
            Channel::Gpio(_) => self.gpio.get_mut(channel.index()),
        };
        if let Some(slot) = slot {
            *slot = value;
        }
        self
    }
}

/// Driver notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    /// A reply was decoded; carries the snapshot it produced
    UpdateAvailable(Status),
    /// The connection opened or closed
    StateChanged(ConnectionState),
}

/// Holds the current snapshot and fans out notifications.
///
/// Only the dispatch loop writes; readers hold `watch` receivers, so a read
/// never blocks and always sees a whole snapshot.
#[derive(Debug)]
pub struct StatusStore {
    snapshot: watch::Sender<Status>,
    events: broadcast::Sender<BoardEvent>,
}

impl StatusStore {
    /// Create a store whose notification queue holds `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (snapshot, _) = watch::channel(Status::default());
        let (events, _) = broadcast::channel(capacity.max(1));
        Self { snapshot, events }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Status {
        *self.snapshot.borrow()
    }

    /// Receiver that always holds the current snapshot
    pub fn watch(&self) -> watch::Receiver<Status> {
        self.snapshot.subscribe()
    }

    /// Subscribe to notifications
    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.events.subscribe()
    }

    /// Sender side of the notifications, for handles that subscribe later
    pub fn events(&self) -> broadcast::Sender<BoardEvent> {
        self.events.clone()
    }

    /// Replace the snapshot with one carrying `value` for `channel` and notify.
    /// A channel the board does not have is ignored.
    pub fn publish(&self, channel: Channel, value: i32) -> Status {
        if !channel.is_valid() {
            return self.snapshot();
        }
        let next = self.snapshot().with_value(channel, value);
        self.snapshot.send_replace(next);
        // No subscribers is fine.
        let _ = self.events.send(BoardEvent::UpdateAvailable(next));
        next
    }

    /// Announce a connection state transition
    pub fn notify_state(&self, state: ConnectionState) {
        let _ = self.events.send(BoardEvent::StateChanged(state));
    }
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_with_value_leaves_original_untouched() {
        let before = Status::default();
        let after = before.with_value(Channel::Relay(2), 42);
        assert_eq!(before.relay, [0; 4]);
        assert_eq!(after.relay, [0, 0, 42, 0]);
        assert_eq!(after.value(Channel::Relay(2)), Some(42));
        assert_eq!(after.gpio, [0; 8]);
    }

    #[test]
    fn test_out_of_range_channel_is_ignored() {
        let status = Status::default().with_value(Channel::Relay(9), 7);
        assert_eq!(status, Status::default());
        assert_eq!(status.value(Channel::Gpio(8)), None);

        let store = StatusStore::default();
        let mut events = store.subscribe();
        assert_eq!(store.publish(Channel::Gpio(8), 1), Status::default());
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_publish_replaces_snapshot_and_notifies_once() {
        let store = StatusStore::default();
        let reader = store.watch();
        let mut events = store.subscribe();

        let published = store.publish(Channel::Gpio(7), 1);

        assert_eq!(*reader.borrow(), published);
        assert_eq!(store.snapshot().gpio[7], 1);
        assert_eq!(events.try_recv().unwrap(), BoardEvent::UpdateAvailable(published));
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_publish_without_subscribers() {
        let store = StatusStore::new(1);
        store.publish(Channel::Relay(0), 5);
        store.notify_state(ConnectionState::Connected);
        assert_eq!(store.snapshot().relay[0], 5);
    }
}
