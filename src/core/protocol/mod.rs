//! Board command language
//!
//! The board speaks a line-oriented ASCII protocol: commands are terminated
//! by `\r`, replies by the board's own line ending.
//! - `relay read N` / `gpio read N` query a channel
//! - `relay on N` / `relay off N` switch a relay
//! - `gpio set N` / `gpio clear N` drive a GPIO output

pub mod parser;

pub use parser::{Reply, ResponseParser, MAX_LINE_LEN};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of relay channels on the board
pub const RELAY_COUNT: usize = 4;

/// Number of GPIO channels on the board
pub const GPIO_COUNT: usize = 8;

/// Command terminator expected by the board
pub const COMMAND_TERMINATOR: char = '\r';

/// An addressable channel on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Relay channel, index in `[0, RELAY_COUNT)`
    Relay(u8),
    /// GPIO channel, index in `[0, GPIO_COUNT)`
    Gpio(u8),
}

impl Channel {
    /// Validated relay channel
    pub fn relay(index: usize) -> Option<Self> {
        (index < RELAY_COUNT).then(|| Self::Relay(index as u8))
    }

    /// Validated GPIO channel
    pub fn gpio(index: usize) -> Option<Self> {
        (index < GPIO_COUNT).then(|| Self::Gpio(index as u8))
    }

    /// Channel index within its bank
    pub fn index(self) -> usize {
        match self {
            Self::Relay(i) | Self::Gpio(i) => usize::from(i),
        }
    }

    /// Bank name as the board spells it
    pub fn bank(self) -> &'static str {
        match self {
            Self::Relay(_) => "relay",
            Self::Gpio(_) => "gpio",
        }
    }

    /// Number of channels in this channel's bank
    pub fn bank_size(self) -> usize {
        match self {
            Self::Relay(_) => RELAY_COUNT,
            Self::Gpio(_) => GPIO_COUNT,
        }
    }

    /// Whether the index exists on the board. The variants can be built
    /// directly, so anything not from [`relay`](Self::relay) or
    /// [`gpio`](Self::gpio) should be checked.
    pub fn is_valid(self) -> bool {
        self.index() < self.bank_size()
    }

    /// Status query for this channel, e.g. `relay read 2\r`
    pub fn read_command(self) -> String {
        format!("{} read {}{}", self.bank(), self.index(), COMMAND_TERMINATOR)
    }

    /// Output command for this channel, e.g. `relay on 1\r` or `gpio clear 5\r`
    pub fn write_command(self, on: bool) -> String {
        let verb = match (self, on) {
            (Self::Relay(_), true) => "on",
            (Self::Relay(_), false) => "off",
            (Self::Gpio(_), true) => "set",
            (Self::Gpio(_), false) => "clear",
        };
        format!("{} {} {}{}", self.bank(), verb, self.index(), COMMAND_TERMINATOR)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.bank(), self.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_ranges() {
        assert_eq!(Channel::relay(3), Some(Channel::Relay(3)));
        assert_eq!(Channel::relay(4), None);
        assert_eq!(Channel::gpio(7), Some(Channel::Gpio(7)));
        assert_eq!(Channel::gpio(8), None);
    }

    #[test]
    fn test_unchecked_variants_are_flagged() {
        assert!(Channel::Relay(3).is_valid());
        assert!(!Channel::Relay(4).is_valid());
        assert!(Channel::Gpio(7).is_valid());
        assert!(!Channel::Gpio(200).is_valid());
    }

    #[test]
    fn test_read_commands() {
        assert_eq!(Channel::Relay(0).read_command(), "relay read 0\r");
        assert_eq!(Channel::Gpio(6).read_command(), "gpio read 6\r");
    }

    #[test]
    fn test_write_commands() {
        assert_eq!(Channel::Relay(1).write_command(true), "relay on 1\r");
        assert_eq!(Channel::Relay(1).write_command(false), "relay off 1\r");
        assert_eq!(Channel::Gpio(5).write_command(true), "gpio set 5\r");
        assert_eq!(Channel::Gpio(5).write_command(false), "gpio clear 5\r");
    }
}
