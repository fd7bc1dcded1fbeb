//! Poll scheduling
//!
//! The scheduler only decides *what* to query next; the connection manager
//! owns the timer and the line.

use crate::core::protocol::{Channel, GPIO_COUNT, RELAY_COUNT};

/// Round-robin cursor over the channels polled each cycle
#[derive(Debug, Clone)]
pub struct PollScheduler {
    targets: Vec<Channel>,
    next: usize,
}

impl PollScheduler {
    /// Poll relays 0..4, then GPIO 0..8 when `include_gpio` is set
    pub fn new(include_gpio: bool) -> Self {
        let relays = (0..RELAY_COUNT).filter_map(Channel::relay);
        let gpio = (0..GPIO_COUNT)
            .filter_map(Channel::gpio)
            .filter(|_| include_gpio);

        Self {
            targets: relays.chain(gpio).collect(),
            next: 0,
        }
    }

    /// Channel the next tick will query
    pub fn peek(&self) -> Channel {
        self.targets[self.next]
    }

    /// Return the channel to query on this tick and move the cursor on
    pub fn advance(&mut self) -> Channel {
        let channel = self.peek();
        self.next = (self.next + 1) % self.targets.len();
        channel
    }

    /// Number of ticks in one full poll cycle
    pub fn cycle_len(&self) -> usize {
        self.targets.len()
    }

    /// Restart the cycle at the first relay
    pub fn reset(&mut self) {
        self.next = 0;
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycles_relays_in_order() {
        let mut scheduler = PollScheduler::default();
        let indices: Vec<usize> = (0..10).map(|_| scheduler.advance().index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 0, 1, 2, 3, 0, 1]);
    }

    #[test]
    fn test_sustained_ticking_never_skips() {
        let mut scheduler = PollScheduler::default();
        let mut expected = 0;
        for _ in 0..10_000 {
            assert_eq!(scheduler.advance(), Channel::Relay(expected));
            expected = (expected + 1) % 4;
        }
    }

    #[test]
    fn test_gpio_extension() {
        let mut scheduler = PollScheduler::new(true);
        assert_eq!(scheduler.cycle_len(), 12);
        let cycle: Vec<Channel> = (0..12).map(|_| scheduler.advance()).collect();
        assert_eq!(cycle[3], Channel::Relay(3));
        assert_eq!(cycle[4], Channel::Gpio(0));
        assert_eq!(cycle[11], Channel::Gpio(7));
        assert_eq!(scheduler.advance(), Channel::Relay(0));
    }

    #[test]
    fn test_reset() {
        let mut scheduler = PollScheduler::default();
        scheduler.advance();
        scheduler.advance();
        scheduler.reset();
        assert_eq!(scheduler.peek(), Channel::Relay(0));
    }
}
