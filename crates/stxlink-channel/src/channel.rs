use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::Result;
use crate::fault::{corrupt, FaultPlan};
use crate::slot::{Slot, DEFAULT_SLOT_CAPACITY};

/// Direction of travel across the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Transmitter to receiver (frames).
    Forward,
    /// Receiver to transmitter (acknowledgements).
    Reverse,
}

impl Direction {
    /// Short label used in logs and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Reverse => "reverse",
        }
    }
}

/// What the channel did with a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The message is pending collection, intact.
    Delivered,
    /// The message is pending collection with one byte inverted at `index`.
    Corrupted { index: usize },
    /// The message was lost; the slot is unchanged.
    Dropped,
}

/// Channel construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Capacity of each slot in bytes.
    pub slot_capacity: usize,
    /// Injected losses and corruption.
    pub faults: FaultPlan,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            slot_capacity: DEFAULT_SLOT_CAPACITY,
            faults: FaultPlan::none(),
        }
    }
}

/// Counters describing channel traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub forward_publishes: u64,
    pub reverse_publishes: u64,
    /// Publishes that replaced a message the consumer had not collected.
    pub overwrites: u64,
    pub dropped: u64,
    pub corrupted: u64,
}

/// Two independent single-slot mailboxes, one per direction.
///
/// The channel is the only state shared by the transmitter and receiver
/// tasks. It carries no lock: the cooperative driver hands out `&mut Channel`
/// to one task at a time.
#[derive(Debug)]
pub struct Channel {
    forward: Slot,
    reverse: Slot,
    faults: FaultPlan,
    stats: ChannelStats,
}

impl Channel {
    /// Create a channel with default capacity and no faults.
    pub fn new() -> Self {
        Self::with_config(ChannelConfig::default())
    }

    /// Create a channel with explicit configuration.
    pub fn with_config(config: ChannelConfig) -> Self {
        Self {
            forward: Slot::new(config.slot_capacity),
            reverse: Slot::new(config.slot_capacity),
            faults: config.faults,
            stats: ChannelStats::default(),
        }
    }

    /// Create a fault-free channel whose slots hold `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config(ChannelConfig {
            slot_capacity: capacity,
            ..ChannelConfig::default()
        })
    }

    /// Publish a message in one direction.
    ///
    /// An invalid message is rejected before anything is counted or
    /// mutated. Publishing over an unread message overwrites it.
    pub fn publish(&mut self, direction: Direction, data: &[u8]) -> Result<Delivery> {
        self.slot(direction).check(data)?;

        let publish_no = match direction {
            Direction::Forward => {
                self.stats.forward_publishes += 1;
                self.stats.forward_publishes
            }
            Direction::Reverse => {
                self.stats.reverse_publishes += 1;
                self.stats.reverse_publishes
            }
        };

        let dropped = match direction {
            Direction::Forward => self.faults.drops_forward(publish_no),
            Direction::Reverse => self.faults.drops_reverse(publish_no),
        };
        if dropped {
            self.stats.dropped += 1;
            debug!(
                direction = direction.as_str(),
                publish_no,
                len = data.len(),
                "injected drop"
            );
            return Ok(Delivery::Dropped);
        }

        let overwrote = self.slot_mut(direction).write(data)?;
        if overwrote {
            self.stats.overwrites += 1;
            warn!(
                direction = direction.as_str(),
                len = data.len(),
                "overwrote unread message"
            );
        }

        if direction == Direction::Forward && self.faults.corrupts_forward(publish_no) {
            if let Some(index) = self.forward.pending_mut().and_then(corrupt) {
                self.stats.corrupted += 1;
                debug!(publish_no, index, "injected corruption");
                return Ok(Delivery::Corrupted { index });
            }
        }

        Ok(Delivery::Delivered)
    }

    /// Whether a message is pending in `direction`.
    pub fn is_ready(&self, direction: Direction) -> bool {
        self.slot(direction).is_ready()
    }

    /// Borrow the pending message in `direction` without consuming it.
    pub fn peek(&self, direction: Direction) -> Option<&[u8]> {
        self.slot(direction).peek()
    }

    /// Collect the pending message in `direction` and clear its ready flag.
    pub fn take(&mut self, direction: Direction) -> Option<Bytes> {
        self.slot_mut(direction).take()
    }

    /// Discard the pending message in `direction`.
    pub fn clear(&mut self, direction: Direction) {
        self.slot_mut(direction).clear();
    }

    /// Borrow the slot for `direction`.
    pub fn slot(&self, direction: Direction) -> &Slot {
        match direction {
            Direction::Forward => &self.forward,
            Direction::Reverse => &self.reverse,
        }
    }

    /// Traffic counters since construction.
    pub fn stats(&self) -> ChannelStats {
        self.stats
    }

    /// Fault plan in effect.
    pub fn faults(&self) -> &FaultPlan {
        &self.faults
    }

    fn slot_mut(&mut self, direction: Direction) -> &mut Slot {
        match direction {
            Direction::Forward => &mut self.forward,
            Direction::Reverse => &mut self.reverse,
        }
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChannelError;

    #[test]
    fn directions_are_independent() {
        let mut channel = Channel::new();
        channel.publish(Direction::Forward, b"frame").unwrap();
        channel.publish(Direction::Reverse, &[0x06]).unwrap();

        assert!(channel.is_ready(Direction::Forward));
        assert!(channel.is_ready(Direction::Reverse));

        assert_eq!(channel.take(Direction::Reverse).unwrap().as_ref(), &[0x06]);
        assert!(channel.is_ready(Direction::Forward));
        assert!(!channel.is_ready(Direction::Reverse));

        assert_eq!(channel.take(Direction::Forward).unwrap().as_ref(), b"frame");
        assert!(!channel.is_ready(Direction::Forward));
    }

    #[test]
    fn overwrite_is_counted() {
        let mut channel = Channel::new();
        channel.publish(Direction::Forward, b"one").unwrap();
        channel.publish(Direction::Forward, b"two").unwrap();

        assert_eq!(channel.stats().overwrites, 1);
        assert_eq!(channel.take(Direction::Forward).unwrap().as_ref(), b"two");
    }

    #[test]
    fn rejected_publish_is_not_counted() {
        let mut channel = Channel::with_capacity(2);

        let err = channel.publish(Direction::Forward, b"abc").unwrap_err();
        assert!(matches!(err, ChannelError::TooLarge { size: 3, .. }));
        assert_eq!(channel.stats(), ChannelStats::default());
        assert!(!channel.is_ready(Direction::Forward));
    }

    #[test]
    fn dropped_publish_leaves_slot_unchanged() {
        let mut channel = Channel::with_config(ChannelConfig {
            faults: FaultPlan {
                drop_forward_every: Some(2),
                ..FaultPlan::default()
            },
            ..ChannelConfig::default()
        });

        assert_eq!(
            channel.publish(Direction::Forward, b"a").unwrap(),
            Delivery::Delivered
        );
        assert_eq!(channel.take(Direction::Forward).unwrap().as_ref(), b"a");

        assert_eq!(
            channel.publish(Direction::Forward, b"b").unwrap(),
            Delivery::Dropped
        );
        assert!(!channel.is_ready(Direction::Forward));
        assert_eq!(channel.stats().dropped, 1);
    }

    #[test]
    fn corrupted_publish_is_delivered_damaged() {
        let mut channel = Channel::with_config(ChannelConfig {
            faults: FaultPlan {
                corrupt_forward_every: Some(1),
                ..FaultPlan::default()
            },
            ..ChannelConfig::default()
        });

        let delivery = channel.publish(Direction::Forward, &[1, 2, 3]).unwrap();
        assert_eq!(delivery, Delivery::Corrupted { index: 1 });
        assert_eq!(
            channel.take(Direction::Forward).unwrap().as_ref(),
            &[1, !2u8, 3]
        );
        assert_eq!(channel.stats().corrupted, 1);
    }

    #[test]
    fn reverse_drop_only_affects_acks() {
        let mut channel = Channel::with_config(ChannelConfig {
            faults: FaultPlan {
                drop_reverse_every: Some(1),
                ..FaultPlan::default()
            },
            ..ChannelConfig::default()
        });

        assert_eq!(
            channel.publish(Direction::Forward, b"f").unwrap(),
            Delivery::Delivered
        );
        assert_eq!(
            channel.publish(Direction::Reverse, &[0x06]).unwrap(),
            Delivery::Dropped
        );
        assert!(channel.peek(Direction::Reverse).is_none());
    }

    #[test]
    fn clear_discards_pending() {
        let mut channel = Channel::default();
        channel.publish(Direction::Reverse, &[0x06]).unwrap();
        channel.clear(Direction::Reverse);
        assert!(!channel.is_ready(Direction::Reverse));
    }
}
