//! Single-slot duplex channel for the stxlink protocol.
//!
//! The channel models the medium between one transmitter and one receiver:
//! - A forward slot carrying frames from the transmitter to the receiver
//! - A reverse slot carrying acknowledgements back to the transmitter
//!
//! Each slot holds at most one pending message. A new publish overwrites an
//! unread slot; there is no queueing and no backpressure. This is the lowest
//! layer of stxlink. The tasks in `stxlink-link` step over a [`Channel`]
//! borrowed from their driver.

pub mod channel;
pub mod error;
pub mod fault;
pub mod slot;

pub use channel::{Channel, ChannelConfig, ChannelStats, Delivery, Direction};
pub use error::{ChannelError, Result};
pub use fault::FaultPlan;
pub use slot::{Slot, DEFAULT_SLOT_CAPACITY};
