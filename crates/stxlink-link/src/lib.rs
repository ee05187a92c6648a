//! Cooperative transmitter and receiver tasks for the stxlink protocol.
//!
//! Both tasks are explicit state machines advanced by a driver, one step at
//! a time, over a borrowed [`stxlink_channel::Channel`]:
//! - [`Transmitter`] publishes one frame and resends it on every timeout
//!   until an acknowledgement arrives
//! - [`ReceiverTask`] drains the forward slot through a
//!   [`stxlink_frame::FrameReceiver`] and answers each accepted frame with
//!   an `ACK`
//!
//! [`Link`] is the driver: it owns the channel, both tasks and a
//! [`Deadline`], relays acknowledgements and timeouts, and applies an
//! optional retry ceiling.

pub mod config;
pub mod error;
pub mod link;
pub mod receiver;
pub mod timer;
pub mod transmitter;

pub use config::LinkConfig;
pub use error::{LinkError, Result};
pub use link::{Link, LinkStats, SendReport};
pub use receiver::{FrameLog, FrameSink, ReceiverTask, RxState};
pub use timer::{ClockDeadline, Deadline, StepDeadline, DEFAULT_POLL_INTERVAL};
pub use transmitter::{SendHandle, Transmitter, TxState, TxStatus};
