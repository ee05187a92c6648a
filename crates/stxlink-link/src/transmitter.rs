use bytes::Bytes;
use stxlink_channel::{Channel, Delivery, Direction};
use stxlink_frame::{encode_with, FrameConfig};
use tracing::{debug, info};

use crate::error::{LinkError, Result};

/// Where the transmitter task is suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxState {
    /// The frame is ready to be published on the next step.
    Idle,
    /// The frame is on the channel; waiting for acknowledgement or timeout.
    FrameSent,
    /// The frame was acknowledged.
    Completed,
}

/// Result of one transmitter step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxStatus {
    Running,
    Completed,
}

/// Identifies one call to [`Transmitter::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SendHandle(u64);

impl SendHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Stop-and-wait transmitter task.
///
/// One frame is in flight at a time. Each timeout republishes the exact
/// bytes encoded by [`Transmitter::send`]; there is no retry limit at this
/// level. Acknowledgement and timeout are inputs raised by the driver through
/// [`Transmitter::notify_ack`] and [`Transmitter::notify_timeout`].
#[derive(Debug)]
pub struct Transmitter {
    config: FrameConfig,
    state: TxState,
    payload: Option<Bytes>,
    frame: Option<Bytes>,
    handle: Option<SendHandle>,
    next_handle: u64,
    packet_sent: bool,
    ack_received: bool,
    timeout: bool,
    attempts: u32,
}

impl Transmitter {
    /// Create a transmitter with default framing.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a transmitter with explicit framing.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            config,
            state: TxState::Idle,
            payload: None,
            frame: None,
            handle: None,
            next_handle: 1,
            packet_sent: false,
            ack_received: false,
            timeout: false,
            attempts: 0,
        }
    }

    /// Queue a payload for delivery.
    ///
    /// An invalid payload is rejected before any state changes. Fails with
    /// [`LinkError::SendInProgress`] while a previous frame awaits its
    /// acknowledgement.
    pub fn send(&mut self, payload: impl Into<Bytes>) -> Result<SendHandle> {
        if self.state == TxState::FrameSent {
            return Err(LinkError::SendInProgress);
        }

        let payload = payload.into();
        let frame = encode_with(&self.config, &payload)?;

        let handle = SendHandle(self.next_handle);
        self.next_handle += 1;

        self.payload = Some(payload);
        self.frame = Some(frame);
        self.handle = Some(handle);
        self.state = TxState::Idle;
        self.packet_sent = false;
        self.ack_received = false;
        self.timeout = false;
        self.attempts = 0;
        Ok(handle)
    }

    /// Advance the task by one scheduling step.
    pub fn step(&mut self, channel: &mut Channel) -> Result<TxStatus> {
        match self.state {
            TxState::Idle => {
                self.transmit(channel)?;
                Ok(TxStatus::Running)
            }
            TxState::FrameSent => {
                if self.ack_received {
                    self.packet_sent = false;
                    self.ack_received = false;
                    self.timeout = false;
                    self.state = TxState::Completed;
                    info!(
                        handle = self.handle.map(SendHandle::id),
                        attempts = self.attempts,
                        "frame acknowledged"
                    );
                    Ok(TxStatus::Completed)
                } else if self.timeout {
                    self.timeout = false;
                    self.state = TxState::Idle;
                    self.transmit(channel)?;
                    Ok(TxStatus::Running)
                } else {
                    Ok(TxStatus::Running)
                }
            }
            TxState::Completed => Ok(TxStatus::Completed),
        }
    }

    /// Raise the acknowledgement input.
    pub fn notify_ack(&mut self) {
        self.ack_received = true;
    }

    /// Raise the timeout input.
    pub fn notify_timeout(&mut self) {
        self.timeout = true;
    }

    /// Drop the queued payload and return to an empty `Idle` state.
    pub fn reset(&mut self) {
        self.state = TxState::Idle;
        self.payload = None;
        self.frame = None;
        self.handle = None;
        self.packet_sent = false;
        self.ack_received = false;
        self.timeout = false;
        self.attempts = 0;
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    /// Whether the current frame has been published and not yet acknowledged.
    pub fn packet_sent(&self) -> bool {
        self.packet_sent
    }

    /// Whether an acknowledgement has been raised but not yet consumed.
    pub fn ack_pending(&self) -> bool {
        self.ack_received
    }

    /// Times the current frame has been published.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The encoded frame for the current send.
    pub fn frame(&self) -> Option<&Bytes> {
        self.frame.as_ref()
    }

    /// The payload for the current send.
    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    /// Handle of the current send.
    pub fn handle(&self) -> Option<SendHandle> {
        self.handle
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn transmit(&mut self, channel: &mut Channel) -> Result<Delivery> {
        let frame = self.frame.as_ref().ok_or(LinkError::NothingToSend)?;
        let delivery = channel.publish(Direction::Forward, frame)?;

        self.packet_sent = true;
        self.attempts += 1;
        self.state = TxState::FrameSent;
        debug!(
            handle = self.handle.map(SendHandle::id),
            attempt = self.attempts,
            len = frame.len(),
            ?delivery,
            "frame published"
        );
        Ok(delivery)
    }
}

impl Default for Transmitter {
    fn default() -> Self {
        Self::new()
    }
}
