use bytes::Bytes;
use stxlink_channel::{Channel, Direction};
use stxlink_frame::{FrameConfig, FrameReceiver, Outcome, ACK};
use tracing::debug;

use crate::error::Result;

/// Consumer of validated payloads.
pub trait FrameSink {
    /// Called once per frame that passed checksum and terminator checks.
    fn on_frame(&mut self, payload: &[u8]);
}

impl<F: FnMut(&[u8])> FrameSink for F {
    fn on_frame(&mut self, payload: &[u8]) {
        self(payload)
    }
}

/// Sink that keeps every delivered payload in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameLog {
    frames: Vec<Bytes>,
}

impl FrameLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[Bytes] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn last(&self) -> Option<&Bytes> {
        self.frames.last()
    }
}

impl FrameSink for FrameLog {
    fn on_frame(&mut self, payload: &[u8]) {
        self.frames.push(Bytes::copy_from_slice(payload));
    }
}

/// Where the receiver task is suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RxState {
    /// Waiting for the forward slot to become ready.
    AwaitingData,
    /// Drained the slot last step; this step only yields.
    Yielded,
}

/// Receiver task: drains the forward slot through a [`FrameReceiver`].
///
/// Each wake drains every byte in the slot in order, hands validated payloads
/// to the sink and publishes a single [`ACK`] on the reverse slot when a
/// frame was accepted. The step after a drain yields without reading.
#[derive(Debug)]
pub struct ReceiverTask<S> {
    receiver: FrameReceiver,
    sink: S,
    state: RxState,
    acks_sent: u64,
}

impl<S: FrameSink> ReceiverTask<S> {
    /// Create a task with default framing.
    pub fn new(sink: S) -> Self {
        Self::with_config(sink, FrameConfig::default())
    }

    /// Create a task with explicit framing.
    pub fn with_config(sink: S, config: FrameConfig) -> Self {
        Self {
            receiver: FrameReceiver::with_config(config),
            sink,
            state: RxState::AwaitingData,
            acks_sent: 0,
        }
    }

    /// Advance the task by one scheduling step.
    ///
    /// Returns the number of frames delivered to the sink. An acknowledgement
    /// whose publish failed is retried on the next step.
    pub fn step(&mut self, channel: &mut Channel) -> Result<usize> {
        if self.state == RxState::Yielded {
            self.state = RxState::AwaitingData;
            return Ok(0);
        }

        let data = channel.take(Direction::Forward);
        if data.is_none() && !self.receiver.ack_pending() {
            return Ok(0);
        }

        let mut delivered = 0;
        for &byte in data.as_deref().unwrap_or_default() {
            match self.receiver.process_byte(byte) {
                Outcome::Success => {
                    if let Some(frame) = self.receiver.take_frame() {
                        self.sink.on_frame(&frame.payload);
                        delivered += 1;
                    }
                }
                Outcome::Error(err) => {
                    debug!(error = %err, "dropped invalid frame");
                }
                Outcome::Waiting => {}
            }
        }

        // The request stays owed until the publish succeeds.
        if self.receiver.ack_pending() {
            channel.publish(Direction::Reverse, &[ACK])?;
            self.receiver.take_ack_request();
            self.acks_sent += 1;
            debug!(frames = delivered, "ack published");
        }

        self.state = RxState::Yielded;
        Ok(delivered)
    }

    pub fn state(&self) -> RxState {
        self.state
    }

    /// The embedded state machine.
    pub fn receiver(&self) -> &FrameReceiver {
        &self.receiver
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Acknowledgements published since construction.
    pub fn acks_sent(&self) -> u64 {
        self.acks_sent
    }
}
