use bytes::{BufMut, BytesMut};
use tracing::{debug, trace};

use crate::codec::{Frame, FrameConfig, ETX, MAX_PAYLOAD, STX};
use crate::error::FramingError;

/// Position of the receiver within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceiverState {
    /// Discarding bytes until `STX`.
    WaitStart,
    /// Expecting the payload length.
    WaitLength,
    /// Collecting payload bytes.
    WaitData,
    /// Expecting the checksum byte.
    WaitChecksum,
    /// Expecting `ETX`.
    WaitEnd,
    /// A frame was just accepted. The next byte restarts at `WaitStart`.
    MessageReady,
    /// A frame was just rejected. The next byte restarts at `WaitStart`.
    MessageError,
}

impl ReceiverState {
    /// Whether the state marks the end of a frame.
    pub fn is_terminal(self) -> bool {
        matches!(self, ReceiverState::MessageReady | ReceiverState::MessageError)
    }
}

/// Result of feeding one byte to a [`FrameReceiver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The byte was consumed; no frame completed.
    Waiting,
    /// The byte completed a valid frame.
    Success,
    /// The byte completed a frame that failed validation.
    Error(FramingError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }
}

/// Counters kept by a [`FrameReceiver`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Frames that passed checksum and terminator checks.
    pub frames_accepted: u64,
    /// Frames rejected at the terminator position.
    pub frames_rejected: u64,
    /// Bytes ignored while hunting for `STX`.
    pub bytes_discarded: u64,
    /// Length bytes of 0 or above the configured bound.
    pub lengths_rejected: u64,
}

/// Incremental frame parser.
///
/// Feed bytes one at a time with [`FrameReceiver::process_byte`]. Memory use
/// is fixed at construction; frames may be split across any number of calls.
/// After every accepted or rejected frame the receiver returns to
/// [`ReceiverState::WaitStart`] by itself, so a damaged frame only costs the
/// bytes up to the next `STX`.
#[derive(Debug)]
pub struct FrameReceiver {
    state: ReceiverState,
    expected_len: usize,
    buf: BytesMut,
    received: usize,
    received_checksum: u8,
    computed_checksum: u8,
    frame_ready: bool,
    send_ack: bool,
    config: FrameConfig,
    stats: ReceiverStats,
}

impl FrameReceiver {
    /// Create a receiver with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a receiver with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            state: ReceiverState::WaitStart,
            expected_len: 0,
            buf: BytesMut::with_capacity(MAX_PAYLOAD),
            received: 0,
            received_checksum: 0,
            computed_checksum: 0,
            frame_ready: false,
            send_ack: false,
            config,
            stats: ReceiverStats::default(),
        }
    }

    /// Advance the state machine by one byte.
    pub fn process_byte(&mut self, byte: u8) -> Outcome {
        match self.state {
            ReceiverState::WaitStart => {
                if byte == STX {
                    self.begin_frame();
                    self.state = ReceiverState::WaitLength;
                } else {
                    self.stats.bytes_discarded += 1;
                }
                Outcome::Waiting
            }
            ReceiverState::WaitLength => {
                let len = usize::from(byte);
                if len == 0 || len > self.config.payload_limit() {
                    trace!(len, "invalid length, dropping frame");
                    self.stats.lengths_rejected += 1;
                    self.state = ReceiverState::WaitStart;
                } else {
                    self.expected_len = len;
                    self.state = ReceiverState::WaitData;
                }
                Outcome::Waiting
            }
            ReceiverState::WaitData => {
                self.buf.put_u8(byte);
                self.computed_checksum = self.config.checksum.fold(self.computed_checksum, byte);
                self.received += 1;
                if self.received == self.expected_len {
                    self.state = ReceiverState::WaitChecksum;
                }
                Outcome::Waiting
            }
            ReceiverState::WaitChecksum => {
                self.received_checksum = byte;
                self.state = ReceiverState::WaitEnd;
                Outcome::Waiting
            }
            ReceiverState::WaitEnd => self.finish_frame(byte),
            ReceiverState::MessageReady | ReceiverState::MessageError => {
                self.frame_ready = false;
                self.state = ReceiverState::WaitStart;
                self.process_byte(byte)
            }
        }
    }

    /// Current state.
    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// Whether a validated frame is waiting to be collected.
    pub fn is_frame_ready(&self) -> bool {
        self.frame_ready
    }

    /// Borrow the validated payload, if a frame is ready.
    pub fn payload(&self) -> Option<&[u8]> {
        self.frame_ready.then_some(&self.buf[..])
    }

    /// Collect the validated frame and clear the ready flag.
    pub fn take_frame(&mut self) -> Option<Frame> {
        if !self.frame_ready {
            return None;
        }
        self.frame_ready = false;
        Some(Frame::new(self.buf.split().freeze()))
    }

    /// Whether an acknowledgement is owed.
    pub fn ack_pending(&self) -> bool {
        self.send_ack
    }

    /// Consume the acknowledgement request, returning whether one was owed.
    pub fn take_ack_request(&mut self) -> bool {
        std::mem::take(&mut self.send_ack)
    }

    /// Drop any partial frame and return to `WaitStart`.
    pub fn reset(&mut self) {
        self.state = ReceiverState::WaitStart;
        self.begin_frame();
        self.send_ack = false;
    }

    /// Configuration in effect.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Counters since construction.
    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }

    fn begin_frame(&mut self) {
        self.expected_len = 0;
        self.buf.clear();
        self.received = 0;
        self.received_checksum = 0;
        self.computed_checksum = 0;
        self.frame_ready = false;
    }

    fn finish_frame(&mut self, byte: u8) -> Outcome {
        let outcome = if byte != ETX {
            Outcome::Error(FramingError::MissingEtx { found: byte })
        } else if self.received_checksum != self.computed_checksum {
            Outcome::Error(FramingError::ChecksumMismatch {
                received: self.received_checksum,
                computed: self.computed_checksum,
            })
        } else {
            Outcome::Success
        };

        match outcome {
            Outcome::Success => {
                self.frame_ready = true;
                self.send_ack = true;
                self.stats.frames_accepted += 1;
                self.state = ReceiverState::MessageReady;
                debug!(len = self.expected_len, "frame accepted");
            }
            Outcome::Error(err) => {
                self.stats.frames_rejected += 1;
                self.state = ReceiverState::MessageError;
                debug!(len = self.expected_len, error = %err, "frame rejected");
            }
            Outcome::Waiting => {}
        }
        outcome
    }
}

impl Default for FrameReceiver {
    fn default() -> Self {
        Self::new()
    }
}
