use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Start-of-frame marker.
pub const STX: u8 = 0x02;

/// End-of-frame marker.
pub const ETX: u8 = 0x03;

/// Single-byte acknowledgement sent back for every validated frame.
pub const ACK: u8 = 0x06;

/// Framing bytes around the payload: STX + LEN + CHK + ETX.
pub const FRAME_OVERHEAD: usize = 4;

/// Largest payload a frame can carry; the length field is one byte.
pub const MAX_PAYLOAD: usize = 255;

/// Largest frame on the wire.
pub const MAX_FRAME_SIZE: usize = MAX_PAYLOAD + FRAME_OVERHEAD;

/// Checksum fold applied to the payload bytes.
///
/// Chosen once per codec/receiver instance through [`FrameConfig`]; both
/// ends of a link must agree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ChecksumKind {
    /// XOR of every payload byte.
    #[default]
    Xor,
    /// Wrapping (mod 256) sum of every payload byte.
    Sum,
}

impl ChecksumKind {
    /// Fold one byte into a running checksum.
    #[inline]
    pub fn fold(self, acc: u8, byte: u8) -> u8 {
        match self {
            ChecksumKind::Xor => acc ^ byte,
            ChecksumKind::Sum => acc.wrapping_add(byte),
        }
    }

    /// Checksum of a whole payload. An empty payload yields 0.
    pub fn compute(self, data: &[u8]) -> u8 {
        data.iter().fold(0, |acc, &byte| self.fold(acc, byte))
    }

    /// Name used in logs and CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            ChecksumKind::Xor => "xor",
            ChecksumKind::Sum => "sum",
        }
    }
}

/// XOR checksum of `data`.
pub fn checksum(data: &[u8]) -> u8 {
    ChecksumKind::Xor.compute(data)
}

/// A validated frame payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (framing + payload).
    pub fn wire_size(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }
}

/// Configuration shared by the encoder and the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default and ceiling: [`MAX_PAYLOAD`].
    pub max_payload_size: usize,
    /// Checksum fold. Default: XOR.
    pub checksum: ChecksumKind,
}

impl FrameConfig {
    /// Effective payload bound; never above what the length byte can express.
    pub fn payload_limit(&self) -> usize {
        self.max_payload_size.min(MAX_PAYLOAD)
    }

    /// Effective frame bound.
    pub fn frame_limit(&self) -> usize {
        self.payload_limit() + FRAME_OVERHEAD
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD,
            checksum: ChecksumKind::Xor,
        }
    }
}

/// Encode a payload into the wire format using the default configuration.
///
/// Wire format:
/// ```text
/// ┌───────┬──────────┬──────────────────┬──────────┬───────┐
/// │ STX   │ LEN (1B) │ DATA (LEN bytes) │ CHK (1B) │ ETX   │
/// │ 0x02  │ 1..=255  │                  │ XOR(DATA)│ 0x03  │
/// └───────┴──────────┴──────────────────┴──────────┴───────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    encode_frame_with(&FrameConfig::default(), payload, dst)
}

/// Encode a payload into the wire format with explicit configuration.
///
/// Nothing is written to `dst` when the payload is rejected.
pub fn encode_frame_with(config: &FrameConfig, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.is_empty() {
        return Err(FrameError::EmptyPayload);
    }
    let max = config.payload_limit();
    if payload.len() > max {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max,
        });
    }

    dst.reserve(FRAME_OVERHEAD + payload.len());
    dst.put_u8(STX);
    dst.put_u8(payload.len() as u8);
    dst.put_slice(payload);
    dst.put_u8(config.checksum.compute(payload));
    dst.put_u8(ETX);
    Ok(())
}

/// Encode a payload into a standalone frame buffer.
pub fn encode(payload: &[u8]) -> Result<Bytes> {
    encode_with(&FrameConfig::default(), payload)
}

/// Encode a payload into a standalone frame buffer with explicit configuration.
pub fn encode_with(config: &FrameConfig, payload: &[u8]) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(FRAME_OVERHEAD + payload.len());
    encode_frame_with(config, payload, &mut buf)?;
    Ok(buf.freeze())
}
