/// Errors that can occur during frame encoding or stream I/O.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload is empty; a frame carries at least one byte.
    #[error("payload must not be empty")]
    EmptyPayload,

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// Whether the caller passed a payload that can never be framed.
    pub fn is_invalid_param(&self) -> bool {
        matches!(
            self,
            FrameError::EmptyPayload | FrameError::PayloadTooLarge { .. }
        )
    }
}

/// Why a frame that passed `STX` was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    /// The checksum byte does not match the payload.
    #[error("checksum mismatch (received {received:#04x}, computed {computed:#04x})")]
    ChecksumMismatch { received: u8, computed: u8 },

    /// The byte in terminator position was not `ETX`.
    #[error("missing ETX terminator (found {found:#04x})")]
    MissingEtx { found: u8 },
}

pub type Result<T> = std::result::Result<T, FrameError>;
