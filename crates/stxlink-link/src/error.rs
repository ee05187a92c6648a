/// Errors that can occur while driving a link.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Channel-level error.
    #[error("channel error: {0}")]
    Channel(#[from] stxlink_channel::ChannelError),

    /// Frame-level error (invalid payload).
    #[error("frame error: {0}")]
    Frame(#[from] stxlink_frame::FrameError),

    /// A frame is already awaiting acknowledgement.
    #[error("a frame is already in flight")]
    SendInProgress,

    /// The transmitter was stepped with no payload queued.
    #[error("no payload queued for sending")]
    NothingToSend,

    /// The retry ceiling was reached without an acknowledgement.
    #[error("no acknowledgement after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// The step budget ran out before the send completed.
    #[error("send did not complete within {0} steps")]
    StepLimit(u64),
}

impl LinkError {
    /// Whether the caller passed a payload that can never be framed.
    pub fn is_invalid_param(&self) -> bool {
        matches!(self, LinkError::Frame(err) if err.is_invalid_param())
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
