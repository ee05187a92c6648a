/// Errors that can occur when publishing into a channel slot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// A publish carried no bytes.
    #[error("cannot publish an empty message")]
    EmptyWrite,

    /// A publish does not fit in the slot.
    #[error("message too large for slot ({size} bytes, capacity {capacity})")]
    TooLarge { size: usize, capacity: usize },
}

pub type Result<T> = std::result::Result<T, ChannelError>;
