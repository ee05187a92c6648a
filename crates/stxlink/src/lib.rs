//! Checksummed STX/ETX framing with stop-and-wait acknowledgement.
//!
//! stxlink moves small payloads across an unreliable byte channel. Each
//! payload travels in a frame (`STX | LEN | DATA | CHK | ETX`), the receiver
//! answers every valid frame with a single `ACK` byte, and the transmitter
//! resends the identical frame until that acknowledgement arrives.
//!
//! # Crate Structure
//!
//! - [`channel`]: Single-slot duplex mailbox with deterministic fault injection
//! - [`frame`]: Frame codec, checksums and the byte-at-a-time receiver
//! - [`link`]: Cooperative transmitter/receiver tasks and their driver (behind `link` feature)

/// Re-export channel types.
pub mod channel {
    pub use stxlink_channel::*;
}

/// Re-export frame types.
pub mod frame {
    pub use stxlink_frame::*;
}

/// Re-export link types (requires `link` feature).
#[cfg(feature = "link")]
pub mod link {
    pub use stxlink_link::*;
}
