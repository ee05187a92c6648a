//! STX/ETX message framing for the stxlink protocol.
//!
//! Every message travels as:
//! - `STX` (0x02) to mark the start of a frame
//! - a 1-byte payload length (1..=255)
//! - the payload bytes
//! - a 1-byte checksum over the payload (XOR fold by default)
//! - `ETX` (0x03) to mark the end of the frame
//!
//! Encoding is a pure function. Decoding is incremental: [`FrameReceiver`]
//! consumes one byte per call, so frames may arrive split across any number
//! of reads. Control bytes inside the payload are not escaped.

pub mod codec;
pub mod error;
pub mod reader;
pub mod receiver;
pub mod writer;

pub use codec::{
    checksum, encode, encode_frame, encode_frame_with, encode_with, ChecksumKind, Frame,
    FrameConfig, ACK, ETX, FRAME_OVERHEAD, MAX_FRAME_SIZE, MAX_PAYLOAD, STX,
};
pub use error::{FrameError, FramingError, Result};
pub use reader::FrameReader;
pub use receiver::{FrameReceiver, Outcome, ReceiverState, ReceiverStats};
pub use writer::FrameWriter;
