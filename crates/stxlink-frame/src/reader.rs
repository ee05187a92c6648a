use std::io::{ErrorKind, Read};

use bytes::{Buf, BytesMut};
use tracing::debug;

use crate::codec::{Frame, FrameConfig, MAX_FRAME_SIZE};
use crate::error::{FrameError, Result};
use crate::receiver::{FrameReceiver, Outcome, ReceiverStats};

const READ_CHUNK_SIZE: usize = 1024;

/// Reads validated frames from any `Read` stream.
///
/// Bytes are pushed through a [`FrameReceiver`] one at a time. Frames that
/// fail validation are logged and skipped; callers only ever see frames that
/// passed the checksum and terminator checks.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    receiver: FrameReceiver,
    rejected: u64,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(MAX_FRAME_SIZE),
            receiver: FrameReceiver::with_config(config),
            rejected: 0,
        }
    }

    /// Read the next valid frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            while self.buf.has_remaining() {
                let byte = self.buf.get_u8();
                match self.receiver.process_byte(byte) {
                    Outcome::Success => {
                        // Nobody answers on a plain stream.
                        self.receiver.take_ack_request();
                        if let Some(frame) = self.receiver.take_frame() {
                            return Ok(frame);
                        }
                    }
                    Outcome::Error(err) => {
                        self.rejected += 1;
                        debug!(error = %err, "skipping invalid frame");
                    }
                    Outcome::Waiting => {}
                }
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Read every remaining frame until EOF.
    ///
    /// A clean end of stream (or one in the middle of a frame) ends the
    /// iteration; I/O errors are returned.
    pub fn read_to_end(&mut self) -> Result<Vec<Frame>> {
        let mut frames = Vec::new();
        loop {
            match self.read_frame() {
                Ok(frame) => frames.push(frame),
                Err(FrameError::ConnectionClosed) => return Ok(frames),
                Err(err) => return Err(err),
            }
        }
    }

    /// Number of frames rejected so far.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Counters from the underlying receiver.
    pub fn stats(&self) -> ReceiverStats {
        self.receiver.stats()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame configuration.
    pub fn config(&self) -> &FrameConfig {
        self.receiver.config()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::{encode_frame, ChecksumKind, ETX, STX};

    #[test]
    fn read_single_frame() {
        let mut wire = BytesMut::new();
        encode_frame(b"hello", &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.payload.as_ref(), b"hello");
    }

    #[test]
    fn read_multiple_frames() {
        let mut wire = BytesMut::new();
        encode_frame(b"one", &mut wire).unwrap();
        encode_frame(b"two", &mut wire).unwrap();
        encode_frame(b"three", &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));

        let f1 = reader.read_frame().unwrap();
        let f2 = reader.read_frame().unwrap();
        let f3 = reader.read_frame().unwrap();

        assert_eq!(f1.payload.as_ref(), b"one");
        assert_eq!(f2.payload.as_ref(), b"two");
        assert_eq!(f3.payload.as_ref(), b"three");
    }

    #[test]
    fn partial_read_handling() {
        let mut wire = BytesMut::new();
        encode_frame(b"slow", &mut wire).unwrap();

        let byte_reader = ByteByByteReader {
            bytes: wire.to_vec(),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), b"slow");
    }

    #[test]
    fn invalid_frame_is_skipped() {
        let mut wire = BytesMut::new();
        wire.extend_from_slice(&[STX, 2, 0x41, 0x42, 0xFF, ETX]);
        encode_frame(b"good", &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        let frame = reader.read_frame().unwrap();

        assert_eq!(frame.payload.as_ref(), b"good");
        assert_eq!(reader.rejected(), 1);
    }

    #[test]
    fn leading_garbage_is_skipped() {
        let mut wire = BytesMut::from(&[0x00, 0xFF, 0x10][..]);
        encode_frame(b"x", &mut wire).unwrap();

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"x");
        assert_eq!(reader.stats().bytes_discarded, 3);
        assert_eq!(reader.rejected(), 0);
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut reader = FrameReader::new(Cursor::new(vec![STX, 4, b'p', b'a']));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn read_to_end_collects_all() {
        let mut wire = BytesMut::new();
        for payload in [&b"a"[..], &b"bb"[..], &b"ccc"[..]] {
            encode_frame(payload, &mut wire).unwrap();
        }
        wire.extend_from_slice(&[STX, 9]);

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        let frames = reader.read_to_end().unwrap();
        let payloads: Vec<&[u8]> = frames.iter().map(|f| f.payload.as_ref()).collect();
        assert_eq!(payloads, vec![&b"a"[..], &b"bb"[..], &b"ccc"[..]]);
    }

    #[test]
    fn configured_checksum_is_used() {
        let config = FrameConfig {
            checksum: ChecksumKind::Sum,
            ..FrameConfig::default()
        };
        let wire = vec![STX, 2, 0x10, 0x20, 0x30, ETX];
        let mut reader = FrameReader::with_config(Cursor::new(wire), config);

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), &[0x10, 0x20]);
        assert_eq!(reader.config().checksum, ChecksumKind::Sum);
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            if buf.is_empty() {
                return Ok(0);
            }

            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    #[test]
    fn inner_stream_is_returned_after_reading() {
        let mut wire = BytesMut::new();
        encode_frame(b"abc", &mut wire).unwrap();
        let total = wire.len() as u64;

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        reader.read_frame().unwrap();
        assert_eq!(reader.get_ref().position(), total);

        reader.get_mut().set_position(0);
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"abc");
        assert_eq!(reader.into_inner().into_inner().len() as u64, total);
    }

    #[test]
    fn read_would_block_propagates_io_error() {
        let mut wire = BytesMut::new();
        encode_frame(b"ok", &mut wire).unwrap();

        let reader = FailFirstRead {
            kind: ErrorKind::WouldBlock,
            failed: false,
            bytes: wire.to_vec(),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        let err = framed.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn interrupted_read_retries() {
        let mut wire = BytesMut::new();
        encode_frame(b"ok", &mut wire).unwrap();

        let reader = FailFirstRead {
            kind: ErrorKind::Interrupted,
            failed: false,
            bytes: wire.to_vec(),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        let frame = framed.read_frame().unwrap();

        assert_eq!(frame.payload.as_ref(), b"ok");
    }

    struct FailFirstRead {
        kind: ErrorKind,
        failed: bool,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for FailFirstRead {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.failed {
                self.failed = true;
                return Err(std::io::Error::from(self.kind));
            }
            let remaining = self.bytes.len() - self.pos;
            let n = remaining.min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }
}
