use bytes::{Bytes, BytesMut};

use crate::error::{ChannelError, Result};

/// Default slot capacity: the largest stxlink frame (255 payload bytes + 4 framing bytes).
pub const DEFAULT_SLOT_CAPACITY: usize = 259;

/// A single-message mailbox for one direction of a channel.
///
/// Contents and length are written before the ready flag is raised, and the
/// flag is lowered only by the consumer after it has collected the contents.
#[derive(Debug)]
pub struct Slot {
    buf: BytesMut,
    ready: bool,
    capacity: usize,
}

impl Slot {
    /// Create an empty slot able to hold `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            ready: false,
            capacity,
        }
    }

    /// Replace the slot contents and mark it ready.
    ///
    /// Returns `true` when an unread message was overwritten. A rejected
    /// write leaves the slot untouched.
    pub fn write(&mut self, data: &[u8]) -> Result<bool> {
        self.check(data)?;

        let overwrote = self.ready;
        self.buf.clear();
        self.buf.extend_from_slice(data);
        self.ready = true;
        Ok(overwrote)
    }

    /// Check that `data` would be accepted by [`Slot::write`].
    pub fn check(&self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Err(ChannelError::EmptyWrite);
        }
        if data.len() > self.capacity {
            return Err(ChannelError::TooLarge {
                size: data.len(),
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Whether a message is pending collection.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Borrow the pending message without consuming it.
    pub fn peek(&self) -> Option<&[u8]> {
        self.ready.then_some(&self.buf[..])
    }

    /// Collect the pending message and clear the ready flag.
    pub fn take(&mut self) -> Option<Bytes> {
        if !self.ready {
            return None;
        }
        self.ready = false;
        Some(self.buf.split().freeze())
    }

    /// Discard any pending message.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.ready = false;
    }

    /// Length of the pending message (0 when empty).
    pub fn len(&self) -> usize {
        if self.ready {
            self.buf.len()
        } else {
            0
        }
    }

    /// Whether no message is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum message size accepted by [`Slot::write`].
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Mutable view of the pending message, used for fault injection.
    pub(crate) fn pending_mut(&mut self) -> Option<&mut [u8]> {
        if self.ready {
            Some(&mut self.buf[..])
        } else {
            None
        }
    }
}

impl Default for Slot {
    fn default() -> Self {
        Self::new(DEFAULT_SLOT_CAPACITY)
    }
}
