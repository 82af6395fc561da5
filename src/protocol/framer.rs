//! Marker-delimited frame extraction for the board's text protocol.
//!
//! The board emits frames as:
//!
//!   `!<content>!`
//!
//! The same byte opens and closes a frame, so the closing marker of one frame is kept as
//! the opening marker of the next (`!A!B!` yields `A` then `B`). Bytes before the first
//! marker are line noise and are discarded once a marker shows up. The buffer is capped;
//! an unterminated run longer than the cap resets it.
use bytes::{Buf, BytesMut};

/// Frame delimiter byte.
pub const FRAME_MARKER: u8 = b'!';

/// Hard cap on buffered, not-yet-framed bytes.
pub const RECEIVE_BUFFER_CAPACITY: usize = 1024;

/// Incremental `!...!` framer. Feed it arbitrary chunks; it yields frame contents.
#[derive(Debug)]
pub struct MarkerFramer {
    buf: BytesMut,
    capacity: usize,
}

/// Result of feeding one chunk.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Drained {
    /// Contents of every frame completed by this chunk, in arrival order.
    pub frames: Vec<Vec<u8>>,
    /// The buffer overflowed without a terminator and was cleared.
    pub reset: bool,
}

impl MarkerFramer {
    pub fn new() -> Self {
        Self::with_capacity(RECEIVE_BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Extract the next complete frame's content, if one is buffered.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let start = self.buf.iter().position(|&b| b == FRAME_MARKER)?;
        let end = match self.buf[start + 1..]
            .iter()
            .position(|&b| b == FRAME_MARKER)
        {
            Some(offset) => start + 1 + offset,
            None => {
                // Partial frame: keep from the opening marker on.
                self.buf.advance(start);
                return None;
            }
        };
        let content = self.buf[start + 1..end].to_vec();
        // Closing marker stays as the next frame's opening marker.
        self.buf.advance(end);
        Some(content)
    }

    /// Append `data`, extract all complete frames, then enforce the capacity.
    pub fn push_and_drain(&mut self, data: &[u8]) -> Drained {
        self.push(data);
        let mut drained = Drained::default();
        while let Some(frame) = self.next_frame() {
            drained.frames.push(frame);
        }
        // After draining at most one marker remains, so nothing complete is lost here.
        if self.buf.len() > self.capacity {
            self.buf.clear();
            drained.reset = true;
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl Default for MarkerFramer {
    fn default() -> Self {
        Self::new()
    }
}
