//! Length-prefixed framing.
//!
//! Every unit on the wire is a 4-byte big-endian length followed by
//! exactly that many payload bytes:
//!
//! ```text
//! ┌──────────────┬───────────────────────────┐
//! │ len: u32 BE  │ payload (len bytes)       │
//! └──────────────┴───────────────────────────┘
//! ```
//!
//! There is no magic number and no version byte, so a corrupt length is
//! indistinguishable from a large one. The decoder therefore enforces a
//! hard ceiling and treats anything above it as fatal for the connection.
//!
//! Both halves are pure transforms over byte buffers. They know nothing
//! about sockets, which keeps them testable without any I/O.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::TransportError;

/// Size of the length prefix in bytes.
pub const HEADER_LEN: usize = 4;

/// Appends one frame (header + payload) to `dst`.
///
/// # Errors
/// Returns [`TransportError::FrameTooLarge`] if the payload is longer than
/// `max_frame_len`. A peer running the same decoder would reject it anyway.
pub fn encode_frame(
    payload: &[u8],
    max_frame_len: usize,
    dst: &mut BytesMut,
) -> Result<(), TransportError> {
    if payload.len() > max_frame_len || payload.len() > u32::MAX as usize {
        return Err(TransportError::FrameTooLarge {
            len: payload.len(),
            max: max_frame_len,
        });
    }
    dst.reserve(HEADER_LEN + payload.len());
    dst.put_u32(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Incremental decoder that turns an arbitrary byte stream into frames.
///
/// Feed it whatever the socket hands you with [`extend`](Self::extend),
/// then pull complete payloads with [`decode_next`](Self::decode_next) or
/// [`frames`](Self::frames). Incomplete frames stay buffered across calls;
/// nothing is emitted until the whole payload has arrived.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    max_frame_len: usize,
    /// Set once a ceiling violation has been seen. A poisoned decoder
    /// never yields another frame.
    poisoned: Option<usize>,
}

impl FrameDecoder {
    /// Default reject threshold for a declared frame length.
    pub const DEFAULT_MAX_FRAME_LEN: usize = 2_000_000;

    /// Creates a decoder with the default ceiling.
    pub fn new() -> Self {
        Self::with_max_frame_len(Self::DEFAULT_MAX_FRAME_LEN)
    }

    /// Creates a decoder that rejects frames longer than `max_frame_len`.
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(8 * 1024),
            max_frame_len,
            poisoned: None,
        }
    }

    /// Number of bytes buffered but not yet emitted as a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Appends raw bytes received from the peer.
    pub fn extend(&mut self, data: &[u8]) {
        if self.poisoned.is_none() {
            self.buf.extend_from_slice(data);
        }
    }

    /// Extracts the next complete payload, if one is buffered.
    ///
    /// Returns `Ok(None)` when fewer than 4 header bytes are available or
    /// the declared payload has not fully arrived yet.
    ///
    /// # Errors
    /// Returns [`TransportError::FrameTooLarge`] when the declared length
    /// exceeds the ceiling. All buffered data is discarded and every later
    /// call returns the same error.
    pub fn decode_next(&mut self) -> Result<Option<Bytes>, TransportError> {
        if let Some(len) = self.poisoned {
            return Err(self.too_large(len));
        }
        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }

        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&self.buf[..HEADER_LEN]);
        let len = u32::from_be_bytes(header) as usize;

        if len > self.max_frame_len {
            self.buf.clear();
            self.poisoned = Some(len);
            return Err(self.too_large(len));
        }
        if self.buf.len() < HEADER_LEN + len {
            // Make room for the rest of the frame in one allocation.
            self.buf.reserve(HEADER_LEN + len - self.buf.len());
            return Ok(None);
        }

        self.buf.advance(HEADER_LEN);
        Ok(Some(self.buf.split_to(len).freeze()))
    }

    /// Iterates over every complete frame currently buffered.
    ///
    /// The iterator stops at the first incomplete frame and can be
    /// recreated after more bytes are fed in. A framing error is yielded
    /// once and ends the iteration.
    pub fn frames(&mut self) -> Frames<'_> {
        Frames {
            decoder: self,
            done: false,
        }
    }

    fn too_large(&self, len: usize) -> TransportError {
        TransportError::FrameTooLarge {
            len,
            max: self.max_frame_len,
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator returned by [`FrameDecoder::frames`].
pub struct Frames<'a> {
    decoder: &'a mut FrameDecoder,
    done: bool,
}

impl Iterator for Frames<'_> {
    type Item = Result<Bytes, TransportError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.decoder.decode_next() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
