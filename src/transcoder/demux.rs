//! Frame demultiplexer for the transcoder's stdout byte stream.
//!
//! ffmpeg writes one JPEG after another to a pipe with no length prefix, so
//! frames are recovered by watching for the JPEG end-of-image marker. Only the
//! trailing two bytes of each incoming chunk are inspected: the transcoder
//! flushes a whole image per write, so a chunk that completes an image ends
//! exactly on the marker. A marker split across two chunks is not detected and
//! the two images come out as one malformed frame.

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};

/// JPEG end-of-image marker terminating every frame.
pub const FRAME_BOUNDARY_MARKER: [u8; 2] = [0xFF, 0xD9];

/// Error type for demultiplexing with a pending-size cap.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DemuxError {
    /// The in-progress frame grew past the configured cap without a marker.
    #[error("Pending frame exceeded {limit} bytes without an end-of-image marker ({pending} bytes buffered)")]
    FrameTooLarge { pending: usize, limit: usize },
}

/// One complete image, in arrival order.
#[derive(Debug, Clone)]
pub struct Frame {
    data: Bytes,
    sequence: u64,
    received_at: DateTime<Utc>,
}

impl Frame {
    /// The encoded image bytes, ending with [`FRAME_BOUNDARY_MARKER`].
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Position of this frame among all frames emitted by the same demuxer.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// When the final chunk of this frame arrived.
    #[must_use]
    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Size of the encoded image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the frame holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Consume the frame, returning the shared byte buffer.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// Reassembles arbitrarily chunked stdout data into complete frames.
#[derive(Debug, Default)]
pub struct FrameDemuxer {
    chunks: Vec<Bytes>,
    pending: usize,
    max_pending: Option<usize>,
    next_sequence: u64,
}

impl FrameDemuxer {
    /// Create a demuxer with no cap on the in-progress frame.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a demuxer that rejects in-progress frames larger than `limit` bytes.
    ///
    /// The cap only applies through [`FrameDemuxer::try_feed`].
    #[must_use]
    pub fn with_max_pending(limit: usize) -> Self {
        Self {
            max_pending: Some(limit),
            ..Self::default()
        }
    }

    /// Number the next emitted frame `sequence` instead of 0.
    #[must_use]
    pub fn starting_at(mut self, sequence: u64) -> Self {
        self.next_sequence = sequence;
        self
    }

    /// The configured pending-size cap, if any.
    #[must_use]
    pub fn max_pending(&self) -> Option<usize> {
        self.max_pending
    }

    /// Number of bytes accumulated for the frame in progress.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending
    }

    /// Append a chunk and return the completed frame if the chunk ends on the marker.
    ///
    /// Chunks shorter than two bytes are buffered but never complete a frame.
    pub fn feed(&mut self, chunk: impl Into<Bytes>) -> Option<Frame> {
        let chunk = chunk.into();
        let terminated = chunk.ends_with(&FRAME_BOUNDARY_MARKER);

        if !chunk.is_empty() {
            self.pending += chunk.len();
            self.chunks.push(chunk);
        }

        if terminated {
            Some(self.take_frame())
        } else {
            None
        }
    }

    /// Like [`FrameDemuxer::feed`], but enforces the pending-size cap.
    ///
    /// When the cap is exceeded the in-progress bytes are discarded.
    ///
    /// # Errors
    ///
    /// Returns `DemuxError::FrameTooLarge` if the unterminated frame outgrows the cap.
    pub fn try_feed(&mut self, chunk: impl Into<Bytes>) -> Result<Option<Frame>, DemuxError> {
        let frame = self.feed(chunk);
        if frame.is_some() {
            return Ok(frame);
        }

        match self.max_pending {
            Some(limit) if self.pending > limit => {
                let pending = self.pending;
                self.reset();
                Err(DemuxError::FrameTooLarge { pending, limit })
            }
            _ => Ok(None),
        }
    }

    /// Discard any in-progress bytes without emitting a frame.
    pub fn reset(&mut self) {
        if self.pending > 0 {
            tracing::debug!(discarded = self.pending, "Discarding partial frame");
        }
        self.chunks.clear();
        self.pending = 0;
    }

    fn take_frame(&mut self) -> Frame {
        let data = if self.chunks.len() == 1 {
            self.chunks.pop().unwrap_or_default()
        } else {
            let mut joined = BytesMut::with_capacity(self.pending);
            for chunk in self.chunks.drain(..) {
                joined.extend_from_slice(&chunk);
            }
            joined.freeze()
        };
        self.pending = 0;

        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.saturating_add(1);
        tracing::trace!(sequence, len = data.len(), "Frame complete");

        Frame {
            data,
            sequence,
            received_at: Utc::now(),
        }
    }
}
