//! Frame reassembly for chunked event streams.
//!
//! The server pushes `data: <json>\n\n` frames over a chunked response body.
//! The transport gives no frame-boundary guarantees: one chunk may carry many
//! frames, a frame may span many chunks, and the delimiter or a multi-byte
//! code point may itself be split across chunks. The reassembler buffers raw
//! bytes and yields only complete frames, in arrival order.

use tracing::trace;

/// Frame delimiter: two consecutive line breaks.
const DELIMITER: &[u8] = b"\n\n";

/// Stateful reassembler turning raw byte chunks into complete frames.
///
/// A trailing segment that never receives its delimiter is *not* a frame:
/// on end of stream the residual buffer is discarded, because a partial
/// payload cannot be safely decoded. Callers observe the discard via
/// [`residual_len`](Self::residual_len).
#[derive(Debug, Default)]
pub struct FrameReassembler {
    buffer: Vec<u8>,
}

impl FrameReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one chunk and return every frame it completed.
    ///
    /// Frames come back without their trailing delimiter. No byte is ever
    /// dropped: whatever follows the last delimiter stays buffered as the
    /// seed of the next frame.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = find_delimiter(&self.buffer) {
            let rest = self.buffer.split_off(pos + DELIMITER.len());
            self.buffer.truncate(pos);
            let frame = std::mem::replace(&mut self.buffer, rest);
            frames.push(String::from_utf8_lossy(&frame).into_owned());
        }

        trace!(
            chunk_len = chunk.len(),
            frame_count = frames.len(),
            buffered = self.buffer.len(),
            "chunk reassembled"
        );
        frames
    }

    /// Bytes still buffered without a terminating delimiter.
    ///
    /// Non-zero at end of stream means the producer stopped mid-frame; that
    /// data is treated as never sent.
    pub fn residual_len(&self) -> usize {
        self.buffer.len()
    }
}

fn find_delimiter(buffer: &[u8]) -> Option<usize> {
    buffer.windows(DELIMITER.len()).position(|w| w == DELIMITER)
}
