use bytes::BytesMut;
use tracing::debug;

use crate::codec::Frame;
use crate::stuffing::{unstuff, DELIMITER};

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Incremental frame extractor for a delimiter-terminated byte stream.
///
/// Feed raw transport bytes with [`push`](Self::push); pull complete frames
/// with [`next_frame`](Self::next_frame). Fragments that fail unstuffing,
/// structural parsing, or checksum verification are dropped and the scan
/// resumes at the next delimiter, so one corrupted frame never desynchronizes
/// the stream.
#[derive(Default)]
pub struct Deframer {
    buf: BytesMut,
}

impl Deframer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Append raw bytes read from the transport.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Extract the next valid frame, if a complete one is buffered.
    ///
    /// Corrupt fragments are logged and skipped; `None` means more bytes are
    /// needed.
    pub fn next_frame(&mut self) -> Option<Frame> {
        while let Some(end) = self.buf.iter().position(|&b| b == DELIMITER) {
            let fragment = self.buf.split_to(end + 1);

            let raw = match unstuff(&fragment) {
                Ok(raw) => raw,
                Err(err) => {
                    debug!(%err, len = fragment.len(), "dropping unframeable fragment");
                    continue;
                }
            };

            match Frame::parse(&raw) {
                Ok(frame) => return Some(frame),
                Err(err) => {
                    debug!(%err, len = raw.len(), "dropping corrupt frame");
                    continue;
                }
            }
        }
        None
    }

    /// Number of buffered bytes not yet forming a complete fragment.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }
}
