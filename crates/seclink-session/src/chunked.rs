//! Multi-chunk transfer operations built from repeated send/wait cycles.
//!
//! Large transfers (event logs, coredumps, firmware images) move as a series
//! of tagged request/response exchanges, threading an offset and a
//! remaining-byte count through successive calls. Any single chunk's failure
//! aborts the whole operation with a terminal error; callers never see
//! partial data presented as success.

use std::time::Duration;

use tracing::{debug, trace};

use crate::envelope::Envelope;
use crate::error::{ProtocolError, Result, SessionError};
use crate::session::Session;

/// One slice of a chunked transfer, as reported by the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Payload bytes of this slice.
    pub data: Vec<u8>,
    /// Bytes the peer still holds after this slice.
    pub remaining: u64,
}

impl<Tx: Envelope, Rx: Envelope> Session<Tx, Rx> {
    /// Pull a complete blob from the peer chunk by chunk.
    ///
    /// `request` builds the outbound envelope for a given byte offset;
    /// `parse` extracts the [`Chunk`] from the peer's reply on `reply_tag`.
    /// The transfer completes when the peer reports zero bytes remaining and
    /// yields the concatenation of all chunks.
    pub fn fetch_chunked(
        &self,
        reply_tag: u32,
        timeout: Duration,
        mut request: impl FnMut(u64) -> Tx,
        mut parse: impl FnMut(Rx) -> Result<Chunk>,
    ) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut offset = 0u64;
        loop {
            let reply = self.request(&request(offset), reply_tag, timeout)?;
            let chunk = parse(reply)?;
            trace!(offset, len = chunk.data.len(), remaining = chunk.remaining, "chunk fetched");

            if chunk.data.is_empty() && chunk.remaining > 0 {
                // A peer that reports progress without delivering any would
                // loop forever.
                return Err(SessionError::Protocol(ProtocolError::StalledTransfer {
                    remaining: chunk.remaining,
                }));
            }

            offset += chunk.data.len() as u64;
            out.extend_from_slice(&chunk.data);
            if chunk.remaining == 0 {
                debug!(total = out.len(), "chunked fetch complete");
                return Ok(out);
            }
        }
    }

    /// Push a blob to the peer chunk by chunk.
    ///
    /// `data` is sliced into `chunk_len`-byte pieces; `request` builds the
    /// envelope for one piece at a given offset, and `accept` validates the
    /// peer's reply on `reply_tag` (returning an error aborts the transfer).
    pub fn push_chunked(
        &self,
        data: &[u8],
        chunk_len: usize,
        reply_tag: u32,
        timeout: Duration,
        mut request: impl FnMut(u64, &[u8]) -> Tx,
        mut accept: impl FnMut(Rx) -> Result<()>,
    ) -> Result<()> {
        let chunk_len = chunk_len.max(1);
        let mut offset = 0u64;
        for chunk in data.chunks(chunk_len) {
            let reply = self.request(&request(offset, chunk), reply_tag, timeout)?;
            accept(reply)?;
            trace!(offset, len = chunk.len(), "chunk pushed");
            offset += chunk.len() as u64;
        }
        debug!(total = data.len(), "chunked push complete");
        Ok(())
    }
}
