//! Byte-stuffing codec (consistent-overhead style).
//!
//! Removes every `0x00` from arbitrary data so the delimiter can mark message
//! boundaries unambiguously on a byte stream. Data is partitioned into runs
//! of non-delimiter bytes; each run is prefixed by a code byte counting the
//! bytes until the next delimiter, or `0xFF` for a forced split after 254
//! bytes with no delimiter implied. Encoded output ends with the delimiter
//! and contains it nowhere else.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// The reserved frame delimiter byte.
pub const DELIMITER: u8 = 0x00;

/// Longest run of data bytes a single code byte can cover.
const MAX_RUN: usize = 254;

/// Code byte marking a forced split: 254 data bytes, no delimiter implied.
const FORCED_SPLIT: u8 = 0xFF;

/// Stuff a whole buffer. The result ends with [`DELIMITER`] and contains it
/// nowhere else.
pub fn stuff(data: &[u8]) -> Bytes {
    let mut enc = Stuffer::begin();
    enc.feed(data);
    enc.finish()
}

/// Incremental byte-stuffing encoder.
///
/// Feeding chunks produces output identical to [`stuff`] on their
/// concatenation, so a header and payload can be stuffed without first
/// copying them into one buffer.
pub struct Stuffer {
    out: BytesMut,
    /// Pending run of non-delimiter bytes, at most [`MAX_RUN`] long.
    run: Vec<u8>,
}

impl Stuffer {
    /// Start a new encoding.
    pub fn begin() -> Self {
        Self {
            out: BytesMut::with_capacity(64),
            run: Vec::with_capacity(MAX_RUN),
        }
    }

    /// Feed a chunk of raw data.
    pub fn feed(&mut self, data: &[u8]) {
        for &byte in data {
            if byte == DELIMITER {
                self.flush_run();
            } else {
                self.run.push(byte);
                if self.run.len() == MAX_RUN {
                    self.out.put_u8(FORCED_SPLIT);
                    self.out.put_slice(&self.run);
                    self.run.clear();
                }
            }
        }
    }

    /// Terminate the encoding: emit the final run and the delimiter.
    pub fn finish(mut self) -> Bytes {
        self.flush_run();
        self.out.put_u8(DELIMITER);
        self.out.freeze()
    }

    fn flush_run(&mut self) {
        self.out.put_u8(self.run.len() as u8 + 1);
        self.out.put_slice(&self.run);
        self.run.clear();
    }
}

/// Unstuff one encoded fragment, including its trailing delimiter.
///
/// Never fails for output of [`stuff`]; corrupt streams yield a framing
/// error.
pub fn unstuff(input: &[u8]) -> Result<Vec<u8>> {
    if input.len() < 2 {
        return Err(FrameError::TooShort(input.len()));
    }

    let mut out = Vec::with_capacity(input.len());
    let mut pos = 0usize;
    loop {
        let code = input[pos];
        if code == DELIMITER {
            if pos == input.len() - 1 {
                return Ok(out);
            }
            return Err(FrameError::EmbeddedDelimiter(pos));
        }

        let run_len = code as usize - 1;
        let run_end = pos + 1 + run_len;
        // The run must stop short of the trailing delimiter.
        if run_end > input.len() - 1 {
            return Err(FrameError::TruncatedRun {
                offset: pos,
                needed: run_len,
                available: (input.len() - 1).saturating_sub(pos + 1),
            });
        }

        let run = &input[pos + 1..run_end];
        if let Some(i) = run.iter().position(|&b| b == DELIMITER) {
            return Err(FrameError::EmbeddedDelimiter(pos + 1 + i));
        }
        out.extend_from_slice(run);
        pos = run_end;

        // A full-length code carries no implied delimiter; otherwise one is
        // implied unless the terminator follows immediately.
        if code != FORCED_SPLIT && input[pos] != DELIMITER {
            out.push(DELIMITER);
        }
    }
}
