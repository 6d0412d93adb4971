use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::time::Duration;

use tracing::trace;

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// Default read timeout for loopback reads.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// An in-memory duplex transport.
///
/// `Loopback::pair()` yields two connected endpoints; bytes written to one
/// become readable on the other. Used to wire an initiator and a responder
/// session together in tests and local tooling without real hardware.
pub struct Loopback {
    tx: Sender<Vec<u8>>,
    rx: Mutex<Receiver<Vec<u8>>>,
    /// Leftover bytes from a chunk larger than a read's `max_len`.
    pending: Mutex<Vec<u8>>,
    read_timeout: Duration,
}

impl Loopback {
    /// Create a connected pair with the default read timeout.
    pub fn pair() -> (Self, Self) {
        Self::pair_with_timeout(DEFAULT_READ_TIMEOUT)
    }

    /// Create a connected pair with an explicit read timeout.
    pub fn pair_with_timeout(read_timeout: Duration) -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::channel();
        let (b_tx, a_rx) = mpsc::channel();
        (
            Self::from_parts(a_tx, a_rx, read_timeout),
            Self::from_parts(b_tx, b_rx, read_timeout),
        )
    }

    fn from_parts(tx: Sender<Vec<u8>>, rx: Receiver<Vec<u8>>, read_timeout: Duration) -> Self {
        Self {
            tx,
            rx: Mutex::new(rx),
            pending: Mutex::new(Vec::new()),
            read_timeout,
        }
    }
}

impl Transport for Loopback {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        trace!(len = buf.len(), "loopback write");
        self.tx
            .send(buf.to_vec())
            .map_err(|_| TransportError::Closed)?;
        Ok(buf.len())
    }

    fn read(&self, max_len: usize) -> Result<Vec<u8>> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if pending.is_empty() {
            let rx = self.rx.lock().unwrap_or_else(|e| e.into_inner());
            match rx.recv_timeout(self.read_timeout) {
                Ok(chunk) => *pending = chunk,
                Err(RecvTimeoutError::Timeout) => return Ok(Vec::new()),
                Err(RecvTimeoutError::Disconnected) => return Err(TransportError::Closed),
            }
        }

        let n = pending.len().min(max_len);
        let out = pending.drain(..n).collect();
        Ok(out)
    }
}
