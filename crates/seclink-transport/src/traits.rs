use crate::error::Result;

/// A blocking, bidirectional byte transport.
///
/// This is the fundamental I/O boundary of seclink. Implementations wrap a
/// serial port, a socket, or an in-memory pipe; the session layer drives one
/// background thread that reads and any number of caller threads that write,
/// so both operations take `&self` and must be safe to call concurrently.
pub trait Transport: Send + Sync {
    /// Write bytes to the link, returning how many were accepted.
    fn write(&self, buf: &[u8]) -> Result<usize>;

    /// Read up to `max_len` bytes (blocking).
    ///
    /// May return fewer bytes than requested. An empty buffer means the
    /// transport's read timeout elapsed with nothing to deliver — callers
    /// must treat that as ordinary, not as end-of-stream. A closed link is
    /// reported as [`TransportError::Closed`](crate::TransportError::Closed).
    fn read(&self, max_len: usize) -> Result<Vec<u8>>;
}
