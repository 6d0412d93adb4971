use std::io::{ErrorKind, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// Default read timeout applied to the underlying socket.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Unix domain socket transport.
///
/// Adapts a connected `UnixStream` to the [`Transport`] contract: the OS
/// read timeout supplies the empty-on-timeout read semantics, and reads and
/// writes go through `&UnixStream` so one endpoint can serve the session's
/// background reader and caller threads concurrently.
#[derive(Debug)]
pub struct UdsTransport {
    stream: UnixStream,
}

impl UdsTransport {
    /// Wrap a connected stream, applying the default read timeout.
    pub fn new(stream: UnixStream) -> Result<Self> {
        Self::with_read_timeout(stream, DEFAULT_READ_TIMEOUT)
    }

    /// Wrap a connected stream with an explicit read timeout.
    pub fn with_read_timeout(stream: UnixStream, read_timeout: Duration) -> Result<Self> {
        stream.set_read_timeout(Some(read_timeout))?;
        Ok(Self { stream })
    }

    /// Connect to a listening Unix domain socket (blocking).
    pub fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|e| TransportError::Connect {
            path: path.to_path_buf(),
            source: e,
        })?;
        debug!(?path, "connected to unix domain socket");
        Self::new(stream)
    }

    /// Create a connected pair of socket transports.
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = UnixStream::pair()?;
        Ok((Self::new(left)?, Self::new(right)?))
    }
}

impl Transport for UdsTransport {
    fn write(&self, buf: &[u8]) -> Result<usize> {
        loop {
            match (&self.stream).write(buf) {
                Ok(0) if !buf.is_empty() => return Err(TransportError::Closed),
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn read(&self, max_len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; max_len];
        loop {
            match (&self.stream).read(&mut buf) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(buf);
                }
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock
                        || err.kind() == ErrorKind::TimedOut =>
                {
                    return Ok(Vec::new())
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_roundtrip() {
        let (a, b) = UdsTransport::pair().expect("socket pair should connect");
        a.write(b"hello").expect("write should succeed");
        let got = b.read(64).expect("read should succeed");
        assert_eq!(got, b"hello");
    }

    #[test]
    fn read_timeout_yields_empty() {
        let (a, _b) = UdsTransport::pair().expect("socket pair should connect");
        let got = a.read(64).expect("read should succeed");
        assert!(got.is_empty());
    }

    #[test]
    fn closed_peer_reported_on_read() {
        let (a, b) = UdsTransport::pair().expect("socket pair should connect");
        drop(b);
        assert!(matches!(a.read(64), Err(TransportError::Closed)));
    }

    #[test]
    fn connect_missing_path_fails() {
        let err = UdsTransport::connect("/nonexistent/seclink-test.sock").unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }
}
