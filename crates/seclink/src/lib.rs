//! Reliable multiplexed messaging with embedded security devices over
//! unreliable byte links.
//!
//! seclink is the host-side half of a frame-and-acknowledge protocol for
//! talking to a device over a serial-style transport:
//!
//! - [`frame`]: byte-stuffing codec, 14-byte frame header, CRC-16 integrity
//! - [`session`]: ARQ reliability engine and the duplex [`Session`] that
//!   multiplexes tagged request/response exchanges over one link
//! - [`transport`]: the blocking byte-I/O boundary and reference transports
//!
//! ```no_run
//! use std::time::Duration;
//! use seclink::{Envelope, LinkConfig, ProtocolError, Session};
//! use seclink::transport::Loopback;
//!
//! enum HostMsg { Ping(Vec<u8>) }
//!
//! impl Envelope for HostMsg {
//!     fn tag(&self) -> u32 { 1 }
//!     fn encode_payload(&self) -> Result<Vec<u8>, ProtocolError> {
//!         let HostMsg::Ping(data) = self;
//!         Ok(data.clone())
//!     }
//!     fn decode_payload(tag: u32, payload: &[u8]) -> Result<Self, ProtocolError> {
//!         match tag {
//!             1 => Ok(HostMsg::Ping(payload.to_vec())),
//!             other => Err(ProtocolError::UnknownTag(other)),
//!         }
//!     }
//! }
//!
//! let (near, _far) = Loopback::pair();
//! let session: Session<HostMsg, HostMsg> =
//!     Session::new(near, LinkConfig::default()).unwrap();
//! session.start().unwrap();
//! session.send(&HostMsg::Ping(b"hello".to_vec())).unwrap();
//! let reply = session.wait_for(1, Duration::from_secs(1));
//! # let _ = reply;
//! session.stop();
//! ```

pub use seclink_frame as frame;
pub use seclink_session as session;
pub use seclink_transport as transport;

pub use seclink_session::{
    Chunk, Envelope, LinkConfig, ProtocolError, Session, SessionError,
};
pub use seclink_transport::Transport;
