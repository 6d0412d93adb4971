//! ARQ reliability engine and multiplexed duplex sessions for device links.
//!
//! This is the "just works" layer. A [`Session`] owns one [`Link`] (the
//! automatic-repeat-request engine) over a pluggable transport, runs a
//! background receive thread, and multiplexes any number of concurrent
//! tagged request/response exchanges over the one physical link.
//!
//! The two ends of a link instantiate the same session type with opposite
//! envelope parameters: the initiator is a `Session<HostEnvelope,
//! DeviceEnvelope>` and the responder a `Session<DeviceEnvelope,
//! HostEnvelope>`, where both envelope types implement [`Envelope`].

mod ack_timer;
mod dispatch;

pub mod chunked;
pub mod config;
pub mod envelope;
pub mod error;
pub mod link;
pub mod session;

pub use chunked::Chunk;
pub use config::LinkConfig;
pub use envelope::Envelope;
pub use error::{ProtocolError, Result, SessionError};
pub use link::Link;
pub use session::Session;
