//! Blocking byte-transport abstraction for device links.
//!
//! A [`Transport`] moves raw bytes between the host and a device. It knows
//! nothing about frames or reliability; those live in the layers above.
//! Reads are bounded by the transport's own read timeout and return an empty
//! buffer when nothing arrives in time — a timeout is ordinary, not an error.
//!
//! Two concrete transports ship here:
//! - [`Loopback`]: an in-memory duplex pair for tests and local tooling.
//! - [`UdsTransport`]: a Unix domain socket adapter (Unix only).

pub mod error;
pub mod loopback;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use loopback::Loopback;
pub use traits::Transport;

#[cfg(unix)]
pub use uds::UdsTransport;
