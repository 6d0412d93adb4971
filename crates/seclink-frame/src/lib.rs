//! Byte-stuffed framing with CRC-16 integrity for device links.
//!
//! This is the wire layer of seclink. Every message is:
//! - A 14-byte little-endian header (tag, sequence numbers, flags, checksum,
//!   payload length) followed by the payload
//! - Byte-stuffed so the payload can contain anything, and terminated with a
//!   single `0x00` delimiter for stream synchronization
//!
//! No partial reads, no delimiter ambiguity in user code.

pub mod codec;
pub mod deframer;
pub mod error;
pub mod stuffing;

pub use codec::{crc16, flags, Frame, Header, HEADER_SIZE};
pub use deframer::Deframer;
pub use error::{FrameError, Result};
pub use stuffing::{stuff, unstuff, Stuffer, DELIMITER};
