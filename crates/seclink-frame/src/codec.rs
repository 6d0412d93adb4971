use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::stuffing::Stuffer;

/// Frame header: tag (4) + send_seq (1) + ack_seq (1) + checksum (2) +
/// flags (2) + reserved (2) + payload_len (2) = 14 bytes, little-endian.
pub const HEADER_SIZE: usize = 14;

/// Header flag bits.
pub mod flags {
    /// The frame acknowledges the last frame accepted from the peer.
    pub const ACK: u16 = 1 << 0;
    /// The frame reports a negative acknowledgment.
    pub const NACK: u16 = 1 << 1;
    /// The payload is encrypted under the secure-channel keys.
    pub const ENCRYPTED: u16 = 1 << 2;
    /// The very first frame sent on a session.
    pub const FIRST_MSG: u16 = 1 << 3;
}

/// The fixed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Application message tag used for multiplexing.
    pub tag: u32,
    /// Sender's sequence number, 1..=255 (0 is reserved).
    pub send_seq: u8,
    /// Last sequence number the sender accepted from its peer.
    pub ack_seq: u8,
    /// CRC-16 over the checksum-zeroed header and the payload.
    pub checksum: u16,
    /// Flag bits, see [`flags`].
    pub flags: u16,
    /// Payload length in bytes.
    pub payload_len: u16,
}

impl Header {
    fn write_to(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.tag);
        dst.put_u8(self.send_seq);
        dst.put_u8(self.ack_seq);
        dst.put_u16_le(self.checksum);
        dst.put_u16_le(self.flags);
        dst.put_u16_le(0); // reserved, must be 0
        dst.put_u16_le(self.payload_len);
    }

    fn read_from(mut src: &[u8]) -> Self {
        let tag = src.get_u32_le();
        let send_seq = src.get_u8();
        let ack_seq = src.get_u8();
        let checksum = src.get_u16_le();
        let flags = src.get_u16_le();
        let _reserved = src.get_u16_le();
        let payload_len = src.get_u16_le();
        Self {
            tag,
            send_seq,
            ack_seq,
            checksum,
            flags,
            payload_len,
        }
    }

    /// True if the given flag bit (or bits) is set.
    pub fn has_flag(&self, bit: u16) -> bool {
        self.flags & bit != 0
    }
}

/// A frame: fixed header plus opaque application payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: Header,
    pub payload: Bytes,
}

impl Frame {
    /// Build a frame with a computed checksum.
    pub fn new(
        tag: u32,
        send_seq: u8,
        ack_seq: u8,
        frame_flags: u16,
        payload: impl Into<Bytes>,
    ) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > u16::MAX as usize {
            return Err(FrameError::PayloadTooLarge(payload.len()));
        }
        let mut header = Header {
            tag,
            send_seq,
            ack_seq,
            checksum: 0,
            flags: frame_flags,
            payload_len: payload.len() as u16,
        };
        header.checksum = checksum_of(&header, &payload);
        Ok(Self { header, payload })
    }

    /// Serialize: header bytes followed by payload bytes.
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.payload.len());
        self.header.write_to(&mut buf);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Serialize and byte-stuff in one pass, ready for the transport.
    pub fn encode(&self) -> Bytes {
        let mut header = BytesMut::with_capacity(HEADER_SIZE);
        self.header.write_to(&mut header);

        let mut enc = Stuffer::begin();
        enc.feed(&header);
        enc.feed(&self.payload);
        enc.finish()
    }

    /// Parse a serialized frame, verifying structure and checksum.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(FrameError::ShortHeader(bytes.len(), HEADER_SIZE));
        }
        let header = Header::read_from(bytes);

        let declared = header.payload_len as usize;
        let available = bytes.len() - HEADER_SIZE;
        if available < declared {
            return Err(FrameError::ShortPayload {
                declared,
                available,
            });
        }
        let payload = Bytes::copy_from_slice(&bytes[HEADER_SIZE..HEADER_SIZE + declared]);

        let computed = checksum_of(&header, &payload);
        if computed != header.checksum {
            return Err(FrameError::ChecksumMismatch {
                stored: header.checksum,
                computed,
            });
        }

        Ok(Self { header, payload })
    }

    /// True for a pure acknowledgment (no application payload).
    pub fn is_pure_ack(&self) -> bool {
        self.payload.is_empty()
    }
}

fn checksum_of(header: &Header, payload: &[u8]) -> u16 {
    let zeroed = Header {
        checksum: 0,
        ..*header
    };
    let mut buf = BytesMut::with_capacity(HEADER_SIZE);
    zeroed.write_to(&mut buf);
    let crc = crc16(0xFFFF, &buf);
    crc16(crc, payload)
}

/// CRC-16/CCITT update: polynomial 0x1021, MSB-first, bit by bit.
///
/// Seed with `0xFFFF` and chain calls to checksum discontiguous buffers.
pub fn crc16(seed: u16, data: &[u8]) -> u16 {
    let mut crc = seed;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}
