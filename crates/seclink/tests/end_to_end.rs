//! End-to-end scenarios: two sessions over an in-memory link, loss, and
//! corruption.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use seclink::frame::{flags, Frame};
use seclink::session::{Chunk, ProtocolError, SessionError};
use seclink::transport::{Loopback, Transport};
use seclink::{Envelope, LinkConfig, Session};

const TAG_PING: u32 = 1;
const TAG_PONG: u32 = 2;
const TAG_GET_LOG: u32 = 3;
const TAG_LOG_CHUNK: u32 = 4;
const TAG_WRITE_CHUNK: u32 = 5;
const TAG_WRITE_ACK: u32 = 6;

/// Host-to-device envelope.
#[derive(Debug, Clone, PartialEq)]
enum HostMessage {
    Ping(Vec<u8>),
    GetLog { offset: u64 },
    WriteChunk { offset: u64, data: Vec<u8> },
}

/// Device-to-host envelope.
#[derive(Debug, Clone, PartialEq)]
enum DeviceMessage {
    Pong(Vec<u8>),
    LogChunk { data: Vec<u8>, remaining: u64 },
    WriteAck { ok: bool },
}

impl Envelope for HostMessage {
    fn tag(&self) -> u32 {
        match self {
            HostMessage::Ping(_) => TAG_PING,
            HostMessage::GetLog { .. } => TAG_GET_LOG,
            HostMessage::WriteChunk { .. } => TAG_WRITE_CHUNK,
        }
    }

    fn encode_payload(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(match self {
            HostMessage::Ping(data) => data.clone(),
            HostMessage::GetLog { offset } => offset.to_le_bytes().to_vec(),
            HostMessage::WriteChunk { offset, data } => {
                let mut buf = offset.to_le_bytes().to_vec();
                buf.extend_from_slice(data);
                buf
            }
        })
    }

    fn decode_payload(tag: u32, payload: &[u8]) -> Result<Self, ProtocolError> {
        match tag {
            TAG_PING => Ok(HostMessage::Ping(payload.to_vec())),
            TAG_GET_LOG => {
                let offset = read_u64(tag, payload)?;
                Ok(HostMessage::GetLog { offset })
            }
            TAG_WRITE_CHUNK => {
                let offset = read_u64(tag, payload.get(..8).unwrap_or_default())?;
                Ok(HostMessage::WriteChunk {
                    offset,
                    data: payload[8..].to_vec(),
                })
            }
            other => Err(ProtocolError::UnknownTag(other)),
        }
    }
}

impl Envelope for DeviceMessage {
    fn tag(&self) -> u32 {
        match self {
            DeviceMessage::Pong(_) => TAG_PONG,
            DeviceMessage::LogChunk { .. } => TAG_LOG_CHUNK,
            DeviceMessage::WriteAck { .. } => TAG_WRITE_ACK,
        }
    }

    fn encode_payload(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(match self {
            DeviceMessage::Pong(data) => data.clone(),
            DeviceMessage::LogChunk { data, remaining } => {
                let mut buf = remaining.to_le_bytes().to_vec();
                buf.extend_from_slice(data);
                buf
            }
            DeviceMessage::WriteAck { ok } => vec![*ok as u8],
        })
    }

    fn decode_payload(tag: u32, payload: &[u8]) -> Result<Self, ProtocolError> {
        match tag {
            TAG_PONG => Ok(DeviceMessage::Pong(payload.to_vec())),
            TAG_LOG_CHUNK => {
                let remaining = read_u64(tag, payload.get(..8).unwrap_or_default())?;
                Ok(DeviceMessage::LogChunk {
                    data: payload[8..].to_vec(),
                    remaining,
                })
            }
            TAG_WRITE_ACK => match payload {
                [ok] => Ok(DeviceMessage::WriteAck { ok: *ok != 0 }),
                _ => Err(ProtocolError::MalformedPayload {
                    tag,
                    reason: format!("expected 1 byte, got {}", payload.len()),
                }),
            },
            other => Err(ProtocolError::UnknownTag(other)),
        }
    }
}

fn read_u64(tag: u32, payload: &[u8]) -> Result<u64, ProtocolError> {
    let bytes: [u8; 8] = payload.try_into().map_err(|_| ProtocolError::MalformedPayload {
        tag,
        reason: format!("expected 8 bytes, got {}", payload.len()),
    })?;
    Ok(u64::from_le_bytes(bytes))
}

fn test_config() -> LinkConfig {
    LinkConfig {
        delayed_ack: Duration::from_millis(20),
        retransmit_timeout: Duration::from_millis(200),
        ..LinkConfig::default()
    }
}

type Initiator = Session<HostMessage, DeviceMessage>;
type Responder = Session<DeviceMessage, HostMessage>;

fn connected_pair() -> (Initiator, Responder) {
    let (near, far) = Loopback::pair_with_timeout(Duration::from_millis(5));
    let initiator = Session::new(near, test_config()).expect("session should build");
    let responder = Session::new(far, test_config()).expect("session should build");
    initiator.start().expect("session should start");
    responder.start().expect("session should start");
    (initiator, responder)
}

#[test]
fn initiator_to_responder_payload_unchanged() {
    let (initiator, responder) = connected_pair();

    let payload = b"\x00\x01\xff attestation request \x00".to_vec();
    initiator
        .send(&HostMessage::Ping(payload.clone()))
        .expect("send should succeed");

    let got = responder
        .wait_for(TAG_PING, Duration::from_secs(2))
        .expect("ping should arrive");
    assert_eq!(got, HostMessage::Ping(payload));

    initiator.stop();
    responder.stop();
}

#[test]
fn request_reply_across_roles() {
    let (initiator, responder) = connected_pair();

    let device = std::thread::spawn(move || {
        let msg = responder
            .wait_for(TAG_PING, Duration::from_secs(2))
            .expect("ping should arrive");
        let HostMessage::Ping(data) = msg else { panic!("expected ping") };
        responder
            .send(&DeviceMessage::Pong(data))
            .expect("pong should send");
        responder.stop();
    });

    let reply = initiator
        .request(
            &HostMessage::Ping(b"serial#".to_vec()),
            TAG_PONG,
            Duration::from_secs(2),
        )
        .expect("request should succeed");
    assert_eq!(reply, DeviceMessage::Pong(b"serial#".to_vec()));

    device.join().expect("device thread should complete");
    initiator.stop();
}

/// Drops every write on the floor; never produces inbound bytes.
struct LossyTransport {
    writes: AtomicUsize,
}

impl Transport for LossyTransport {
    fn write(&self, buf: &[u8]) -> seclink::transport::Result<usize> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(buf.len())
    }

    fn read(&self, _max_len: usize) -> seclink::transport::Result<Vec<u8>> {
        std::thread::sleep(Duration::from_millis(1));
        Ok(Vec::new())
    }
}

#[test]
fn delivery_fails_after_exactly_three_writes() {
    let transport = Arc::new(LossyTransport {
        writes: AtomicUsize::new(0),
    });
    let config = LinkConfig {
        retransmit_timeout: Duration::from_millis(10),
        max_retransmit_attempts: 3,
        ..LinkConfig::default()
    };
    let session: Initiator =
        Session::with_transport(transport.clone(), config).expect("session should build");
    session.start().expect("session should start");

    let err = session
        .send(&HostMessage::Ping(b"lost".to_vec()))
        .unwrap_err();
    assert!(matches!(err, SessionError::DeliveryFailed { attempts: 3 }));
    assert_eq!(transport.writes.load(Ordering::SeqCst), 3);

    session.stop();
}

#[test]
fn flipped_checksum_bit_causes_no_dispatch() {
    let (near, far) = Loopback::pair_with_timeout(Duration::from_millis(5));
    let initiator: Initiator = Session::new(near, test_config()).expect("session should build");
    initiator.start().expect("session should start");

    let frame = Frame::new(
        TAG_PONG,
        1,
        0,
        flags::ACK | flags::FIRST_MSG,
        Bytes::from_static(b"tampered"),
    )
    .expect("frame should build");
    let mut raw = frame.serialize().to_vec();
    raw[6] ^= 0x01; // flip one bit in the checksum field
    far.write(&seclink::frame::stuff(&raw)).expect("raw write should succeed");

    assert!(initiator.wait_for(TAG_PONG, Duration::from_millis(200)).is_none());
    initiator.stop();
}

#[test]
fn duplicate_frame_dispatched_once() {
    let (near, far) = Loopback::pair_with_timeout(Duration::from_millis(5));
    let initiator: Initiator = Session::new(near, test_config()).expect("session should build");
    initiator.start().expect("session should start");

    let frame = Frame::new(TAG_PONG, 2, 0, flags::ACK, Bytes::from_static(b"once"))
        .expect("frame should build");
    let encoded = frame.encode();
    far.write(&encoded).expect("raw write should succeed");
    far.write(&encoded).expect("raw write should succeed");

    assert_eq!(
        initiator.wait_for(TAG_PONG, Duration::from_secs(2)),
        Some(DeviceMessage::Pong(b"once".to_vec()))
    );
    assert!(initiator.wait_for(TAG_PONG, Duration::from_millis(200)).is_none());
    initiator.stop();
}

#[test]
fn chunked_log_fetch_assembles_blob() {
    let (initiator, responder) = connected_pair();
    let blob: Vec<u8> = (0u16..1000).map(|i| (i % 251) as u8).collect();

    let device = {
        let blob = blob.clone();
        std::thread::spawn(move || {
            const CHUNK: usize = 256;
            loop {
                let Some(msg) = responder.wait_for(TAG_GET_LOG, Duration::from_secs(2)) else {
                    break;
                };
                let HostMessage::GetLog { offset } = msg else { panic!("expected log request") };
                let offset = offset as usize;
                let end = (offset + CHUNK).min(blob.len());
                responder
                    .send(&DeviceMessage::LogChunk {
                        data: blob[offset..end].to_vec(),
                        remaining: (blob.len() - end) as u64,
                    })
                    .expect("chunk should send");
                if end == blob.len() {
                    break;
                }
            }
            responder.stop();
        })
    };

    let fetched = initiator
        .fetch_chunked(
            TAG_LOG_CHUNK,
            Duration::from_secs(2),
            |offset| HostMessage::GetLog { offset },
            |reply| {
                let DeviceMessage::LogChunk { data, remaining } = reply else {
                    panic!("expected log chunk");
                };
                Ok(Chunk { data, remaining })
            },
        )
        .expect("chunked fetch should succeed");
    assert_eq!(fetched, blob);

    device.join().expect("device thread should complete");
    initiator.stop();
}

#[test]
fn chunked_push_delivers_all_chunks_in_order() {
    let (initiator, responder) = connected_pair();
    let image: Vec<u8> = (0u16..700).map(|i| (i % 97) as u8).collect();
    let received = Arc::new(Mutex::new(Vec::new()));

    let device = {
        let received = Arc::clone(&received);
        std::thread::spawn(move || {
            // 700 bytes in 256-byte chunks: 256 + 256 + 188.
            for _ in 0..3 {
                let msg = responder
                    .wait_for(TAG_WRITE_CHUNK, Duration::from_secs(2))
                    .expect("chunk arrives");
                let HostMessage::WriteChunk { offset, data } = msg else {
                    panic!("expected write chunk");
                };
                let mut received = received.lock().unwrap();
                assert_eq!(offset as usize, received.len());
                received.extend_from_slice(&data);
                responder
                    .send(&DeviceMessage::WriteAck { ok: true })
                    .expect("ack should send");
            }
            responder.stop();
        })
    };

    initiator
        .push_chunked(
            &image,
            256,
            TAG_WRITE_ACK,
            Duration::from_secs(2),
            |offset, data| HostMessage::WriteChunk {
                offset,
                data: data.to_vec(),
            },
            |reply| match reply {
                DeviceMessage::WriteAck { ok: true } => Ok(()),
                other => Err(SessionError::Protocol(ProtocolError::MalformedPayload {
                    tag: TAG_WRITE_ACK,
                    reason: format!("device rejected chunk: {other:?}"),
                })),
            },
        )
        .expect("chunked push should succeed");

    // Wait for the device thread to drain its queue and exit.
    device.join().expect("device thread should complete");
    assert_eq!(*received.lock().unwrap(), image);
    initiator.stop();
}

#[test]
fn chunked_push_aborts_on_rejected_chunk() {
    let (initiator, responder) = connected_pair();

    let device = std::thread::spawn(move || {
        // Accept the first chunk, reject the second.
        for ok in [true, false] {
            let Some(_msg) = responder.wait_for(TAG_WRITE_CHUNK, Duration::from_secs(2)) else {
                break;
            };
            responder
                .send(&DeviceMessage::WriteAck { ok })
                .expect("ack should send");
        }
        responder.stop();
    });

    let data = vec![0xEE; 512];
    let err = initiator
        .push_chunked(
            &data,
            256,
            TAG_WRITE_ACK,
            Duration::from_secs(2),
            |offset, chunk| HostMessage::WriteChunk {
                offset,
                data: chunk.to_vec(),
            },
            |reply| match reply {
                DeviceMessage::WriteAck { ok: true } => Ok(()),
                _ => Err(SessionError::Protocol(ProtocolError::MalformedPayload {
                    tag: TAG_WRITE_ACK,
                    reason: "device rejected chunk".into(),
                })),
            },
        )
        .unwrap_err();
    assert!(matches!(err, SessionError::Protocol(_)));

    device.join().expect("device thread should complete");
    initiator.stop();
}

#[test]
fn stalled_chunked_fetch_is_a_protocol_error() {
    let (initiator, responder) = connected_pair();

    let device = std::thread::spawn(move || {
        let _ = responder
            .wait_for(TAG_GET_LOG, Duration::from_secs(2))
            .expect("log request should arrive");
        responder
            .send(&DeviceMessage::LogChunk {
                data: Vec::new(),
                remaining: 100,
            })
            .expect("stall reply should send");
        responder.stop();
    });

    let err = initiator
        .fetch_chunked(
            TAG_LOG_CHUNK,
            Duration::from_secs(2),
            |offset| HostMessage::GetLog { offset },
            |reply| {
                let DeviceMessage::LogChunk { data, remaining } = reply else {
                    panic!("expected log chunk");
                };
                Ok(Chunk { data, remaining })
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Protocol(ProtocolError::StalledTransfer { remaining: 100 })
    ));

    device.join().expect("device thread should complete");
    initiator.stop();
}
