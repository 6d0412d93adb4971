use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use seclink_frame::{flags, Frame};
use seclink_transport::{Transport, TransportError};
use tracing::{debug, trace, warn};

use crate::ack_timer::AckTimer;
use crate::config::LinkConfig;
use crate::error::{Result, SessionError};

/// Tag carried by timer-generated pure acknowledgments. Pure acks have no
/// application payload, so the tag routes nowhere.
const PURE_ACK_TAG: u32 = 0;

/// Acknowledgment signal extracted from an inbound frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signal {
    Ack,
    Nack,
}

struct SeqState {
    /// Last sequence number used for an outbound frame (0 = none yet).
    send_seq: u8,
    /// Last sequence number accepted from the peer (0 = none yet).
    recv_seq: u8,
    sent_first_msg: bool,
}

/// Consumer half of the ack/nack signal queue. Owning it inside the send
/// gate's mutex is what makes sends mutually exclusive.
struct SendSide {
    signals: Receiver<Signal>,
}

/// The automatic-repeat-request reliability engine for one link.
///
/// Owns the sequence counters, the ack/nack signal queue and the delayed-ack
/// scheduler. [`send`](Self::send) runs on caller threads;
/// [`handle_frame`](Self::handle_frame) runs on the session's background
/// receive thread. Malformed traffic never reaches this type — the deframer
/// has already verified structure and checksum.
pub struct Link {
    transport: Arc<dyn Transport>,
    config: LinkConfig,
    state: Mutex<SeqState>,
    signal_tx: Sender<Signal>,
    send_side: Mutex<SendSide>,
    ack_timer: AckTimer,
}

impl Link {
    /// Create the engine and start its delayed-ack scheduler.
    pub fn new(transport: Arc<dyn Transport>, config: LinkConfig) -> Result<Arc<Self>> {
        let (signal_tx, signals) = mpsc::channel();
        let link = Arc::new(Self {
            transport,
            config,
            state: Mutex::new(SeqState {
                send_seq: 0,
                recv_seq: 0,
                sent_first_msg: false,
            }),
            signal_tx,
            send_side: Mutex::new(SendSide { signals }),
            ack_timer: AckTimer::new(),
        });

        let weak = Arc::downgrade(&link);
        link.ack_timer.start(move |generation| {
            if let Some(link) = weak.upgrade() {
                link.flush_delayed_ack(generation);
            }
        })?;

        Ok(link)
    }

    /// Reliability parameters this link runs with.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// The transport this link writes to and the receive loop reads from.
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    /// Send a payload under the given tag, blocking until the peer
    /// acknowledges it or the retransmission budget runs out.
    ///
    /// An empty payload is a pure acknowledgment: written exactly once and
    /// never retried. Transport write faults are absorbed here (a failed
    /// write just consumes a delivery attempt); only budget exhaustion is
    /// reported.
    pub fn send(&self, tag: u32, payload: &[u8]) -> Result<()> {
        let mut side = lock(&self.send_side);
        self.transmit(&mut side, tag, payload)
    }

    fn transmit(&self, side: &mut SendSide, tag: u32, payload: &[u8]) -> Result<()> {
        // Signals left over from an earlier exchange must not acknowledge
        // this frame.
        while side.signals.try_recv().is_ok() {}

        let frame = {
            let mut st = lock(&self.state);
            st.send_seq = next_seq(st.send_seq);
            let mut frame_flags = flags::ACK;
            if !st.sent_first_msg {
                frame_flags |= flags::FIRST_MSG;
                st.sent_first_msg = true;
            }
            Frame::new(
                tag,
                st.send_seq,
                st.recv_seq,
                frame_flags,
                Bytes::copy_from_slice(payload),
            )?
        };
        let encoded = frame.encode();
        let seq = frame.header.send_seq;

        // This frame carries the acknowledgment itself; a pending delayed
        // ack would be redundant (and could double-transmit).
        self.ack_timer.cancel();

        if frame.is_pure_ack() {
            if let Err(err) = self.write_all(&encoded) {
                debug!(%err, seq, "pure ack write failed");
            }
            trace!(seq, ack_seq = frame.header.ack_seq, "pure ack sent");
            return Ok(());
        }

        for attempt in 1..=self.config.max_retransmit_attempts {
            if let Err(err) = self.write_all(&encoded) {
                warn!(%err, seq, attempt, "frame write failed");
            } else {
                trace!(tag, seq, attempt, len = payload.len(), "frame written");
            }

            match side.signals.recv_timeout(self.config.retransmit_timeout) {
                Ok(Signal::Ack) => {
                    trace!(tag, seq, attempt, "frame acknowledged");
                    return Ok(());
                }
                Ok(Signal::Nack) => {
                    debug!(tag, seq, attempt, "peer rejected frame, retrying");
                }
                Err(RecvTimeoutError::Timeout) => {
                    debug!(tag, seq, attempt, "no acknowledgment, retrying");
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        Err(SessionError::DeliveryFailed {
            attempts: self.config.max_retransmit_attempts,
        })
    }

    /// Process one verified inbound frame.
    ///
    /// Returns the tag and payload when the frame carries new application
    /// data to dispatch; `None` for pure acks and suppressed duplicates
    /// (whose header-level ack/nack bookkeeping still happened).
    pub fn handle_frame(&self, frame: &Frame) -> Option<(u32, Bytes)> {
        self.ack_timer.cancel();

        let hdr = frame.header;
        let has_payload = !frame.payload.is_empty();
        let fresh = {
            let mut st = lock(&self.state);
            // A frame is new iff it restarts the session or its sequence
            // number differs from the last one accepted.
            let fresh = (hdr.has_flag(flags::FIRST_MSG) && hdr.send_seq == 1)
                || hdr.send_seq != st.recv_seq;
            if has_payload && fresh {
                st.recv_seq = hdr.send_seq;
            }

            if hdr.has_flag(flags::ACK | flags::NACK) && hdr.ack_seq >= st.send_seq {
                let signal = if hdr.has_flag(flags::NACK) {
                    Signal::Nack
                } else {
                    Signal::Ack
                };
                trace!(?signal, ack_seq = hdr.ack_seq, "acknowledgment received");
                let _ = self.signal_tx.send(signal);
            }
            fresh
        };

        if !has_payload {
            trace!(seq = hdr.send_seq, "pure ack consumed");
            return None;
        }

        // The frame must eventually be acknowledged even if no outbound
        // traffic piggybacks one first. Duplicates re-arm too: the peer is
        // retransmitting because it has not seen our acknowledgment yet.
        self.ack_timer.arm(self.config.delayed_ack);

        if !fresh {
            debug!(seq = hdr.send_seq, tag = hdr.tag, "suppressing duplicate frame");
            return None;
        }
        Some((hdr.tag, frame.payload.clone()))
    }

    /// Stop the delayed-ack scheduler. Called once when the session stops.
    pub fn shutdown(&self) {
        self.ack_timer.shutdown();
    }

    fn flush_delayed_ack(&self, generation: u64) {
        let mut side = lock(&self.send_side);
        // A send that won the race to the gate has piggybacked this
        // acknowledgment and bumped the generation.
        if !self.ack_timer.is_current(generation) {
            trace!(generation, "delayed ack superseded");
            return;
        }
        if let Err(err) = self.transmit(&mut side, PURE_ACK_TAG, &[]) {
            debug!(%err, "delayed ack transmit failed");
        }
    }

    fn write_all(&self, mut buf: &[u8]) -> std::result::Result<(), TransportError> {
        while !buf.is_empty() {
            let written = self.transport.write(buf)?;
            if written == 0 {
                return Err(TransportError::Closed);
            }
            buf = &buf[written..];
        }
        Ok(())
    }
}

/// Advance a sequence number: 1..=255 with wraparound, never 0.
fn next_seq(seq: u8) -> u8 {
    if seq == u8::MAX {
        1
    } else {
        seq + 1
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
