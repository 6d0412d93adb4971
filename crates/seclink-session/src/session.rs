use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use seclink_frame::Deframer;
use seclink_transport::{Transport, TransportError};
use tracing::{debug, info, warn};

use crate::config::LinkConfig;
use crate::dispatch::Dispatch;
use crate::envelope::Envelope;
use crate::error::{Result, SessionError};
use crate::link::Link;

/// A duplex session: one reliability engine, one background receive thread,
/// any number of caller threads multiplexed by tag.
///
/// `Tx` is the envelope type this end sends, `Rx` the one it receives. The
/// initiator and responder ends of a link instantiate the same type with the
/// parameters swapped; the engine underneath is identical.
pub struct Session<Tx: Envelope, Rx: Envelope> {
    link: Arc<Link>,
    dispatch: Arc<Dispatch<Rx>>,
    running: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
    _tx: PhantomData<fn(&Tx)>,
}

impl<Tx: Envelope, Rx: Envelope> Session<Tx, Rx> {
    /// Create a session over the given transport. Call
    /// [`start`](Self::start) before exchanging messages.
    pub fn new(transport: impl Transport + 'static, config: LinkConfig) -> Result<Self> {
        Self::with_transport(Arc::new(transport), config)
    }

    /// Create a session over a shared transport handle.
    pub fn with_transport(transport: Arc<dyn Transport>, config: LinkConfig) -> Result<Self> {
        let link = Link::new(transport, config)?;
        Ok(Self {
            link,
            dispatch: Arc::new(Dispatch::new()),
            running: Arc::new(AtomicBool::new(false)),
            reader: Mutex::new(None),
            stopped: AtomicBool::new(false),
            _tx: PhantomData,
        })
    }

    /// Start the background receive thread. Idempotent while running; a
    /// stopped session cannot be restarted.
    pub fn start(&self) -> Result<()> {
        let mut guard = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            return Ok(());
        }
        if self.stopped.load(Ordering::Acquire) {
            return Err(SessionError::Stopped);
        }

        self.running.store(true, Ordering::Release);
        let link = Arc::clone(&self.link);
        let dispatch = Arc::clone(&self.dispatch);
        let running = Arc::clone(&self.running);
        let handle = std::thread::Builder::new()
            .name("seclink-rx".into())
            .spawn(move || receive_loop(&link, &dispatch, &running))
            .map_err(SessionError::Spawn)?;
        *guard = Some(handle);
        info!("session started");
        Ok(())
    }

    /// Stop the session: signal the receive thread, stop the delayed-ack
    /// scheduler, and join. Idempotent; safe to call during teardown. The
    /// receive thread notices the stop flag at its next transport read
    /// timeout, which bounds the wait.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.running.store(false, Ordering::Release);
        self.link.shutdown();
        let handle = {
            let mut guard = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
            guard.take()
        };
        if let Some(handle) = handle {
            let _ = handle.join();
            info!("session stopped");
        }
    }

    /// Send one envelope reliably. Blocks until the peer acknowledges the
    /// frame or the retransmission budget runs out.
    pub fn send(&self, msg: &Tx) -> Result<()> {
        let payload = msg.encode_payload()?;
        self.link.send(msg.tag(), &payload)
    }

    /// Pull the next inbound envelope for `tag`, waiting up to `timeout`.
    /// `None` means nothing arrived in time.
    pub fn wait_for(&self, tag: u32, timeout: Duration) -> Option<Rx> {
        self.dispatch.wait(tag, timeout)
    }

    /// Send one envelope and wait for the peer's reply on `reply_tag`.
    pub fn request(&self, msg: &Tx, reply_tag: u32, timeout: Duration) -> Result<Rx> {
        self.send(msg)?;
        self.wait_for(reply_tag, timeout)
            .ok_or(SessionError::Timeout {
                tag: reply_tag,
                timeout,
            })
    }
}

impl<Tx: Envelope, Rx: Envelope> Drop for Session<Tx, Rx> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Background receive loop: transport bytes → deframer → engine → dispatch.
fn receive_loop<Rx: Envelope>(link: &Link, dispatch: &Dispatch<Rx>, running: &AtomicBool) {
    let chunk_size = link.config().read_chunk_size;
    let transport = link.transport();
    let mut deframer = Deframer::new();

    while running.load(Ordering::Acquire) {
        let bytes = match transport.read(chunk_size) {
            Ok(bytes) => bytes,
            Err(TransportError::Closed) => {
                debug!("transport closed; receive loop exiting");
                break;
            }
            Err(err) => {
                if running.load(Ordering::Acquire) {
                    warn!(%err, "transport read failed; receive loop exiting");
                }
                break;
            }
        };
        if bytes.is_empty() {
            // Read timeout; loop back to check the stop flag.
            continue;
        }

        deframer.push(&bytes);
        while let Some(frame) = deframer.next_frame() {
            if let Some((tag, payload)) = link.handle_frame(&frame) {
                match Rx::decode_payload(tag, &payload) {
                    Ok(msg) => dispatch.deliver(tag, msg),
                    Err(err) => warn!(%err, tag, "undecodable inbound payload dropped"),
                }
            }
        }
    }
}
