use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::trace;

/// Per-tag delivery queues connecting the background receive thread to
/// [`wait_for`](crate::Session::wait_for) callers.
///
/// One queue per application tag; queues are created on demand by whichever
/// side (deliverer or waiter) touches a tag first. Delivery happens on the
/// single receive thread, so arrival order is preserved per tag.
pub(crate) struct Dispatch<M> {
    waiters: Mutex<HashMap<u32, Waiter<M>>>,
}

struct Waiter<M> {
    tx: Sender<M>,
    rx: Arc<Mutex<Receiver<M>>>,
}

impl<M> Waiter<M> {
    fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }
}

impl<M: Send> Dispatch<M> {
    pub fn new() -> Self {
        Self {
            waiters: Mutex::new(HashMap::new()),
        }
    }

    /// Queue a message for the given tag.
    pub fn deliver(&self, tag: u32, msg: M) {
        let mut map = self
            .waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let waiter = map.entry(tag).or_insert_with(Waiter::new);
        trace!(tag, "dispatching inbound message");
        // The paired receiver lives in the map for the session's lifetime.
        let _ = waiter.tx.send(msg);
    }

    /// Pull the next message for the tag, waiting up to `timeout`.
    pub fn wait(&self, tag: u32, timeout: Duration) -> Option<M> {
        let rx = {
            let mut map = self
                .waiters
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(&map.entry(tag).or_insert_with(Waiter::new).rx)
        };
        let rx = rx.lock().unwrap_or_else(PoisonError::into_inner);
        rx.recv_timeout(timeout).ok()
    }
}
