use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::{Result, SessionError};

/// One-shot, re-armable delayed-acknowledgment scheduler.
///
/// A single long-lived thread owns the deadline; [`arm`](Self::arm) and
/// [`cancel`](Self::cancel) may be called from any thread and are cheap.
/// Every arm/cancel bumps a generation counter, so a fire callback that
/// lost a race against a concurrent send can detect it went stale (see
/// [`is_current`](Self::is_current)) and decline to transmit.
pub(crate) struct AckTimer {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    state: Mutex<State>,
    cv: Condvar,
}

struct State {
    deadline: Option<Instant>,
    generation: u64,
    shutdown: bool,
}

impl AckTimer {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    deadline: None,
                    generation: 0,
                    shutdown: false,
                }),
                cv: Condvar::new(),
            }),
            handle: Mutex::new(None),
        }
    }

    /// Spawn the scheduler thread. `on_fire` receives the generation that
    /// expired and runs on the scheduler thread with no locks held.
    pub fn start(&self, on_fire: impl Fn(u64) + Send + 'static) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("seclink-ack".into())
            .spawn(move || run(&shared, &on_fire))
            .map_err(SessionError::Spawn)?;
        *lock(&self.handle) = Some(handle);
        Ok(())
    }

    /// Schedule a fire after `delay`, replacing any pending deadline.
    pub fn arm(&self, delay: Duration) {
        let mut st = lock(&self.shared.state);
        st.generation += 1;
        st.deadline = Some(Instant::now() + delay);
        trace!(generation = st.generation, ?delay, "delayed ack armed");
        self.shared.cv.notify_all();
    }

    /// Drop any pending deadline and invalidate in-flight fire callbacks.
    pub fn cancel(&self) {
        let mut st = lock(&self.shared.state);
        st.generation += 1;
        st.deadline = None;
        self.shared.cv.notify_all();
    }

    /// True if no arm/cancel happened since the given generation fired.
    pub fn is_current(&self, generation: u64) -> bool {
        let st = lock(&self.shared.state);
        !st.shutdown && st.generation == generation
    }

    /// Stop the scheduler thread and wait for it to exit.
    pub fn shutdown(&self) {
        {
            let mut st = lock(&self.shared.state);
            st.shutdown = true;
            st.deadline = None;
            self.shared.cv.notify_all();
        }
        if let Some(handle) = lock(&self.handle).take() {
            let _ = handle.join();
        }
    }
}

fn run(shared: &Shared, on_fire: &(impl Fn(u64) + Send)) {
    let mut st = lock(&shared.state);
    loop {
        if st.shutdown {
            return;
        }
        match st.deadline {
            None => {
                st = shared
                    .cv
                    .wait(st)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            Some(deadline) => {
                let now = Instant::now();
                if now < deadline {
                    st = shared
                        .cv
                        .wait_timeout(st, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                    continue;
                }
                let generation = st.generation;
                st.deadline = None;
                drop(st);
                trace!(generation, "delayed ack fired");
                on_fire(generation);
                st = lock(&shared.state);
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
