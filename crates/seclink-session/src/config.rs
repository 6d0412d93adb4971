use std::time::Duration;

/// Reliability parameters for one link.
///
/// There are no process-wide defaults; construct a value (or take
/// `Default::default()`) and pass it to the session explicitly.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// How long to wait before acknowledging inbound traffic that nothing
    /// else has acknowledged yet. Coalesces acks for bursts.
    pub delayed_ack: Duration,
    /// Per-attempt wait for an acknowledgment before retransmitting.
    pub retransmit_timeout: Duration,
    /// Total delivery attempts for a data frame before reporting failure.
    pub max_retransmit_attempts: u32,
    /// Largest chunk requested from the transport per read.
    pub read_chunk_size: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            delayed_ack: Duration::from_millis(100),
            retransmit_timeout: Duration::from_secs(1),
            max_retransmit_attempts: 3,
            read_chunk_size: 4096,
        }
    }
}
