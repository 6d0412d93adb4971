use std::time::Duration;

/// Contract violations on the envelope boundary.
///
/// These indicate a programming error or an incompatible peer, never
/// transport noise, and are surfaced to the caller instead of being
/// recovered locally.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// An outbound envelope has no recognizable active field.
    #[error("envelope has no active field")]
    NoActiveField,

    /// An inbound tag does not correspond to any known message variant.
    #[error("unknown message tag {0}")]
    UnknownTag(u32),

    /// The payload bytes for a known tag could not be decoded.
    #[error("malformed payload for tag {tag}: {reason}")]
    MalformedPayload { tag: u32, reason: String },

    /// A chunked peer reported outstanding data but delivered none.
    #[error("peer reported {remaining} bytes remaining but sent an empty chunk")]
    StalledTransfer { remaining: u64 },
}

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The retransmission budget was exhausted without an acknowledgment.
    #[error("delivery failed after {attempts} attempts")]
    DeliveryFailed { attempts: u32 },

    /// No response arrived on the given tag within the timeout.
    #[error("no response on tag {tag} within {timeout:?}")]
    Timeout { tag: u32, timeout: Duration },

    /// Envelope contract violation.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Frame-level error (oversized payload and similar caller mistakes).
    #[error("frame error: {0}")]
    Frame(#[from] seclink_frame::FrameError),

    /// Failed to spawn a session worker thread.
    #[error("failed to spawn session thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The session has been stopped.
    #[error("session stopped")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, SessionError>;
