/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A stuffed fragment is shorter than the minimum valid encoding.
    #[error("stuffed fragment too short ({0} bytes, minimum 2)")]
    TooShort(usize),

    /// A delimiter byte appeared inside a run of stuffed data.
    #[error("delimiter inside stuffed run at offset {0}")]
    EmbeddedDelimiter(usize),

    /// A run's declared length extends past the end of the fragment.
    #[error("stuffed run truncated at offset {offset} (needs {needed} bytes, {available} left)")]
    TruncatedRun {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Fewer bytes than the fixed header size were present.
    #[error("short header ({0} bytes, need {1})")]
    ShortHeader(usize, usize),

    /// The header declared more payload bytes than were present.
    #[error("short payload ({available} bytes, header declared {declared})")]
    ShortPayload { declared: usize, available: usize },

    /// The recomputed checksum does not match the stored one.
    #[error("checksum mismatch (stored {stored:#06x}, computed {computed:#06x})")]
    ChecksumMismatch { stored: u16, computed: u16 },

    /// The payload exceeds what the 16-bit length field can describe.
    #[error("payload too large ({0} bytes, max {max})", max = u16::MAX)]
    PayloadTooLarge(usize),
}

pub type Result<T> = std::result::Result<T, FrameError>;
