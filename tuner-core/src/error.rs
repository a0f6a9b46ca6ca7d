//! Error types for the tuner core.
//!
//! Rejected pitch candidates (no pitch, low confidence, out of range) are not
//! errors; they are reported through [`crate::FrameOutcome::Rejected`]. The
//! variants here cover misuse of the API and failures of the audio provider.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TunerError>;

#[derive(Debug, Error)]
pub enum TunerError {
    /// The audio provider could not deliver frames (no device, permission
    /// denied, stream failure). The session stays idle and nothing is retried.
    #[error("audio capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// A frame did not have the length the session was configured for.
    #[error("frame size mismatch: expected {expected} samples, got {actual}")]
    FrameSize { expected: usize, actual: usize },

    /// Frame lengths must be a power of two for the radix-2 spectrum engine
    /// and at least large enough to hold a few guitar periods.
    #[error("invalid frame size {0}: must be a power of two >= {min}", min = crate::config::MIN_FRAME_SIZE)]
    InvalidFrameSize(usize),

    #[error("invalid sample rate {0} Hz")]
    InvalidSampleRate(u32),

    #[error("unknown tuning '{0}'")]
    UnknownTuning(String),

    #[error("string index {index} out of range (tuning has {count} strings)")]
    InvalidString { index: usize, count: usize },

    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Config(#[from] serde_json::Error),
}
