// tuner-core/src/lib.rs

//! The core logic for the guitar string tuner.
//! This crate is responsible for noise learning, spectral-subtraction
//! denoising, YIN pitch detection and the tuning model. It is completely
//! headless and contains no GUI code.

pub mod audio;
pub mod config;
pub mod denoise;
pub mod driver;
pub mod error;
pub mod fft;
pub mod pitch;
pub mod session;
pub mod tuning;

pub use audio::FrameSource;
pub use config::TunerConfig;
pub use driver::TunerDriver;
pub use error::{Result, TunerError};
pub use pitch::DetectionResult;
pub use session::{Classification, Direction, SessionState, TuningSession};
pub use tuning::{TuningModel, TuningProfile};

/// Why a detected pitch did not update the tuning feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// YIN found no period below its threshold (noise or non-harmonic input).
    NoPitch,
    /// The estimate was too unreliable.
    LowConfidence,
    /// The estimate was outside the plausible range of the tuning, most
    /// likely an octave error or a sub-harmonic.
    OutOfBounds,
}

/// Tuning feedback produced by an accepted frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TuningReading {
    /// Target note name (e.g. "E", "F#").
    pub note: &'static str,
    pub octave: u8,
    /// Index of the target string in the tuning (0 = lowest).
    pub string_index: usize,
    /// The detected frequency in Hz.
    pub frequency_hz: f32,
    /// Deviation of this frame from the target in cents.
    pub cents: f32,
    /// Exponentially smoothed deviation, used for classification.
    pub smoothed_cents: f32,
    pub classification: Classification,
    /// Set on the first in-tune frame after a frame that was not in tune.
    pub in_tune_edge: bool,
}

/// What happened to a single frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// The session is not running.
    Idle,
    /// The frame trained the noise profile.
    Learning { learned: usize, target: usize },
    /// Below the silence threshold; no estimate.
    Silent,
    Rejected(Rejection),
    Accepted(TuningReading),
}

/// Represents the result of processing a single audio frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    /// Session state after the frame was processed.
    pub state: SessionState,
    /// The confidence of the latest estimate (0.0 to 1.0), reported whether
    /// or not the estimate was accepted.
    pub confidence: f32,
    pub outcome: FrameOutcome,
}

impl FrameReport {
    pub fn reading(&self) -> Option<&TuningReading> {
        match &self.outcome {
            FrameOutcome::Accepted(reading) => Some(reading),
            _ => None,
        }
    }
}
