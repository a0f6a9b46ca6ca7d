//! # Tuning Session
//!
//! The per-frame state machine that ties the pipeline together:
//!
//! ```text
//! Idle --start--> Learning --20 frames--> Detecting --stop--> Idle
//! ```
//!
//! While learning, every frame (silent or not) trains the noise profile and no
//! pitch is estimated. While detecting, non-silent frames are denoised, run
//! through YIN, gated on frequency range and confidence, and accepted
//! estimates are converted into smoothed, classified tuning feedback.

use std::fmt;

use crate::denoise::{SpectralDenoiser, LEARN_TARGET};
use crate::error::{Result, TunerError};
use crate::pitch::YinEstimator;
use crate::tuning::{cents_offset, TuningModel, TuningProfile, STRING_COUNT};
use crate::{FrameOutcome, FrameReport, Rejection, TuningReading};

/// Frames quieter than this RMS carry no usable pitch.
pub const SILENCE_RMS: f32 = 0.008;

/// Minimum YIN confidence for an estimate to update the tuning feedback.
pub const CONFIDENCE_THRESHOLD: f32 = 0.85;

/// Smoothed deviation at or below this many cents counts as in tune.
pub const IN_TUNE_CENTS: f32 = 5.0;

/// Smoothed deviation at or below this many cents counts as close.
pub const CLOSE_CENTS: f32 = 15.0;

/// Weight of the previous smoothed value in the cents smoothing.
pub const CENTS_SMOOTHING: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Learning,
    Detecting,
}

/// Which way the string is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Above the target: tune down.
    Sharp,
    /// Below the target: tune up.
    Flat,
}

impl Direction {
    fn of(cents: f32) -> Self {
        if cents > 0.0 { Direction::Sharp } else { Direction::Flat }
    }

    pub fn advice(self) -> &'static str {
        match self {
            Direction::Sharp => "tune down",
            Direction::Flat => "tune up",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    InTune,
    Close(Direction),
    Far(Direction),
}

impl Classification {
    /// Classifies a smoothed deviation. Both boundaries are inclusive.
    pub fn from_cents(cents: f32) -> Self {
        let distance = cents.abs();
        if distance <= IN_TUNE_CENTS {
            Classification::InTune
        } else if distance <= CLOSE_CENTS {
            Classification::Close(Direction::of(cents))
        } else {
            Classification::Far(Direction::of(cents))
        }
    }

    pub fn is_in_tune(self) -> bool {
        self == Classification::InTune
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::InTune => f.write_str("in tune"),
            Classification::Close(dir) => write!(f, "close, {}", dir.advice()),
            Classification::Far(dir) => write!(f, "far, {}", dir.advice()),
        }
    }
}

/// Fixed-weight exponential smoothing of the cents deviation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CentsSmoother {
    value: f32,
}

impl CentsSmoother {
    pub fn update(&mut self, cents: f32) -> f32 {
        self.value = self.value * CENTS_SMOOTHING + cents * (1.0 - CENTS_SMOOTHING);
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
    }
}

/// Root-mean-square level of a frame.
pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    (frame.iter().map(|&s| s * s).sum::<f32>() / frame.len() as f32).sqrt()
}

/// Buffers that only exist while a session is running.
#[derive(Debug)]
struct Pipeline {
    sample_rate: u32,
    denoiser: SpectralDenoiser,
    estimator: YinEstimator,
}

/// Owns the session lifecycle, the per-session DSP state and the tuning
/// model.
#[derive(Debug)]
pub struct TuningSession {
    frame_size: usize,
    model: TuningModel,
    state: SessionState,
    pipeline: Option<Pipeline>,
    smoother: CentsSmoother,
    was_in_tune: bool,
    last_confidence: f32,
    locked_string: Option<usize>,
}

impl TuningSession {
    /// Creates an idle session for frames of `frame_size` samples.
    pub fn new(frame_size: usize, model: TuningModel) -> Result<Self> {
        if frame_size < crate::config::MIN_FRAME_SIZE || !frame_size.is_power_of_two() {
            return Err(TunerError::InvalidFrameSize(frame_size));
        }
        Ok(Self {
            frame_size,
            model,
            state: SessionState::Idle,
            pipeline: None,
            smoother: CentsSmoother::default(),
            was_in_tune: false,
            last_confidence: 0.0,
            locked_string: None,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn model(&self) -> &TuningModel {
        &self.model
    }

    pub fn smoothed_cents(&self) -> f32 {
        self.smoother.value()
    }

    /// Confidence of the most recent estimate, for a live meter.
    pub fn last_confidence(&self) -> f32 {
        self.last_confidence
    }

    pub fn locked_string(&self) -> Option<usize> {
        self.locked_string
    }

    pub fn set_tuning(&mut self, profile: TuningProfile) {
        log::info!("[SESSION] Tuning set to {profile}");
        self.model.set_tuning(profile);
    }

    /// Sets the A4 reference; out-of-range values are clamped.
    pub fn set_calibration(&mut self, hz: f32) {
        self.model.set_calibration(hz);
        log::info!("[SESSION] Calibration A4 = {:.1} Hz", self.model.calibration());
    }

    /// Locks feedback to one string, or returns to nearest-string mode with
    /// `None`.
    pub fn lock_string(&mut self, index: Option<usize>) -> Result<()> {
        if let Some(index) = index {
            if index >= STRING_COUNT {
                return Err(TunerError::InvalidString { index, count: STRING_COUNT });
            }
        }
        self.locked_string = index;
        Ok(())
    }

    /// Begins a fresh session: new noise profile, new smoothing state.
    ///
    /// Starting a running session restarts it from scratch.
    pub fn start(&mut self, sample_rate: u32) -> Result<()> {
        if sample_rate == 0 {
            return Err(TunerError::InvalidSampleRate(sample_rate));
        }
        self.reset();
        self.pipeline = Some(Pipeline {
            sample_rate,
            denoiser: SpectralDenoiser::new(self.frame_size)?,
            estimator: YinEstimator::new(self.frame_size),
        });
        self.state = SessionState::Learning;
        log::info!(
            "[SESSION] Started at {sample_rate} Hz, {} samples per frame; learning noise",
            self.frame_size
        );
        Ok(())
    }

    /// Ends the session and drops every session-scoped buffer.
    pub fn stop(&mut self) {
        if self.state != SessionState::Idle {
            log::info!("[SESSION] Stopped");
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.pipeline = None;
        self.smoother.reset();
        self.was_in_tune = false;
        self.last_confidence = 0.0;
        self.state = SessionState::Idle;
    }

    /// Runs one frame through the pipeline.
    pub fn process_frame(&mut self, frame: &[f32]) -> Result<FrameReport> {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return Ok(self.report(FrameOutcome::Idle));
        };
        if frame.len() != self.frame_size {
            return Err(TunerError::FrameSize { expected: self.frame_size, actual: frame.len() });
        }

        let silent = rms(frame) < SILENCE_RMS;

        if self.state == SessionState::Learning {
            if pipeline.denoiser.learn_frame(frame) {
                self.state = SessionState::Detecting;
                log::info!("[SESSION] Noise profile ready; detecting");
            }
            let outcome = FrameOutcome::Learning {
                learned: pipeline.denoiser.frames_learned(),
                target: LEARN_TARGET,
            };
            return Ok(self.report(outcome));
        }

        // Silent frames are still valid training data above, but never
        // reach the estimator.
        if silent {
            self.last_confidence = 0.0;
            return Ok(self.report(FrameOutcome::Silent));
        }

        let cleaned = pipeline.denoiser.process(frame);
        let detection = pipeline.estimator.estimate(cleaned, pipeline.sample_rate);
        self.last_confidence = detection.confidence;

        let Some(freq) = detection.frequency_hz else {
            return Ok(self.report(FrameOutcome::Rejected(Rejection::NoPitch)));
        };
        if !self.model.frequency_bounds().contains(freq) {
            log::trace!("[SESSION] {freq:.2} Hz outside detection range");
            return Ok(self.report(FrameOutcome::Rejected(Rejection::OutOfBounds)));
        }
        if detection.confidence < CONFIDENCE_THRESHOLD {
            log::trace!("[SESSION] {freq:.2} Hz at confidence {:.2} rejected", detection.confidence);
            return Ok(self.report(FrameOutcome::Rejected(Rejection::LowConfidence)));
        }

        let reading = self.accept(freq);
        Ok(self.report(FrameOutcome::Accepted(reading)))
    }

    fn accept(&mut self, freq: f32) -> TuningReading {
        let target = match self.locked_string.and_then(|index| self.model.string(index)) {
            Some(locked) => *locked,
            None => *self.model.nearest_string(freq),
        };

        let cents = cents_offset(freq, &target);
        let smoothed = self.smoother.update(cents);
        let classification = Classification::from_cents(smoothed);
        let in_tune_edge = classification.is_in_tune() && !self.was_in_tune;
        self.was_in_tune = classification.is_in_tune();

        if in_tune_edge {
            log::debug!("[SESSION] {target} reached in tune ({smoothed:+.1} cents)");
        }

        TuningReading {
            note: target.name(),
            octave: target.octave(),
            string_index: target.index,
            frequency_hz: freq,
            cents,
            smoothed_cents: smoothed,
            classification,
            in_tune_edge,
        }
    }

    fn report(&self, outcome: FrameOutcome) -> FrameReport {
        FrameReport {
            state: self.state,
            confidence: self.last_confidence,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const N: usize = 1024;
    const RATE: u32 = 44_100;

    fn session() -> TuningSession {
        TuningSession::new(N, TuningModel::default()).unwrap()
    }

    #[test]
    fn classification_boundaries_are_inclusive() {
        assert_eq!(Classification::from_cents(5.0), Classification::InTune);
        assert_eq!(Classification::from_cents(-5.0), Classification::InTune);
        assert_eq!(Classification::from_cents(5.01), Classification::Close(Direction::Sharp));
        assert_eq!(Classification::from_cents(15.0), Classification::Close(Direction::Sharp));
        assert_eq!(Classification::from_cents(-15.0), Classification::Close(Direction::Flat));
        assert_eq!(Classification::from_cents(15.01), Classification::Far(Direction::Sharp));
        assert_eq!(Classification::from_cents(-40.0), Classification::Far(Direction::Flat));
    }

    #[test]
    fn smoothing_converges_geometrically() {
        let target = 20.0_f32;
        let mut smoother = CentsSmoother::default();
        for k in 1..=10 {
            let value = smoother.update(target);
            let expected = target - target * CENTS_SMOOTHING.powi(k);
            assert!((value - expected).abs() < 1e-4, "k={k}: {value} vs {expected}");
        }
        assert!((smoother.value() - target).abs() < target * 0.01);
    }

    #[test]
    fn rejects_bad_frame_sizes() {
        assert!(matches!(
            TuningSession::new(1000, TuningModel::default()),
            Err(TunerError::InvalidFrameSize(1000))
        ));
        let mut s = session();
        s.start(RATE).unwrap();
        assert!(matches!(
            s.process_frame(&[0.0; 16]),
            Err(TunerError::FrameSize { expected: N, actual: 16 })
        ));
    }

    #[test]
    fn idle_session_ignores_frames() {
        let mut s = session();
        let report = s.process_frame(&[0.5; N]).unwrap();
        assert_eq!(report.outcome, FrameOutcome::Idle);
        assert_eq!(report.state, SessionState::Idle);
    }

    #[test]
    fn learns_from_silence_then_detects() {
        let mut s = session();
        s.start(RATE).unwrap();
        assert_eq!(s.state(), SessionState::Learning);

        let silence = [0.0; N];
        for frame in 1..LEARN_TARGET {
            let report = s.process_frame(&silence).unwrap();
            assert_eq!(report.outcome, FrameOutcome::Learning { learned: frame, target: LEARN_TARGET });
        }
        s.process_frame(&silence).unwrap();
        assert_eq!(s.state(), SessionState::Detecting);

        let report = s.process_frame(&silence).unwrap();
        assert_eq!(report.outcome, FrameOutcome::Silent);
        assert_eq!(s.smoothed_cents(), 0.0);
    }

    #[test]
    fn stop_discards_session_state() {
        let mut s = session();
        s.start(RATE).unwrap();
        for _ in 0..LEARN_TARGET {
            s.process_frame(&[0.0; N]).unwrap();
        }
        s.stop();
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(s.smoothed_cents(), 0.0);
        assert_eq!(s.last_confidence(), 0.0);

        // A restart learns again from scratch.
        s.start(RATE).unwrap();
        assert_eq!(s.state(), SessionState::Learning);
    }

    #[test]
    fn lock_string_validates_index() {
        let mut s = session();
        assert!(s.lock_string(Some(5)).is_ok());
        assert_eq!(s.locked_string(), Some(5));
        assert!(matches!(
            s.lock_string(Some(6)),
            Err(TunerError::InvalidString { index: 6, count: 6 })
        ));
        assert!(s.lock_string(None).is_ok());
        assert_eq!(s.locked_string(), None);
    }

    #[test]
    fn calibration_changes_pass_through_to_the_model() {
        let mut s = session();
        s.set_calibration(450.0);
        assert_eq!(s.model().calibration(), 446.0);
        s.set_tuning(TuningProfile::OpenD);
        assert_eq!(s.model().profile(), TuningProfile::OpenD);
    }

    #[test]
    fn rms_of_constant_frame() {
        assert!((rms(&[0.5; 8]) - 0.5).abs() < 1e-6);
        assert_eq!(rms(&[]), 0.0);
    }
}
