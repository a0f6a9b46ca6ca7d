//! Frame driver: pulls one frame from a [`FrameSource`] per tick and hands it
//! to the [`TuningSession`]. The session itself never schedules anything, so
//! whoever owns the driver decides the cadence (a display refresh, a timer, or
//! a plain loop in tests).

use crate::audio::FrameSource;
use crate::error::{Result, TunerError};
use crate::session::{SessionState, TuningSession};
use crate::FrameReport;

pub struct TunerDriver<S: FrameSource> {
    source: S,
    session: TuningSession,
    frame: Vec<f32>,
}

impl<S: FrameSource> TunerDriver<S> {
    pub fn new(source: S, session: TuningSession) -> Self {
        let frame = vec![0.0; session.frame_size()];
        Self { source, session, frame }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn session(&self) -> &TuningSession {
        &self.session
    }

    /// Mutable access for tuning, calibration and string-lock changes.
    pub fn session_mut(&mut self) -> &mut TuningSession {
        &mut self.session
    }

    pub fn is_running(&self) -> bool {
        self.session.state() != SessionState::Idle
    }

    /// Opens the source and starts a fresh session.
    ///
    /// If the source cannot be opened the session stays idle and the failure
    /// is returned as [`TunerError::CaptureUnavailable`].
    pub fn start(&mut self) -> Result<()> {
        let sample_rate = match self.source.open() {
            Ok(rate) => rate,
            Err(err) => {
                log::error!("[DRIVER] Audio source unavailable: {err}");
                return Err(match err {
                    TunerError::CaptureUnavailable(msg) => TunerError::CaptureUnavailable(msg),
                    other => TunerError::CaptureUnavailable(other.to_string()),
                });
            }
        };
        if let Err(err) = self.session.start(sample_rate) {
            self.source.close();
            return Err(err);
        }
        Ok(())
    }

    /// Processes at most one frame.
    ///
    /// Returns `Ok(None)` when the driver is stopped or the source had no
    /// frame ready. A source failure stops the session.
    pub fn tick(&mut self) -> Result<Option<FrameReport>> {
        if !self.is_running() {
            return Ok(None);
        }
        match self.source.next_frame(&mut self.frame) {
            Ok(true) => self.session.process_frame(&self.frame).map(Some),
            Ok(false) => Ok(None),
            Err(err) => {
                log::error!("[DRIVER] Audio source failed: {err}");
                self.stop();
                Err(err)
            }
        }
    }

    pub fn stop(&mut self) {
        self.session.stop();
        self.source.close();
    }

    /// Stops the driver and returns the source.
    pub fn into_source(mut self) -> S {
        self.stop();
        self.source
    }
}
