//! End-to-end tests of the tuning pipeline with synthetic frames: noise
//! learning, detection, gating, smoothing and classification.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tuner_core::denoise::LEARN_TARGET;
use tuner_core::{
    Classification, Direction, FrameOutcome, Rejection, SessionState, TuningModel, TuningReading,
    TuningSession,
};

const N: usize = 4096;
const RATE: u32 = 44_100;

struct Signal {
    rng: StdRng,
    phase: f32,
}

impl Signal {
    fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed), phase: 0.0 }
    }

    /// Background hiss quiet enough to count as silence.
    fn hiss(&mut self) -> Vec<f32> {
        (0..N).map(|_| self.rng.gen_range(-0.005..0.005)).collect()
    }

    /// A continuous sine plus hiss. Phase carries over between frames.
    fn tone(&mut self, freq: f32, amplitude: f32) -> Vec<f32> {
        let step = 2.0 * std::f32::consts::PI * freq / RATE as f32;
        let mut frame = Vec::with_capacity(N);
        for _ in 0..N {
            frame.push(amplitude * self.phase.sin() + self.rng.gen_range(-0.005..0.005));
            self.phase = (self.phase + step) % (2.0 * std::f32::consts::PI);
        }
        frame
    }

    fn noise(&mut self, amplitude: f32) -> Vec<f32> {
        (0..N).map(|_| self.rng.gen_range(-amplitude..amplitude)).collect()
    }
}

fn learned_session(signal: &mut Signal) -> TuningSession {
    let mut session = TuningSession::new(N, TuningModel::default()).unwrap();
    session.start(RATE).unwrap();
    for _ in 0..LEARN_TARGET {
        session.process_frame(&signal.hiss()).unwrap();
    }
    assert_eq!(session.state(), SessionState::Detecting);
    session
}

fn readings(session: &mut TuningSession, frames: Vec<Vec<f32>>) -> Vec<TuningReading> {
    frames
        .iter()
        .filter_map(|frame| session.process_frame(frame).unwrap().reading().cloned())
        .collect()
}

#[test]
fn detects_a2_after_learning_the_room() {
    let mut signal = Signal::new(1);
    let mut session = learned_session(&mut signal);

    let frames = (0..8).map(|_| signal.tone(110.0, 0.4)).collect();
    let readings = readings(&mut session, frames);

    assert!(!readings.is_empty(), "no accepted frames");
    for reading in &readings {
        assert_eq!((reading.note, reading.octave, reading.string_index), ("A", 2, 1));
        assert!((reading.frequency_hz - 110.0).abs() < 1.5, "{}", reading.frequency_hz);
    }
    assert!(session.last_confidence() >= 0.85);
}

#[test]
fn in_tune_edge_fires_on_each_entry_into_tune() {
    let mut signal = Signal::new(2);
    let mut session = learned_session(&mut signal);

    let e4 = 329.63;
    let mut frames: Vec<Vec<f32>> = (0..6).map(|_| signal.tone(e4, 0.4)).collect();
    // A semitone sharp (F4).
    frames.extend((0..10).map(|_| signal.tone(349.23, 0.4)));
    // The denoiser's magnitude smoothing needs a while to forget F4.
    frames.extend((0..30).map(|_| signal.tone(e4, 0.4)));
    let readings = readings(&mut session, frames);

    let mut previous_in_tune = false;
    let mut edges = 0;
    for reading in &readings {
        let in_tune = reading.classification == Classification::InTune;
        assert_eq!(reading.in_tune_edge, in_tune && !previous_in_tune);
        edges += reading.in_tune_edge as usize;
        previous_in_tune = in_tune;
    }
    assert!(edges >= 2, "expected to enter tune twice, got {edges}");
    assert!(readings.iter().all(|r| (r.note, r.octave) == ("E", 4)));
    assert!(
        readings
            .iter()
            .any(|r| r.classification == Classification::Far(Direction::Sharp))
    );
    assert_eq!(readings.last().unwrap().classification, Classification::InTune);
}

#[test]
fn locked_string_measures_against_the_lock() {
    let mut signal = Signal::new(3);
    let mut session = learned_session(&mut signal);
    session.lock_string(Some(0)).unwrap();

    let frames = (0..4).map(|_| signal.tone(110.0, 0.4)).collect();
    let readings = readings(&mut session, frames);

    let last = readings.last().expect("accepted frame");
    assert_eq!((last.note, last.octave), ("E", 2));
    // A2 is a fourth (500 cents) above E2.
    assert!((last.cents - 500.0).abs() < 25.0, "{}", last.cents);
    assert_eq!(last.classification, Classification::Far(Direction::Sharp));
}

#[test]
fn pitches_outside_the_tuning_range_are_rejected() {
    let mut signal = Signal::new(4);
    let mut session = learned_session(&mut signal);

    for _ in 0..3 {
        let report = session.process_frame(&signal.tone(1500.0, 0.4)).unwrap();
        assert_eq!(report.outcome, FrameOutcome::Rejected(Rejection::OutOfBounds));
        assert!(report.confidence > 0.0);
    }
    assert_eq!(session.smoothed_cents(), 0.0);
}

#[test]
fn broadband_noise_never_moves_the_needle() {
    let mut signal = Signal::new(5);
    let mut session = learned_session(&mut signal);

    for _ in 0..5 {
        let report = session.process_frame(&signal.noise(0.5)).unwrap();
        assert!(matches!(report.outcome, FrameOutcome::Rejected(_)), "{:?}", report.outcome);
    }
    assert_eq!(session.smoothed_cents(), 0.0);
}

#[test]
fn silent_frames_do_not_advance_smoothing() {
    let mut signal = Signal::new(6);
    let mut session = learned_session(&mut signal);

    let frames = (0..4).map(|_| signal.tone(116.5, 0.4)).collect();
    assert!(!readings(&mut session, frames).is_empty());
    let smoothed = session.smoothed_cents();
    assert!(smoothed != 0.0);

    for _ in 0..5 {
        let report = session.process_frame(&vec![0.0; N]).unwrap();
        assert_eq!(report.outcome, FrameOutcome::Silent);
    }
    assert_eq!(session.smoothed_cents(), smoothed);
}

#[test]
fn restart_learns_a_new_noise_profile() {
    let mut signal = Signal::new(7);
    let mut session = learned_session(&mut signal);
    session.stop();
    assert_eq!(session.state(), SessionState::Idle);

    session.start(RATE).unwrap();
    let report = session.process_frame(&signal.tone(110.0, 0.4)).unwrap();
    assert_eq!(report.outcome, FrameOutcome::Learning { learned: 1, target: LEARN_TARGET });
}
