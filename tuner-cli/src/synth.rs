//! Synthetic frame source for running the pipeline without a microphone.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tuner_core::denoise::LEARN_TARGET;
use tuner_core::{FrameSource, Result};

/// Level of the background hiss, below the session's silence threshold.
const HISS: f32 = 0.004;

/// Emits a quiet lead-in for noise learning, then a sine at `frequency`
/// mixed with white noise, then runs dry.
pub struct SyntheticSource {
    sample_rate: u32,
    frequency: f32,
    noise: f32,
    tone_frames: usize,
    emitted: usize,
    phase: f32,
    rng: StdRng,
}

impl SyntheticSource {
    pub fn new(sample_rate: u32, frequency: f32, noise: f32, tone_frames: usize) -> Self {
        Self {
            sample_rate,
            frequency,
            noise,
            tone_frames,
            emitted: 0,
            phase: 0.0,
            rng: StdRng::seed_from_u64(u64::from(frequency.to_bits())),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.emitted >= LEARN_TARGET + self.tone_frames
    }
}

impl FrameSource for SyntheticSource {
    fn open(&mut self) -> Result<u32> {
        self.emitted = 0;
        self.phase = 0.0;
        Ok(self.sample_rate)
    }

    fn next_frame(&mut self, frame: &mut [f32]) -> Result<bool> {
        if self.is_exhausted() {
            return Ok(false);
        }

        if self.emitted < LEARN_TARGET {
            for sample in frame.iter_mut() {
                *sample = self.rng.gen_range(-HISS..HISS);
            }
        } else {
            let step = std::f32::consts::TAU * self.frequency / self.sample_rate as f32;
            for sample in frame.iter_mut() {
                let noise = if self.noise > 0.0 {
                    self.rng.gen_range(-self.noise..self.noise)
                } else {
                    0.0
                };
                *sample = 0.5 * self.phase.sin() + noise;
                self.phase = (self.phase + step) % std::f32::consts::TAU;
            }
        }
        self.emitted += 1;
        Ok(true)
    }
}
