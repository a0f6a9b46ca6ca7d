//! # Spectral Subtraction Module
//!
//! Suppresses stationary background noise (hum, hiss, fan noise) so the pitch
//! estimator sees a cleaner periodic signal.
//!
//! The denoiser first learns a noise spectrum by averaging the magnitude
//! spectra of [`LEARN_TARGET`] frames. Afterwards every frame is windowed,
//! transformed, and each bin's magnitude is reduced by an over-weighted copy of
//! the learned noise, never below a small fraction of its original value. The
//! cleaned magnitudes are smoothed over time and recombined with the noisy
//! phase before transforming back.

use rustfft::num_complex::Complex;

use crate::error::Result;
use crate::fft::{spectrum_to_magnitudes, SpectrumEngine};

/// Frames averaged into the noise profile.
pub const LEARN_TARGET: usize = 20;

/// Multiplier applied to the noise estimate before subtraction.
pub const OVERSUBTRACTION: f32 = 2.0;

/// Minimum retained magnitude, relative to the bin's magnitude before
/// subtraction.
pub const SPECTRAL_FLOOR: f32 = 0.002;

/// Weight of the previous frame's magnitude in the temporal smoothing.
pub const TEMPORAL_SMOOTHING: f32 = 0.8;

#[derive(Debug)]
enum NoiseState {
    /// Summed magnitudes of the frames seen so far.
    Learning { sum: Vec<f32>, frames: usize },
    /// Averaged noise magnitude per bin (N/2 + 1 entries).
    Learned { profile: Vec<f32> },
}

/// Spectral-subtraction denoiser for one session.
///
/// Learning is one-way: once the profile is built it cannot be re-learned;
/// create a new denoiser instead.
#[derive(Debug)]
pub struct SpectralDenoiser {
    engine: SpectrumEngine,
    state: NoiseState,
    spectrum: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    prev_magnitudes: Vec<f32>,
    output: Vec<f32>,
}

impl SpectralDenoiser {
    /// Creates a denoiser for frames of `frame_size` samples (power of two).
    pub fn new(frame_size: usize) -> Result<Self> {
        let engine = SpectrumEngine::new(frame_size)?;
        let bins = engine.bin_count();
        Ok(Self {
            state: NoiseState::Learning { sum: vec![0.0; bins], frames: 0 },
            spectrum: vec![Complex::new(0.0, 0.0); frame_size],
            magnitudes: vec![0.0; bins],
            prev_magnitudes: vec![0.0; bins],
            output: vec![0.0; frame_size],
            engine,
        })
    }

    pub fn frame_size(&self) -> usize {
        self.engine.size()
    }

    pub fn is_learned(&self) -> bool {
        matches!(self.state, NoiseState::Learned { .. })
    }

    /// Number of frames accumulated so far (saturates at [`LEARN_TARGET`]).
    pub fn frames_learned(&self) -> usize {
        match &self.state {
            NoiseState::Learning { frames, .. } => *frames,
            NoiseState::Learned { .. } => LEARN_TARGET,
        }
    }

    /// The learned noise magnitude per bin, once learning has completed.
    pub fn noise_profile(&self) -> Option<&[f32]> {
        match &self.state {
            NoiseState::Learned { profile } => Some(profile),
            NoiseState::Learning { .. } => None,
        }
    }

    /// Adds one frame to the noise estimate.
    ///
    /// Returns `true` exactly once, on the call that completes the profile.
    /// Calls after that are ignored and return `false`.
    pub fn learn_frame(&mut self, frame: &[f32]) -> bool {
        let NoiseState::Learning { sum, frames } = &mut self.state else {
            return false;
        };

        self.engine.forward_windowed(frame, &mut self.spectrum);
        spectrum_to_magnitudes(&self.spectrum, &mut self.magnitudes);
        for (acc, &mag) in sum.iter_mut().zip(&self.magnitudes) {
            *acc += mag;
        }
        *frames += 1;

        if *frames < LEARN_TARGET {
            return false;
        }

        let count = *frames as f32;
        let profile: Vec<f32> = sum.iter().map(|&total| total / count).collect();
        log::info!(
            "[DENOISE] Noise profile learned from {} frames (mean bin magnitude {:.5})",
            LEARN_TARGET,
            profile.iter().sum::<f32>() / profile.len() as f32
        );
        // The accumulator is dropped with the old state.
        self.state = NoiseState::Learned { profile };
        true
    }

    /// Returns the denoised version of `frame`.
    ///
    /// Until the noise profile is learned the input is passed through
    /// unchanged. The returned slice is valid until the next call.
    pub fn process<'a>(&'a mut self, frame: &'a [f32]) -> &'a [f32] {
        let NoiseState::Learned { profile } = &self.state else {
            return frame;
        };

        let size = self.engine.size();
        let half = size / 2;

        self.engine.forward_windowed(frame, &mut self.spectrum);

        for bin in 0..=half {
            let noisy = self.spectrum[bin];
            let mag = noisy.norm();
            let phase = noisy.arg();

            let clean = (mag - OVERSUBTRACTION * profile[bin]).max(SPECTRAL_FLOOR * mag);
            let smoothed = TEMPORAL_SMOOTHING * self.prev_magnitudes[bin]
                + (1.0 - TEMPORAL_SMOOTHING) * clean;
            self.prev_magnitudes[bin] = smoothed;

            self.spectrum[bin] = Complex::from_polar(smoothed, phase);
        }
        // Mirror into the upper half so the inverse is real. DC and Nyquist
        // have no partner bin.
        for bin in 1..half {
            self.spectrum[size - bin] = self.spectrum[bin].conj();
        }

        self.engine.inverse_real(&mut self.spectrum, &mut self.output);
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const N: usize = 1024;

    fn noise_frame(rng: &mut StdRng, amplitude: f32) -> Vec<f32> {
        (0..N).map(|_| rng.gen_range(-amplitude..amplitude)).collect()
    }

    fn rms(signal: &[f32]) -> f32 {
        (signal.iter().map(|s| s * s).sum::<f32>() / signal.len() as f32).sqrt()
    }

    #[test]
    fn learning_completes_on_the_twentieth_frame() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut denoiser = SpectralDenoiser::new(N).unwrap();

        for call in 1..LEARN_TARGET {
            assert!(!denoiser.learn_frame(&noise_frame(&mut rng, 0.05)), "call {call}");
            assert_eq!(denoiser.frames_learned(), call);
        }
        assert!(denoiser.learn_frame(&noise_frame(&mut rng, 0.05)));
        assert!(denoiser.is_learned());
        assert!(!denoiser.learn_frame(&noise_frame(&mut rng, 0.05)));

        let profile = denoiser.noise_profile().unwrap();
        assert_eq!(profile.len(), N / 2 + 1);
        assert!(profile.iter().all(|&m| m >= 0.0));
    }

    #[test]
    fn passes_through_until_learned() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut denoiser = SpectralDenoiser::new(N).unwrap();
        let frame = noise_frame(&mut rng, 0.2);
        assert_eq!(denoiser.process(&frame), frame.as_slice());
    }

    #[test]
    fn reduces_stationary_noise() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut denoiser = SpectralDenoiser::new(N).unwrap();
        while !denoiser.learn_frame(&noise_frame(&mut rng, 0.1)) {}

        let mut input_rms = 0.0;
        let mut output_rms = 0.0;
        for _ in 0..10 {
            let frame = noise_frame(&mut rng, 0.1);
            input_rms += rms(&frame);
            output_rms += rms(denoiser.process(&frame));
        }
        assert!(output_rms < input_rms * 0.5, "in {input_rms}, out {output_rms}");
    }

    #[test]
    fn keeps_a_tone_above_the_noise_floor() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut denoiser = SpectralDenoiser::new(N).unwrap();
        while !denoiser.learn_frame(&noise_frame(&mut rng, 0.01)) {}

        let tone: Vec<f32> = (0..N)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 40.0 * i as f32 / N as f32).sin())
            .collect();
        let mut out = Vec::new();
        for _ in 0..30 {
            out = denoiser.process(&tone).to_vec();
        }
        // Converged output is the windowed tone: Hann RMS factor is ~0.61.
        let expected = rms(&tone) * 0.61;
        assert!((rms(&out) - expected).abs() < expected * 0.1);
    }
}
