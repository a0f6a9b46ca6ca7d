//! # Fast Fourier Transform (FFT) Module
//!
//! Forward and inverse transforms for one fixed frame length, used by the
//! spectral denoiser.
//!
//! ## Features
//! - FFT plans created once per frame length using RustFFT
//! - Hann window coefficients precomputed at construction
//! - Magnitude extraction for the non-redundant half of the spectrum

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::error::{Result, TunerError};

/// Builds a Hann window of `n` coefficients.
///
/// The Hann window reduces spectral leakage by tapering the signal
/// to zero at the edges.
pub fn hann_window(n: usize) -> Vec<f32> {
    if n < 2 {
        return vec![1.0; n];
    }
    let n_minus_1 = (n - 1) as f32;
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos()))
        .collect()
}

/// Planned FFT pair plus window for a single frame length.
///
/// All allocations happen in [`SpectrumEngine::new`]; the per-frame methods
/// only reuse internal buffers.
pub struct SpectrumEngine {
    size: usize,
    window: Vec<f32>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl std::fmt::Debug for SpectrumEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumEngine").field("size", &self.size).finish()
    }
}

impl SpectrumEngine {
    /// Plans transforms for frames of `size` samples. `size` must be a power
    /// of two.
    pub fn new(size: usize) -> Result<Self> {
        if size < 2 || !size.is_power_of_two() {
            return Err(TunerError::InvalidFrameSize(size));
        }

        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        Ok(Self {
            size,
            window: hann_window(size),
            forward,
            inverse,
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of non-redundant bins (DC through Nyquist).
    pub fn bin_count(&self) -> usize {
        self.size / 2 + 1
    }

    /// Applies the Hann window to `signal` and transforms it into `spectrum`.
    ///
    /// Both slices must be exactly `size()` long.
    pub fn forward_windowed(&mut self, signal: &[f32], spectrum: &mut [Complex<f32>]) {
        debug_assert_eq!(signal.len(), self.size);
        debug_assert_eq!(spectrum.len(), self.size);

        for ((bin, &sample), &w) in spectrum.iter_mut().zip(signal).zip(&self.window) {
            *bin = Complex { re: sample * w, im: 0.0 };
        }
        self.forward.process_with_scratch(spectrum, &mut self.scratch);
    }

    /// Inverse-transforms `spectrum` in place and writes the normalized real
    /// part into `signal`.
    pub fn inverse_real(&mut self, spectrum: &mut [Complex<f32>], signal: &mut [f32]) {
        debug_assert_eq!(spectrum.len(), self.size);
        debug_assert_eq!(signal.len(), self.size);

        self.inverse.process_with_scratch(spectrum, &mut self.scratch);
        // RustFFT does not normalize.
        let scale = 1.0 / self.size as f32;
        for (out, bin) in signal.iter_mut().zip(spectrum.iter()) {
            *out = bin.re * scale;
        }
    }
}

/// Writes the magnitudes of bins 0..=N/2 of `spectrum` into `magnitudes`.
pub fn spectrum_to_magnitudes(spectrum: &[Complex<f32>], magnitudes: &mut [f32]) {
    for (mag, c) in magnitudes.iter_mut().zip(spectrum) {
        *mag = c.norm(); // .norm() is sqrt(re^2 + im^2)
    }
}
