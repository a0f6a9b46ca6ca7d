//! # Pitch Detection Module
//!
//! This module implements the YIN pitch detection algorithm for plucked
//! strings.
//!
//! ## Features
//! - Cumulative mean normalized difference function
//! - Absolute-threshold search that walks to the bottom of the first dip
//! - Confidence score derived from the depth of that dip
//! - Parabolic interpolation for sub-sample accuracy

/// A dip in the normalized difference below this value counts as a period.
pub const YIN_THRESHOLD: f32 = 0.15;

/// Frequency estimate for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionResult {
    /// Detected fundamental in Hz, `None` when no period was found.
    pub frequency_hz: Option<f32>,
    /// Periodicity of the frame in [0, 1]; 0 when no period was found.
    pub confidence: f32,
}

impl DetectionResult {
    /// Noise, silence, or non-harmonic input.
    pub const NONE: DetectionResult = DetectionResult { frequency_hz: None, confidence: 0.0 };
}

/// YIN estimator with a reusable difference buffer.
///
/// The buffer is resized on demand, so one estimator can serve frames of any
/// length, but a session always feeds it the same length.
#[derive(Debug, Default)]
pub struct YinEstimator {
    yin_buffer: Vec<f32>,
}

impl YinEstimator {
    pub fn new(frame_size: usize) -> Self {
        Self { yin_buffer: vec![0.0; frame_size / 2] }
    }

    /// Estimates the fundamental frequency of `signal`.
    ///
    /// # Arguments
    /// * `signal` - Input audio frame
    /// * `sample_rate` - Sample rate in Hz
    ///
    /// # Returns
    /// * `DetectionResult` with `frequency_hz = None` and zero confidence when
    ///   the signal has no clear period. This is the normal result for
    ///   silence and noise.
    pub fn estimate(&mut self, signal: &[f32], sample_rate: u32) -> DetectionResult {
        let half_len = signal.len() / 2;
        if half_len < 3 {
            return DetectionResult::NONE;
        }
        self.yin_buffer.resize(half_len, 0.0);
        let yin_buffer = &mut self.yin_buffer[..];

        // --- Difference function ---
        for tau in 1..half_len {
            let mut diff = 0.0;
            for i in 0..half_len {
                let delta = signal[i] - signal[i + tau];
                diff += delta * delta;
            }
            yin_buffer[tau] = diff;
        }

        // --- Cumulative mean normalized difference ---
        let mut running_sum = 0.0;
        yin_buffer[0] = 1.0;
        for tau in 1..half_len {
            running_sum += yin_buffer[tau];
            if running_sum != 0.0 {
                yin_buffer[tau] *= tau as f32 / running_sum;
            } else {
                yin_buffer[tau] = 1.0;
            }
        }

        // --- Absolute threshold, then walk to the bottom of the dip ---
        let Some(mut tau) = (2..half_len).find(|&t| yin_buffer[t] < YIN_THRESHOLD) else {
            return DetectionResult::NONE;
        };
        while tau + 1 < half_len && yin_buffer[tau + 1] < yin_buffer[tau] {
            tau += 1;
        }

        let confidence = (1.0 - yin_buffer[tau]).clamp(0.0, 1.0);
        let better_tau = parabolic_interpolation(yin_buffer, tau);

        DetectionResult {
            frequency_hz: Some(sample_rate as f32 / better_tau),
            confidence,
        }
    }
}

/// Refines the integer lag `tau` to a fractional one using the vertex of the
/// parabola through `tau - 1`, `tau` and `tau + 1`.
fn parabolic_interpolation(yin_buffer: &[f32], tau: usize) -> f32 {
    let x0 = if tau < 1 { tau } else { tau - 1 };
    let x2 = if tau + 1 < yin_buffer.len() { tau + 1 } else { tau };

    // At a buffer edge there is no parabola to fit.
    if x0 == tau || x2 == tau {
        return tau as f32;
    }

    let s0 = yin_buffer[x0];
    let s1 = yin_buffer[tau];
    let s2 = yin_buffer[x2];
    let denominator = 2.0 * (2.0 * s1 - s2 - s0);

    if denominator.abs() > f32::EPSILON {
        tau as f32 + (s2 - s0) / denominator
    } else if s0 < s1 && s0 <= s2 {
        x0 as f32
    } else if s2 < s1 {
        x2 as f32
    } else {
        tau as f32
    }
}
