//! # Audio Input Module
//!
//! The boundary between the tuner and whatever supplies audio. The session
//! never talks to a device; a [`FrameSource`] hands it fixed-length frames,
//! one per scheduling tick.
//!
//! With the `capture` feature (on by default) this module also provides
//! [`MicrophoneSource`], which records from the default input device using
//! CPAL (Cross-Platform Audio Library).

use crate::error::Result;

/// Pull-based supplier of fixed-length audio frames.
pub trait FrameSource {
    /// Prepares the source and returns its sample rate in Hz.
    ///
    /// Failures must be reported as [`crate::TunerError::CaptureUnavailable`];
    /// callers do not retry.
    fn open(&mut self) -> Result<u32>;

    /// Fills `frame` with the next block of samples.
    ///
    /// Returns `Ok(false)` when no complete frame is available this tick.
    fn next_frame(&mut self, frame: &mut [f32]) -> Result<bool>;

    /// Releases the device. Calling it on a closed source does nothing.
    fn close(&mut self) {}
}

#[cfg(feature = "capture")]
pub use microphone::MicrophoneSource;

#[cfg(feature = "capture")]
mod microphone {
    use std::time::Duration;

    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::SupportedStreamConfigRange;
    use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

    use super::FrameSource;
    use crate::error::{Result, TunerError};

    /// Frames buffered between the device callback and the session. When the
    /// session falls behind, new frames are dropped rather than queued.
    const CHANNEL_CAPACITY: usize = 4;

    /// Records from the default input device and slices the stream into
    /// frames.
    pub struct MicrophoneSource {
        frame_size: usize,
        preferred_rate: u32,
        timeout: Duration,
        stream: Option<cpal::Stream>,
        receiver: Option<Receiver<Vec<f32>>>,
    }

    impl MicrophoneSource {
        /// # Arguments
        /// * `frame_size` - Samples per frame delivered to the session
        /// * `preferred_rate` - Sample rate to ask the device for
        /// * `timeout` - How long `next_frame` waits before reporting no frame
        pub fn new(frame_size: usize, preferred_rate: u32, timeout: Duration) -> Self {
            Self {
                frame_size,
                preferred_rate,
                timeout,
                stream: None,
                receiver: None,
            }
        }
    }

    fn unavailable(err: impl std::fmt::Display) -> TunerError {
        TunerError::CaptureUnavailable(err.to_string())
    }

    impl FrameSource for MicrophoneSource {
        fn open(&mut self) -> Result<u32> {
            let host = cpal::default_host();
            let device = host
                .default_input_device()
                .ok_or_else(|| unavailable("no input device available"))?;

            log::info!("[AUDIO] Using audio input device: {}", device.name().map_err(unavailable)?);

            let configs = device
                .supported_input_configs()
                .map_err(unavailable)?
                .collect::<Vec<_>>();
            let supported_config = find_supported_config(configs, self.preferred_rate)
                .ok_or_else(|| unavailable("no suitable f32 input format found"))?;

            let rate = self
                .preferred_rate
                .clamp(supported_config.min_sample_rate().0, supported_config.max_sample_rate().0);
            let config = supported_config.with_sample_rate(cpal::SampleRate(rate));
            let channels = config.channels().max(1) as usize;
            let config: cpal::StreamConfig = config.into();

            log::info!("[AUDIO] Selected sample rate: {rate} Hz, {channels} channel(s)");

            let (sender, receiver) = crossbeam_channel::bounded(CHANNEL_CAPACITY);
            let mut framer = Framer::new(self.frame_size, channels, sender);

            let stream = device
                .build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| framer.push(data),
                    |err| log::error!("[AUDIO] An error occurred on the audio stream: {err}"),
                    None,
                )
                .map_err(unavailable)?;
            stream.play().map_err(unavailable)?;

            self.stream = Some(stream);
            self.receiver = Some(receiver);
            Ok(rate)
        }

        fn next_frame(&mut self, frame: &mut [f32]) -> Result<bool> {
            let receiver = self
                .receiver
                .as_ref()
                .ok_or_else(|| unavailable("microphone not open"))?;
            match receiver.recv_timeout(self.timeout) {
                Ok(samples) => {
                    frame.copy_from_slice(&samples);
                    Ok(true)
                }
                Err(RecvTimeoutError::Timeout) => Ok(false),
                Err(RecvTimeoutError::Disconnected) => Err(unavailable("audio stream closed")),
            }
        }

        fn close(&mut self) {
            if let Some(stream) = self.stream.take() {
                if let Err(e) = stream.pause() {
                    log::warn!("[AUDIO] Error pausing stream: {e}");
                }
                log::info!("[AUDIO] Stream stopped");
            }
            self.receiver = None;
        }
    }

    impl Drop for MicrophoneSource {
        fn drop(&mut self) {
            self.close();
        }
    }

    /// Downmixes interleaved callback data to mono and cuts it into frames.
    struct Framer {
        frame_size: usize,
        channels: usize,
        buffer: Vec<f32>,
        sender: Sender<Vec<f32>>,
    }

    impl Framer {
        fn new(frame_size: usize, channels: usize, sender: Sender<Vec<f32>>) -> Self {
            Self {
                frame_size,
                channels,
                buffer: Vec::with_capacity(frame_size * 2),
                sender,
            }
        }

        fn push(&mut self, data: &[f32]) {
            if self.channels == 1 {
                self.buffer.extend_from_slice(data);
            } else {
                let scale = 1.0 / self.channels as f32;
                self.buffer
                    .extend(data.chunks(self.channels).map(|c| c.iter().sum::<f32>() * scale));
            }

            // While we have enough data for a full frame, send it.
            while self.buffer.len() >= self.frame_size {
                let frame: Vec<f32> = self.buffer.drain(..self.frame_size).collect();
                // A full channel means the session is behind; drop the frame.
                let _ = self.sender.try_send(frame);
            }
        }
    }

    /// Picks the f32 input configuration whose rate range is closest to
    /// `target_rate`, preferring mono.
    fn find_supported_config(
        configs: Vec<SupportedStreamConfigRange>,
        target_rate: u32,
    ) -> Option<SupportedStreamConfigRange> {
        configs
            .into_iter()
            .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
            .min_by_key(|c| {
                let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
                let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
                let in_range =
                    c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0;
                let rate_cost = if in_range { 0 } else { min_diff.min(max_diff) };
                (rate_cost, c.channels())
            })
    }

}
