//! # String Tuner - command-line front end
//!
//! Wires a frame source (the microphone, or a synthetic tone) to the
//! `tuner-core` driver and prints the readings. All signal processing lives
//! in `tuner-core`; this binary only parses options, schedules ticks and
//! formats output.

mod synth;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tuner_core::audio::MicrophoneSource;
use tuner_core::{
    FrameOutcome, FrameReport, FrameSource, TunerConfig, TunerDriver, TuningModel, TuningProfile,
    TuningSession,
};

use crate::synth::SyntheticSource;

/// How long the microphone loop waits for a frame before checking the clock.
const FRAME_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(name = "string-tuner", about = "Real-time guitar string tuner")]
struct Cli {
    /// JSON config file; flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone, Default)]
struct TuningArgs {
    /// Tuning profile: standard, drop-d, open-g, dadgad, half-step-down, open-d
    #[arg(long)]
    tuning: Option<TuningProfile>,
    /// A4 reference in Hz (clamped to 432-446)
    #[arg(long)]
    calibration: Option<f32>,
    /// Lock feedback to one string (0 = lowest)
    #[arg(long)]
    lock: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Tune from the default microphone
    Listen {
        #[command(flatten)]
        tuning: TuningArgs,
        /// Stop after this many seconds (runs until interrupted otherwise)
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// List the tuning profiles and their string frequencies
    Tunings {
        /// A4 reference in Hz (clamped to 432-446)
        #[arg(long)]
        calibration: Option<f32>,
    },
    /// Run the pipeline on a synthetic tone
    Simulate {
        #[command(flatten)]
        tuning: TuningArgs,
        /// Frequency of the test tone in Hz
        #[arg(long)]
        frequency: f32,
        /// Peak amplitude of white noise mixed into the tone
        #[arg(long, default_value_t = 0.0)]
        noise: f32,
        /// Number of tone frames after the noise-learning lead-in
        #[arg(long, default_value_t = 30)]
        frames: usize,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let base = match &cli.config {
        Some(path) => TunerConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => TunerConfig::default(),
    };

    match cli.command {
        Command::Listen { tuning, seconds } => {
            let config = apply(base, &tuning)?;
            listen(&config, seconds.map(Duration::from_secs))
        }
        Command::Tunings { calibration } => {
            print_tunings(calibration.unwrap_or(base.calibration_hz));
            Ok(())
        }
        Command::Simulate { tuning, frequency, noise, frames } => {
            let config = apply(base, &tuning)?;
            simulate(&config, frequency, noise, frames)
        }
    }
}

/// Applies command-line overrides on top of the loaded config.
fn apply(mut config: TunerConfig, args: &TuningArgs) -> Result<TunerConfig> {
    if let Some(profile) = args.tuning {
        config.tuning = profile;
    }
    if let Some(hz) = args.calibration {
        config.calibration_hz = hz;
    }
    if args.lock.is_some() {
        config.locked_string = args.lock;
    }
    config.validate().context("invalid tuner settings")?;
    Ok(config)
}

fn build_driver<S: FrameSource>(config: &TunerConfig, source: S) -> Result<TunerDriver<S>> {
    let mut session = TuningSession::new(config.frame_size, config.tuning_model())?;
    session.lock_string(config.locked_string)?;
    log::info!(
        "[MAIN] {} tuning, A4 = {:.1} Hz",
        session.model().profile(),
        session.model().calibration()
    );
    Ok(TunerDriver::new(source, session))
}

fn listen(config: &TunerConfig, duration: Option<Duration>) -> Result<()> {
    let source = MicrophoneSource::new(config.frame_size, config.sample_rate, FRAME_TIMEOUT);
    let mut driver = build_driver(config, source)?;
    driver.start().context("cannot listen to the microphone")?;

    println!("Stay quiet for a moment while the room noise is measured...");
    let deadline = duration.map(|d| Instant::now() + d);
    while deadline.is_none_or(|d| Instant::now() < d) {
        if let Some(report) = driver.tick()? {
            print_report(&report);
        }
    }
    driver.stop();
    Ok(())
}

fn simulate(config: &TunerConfig, frequency: f32, noise: f32, frames: usize) -> Result<()> {
    anyhow::ensure!(frequency > 0.0, "frequency must be positive");
    let source = SyntheticSource::new(config.sample_rate, frequency, noise, frames);
    let mut driver = build_driver(config, source)?;
    driver.start()?;

    let mut accepted = 0;
    while !driver.source().is_exhausted() {
        if let Some(report) = driver.tick()? {
            if report.reading().is_some() {
                accepted += 1;
            }
            print_report(&report);
        }
    }
    println!(
        "{accepted}/{frames} tone frames accepted, final smoothed deviation {:+.1} cents",
        driver.session().smoothed_cents()
    );
    driver.stop();
    Ok(())
}

fn print_report(report: &FrameReport) {
    match &report.outcome {
        FrameOutcome::Learning { learned, target } if learned == target => {
            println!("Noise profile ready. Play a string.");
        }
        FrameOutcome::Accepted(reading) => {
            let pulse = if reading.in_tune_edge { "  <<" } else { "" };
            println!(
                "{}{} (string {})  {:8.2} Hz  {:+6.1} cents  {}  [confidence {:.2}]{}",
                reading.note,
                reading.octave,
                reading.string_index + 1,
                reading.frequency_hz,
                reading.smoothed_cents,
                reading.classification,
                report.confidence,
                pulse
            );
        }
        FrameOutcome::Rejected(reason) => {
            log::debug!("[MAIN] Frame rejected ({reason:?}), confidence {:.2}", report.confidence);
        }
        FrameOutcome::Idle | FrameOutcome::Silent | FrameOutcome::Learning { .. } => {}
    }
}

fn print_tunings(calibration: f32) {
    for profile in TuningProfile::ALL {
        let model = TuningModel::new(profile, calibration);
        let bounds = model.frequency_bounds();
        println!(
            "{} ({}), A4 = {:.1} Hz, detection range {:.1}-{:.1} Hz",
            profile,
            profile.key(),
            model.calibration(),
            bounds.low,
            bounds.high
        );
        for string in model.active_strings().strings() {
            println!("  {}: {:<4} {:8.2} Hz", string.index + 1, string.to_string(), string.frequency);
        }
    }
}
