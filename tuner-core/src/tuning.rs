//! # Musical Tuning Module
//!
//! This module provides the guitar tuning tables and the calibration model that
//! turns a tuning profile into concrete string frequencies.
//!
//! ## Features
//! - Six fixed six-string tuning profiles (Standard, Drop D, Open G, DADGAD,
//!   Half-Step Down, Open D)
//! - Adjustable calibration reference (A4 = 432..446 Hz)
//! - Lazily derived per-string frequencies with explicit invalidation
//! - Nearest-string lookup by absolute cent distance
//! - Cent deviation calculations for tuning accuracy

use std::fmt;
use std::str::FromStr;

use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::TunerError;

/// Lowest accepted calibration reference in Hz.
pub const MIN_CALIBRATION_HZ: f32 = 432.0;
/// Highest accepted calibration reference in Hz.
pub const MAX_CALIBRATION_HZ: f32 = 446.0;
/// Concert pitch.
pub const DEFAULT_CALIBRATION_HZ: f32 = 440.0;

/// Number of strings in every supported profile.
pub const STRING_COUNT: usize = 6;

/// One string of a tuning profile. The frequency is never stored; it is
/// derived from the calibration reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringDefinition {
    /// Note name without octave (e.g. "E", "F#", "Bb").
    pub name: &'static str,
    pub octave: u8,
    /// Semitones relative to the calibration reference (A4).
    pub semitone: i32,
}

impl StringDefinition {
    const fn new(name: &'static str, octave: u8, semitone: i32) -> Self {
        Self { name, octave, semitone }
    }

    /// Equal-temperament frequency of this string for the given A4 reference.
    pub fn frequency(&self, a4_reference: f32) -> f32 {
        a4_reference * 2.0_f32.powf(self.semitone as f32 / 12.0)
    }
}

const STANDARD: [StringDefinition; STRING_COUNT] = [
    StringDefinition::new("E", 2, -29),
    StringDefinition::new("A", 2, -24),
    StringDefinition::new("D", 3, -19),
    StringDefinition::new("G", 3, -14),
    StringDefinition::new("B", 3, -10),
    StringDefinition::new("E", 4, -5),
];

const DROP_D: [StringDefinition; STRING_COUNT] = [
    StringDefinition::new("D", 2, -31),
    StringDefinition::new("A", 2, -24),
    StringDefinition::new("D", 3, -19),
    StringDefinition::new("G", 3, -14),
    StringDefinition::new("B", 3, -10),
    StringDefinition::new("E", 4, -5),
];

const OPEN_G: [StringDefinition; STRING_COUNT] = [
    StringDefinition::new("D", 2, -31),
    StringDefinition::new("G", 2, -26),
    StringDefinition::new("D", 3, -19),
    StringDefinition::new("G", 3, -14),
    StringDefinition::new("B", 3, -10),
    StringDefinition::new("D", 4, -7),
];

const DADGAD: [StringDefinition; STRING_COUNT] = [
    StringDefinition::new("D", 2, -31),
    StringDefinition::new("A", 2, -24),
    StringDefinition::new("D", 3, -19),
    StringDefinition::new("G", 3, -14),
    StringDefinition::new("A", 3, -12),
    StringDefinition::new("D", 4, -7),
];

const HALF_STEP_DOWN: [StringDefinition; STRING_COUNT] = [
    StringDefinition::new("Eb", 2, -30),
    StringDefinition::new("Ab", 2, -25),
    StringDefinition::new("Db", 3, -20),
    StringDefinition::new("Gb", 3, -15),
    StringDefinition::new("Bb", 3, -11),
    StringDefinition::new("Eb", 4, -6),
];

const OPEN_D: [StringDefinition; STRING_COUNT] = [
    StringDefinition::new("D", 2, -31),
    StringDefinition::new("A", 2, -24),
    StringDefinition::new("D", 3, -19),
    StringDefinition::new("F#", 3, -15),
    StringDefinition::new("A", 3, -12),
    StringDefinition::new("D", 4, -7),
];

/// The supported tuning profiles. Each is a fixed table of six strings,
/// ordered from the lowest-pitched string upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TuningProfile {
    #[default]
    Standard,
    DropD,
    OpenG,
    Dadgad,
    HalfStepDown,
    OpenD,
}

impl TuningProfile {
    pub const ALL: [TuningProfile; 6] = [
        TuningProfile::Standard,
        TuningProfile::DropD,
        TuningProfile::OpenG,
        TuningProfile::Dadgad,
        TuningProfile::HalfStepDown,
        TuningProfile::OpenD,
    ];

    pub fn strings(self) -> &'static [StringDefinition; STRING_COUNT] {
        match self {
            TuningProfile::Standard => &STANDARD,
            TuningProfile::DropD => &DROP_D,
            TuningProfile::OpenG => &OPEN_G,
            TuningProfile::Dadgad => &DADGAD,
            TuningProfile::HalfStepDown => &HALF_STEP_DOWN,
            TuningProfile::OpenD => &OPEN_D,
        }
    }

    /// Stable key used in config files and on the command line.
    pub fn key(self) -> &'static str {
        match self {
            TuningProfile::Standard => "standard",
            TuningProfile::DropD => "drop-d",
            TuningProfile::OpenG => "open-g",
            TuningProfile::Dadgad => "dadgad",
            TuningProfile::HalfStepDown => "half-step-down",
            TuningProfile::OpenD => "open-d",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            TuningProfile::Standard => "Standard",
            TuningProfile::DropD => "Drop D",
            TuningProfile::OpenG => "Open G",
            TuningProfile::Dadgad => "DADGAD",
            TuningProfile::HalfStepDown => "Half-Step Down",
            TuningProfile::OpenD => "Open D",
        }
    }
}

impl fmt::Display for TuningProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for TuningProfile {
    type Err = TunerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        TuningProfile::ALL
            .into_iter()
            .find(|p| p.key() == wanted)
            .ok_or_else(|| TunerError::UnknownTuning(s.to_string()))
    }
}

/// A string of the current tuning with its derived frequency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveString {
    pub definition: StringDefinition,
    /// Derived frequency in Hz.
    pub frequency: f32,
    /// Position in the profile (0 = lowest string).
    pub index: usize,
}

impl ActiveString {
    pub fn name(&self) -> &'static str {
        self.definition.name
    }

    pub fn octave(&self) -> u8 {
        self.definition.octave
    }
}

impl fmt::Display for ActiveString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.definition.name, self.definition.octave)
    }
}

/// Range of plausible fundamentals for the active tuning. Estimates outside
/// it are octave errors or sub-harmonics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyBounds {
    pub low: f32,
    pub high: f32,
}

impl FrequencyBounds {
    /// Strict containment: the bounds themselves are rejected.
    pub fn contains(&self, freq: f32) -> bool {
        freq > self.low && freq < self.high
    }
}

/// Derived strings and bounds for one (profile, reference) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveStringSet {
    strings: [ActiveString; STRING_COUNT],
    bounds: FrequencyBounds,
}

impl ActiveStringSet {
    fn derive(profile: TuningProfile, a4_reference: f32) -> Self {
        let defs = profile.strings();
        let strings: [ActiveString; STRING_COUNT] = std::array::from_fn(|index| ActiveString {
            definition: defs[index],
            frequency: defs[index].frequency(a4_reference),
            index,
        });

        let min = strings.iter().map(|s| s.frequency).fold(f32::INFINITY, f32::min);
        let max = strings.iter().map(|s| s.frequency).fold(f32::NEG_INFINITY, f32::max);

        Self {
            strings,
            bounds: FrequencyBounds { low: min * 0.5, high: max * 2.0 },
        }
    }

    pub fn strings(&self) -> &[ActiveString] {
        &self.strings
    }

    pub fn bounds(&self) -> FrequencyBounds {
        self.bounds
    }
}

/// Memoized [`ActiveStringSet`]. Holds no state of its own beyond the cached
/// value; `invalidate` must be called whenever an input changes.
#[derive(Debug, Default)]
struct ActiveStringCache {
    cell: OnceCell<ActiveStringSet>,
}

impl ActiveStringCache {
    fn get_or_recompute(&self, profile: TuningProfile, a4_reference: f32) -> &ActiveStringSet {
        self.cell.get_or_init(|| {
            log::debug!("[TUNING] Deriving {profile} strings at A4 = {a4_reference:.1} Hz");
            ActiveStringSet::derive(profile, a4_reference)
        })
    }

    fn invalidate(&mut self) {
        self.cell.take();
    }
}

/// The tuning/calibration model: current profile, current reference, and the
/// derived string frequencies.
#[derive(Debug)]
pub struct TuningModel {
    profile: TuningProfile,
    a4_reference: f32,
    cache: ActiveStringCache,
}

impl Default for TuningModel {
    fn default() -> Self {
        Self::new(TuningProfile::Standard, DEFAULT_CALIBRATION_HZ)
    }
}

impl TuningModel {
    pub fn new(profile: TuningProfile, a4_reference: f32) -> Self {
        let mut model = Self {
            profile,
            a4_reference: DEFAULT_CALIBRATION_HZ,
            cache: ActiveStringCache::default(),
        };
        model.set_calibration(a4_reference);
        model
    }

    pub fn profile(&self) -> TuningProfile {
        self.profile
    }

    /// Effective calibration reference after clamping.
    pub fn calibration(&self) -> f32 {
        self.a4_reference
    }

    pub fn set_tuning(&mut self, profile: TuningProfile) {
        if profile != self.profile {
            self.profile = profile;
            self.cache.invalidate();
        }
    }

    /// Sets the A4 reference, clamped into [432, 446] Hz. Non-finite input
    /// leaves the reference unchanged.
    pub fn set_calibration(&mut self, hz: f32) {
        if !hz.is_finite() {
            log::warn!("[TUNING] Ignoring non-finite calibration {hz}");
            return;
        }
        let clamped = hz.clamp(MIN_CALIBRATION_HZ, MAX_CALIBRATION_HZ);
        if clamped != hz {
            log::debug!("[TUNING] Calibration {hz} Hz clamped to {clamped} Hz");
        }
        self.a4_reference = clamped;
        self.cache.invalidate();
    }

    pub fn active_strings(&self) -> &ActiveStringSet {
        self.cache.get_or_recompute(self.profile, self.a4_reference)
    }

    pub fn frequency_bounds(&self) -> FrequencyBounds {
        self.active_strings().bounds()
    }

    pub fn string(&self, index: usize) -> Option<&ActiveString> {
        self.active_strings().strings().get(index)
    }

    /// The active string closest to `freq` by absolute cent distance. Ties go
    /// to the first (lowest) string in profile order.
    ///
    /// `freq` must be positive.
    pub fn nearest_string(&self, freq: f32) -> &ActiveString {
        let strings = self.active_strings().strings();
        let mut best = &strings[0];
        let mut best_distance = cents_between(freq, best.frequency).abs();
        for candidate in &strings[1..] {
            let distance = cents_between(freq, candidate.frequency).abs();
            if distance < best_distance {
                best = candidate;
                best_distance = distance;
            }
        }
        best
    }
}

/// Deviation of `freq` from `target` in cents (positive = sharp).
///
/// `freq` must be positive; callers filter out "no pitch" results first.
pub fn cents_offset(freq: f32, target: &ActiveString) -> f32 {
    cents_between(freq, target.frequency)
}

/// Calculates the deviation from a target frequency in cents.
///
/// Cents are a logarithmic unit of pitch measurement where:
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values indicate sharpness, negative values indicate flatness
pub fn cents_between(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}
