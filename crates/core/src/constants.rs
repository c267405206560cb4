//! Constants used throughout the harm evidence engine.
//!
//! Clinical thresholds live here rather than inline in the rule functions so that the literal
//! values and their comparison direction are reviewable in one place.

/// Local hour at which the daily assessment day begins.
pub const DEFAULT_DAILY_BOUNDARY_HOUR: u32 = 7;

/// How far back lab results are considered current.
pub const DEFAULT_LAB_LOOKBACK_HOURS: i64 = 48;

/// How far back bedside scores (RASS, pain) are considered current.
pub const DEFAULT_VITALS_LOOKBACK_HOURS: i64 = 12;

/// Grace period added to a prophylaxis dosing interval before a dose counts as overdue.
pub const DEFAULT_DOSE_GRACE_MINUTES: i64 = 60;

/// Number of encounters refreshed per timer-sweep batch.
pub const DEFAULT_SWEEP_BATCH_SIZE: usize = 50;

/// Pause between timer-sweep batches.
pub const DEFAULT_SWEEP_PAUSE_MILLIS: u64 = 250;

/// Platelet count (per microlitre) strictly below which bleeding risk is flagged.
pub const PLATELET_LOW_THRESHOLD_PER_UL: f64 = 50_000.0;

/// INR strictly above which bleeding risk is flagged.
pub const INR_HIGH_THRESHOLD: f64 = 1.5;

/// Multiple of the aPTT reference-range upper bound strictly above which bleeding risk is flagged.
pub const APTT_RATIO_THRESHOLD: f64 = 1.5;

/// Head-of-bed angle (degrees) at or above which the bed counts as elevated.
pub const HEAD_OF_BED_MIN_DEGREES: f64 = 30.0;

/// RASS at or below this value is deep sedation.
pub const RASS_DEEP_SEDATION_MAX: i64 = -3;

/// RASS at or above this value is agitation.
pub const RASS_AGITATION_MIN: i64 = 1;

/// RASS at or below this value makes a CAM-ICU screen impossible (patient unresponsive to voice).
pub const RASS_UNABLE_TO_ASSESS_MAX: i64 = -4;

/// Assessment value recorded by nursing flowsheets when a daily check has been done.
pub const ASSESSMENT_COMPLETED_VALUE: &str = "Completed";

/// Packaged medication frequency table.
pub const BUNDLED_FREQUENCIES_YAML: &str = include_str!("../data/frequencies.yaml");
