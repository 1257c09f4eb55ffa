//! Core domain types for the ultrasound output calculator.
//!
//! This module defines the fundamental types used throughout the system:
//! - Raw field values as entered and their unit selectors
//! - The validated input set and derived metrics
//! - Validation failures and advisory warnings

use crate::physics::{
    DEFAULT_INSERTION_LOSS_DB, DEFAULT_SKULL_THICKNESS_MM, SOFT_TISSUE_MRAYL, WATER_MRAYL,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Units
// ============================================================================

/// Unit selector for pulse duration
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    S,
    Ms,
    #[default]
    Us,
}

impl TimeUnit {
    /// Multiplier that converts a value in this unit to seconds
    pub fn to_seconds_factor(self) -> f64 {
        match self {
            TimeUnit::S => 1.0,
            TimeUnit::Ms => 1e-3,
            TimeUnit::Us => 1e-6,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeUnit::S => "s",
            TimeUnit::Ms => "ms",
            TimeUnit::Us => "µs",
        }
    }
}

impl FromStr for TimeUnit {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s" => Ok(TimeUnit::S),
            "ms" => Ok(TimeUnit::Ms),
            "us" | "µs" | "μs" => Ok(TimeUnit::Us),
            other => Err(UnknownUnit(other.to_string())),
        }
    }
}

/// Unit selector for pulse repetition frequency
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RateUnit {
    #[default]
    Hz,
    KHz,
}

impl RateUnit {
    /// Multiplier that converts a value in this unit to hertz
    pub fn to_hz_factor(self) -> f64 {
        match self {
            RateUnit::Hz => 1.0,
            RateUnit::KHz => 1e3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RateUnit::Hz => "Hz",
            RateUnit::KHz => "kHz",
        }
    }
}

impl FromStr for RateUnit {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hz" => Ok(RateUnit::Hz),
            "khz" => Ok(RateUnit::KHz),
            other => Err(UnknownUnit(other.to_string())),
        }
    }
}

/// A unit or selector string that is not in the fixed set
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown unit or selector: {0:?}")]
pub struct UnknownUnit(pub String);

/// Pulse duration with its unit
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct PulseDuration {
    pub value: f64,
    pub unit: TimeUnit,
}

impl PulseDuration {
    pub fn seconds(&self) -> f64 {
        self.value * self.unit.to_seconds_factor()
    }
}

/// Pulse repetition frequency with its unit
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct PulseRepetition {
    pub value: f64,
    pub unit: RateUnit,
}

impl PulseRepetition {
    pub fn hertz(&self) -> f64 {
        self.value * self.unit.to_hz_factor()
    }
}

// ============================================================================
// Impedance
// ============================================================================

/// Which medium impedance the intensity path assumes
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "kind", content = "mrayl", rename_all = "snake_case")]
pub enum ImpedanceChoice {
    #[default]
    Water,
    SoftTissue,
    Custom(f64),
}

impl ImpedanceChoice {
    /// Impedance in MRayl. An unusable custom value resolves to water.
    pub fn mrayl(&self) -> f64 {
        match *self {
            ImpedanceChoice::Water => WATER_MRAYL,
            ImpedanceChoice::SoftTissue => SOFT_TISSUE_MRAYL,
            ImpedanceChoice::Custom(v) if v.is_finite() && v > 0.0 => v,
            ImpedanceChoice::Custom(v) => {
                tracing::debug!("Custom impedance {} unusable, falling back to water", v);
                WATER_MRAYL
            }
        }
    }
}

/// Impedance selector as shown in the picker (without the custom value)
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ImpedancePick {
    #[default]
    Water,
    Soft,
    Custom,
}

impl FromStr for ImpedancePick {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "water" => Ok(ImpedancePick::Water),
            "soft" | "soft_tissue" | "soft-tissue" => Ok(ImpedancePick::Soft),
            "custom" => Ok(ImpedancePick::Custom),
            other => Err(UnknownUnit(other.to_string())),
        }
    }
}

// ============================================================================
// Inputs
// ============================================================================

/// Fallback values for the advisory (optional) inputs
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Defaults {
    #[serde(default = "default_insertion_loss_db")]
    pub insertion_loss_db: f64,

    #[serde(default = "default_skull_thickness_mm")]
    pub skull_thickness_mm: f64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            insertion_loss_db: default_insertion_loss_db(),
            skull_thickness_mm: default_skull_thickness_mm(),
        }
    }
}

fn default_insertion_loss_db() -> f64 {
    DEFAULT_INSERTION_LOSS_DB
}

fn default_skull_thickness_mm() -> f64 {
    DEFAULT_SKULL_THICKNESS_MM
}

/// Field values exactly as the user entered them
///
/// Required fields are `Option<String>` so that "left blank" and
/// "never provided" read the same way.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct RawInputs {
    pub frequency_mhz: Option<String>,
    pub depth_cm: Option<String>,
    pub peak_negative_pressure_mpa: Option<String>,
    pub pulse_duration: Option<String>,
    #[serde(default)]
    pub pulse_duration_unit: TimeUnit,
    pub prf: Option<String>,
    #[serde(default)]
    pub prf_unit: RateUnit,
    pub insertion_loss_db: Option<String>,
    pub skull_thickness_mm: Option<String>,
    #[serde(default)]
    pub impedance: ImpedancePick,
    pub custom_impedance_mrayl: Option<String>,
}

/// A validated, unit-tagged set of transducer parameters
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct InputSet {
    pub frequency_mhz: f64,
    pub depth_cm: f64,
    pub peak_negative_pressure_mpa: f64,
    pub pulse_duration: PulseDuration,
    pub prf: PulseRepetition,
    pub insertion_loss_db: f64,
    pub skull_thickness_mm: f64,
    pub impedance: ImpedanceChoice,
}

// ============================================================================
// Outputs
// ============================================================================

/// Acoustic output metrics derived from one input set
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct DerivedMetrics {
    pub duty_factor: f64,
    pub derated_pressure_mpa: f64,
    pub mechanical_index: f64,
    pub in_situ_pressure_mpa: f64,
    pub in_situ_mechanical_index: f64,
    pub spatial_peak_intensity_w_cm2: f64,
    pub spatial_average_intensity_w_cm2: f64,
}

// ============================================================================
// Failures and warnings
// ============================================================================

/// Input field that a validation failure refers to
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Frequency,
    Depth,
    PeakNegativePressure,
    PulseDuration,
    PulseRepetitionFrequency,
    InsertionLoss,
    SkullThickness,
}

impl Field {
    pub fn label(self) -> &'static str {
        match self {
            Field::Frequency => "frequency (MHz)",
            Field::Depth => "depth (cm)",
            Field::PeakNegativePressure => "peak negative pressure (MPa)",
            Field::PulseDuration => "pulse duration",
            Field::PulseRepetitionFrequency => "pulse repetition frequency",
            Field::InsertionLoss => "insertion loss (dB)",
            Field::SkullThickness => "skull thickness (mm)",
        }
    }
}

/// What is wrong with a field
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Problem {
    Missing,
    NotANumber,
    Negative,
    NotPositive,
}

/// A required input is missing, non-numeric or out of range
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[error("{}", self.message())]
pub struct ValidationFailure {
    pub field: Field,
    pub problem: Problem,
}

impl ValidationFailure {
    pub fn new(field: Field, problem: Problem) -> Self {
        Self { field, problem }
    }

    /// The single user-facing message naming the fix
    pub fn message(&self) -> String {
        let label = self.field.label();
        match self.problem {
            Problem::Missing => format!("Enter a value for {}.", label),
            Problem::NotANumber => format!("Enter a valid number for {}.", label),
            Problem::Negative => format!("Enter a non-negative number for {}.", label),
            Problem::NotPositive => format!("Enter a number greater than 0 for {}.", label),
        }
    }
}

/// Physically implausible but accepted condition
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    DutyCycleExceeded { duty_factor: f64 },
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::DutyCycleExceeded { .. } => {
                write!(f, "Warning: duty cycle > 100% (check PD and PRF).")
            }
        }
    }
}
