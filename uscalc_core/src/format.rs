//! Display formatting for derived metrics.
//!
//! Every output is a fixed-precision string. Non-finite values render as
//! [`UNAVAILABLE`] and sub-noise magnitudes render as exact zero.

use crate::{DerivedMetrics, InputSet};
use serde::{Deserialize, Serialize};

/// Placeholder shown for any value that cannot be displayed
pub const UNAVAILABLE: &str = "—";

/// Magnitudes below this are floating-point noise and print as zero
const NOISE_FLOOR: f64 = 1e-15;

const PRESSURE_DIGITS: usize = 4;
const INTENSITY_DIGITS: usize = 6;
const SUMMARY_DIGITS: usize = 2;

/// Format `x` with a fixed number of decimals
///
/// Exact halfway values round away from zero (`0.125` → `"0.13"`), the way
/// the page's `toFixed` does. Everything else is correctly rounded.
pub fn format_fixed(x: f64, digits: usize) -> String {
    if !x.is_finite() {
        return UNAVAILABLE.to_string();
    }
    let v = if x.abs() < NOISE_FLOOR { 0.0 } else { x };
    if is_exact_tie(v, digits) {
        round_tie_away(v, digits)
    } else {
        format!("{:.*}", digits, v)
    }
}

/// Whether `v` sits exactly halfway between two `digits`-decimal values
///
/// A binary fraction `m / 2^k` (odd `m`) has exactly `k` decimals, the last
/// one a 5, so the tie case is exactly `k == digits + 1`.
fn is_exact_tie(v: f64, digits: usize) -> bool {
    let Ok(exp) = i32::try_from(digits) else {
        return false;
    };
    let is_integer = |scaled: f64| scaled.is_finite() && scaled.fract() == 0.0;
    is_integer(v * 2f64.powi(exp + 1)) && !is_integer(v * 2f64.powi(exp))
}

fn round_tie_away(v: f64, digits: usize) -> String {
    // Exact, since `v` has precisely `digits + 1` decimals.
    let exact = format!("{:.*}", digits + 1, v);
    let mut kept: Vec<char> = exact.chars().collect();
    kept.pop();
    if digits == 0 {
        kept.pop();
    }

    let negative = kept.first() == Some(&'-');
    let start = usize::from(negative);
    let mut carry = true;
    for c in kept[start..].iter_mut().rev() {
        match *c {
            '.' => continue,
            '9' => *c = '0',
            d => {
                *c = char::from(d as u8 + 1);
                carry = false;
                break;
            }
        }
    }
    if carry {
        kept.insert(start, '1');
    }
    kept.into_iter().collect()
}

/// Duty factor as a percentage followed by the raw fraction
pub fn format_duty_factor(duty_factor: f64) -> String {
    if !duty_factor.is_finite() {
        return UNAVAILABLE.to_string();
    }
    format!(
        "{}%  (f={})",
        format_fixed(duty_factor * 100.0, 3),
        format_fixed(duty_factor, 6)
    )
}

fn with_unit(value: String, unit: &str) -> String {
    if value == UNAVAILABLE {
        value
    } else {
        format!("{} {}", value, unit)
    }
}

/// The strings shown in the read-only output fields
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Readout {
    pub duty_factor: String,
    pub derated_pressure: String,
    pub mechanical_index: String,
    pub in_situ_pressure: String,
    pub in_situ_mechanical_index: String,
    pub spatial_peak_intensity: String,
    pub spatial_average_intensity: String,
    /// Insertion loss and skull thickness on one line
    pub skull_summary: String,
}

impl Readout {
    pub fn new(inputs: &InputSet, metrics: &DerivedMetrics) -> Self {
        Self {
            duty_factor: format_duty_factor(metrics.duty_factor),
            derated_pressure: with_unit(
                format_fixed(metrics.derated_pressure_mpa, PRESSURE_DIGITS),
                "MPa",
            ),
            mechanical_index: format_fixed(metrics.mechanical_index, PRESSURE_DIGITS),
            in_situ_pressure: with_unit(
                format_fixed(metrics.in_situ_pressure_mpa, PRESSURE_DIGITS),
                "MPa",
            ),
            in_situ_mechanical_index: format_fixed(
                metrics.in_situ_mechanical_index,
                PRESSURE_DIGITS,
            ),
            spatial_peak_intensity: with_unit(
                format_fixed(metrics.spatial_peak_intensity_w_cm2, INTENSITY_DIGITS),
                "W/cm²",
            ),
            spatial_average_intensity: with_unit(
                format_fixed(metrics.spatial_average_intensity_w_cm2, INTENSITY_DIGITS),
                "W/cm²",
            ),
            skull_summary: format!(
                "{} dB  •  {} mm",
                format_fixed(inputs.insertion_loss_db, SUMMARY_DIGITS),
                format_fixed(inputs.skull_thickness_mm, SUMMARY_DIGITS)
            ),
        }
    }

    /// Every field reset to the placeholder
    pub fn unavailable() -> Self {
        Self {
            duty_factor: UNAVAILABLE.into(),
            derated_pressure: UNAVAILABLE.into(),
            mechanical_index: UNAVAILABLE.into(),
            in_situ_pressure: UNAVAILABLE.into(),
            in_situ_mechanical_index: UNAVAILABLE.into(),
            spatial_peak_intensity: UNAVAILABLE.into(),
            spatial_average_intensity: UNAVAILABLE.into(),
            skull_summary: UNAVAILABLE.into(),
        }
    }

    /// (label, value) pairs in display order
    pub fn rows(&self) -> [(&'static str, &str); 8] {
        [
            ("Duty cycle", self.duty_factor.as_str()),
            ("Pr.3", self.derated_pressure.as_str()),
            ("MI", self.mechanical_index.as_str()),
            ("Skull IL • thickness", self.skull_summary.as_str()),
            ("In situ PNP", self.in_situ_pressure.as_str()),
            ("MItc", self.in_situ_mechanical_index.as_str()),
            ("ISPPA", self.spatial_peak_intensity.as_str()),
            ("ISPTA", self.spatial_average_intensity.as_str()),
        ]
    }
}
