//! Input validation and normalization.
//!
//! Required fields reject blank, non-numeric and negative entries (and a
//! non-positive frequency). Optional fields never fail: anything unusable
//! falls back to the configured default.

use crate::{
    Defaults, Field, ImpedanceChoice, ImpedancePick, InputSet, Problem, PulseDuration,
    PulseRepetition, RawInputs, ValidationFailure,
};

/// One field value after trimming
enum Entry {
    Blank,
    Invalid,
    Number(f64),
}

fn read_entry(raw: Option<&str>) -> Entry {
    let trimmed = raw.map(str::trim).unwrap_or("");
    if trimmed.is_empty() {
        return Entry::Blank;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Entry::Number(v),
        _ => Entry::Invalid,
    }
}

fn required(raw: Option<&str>, field: Field) -> Result<f64, ValidationFailure> {
    match read_entry(raw) {
        Entry::Blank => Err(ValidationFailure::new(field, Problem::Missing)),
        Entry::Invalid => Err(ValidationFailure::new(field, Problem::NotANumber)),
        Entry::Number(v) if v < 0.0 => Err(ValidationFailure::new(field, Problem::Negative)),
        Entry::Number(v) => Ok(v),
    }
}

fn optional(raw: Option<&str>, default: f64, field: Field) -> f64 {
    match read_entry(raw) {
        Entry::Number(v) if v >= 0.0 => v,
        Entry::Blank => default,
        _ => {
            tracing::debug!(
                "Ignoring unusable {} {:?}, using default {}",
                field.label(),
                raw,
                default
            );
            default
        }
    }
}

fn check_non_negative(value: f64, field: Field) -> Result<(), ValidationFailure> {
    if !value.is_finite() {
        Err(ValidationFailure::new(field, Problem::NotANumber))
    } else if value < 0.0 {
        Err(ValidationFailure::new(field, Problem::Negative))
    } else {
        Ok(())
    }
}

impl RawInputs {
    /// Validate and normalize the entered values
    ///
    /// Frequency is checked first, so a zero or negative frequency is
    /// reported whatever the other fields hold.
    pub fn parse(&self, defaults: &Defaults) -> Result<InputSet, ValidationFailure> {
        let frequency_mhz = match required(self.frequency_mhz.as_deref(), Field::Frequency) {
            Ok(v) if v > 0.0 => v,
            Ok(_) => return Err(ValidationFailure::new(Field::Frequency, Problem::NotPositive)),
            Err(failure) if failure.problem == Problem::Negative => {
                return Err(ValidationFailure::new(Field::Frequency, Problem::NotPositive))
            }
            Err(failure) => return Err(failure),
        };
        let depth_cm = required(self.depth_cm.as_deref(), Field::Depth)?;
        let peak_negative_pressure_mpa = required(
            self.peak_negative_pressure_mpa.as_deref(),
            Field::PeakNegativePressure,
        )?;
        let pulse_duration = required(self.pulse_duration.as_deref(), Field::PulseDuration)?;
        let prf = required(self.prf.as_deref(), Field::PulseRepetitionFrequency)?;

        let insertion_loss_db = optional(
            self.insertion_loss_db.as_deref(),
            defaults.insertion_loss_db,
            Field::InsertionLoss,
        );
        let skull_thickness_mm = optional(
            self.skull_thickness_mm.as_deref(),
            defaults.skull_thickness_mm,
            Field::SkullThickness,
        );

        Ok(InputSet {
            frequency_mhz,
            depth_cm,
            peak_negative_pressure_mpa,
            pulse_duration: PulseDuration {
                value: pulse_duration,
                unit: self.pulse_duration_unit,
            },
            prf: PulseRepetition {
                value: prf,
                unit: self.prf_unit,
            },
            insertion_loss_db,
            skull_thickness_mm,
            impedance: self.impedance_choice(),
        })
    }

    /// Resolve the impedance picker; a custom entry that is not a positive
    /// number becomes water
    pub fn impedance_choice(&self) -> ImpedanceChoice {
        match self.impedance {
            ImpedancePick::Water => ImpedanceChoice::Water,
            ImpedancePick::Soft => ImpedanceChoice::SoftTissue,
            ImpedancePick::Custom => match read_entry(self.custom_impedance_mrayl.as_deref()) {
                Entry::Number(v) if v > 0.0 => ImpedanceChoice::Custom(v),
                _ => {
                    tracing::debug!(
                        "Custom impedance {:?} unusable, using water",
                        self.custom_impedance_mrayl
                    );
                    ImpedanceChoice::Water
                }
            },
        }
    }
}

impl InputSet {
    /// Check the invariants for a set built directly in code
    pub fn validate(&self) -> Result<(), ValidationFailure> {
        if !self.frequency_mhz.is_finite() {
            return Err(ValidationFailure::new(Field::Frequency, Problem::NotANumber));
        }
        if self.frequency_mhz <= 0.0 {
            return Err(ValidationFailure::new(Field::Frequency, Problem::NotPositive));
        }
        check_non_negative(self.depth_cm, Field::Depth)?;
        check_non_negative(self.peak_negative_pressure_mpa, Field::PeakNegativePressure)?;
        check_non_negative(self.pulse_duration.value, Field::PulseDuration)?;
        check_non_negative(self.prf.value, Field::PulseRepetitionFrequency)?;
        check_non_negative(self.insertion_loss_db, Field::InsertionLoss)?;
        check_non_negative(self.skull_thickness_mm, Field::SkullThickness)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RateUnit, TimeUnit};

    fn raw(fc: &str, z: &str, pnp: &str, pd: &str, prf: &str) -> RawInputs {
        RawInputs {
            frequency_mhz: Some(fc.into()),
            depth_cm: Some(z.into()),
            peak_negative_pressure_mpa: Some(pnp.into()),
            pulse_duration: Some(pd.into()),
            pulse_duration_unit: TimeUnit::Us,
            prf: Some(prf.into()),
            prf_unit: RateUnit::KHz,
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_inputs_normalize() {
        let set = raw(" 1.5 ", "2", "1.0", "2", "1")
            .parse(&Defaults::default())
            .unwrap();
        assert_eq!(set.frequency_mhz, 1.5);
        assert_eq!(set.insertion_loss_db, 6.0);
        assert_eq!(set.skull_thickness_mm, 7.0);
        assert_eq!(set.impedance, ImpedanceChoice::Water);
        assert_eq!(set.prf.hertz(), 1000.0);
    }

    #[test]
    fn test_frequency_zero_or_negative_fails_first() {
        for fc in ["0", "-1", "0.0"] {
            // Other fields are broken too; frequency must win.
            let failure = raw(fc, "-3", "abc", "", "-1")
                .parse(&Defaults::default())
                .unwrap_err();
            assert_eq!(
                failure,
                ValidationFailure::new(Field::Frequency, Problem::NotPositive)
            );
        }
    }

    #[test]
    fn test_negative_required_field_fails() {
        let failure = raw("1", "2", "-0.5", "2", "1")
            .parse(&Defaults::default())
            .unwrap_err();
        assert_eq!(
            failure,
            ValidationFailure::new(Field::PeakNegativePressure, Problem::Negative)
        );
    }

    #[test]
    fn test_missing_and_non_numeric_required_fields() {
        let mut inputs = raw("1", "2", "1", "2", "1");
        inputs.depth_cm = Some("   ".into());
        assert_eq!(
            inputs.parse(&Defaults::default()).unwrap_err().problem,
            Problem::Missing
        );

        inputs.depth_cm = Some("2".into());
        inputs.prf = Some("fast".into());
        let failure = inputs.parse(&Defaults::default()).unwrap_err();
        assert_eq!(failure.field, Field::PulseRepetitionFrequency);
        assert_eq!(failure.problem, Problem::NotANumber);

        inputs.prf = Some("inf".into());
        assert_eq!(
            inputs.parse(&Defaults::default()).unwrap_err().problem,
            Problem::NotANumber
        );

        inputs.prf = None;
        assert_eq!(
            inputs.parse(&Defaults::default()).unwrap_err().problem,
            Problem::Missing
        );
    }

    #[test]
    fn test_optional_fields_fall_back_silently() {
        let mut inputs = raw("1", "2", "1", "2", "1");
        inputs.insertion_loss_db = Some("".into());
        inputs.skull_thickness_mm = Some("thick".into());
        let defaults = Defaults {
            insertion_loss_db: 4.5,
            skull_thickness_mm: 6.0,
        };
        let set = inputs.parse(&defaults).unwrap();
        assert_eq!(set.insertion_loss_db, 4.5);
        assert_eq!(set.skull_thickness_mm, 6.0);

        inputs.insertion_loss_db = Some("10".into());
        inputs.skull_thickness_mm = Some("-2".into());
        let set = inputs.parse(&defaults).unwrap();
        assert_eq!(set.insertion_loss_db, 10.0);
        assert_eq!(set.skull_thickness_mm, 6.0);
    }

    #[test]
    fn test_custom_impedance_resolution() {
        let mut inputs = raw("1", "2", "1", "2", "1");
        inputs.impedance = ImpedancePick::Custom;
        for bad in [None, Some("abc"), Some("0"), Some("-1.2")] {
            inputs.custom_impedance_mrayl = bad.map(String::from);
            assert_eq!(inputs.impedance_choice(), ImpedanceChoice::Water);
        }
        inputs.custom_impedance_mrayl = Some("1.62".into());
        assert_eq!(inputs.impedance_choice(), ImpedanceChoice::Custom(1.62));

        inputs.impedance = ImpedancePick::Soft;
        assert_eq!(inputs.impedance_choice(), ImpedanceChoice::SoftTissue);
    }

    #[test]
    fn test_input_set_validate() {
        let mut set = raw("1", "2", "1", "2", "1")
            .parse(&Defaults::default())
            .unwrap();
        assert!(set.validate().is_ok());

        set.depth_cm = f64::NAN;
        assert_eq!(
            set.validate().unwrap_err(),
            ValidationFailure::new(Field::Depth, Problem::NotANumber)
        );

        set.depth_cm = 1.0;
        set.frequency_mhz = 0.0;
        assert_eq!(set.validate().unwrap_err().problem, Problem::NotPositive);
    }
}
