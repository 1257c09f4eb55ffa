//! Derivation engine for acoustic output metrics.
//!
//! The cascade runs in a fixed order, each step consuming only normalized
//! inputs and earlier results:
//!
//! 1. **Duty factor** = pulse duration (s) × PRF (Hz)
//! 2. **Pr.3** = PNP derated at 0.3 dB/cm/MHz over the depth
//! 3. **MI** = Pr.3 / √f
//! 4. **In situ PNP** = Pr.3 after the insertion loss
//! 5. **MItc** = in situ PNP / √f
//! 6. **ISPPA** from the underated PNP, sinusoid RMS, plane wave
//! 7. **ISPTA** = ISPPA × duty factor
//!
//! Nothing survives between calls, so identical inputs always give
//! bit-identical results.

use crate::format::Readout;
use crate::physics;
use crate::{Advisory, Defaults, DerivedMetrics, InputSet, RawInputs, ValidationFailure};
use serde::Serialize;

/// Compute derived metrics for one input set
pub fn compute(inputs: &InputSet) -> Result<DerivedMetrics, ValidationFailure> {
    inputs.validate()?;

    let f = inputs.frequency_mhz;

    let duty_factor = physics::duty_factor(inputs.pulse_duration.seconds(), inputs.prf.hertz());

    let derated_pressure_mpa =
        physics::derate_pressure(inputs.peak_negative_pressure_mpa, f, inputs.depth_cm);
    let mechanical_index = physics::mechanical_index(derated_pressure_mpa, f);

    let in_situ_pressure_mpa =
        physics::apply_insertion_loss(derated_pressure_mpa, inputs.insertion_loss_db);
    let in_situ_mechanical_index = physics::mechanical_index(in_situ_pressure_mpa, f);

    let spatial_peak_intensity_w_cm2 = physics::plane_wave_intensity_w_cm2(
        inputs.peak_negative_pressure_mpa,
        inputs.impedance.mrayl(),
    );
    let spatial_average_intensity_w_cm2 = spatial_peak_intensity_w_cm2 * duty_factor;

    Ok(DerivedMetrics {
        duty_factor,
        derated_pressure_mpa,
        mechanical_index,
        in_situ_pressure_mpa,
        in_situ_mechanical_index,
        spatial_peak_intensity_w_cm2,
        spatial_average_intensity_w_cm2,
    })
}

/// Non-fatal warnings for a computed result
pub fn advisories(metrics: &DerivedMetrics) -> Vec<Advisory> {
    let mut out = Vec::new();
    if metrics.duty_factor > 1.0 {
        out.push(Advisory::DutyCycleExceeded {
            duty_factor: metrics.duty_factor,
        });
    }
    out
}

/// Outcome of one recompute, ready for display
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Evaluation {
    Ready {
        inputs: InputSet,
        metrics: DerivedMetrics,
        readout: Readout,
        advisories: Vec<Advisory>,
    },
    Invalid {
        failure: ValidationFailure,
        message: String,
        readout: Readout,
    },
}

impl Evaluation {
    pub fn readout(&self) -> &Readout {
        match self {
            Evaluation::Ready { readout, .. } | Evaluation::Invalid { readout, .. } => readout,
        }
    }

    pub fn failure(&self) -> Option<&ValidationFailure> {
        match self {
            Evaluation::Invalid { failure, .. } => Some(failure),
            Evaluation::Ready { .. } => None,
        }
    }

    pub fn advisories(&self) -> &[Advisory] {
        match self {
            Evaluation::Ready { advisories, .. } => advisories,
            Evaluation::Invalid { .. } => &[],
        }
    }
}

/// Recompute everything from the raw field values
///
/// A validation failure resets every output to the unavailable marker;
/// the engine stays ready for the next change either way.
pub fn evaluate(raw: &RawInputs, defaults: &Defaults) -> Evaluation {
    let computed = raw
        .parse(defaults)
        .and_then(|inputs| compute(&inputs).map(|metrics| (inputs, metrics)));

    match computed {
        Ok((inputs, metrics)) => {
            let advisories = advisories(&metrics);
            for advisory in &advisories {
                tracing::warn!("{}", advisory);
            }
            tracing::debug!("Computed metrics: {:?}", metrics);
            Evaluation::Ready {
                readout: Readout::new(&inputs, &metrics),
                inputs,
                metrics,
                advisories,
            }
        }
        Err(failure) => {
            tracing::info!("Input rejected: {}", failure);
            Evaluation::Invalid {
                message: failure.message(),
                failure,
                readout: Readout::unavailable(),
            }
        }
    }
}
