//! Closed-form acoustic models.
//!
//! Pressures are in MPa and frequencies in MHz unless a name says otherwise.
//! Attenuation is applied to pressure amplitude, so decibels divide by 20.

/// Tissue attenuation used for derating, dB per cm per MHz
pub const ATTENUATION_DB_PER_CM_MHZ: f64 = 0.3;

/// Acoustic impedance of water, MRayl
pub const WATER_MRAYL: f64 = 1.48;

/// Acoustic impedance of soft tissue, MRayl
pub const SOFT_TISSUE_MRAYL: f64 = 1.54;

pub const DEFAULT_INSERTION_LOSS_DB: f64 = 6.0;
pub const DEFAULT_SKULL_THICKNESS_MM: f64 = 7.0;

const PA_PER_MPA: f64 = 1e6;
const RAYL_PER_MRAYL: f64 = 1e6;
const CM2_PER_M2: f64 = 1e4;

/// Fraction of time the source is emitting
pub fn duty_factor(pulse_duration_s: f64, prf_hz: f64) -> f64 {
    pulse_duration_s * prf_hz
}

/// Scale a pressure amplitude by a loss in dB
pub fn attenuate_pressure(pressure_mpa: f64, loss_db: f64) -> f64 {
    pressure_mpa * 10f64.powf(-loss_db / 20.0)
}

/// Derate a water-measured pressure to `depth_cm` of tissue (the Pr.3 model)
pub fn derate_pressure(pressure_mpa: f64, frequency_mhz: f64, depth_cm: f64) -> f64 {
    let loss_db = ATTENUATION_DB_PER_CM_MHZ * frequency_mhz * depth_cm;
    attenuate_pressure(pressure_mpa, loss_db)
}

/// Apply a barrier's insertion loss (e.g. transcranial) to a pressure
pub fn apply_insertion_loss(pressure_mpa: f64, insertion_loss_db: f64) -> f64 {
    attenuate_pressure(pressure_mpa, insertion_loss_db)
}

pub fn mechanical_index(pressure_mpa: f64, frequency_mhz: f64) -> f64 {
    pressure_mpa / frequency_mhz.sqrt()
}

/// Plane-wave intensity of a sinusoid with the given peak pressure, W/cm²
pub fn plane_wave_intensity_w_cm2(peak_pressure_mpa: f64, impedance_mrayl: f64) -> f64 {
    let p_rms_pa = peak_pressure_mpa * PA_PER_MPA / std::f64::consts::SQRT_2;
    let impedance_rayl = impedance_mrayl * RAYL_PER_MRAYL;
    let intensity_w_m2 = p_rms_pa * p_rms_pa / impedance_rayl;
    intensity_w_m2 / CM2_PER_M2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derating_uses_amplitude_decibels() {
        // 0.3 * 1.5 * 2 = 0.9 dB -> 10^(-0.045)
        let pr3 = derate_pressure(1.0, 1.5, 2.0);
        assert!((pr3 - 10f64.powf(-0.045)).abs() < 1e-12);
        assert!((pr3 - 0.9016).abs() < 1e-4);
    }

    #[test]
    fn test_six_db_halves_pressure() {
        let p = apply_insertion_loss(2.0, 6.0);
        assert!((p - 1.0024).abs() < 1e-3);
    }

    #[test]
    fn test_zero_depth_is_identity() {
        assert_eq!(derate_pressure(1.25, 3.0, 0.0), 1.25);
    }

    #[test]
    fn test_intensity_of_one_mpa_in_water() {
        // (1e6 / sqrt 2)^2 / 1.48e6 / 1e4 = 33.783783...
        let i = plane_wave_intensity_w_cm2(1.0, WATER_MRAYL);
        assert!((i - 33.783_783_783).abs() < 1e-6);
    }

    #[test]
    fn test_mechanical_index() {
        assert!((mechanical_index(2.0, 4.0) - 1.0).abs() < 1e-15);
    }
}
