use serde::{Deserialize, Serialize};

use crate::error::{HydrologyError, Result};

/// Immutable bundle of every recognized hydrology option (spec §6 options
/// table) plus the three physical constants. Built once, at `init`, and
/// never mutated afterward (design note, §9).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct HydrologyConfig {
    /// `hydrology_bwat_max`: upper bound for W in the till-can variant [m].
    pub bwat_max: f64,
    /// `hydrology_bwat_decay_rate`: per-cell decay C in the till-can variant [m/s].
    pub bwat_decay_rate: f64,
    /// `hydrology_bwat_diffusion_distance`: diffusion length scale L [m].
    pub bwat_diffusion_distance: f64,
    /// `hydrology_bwat_diffusion_time`: diffusion time scale T [years].
    pub bwat_diffusion_time: f64,

    /// `hydrology_hydraulic_conductivity` (k).
    pub hydraulic_conductivity: f64,
    /// `hydrology_thickness_power_in_flux` (alpha), exponent on W in K.
    pub alpha: f64,
    /// `hydrology_potential_gradient_power_in_flux` (beta), exponent on |grad R| in K.
    pub beta: f64,
    /// `hydrology_pressure_fraction` (lambda) = P / P_o.
    pub pressure_fraction: f64,
    /// Regularization multiplier on k used when beta < 2 and |grad R|^2 = 0
    /// (source hardcodes 1000.0; SPEC_FULL makes it a parameter).
    pub conductivity_regularization: f64,

    /// `hydrology_tillwat_max`: upper bound for Wtil [m].
    pub tillwat_max: f64,
    /// `hydrology_tillwat_rate`: till-transfer rate constant mu [1/s].
    pub tillwat_transfer_rate: f64,
    /// till-transfer proportionality tau applied to W before the min() cap.
    pub tillwat_transfer_tau: f64,

    /// `hydrology_null_strip_width` [m] (the options table lists km as the
    /// CLI input unit; this field is always in meters once parsed).
    pub null_strip_width: f64,

    /// Whether the domain wraps around in x (spec §3: "The grid may be
    /// periodic in x, y, both, or neither"). Applies regardless of the
    /// process-grid shape — a multi-rank run wraps at the domain edge the
    /// same way a single-rank run does.
    pub periodic_x: bool,
    /// Whether the domain wraps around in y.
    pub periodic_y: bool,

    /// `hydrology_use_const_bmelt`.
    pub use_const_bmelt: bool,
    /// `hydrology_const_bmelt` [m/s].
    pub const_bmelt: f64,

    /// `hydrology_maximum_time_step_years`, converted to seconds at build time.
    pub maximum_time_step: f64,

    /// Emit the per-outer-step mass-accounting summary line (distinct from
    /// the always-on per-substep debug line).
    pub report_mass_accounting: bool,

    /// Till strength model.
    pub till_cohesion: f64,
    pub till_pw_fraction: f64,
    pub default_till_phi_degrees: f64,
    pub till_yield_stress_no_ice: f64,

    pub fresh_water_density: f64,
    pub ice_density: f64,
    pub standard_gravity: f64,
    /// `water_latent_heat_fusion` [J/kg], used by the `wallmelt` diagnostic.
    pub latent_heat: f64,
}

impl Default for HydrologyConfig {
    fn default() -> Self {
        const SECONDS_PER_YEAR: f64 = 365.0 * 24.0 * 3600.0;
        HydrologyConfig {
            bwat_max: 2.0,
            bwat_decay_rate: 1.0e-11,
            bwat_diffusion_distance: 20_000.0,
            bwat_diffusion_time: 1000.0,

            hydraulic_conductivity: 1.0e-2,
            alpha: 1.25,
            beta: 1.5,
            pressure_fraction: 0.95,
            conductivity_regularization: 1000.0,

            tillwat_max: 2.0,
            tillwat_transfer_rate: 1.0e-6,
            tillwat_transfer_tau: 1.0,

            null_strip_width: 0.0,

            periodic_x: false,
            periodic_y: false,

            use_const_bmelt: false,
            const_bmelt: 1.0e-6 / SECONDS_PER_YEAR,

            maximum_time_step: 2.0 * SECONDS_PER_YEAR,

            report_mass_accounting: false,

            till_cohesion: 0.0,
            till_pw_fraction: 0.95,
            default_till_phi_degrees: 30.0,
            till_yield_stress_no_ice: 1_000.0e3,

            fresh_water_density: 1000.0,
            ice_density: 910.0,
            standard_gravity: 9.81,
            latent_heat: 3.34e5,
        }
    }
}

impl HydrologyConfig {
    /// Validates the invariants the source enforces at parameter-read time
    /// (spec §7: `InvalidParameter` for out-of-range configuration constants).
    pub fn validate(&self) -> Result<()> {
        if self.alpha < 1.0 {
            return Err(HydrologyError::invalid_parameter("alpha", self.alpha));
        }
        if !(0.0..=1.0).contains(&self.pressure_fraction) {
            return Err(HydrologyError::invalid_parameter(
                "pressure_fraction",
                self.pressure_fraction,
            ));
        }
        if self.tillwat_max < 0.0 {
            return Err(HydrologyError::invalid_parameter(
                "tillwat_max",
                self.tillwat_max,
            ));
        }
        if self.bwat_max < 0.0 {
            return Err(HydrologyError::invalid_parameter("bwat_max", self.bwat_max));
        }
        if self.null_strip_width < 0.0 {
            return Err(HydrologyError::invalid_parameter(
                "null_strip_width",
                self.null_strip_width,
            ));
        }
        if self.maximum_time_step <= 0.0 {
            return Err(HydrologyError::invalid_parameter(
                "maximum_time_step",
                self.maximum_time_step,
            ));
        }
        Ok(())
    }

    /// Diffusivity K = L^2 / (2T) for the diffuse-only till variant (§4.4),
    /// T converted from years to seconds.
    pub fn till_diffusivity(&self) -> f64 {
        const SECONDS_PER_YEAR: f64 = 365.0 * 24.0 * 3600.0;
        let t_seconds = self.bwat_diffusion_time * SECONDS_PER_YEAR;
        self.bwat_diffusion_distance.powi(2) / (2.0 * t_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(HydrologyConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_sub_unity_alpha() {
        let mut c = HydrologyConfig::default();
        c.alpha = 0.5;
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_pressure_fraction_out_of_range() {
        let mut c = HydrologyConfig::default();
        c.pressure_fraction = 1.2;
        assert!(c.validate().is_err());
    }
}
