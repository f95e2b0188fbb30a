//! Basal-resistance closure consuming effective water pressure
//! (spec §4.8, grounded on `iMbasal.cc::updateYieldStressUsingBasalWater`
//! and `computePhiFromBedElevation`).

use crate::error::{HydrologyError, Result};

/// Piecewise-linear till friction angle as a function of bed elevation
/// (`iMbasal.cc::computePhiFromBedElevation`): constant `phi_min` below
/// `b_min`, a linear ramp to `phi_max` at `b_max`, constant `phi_max`
/// above, overridden to `phi_ocean` wherever the cell is floating.
#[derive(Clone, Copy, Debug)]
pub struct FrictionAngleProfile {
    pub phi_min: f64,
    pub phi_max: f64,
    pub bed_min: f64,
    pub bed_max: f64,
    pub phi_ocean: f64,
}

impl FrictionAngleProfile {
    pub fn phi_degrees(&self, bed: f64, floating: bool) -> f64 {
        if floating {
            return self.phi_ocean;
        }
        if bed <= self.bed_min {
            self.phi_min
        } else if bed >= self.bed_max {
            self.phi_max
        } else {
            let slope = (self.phi_max - self.phi_min) / (self.bed_max - self.bed_min);
            self.phi_min + (bed - self.bed_min) * slope
        }
    }
}

/// `N = P_o - lambda * (W / W_max) * P_o` (spec §4.8).
pub fn effective_pressure(overburden: f64, w: f64, w_max: f64, till_pw_fraction: f64) -> f64 {
    if w_max <= 0.0 {
        return overburden;
    }
    overburden * (1.0 - till_pw_fraction * (w / w_max))
}

/// `tau_c = c0 + N * tan(phi)`, with the two special cases from §4.8:
/// floating ice drives `tau_c` to zero, and grounded ice with zero
/// thickness returns a large sentinel rather than an ill-posed value.
pub fn yield_stress(
    thickness: f64,
    overburden: f64,
    w: f64,
    w_max: f64,
    till_pw_fraction: f64,
    till_cohesion: f64,
    phi_degrees: f64,
    no_ice_sentinel: f64,
    floating: bool,
) -> Result<f64> {
    if w < 0.0 {
        return Err(HydrologyError::invalid_state("W", 0, 0, w));
    }
    if floating {
        return Ok(0.0);
    }
    if thickness == 0.0 {
        return Ok(no_ice_sentinel);
    }
    let n = effective_pressure(overburden, w, w_max, till_pw_fraction);
    Ok(till_cohesion + n * phi_degrees.to_radians().tan())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn floating_cells_have_zero_yield_stress() {
        let tau = yield_stress(500.0, 4.5e6, 0.2, 2.0, 0.95, 0.0, 30.0, 1.0e9, true).unwrap();
        assert_eq!(tau, 0.0);
    }

    #[test]
    fn zero_thickness_returns_sentinel() {
        let tau = yield_stress(0.0, 0.0, 0.0, 2.0, 0.95, 0.0, 30.0, 1.0e9, false).unwrap();
        assert_eq!(tau, 1.0e9);
    }

    #[test]
    fn yield_stress_decreases_monotonically_in_w() {
        let overburden = 910.0 * 9.81 * 1000.0;
        let c0 = 0.0;
        let phi = 30.0_f64;
        let lambda = 1.0;
        let w_max = 2.0;

        let tau_at = |w: f64| {
            yield_stress(1000.0, overburden, w, w_max, lambda, c0, phi, 1.0e9, false).unwrap()
        };

        let tau0 = tau_at(0.0);
        let tau_half = tau_at(1.0);
        let tau_max = tau_at(2.0);
        assert!(tau0 > tau_half);
        assert!(tau_half > tau_max);

        assert_relative_eq!(tau0, c0 + overburden * phi.to_radians().tan(), max_relative = 1e-9);
        assert_relative_eq!(
            tau_max,
            c0 + (1.0 - lambda) * overburden * phi.to_radians().tan(),
            max_relative = 1e-9
        );
    }

    #[test]
    fn friction_angle_profile_is_piecewise_linear() {
        let profile = FrictionAngleProfile {
            phi_min: 5.0,
            phi_max: 35.0,
            bed_min: -700.0,
            bed_max: 700.0,
            phi_ocean: 0.0,
        };
        assert_eq!(profile.phi_degrees(-1000.0, false), 5.0);
        assert_eq!(profile.phi_degrees(1000.0, false), 35.0);
        assert_eq!(profile.phi_degrees(0.0, false), 20.0);
        assert_eq!(profile.phi_degrees(0.0, true), 0.0);
    }
}
