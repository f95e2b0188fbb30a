//! Adaptive CFL / diffusion-limited sub-stepping controller (spec §4.6).

use tracing::debug;

use crate::config::HydrologyConfig;

const EPSILON: f64 = 1.0e-12;

/// Per-outer-step counters retained for summary reporting (spec §4.6).
#[derive(Clone, Copy, Debug, Default)]
pub struct SubstepStats {
    pub count: u32,
    pub last_cfl: f64,
    pub last_diff: f64,
    pub last_max_v: f64,
    pub last_max_d: f64,
}

/// Outcome of one adaptive-step evaluation (spec §4.5 step 7).
#[derive(Clone, Copy, Debug)]
pub struct AdaptiveStep {
    pub h: f64,
    pub max_v: f64,
    pub max_d: f64,
    pub dt_cfl: f64,
    pub dt_diff: f64,
}

/// Chooses the sub-step length bounded by the outer interval, the
/// configured ceiling, and the CFL/diffusion stability limits.
///
/// `max_v_x`, `max_v_y` are global maxima of `|V|` along x and y; `max_d`
/// is the global maximum diffusivity `D = rho_w g K W`. Denominators are
/// regularized with a small epsilon so a motionless/undiffusive field
/// yields an effectively unconstrained (but never zero, never negative)
/// step (spec §4.6 policy).
pub fn adaptive_time_step(
    t_cur: f64,
    t_end: f64,
    max_v_x: f64,
    max_v_y: f64,
    max_d: f64,
    dx: f64,
    dy: f64,
    config: &HydrologyConfig,
) -> AdaptiveStep {
    let dt_cfl = 0.5 / (max_v_x / dx + max_v_y / dy + EPSILON);
    let dt_diff = 0.25 / (max_d * (1.0 / (dx * dx) + 1.0 / (dy * dy)) + EPSILON);
    let remaining = (t_end - t_cur).max(0.0);
    let h = remaining.min(config.maximum_time_step).min(dt_cfl).min(dt_diff);

    debug!(dt_cfl, dt_diff, remaining, h, "adaptive sub-step chosen");

    AdaptiveStep {
        h,
        max_v: max_v_x.max(max_v_y),
        max_d,
        dt_cfl,
        dt_diff,
    }
}

impl SubstepStats {
    pub fn record(&mut self, step: AdaptiveStep) {
        self.count += 1;
        self.last_cfl = step.dt_cfl;
        self.last_diff = step.dt_diff;
        self.last_max_v = step.max_v;
        self.last_max_d = step.max_d;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn step_never_exceeds_remaining_outer_interval() {
        let cfg = HydrologyConfig::default();
        let step = adaptive_time_step(9.9, 10.0, 1e-9, 1e-9, 1e-9, 1000.0, 1000.0, &cfg);
        assert!(step.h <= 0.1 + 1e-9);
    }

    #[test]
    fn step_is_never_negative_or_zero_for_positive_remaining() {
        let cfg = HydrologyConfig::default();
        let step = adaptive_time_step(0.0, 1.0, 0.0, 0.0, 0.0, 1000.0, 1000.0, &cfg);
        assert!(step.h > 0.0);
    }

    #[test]
    fn cfl_bound_matches_hand_calculation() {
        // db/dx = 1e-3 style scenario 3: hydraulic speed 100 m/year converted
        // to m/s, dx such that CFL = 0.5 * dx / speed.
        let cfg = HydrologyConfig::default();
        let speed_m_per_s = 100.0 / (365.0 * 24.0 * 3600.0);
        let dx = 1000.0;
        let step = adaptive_time_step(0.0, 1.0e9, speed_m_per_s, 0.0, 0.0, dx, dx, &cfg);
        let expected = 0.5 * dx / speed_m_per_s;
        assert_relative_eq!(step.dt_cfl, expected, max_relative = 0.01);
    }
}
