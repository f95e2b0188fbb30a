//! Till-can variant: a per-cell non-transport water reservoir with a hard
//! upper cap, plus a derivative "diffuse-only" variant (spec §4.4;
//! grounded on `PISMHydrology.cc::PISMTillCanHydrology` and
//! `PISMDiffuseOnlyHydrology`).

use tracing::warn;

use crate::accounting::MassAccountant;
use crate::comm::Topology;
use crate::config::HydrologyConfig;
use crate::diagnostics::{
    diagnostic_attrs, effective_bwp, englacial_water_equivalent, water_pressure, water_pressure_relative,
    DiagnosticName, DiagnosticOutput, RegisteredDiagnostic,
};
use crate::error::Result;
use crate::grid::{FieldAttrs, GridLayout, PismIntent, Scalar2D};
use crate::mask::MaskQuery;
use crate::sink::OutputSink;

use super::{is_repeat_call, HydrologyInputs, HydrologyLifecycle, RegridProvider};

pub struct NullTransportModel {
    layout: GridLayout,
    config: HydrologyConfig,
    diffusive: bool,
    w: Scalar2D,
    overburden: Scalar2D,
    accountant: MassAccountant,
    last_update: Option<(f64, f64)>,
}

fn w_attrs() -> FieldAttrs {
    FieldAttrs {
        short_name: "bwat",
        units: "m",
        valid_min: 0.0,
        long_name: "thickness of subglacial water layer",
        pism_intent: PismIntent::ModelState,
    }
}

fn overburden_attrs() -> FieldAttrs {
    FieldAttrs {
        short_name: "overburden_pressure",
        units: "Pa",
        valid_min: 0.0,
        long_name: "ice overburden pressure",
        pism_intent: PismIntent::Internal,
    }
}

impl NullTransportModel {
    pub fn new(layout: GridLayout, config: HydrologyConfig, diffusive: bool) -> Self {
        NullTransportModel {
            layout,
            config,
            diffusive,
            w: Scalar2D::new(layout, w_attrs(), 0.0),
            overburden: Scalar2D::new(layout, overburden_attrs(), 0.0),
            accountant: MassAccountant::default(),
            last_update: None,
        }
    }

    fn apply_decay(&mut self, inputs: &HydrologyInputs, dt_ice: f64) {
        let query = MaskQuery::default();
        for (i, j) in self.w.owned_indices() {
            let m = mask_at(inputs.mask, i, j);
            let input = if query.icy(m) {
                if self.config.use_const_bmelt {
                    self.config.const_bmelt
                } else {
                    inputs.bmelt.get(i, j)
                }
            } else {
                0.0
            };
            let mut value = self.w.get(i, j) + dt_ice * (input - self.config.bwat_decay_rate);
            if value > self.config.bwat_max {
                value = self.config.bwat_max;
            }
            self.w.set(i, j, value);
        }
    }

    /// Explicit-diffusion sub-stepping for the diffuse-only variant
    /// (`IceModel::diffuseHmelt`). Sub-steps internally whenever the
    /// stability limit `dt_diff <= 1 / (2K(1/dx^2+1/dy^2))` would
    /// otherwise be violated by `dt_ice` — intended to be rare, hence the
    /// warning (spec §4.4).
    fn apply_diffusion(&mut self, dt_ice: f64, topo: &Topology) {
        let k = self.config.till_diffusivity();
        let rx_per_s = k * (1.0 / (self.layout.dx * self.layout.dx));
        let ry_per_s = k * (1.0 / (self.layout.dy * self.layout.dy));
        let dt_stable = 1.0 / (2.0 * (rx_per_s + ry_per_s));

        let n_substeps = if dt_ice > dt_stable {
            warn!(dt_ice, dt_stable, "diffuse-only till variant sub-stepping (expected to be rare)");
            (dt_ice / dt_stable).ceil() as u32
        } else {
            1
        };
        let h = dt_ice / n_substeps as f64;
        let rx = k * h / (self.layout.dx * self.layout.dx);
        let ry = k * h / (self.layout.dy * self.layout.dy);
        let one_m4r = 1.0 - 2.0 * rx - 2.0 * ry;

        for _ in 0..n_substeps {
            self.w.halo_exchange(topo);
            let mut next = self.w.clone();
            for (i, j) in self.w.owned_indices() {
                let (ii, jj) = (i as isize, j as isize);
                let center = self.w.get_ghosted(ii, jj);
                let east = self.w.get_ghosted(ii + 1, jj);
                let west = self.w.get_ghosted(ii - 1, jj);
                let north = self.w.get_ghosted(ii, jj + 1);
                let south = self.w.get_ghosted(ii, jj - 1);
                let value = one_m4r * center + rx * (east + west) + ry * (north + south);
                next.set(i, j, value);
            }
            self.w = next;
        }
    }
}

fn mask_at(mask: &Scalar2D, i: usize, j: usize) -> crate::mask::MaskValue {
    use crate::mask::MaskValue::*;
    match mask.get(i, j).round() as i32 {
        0 => IceFreeBedrock,
        1 => GroundedIce,
        2 => FloatingIce,
        _ => IceFreeOcean,
    }
}

impl HydrologyLifecycle for NullTransportModel {
    fn init(&mut self, _inputs: &HydrologyInputs, _topo: &Topology, regrid: Option<&dyn RegridProvider>) -> Result<()> {
        self.config.validate()?;
        if let Some(provider) = regrid {
            if let Some(src) = provider.regrid_value(self.w.attrs.short_name) {
                self.w.copy_from(src);
            }
        }
        Ok(())
    }

    fn update(&mut self, t_ice: f64, dt_ice: f64, inputs: &HydrologyInputs, topo: &Topology) -> Result<()> {
        if is_repeat_call(self.last_update, t_ice, dt_ice) {
            return Ok(());
        }

        for (i, j) in self.overburden.owned_indices() {
            let p_o = self.config.ice_density * self.config.standard_gravity * inputs.thickness.get(i, j);
            self.overburden.set(i, j, p_o);
        }

        self.apply_decay(inputs, dt_ice);
        if self.diffusive {
            self.apply_diffusion(dt_ice, topo);
        }

        // By construction the till-can update never moves water laterally,
        // so ice_free_loss/ocean_loss/strip_loss are always zero here; only
        // neg_gain (a defensive projection) can be nonzero (spec §4.4/§8).
        let mx = self.layout.xm;
        let my = self.layout.ym;
        self.accountant
            .apply(&mut self.w, inputs.mask, mx, my, &self.config, topo);

        self.last_update = Some((t_ice, dt_ice));
        Ok(())
    }

    fn subglacial_water_thickness(&self, out: &mut Scalar2D) {
        for (i, j) in self.w.owned_indices() {
            out.set(i, j, self.w.get(i, j));
        }
    }

    fn subglacial_water_pressure(&self, out: &mut Scalar2D) {
        for (i, j) in self.w.owned_indices() {
            out.set(
                i,
                j,
                water_pressure(self.overburden.get(i, j), self.config.pressure_fraction),
            );
        }
    }

    fn define_variables(&self, sink: &mut dyn OutputSink) -> Result<()> {
        sink.define_variable(&self.w.attrs)
    }

    fn write_variables(&self, sink: &mut dyn OutputSink) -> Result<()> {
        sink.write_variable(&self.w.attrs, &self.w)
    }

    fn add_vars_to_output(&self, _keyword: &str, names: &mut Vec<&'static str>) {
        names.push(self.w.attrs.short_name);
    }

    fn get_diagnostics(&self, registry: &mut Vec<Box<dyn crate::diagnostics::Diagnostic>>) {
        use DiagnosticName::*;
        for name in [Bwat, Bwp, Bwprel, Effbwp, Enwat] {
            registry.push(Box::new(RegisteredDiagnostic(name)));
        }
    }

    fn compute_diagnostic(&self, name: DiagnosticName, _inputs: &HydrologyInputs) -> DiagnosticOutput {
        use DiagnosticName::*;
        let mut out = Scalar2D::new(self.layout, diagnostic_attrs(name), 0.0);
        for (i, j) in out.owned_indices() {
            let po = self.overburden.get(i, j);
            let p = water_pressure(po, self.config.pressure_fraction);
            let value = match name {
                Bwat => self.w.get(i, j),
                Bwp => p,
                Bwprel => water_pressure_relative(p, po),
                Effbwp => effective_bwp(p, po),
                Enwat => englacial_water_equivalent(self.w.get(i, j)),
                _ => unreachable!("{name:?} is not registered for the till-can variant"),
            };
            out.set(i, j, value);
        }
        DiagnosticOutput::Scalar(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::PismIntent;
    use approx::assert_abs_diff_eq;

    fn layout(n: usize, spacing: f64) -> GridLayout {
        GridLayout {
            xs: 0,
            ys: 0,
            xm: n,
            ym: n,
            halo: 1,
            dx: spacing,
            dy: spacing,
        }
    }

    fn attrs(name: &'static str) -> FieldAttrs {
        FieldAttrs {
            short_name: name,
            units: "m",
            valid_min: 0.0,
            long_name: name,
            pism_intent: PismIntent::Internal,
        }
    }

    /// Scenario 1, spec §8: uniform till-can decay to steady state.
    #[test]
    fn uniform_decay_reaches_steady_state() {
        let l = layout(21, 1000.0);
        let mut config = HydrologyConfig::default();
        config.bwat_max = 2.0;
        config.bwat_decay_rate = 1.0e-11;

        let mut model = NullTransportModel::new(l, config, false);
        let thickness = Scalar2D::new(l, attrs("thk"), 1000.0);
        let bed = Scalar2D::new(l, attrs("topg"), 0.0);
        let bmelt = Scalar2D::new(l, attrs("bmelt"), 1.0e-11);
        let mask = Scalar2D::new(l, attrs("mask"), 1.0); // grounded everywhere

        let inputs = HydrologyInputs {
            thickness: &thickness,
            bed: &bed,
            bmelt: &bmelt,
            mask: &mask,
        };
        let topo = Topology::single(true, true);

        model.init(&inputs, &topo, None).unwrap();
        model.update(0.0, 10_000.0, &inputs, &topo).unwrap();

        let mut out = Scalar2D::new(l, attrs("out"), 0.0);
        model.subglacial_water_thickness(&mut out);
        for (i, j) in out.owned_indices() {
            assert_abs_diff_eq!(out.get(i, j), 1.0, epsilon = 1e-9);
        }
        assert_abs_diff_eq!(model.accountant.cumulative.ice_free_loss, 0.0);
        assert_abs_diff_eq!(model.accountant.cumulative.ocean_loss, 0.0);
    }

    /// Scenario 2, spec §8: ocean drain.
    #[test]
    fn ocean_cells_drain_on_first_update() {
        let l = layout(11, 1000.0);
        let config = HydrologyConfig::default();
        let mut model = NullTransportModel::new(l, config, false);

        let thickness = Scalar2D::new(l, attrs("thk"), 500.0);
        let bed = Scalar2D::new(l, attrs("topg"), 0.0);
        let bmelt = Scalar2D::new(l, attrs("bmelt"), 0.0);
        let mut mask = Scalar2D::new(l, attrs("mask"), 3.0); // ocean by default
        for i in 3..8 {
            for j in 3..8 {
                mask.set(i, j, 1.0); // grounded 5x5 block
            }
        }

        model.w.fill(0.5);

        let inputs = HydrologyInputs {
            thickness: &thickness,
            bed: &bed,
            bmelt: &bmelt,
            mask: &mask,
        };
        let topo = Topology::single(true, true);
        model.init(&inputs, &topo, None).unwrap();
        model.update(0.0, 1.0, &inputs, &topo).unwrap();

        for (i, j) in model.w.owned_indices() {
            if i < 3 || i >= 8 || j < 3 || j >= 8 {
                assert_abs_diff_eq!(model.w.get(i, j), 0.0);
            }
        }
        let expected_loss = 0.5 * (121.0 - 25.0) * l.cell_area() * config_defaults_density();
        assert_abs_diff_eq!(model.accountant.cumulative.ocean_loss, expected_loss, epsilon = 1e-6);
    }

    fn config_defaults_density() -> f64 {
        HydrologyConfig::default().fresh_water_density
    }

    struct FixedRegrid(Scalar2D);

    impl super::RegridProvider for FixedRegrid {
        fn regrid_value(&self, short_name: &str) -> Option<&Scalar2D> {
            (short_name == self.0.attrs.short_name).then_some(&self.0)
        }
    }

    /// Spec §4.3: `init` applies an optional regrid override on top of the
    /// bootstrapped default.
    #[test]
    fn init_applies_regrid_override_when_short_name_matches() {
        let l = layout(5, 1000.0);
        let mut model = NullTransportModel::new(l, HydrologyConfig::default(), false);
        let thickness = Scalar2D::new(l, attrs("thk"), 1000.0);
        let bed = Scalar2D::new(l, attrs("topg"), 0.0);
        let bmelt = Scalar2D::new(l, attrs("bmelt"), 0.0);
        let mask = Scalar2D::new(l, attrs("mask"), 1.0);
        let inputs = HydrologyInputs {
            thickness: &thickness,
            bed: &bed,
            bmelt: &bmelt,
            mask: &mask,
        };
        let topo = Topology::single(true, true);

        let mut override_field = Scalar2D::new(l, attrs("bwat"), 0.0);
        override_field.fill(1.7);
        let provider = FixedRegrid(override_field);

        model.init(&inputs, &topo, Some(&provider)).unwrap();

        let mut out = Scalar2D::new(l, attrs("out"), 0.0);
        model.subglacial_water_thickness(&mut out);
        for (i, j) in out.owned_indices() {
            assert_abs_diff_eq!(out.get(i, j), 1.7);
        }
    }

    /// Spec §6: registered diagnostics are trait objects a driver can
    /// actually invoke, not just names to display.
    #[test]
    fn registered_diagnostics_compute_against_current_state() {
        let l = layout(5, 1000.0);
        let config = HydrologyConfig::default();
        let mut model = NullTransportModel::new(l, config, false);
        let thickness = Scalar2D::new(l, attrs("thk"), 1000.0);
        let bed = Scalar2D::new(l, attrs("topg"), 0.0);
        let bmelt = Scalar2D::new(l, attrs("bmelt"), 1.0e-11);
        let mask = Scalar2D::new(l, attrs("mask"), 1.0);
        let inputs = HydrologyInputs {
            thickness: &thickness,
            bed: &bed,
            bmelt: &bmelt,
            mask: &mask,
        };
        let topo = Topology::single(true, true);
        model.init(&inputs, &topo, None).unwrap();
        model.update(0.0, 10_000.0, &inputs, &topo).unwrap();

        let mut registry: Vec<Box<dyn crate::diagnostics::Diagnostic>> = Vec::new();
        model.get_diagnostics(&mut registry);
        assert_eq!(registry.len(), 5);

        let mut expected_bwat = Scalar2D::new(l, attrs("bwat"), 0.0);
        model.subglacial_water_thickness(&mut expected_bwat);

        let bwat_diag = registry
            .iter()
            .find(|d| d.name() == crate::diagnostics::DiagnosticName::Bwat)
            .expect("bwat is registered by the till-can variant");
        match bwat_diag.compute(&model, &inputs) {
            crate::diagnostics::DiagnosticOutput::Scalar(field) => {
                for (i, j) in field.owned_indices() {
                    assert_abs_diff_eq!(field.get(i, j), expected_bwat.get(i, j));
                }
            }
            crate::diagnostics::DiagnosticOutput::Staggered(_) => panic!("bwat is a scalar diagnostic"),
        }
    }

    #[test]
    fn repeat_update_call_is_idempotent_noop() {
        let l = layout(5, 1000.0);
        let config = HydrologyConfig::default();
        let mut model = NullTransportModel::new(l, config, false);
        let thickness = Scalar2D::new(l, attrs("thk"), 1000.0);
        let bed = Scalar2D::new(l, attrs("topg"), 0.0);
        let bmelt = Scalar2D::new(l, attrs("bmelt"), 1e-11);
        let mask = Scalar2D::new(l, attrs("mask"), 1.0);
        let inputs = HydrologyInputs {
            thickness: &thickness,
            bed: &bed,
            bmelt: &bmelt,
            mask: &mask,
        };
        let topo = Topology::single(true, true);
        model.init(&inputs, &topo, None).unwrap();
        model.update(0.0, 100.0, &inputs, &topo).unwrap();
        let mut before = Scalar2D::new(l, attrs("before"), 0.0);
        model.subglacial_water_thickness(&mut before);

        model.update(0.0, 100.0, &inputs, &topo).unwrap();
        let mut after = Scalar2D::new(l, attrs("after"), 0.0);
        model.subglacial_water_thickness(&mut after);

        for (i, j) in before.owned_indices() {
            assert_eq!(before.get(i, j), after.get(i, j));
        }
    }
}
