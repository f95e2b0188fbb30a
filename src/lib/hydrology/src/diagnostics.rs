//! Named diagnostics derivable from hydrology state (spec §6). Each one
//! implements `compute()`, returning a newly allocated field populated
//! from the snapshot handed to it — nothing here mutates model state.

use crate::config::HydrologyConfig;
use crate::grid::{Edge, FieldAttrs, GridLayout, PismIntent, Scalar2D, Staggered2D};
use crate::model::{HydrologyInputs, HydrologyLifecycle};

/// The diagnostic names spec §6 lists. `Bwp` is kept singular per the
/// Open Question in spec §9 (the source's duplicate `PISMHydrology_bwp`
/// class is a historical artifact; one diagnostic suffices).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticName {
    Bwat,
    Bwp,
    Bwprel,
    Effbwp,
    Enwat,
    Tillwp,
    Wallmelt,
    Bwatvel,
    Hydroinput,
}

impl DiagnosticName {
    pub fn short_name(&self) -> &'static str {
        match self {
            DiagnosticName::Bwat => "bwat",
            DiagnosticName::Bwp => "bwp",
            DiagnosticName::Bwprel => "bwprel",
            DiagnosticName::Effbwp => "effbwp",
            DiagnosticName::Enwat => "enwat",
            DiagnosticName::Tillwp => "tillwp",
            DiagnosticName::Wallmelt => "wallmelt",
            DiagnosticName::Bwatvel => "bwatvel",
            DiagnosticName::Hydroinput => "hydroinput",
        }
    }
}

/// Output-field attributes for a named diagnostic (spec §6 diagnostics
/// table), used to tag the field a `Diagnostic::compute()` allocates.
pub fn diagnostic_attrs(name: DiagnosticName) -> FieldAttrs {
    use DiagnosticName::*;
    let (short_name, units, long_name) = match name {
        Bwat => ("bwat", "m", "thickness of subglacial water layer"),
        Bwp => ("bwp", "Pa", "subglacial water pressure"),
        Bwprel => ("bwprel", "1", "pressure as fraction of overburden"),
        Effbwp => ("effbwp", "Pa", "effective pressure on till"),
        Enwat => ("enwat", "m", "effective thickness of englacial water"),
        Tillwp => ("tillwp", "Pa", "till water pressure"),
        Wallmelt => ("wallmelt", "m s-1", "wall melt rate from dissipation"),
        Bwatvel => ("bwatvel", "m s-1", "magnitude of subglacial water velocity"),
        Hydroinput => ("hydroinput", "m s-1", "water input rate applied this sub-step"),
    };
    FieldAttrs {
        short_name,
        units,
        valid_min: 0.0,
        long_name,
        pism_intent: PismIntent::Diagnostic,
    }
}

/// A diagnostic field, freshly allocated by `Diagnostic::compute()`. Most
/// diagnostics live on the regular grid; `bwatvel` lives on the staggered
/// grid (spec §6).
pub enum DiagnosticOutput {
    Scalar(Scalar2D),
    Staggered(Staggered2D),
}

/// A registered, computable diagnostic (spec §6 "get_diagnostics"; mirrors
/// `original_source`'s `Diag<Hydrology>` class hierarchy with its virtual
/// `compute()` returning `IceModelVec::Ptr`, `hydrology_diagnostics.hh:42-47`).
/// Unlike a bare `DiagnosticName`, an object implementing this trait can
/// actually be invoked by a driver holding the registry `get_diagnostics`
/// fills.
pub trait Diagnostic {
    fn name(&self) -> DiagnosticName;

    /// Returns a newly allocated field populated from `model`'s current
    /// state — nothing here mutates model state.
    fn compute(&self, model: &dyn HydrologyLifecycle, inputs: &HydrologyInputs) -> DiagnosticOutput;
}

/// The one `Diagnostic` implementation in the crate: dispatches by name
/// back into the owning model, which is where the fields the computation
/// actually needs (overburden, till reservoir, staggered velocity, ...)
/// live. `get_diagnostics` registers one of these per name it supports.
pub struct RegisteredDiagnostic(pub DiagnosticName);

impl Diagnostic for RegisteredDiagnostic {
    fn name(&self) -> DiagnosticName {
        self.0
    }

    fn compute(&self, model: &dyn HydrologyLifecycle, inputs: &HydrologyInputs) -> DiagnosticOutput {
        model.compute_diagnostic(self.0, inputs)
    }
}

/// `bwp = lambda * P_o` (the pointwise water-pressure rule shared by both
/// the till-can and routing variants, spec §4.4/§4.5).
pub fn water_pressure(overburden: f64, pressure_fraction: f64) -> f64 {
    pressure_fraction * overburden
}

/// `bwprel = P / P_o`.
pub fn water_pressure_relative(pressure: f64, overburden: f64) -> f64 {
    if overburden <= 0.0 {
        0.0
    } else {
        pressure / overburden
    }
}

/// `effbwp = P_o - P`, the effective pressure N.
pub fn effective_bwp(pressure: f64, overburden: f64) -> f64 {
    overburden - pressure
}

/// `enwat`: the till-can state's own name for water-layer thickness under
/// the non-transport variant; numerically identical to `bwat` but kept as
/// a distinct diagnostic name because the two variants publish it under
/// different short names in the source.
pub fn englacial_water_equivalent(w: f64) -> f64 {
    w
}

/// Till water pressure, the same pointwise rule as `water_pressure` but
/// evaluated against the till reservoir (`Wtil`, `Wtil_max`) rather than
/// the transportable layer (`PISMRoutingHydrology::till_water_pressure`,
/// SPEC_FULL supplement).
pub fn till_water_pressure(overburden: f64, wtil: f64, wtil_max: f64, till_pw_fraction: f64) -> f64 {
    if wtil_max <= 0.0 {
        return 0.0;
    }
    till_pw_fraction * (wtil / wtil_max) * overburden
}

/// `wallmelt / rho_w = (k / (L rho_w)) W^alpha |grad R|^beta`
/// (`PISMRoutingHydrology::wall_melt`, SPEC_FULL supplement). `latent_heat`
/// is L, the latent heat of fusion.
pub fn wall_melt(
    k: f64,
    w: f64,
    alpha: f64,
    grad_r_mag: f64,
    beta: f64,
    latent_heat: f64,
    fresh_water_density: f64,
) -> f64 {
    if w <= 0.0 {
        return 0.0;
    }
    (k / (latent_heat * fresh_water_density)) * w.powf(alpha) * grad_r_mag.powf(beta)
}

/// Staggered advective speed diagnostic (`bwatvel`): populates a
/// `Staggered2D` with `|V|` at each edge from the model's velocity field.
pub fn velocity_magnitude_staggered(v: &Staggered2D, layout: GridLayout) -> Staggered2D {
    let mut out = Staggered2D::new(layout);
    for (i, j) in v.owned_indices() {
        out.set(i, j, Edge::East, v.get(i, j, Edge::East).abs());
        out.set(i, j, Edge::North, v.get(i, j, Edge::North).abs());
    }
    out
}

/// `hydroinput`: the source rate actually applied this sub-step (spec
/// §4.5 step 8): `bmelt` on icy cells, the configured constant if
/// `use_const_bmelt`, zero elsewhere.
pub fn hydro_input(bmelt: f64, icy: bool, config: &HydrologyConfig) -> f64 {
    if !icy {
        return 0.0;
    }
    if config.use_const_bmelt {
        config.const_bmelt
    } else {
        bmelt
    }
}
