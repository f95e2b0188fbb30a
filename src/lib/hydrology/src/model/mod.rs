//! Hydrology lifecycle contract and the closed tagged sum of variants
//! (spec §4.3, §9). A capability trait object would also satisfy the
//! design note; a closed enum is chosen here because the variant set is
//! fixed by this specification (see the Open Question resolution in
//! DESIGN.md for why a third, "distributed", variant is not included).

pub mod null_transport;
pub mod routing;

use crate::comm::Topology;
use crate::error::Result;
use crate::grid::{GridLayout, Scalar2D};
use crate::sink::OutputSink;

/// Borrowed, read-only fields the outer driver publishes each outer step
/// (spec §3 "Ownership": "It borrows H, b, ṁ, M, and cell-area from the
/// outer driver").
pub struct HydrologyInputs<'a> {
    pub thickness: &'a Scalar2D,
    pub bed: &'a Scalar2D,
    pub bmelt: &'a Scalar2D,
    pub mask: &'a Scalar2D,
}

/// Dependency-injected regrid source (`-regrid_file`/`-regrid_vars`, spec
/// §4.3/§6). The concrete NetCDF reader is the out-of-scope external
/// collaborator; this seam only decides whether and what to override, the
/// way `PISMHydrology::regrid` consults the configured variable list
/// before touching a field.
pub trait RegridProvider {
    /// The override for `short_name`, if the backing file was configured
    /// to supply it; `None` leaves the field at its bootstrapped value.
    fn regrid_value(&self, short_name: &str) -> Option<&Scalar2D>;
}

/// Every variant implements this contract (spec §4.3, §6 component-facing
/// API).
pub trait HydrologyLifecycle {
    /// Resolves shared fields, bootstraps state to its configured default,
    /// then applies `regrid`'s override if one is supplied (spec §4.3:
    /// "load or bootstrap W ...; apply optional regrid override").
    fn init(&mut self, inputs: &HydrologyInputs, topo: &Topology, regrid: Option<&dyn RegridProvider>) -> Result<()>;

    /// Advances over `[t_ice, t_ice + dt_ice]`. A call with the same
    /// `(t_ice, dt_ice)` as the previous successful call is a no-op
    /// (spec §4.3, §4.5 "short-circuit", §8 "idempotence").
    fn update(&mut self, t_ice: f64, dt_ice: f64, inputs: &HydrologyInputs, topo: &Topology) -> Result<()>;

    fn subglacial_water_thickness(&self, out: &mut Scalar2D);
    fn subglacial_water_pressure(&self, out: &mut Scalar2D);

    fn define_variables(&self, sink: &mut dyn OutputSink) -> Result<()>;
    fn write_variables(&self, sink: &mut dyn OutputSink) -> Result<()>;

    /// Appends this variant's persisted-state variable short names;
    /// `keyword` selects an output verbosity group and, as in the source,
    /// is accepted but not consulted (spec §6 "add_vars_to_output").
    fn add_vars_to_output(&self, keyword: &str, names: &mut Vec<&'static str>);

    /// Registers the diagnostics this variant can compute (spec §6
    /// "get_diagnostics") as invocable trait objects, not bare name tags.
    fn get_diagnostics(&self, registry: &mut Vec<Box<dyn crate::diagnostics::Diagnostic>>);

    /// Computes one of the diagnostics this variant registered via
    /// `get_diagnostics` (spec §6: "Each diagnostic implements a
    /// `compute()` that returns a newly allocated field populated from
    /// current state"). Panics if `name` is not one this variant
    /// registers — `Diagnostic::compute` only ever calls this with a name
    /// the same model just handed out.
    fn compute_diagnostic(&self, name: crate::diagnostics::DiagnosticName, inputs: &HydrologyInputs) -> crate::diagnostics::DiagnosticOutput;
}

/// Closed tagged sum over the two fully specified hydrology variants.
pub enum HydrologyModel {
    /// Per-cell till-can reservoir; `diffusive` additionally applies the
    /// stability-limited explicit diffusion step (spec §4.4).
    NullTransport(null_transport::NullTransportModel),
    /// Mass-conserving lateral transport (spec §4.5).
    Routing(routing::RoutingModel),
}

impl HydrologyModel {
    pub fn new_null_transport(layout: GridLayout, config: crate::config::HydrologyConfig, diffusive: bool) -> Self {
        HydrologyModel::NullTransport(null_transport::NullTransportModel::new(layout, config, diffusive))
    }

    pub fn new_routing(layout: GridLayout, config: crate::config::HydrologyConfig) -> Self {
        HydrologyModel::Routing(routing::RoutingModel::new(layout, config))
    }
}

impl HydrologyLifecycle for HydrologyModel {
    fn init(&mut self, inputs: &HydrologyInputs, topo: &Topology, regrid: Option<&dyn RegridProvider>) -> Result<()> {
        match self {
            HydrologyModel::NullTransport(m) => m.init(inputs, topo, regrid),
            HydrologyModel::Routing(m) => m.init(inputs, topo, regrid),
        }
    }

    fn update(&mut self, t_ice: f64, dt_ice: f64, inputs: &HydrologyInputs, topo: &Topology) -> Result<()> {
        match self {
            HydrologyModel::NullTransport(m) => m.update(t_ice, dt_ice, inputs, topo),
            HydrologyModel::Routing(m) => m.update(t_ice, dt_ice, inputs, topo),
        }
    }

    fn subglacial_water_thickness(&self, out: &mut Scalar2D) {
        match self {
            HydrologyModel::NullTransport(m) => m.subglacial_water_thickness(out),
            HydrologyModel::Routing(m) => m.subglacial_water_thickness(out),
        }
    }

    fn subglacial_water_pressure(&self, out: &mut Scalar2D) {
        match self {
            HydrologyModel::NullTransport(m) => m.subglacial_water_pressure(out),
            HydrologyModel::Routing(m) => m.subglacial_water_pressure(out),
        }
    }

    fn define_variables(&self, sink: &mut dyn OutputSink) -> Result<()> {
        match self {
            HydrologyModel::NullTransport(m) => m.define_variables(sink),
            HydrologyModel::Routing(m) => m.define_variables(sink),
        }
    }

    fn write_variables(&self, sink: &mut dyn OutputSink) -> Result<()> {
        match self {
            HydrologyModel::NullTransport(m) => m.write_variables(sink),
            HydrologyModel::Routing(m) => m.write_variables(sink),
        }
    }

    fn add_vars_to_output(&self, keyword: &str, names: &mut Vec<&'static str>) {
        match self {
            HydrologyModel::NullTransport(m) => m.add_vars_to_output(keyword, names),
            HydrologyModel::Routing(m) => m.add_vars_to_output(keyword, names),
        }
    }

    fn get_diagnostics(&self, registry: &mut Vec<Box<dyn crate::diagnostics::Diagnostic>>) {
        match self {
            HydrologyModel::NullTransport(m) => m.get_diagnostics(registry),
            HydrologyModel::Routing(m) => m.get_diagnostics(registry),
        }
    }

    fn compute_diagnostic(&self, name: crate::diagnostics::DiagnosticName, inputs: &HydrologyInputs) -> crate::diagnostics::DiagnosticOutput {
        match self {
            HydrologyModel::NullTransport(m) => m.compute_diagnostic(name, inputs),
            HydrologyModel::Routing(m) => m.compute_diagnostic(name, inputs),
        }
    }
}

/// Same-arguments-as-last-time check used by both variants' `update`
/// (spec §4.5 "short-circuit").
pub(crate) fn is_repeat_call(last: Option<(f64, f64)>, t_ice: f64, dt_ice: f64) -> bool {
    match last {
        Some((t, dt)) => (t - t_ice).abs() < 1e-12 && (dt - dt_ice).abs() < 1e-12,
        None => false,
    }
}
