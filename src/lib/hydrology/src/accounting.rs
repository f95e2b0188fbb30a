//! Mass accountant: projects `Wnew` back onto the feasible set (W >= 0,
//! W = 0 off-domain) and tracks the four running ledger totals needed for
//! the conservation check (spec §4.7, §8).

use tracing::{debug, info};

use crate::comm::Topology;
use crate::config::HydrologyConfig;
use crate::grid::{GridLayout, Scalar2D};
use crate::mask::{MaskQuery, MaskValue};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MassLedger {
    pub ice_free_loss: f64,
    pub ocean_loss: f64,
    pub neg_gain: f64,
    pub strip_loss: f64,
}

impl MassLedger {
    fn as_array(&self) -> [f64; 4] {
        [self.ice_free_loss, self.ocean_loss, self.neg_gain, self.strip_loss]
    }

    fn from_array(a: [f64; 4]) -> Self {
        MassLedger {
            ice_free_loss: a[0],
            ocean_loss: a[1],
            neg_gain: a[2],
            strip_loss: a[3],
        }
    }

    fn add(&mut self, other: MassLedger) {
        self.ice_free_loss += other.ice_free_loss;
        self.ocean_loss += other.ocean_loss;
        self.neg_gain += other.neg_gain;
        self.strip_loss += other.strip_loss;
    }
}

/// Owns the cumulative totals across the lifetime of the component
/// (spec §3 "Ownership").
#[derive(Clone, Copy, Debug, Default)]
pub struct MassAccountant {
    pub cumulative: MassLedger,
}

/// True when `(i, j)` lies within `width` of any domain edge (spec §3/§4.7
/// "null strip").
pub fn in_null_strip(i: usize, j: usize, layout: GridLayout, mx: usize, my: usize, width: f64) -> bool {
    if width <= 0.0 {
        return false;
    }
    let dist_x = (i as f64).min((mx.saturating_sub(1 + i)) as f64) * layout.dx;
    let dist_y = (j as f64).min((my.saturating_sub(1 + j)) as f64) * layout.dy;
    dist_x < width || dist_y < width
}

impl MassAccountant {
    /// Projects `w_new` onto the feasible set in place and returns this
    /// sub-step's (globally reduced) ledger deltas. `mx`, `my` are the
    /// global grid extents (needed to evaluate the null strip).
    pub fn apply(
        &mut self,
        w_new: &mut Scalar2D,
        mask: &Scalar2D,
        mx: usize,
        my: usize,
        config: &HydrologyConfig,
        topo: &Topology,
    ) -> MassLedger {
        let layout = w_new.layout();
        let query = MaskQuery::default();
        let dm_dz = layout.cell_area() * config.fresh_water_density;

        let mut local = MassLedger::default();
        for (i, j) in w_new.owned_indices() {
            let mut value = w_new.get(i, j);
            let m = mask_value_at(mask, i, j);

            if value < 0.0 {
                local.neg_gain += -value * dm_dz;
                value = 0.0;
            } else if query.ice_free_land(m) {
                local.ice_free_loss += value * dm_dz;
                value = 0.0;
            } else if query.ocean(m) {
                local.ocean_loss += value * dm_dz;
                value = 0.0;
            }

            if in_null_strip(i, j, layout, mx, my, config.null_strip_width) {
                local.strip_loss += value * dm_dz;
                value = 0.0;
            }

            w_new.set(i, j, value);
        }

        let global = MassLedger::from_array(topo.global_sum4(local.as_array()));
        self.cumulative.add(global);

        debug!(
            ice_free_loss = global.ice_free_loss,
            ocean_loss = global.ocean_loss,
            neg_gain = global.neg_gain,
            strip_loss = global.strip_loss,
            "mass accountant sub-step deltas"
        );
        if config.report_mass_accounting {
            info!(
                cumulative_ice_free_loss = self.cumulative.ice_free_loss,
                cumulative_ocean_loss = self.cumulative.ocean_loss,
                cumulative_neg_gain = self.cumulative.neg_gain,
                cumulative_strip_loss = self.cumulative.strip_loss,
                "mass accounting summary"
            );
        }

        global
    }
}

fn mask_value_at(mask: &Scalar2D, i: usize, j: usize) -> MaskValue {
    match mask.get(i, j).round() as i32 {
        0 => MaskValue::IceFreeBedrock,
        1 => MaskValue::GroundedIce,
        2 => MaskValue::FloatingIce,
        _ => MaskValue::IceFreeOcean,
    }
}
