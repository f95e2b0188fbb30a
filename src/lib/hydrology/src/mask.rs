use serde::{Deserialize, Serialize};

/// Cell classification (spec §3 "Mask").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaskValue {
    IceFreeBedrock,
    GroundedIce,
    FloatingIce,
    IceFreeOcean,
}

/// Stateless predicate view over a single mask value (spec §4.2).
#[derive(Clone, Copy, Debug)]
pub struct MaskQuery {
    /// Whether floating ice additionally counts as "ocean" for boundary
    /// purposes; the source treats this as configurable.
    pub floating_counts_as_ocean: bool,
}

impl Default for MaskQuery {
    fn default() -> Self {
        MaskQuery {
            floating_counts_as_ocean: true,
        }
    }
}

impl MaskQuery {
    pub fn icy(&self, m: MaskValue) -> bool {
        matches!(m, MaskValue::GroundedIce | MaskValue::FloatingIce)
    }

    pub fn ocean(&self, m: MaskValue) -> bool {
        match m {
            MaskValue::IceFreeOcean => true,
            MaskValue::FloatingIce => self.floating_counts_as_ocean,
            _ => false,
        }
    }

    pub fn ice_free_land(&self, m: MaskValue) -> bool {
        matches!(m, MaskValue::IceFreeBedrock)
    }

    pub fn grounded(&self, m: MaskValue) -> bool {
        matches!(m, MaskValue::GroundedIce | MaskValue::IceFreeBedrock)
    }

    pub fn floating(&self, m: MaskValue) -> bool {
        matches!(m, MaskValue::FloatingIce)
    }
}
