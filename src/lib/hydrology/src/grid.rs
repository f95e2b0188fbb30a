use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::comm::Topology;

/// Attribute bundle carried by every persisted field (spec §3, §6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldAttrs {
    pub short_name: &'static str,
    pub units: &'static str,
    pub valid_min: f64,
    pub long_name: &'static str,
    pub pism_intent: PismIntent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PismIntent {
    ModelState,
    Internal,
    Diagnostic,
}

/// Rectangular local-patch description: owned interior plus a halo ring.
///
/// `xm`, `ym` are the owned extents; the backing array is `(xm + 2*halo) x
/// (ym + 2*halo)`, with local index `0` corresponding to global index
/// `xs - halo`. Uniform spacing `dx`, `dy` (spec §3 "Grid").
#[derive(Clone, Copy, Debug)]
pub struct GridLayout {
    pub xs: usize,
    pub ys: usize,
    pub xm: usize,
    pub ym: usize,
    pub halo: usize,
    pub dx: f64,
    pub dy: f64,
}

impl GridLayout {
    pub fn cell_area(&self) -> f64 {
        self.dx * self.dy
    }

    fn shape(&self) -> (usize, usize) {
        (self.xm + 2 * self.halo, self.ym + 2 * self.halo)
    }

    /// Local array index for an owned cell at interior offset (i, j), i.e.
    /// i, j in 0..xm, 0..ym.
    pub fn local(&self, i: usize, j: usize) -> (usize, usize) {
        (i + self.halo, j + self.halo)
    }
}

/// A mapping from owned-plus-halo cell indices to `f64` (spec §3 "Scalar2D").
///
/// Invariant: halo cells hold a copy of the owning process's neighbor
/// interior value immediately after [`Scalar2D::halo_exchange`] and may be
/// stale otherwise.
#[derive(Clone, Debug)]
pub struct Scalar2D {
    pub attrs: FieldAttrs,
    layout: GridLayout,
    data: Array2<f64>,
}

impl Scalar2D {
    pub fn new(layout: GridLayout, attrs: FieldAttrs, fill: f64) -> Self {
        let shape = layout.shape();
        Scalar2D {
            attrs,
            layout,
            data: Array2::from_elem(shape, fill),
        }
    }

    pub fn layout(&self) -> GridLayout {
        self.layout
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        let (li, lj) = self.layout.local(i, j);
        self.data[[li, lj]]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        let (li, lj) = self.layout.local(i, j);
        self.data[[li, lj]] = value;
    }

    /// Reads including the halo ring; `i`, `j` are offsets from
    /// `-halo..xm+halo` relative to the owned patch.
    #[inline]
    pub fn get_ghosted(&self, i: isize, j: isize) -> f64 {
        let li = (i + self.layout.halo as isize) as usize;
        let lj = (j + self.layout.halo as isize) as usize;
        self.data[[li, lj]]
    }

    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// Overwrites owned cells from `other`, which must share this field's
    /// layout (regrid override, spec §4.3/§6 "-regrid_file"/"-regrid_vars").
    pub fn copy_from(&mut self, other: &Scalar2D) {
        for (i, j) in self.owned_indices() {
            self.set(i, j, other.get(i, j));
        }
    }

    /// Owned-cell index pairs. Deliberately independent of `self`'s
    /// borrow (it only closes over the two `Copy` extents) so callers can
    /// iterate indices while mutating the field itself in the loop body.
    pub fn owned_indices(&self) -> impl Iterator<Item = (usize, usize)> {
        let (xm, ym) = (self.layout.xm, self.layout.ym);
        (0..xm).flat_map(move |i| (0..ym).map(move |j| (i, j)))
    }

    /// Publishes the owning process's interior into neighbor halos and
    /// receives neighbor interiors into this process's halo ring. A
    /// no-op copy-in-place on a single-rank topology (spec §5: "ordered
    /// barrier" semantics that must reduce sensibly at P = 1).
    pub fn halo_exchange(&mut self, topo: &Topology) {
        topo.exchange_scalar_halo(&mut self.data, self.layout);
    }
}

/// Two parallel layers indexed by `(i, j, o)`, `o` in `{East, North}`
/// (spec §3 "Staggered2D").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    East = 0,
    North = 1,
}

#[derive(Clone, Debug)]
pub struct Staggered2D {
    layout: GridLayout,
    east: Array2<f64>,
    north: Array2<f64>,
}

impl Staggered2D {
    pub fn new(layout: GridLayout) -> Self {
        let shape = layout.shape();
        Staggered2D {
            layout,
            east: Array2::zeros(shape),
            north: Array2::zeros(shape),
        }
    }

    pub fn layout(&self) -> GridLayout {
        self.layout
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize, o: Edge) -> f64 {
        let (li, lj) = self.layout.local(i, j);
        match o {
            Edge::East => self.east[[li, lj]],
            Edge::North => self.north[[li, lj]],
        }
    }

    #[inline]
    pub fn get_ghosted(&self, i: isize, j: isize, o: Edge) -> f64 {
        let li = (i + self.layout.halo as isize) as usize;
        let lj = (j + self.layout.halo as isize) as usize;
        match o {
            Edge::East => self.east[[li, lj]],
            Edge::North => self.north[[li, lj]],
        }
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, o: Edge, value: f64) {
        let (li, lj) = self.layout.local(i, j);
        match o {
            Edge::East => self.east[[li, lj]] = value,
            Edge::North => self.north[[li, lj]] = value,
        }
    }

    /// Owned-cell index pairs. Deliberately independent of `self`'s
    /// borrow (it only closes over the two `Copy` extents) so callers can
    /// iterate indices while mutating the field itself in the loop body.
    pub fn owned_indices(&self) -> impl Iterator<Item = (usize, usize)> {
        let (xm, ym) = (self.layout.xm, self.layout.ym);
        (0..xm).flat_map(move |i| (0..ym).map(move |j| (i, j)))
    }

    pub fn halo_exchange(&mut self, topo: &Topology) {
        topo.exchange_scalar_halo(&mut self.east, self.layout);
        topo.exchange_scalar_halo(&mut self.north, self.layout);
    }
}
