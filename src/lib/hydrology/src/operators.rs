//! Staggered-grid stencils shared by every routing-style computation
//! (spec §4.1). Pure functions of field values; no state of their own.

use crate::grid::{Edge, GridLayout, Scalar2D, Staggered2D};

/// `Wstag(i, j, East) = (W(i,j) + W(i+1,j)) / 2`,
/// `Wstag(i, j, North) = (W(i,j) + W(i,j+1)) / 2`.
pub fn average_to_staggered(w: &Scalar2D, out: &mut Staggered2D) {
    for (i, j) in w.owned_indices() {
        let (ii, jj) = (i as isize, j as isize);
        let east = 0.5 * (w.get_ghosted(ii, jj) + w.get_ghosted(ii + 1, jj));
        let north = 0.5 * (w.get_ghosted(ii, jj) + w.get_ghosted(ii, jj + 1));
        out.set(i, j, Edge::East, east);
        out.set(i, j, Edge::North, north);
    }
}

/// Gradient components of `R` at a staggered edge, Mahaffy-like (spec §4.1):
/// at the east edge, `dR/dx` is centered and `dR/dy` uses the surrounding
/// box of four corner-adjacent nodes; at the north edge, x and y swap.
pub fn gradient_at_edge(r: &Scalar2D, i: usize, j: usize, o: Edge, layout: GridLayout) -> (f64, f64) {
    let (ii, jj) = (i as isize, j as isize);
    match o {
        Edge::East => {
            let drdx = (r.get_ghosted(ii + 1, jj) - r.get_ghosted(ii, jj)) / layout.dx;
            let drdy = (r.get_ghosted(ii + 1, jj + 1) + r.get_ghosted(ii, jj + 1)
                - r.get_ghosted(ii + 1, jj - 1)
                - r.get_ghosted(ii, jj - 1))
                / (4.0 * layout.dy);
            (drdx, drdy)
        }
        Edge::North => {
            let drdy = (r.get_ghosted(ii, jj + 1) - r.get_ghosted(ii, jj)) / layout.dy;
            let drdx = (r.get_ghosted(ii + 1, jj + 1) + r.get_ghosted(ii + 1, jj)
                - r.get_ghosted(ii - 1, jj + 1)
                - r.get_ghosted(ii - 1, jj))
                / (4.0 * layout.dx);
            (drdx, drdy)
        }
    }
}

/// Centered-difference gradient of `R` at a cell center, distinct from
/// `gradient_at_edge`'s Mahaffy stencil — used by the cell-centered
/// wall-melt diagnostic (spec §6 "wallmelt"), which has no staggered home.
pub fn gradient_at_cell(r: &Scalar2D, i: usize, j: usize, layout: GridLayout) -> (f64, f64) {
    let (ii, jj) = (i as isize, j as isize);
    let drdx = (r.get_ghosted(ii + 1, jj) - r.get_ghosted(ii - 1, jj)) / (2.0 * layout.dx);
    let drdy = (r.get_ghosted(ii, jj + 1) - r.get_ghosted(ii, jj - 1)) / (2.0 * layout.dy);
    (drdx, drdy)
}

/// `(div Q)(i, j) = (Qstag(i,j,E) - Qstag(i-1,j,E)) / dx + (Qstag(i,j,N) -
/// Qstag(i,j-1,N)) / dy` (spec §4.1).
pub fn divergence(q: &Staggered2D, i: usize, j: usize, layout: GridLayout) -> f64 {
    let (ii, jj) = (i as isize, j as isize);
    let ddx = (q.get_ghosted(ii, jj, Edge::East) - q.get_ghosted(ii - 1, jj, Edge::East)) / layout.dx;
    let ddy = (q.get_ghosted(ii, jj, Edge::North) - q.get_ghosted(ii, jj - 1, Edge::North)) / layout.dy;
    ddx + ddy
}
