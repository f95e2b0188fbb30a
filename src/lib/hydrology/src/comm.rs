//! Thin wrapper over `mpi` (rsmpi) exposing exactly the operations spec §5
//! names: point-to-point halo exchange and two collective reductions
//! (global max, global sum). Nothing else from `mpi` leaks into the rest
//! of the crate.

use ndarray::Array2;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use crate::grid::GridLayout;

/// A 2D process grid plus (optionally) a live MPI communicator. Built once
/// at startup and handed to every component that needs to exchange ghosts
/// or reduce a scalar across ranks.
pub struct Topology {
    comm: Option<SimpleCommunicator>,
    px: usize,
    py: usize,
    nx: usize,
    ny: usize,
    pub periodic_x: bool,
    pub periodic_y: bool,
}

impl Topology {
    /// A topology with exactly one rank, used by unit tests and by
    /// single-process runs. Periodicity is a domain property (spec §3: "The
    /// grid may be periodic in x, y, both, or neither"), independent of
    /// rank count, so callers pass it explicitly rather than it being
    /// implied by the 1x1 process grid. On a periodic axis halo exchange
    /// degenerates to writing each process's own interior edge into its own
    /// ghost ring; on a non-periodic axis the ghost ring is left untouched.
    pub fn single(periodic_x: bool, periodic_y: bool) -> Self {
        Topology {
            comm: None,
            px: 0,
            py: 0,
            nx: 1,
            ny: 1,
            periodic_x,
            periodic_y,
        }
    }

    /// A topology backed by a live MPI world, partitioned into an `nx` by
    /// `ny` process grid (spec §3: "Nx x Ny process grid"). `periodic_x`/
    /// `periodic_y` come from `HydrologyConfig` and control whether
    /// neighbor lookup wraps at the edge of the process grid, same as on a
    /// single-rank topology.
    pub fn from_world(world: SimpleCommunicator, nx: usize, ny: usize, periodic_x: bool, periodic_y: bool) -> Self {
        let rank = world.rank() as usize;
        Topology {
            comm: Some(world),
            px: rank % nx,
            py: rank / nx,
            nx,
            ny,
            periodic_x,
            periodic_y,
        }
    }

    pub fn single_rank(&self) -> bool {
        self.nx == 1 && self.ny == 1
    }

    fn neighbor_px(&self, delta: isize) -> Option<usize> {
        let n = self.nx as isize;
        let p = self.px as isize + delta;
        if self.periodic_x {
            Some(p.rem_euclid(n) as usize)
        } else if p < 0 || p >= n {
            None
        } else {
            Some(p as usize)
        }
    }

    fn neighbor_py(&self, delta: isize) -> Option<usize> {
        let n = self.ny as isize;
        let p = self.py as isize + delta;
        if self.periodic_y {
            Some(p.rem_euclid(n) as usize)
        } else if p < 0 || p >= n {
            None
        } else {
            Some(p as usize)
        }
    }

    fn rank_of(&self, px: usize, py: usize) -> i32 {
        (py * self.nx + px) as i32
    }

    /// Halo exchange for a single scalar layer. On a single-rank topology
    /// this is a local copy (own edge into own ghost); on a multi-rank
    /// topology it is four point-to-point sendrecv pairs (west/east then
    /// south/north), which is an ordered barrier per spec §5 — every
    /// process completes its exchange on this array before any process
    /// reads its ghosts.
    pub fn exchange_scalar_halo(&self, data: &mut Array2<f64>, layout: GridLayout) {
        let h = layout.halo;
        let (xm, ym) = (layout.xm, layout.ym);

        if self.single_rank() {
            if self.periodic_x {
                for g in 1..=h {
                    for j in 0..ym + 2 * h {
                        let west_interior = data[[h, j]];
                        let east_interior = data[[xm + h - 1, j]];
                        data[[h - g, j]] = east_interior;
                        data[[xm + h - 1 + g, j]] = west_interior;
                    }
                }
            }
            if self.periodic_y {
                for g in 1..=h {
                    for i in 0..xm + 2 * h {
                        let south_interior = data[[i, h]];
                        let north_interior = data[[i, ym + h - 1]];
                        data[[i, h - g]] = north_interior;
                        data[[i, ym + h - 1 + g]] = south_interior;
                    }
                }
            }
            return;
        }

        let Some(comm) = &self.comm else { return };
        self.sendrecv_slab(comm, data, h, self.neighbor_px(-1), self.neighbor_px(1), true);
        self.sendrecv_slab(comm, data, h, self.neighbor_py(-1), self.neighbor_py(1), false);
    }

    /// Exchanges a width-`h` boundary slab with the lower and upper
    /// neighbor along one axis. `along_x` selects whether the slab runs
    /// over the first or second array axis.
    fn sendrecv_slab(
        &self,
        comm: &SimpleCommunicator,
        data: &mut Array2<f64>,
        h: usize,
        lower: Option<usize>,
        upper: Option<usize>,
        along_x: bool,
    ) {
        let shape = data.dim();
        let pack_width = if along_x { shape.1 } else { shape.0 };

        let pack = |slab_index: usize, data: &Array2<f64>| -> Vec<f64> {
            (0..pack_width)
                .map(|k| {
                    if along_x {
                        data[[slab_index, k]]
                    } else {
                        data[[k, slab_index]]
                    }
                })
                .collect()
        };
        let mut unpack = |slab_index: usize, data: &mut Array2<f64>, buf: &[f64]| {
            for k in 0..pack_width {
                if along_x {
                    data[[slab_index, k]] = buf[k];
                } else {
                    data[[k, slab_index]] = buf[k];
                }
            }
        };

        // west/south: send our first interior row/col, receive into our
        // lower ghost; east/north: send our last interior row/col, receive
        // into our upper ghost. Both sides of each pair perform the
        // symmetric send so the exchange completes as a single ordered step.
        if let Some(lo_px) = lower {
            let lo_py = if along_x { self.py } else { lo_px };
            let lo_px = if along_x { lo_px } else { self.px };
            let dest = self.rank_of(lo_px, lo_py);
            let send_buf = pack(h, data);
            let mut recv_buf = vec![0.0; pack_width];
            mpi::point_to_point::send_receive_into(
                &send_buf[..],
                &comm.process_at_rank(dest),
                &mut recv_buf[..],
                &comm.process_at_rank(dest),
            );
            unpack(h - 1, data, &recv_buf);
        }
        if let Some(hi_px) = upper {
            let hi_py = if along_x { self.py } else { hi_px };
            let hi_px = if along_x { hi_px } else { self.px };
            let dest = self.rank_of(hi_px, hi_py);
            let last_interior = if along_x { shape.0 - h - 1 } else { shape.1 - h - 1 };
            let send_buf = pack(last_interior, data);
            let mut recv_buf = vec![0.0; pack_width];
            mpi::point_to_point::send_receive_into(
                &send_buf[..],
                &comm.process_at_rank(dest),
                &mut recv_buf[..],
                &comm.process_at_rank(dest),
            );
            unpack(last_interior + 1, data, &recv_buf);
        }
    }

    /// Reduce a scalar to its global maximum across all ranks (used by the
    /// conductivity and velocity collectives, spec §5/§9).
    pub fn global_max(&self, local: f64) -> f64 {
        if let Some(comm) = &self.comm {
            let mut global = local;
            comm.all_reduce_into(&local, &mut global, mpi::collective::SystemOperation::max());
            global
        } else {
            local
        }
    }

    /// Fused four-lane global sum for the mass accountant's four running
    /// totals (ice-free loss, ocean loss, negative-projection gain,
    /// null-strip loss) — spec §4.7/§9.
    pub fn global_sum4(&self, local: [f64; 4]) -> [f64; 4] {
        if let Some(comm) = &self.comm {
            let mut global = [0.0; 4];
            comm.all_reduce_into(&local, &mut global, mpi::collective::SystemOperation::sum());
            global
        } else {
            local
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridLayout;

    fn layout() -> GridLayout {
        GridLayout {
            xs: 0,
            ys: 0,
            xm: 3,
            ym: 3,
            halo: 1,
            dx: 1.0,
            dy: 1.0,
        }
    }

    #[test]
    fn single_rank_periodic_wrap_matches_opposite_edge() {
        let topo = Topology::single(true, true);
        let l = layout();
        let mut data = Array2::<f64>::zeros((l.xm + 2 * l.halo, l.ym + 2 * l.halo));
        for i in 0..l.xm {
            for j in 0..l.ym {
                data[[i + l.halo, j + l.halo]] = (10 * i + j) as f64;
            }
        }
        topo.exchange_scalar_halo(&mut data, l);
        // west ghost of column 0 == east interior column (xm - 1)
        assert_eq!(data[[0, l.halo]], data[[l.xm, l.halo]]);
    }

    #[test]
    fn non_periodic_topology_leaves_ghosts_untouched() {
        let topo = Topology::single(false, false);
        let l = layout();
        let mut data = Array2::<f64>::zeros((l.xm + 2 * l.halo, l.ym + 2 * l.halo));
        for i in 0..l.xm {
            for j in 0..l.ym {
                data[[i + l.halo, j + l.halo]] = (10 * i + j + 1) as f64;
            }
        }
        topo.exchange_scalar_halo(&mut data, l);
        // no periodicity on either axis: the single-rank branch has nothing
        // to mirror, so the ghost ring stays at its initial zero fill.
        assert_eq!(data[[0, l.halo]], 0.0);
        assert_eq!(data[[l.xm + l.halo, l.halo]], 0.0);
    }

    #[test]
    fn mixed_periodicity_wraps_only_the_periodic_axis() {
        let topo = Topology::single(true, false);
        let l = layout();
        let mut data = Array2::<f64>::zeros((l.xm + 2 * l.halo, l.ym + 2 * l.halo));
        for i in 0..l.xm {
            for j in 0..l.ym {
                data[[i + l.halo, j + l.halo]] = (10 * i + j) as f64;
            }
        }
        topo.exchange_scalar_halo(&mut data, l);
        assert_eq!(data[[0, l.halo]], data[[l.xm, l.halo]]);
        assert_eq!(data[[l.halo, 0]], 0.0);
    }

    #[test]
    fn global_reductions_are_identity_on_single_rank() {
        let topo = Topology::single(true, true);
        assert_eq!(topo.global_max(3.5), 3.5);
        assert_eq!(topo.global_sum4([1.0, 2.0, 3.0, 4.0]), [1.0, 2.0, 3.0, 4.0]);
    }
}
