//! Hierarchical visiting order for irradiance-grid cells.
//!
//! Samples are scheduled coarse-to-fine: the first sample is the corner of
//! the coarsest lattice, and each following sample introduces a cell at the
//! finest level that has not been covered yet. A handful of samples already
//! gives a usable (blurry) grid; exact convergence needs all `rx*ry*rz`.
//!
//! The order is precomputed as a permutation table rather than re-scanned
//! per sample, so lookups are O(1) and the invariants are testable: a cell's
//! visit level is the largest power of two dividing all of its coordinates.

use glam::UVec3;

/// One entry of the visiting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellSample {
    /// 3D cell coordinate inside the grid.
    pub cell: UVec3,
    /// Linear cell index (`x + y * rx + z * rx * ry`).
    pub linear: u32,
    /// Lattice stride of the refinement level this cell was introduced at.
    /// Doubles as the cubemap level bias for progressive LOD blending.
    pub stride: u32,
}

/// Precomputed coarse-to-fine permutation of all cells of one grid probe.
#[derive(Debug, Clone)]
pub struct CellOrder {
    resolution: UVec3,
    table: Vec<CellSample>,
}

impl CellOrder {
    pub fn new(resolution: UVec3) -> Self {
        let res = resolution.max(UVec3::ONE);
        let max_axis = res.x.max(res.y).max(res.z);
        let max_level = 31 - max_axis.leading_zeros();

        let cell_count = (res.x * res.y * res.z) as usize;
        let mut table = Vec::with_capacity(cell_count);

        for level in (0..=max_level).rev() {
            let stride = 1u32 << level;
            for z in (0..res.z).step_by(stride as usize) {
                for y in (0..res.y).step_by(stride as usize) {
                    for x in (0..res.x).step_by(stride as usize) {
                        // Cells on the coarser lattice were already visited.
                        let parent = stride << 1;
                        if level != max_level
                            && x % parent == 0
                            && y % parent == 0
                            && z % parent == 0
                        {
                            continue;
                        }
                        let cell = UVec3::new(x, y, z);
                        table.push(CellSample {
                            cell,
                            linear: x + y * res.x + z * res.x * res.y,
                            stride,
                        });
                    }
                }
            }
        }
        debug_assert_eq!(table.len(), cell_count);

        Self {
            resolution: res,
            table,
        }
    }

    pub fn resolution(&self) -> UVec3 {
        self.resolution
    }

    /// Total cell count of the grid.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the cell visited at position `sample` of the sweep, or `None`
    /// past the end. An out-of-range index during a bake is a scheduling
    /// bug, not a recoverable condition; the caller escalates it as such.
    pub fn get(&self, sample: usize) -> Option<CellSample> {
        self.table.get(sample).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> Vec<CellOrder> {
        [
            UVec3::new(1, 1, 1),
            UVec3::new(2, 2, 2),
            UVec3::new(4, 4, 4),
            UVec3::new(3, 5, 2),
            UVec3::new(8, 1, 6),
            UVec3::new(7, 7, 7),
        ]
        .into_iter()
        .map(CellOrder::new)
        .collect()
    }

    #[test]
    fn sweep_visits_every_cell_exactly_once() {
        for order in orders() {
            let res = order.resolution();
            let count = (res.x * res.y * res.z) as usize;
            assert_eq!(order.len(), count);
            let mut seen = vec![false; count];
            for i in 0..count {
                let sample = order.get(i).unwrap();
                let linear = sample.linear as usize;
                assert!(!seen[linear], "cell {linear} visited twice ({res:?})");
                seen[linear] = true;
            }
            assert!(seen.into_iter().all(|v| v));
            assert!(order.get(count).is_none());
        }
    }

    #[test]
    fn first_sample_is_the_coarsest_corner() {
        for order in orders() {
            let first = order.get(0).unwrap();
            assert_eq!(first.cell, UVec3::ZERO);
            let max_axis = order
                .resolution()
                .max_element();
            let coarsest = 1u32 << (31 - max_axis.leading_zeros());
            assert_eq!(first.stride, coarsest);
        }
    }

    #[test]
    fn stride_matches_largest_power_of_two_divisor() {
        for order in orders() {
            let max_axis = order.resolution().max_element();
            let max_level = 31 - max_axis.leading_zeros();
            for i in 0..order.len() {
                let sample = order.get(i).unwrap();
                let level_of = |coord: u32| {
                    if coord == 0 {
                        max_level
                    } else {
                        coord.trailing_zeros().min(max_level)
                    }
                };
                let expected = level_of(sample.cell.x)
                    .min(level_of(sample.cell.y))
                    .min(level_of(sample.cell.z));
                assert_eq!(
                    sample.stride,
                    1u32 << expected,
                    "cell {:?} in grid {:?}",
                    sample.cell,
                    order.resolution()
                );
            }
        }
    }

    #[test]
    fn strides_are_non_increasing_across_the_sweep() {
        for order in orders() {
            let mut previous = u32::MAX;
            for i in 0..order.len() {
                let stride = order.get(i).unwrap().stride;
                assert!(stride <= previous);
                previous = stride;
            }
        }
    }
}
