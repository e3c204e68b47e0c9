use crate::error::{MpmError, Result};
use crate::math::{IV, T, TV, UV};

/// Ghost nodes stored below coordinate 0 on every axis. A particle at the lower wall reaches
/// one node past it.
pub const LOWER_GHOST_NODES: usize = 1;
/// Ghost nodes stored past `size` on every axis. The box may extend up to a cell past `size`
/// and the stencil reaches two nodes past the particle's cell.
pub const UPPER_GHOST_NODES: usize = 3;

/// Stores the metadata associated with the `MpmGrid`
#[derive(Debug, Clone)]
pub struct GridData {
    /// The total number of stored nodes, ghost nodes included
    pub num_nodes: usize,
    /// The number of nodes in each direction inside the domain
    pub size: UV,
    /// The number of stored nodes in each direction
    pub extent: UV,
    /// The grid spacing
    pub dx: T,
    /// Reciprocal of the grid spacing, for efficient computation
    pub inv_dx: T,
}

impl GridData {
    /// Creates a new `GridData` with `n_grid_per_length` nodes per unit length over a domain
    /// starting at the origin. The number of nodes along each axis is truncated, so the upper
    /// bound may be slightly smaller than `box_size`; the ghost layers still cover the
    /// stencil of every particle inside `box_size`.
    pub fn new(n_grid_per_length: usize, box_size: TV) -> Result<GridData> {
        use num::ToPrimitive;

        if n_grid_per_length == 0 {
            return Err(MpmError::InvalidParameter(
                "the grid needs at least one cell per unit length".to_string(),
            ));
        }

        let mut size = UV::zeros();
        for (i, &extent) in box_size.iter().enumerate() {
            size[i] = match (n_grid_per_length as T * extent).floor().to_usize() {
                Some(n) if n > 0 => n,
                _ => {
                    return Err(MpmError::InvalidParameter(format!(
                        "box size {:?} does not give a valid grid",
                        box_size
                    )))
                }
            };
        }

        let extent = size.add_scalar(LOWER_GHOST_NODES + UPPER_GHOST_NODES);
        let num_nodes = extent.iter().product();

        tracing::info!(
            "Using Grid w/ Size: [{}, {}, {}] and {} nodes",
            size.x,
            size.y,
            size.z,
            num_nodes
        );

        Ok(GridData {
            num_nodes,
            size,
            extent,
            dx: 1. / n_grid_per_length as T,
            inv_dx: n_grid_per_length as T,
        })
    }

    fn stored_to_index(&self, i: UV) -> usize {
        i.x + self.extent.x * i.y + self.extent.x * self.extent.y * i.z
    }

    /// The signed node coordinate of a linear index. Ghost nodes have coordinates below 0 or
    /// at least `size`.
    pub fn index_to_coord(&self, mut i: usize) -> IV {
        let z = i / (self.extent.x * self.extent.y);
        i -= z * self.extent.x * self.extent.y;
        let y = i / self.extent.x;
        let x = i % self.extent.x;
        let ghost = LOWER_GHOST_NODES as isize;
        IV::new(x as isize - ghost, y as isize - ghost, z as isize - ghost)
    }

    /// The linear index of a signed coordinate, or `None` if it lies outside the stored nodes.
    pub fn checked_index(&self, coord: IV) -> Option<usize> {
        let mut stored = UV::zeros();
        for i in 0..coord.len() {
            let shifted = coord[i] + LOWER_GHOST_NODES as isize;
            if shifted < 0 || shifted as usize >= self.extent[i] {
                return None;
            }
            stored[i] = shifted as usize;
        }
        Some(self.stored_to_index(stored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpm::grid::ParticleGridWeights;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn index_coord_test(i in 0usize..13824) {
            let grid = GridData::new(20, TV::new(1., 1., 1.)).unwrap();
            let coord = grid.index_to_coord(i);

            prop_assert_eq!(grid.checked_index(coord), Some(i));
        }

        #[test]
        fn stencils_inside_the_box_are_stored(
            x in 0f64..=1., y in 0f64..=0.77, z in 0f64..=0.5
        ) {
            let grid = GridData::new(32, TV::new(1., 0.77, 0.5)).unwrap();
            let weights = ParticleGridWeights::new(&TV::new(x, y, z), grid.inv_dx).unwrap();
            for (node, _, _) in weights.stencil() {
                prop_assert!(grid.checked_index(node).is_some(), "{:?}", node);
            }
        }
    }

    #[test]
    fn grid_size_follows_box() {
        let grid = GridData::new(32, TV::new(2., 1., 0.5)).unwrap();
        assert_eq!(grid.size, UV::new(64, 32, 16));
        assert_eq!(grid.extent, UV::new(68, 36, 20));
        assert_eq!(grid.num_nodes, 68 * 36 * 20);
        assert_eq!(grid.dx, 1. / 32.);

        assert!(GridData::new(32, TV::new(1., 0., 1.)).is_err());
        assert!(GridData::new(0, TV::new(1., 1., 1.)).is_err());
    }

    #[test]
    fn checked_index_covers_the_ghost_layers() {
        let grid = GridData::new(8, TV::new(1., 1., 1.)).unwrap();
        assert_eq!(grid.checked_index(IV::new(-1, -1, -1)), Some(0));
        assert_eq!(grid.checked_index(IV::new(10, 10, 10)), Some(grid.num_nodes - 1));
        assert_eq!(grid.index_to_coord(0), IV::new(-1, -1, -1));
        assert!(grid.checked_index(IV::new(-1, 0, 8)).is_some());

        assert_eq!(grid.checked_index(IV::new(-2, 0, 0)), None);
        assert_eq!(grid.checked_index(IV::new(0, 11, 0)), None);
    }
}
