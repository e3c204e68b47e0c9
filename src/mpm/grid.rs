mod data;
mod particle_grid_weights;

pub use data::GridData;
pub use particle_grid_weights::{kernel, ParticleGridWeights};

use crate::math::{DIM, IV, T, TV, UV};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};

/// An `f64` that many threads can add into at once. The bits live in an `AtomicU64` and
/// additions retry until no other thread raced them.
#[derive(Debug, Default)]
pub struct AtomicScalar(AtomicU64);

impl AtomicScalar {
    pub fn new(value: T) -> Self {
        AtomicScalar(AtomicU64::new(value.to_bits()))
    }

    pub fn load(&self) -> T {
        T::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn fetch_add(&self, value: T) {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let sum = (T::from_bits(current) + value).to_bits();
            match self
                .0
                .compare_exchange_weak(current, sum, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn get(&mut self) -> T {
        T::from_bits(*self.0.get_mut())
    }

    pub fn set(&mut self, value: T) {
        *self.0.get_mut() = value.to_bits();
    }
}

/// A single grid node. `momentum` holds momentum while particles scatter and is overwritten
/// with velocity by the grid update.
#[derive(Debug, Default)]
pub struct GridNode {
    pub momentum: [AtomicScalar; DIM],
    pub mass: AtomicScalar,
}

impl GridNode {
    fn clear(&mut self) {
        self.mass.set(0.);
        for m in self.momentum.iter_mut() {
            m.set(0.);
        }
    }

    fn velocity(&self) -> TV {
        TV::from_fn(|d, _| self.momentum[d].load())
    }
}

/// One set of accumulators covering every node of the grid.
pub struct GridBuffer {
    nodes: Vec<GridNode>,
}

impl GridBuffer {
    fn new(num_nodes: usize) -> Self {
        GridBuffer {
            nodes: (0..num_nodes).map(|_| GridNode::default()).collect(),
        }
    }

    /// Zeros every node.
    pub fn clear(&mut self) {
        self.nodes.par_iter_mut().for_each(GridNode::clear);
    }

    /// Adds a particle's contribution to node `index`. Safe to call from many threads.
    pub fn scatter(&self, index: usize, mass: T, momentum: &TV) {
        let node = &self.nodes[index];
        node.mass.fetch_add(mass);
        for d in 0..DIM {
            node.momentum[d].fetch_add(momentum[d]);
        }
    }

    pub fn mass(&self, index: usize) -> T {
        self.nodes[index].mass.load()
    }

    /// Momentum before the grid update, velocity after it.
    pub fn momentum_or_velocity(&self, index: usize) -> TV {
        self.nodes[index].velocity()
    }

    pub fn total_mass(&self) -> T {
        self.nodes.iter().map(|n| n.mass.load()).sum()
    }

    /// Only meaningful between the scatter and the grid update.
    pub fn total_momentum(&self) -> TV {
        self.nodes.iter().map(GridNode::velocity).sum()
    }

    /// Normalizes momentum to velocity, applies gravity and enforces the sticky walls.
    /// Nodes without mass are left untouched.
    pub fn update(&mut self, data: &GridData, dt: T, gravity: T, boundary_cells: usize) {
        self.nodes.par_iter_mut().enumerate().for_each(|(i, node)| {
            let mass = node.mass.get();
            if mass <= 0. {
                return;
            }

            let mut velocity = TV::from_fn(|d, _| node.momentum[d].get()) / mass;
            velocity.y += dt * gravity;

            let coord = data.index_to_coord(i);
            enforce_boundary(&mut velocity, coord, data.size, boundary_cells);

            for d in 0..DIM {
                node.momentum[d].set(velocity[d]);
            }
        });
    }
}

/// Zeros every velocity component that points into a wall within `boundary_cells` nodes.
/// Ghost nodes past the walls always count as inside the band.
pub fn enforce_boundary(velocity: &mut TV, coord: IV, size: UV, boundary_cells: usize) {
    let band = boundary_cells as isize;
    for d in 0..DIM {
        if coord[d] < band && velocity[d] < 0. {
            velocity[d] = 0.;
        }
        if coord[d] + band > size[d] as isize && velocity[d] > 0. {
            velocity[d] = 0.;
        }
    }
}

/// Stores the grid data for the Mpm Simulation: one `GridBuffer` per object group sharing
/// the same node coordinates.
pub struct MpmGrid {
    pub data: GridData,
    pub buffers: Vec<GridBuffer>,
}

impl MpmGrid {
    pub fn new(data: GridData, num_buffers: usize) -> Self {
        let buffers = (0..num_buffers)
            .map(|_| GridBuffer::new(data.num_nodes))
            .collect();
        MpmGrid { data, buffers }
    }

    /// Fills each of the buffers in the grid with zeros.
    pub fn clear_grid(&mut self) {
        self.buffers.par_iter_mut().for_each(GridBuffer::clear);
    }

    /// Runs the grid update over every buffer. Buffers do not see each other.
    pub fn update(&mut self, dt: T, gravity: T, boundary_cells: usize) {
        let data = &self.data;
        self.buffers
            .par_iter_mut()
            .for_each(|buffer| buffer.update(data, dt, gravity, boundary_cells));
    }

    pub fn total_mass(&self) -> T {
        self.buffers.iter().map(GridBuffer::total_mass).sum()
    }

    pub fn total_momentum(&self) -> TV {
        self.buffers.iter().map(GridBuffer::total_momentum).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_grid() -> MpmGrid {
        MpmGrid::new(GridData::new(8, TV::new(1., 1., 1.)).unwrap(), 1)
    }

    #[test]
    fn concurrent_scatter_sums_every_contribution() {
        let grid = small_grid();
        let buffer = &grid.buffers[0];

        (0..10_000).into_par_iter().for_each(|i| {
            buffer.scatter(i % 4, 0.5, &TV::new(1., -2., 0.25));
        });

        assert_eq!(buffer.total_mass(), 5000.);
        assert_eq!(buffer.total_momentum(), TV::new(10_000., -20_000., 2500.));
    }

    #[test]
    fn update_normalizes_and_applies_gravity() {
        let mut grid = small_grid();
        let index = grid.data.checked_index(IV::new(4, 4, 4)).unwrap();
        grid.buffers[0].scatter(index, 2., &TV::new(2., 4., -6.));

        grid.update(0.1, -10., 3);

        let v = grid.buffers[0].momentum_or_velocity(index);
        assert!((v - TV::new(1., 1., -3.)).norm() < 1e-12, "{:?}", v);
    }

    #[test]
    fn massless_nodes_are_skipped() {
        let mut grid = small_grid();
        grid.update(0.1, -10., 3);
        assert_eq!(grid.buffers[0].momentum_or_velocity(0), TV::zeros());
    }

    #[test]
    fn walls_only_stop_inward_motion() {
        let size = UV::new(8, 8, 8);

        let mut v = TV::new(-1., -1., -1.);
        enforce_boundary(&mut v, IV::new(2, 3, 7), size, 3);
        assert_eq!(v, TV::new(0., -1., -1.));

        let mut v = TV::new(1., 1., 1.);
        enforce_boundary(&mut v, IV::new(2, 5, 6), size, 3);
        // node 6 is within three nodes of the upper wall at 8, node 5 is not
        assert_eq!(v, TV::new(1., 1., 0.));

        // ghost nodes
        let mut v = TV::new(-1., 1., 1.);
        enforce_boundary(&mut v, IV::new(-1, 4, 10), size, 3);
        assert_eq!(v, TV::new(0., 1., 0.));
    }

    #[test]
    fn atomic_scalar_adds_from_many_threads() {
        let sum = AtomicScalar::new(1.);
        (0..4096).into_par_iter().for_each(|_| sum.fetch_add(0.25));
        assert_eq!(sum.load(), 1025.);
    }

    #[test]
    fn clear_resets_every_buffer() {
        let mut grid = MpmGrid::new(GridData::new(8, TV::new(1., 1., 1.)).unwrap(), 2);
        grid.buffers[0].scatter(3, 1., &TV::new(1., 0., 0.));
        grid.buffers[1].scatter(5, 2., &TV::new(0., 1., 0.));
        assert_eq!(grid.total_mass(), 3.);

        grid.clear_grid();
        assert_eq!(grid.total_mass(), 0.);
        assert_eq!(grid.total_momentum(), TV::zeros());
    }
}
