//! An explicit Material Point Method solver with APIC transfers, supporting water, jelly and
//! snow objects that share one background grid.

extern crate nalgebra as na;

pub mod config;
pub mod error;
pub mod export;
pub mod geometry;
pub mod mpm;
pub mod runner;
pub mod statistics;
pub mod util;

pub use config::SceneConfig;
pub use error::{MpmError, Result};
pub use mpm::{CoupledSimulation, MpmParameters, MpmSimulation, Phase};
pub use runner::{Hooks, SimulationRunner};

use export::{ObjectSnapshot, Vertex};

pub mod math {
    pub const DIM: usize = 3;

    pub type Dim = na::Const<DIM>;

    pub type T = f64;
    pub type TV = na::SVector<T, DIM>;
    pub type IV = na::SVector<isize, DIM>;
    pub type UV = na::SVector<usize, DIM>;

    pub type Mat = na::SMatrix<T, DIM, DIM>;
}

/// Shared interface of the single-pool and the coupled simulation loops.
pub trait Simulation: Send {
    /// Runs one Clear -> Scatter -> GridUpdate -> Gather cycle.
    fn substep(&mut self);

    /// The number of substeps making up one frame.
    fn substeps_per_frame(&self) -> usize;

    /// Bumps the frame counter. Only called by `advance_frame`.
    fn finish_frame(&mut self);

    /// The number of completed frames since the last reset.
    fn frame(&self) -> usize;

    /// Simulated time since the last reset.
    fn time(&self) -> math::T;

    /// The phase the loop is currently in; `Phase::Idle` between substeps.
    fn phase(&self) -> Phase;

    /// Re-assembles every object from its geometry and clears all counters.
    fn reset(&mut self) -> Result<()>;

    /// Positions of the active particles of every object, for the export hook.
    fn snapshots(&self) -> Vec<ObjectSnapshot>;

    /// Positions and colors of the active particles, for the render hook.
    fn vertices(&self) -> Vec<Vertex>;

    fn advance_frame(&mut self) {
        for _ in 0..self.substeps_per_frame() {
            self.substep();
        }
        self.finish_frame();
    }
}
