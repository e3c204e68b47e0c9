use super::grid::GridData;
use crate::config::{ParticleBudget, SceneConfig};
use crate::error::{MpmError, Result};
use crate::math::{DIM, T, TV};

/// Number of grid cells next to each wall in which velocity into the wall is removed.
pub const BOUNDARY_CELLS: usize = 3;

/// The run parameters derived from a `SceneConfig`.
#[derive(Debug, Clone)]
pub struct MpmParameters {
    pub grid: GridData,
    /// The grid spacing
    pub dx: T,
    pub inv_dx: T,
    /// The size of the time step. Larger time steps will simulate faster, but may be unstable.
    pub dt: T,
    pub gravity: T,
    /// Rest volume of every particle, `(dx / 2)^dim`.
    pub particle_volume: T,
    pub boundary_cells: usize,
    pub substeps_per_frame: usize,
    /// `quality^dim`, applied to every particle budget.
    pub particle_scale: usize,
    pub budget: ParticleBudget,
    pub seed: u64,
}

impl MpmParameters {
    pub fn from_config(config: &SceneConfig) -> Result<Self> {
        if config.dim != DIM {
            return Err(MpmError::DimensionMismatch {
                what: "solver",
                expected: config.dim,
                found: DIM,
            });
        }
        if !(config.dt > 0.) {
            return Err(MpmError::InvalidParameter(format!(
                "dt must be positive, got {}",
                config.dt
            )));
        }
        if config.quality == 0 {
            return Err(MpmError::InvalidParameter(
                "quality must be at least 1".to_string(),
            ));
        }
        if config.substeps_per_frame == 0 {
            return Err(MpmError::InvalidParameter(
                "a frame needs at least one substep".to_string(),
            ));
        }

        let n_grid_per_length = config.base_n_grid_per_length * config.quality as usize;
        let grid = GridData::new(n_grid_per_length, TV::from(config.box_size))?;
        let dx = grid.dx;

        Ok(MpmParameters {
            dx,
            inv_dx: grid.inv_dx,
            grid,
            dt: config.dt,
            gravity: config.gravity,
            particle_volume: (0.5 * dx).powi(DIM as i32),
            boundary_cells: BOUNDARY_CELLS,
            substeps_per_frame: config.substeps_per_frame,
            particle_scale: (config.quality as usize).pow(DIM as u32),
            budget: config.budget,
            seed: config.seed,
        })
    }

    /// The capacity of the particle pool: the fixed budget, or the density policy's maximum.
    pub fn capacity(&self) -> usize {
        match self.budget {
            ParticleBudget::Fixed { base_num_particles } => base_num_particles * self.particle_scale,
            ParticleBudget::Density {
                base_max_num_particles,
                ..
            } => base_max_num_particles * self.particle_scale,
        }
    }
}
