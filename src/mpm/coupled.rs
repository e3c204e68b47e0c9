use super::grid::MpmGrid;
use super::particles::ParticlePool;
use super::{algo, object, snapshot, MpmParameters, Phase, SimObject};
use crate::config::SceneConfig;
use crate::error::Result;
use crate::export::{ObjectSnapshot, Vertex};
use crate::math::T;
use crate::Simulation;
use rand::{rngs::StdRng, SeedableRng};

/// Every object owns a particle pool and a grid buffer. The buffers share node coordinates but
/// are updated independently, so objects pass through each other.
pub struct CoupledSimulation {
    pub pools: Vec<ParticlePool>,
    pub grid: MpmGrid,
    pub objects: Vec<SimObject>,
    pub params: MpmParameters,
    frame: usize,
    time: T,
    phase: Phase,
}

impl CoupledSimulation {
    pub fn new(config: &SceneConfig) -> Result<Self> {
        let params = MpmParameters::from_config(config)?;
        let objects = object::build_objects(&config.objects, config.dim)?;

        let mut sim = CoupledSimulation {
            pools: Vec::new(),
            grid: MpmGrid::new(params.grid.clone(), objects.len()),
            objects,
            params,
            frame: 0,
            time: 0.,
            phase: Phase::Idle,
        };
        sim.assemble()?;
        Ok(sim)
    }

    fn assemble(&mut self) -> Result<()> {
        let counts = object::particle_counts(&self.objects, &self.params)?;

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        self.pools.clear();
        for (i, (o, &count)) in self.objects.iter_mut().zip(&counts).enumerate() {
            o.range = 0..count;
            let mut pool = ParticlePool::new(count);
            o.fill(&mut pool, &self.params, &mut rng);
            object::log_object(i, o);
            self.pools.push(pool);
        }

        tracing::info!(
            "Assembled {} objects into separate pools: {} particles",
            self.objects.len(),
            counts.iter().sum::<usize>()
        );
        Ok(())
    }

    /// Runs the next phase of the current substep for every object and returns it.
    pub fn step_phase(&mut self) -> Phase {
        let phase = self.phase.next();
        let params = &self.params;
        match phase {
            Phase::Idle => {}
            Phase::ClearGrid => self.grid.clear_grid(),
            Phase::Scatter => {
                for (pool, buffer) in self.pools.iter_mut().zip(&self.grid.buffers) {
                    algo::particle_to_grid(pool, buffer, params);
                }
            }
            Phase::GridUpdate => self.grid.update(params.dt, params.gravity, params.boundary_cells),
            Phase::Gather => {
                for (pool, buffer) in self.pools.iter_mut().zip(&self.grid.buffers) {
                    algo::grid_to_particle(pool, buffer, params);
                }
                self.time += params.dt;
            }
        }

        self.phase = if phase == Phase::Gather {
            Phase::Idle
        } else {
            phase
        };
        phase
    }
}

impl Simulation for CoupledSimulation {
    fn substep(&mut self) {
        while self.step_phase() != Phase::Gather {}
    }

    fn substeps_per_frame(&self) -> usize {
        self.params.substeps_per_frame
    }

    fn finish_frame(&mut self) {
        self.frame += 1;
    }

    fn frame(&self) -> usize {
        self.frame
    }

    fn time(&self) -> T {
        self.time
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn reset(&mut self) -> Result<()> {
        self.grid.clear_grid();
        self.frame = 0;
        self.time = 0.;
        self.phase = Phase::Idle;
        self.assemble()
    }

    fn snapshots(&self) -> Vec<ObjectSnapshot> {
        self.objects
            .iter()
            .zip(&self.pools)
            .enumerate()
            .map(|(i, (o, pool))| snapshot(self.frame, i, o, pool, o.range.clone()))
            .collect()
    }

    fn vertices(&self) -> Vec<Vertex> {
        self.pools.iter().flat_map(super::vertices).collect()
    }
}
