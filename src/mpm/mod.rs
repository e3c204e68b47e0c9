mod algo;
mod coupled;
pub mod grid;
pub mod models;
mod object;
mod parameters;
pub mod particles;

pub use coupled::CoupledSimulation;
pub use object::SimObject;
pub use parameters::{MpmParameters, BOUNDARY_CELLS};

use crate::config::SceneConfig;
use crate::error::Result;
use crate::export::{ObjectSnapshot, Vertex};
use crate::math::T;
use crate::Simulation;

use grid::MpmGrid;
use particles::ParticlePool;
use rand::{rngs::StdRng, SeedableRng};
use std::ops::Range;

/// Where a simulation loop is within a substep. `Idle` between substeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ClearGrid,
    Scatter,
    GridUpdate,
    Gather,
}

impl Phase {
    /// The phase that runs after this one.
    pub fn next(self) -> Phase {
        match self {
            Phase::Idle => Phase::ClearGrid,
            Phase::ClearGrid => Phase::Scatter,
            Phase::Scatter => Phase::GridUpdate,
            Phase::GridUpdate => Phase::Gather,
            Phase::Gather => Phase::Idle,
        }
    }
}

/// Contains all of the state for the Material Point Method Simulation: every object packed into
/// one particle pool, scattering into one grid.
pub struct MpmSimulation {
    pub particles: ParticlePool,
    pub grid: MpmGrid,
    pub objects: Vec<SimObject>,
    pub params: MpmParameters,
    frame: usize,
    time: T,
    phase: Phase,
}

impl MpmSimulation {
    /// Builds the objects of `config` and assembles the particle pool. Every configuration
    /// error is reported here, before any substep runs.
    pub fn new(config: &SceneConfig) -> Result<Self> {
        let params = MpmParameters::from_config(config)?;
        let objects = object::build_objects(&config.objects, config.dim)?;

        let mut sim = MpmSimulation {
            particles: ParticlePool::new(params.capacity()),
            grid: MpmGrid::new(params.grid.clone(), 1),
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
        let end = object::pack_ranges(&mut self.objects, &counts);

        self.particles.set_all_inactive();
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        for (i, o) in self.objects.iter().enumerate() {
            o.fill(&mut self.particles, &self.params, &mut rng);
            object::log_object(i, o);
        }

        tracing::info!(
            "Assembled {} objects: {} of {} particles active",
            self.objects.len(),
            end,
            self.particles.capacity()
        );
        Ok(())
    }

    /// Runs the next phase of the current substep and returns it.
    pub fn step_phase(&mut self) -> Phase {
        let phase = self.phase.next();
        match phase {
            Phase::Idle => {}
            Phase::ClearGrid => self.grid.clear_grid(),
            Phase::Scatter => {
                algo::particle_to_grid(&mut self.particles, &self.grid.buffers[0], &self.params)
            }
            Phase::GridUpdate => algo::grid_update(&mut self.grid.buffers[0], &self.params),
            Phase::Gather => {
                algo::grid_to_particle(&mut self.particles, &self.grid.buffers[0], &self.params);
                self.time += self.params.dt;
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

impl Simulation for MpmSimulation {
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
            .enumerate()
            .map(|(i, o)| snapshot(self.frame, i, o, &self.particles, o.range.clone()))
            .collect()
    }

    fn vertices(&self) -> Vec<Vertex> {
        vertices(&self.particles)
    }
}

fn snapshot(
    frame: usize,
    index: usize,
    object: &SimObject,
    pool: &ParticlePool,
    range: Range<usize>,
) -> ObjectSnapshot {
    ObjectSnapshot {
        frame,
        object: index,
        color: object.color,
        positions: pool.active_positions(range).map(|x| [x.x, x.y, x.z]).collect(),
    }
}

fn vertices(pool: &ParticlePool) -> Vec<Vertex> {
    pool.active_indices()
        .map(|p| {
            let x = pool.position[p].cast::<f32>();
            Vertex {
                position: [x.x, x.y, x.z],
                color: pool.color[p],
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GeometryConfig, MaterialConfig, ObjectConfig, ParticleBudget};
    use crate::math::TV;

    fn cube_scene() -> SceneConfig {
        SceneConfig {
            quality: 1,
            dt: 1e-4,
            gravity: 0.,
            substeps_per_frame: 1,
            budget: ParticleBudget::Fixed {
                base_num_particles: 4096,
            },
            objects: vec![ObjectConfig::new(
                MaterialConfig::new("water", 1000., 0.2, 1.),
                GeometryConfig::cube([0.35; 3], [0.3; 3]),
            )],
            ..Default::default()
        }
    }

    #[test]
    fn every_preset_assembles() {
        for name in SceneConfig::PRESETS {
            let mut scene = SceneConfig::preset(name).unwrap();
            scene.quality = 1;
            let active = match scene.mode {
                crate::config::SimulationMode::SinglePool => {
                    MpmSimulation::new(&scene).unwrap().particles.active_count()
                }
                crate::config::SimulationMode::Coupled => CoupledSimulation::new(&scene)
                    .unwrap()
                    .pools
                    .iter()
                    .map(ParticlePool::active_count)
                    .sum(),
            };
            assert!(active > 0, "{} has no particles", name);
        }
    }

    #[test]
    fn phases_cycle_through_a_substep() {
        let mut sim = MpmSimulation::new(&cube_scene()).unwrap();
        assert_eq!(sim.phase(), Phase::Idle);

        let order: Vec<_> = (0..4).map(|_| sim.step_phase()).collect();
        assert_eq!(
            order,
            vec![Phase::ClearGrid, Phase::Scatter, Phase::GridUpdate, Phase::Gather]
        );
        assert_eq!(sim.phase(), Phase::Idle);
        assert!((sim.time() - 1e-4).abs() < 1e-15);
    }

    #[test]
    fn resting_cube_single_substep() {
        let mut sim = MpmSimulation::new(&cube_scene()).unwrap();
        let count = sim.particles.active_count();
        assert_eq!(count, 4096);

        sim.step_phase();
        sim.step_phase();
        let expected = count as T * 1. * sim.params.particle_volume;
        assert!((sim.grid.total_mass() - expected).abs() < 1e-10 * expected);

        sim.step_phase();
        sim.step_phase();
        for p in sim.particles.active_indices() {
            assert!(sim.particles.velocity[p].norm() < 1e-12);
        }
    }

    #[test]
    fn mass_is_conserved_over_substeps() {
        let mut scene = cube_scene();
        scene.gravity = -9.8;
        scene.substeps_per_frame = 20;
        let mut sim = MpmSimulation::new(&scene).unwrap();
        let mass = sim.particles.total_mass();

        sim.advance_frame();
        assert_eq!(sim.frame(), 1);
        assert_eq!(sim.particles.total_mass(), mass);
        assert!((sim.grid.total_mass() - mass).abs() < 1e-9 * mass);
    }

    #[test]
    fn falling_water_stays_in_the_box() {
        let scene = SceneConfig {
            quality: 1,
            dt: 2e-4,
            substeps_per_frame: 100,
            budget: ParticleBudget::Fixed {
                base_num_particles: 256,
            },
            objects: vec![ObjectConfig::new(
                MaterialConfig::new("water", 400., 0.2, 1.),
                GeometryConfig::cube([0.4, 0.15, 0.4], [0.2; 3]),
            )],
            ..Default::default()
        };
        let mut sim = MpmSimulation::new(&scene).unwrap();

        for _ in 0..15 {
            sim.advance_frame();
        }

        let tolerance = 1e-3;
        for p in sim.particles.active_indices() {
            let x = sim.particles.position[p];
            assert!(x.iter().all(|c| c.is_finite()), "particle {} is {:?}", p, x);
            assert!(
                x.iter().all(|&c| c > -tolerance && c < 1. + tolerance),
                "particle {} left the box: {:?}",
                p,
                x
            );
        }

        // after 0.3s of free fall from 0.15 the water must have been stopped by the floor
        let lowest = sim
            .particles
            .active_indices()
            .map(|p| sim.particles.position[p].y)
            .fold(T::INFINITY, T::min);
        assert!(lowest < 0.15);
    }

    #[test]
    fn reset_restores_the_initial_state() {
        let mut scene = cube_scene();
        scene.gravity = -9.8;
        scene.substeps_per_frame = 10;
        let mut sim = MpmSimulation::new(&scene).unwrap();
        let initial = sim.particles.position.clone();

        sim.advance_frame();
        assert_ne!(sim.particles.position, initial);

        sim.reset().unwrap();
        assert_eq!(sim.frame(), 0);
        assert_eq!(sim.time(), 0.);
        assert_eq!(sim.particles.position, initial);
        assert!(sim
            .particles
            .velocity
            .iter()
            .all(|v| *v == TV::zeros()));
    }

    #[test]
    fn snapshots_and_vertices_cover_active_particles() {
        let mut scene = cube_scene();
        scene.budget = ParticleBudget::Density {
            particles_per_unit_volume: 10_000.,
            base_max_num_particles: 1000,
        };
        scene.objects.push(ObjectConfig::new(
            MaterialConfig::new("snow", 1000., 0.2, 1.),
            GeometryConfig::sphere([0.5, 0.8, 0.5], 0.1),
        ));
        let sim = MpmSimulation::new(&scene).unwrap();

        let snapshots = sim.snapshots();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].positions.len(), 270);
        assert_eq!(snapshots[1].positions.len(), 42);
        assert_eq!(snapshots[1].color, [1.; 4]);

        let active = sim.particles.active_count();
        assert_eq!(active, 312);
        assert_eq!(sim.vertices().len(), active);
    }
}
