use crate::math::{T, TV};
use crate::mpm::particles::ParticlePool;
use crate::mpm::{CoupledSimulation, MpmSimulation};
use crate::Simulation;

/// Aggregates over the active particles of a simulation.
pub trait SimulationStatistics {
    fn total_time(&self) -> T;
    fn total_mass(&self) -> T;
    fn total_linear_momentum(&self) -> TV;
    fn total_angular_momentum(&self) -> TV;
    fn total_energy(&self) -> T;
    fn total_volume(&self) -> T;
}

fn angular_momentum(pool: &ParticlePool) -> TV {
    pool.active_indices()
        .map(|p| pool.mass[p] * pool.position[p].cross(&pool.velocity[p]))
        .sum()
}

/// Kinetic energy.
fn energy(pool: &ParticlePool) -> T {
    pool.active_indices()
        .map(|p| 0.5 * pool.mass[p] * pool.velocity[p].norm_squared())
        .sum()
}

fn volume(pool: &ParticlePool) -> T {
    pool.active_indices()
        .map(|p| pool.deformation_gradient[p].determinant() * pool.volume[p])
        .sum()
}

impl SimulationStatistics for MpmSimulation {
    fn total_time(&self) -> T {
        self.time()
    }

    fn total_mass(&self) -> T {
        self.particles.total_mass()
    }

    fn total_linear_momentum(&self) -> TV {
        self.particles.total_momentum()
    }

    fn total_angular_momentum(&self) -> TV {
        angular_momentum(&self.particles)
    }

    fn total_energy(&self) -> T {
        energy(&self.particles)
    }

    fn total_volume(&self) -> T {
        volume(&self.particles)
    }
}

impl SimulationStatistics for CoupledSimulation {
    fn total_time(&self) -> T {
        self.time()
    }

    fn total_mass(&self) -> T {
        self.pools.iter().map(ParticlePool::total_mass).sum()
    }

    fn total_linear_momentum(&self) -> TV {
        self.pools.iter().map(ParticlePool::total_momentum).sum()
    }

    fn total_angular_momentum(&self) -> TV {
        self.pools.iter().map(angular_momentum).sum()
    }

    fn total_energy(&self) -> T {
        self.pools.iter().map(energy).sum()
    }

    fn total_volume(&self) -> T {
        self.pools.iter().map(volume).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GeometryConfig, MaterialConfig, ObjectConfig, ParticleBudget, SceneConfig};

    fn scene() -> SceneConfig {
        SceneConfig {
            quality: 1,
            gravity: 0.,
            budget: ParticleBudget::Fixed {
                base_num_particles: 200,
            },
            objects: vec![ObjectConfig::new(
                MaterialConfig::new("jelly", 1000., 0.2, 3.),
                GeometryConfig::cube([0.4; 3], [0.2; 3]),
            )
            .with_velocity([0., 0., 2.])],
            ..Default::default()
        }
    }

    #[test]
    fn initial_statistics() {
        let sim = MpmSimulation::new(&scene()).unwrap();
        let pvol = sim.params.particle_volume;
        let mass = 200. * 3. * pvol;

        assert_eq!(sim.total_time(), 0.);
        assert!((sim.total_mass() - mass).abs() < 1e-12 * mass);
        assert!((sim.total_linear_momentum() - TV::new(0., 0., 2. * mass)).norm() < 1e-12);
        assert!((sim.total_energy() - 0.5 * mass * 4.).abs() < 1e-12 * mass);
        assert!((sim.total_volume() - 200. * pvol).abs() < 1e-12 * pvol);

        // r x v for motion along z has no z component
        assert!(sim.total_angular_momentum().z.abs() < 1e-15);
    }

    #[test]
    fn both_loops_agree_for_one_object() {
        let single = MpmSimulation::new(&scene()).unwrap();
        let coupled = CoupledSimulation::new(&scene()).unwrap();

        assert_eq!(single.total_mass(), coupled.total_mass());
        assert_eq!(single.total_linear_momentum(), coupled.total_linear_momentum());
        assert_eq!(single.total_angular_momentum(), coupled.total_angular_momentum());
    }
}
