use super::models::Material;
use super::parameters::MpmParameters;
use super::particles::{ParticleInit, ParticlePool};
use crate::config::{ObjectConfig, ParticleBudget};
use crate::error::{MpmError, Result};
use crate::geometry::{self, GeometrySampler};
use crate::math::{T, TV};
use num::ToPrimitive;
use rand::rngs::StdRng;
use std::ops::Range;

/// A body in the scene: what it is made of, where its particles come from, and which slots of
/// a particle pool it owns.
pub struct SimObject {
    pub material: Material,
    pub geometry: Box<dyn GeometrySampler>,
    pub density: T,
    pub initial_velocity: TV,
    pub color: [f32; 4],
    /// Slots in the owning pool. Empty until the scene is assembled.
    pub range: Range<usize>,
}

impl SimObject {
    /// Resolves the material and geometry kinds. All configuration errors surface here.
    pub fn from_config(config: &ObjectConfig, dim: usize) -> Result<Self> {
        let material = Material::from_config(&config.material, dim)?;
        let color = material.color(&config.material)?;
        let geometry = geometry::from_config(&config.geometry, dim)?;

        Ok(SimObject {
            material,
            geometry,
            density: config.material.density,
            initial_velocity: TV::from(config.initial_velocity),
            color,
            range: 0..0,
        })
    }

    pub fn num_particles(&self) -> usize {
        self.range.len()
    }

    /// Writes this object's particles into its range of `pool`.
    pub fn fill(&self, pool: &mut ParticlePool, params: &MpmParameters, rng: &mut StdRng) {
        let start = self.range.start;
        let mass = self.density * params.particle_volume;

        pool.activate_range(self.range.clone(), |p| ParticleInit {
            position: self.geometry.sample(p - start, rng),
            velocity: self.initial_velocity,
            mass,
            volume: params.particle_volume,
            material: self.material,
            color: self.color,
        });
    }
}

pub fn build_objects(configs: &[ObjectConfig], dim: usize) -> Result<Vec<SimObject>> {
    if configs.is_empty() {
        return Err(MpmError::EmptyScene);
    }
    configs
        .iter()
        .map(|config| SimObject::from_config(config, dim))
        .collect()
}

/// Decides how many particles every object receives.
///
/// With a fixed budget the total is split by volume fraction, and the last object absorbs the
/// rounding remainder so the whole budget is used. With a density budget every object gets
/// `round(volume * density)` particles and the running total must stay within the capacity.
pub fn particle_counts(objects: &[SimObject], params: &MpmParameters) -> Result<Vec<usize>> {
    let capacity = params.capacity();
    let volumes: Vec<T> = objects.iter().map(|o| o.geometry.volume()).collect();

    match params.budget {
        ParticleBudget::Fixed { .. } => {
            let total_volume: T = volumes.iter().sum();
            if !(total_volume > 0.) {
                return Err(MpmError::InvalidParameter(
                    "the objects of the scene have no volume".to_string(),
                ));
            }

            let mut counts = Vec::with_capacity(objects.len());
            let mut assigned = 0;
            for (i, volume) in volumes.iter().enumerate() {
                let count = if i + 1 == objects.len() {
                    capacity - assigned
                } else {
                    (volume / total_volume * capacity as T)
                        .floor()
                        .to_usize()
                        .unwrap_or(0)
                };
                assigned += count;
                counts.push(count);
            }
            Ok(counts)
        }
        ParticleBudget::Density {
            particles_per_unit_volume,
            ..
        } => {
            let per_volume = particles_per_unit_volume * params.particle_scale as T;
            let mut counts = Vec::with_capacity(objects.len());
            let mut assigned = 0;
            for (object, volume) in volumes.iter().enumerate() {
                let count = (volume * per_volume).round().to_usize().ok_or_else(|| {
                    MpmError::InvalidParameter(format!(
                        "object {} has an invalid particle count",
                        object
                    ))
                })?;
                assigned += count;
                if assigned > capacity {
                    return Err(MpmError::CapacityOverflow {
                        object,
                        requested: assigned,
                        capacity,
                    });
                }
                counts.push(count);
            }
            Ok(counts)
        }
    }
}

/// Packs the objects into consecutive ranges of one pool. Returns the end of the last range;
/// everything after it stays inactive.
pub fn pack_ranges(objects: &mut [SimObject], counts: &[usize]) -> usize {
    let mut start = 0;
    for (object, &count) in objects.iter_mut().zip(counts) {
        object.range = start..start + count;
        start += count;
    }
    start
}

pub fn log_object(index: usize, object: &SimObject) {
    tracing::info!(
        "Object {}: {:?} particles {}..{} (volume {:.4})",
        index,
        object.material.kind(),
        object.range.start,
        object.range.end,
        object.geometry.volume()
    );
}
