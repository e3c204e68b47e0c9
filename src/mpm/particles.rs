use super::models::{IsotropicParameters, Jelly, Material};
use crate::math::{Mat, T, TV};
use std::ops::Range;

/// Where inactive particles are parked. Far enough outside any grid that their stencil never
/// touches a node.
pub const SENTINEL_POSITION: T = 533799.;

/// The initial state of a newly activated particle.
#[derive(Debug, Clone, Copy)]
pub struct ParticleInit {
    pub position: TV,
    pub velocity: TV,
    pub mass: T,
    pub volume: T,
    pub material: Material,
    pub color: [f32; 4],
}

/// Contains all of the particle data as a structure of arrays with a fixed capacity.
/// Slots that no object owns stay inactive at `SENTINEL_POSITION`.
#[derive(Debug, Clone)]
pub struct ParticlePool {
    pub position: Vec<TV>,
    pub velocity: Vec<TV>,
    /// The APIC affine velocity gradient `C`.
    pub affine_matrix: Vec<Mat>,
    pub deformation_gradient: Vec<Mat>,
    /// `Jp`, the accumulated plastic volume ratio.
    pub plastic_ratio: Vec<T>,
    pub mass: Vec<T>,
    /// Rest volume of each particle.
    pub volume: Vec<T>,
    pub material: Vec<Material>,
    pub active: Vec<bool>,
    pub color: Vec<[f32; 4]>,
}

fn parked_material() -> Material {
    Material::Jelly(Jelly(IsotropicParameters::default()))
}

impl ParticlePool {
    pub fn new(capacity: usize) -> Self {
        ParticlePool {
            position: vec![TV::repeat(SENTINEL_POSITION); capacity],
            velocity: vec![TV::zeros(); capacity],
            affine_matrix: vec![Mat::zeros(); capacity],
            deformation_gradient: vec![Mat::identity(); capacity],
            plastic_ratio: vec![1.; capacity],
            mass: vec![0.; capacity],
            volume: vec![0.; capacity],
            material: vec![parked_material(); capacity],
            active: vec![false; capacity],
            color: vec![[0.; 4]; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.position.len()
    }

    /// Parks particle `p` at the sentinel and clears its state.
    pub fn deactivate(&mut self, p: usize) {
        self.position[p] = TV::repeat(SENTINEL_POSITION);
        self.velocity[p] = TV::zeros();
        self.affine_matrix[p] = Mat::zeros();
        self.deformation_gradient[p] = Mat::identity();
        self.plastic_ratio[p] = 1.;
        self.mass[p] = 0.;
        self.volume[p] = 0.;
        self.active[p] = false;
    }

    pub fn set_all_inactive(&mut self) {
        for p in 0..self.capacity() {
            self.deactivate(p);
        }
    }

    /// Activates every particle in `range`, initializing each from `init(p)`. Deformation is
    /// reset to the rest state.
    pub fn activate_range(&mut self, range: Range<usize>, mut init: impl FnMut(usize) -> ParticleInit) {
        for p in range {
            let ParticleInit {
                position,
                velocity,
                mass,
                volume,
                material,
                color,
            } = init(p);

            self.position[p] = position;
            self.velocity[p] = velocity;
            self.affine_matrix[p] = Mat::zeros();
            self.deformation_gradient[p] = Mat::identity();
            self.plastic_ratio[p] = 1.;
            self.mass[p] = mass;
            self.volume[p] = volume;
            self.material[p] = material;
            self.active[p] = true;
            self.color[p] = color;
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.iter().filter(|&&a| a).count()
    }

    pub fn active_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.active
            .iter()
            .enumerate()
            .filter_map(|(p, &a)| if a { Some(p) } else { None })
    }

    /// Positions of the active particles within `range`.
    pub fn active_positions(&self, range: Range<usize>) -> impl Iterator<Item = &TV> + '_ {
        self.position[range.clone()]
            .iter()
            .zip(&self.active[range])
            .filter_map(|(x, &a)| if a { Some(x) } else { None })
    }

    pub fn total_mass(&self) -> T {
        self.active_indices().map(|p| self.mass[p]).sum()
    }

    pub fn total_momentum(&self) -> TV {
        self.active_indices()
            .map(|p| self.mass[p] * self.velocity[p])
            .sum()
    }
}
