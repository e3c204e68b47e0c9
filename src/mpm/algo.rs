//! The three transfer phases of a substep. Each runs data parallel over its outer index; the
//! only shared writes are the atomic adds of the scatter.

use super::grid::{GridBuffer, GridData, ParticleGridWeights};
use super::models::{update_stress, ConstitutiveModel, PlasticRatioAccounting};
use super::parameters::MpmParameters;
use super::particles::ParticlePool;
use crate::math::{Mat, T, TV};
use rayon::prelude::*;

/// Advances every active particle's deformation, evaluates its stress and scatters mass and
/// APIC momentum into `buffer`.
#[allow(non_snake_case)]
pub fn particle_to_grid(particles: &mut ParticlePool, buffer: &GridBuffer, params: &MpmParameters) {
    let ParticlePool {
        position,
        velocity,
        affine_matrix,
        deformation_gradient,
        plastic_ratio,
        mass,
        volume,
        material,
        active,
        ..
    } = particles;

    let dt = params.dt;
    let inv_dx = params.inv_dx;

    // Stress first, so the scatter below only reads particle state.
    let affine: Vec<Mat> = deformation_gradient
        .par_iter_mut()
        .zip(plastic_ratio.par_iter_mut())
        .enumerate()
        .map(|(p, (F, Jp))| {
            if !active[p] {
                return Mat::zeros();
            }

            let C = affine_matrix[p];
            let advanced = (Mat::identity() + dt * C) * *F;

            let stress = match update_stress(&material[p], &advanced, Jp) {
                Some(update) => {
                    *F = update.deformation_gradient;
                    update.stress
                }
                None => {
                    tracing::warn!(
                        "Particle {} has a degenerate deformation gradient (det = {:e}), skipping its stress",
                        p,
                        advanced.determinant()
                    );
                    Mat::zeros()
                }
            };

            -dt * volume[p] * 4. * inv_dx * inv_dx * stress + mass[p] * C
        })
        .collect();

    let grid = &params.grid;
    (0..position.len())
        .into_par_iter()
        .filter(|&p| active[p])
        .for_each(|p| {
            let weights = match ParticleGridWeights::new(&position[p], inv_dx) {
                Some(weights) => weights,
                None => return,
            };

            let momentum = mass[p] * velocity[p];
            for (node, w, dpos) in weights.stencil() {
                if let Some(index) = grid.checked_index(node) {
                    let dpos = dpos * grid.dx;
                    buffer.scatter(index, w * mass[p], &(w * (momentum + affine[p] * dpos)));
                }
            }
        });
}

/// Normalizes, accelerates and clamps the velocities of one grid buffer.
pub fn grid_update(buffer: &mut GridBuffer, params: &MpmParameters) {
    buffer.update(&params.grid, params.dt, params.gravity, params.boundary_cells);
}

/// Gathers velocity and the affine velocity gradient back from `buffer`, then advects every
/// active particle.
#[allow(non_snake_case)]
pub fn grid_to_particle(particles: &mut ParticlePool, buffer: &GridBuffer, params: &MpmParameters) {
    let ParticlePool {
        position,
        velocity,
        affine_matrix,
        plastic_ratio,
        material,
        active,
        ..
    } = particles;

    let dt = params.dt;
    let inv_dx = params.inv_dx;
    let grid = &params.grid;

    position
        .par_iter_mut()
        .zip(velocity.par_iter_mut())
        .zip(affine_matrix.par_iter_mut())
        .zip(plastic_ratio.par_iter_mut())
        .enumerate()
        .for_each(|(p, (((x, v), C), Jp))| {
            if !active[p] {
                return;
            }

            let (new_v, new_C) = match gather(x, buffer, grid, inv_dx) {
                Some(gathered) => gathered,
                None => return,
            };

            *v = new_v;
            *C = new_C;
            *x += dt * new_v;

            if material[p].plastic_ratio_accounting() == PlasticRatioAccounting::VelocityTrace {
                *Jp *= 1. + dt * new_C.trace();
            }
        });
}

#[allow(non_snake_case)]
fn gather(x: &TV, buffer: &GridBuffer, grid: &GridData, inv_dx: T) -> Option<(TV, Mat)> {
    let weights = ParticleGridWeights::new(x, inv_dx)?;

    let mut new_v = TV::zeros();
    let mut new_C = Mat::zeros();
    for (node, w, dpos) in weights.stencil() {
        if let Some(index) = grid.checked_index(node) {
            let g_v = buffer.momentum_or_velocity(index);
            new_v += w * g_v;
            new_C += 4. * inv_dx * w * g_v * dpos.transpose();
        }
    }

    Some((new_v, new_C))
}
