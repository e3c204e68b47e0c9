use crate::math::{DIM, IV, T, TV};
use itertools::iproduct;

/// Quadratic B-spline interpolation weights between one particle and the 3x3x3 block of grid
/// nodes around it.
#[derive(Debug, Clone, Copy)]
pub struct ParticleGridWeights {
    /// The lowest node of the stencil.
    pub base: IV,
    /// Position of the particle relative to `base`, in grid units. Lies in `[0.5, 1.5)`.
    pub fx: TV,
    /// Per axis weights of the three nodes `base`, `base + 1` and `base + 2`.
    pub w: [TV; 3],
}

impl ParticleGridWeights {
    /// Returns `None` if the position can not be mapped onto grid coordinates (NaN or
    /// astronomically far away).
    pub fn new(position: &TV, inv_dx: T) -> Option<Self> {
        use num::ToPrimitive;

        let grid_space_pos = position * inv_dx;

        let mut base = IV::zeros();
        for i in 0..DIM {
            base[i] = (grid_space_pos[i] - 0.5).floor().to_isize()?;
        }

        let fx = grid_space_pos - base.cast::<T>();
        let w = [
            fx.map(|x| 0.5 * (1.5 - x) * (1.5 - x)),
            fx.map(|x| 0.75 - (x - 1.) * (x - 1.)),
            fx.map(|x| 0.5 * (x - 0.5) * (x - 0.5)),
        ];

        Some(ParticleGridWeights { base, fx, w })
    }

    /// Iterates over the 27 nodes of the stencil, yielding the node coordinate, its weight and
    /// the offset from the particle to the node in grid units.
    pub fn stencil(&self) -> impl Iterator<Item = (IV, T, TV)> + '_ {
        iproduct!(0..3usize, 0..3usize, 0..3usize).map(move |(i, j, k)| {
            let offset = IV::new(i as isize, j as isize, k as isize);
            let weight = self.w[i].x * self.w[j].y * self.w[k].z;
            let dpos = offset.cast::<T>() - self.fx;
            (self.base + offset, weight, dpos)
        })
    }
}

/// The quadratic B-spline N(x) the weights are sampled from.
///
/// N(x) = 3/4 - |x|^2              0 <= |x| < 1/2
///        1/2 (3/2 - |x|)^2        1/2 <= |x| < 3/2
///        0                        3/2 <= |x|
pub fn kernel(x: T) -> T {
    let x = x.abs();
    if x < 0.5 {
        0.75 - x * x
    } else if x < 1.5 {
        let a = 1.5 - x;
        0.5 * a * a
    } else {
        0.
    }
}
