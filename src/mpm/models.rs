use crate::config::MaterialConfig;
use crate::error::{MpmError, Result};
use crate::math::{Mat, DIM, T, TV};
use serde::{Deserialize, Serialize};

/// The rotation/stretch factorization `F = U Σ Vᵗ` of a deformation gradient, with `U` and
/// `V` proper rotations. An inverted `F` shows up as a negative smallest singular value, so
/// `J`, the product of the singular values, has the sign of `det F`.
#[derive(Debug, Clone, Copy)]
pub struct Deformation {
    pub u: Mat,
    pub sigma: TV,
    pub v_t: Mat,
    pub j: T,
}

impl Deformation {
    /// Returns `None` if the SVD does not converge.
    #[allow(non_snake_case)]
    pub fn new(F: &Mat) -> Option<Self> {
        let svd = (*F).try_svd(true, true, T::EPSILON, 0)?;
        let mut u = svd.u?;
        let mut v_t = svd.v_t?;
        let mut sigma = svd.singular_values;

        // Move any reflection out of U and V into the smallest singular value.
        let k = sigma.imin();
        if u.determinant() < 0. {
            u.column_mut(k).neg_mut();
            sigma[k] = -sigma[k];
        }
        if v_t.determinant() < 0. {
            v_t.row_mut(k).neg_mut();
            sigma[k] = -sigma[k];
        }

        Some(Deformation {
            u,
            sigma,
            v_t,
            j: sigma.iter().product(),
        })
    }

    /// The rotation closest to `F`.
    pub fn rotation(&self) -> Mat {
        self.u * self.v_t
    }

    pub fn recompose(&self) -> Mat {
        self.u * Mat::from_diagonal(&self.sigma) * self.v_t
    }
}

/// Where a material keeps its plastic volume ratio `Jp` up to date. Exactly one place per
/// material, otherwise volume change is counted twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlasticRatioAccounting {
    /// `Jp *= 1 + dt trace(C)` during the gather.
    VelocityTrace,
    /// `Jp *= σ / σ_clamped` during the scatter's return mapping.
    ReturnMapping,
    /// `Jp` is never used.
    Untracked,
}

/// The stress parameters for one particle in one substep, after hardening or softening.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LameParameters {
    pub mu: T,
    pub lambda: T,
}

/// Trait that describes a constitutive model as the four steps of the per-particle stress
/// update: plastic projection of the singular values, reconstruction of `F`, hardening and
/// the stress itself.
pub trait ConstitutiveModel: Send + Sync {
    /// Projects a single singular value onto the elastic region.
    fn clamp_singular_value(&self, sigma: T) -> T {
        sigma
    }

    /// Projects every singular value onto the elastic region, folding the removed stretch
    /// into `plastic_ratio`.
    fn clamp_singular_values(&self, sigma: &mut TV, plastic_ratio: &mut T) {
        for d in 0..DIM {
            let clamped = self.clamp_singular_value(sigma[d]);
            *plastic_ratio *= sigma[d] / clamped;
            sigma[d] = clamped;
        }
    }

    /// The deformation gradient to carry into the next substep, given the clamped
    /// factorization.
    #[allow(non_snake_case)]
    fn reconstruct_deformation_gradient(&self, F: &Mat, deformation: &Deformation) -> Mat;

    fn stress_params(&self, plastic_ratio: T) -> LameParameters;

    /// The fixed-corotated Kirchhoff stress `2μ(F - R)Fᵗ + λJ(J - 1)I`.
    #[allow(non_snake_case)]
    fn cauchy_stress(&self, F: &Mat, deformation: &Deformation, params: LameParameters) -> Mat {
        let J = deformation.j;
        2. * params.mu * (F - deformation.rotation()) * F.transpose()
            + Mat::identity() * params.lambda * J * (J - 1.)
    }

    fn plastic_ratio_accounting(&self) -> PlasticRatioAccounting;
}

/// Hardening factor applied as the material is compressed.
fn hardening(plastic_ratio: T) -> T {
    (10. * (1. - plastic_ratio)).exp()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IsotropicParameters {
    pub youngs_modulus: T,
    pub poissons_ratio: T,
    pub mu: T,
    pub lambda: T,
}

impl IsotropicParameters {
    pub fn new(youngs_modulus: T, poissons_ratio: T) -> Self {
        let mut base = Self {
            youngs_modulus,
            poissons_ratio,
            mu: 0.,
            lambda: 0.,
        };
        base.recalculate_lame_parameters();
        base
    }

    pub fn recalculate_lame_parameters(&mut self) {
        self.mu = self.youngs_modulus / (2. * (1. + self.poissons_ratio));
        self.lambda = self.youngs_modulus * self.poissons_ratio
            / ((1. + self.poissons_ratio) * (1. - 2. * self.poissons_ratio));
    }
}

impl Default for IsotropicParameters {
    fn default() -> Self {
        Self::new(0.1e4, 0.2)
    }
}

/// An inviscid, weakly compressible fluid. Only resists volume change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Water {
    pub youngs_modulus: T,
}

impl ConstitutiveModel for Water {
    #[allow(non_snake_case)]
    fn reconstruct_deformation_gradient(&self, _F: &Mat, deformation: &Deformation) -> Mat {
        // Keep only the volume; shear would otherwise drift without bound.
        Mat::identity() * deformation.j.powf(1. / DIM as T)
    }

    fn stress_params(&self, plastic_ratio: T) -> LameParameters {
        LameParameters {
            mu: 0.,
            lambda: self.youngs_modulus * hardening(plastic_ratio),
        }
    }

    #[allow(non_snake_case)]
    fn cauchy_stress(&self, _F: &Mat, deformation: &Deformation, params: LameParameters) -> Mat {
        let J = deformation.j;
        Mat::identity() * params.lambda * J * (J - 1.)
    }

    fn plastic_ratio_accounting(&self) -> PlasticRatioAccounting {
        PlasticRatioAccounting::VelocityTrace
    }
}

/// A purely hyperelastic solid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Jelly(pub IsotropicParameters);

impl Jelly {
    pub const SOFTENING: T = 0.3;
}

impl ConstitutiveModel for Jelly {
    #[allow(non_snake_case)]
    fn reconstruct_deformation_gradient(&self, F: &Mat, _deformation: &Deformation) -> Mat {
        *F
    }

    fn stress_params(&self, _plastic_ratio: T) -> LameParameters {
        LameParameters {
            mu: self.0.mu * Self::SOFTENING,
            lambda: self.0.lambda * Self::SOFTENING,
        }
    }

    fn plastic_ratio_accounting(&self) -> PlasticRatioAccounting {
        PlasticRatioAccounting::Untracked
    }
}

/// An elastoplastic solid that yields once stretched or compressed past a few percent and
/// hardens as it is packed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Snow(pub IsotropicParameters);

impl Snow {
    pub const CRITICAL_COMPRESSION: T = 2.5e-2;
    pub const CRITICAL_STRETCH: T = 4.5e-3;
}

impl ConstitutiveModel for Snow {
    fn clamp_singular_value(&self, sigma: T) -> T {
        sigma
            .max(1. - Self::CRITICAL_COMPRESSION)
            .min(1. + Self::CRITICAL_STRETCH)
    }

    #[allow(non_snake_case)]
    fn reconstruct_deformation_gradient(&self, _F: &Mat, deformation: &Deformation) -> Mat {
        deformation.recompose()
    }

    fn stress_params(&self, plastic_ratio: T) -> LameParameters {
        let h = hardening(plastic_ratio);
        LameParameters {
            mu: self.0.mu * h,
            lambda: self.0.lambda * h,
        }
    }

    fn plastic_ratio_accounting(&self) -> PlasticRatioAccounting {
        PlasticRatioAccounting::ReturnMapping
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    Water,
    Jelly,
    Snow,
}

impl std::str::FromStr for MaterialKind {
    type Err = MpmError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "water" => Ok(MaterialKind::Water),
            "jelly" => Ok(MaterialKind::Jelly),
            "snow" => Ok(MaterialKind::Snow),
            _ => Err(MpmError::UnknownMaterial(s.to_string())),
        }
    }
}

impl MaterialKind {
    pub fn default_color(self) -> [f32; 4] {
        match self {
            MaterialKind::Water => [0.1, 0.6, 0.9, 1.],
            MaterialKind::Jelly => [0.93, 0.33, 0.23, 1.],
            MaterialKind::Snow => [1., 1., 1., 1.],
        }
    }
}

/// The material of a particle. Dispatched once per particle per substep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Material {
    Water(Water),
    Jelly(Jelly),
    Snow(Snow),
}

macro_rules! dispatch {
    ($self:ident, $model:ident => $body:expr) => {
        match $self {
            Material::Water($model) => $body,
            Material::Jelly($model) => $body,
            Material::Snow($model) => $body,
        }
    };
}

impl Material {
    /// Resolves a material description, rejecting unknown kinds and unphysical parameters.
    pub fn from_config(config: &MaterialConfig, dim: usize) -> Result<Self> {
        if let Some(found) = config.dim {
            if found != dim {
                return Err(MpmError::DimensionMismatch {
                    what: "material",
                    expected: dim,
                    found,
                });
            }
        }

        let kind: MaterialKind = config.kind.parse()?;

        let e = config.youngs_modulus;
        let nu = config.poissons_ratio;
        if !(e > 0.) {
            return Err(MpmError::InvalidParameter(format!(
                "Young's modulus must be positive, got {}",
                e
            )));
        }
        if !(config.density > 0.) {
            return Err(MpmError::InvalidParameter(format!(
                "density must be positive, got {}",
                config.density
            )));
        }
        if !(nu > -1. && nu < 0.5) {
            return Err(MpmError::InvalidParameter(format!(
                "Poisson's ratio must lie in (-1, 0.5), got {}",
                nu
            )));
        }

        Ok(match kind {
            MaterialKind::Water => Material::Water(Water { youngs_modulus: e }),
            MaterialKind::Jelly => Material::Jelly(Jelly(IsotropicParameters::new(e, nu))),
            MaterialKind::Snow => Material::Snow(Snow(IsotropicParameters::new(e, nu))),
        })
    }

    /// The configured color as RGBA, or the default color of the kind.
    pub fn color(&self, config: &MaterialConfig) -> Result<[f32; 4]> {
        match config.color.as_deref() {
            None => Ok(self.kind().default_color()),
            Some(&[r, g, b]) => Ok([r, g, b, 1.]),
            Some(&[r, g, b, a]) => Ok([r, g, b, a]),
            Some(other) => Err(MpmError::InvalidColor(other.len())),
        }
    }

    pub fn kind(&self) -> MaterialKind {
        match self {
            Material::Water(_) => MaterialKind::Water,
            Material::Jelly(_) => MaterialKind::Jelly,
            Material::Snow(_) => MaterialKind::Snow,
        }
    }
}

impl ConstitutiveModel for Material {
    fn clamp_singular_value(&self, sigma: T) -> T {
        dispatch!(self, m => m.clamp_singular_value(sigma))
    }

    fn clamp_singular_values(&self, sigma: &mut TV, plastic_ratio: &mut T) {
        dispatch!(self, m => m.clamp_singular_values(sigma, plastic_ratio))
    }

    #[allow(non_snake_case)]
    fn reconstruct_deformation_gradient(&self, F: &Mat, deformation: &Deformation) -> Mat {
        dispatch!(self, m => m.reconstruct_deformation_gradient(F, deformation))
    }

    fn stress_params(&self, plastic_ratio: T) -> LameParameters {
        dispatch!(self, m => m.stress_params(plastic_ratio))
    }

    #[allow(non_snake_case)]
    fn cauchy_stress(&self, F: &Mat, deformation: &Deformation, params: LameParameters) -> Mat {
        dispatch!(self, m => m.cauchy_stress(F, deformation, params))
    }

    fn plastic_ratio_accounting(&self) -> PlasticRatioAccounting {
        dispatch!(self, m => m.plastic_ratio_accounting())
    }
}

/// The stress update of one particle.
#[derive(Debug, Clone, Copy)]
pub struct StressUpdate {
    /// The deformation gradient to store on the particle.
    pub deformation_gradient: Mat,
    pub stress: Mat,
}

/// Runs the full constitutive pipeline on a deformation gradient that has already been
/// advanced by the velocity gradient: factorize, clamp, reconstruct and evaluate the stress.
/// Returns `None`, leaving `plastic_ratio` untouched, if the deformation is degenerate.
#[allow(non_snake_case)]
pub fn update_stress<M: ConstitutiveModel + ?Sized>(
    model: &M,
    F: &Mat,
    plastic_ratio: &mut T,
) -> Option<StressUpdate> {
    let mut deformation = Deformation::new(F)?;
    // Checked before the return mapping, which would clamp an inversion back to positive.
    if !(deformation.j > 0.) || !deformation.j.is_finite() {
        return None;
    }

    let params = model.stress_params(*plastic_ratio);
    let mut new_plastic_ratio = *plastic_ratio;
    model.clamp_singular_values(&mut deformation.sigma, &mut new_plastic_ratio);
    deformation.j = deformation.sigma.iter().product();

    let F = model.reconstruct_deformation_gradient(F, &deformation);
    let stress = model.cauchy_stress(&F, &deformation, params);
    *plastic_ratio = new_plastic_ratio;

    Some(StressUpdate {
        deformation_gradient: F,
        stress,
    })
}
