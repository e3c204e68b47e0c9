use crate::config::GeometryConfig;
use crate::error::{MpmError, Result};
use crate::math::{DIM, T, TV};
use crate::util::{RangeExt, VecExt};
use na::Rotation3;
use rand::{rngs::StdRng, Rng};
use std::ops::Range;

/// Produces initial particle positions inside a region.
pub trait GeometrySampler: Send + Sync {
    /// The volume of the region, used to size the object's share of the particle pool.
    fn volume(&self) -> T;

    /// Draws the position of the `index`-th particle of the object.
    fn sample(&self, index: usize, rng: &mut StdRng) -> TV;
}

pub struct Block {
    pub size: Range<TV>,
}

impl GeometrySampler for Block {
    fn volume(&self) -> T {
        self.size.volume()
    }

    fn sample(&self, _index: usize, rng: &mut StdRng) -> TV {
        let rand: TV = rng.gen::<[T; DIM]>().into();
        self.size.start + rand.component_mul(&self.size.size())
    }
}

pub struct Sphere {
    pub center: TV,
    pub radius: T,
}

impl GeometrySampler for Sphere {
    fn volume(&self) -> T {
        4. / 3. * std::f64::consts::PI * self.radius.powi(3)
    }

    fn sample(&self, _index: usize, rng: &mut StdRng) -> TV {
        let theta = 2. * std::f64::consts::PI * rng.gen::<T>();
        let phi = (1. - 2. * rng.gen::<T>()).acos();
        let r = self.radius * rng.gen::<T>().cbrt();

        self.center
            + r * TV::new(
                phi.sin() * theta.cos(),
                phi.sin() * theta.sin(),
                phi.cos(),
            )
    }
}

/// An externally loaded point cloud. Points are handed out in order (wrapping around) after
/// being rescaled, rotated and translated.
pub struct PointCloud {
    points: Vec<TV>,
    bounds: Range<TV>,
}

impl PointCloud {
    pub fn new(points: &[TV], translation: TV, rotation: TV, resize: T) -> Result<Self> {
        if points.is_empty() {
            return Err(MpmError::InvalidParameter(
                "point cloud contains no points".to_string(),
            ));
        }

        let rotation = Rotation3::from_euler_angles(rotation.x, rotation.y, rotation.z);
        let points: Vec<TV> = points
            .iter()
            .map(|p| rotation * (resize * p) + translation)
            .collect();

        let bounds = points
            .iter()
            .skip(1)
            .fold(points[0]..points[0], |b, p| {
                b.start.component_min(p)..b.end.component_max(p)
            });

        Ok(PointCloud { points, bounds })
    }
}

impl GeometrySampler for PointCloud {
    fn volume(&self) -> T {
        self.bounds.volume()
    }

    fn sample(&self, index: usize, _rng: &mut StdRng) -> TV {
        self.points[index % self.points.len()]
    }
}

fn required<V: Copy>(value: Option<V>, field: &str, kind: &str) -> Result<V> {
    value.ok_or_else(|| MpmError::InvalidParameter(format!("{} requires `{}`", kind, field)))
}

/// Builds the sampler described by `config`, rejecting unknown kinds and malformed shapes.
pub fn from_config(config: &GeometryConfig, dim: usize) -> Result<Box<dyn GeometrySampler>> {
    if let Some(found) = config.dim {
        if found != dim {
            return Err(MpmError::DimensionMismatch {
                what: "geometry",
                expected: dim,
                found,
            });
        }
    }

    let kind = config.kind.as_str();
    match kind {
        "cube" => {
            let minimum = TV::from(required(config.minimum, "minimum", kind)?);
            let size = TV::from(required(config.size, "size", kind)?);
            if size.iter().any(|&s| !(s > 0.)) {
                return Err(MpmError::InvalidParameter(format!(
                    "cube size must be positive, got {:?}",
                    size
                )));
            }
            Ok(Box::new(Block {
                size: minimum..minimum + size,
            }))
        }
        "sphere" | "ball" => {
            let center = TV::from(required(config.center, "center", kind)?);
            let radius = required(config.radius, "radius", kind)?;
            if !(radius > 0.) {
                return Err(MpmError::InvalidParameter(format!(
                    "sphere radius must be positive, got {}",
                    radius
                )));
            }
            Ok(Box::new(Sphere { center, radius }))
        }
        "point_cloud" | "ply" => {
            let points = config.points.as_ref().ok_or_else(|| {
                MpmError::InvalidParameter("point_cloud requires `points`".to_string())
            })?;
            let points: Vec<TV> = points.iter().map(|&p| TV::from(p)).collect();
            let cloud = PointCloud::new(
                &points,
                TV::from(config.translation.unwrap_or([0.; 3])),
                TV::from(config.rotation.unwrap_or([0.; 3])),
                config.resize.unwrap_or(1.),
            )?;
            Ok(Box::new(cloud))
        }
        _ => Err(MpmError::UnknownGeometry(config.kind.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn block_samples_stay_inside() {
        let block = Block {
            size: TV::new(0.1, 0.2, 0.3)..TV::new(0.4, 0.4, 0.9),
        };
        let mut rng = StdRng::seed_from_u64(0);

        assert!((block.volume() - 0.3 * 0.2 * 0.6).abs() < 1e-12);
        for i in 0..1000 {
            let p = block.sample(i, &mut rng);
            assert!(block.size.thickened(1e-12).contains_point(&p), "{:?}", p);
        }
    }

    #[test]
    fn sphere_samples_stay_inside_and_fill_the_ball() {
        let sphere = Sphere {
            center: TV::new(0.5, 0.5, 0.5),
            radius: 0.2,
        };
        let mut rng = StdRng::seed_from_u64(7);

        let samples: Vec<_> = (0..4000).map(|i| sphere.sample(i, &mut rng)).collect();
        assert!(samples
            .iter()
            .all(|p| (p - sphere.center).norm() <= sphere.radius + 1e-12));

        // A uniform ball has 1/8 of its points within half the radius.
        let inner = samples
            .iter()
            .filter(|p| (*p - sphere.center).norm() < 0.5 * sphere.radius)
            .count() as T;
        assert!((inner / 4000. - 0.125).abs() < 0.03, "{}", inner / 4000.);
    }

    #[test]
    fn point_cloud_is_transformed_and_wraps() {
        let points = [TV::new(1., 0., 0.), TV::new(0., 1., 0.)];
        let cloud = PointCloud::new(
            &points,
            TV::new(1., 1., 1.),
            TV::new(0., 0., std::f64::consts::FRAC_PI_2),
            2.,
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        // (2, 0, 0) rotated a quarter turn about z is (0, 2, 0).
        assert!((cloud.sample(0, &mut rng) - TV::new(1., 3., 1.)).norm() < 1e-12);
        assert!((cloud.sample(1, &mut rng) - TV::new(-1., 1., 1.)).norm() < 1e-12);
        assert_eq!(cloud.sample(2, &mut rng), cloud.sample(0, &mut rng));
    }

    #[test]
    fn config_errors() {
        let unknown = GeometryConfig {
            kind: "torus".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            from_config(&unknown, 3),
            Err(MpmError::UnknownGeometry(_))
        ));

        let mut flat = GeometryConfig::cube([0.; 3], [0.1, 0.2, 0.3]);
        flat.dim = Some(2);
        assert!(matches!(
            from_config(&flat, 3),
            Err(MpmError::DimensionMismatch { found: 2, .. })
        ));

        let missing_radius = GeometryConfig {
            kind: "sphere".to_string(),
            center: Some([0.5; 3]),
            ..Default::default()
        };
        assert!(matches!(
            from_config(&missing_radius, 3),
            Err(MpmError::InvalidParameter(_))
        ));

        assert!(from_config(&GeometryConfig::point_cloud(vec![]), 3).is_err());
    }
}
