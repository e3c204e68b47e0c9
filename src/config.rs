//! The scene description consumed by the solver. Everything here is plain data: kinds are
//! kept as strings and only resolved when the objects are constructed, so a typo in a scene
//! file is reported as a configuration error before any substep runs.

use crate::error::{MpmError, Result};
use crate::math::T;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Dimensionality of the scene. Must match `math::DIM`.
    pub dim: usize,
    /// Refinement factor. Scales the grid resolution linearly and the particle counts by
    /// `quality^dim`.
    pub quality: u32,
    /// The size of the time step of one substep.
    pub dt: T,
    /// Acceleration added to the y velocity of every grid node, usually negative.
    pub gravity: T,
    /// Extents of the domain. The domain always starts at the origin.
    pub box_size: [T; 3],
    /// Grid cells per unit length before applying `quality`.
    pub base_n_grid_per_length: usize,
    pub substeps_per_frame: usize,
    /// Seed for the geometry samplers.
    pub seed: u64,
    pub mode: SimulationMode,
    pub budget: ParticleBudget,
    pub objects: Vec<ObjectConfig>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        SceneConfig {
            dim: 3,
            quality: 2,
            dt: 1e-4,
            gravity: -9.8,
            box_size: [1., 1., 1.],
            base_n_grid_per_length: 32,
            substeps_per_frame: 300,
            seed: 0,
            mode: SimulationMode::SinglePool,
            budget: ParticleBudget::default(),
            objects: Vec::new(),
        }
    }
}

/// How the objects of a scene are laid out in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationMode {
    /// All objects live in one particle pool and scatter into one grid.
    SinglePool,
    /// Each object has its own pool and its own grid buffer over the shared grid coordinates.
    Coupled,
}

impl std::str::FromStr for SimulationMode {
    type Err = MpmError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "single_pool" | "single-pool" => Ok(SimulationMode::SinglePool),
            "coupled" => Ok(SimulationMode::Coupled),
            _ => Err(MpmError::InvalidParameter(format!(
                "unknown simulation mode {:?}",
                s
            ))),
        }
    }
}

/// How many particles each object receives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy")]
pub enum ParticleBudget {
    /// A fixed total, split among the objects by volume fraction.
    Fixed { base_num_particles: usize },
    /// A fixed number of particles per unit volume, bounded by the pool capacity.
    Density {
        particles_per_unit_volume: T,
        base_max_num_particles: usize,
    },
}

impl Default for ParticleBudget {
    fn default() -> Self {
        ParticleBudget::Fixed {
            base_num_particles: 65536,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectConfig {
    pub material: MaterialConfig,
    pub geometry: GeometryConfig,
    #[serde(default)]
    pub initial_velocity: [T; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialConfig {
    /// One of `water`, `jelly` or `snow`.
    pub kind: String,
    #[serde(alias = "E")]
    pub youngs_modulus: T,
    #[serde(default = "default_poissons_ratio", alias = "nu")]
    pub poissons_ratio: T,
    #[serde(default = "default_density")]
    pub density: T,
    /// RGB or RGBA. Defaults to the color of the material kind.
    #[serde(default)]
    pub color: Option<Vec<f32>>,
    #[serde(default)]
    pub dim: Option<usize>,
}

fn default_poissons_ratio() -> T {
    0.2
}

fn default_density() -> T {
    1.
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// One of `cube`, `sphere` or `point_cloud`.
    pub kind: String,
    pub dim: Option<usize>,
    /// Lower corner of a cube.
    pub minimum: Option<[T; 3]>,
    /// Edge lengths of a cube.
    pub size: Option<[T; 3]>,
    pub center: Option<[T; 3]>,
    pub radius: Option<T>,
    /// Points of an already loaded point cloud.
    pub points: Option<Vec<[T; 3]>>,
    pub translation: Option<[T; 3]>,
    /// Euler angles (roll, pitch, yaw) in radians.
    pub rotation: Option<[T; 3]>,
    pub resize: Option<T>,
}

impl MaterialConfig {
    pub fn new(kind: &str, youngs_modulus: T, poissons_ratio: T, density: T) -> Self {
        MaterialConfig {
            kind: kind.to_string(),
            youngs_modulus,
            poissons_ratio,
            density,
            color: None,
            dim: None,
        }
    }
}

impl GeometryConfig {
    pub fn cube(minimum: [T; 3], size: [T; 3]) -> Self {
        GeometryConfig {
            kind: "cube".to_string(),
            minimum: Some(minimum),
            size: Some(size),
            ..Default::default()
        }
    }

    pub fn sphere(center: [T; 3], radius: T) -> Self {
        GeometryConfig {
            kind: "sphere".to_string(),
            center: Some(center),
            radius: Some(radius),
            ..Default::default()
        }
    }

    pub fn point_cloud(points: Vec<[T; 3]>) -> Self {
        GeometryConfig {
            kind: "point_cloud".to_string(),
            points: Some(points),
            ..Default::default()
        }
    }
}

impl ObjectConfig {
    pub fn new(material: MaterialConfig, geometry: GeometryConfig) -> Self {
        ObjectConfig {
            material,
            geometry,
            initial_velocity: [0.; 3],
        }
    }

    pub fn with_velocity(mut self, initial_velocity: [T; 3]) -> Self {
        self.initial_velocity = initial_velocity;
        self
    }
}

impl SceneConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read(path)?;
        Ok(serde_json::from_slice(&json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Names accepted by `SceneConfig::preset`.
    pub const PRESETS: &'static [&'static str] = &[
        "water_jelly_snow",
        "dam_break",
        "double_dam_break",
        "flood",
        "two_fluid",
        "different_density",
        "two_balls",
    ];

    pub fn preset(name: &str) -> Result<Self> {
        let water = |density| MaterialConfig::new("water", 277.777777778, 0.2, density);
        let jelly = |density, e| MaterialConfig::new("jelly", e, 0.2, density);
        let snow = MaterialConfig::new("snow", 0.1e4, 0.2, 1.);
        let cube = GeometryConfig::cube;
        let sphere = GeometryConfig::sphere;

        let base = SceneConfig::default();
        let config = match name {
            "water_jelly_snow" => SceneConfig {
                objects: vec![
                    ObjectConfig::new(water(1.), cube([0.6, 0.05, 0.6], [0.25; 3])),
                    ObjectConfig::new(snow, cube([0.35, 0.35, 0.35], [0.25; 3])),
                    ObjectConfig::new(jelly(1., 300.), cube([0.05, 0.6, 0.05], [0.25; 3])),
                ],
                ..base
            },
            "dam_break" => SceneConfig {
                objects: vec![ObjectConfig::new(
                    water(1.),
                    cube([0.55, 0.05, 0.55], [0.4; 3]),
                )],
                ..base
            },
            "double_dam_break" => SceneConfig {
                objects: vec![
                    ObjectConfig::new(water(1.), cube([0.05, 0.05, 0.05], [0.3, 0.4, 0.3])),
                    ObjectConfig::new(water(1.), cube([0.65, 0.05, 0.65], [0.3, 0.4, 0.3])),
                ],
                ..base
            },
            "flood" => SceneConfig {
                box_size: [2., 2., 1.],
                objects: vec![
                    ObjectConfig::new(water(1.), cube([0.05, 0.01, 0.05], [0.3, 1.5, 0.9])),
                    ObjectConfig::new(jelly(1., 300.), cube([1., 0.01, 0.05], [0.2; 3])),
                    ObjectConfig::new(jelly(2., 300.), cube([1., 0.01, 0.35], [0.2; 3])),
                    ObjectConfig::new(jelly(3., 300.), cube([1., 0.01, 0.65], [0.2; 3])),
                ],
                ..base
            },
            "two_fluid" => SceneConfig {
                box_size: [2., 2., 1.1],
                objects: vec![
                    ObjectConfig::new(water(1.), cube([0.05, 0.01, 0.05], [0.3, 1.5, 0.9])),
                    ObjectConfig::new(water(2.), sphere([1.4, 1., 0.55], 0.5)),
                ],
                ..base
            },
            "different_density" => SceneConfig {
                objects: vec![
                    ObjectConfig::new(
                        MaterialConfig::new("water", 2777.77777778, 0.2, 1.),
                        cube([0.1, 0.1, 0.1], [0.8, 0.5, 0.8]),
                    ),
                    ObjectConfig::new(jelly(1., 300.), sphere([0.25, 0.7, 0.5], 0.05)),
                    ObjectConfig::new(jelly(2., 300.), sphere([0.5, 0.7, 0.5], 0.05)),
                    ObjectConfig::new(jelly(3., 300.), sphere([0.75, 0.7, 0.5], 0.05)),
                ],
                ..base
            },
            "two_balls" => SceneConfig {
                box_size: [2., 2., 1.],
                mode: SimulationMode::Coupled,
                budget: ParticleBudget::Fixed {
                    base_num_particles: 8192,
                },
                objects: vec![
                    ObjectConfig::new(jelly(1., 300.), sphere([0.5, 1., 0.5], 0.2))
                        .with_velocity([2., 0., 0.]),
                    ObjectConfig::new(jelly(1., 3e3), sphere([1.5, 1., 0.5], 0.2))
                        .with_velocity([-2., 0., 0.]),
                ],
                ..base
            },
            _ => {
                return Err(MpmError::InvalidParameter(format!(
                    "unknown preset {:?}, expected one of {:?}",
                    name,
                    Self::PRESETS
                )))
            }
        };

        Ok(config)
    }
}
