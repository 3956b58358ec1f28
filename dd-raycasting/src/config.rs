use log::error;
use serde::{Deserialize, Serialize};

use crate::{Error, RayFireType, Result, Sense};

/// The configuration of a ray fire run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RayFireConfig {
    /// The input files. Can be expressions like `*.glb`.
    /// If empty, the built-in sphere is used instead.
    #[serde(default)]
    pub input: Vec<String>,

    /// The built-in sphere used when no input is given.
    #[serde(default)]
    pub sphere: SphereConfig,

    /// The sense applied on top of the sense of every surface, i.e., `Reverse` flips all of them.
    /// Rays fired from inside a closed surface with outward normals need the reversed sense.
    #[serde(default = "default_sense")]
    pub sense: Sense,

    /// The number of random rays to fire.
    pub num_rays: usize,

    /// The origin of all rays.
    #[serde(default)]
    pub origin: [f64; 3],

    /// The length of all rays.
    #[serde(default = "default_ray_length")]
    pub ray_length: f64,

    /// The kind of query the rays are fired for.
    #[serde(default)]
    pub ray_fire_type: RayFireType,

    /// The seed for the random ray directions.
    #[serde(default)]
    pub seed: u64,

    /// The number of threads to use
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
}

/// The parameters of the built-in UV sphere centered at the origin.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SphereConfig {
    pub radius: f64,
    pub slices: u32,
    pub stacks: u32,
}

impl Default for SphereConfig {
    fn default() -> Self {
        Self {
            radius: 1.0,
            slices: 64,
            stacks: 32,
        }
    }
}

fn default_sense() -> Sense {
    Sense::Reverse
}

fn default_ray_length() -> f64 {
    1000.0
}

fn default_num_threads() -> usize {
    1
}

impl RayFireConfig {
    /// Reads the configuration from the provided reader.
    ///
    /// # Arguments
    /// * `reader` - The reader to read the configuration from.
    pub fn read<R: std::io::Read>(reader: R) -> Result<Self> {
        let config: RayFireConfig = serde_yaml::from_reader(reader).map_err(|e| {
            error!("Failed to parse the configuration: {:?}", e);

            Error::DeserializationError(Box::new(e))
        })?;

        config.validate()?;

        Ok(config)
    }

    /// Writes the configuration to the provided writer.
    ///
    /// # Arguments
    /// * `writer` - The writer to write the configuration to.
    pub fn write<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        let yaml = serde_yaml::to_string(&self).map_err(|e| {
            error!("Failed to serialize the configuration: {:?}", e);

            Error::SerializationError(Box::new(e))
        })?;

        writer.write_all(yaml.as_bytes())?;

        Ok(())
    }

    /// Checks the value ranges of the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.num_threads == 0 {
            return Err(Error::InvalidConfig("num_threads must be positive".to_string()));
        }

        if self.ray_length.is_nan() || self.ray_length <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "ray_length must be positive, got {}",
                self.ray_length
            )));
        }

        if self.input.is_empty() && (self.sphere.radius.is_nan() || self.sphere.radius <= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "sphere radius must be positive, got {}",
                self.sphere.radius
            )));
        }

        Ok(())
    }
}

impl Default for RayFireConfig {
    fn default() -> Self {
        Self {
            input: Vec::new(),
            sphere: SphereConfig::default(),
            sense: default_sense(),
            num_rays: 1_000_000,
            origin: [0.0; 3],
            ray_length: default_ray_length(),
            ray_fire_type: RayFireType::RayFire,
            seed: 0,
            num_threads: default_num_threads(),
        }
    }
}
