use std::time::{Duration, Instant};

use log::{debug, info};
use nalgebra_glm::DVec3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::{
    spatial::AccelerationScene, utils::random_unit_vector, DPointQuery, DRay, DRayHit,
    RayFireConfig, Result, Scene, Sense, StatsNode, StatsNodeTrait, Surface, TriangleGeometry,
    TriangleMesh,
};

/// The results of a ray fire run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayFireReport {
    /// The number of fired rays.
    pub num_rays: usize,

    /// The number of rays that did not hit any surface.
    pub num_misses: usize,

    /// The wall clock time spent on firing the rays.
    pub fire_time: Duration,

    /// The distance from the ray origin to the closest surface, if there is any surface.
    pub closest_distance: Option<f64>,
}

impl RayFireReport {
    /// Returns the average time per ray in micro-seconds.
    pub fn micros_per_ray(&self) -> f64 {
        if self.num_rays == 0 {
            0.0
        } else {
            self.fire_time.as_secs_f64() * 1e6 / self.num_rays as f64
        }
    }
}

/// Creates the scene consisting of the built-in sphere of the configuration.
///
/// # Arguments
/// * `config` - The configuration with the sphere parameters.
pub fn builtin_scene(config: &RayFireConfig) -> Scene {
    let sphere = &config.sphere;
    let mesh = TriangleMesh::uv_sphere(sphere.radius, sphere.slices, sphere.stacks);

    Scene {
        surfaces: vec![Surface::new(mesh, Sense::Forward)],
    }
}

/// Fires random rays from a single origin against all surfaces of a scene.
pub struct RayFireExecutor {
    config: RayFireConfig,
    scene: Scene,
}

impl RayFireExecutor {
    /// Creates a new ray fire executor.
    ///
    /// # Arguments
    /// * `config` - The run configuration.
    /// * `scene` - The scene to fire at.
    pub fn new(config: RayFireConfig, scene: Scene) -> Self {
        Self { config, scene }
    }

    /// Runs the executor.
    ///
    /// # Arguments
    /// * `s` - The stats node to write the timings and counters to.
    pub fn run(&self, s: StatsNode) -> Result<RayFireReport> {
        self.config.validate()?;

        let geometries = self.create_geometries();

        let mut acceleration_scene = AccelerationScene::default();
        {
            let _t = s.get_child("build").register_timing();
            for geometry in geometries.iter() {
                acceleration_scene.attach(geometry)?;
            }
            acceleration_scene.commit();
        }

        let t0 = Instant::now();
        let num_misses = {
            let _t = s.get_child("fire").register_timing();
            self.fire_rays(&acceleration_scene)
        };
        let fire_time = t0.elapsed();

        s.add_count("rays", self.config.num_rays as u64);
        s.add_count("misses", num_misses as u64);

        let closest_distance = {
            let _t = s.get_child("point_query").register_timing();
            let mut query = DPointQuery::new(self.config.origin, f64::INFINITY);
            acceleration_scene.point_query(&mut query);
            query.closest().map(|c| c.distance)
        };

        let report = RayFireReport {
            num_rays: self.config.num_rays,
            num_misses,
            fire_time,
            closest_distance,
        };

        info!(
            "Fired {} rays in {:.3} ms ({:.3} us per ray), {} missed",
            report.num_rays,
            fire_time.as_secs_f64() * 1e3,
            report.micros_per_ray(),
            report.num_misses
        );

        match closest_distance {
            Some(d) => info!("Distance to the closest surface: {}", d),
            None => info!("No surface found for the point query"),
        }

        Ok(report)
    }

    /// Creates one triangle geometry per surface with the configured sense applied on top of the
    /// surface sense.
    fn create_geometries(&self) -> Vec<TriangleGeometry<'_, TriangleMesh>> {
        self.scene
            .surfaces
            .iter()
            .enumerate()
            .map(|(geom_id, surface)| {
                TriangleGeometry::new(
                    geom_id as u32,
                    &surface.mesh,
                    0..surface.mesh.n_elements() as u32,
                    surface.sense.compose(self.config.sense),
                )
            })
            .collect()
    }

    /// Fires all rays distributed over the configured number of threads and returns the number
    /// of misses.
    fn fire_rays(&self, scene: &AccelerationScene<'_>) -> usize {
        let num_threads = self.config.num_threads.max(1);
        let num_rays = self.config.num_rays;

        std::thread::scope(|scope| {
            let workers: Vec<_> = (0..num_threads)
                .map(|thread_index| {
                    // the first threads take the remainder
                    let n =
                        num_rays / num_threads + usize::from(thread_index < num_rays % num_threads);
                    let seed = self.config.seed.wrapping_add(thread_index as u64);

                    scope.spawn(move || self.fire_batch(scene, n, seed))
                })
                .collect();

            workers
                .into_iter()
                .map(|worker| match worker.join() {
                    Ok(misses) => misses,
                    Err(err) => std::panic::resume_unwind(err),
                })
                .sum()
        })
    }

    /// Fires the given number of random rays and returns the number of misses.
    fn fire_batch(&self, scene: &AccelerationScene<'_>, num_rays: usize, seed: u64) -> usize {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let origin = DVec3::from(self.config.origin);

        debug!("Firing {} rays with seed {}", num_rays, seed);

        let mut num_misses = 0;
        for _ in 0..num_rays {
            let dir = random_unit_vector(&mut rng);
            let ray = DRay::new(
                origin,
                dir,
                self.config.ray_length,
                self.config.ray_fire_type,
            );

            let mut rayhit = DRayHit::new(ray);
            scene.intersect1(&mut rayhit);

            if rayhit.hit().is_none() {
                num_misses += 1;
            }
        }

        num_misses
    }
}

#[cfg(test)]
mod test {
    use crate::{RayFireType, Stats};

    use super::*;

    fn sphere_config(num_threads: usize) -> RayFireConfig {
        let mut config = RayFireConfig {
            num_rays: 2000,
            num_threads,
            seed: 7,
            ..Default::default()
        };
        config.sphere.radius = 10.0;
        config.sphere.slices = 48;
        config.sphere.stacks = 24;

        config
    }

    #[test]
    fn test_fire_from_inside_the_sphere() {
        let config = sphere_config(3);
        let scene = builtin_scene(&config);
        let executor = RayFireExecutor::new(config, scene);

        let s = Stats::new_root();
        let report = executor.run(s.clone()).unwrap();

        assert_eq!(report.num_rays, 2000);
        assert_eq!(report.num_misses, 0);
        assert_eq!(s.get_count("rays"), 2000);
        assert_eq!(s.get_count("misses"), 0);

        // the facets lie inside the sphere, but not by much
        let d = report.closest_distance.unwrap();
        assert!(d <= 10.0 && d > 9.9);
    }

    #[test]
    fn test_outward_facing_sphere_is_missed() {
        let mut config = sphere_config(2);
        config.sense = Sense::Forward;
        config.num_rays = 301;

        let scene = builtin_scene(&config);
        let report = RayFireExecutor::new(config.clone(), scene)
            .run(Stats::new_root())
            .unwrap();
        assert_eq!(report.num_misses, 301);

        // membership tests accept every crossing
        config.ray_fire_type = RayFireType::PointInVolume;
        let scene = builtin_scene(&config);
        let report = RayFireExecutor::new(config, scene)
            .run(Stats::new_root())
            .unwrap();
        assert_eq!(report.num_misses, 0);
    }

    #[test]
    fn test_configured_sense_composes_with_surface_sense() {
        let mut config = sphere_config(1);
        config.num_rays = 200;

        // a mirrored surface is flipped back by the reversed configuration
        let mut scene = builtin_scene(&config);
        scene.surfaces[0].sense = Sense::Reverse;
        let report = RayFireExecutor::new(config.clone(), scene)
            .run(Stats::new_root())
            .unwrap();
        assert_eq!(report.num_misses, 200);

        config.sense = Sense::Forward;
        let mut scene = builtin_scene(&config);
        scene.surfaces[0].sense = Sense::Reverse;
        let report = RayFireExecutor::new(config, scene)
            .run(Stats::new_root())
            .unwrap();
        assert_eq!(report.num_misses, 0);
    }

    #[test]
    fn test_short_rays_miss() {
        let mut config = sphere_config(1);
        config.ray_length = 5.0;
        config.num_rays = 100;

        let scene = builtin_scene(&config);
        let report = RayFireExecutor::new(config, scene)
            .run(Stats::new_root())
            .unwrap();
        assert_eq!(report.num_misses, 100);
    }

    #[test]
    fn test_empty_scene() {
        let config = sphere_config(2);
        let report = RayFireExecutor::new(config, Scene::default())
            .run(Stats::new_root())
            .unwrap();

        assert_eq!(report.num_misses, 2000);
        assert_eq!(report.closest_distance, None);
    }
}
