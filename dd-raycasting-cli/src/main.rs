use std::{fs::File, io::BufWriter, time::Instant};

use anyhow::Result;
use clap::Parser;
use dd_raycasting::{
    builtin_scene, load_into_scene, RayFireConfig, RayFireExecutor, Scene, Stats, StatsNodeTrait,
};
use log::{error, info, warn, LevelFilter};
use options::Options;

mod options;

/// Initializes the program logging
///
/// # Arguments
/// * `filter` - The log level filter, i.e., the minimum log level to be logged.
fn initialize_logging(filter: LevelFilter) {
    let mut builder = pretty_env_logger::formatted_timed_builder();

    builder.filter_level(filter).init();
}

/// Loads the CAD files based on the provided glob patterns.
///
/// # Arguments
/// * `patterns` - The glob patterns for the CAD files.
fn load_cad_files(patterns: &[String]) -> Result<(Scene, usize)> {
    let mut scene = Scene::default();
    let mut num_read_files = 0;

    for pattern in patterns {
        let paths = glob::glob(pattern).map_err(|err| {
            error!("Invalid input pattern '{}': {:?}", pattern, err);
            err
        })?;

        for entry in paths {
            match entry {
                Ok(path) => {
                    info!("Loading CAD data '{}'...", path.display());

                    if let Err(err) = load_into_scene(&mut scene, &path) {
                        error!("Failed to load CAD data: {:?}", err);
                        info!("Skipping CAD data...");
                    } else {
                        num_read_files += 1;
                    }
                }
                Err(err) => {
                    error!("Failed to read entry: {:?}", err);
                    info!("Skipping entry...");
                }
            }
        }
    }

    Ok((scene, num_read_files))
}

/// Reads the configuration file, if any, and applies the overrides of the command line.
///
/// # Arguments
/// * `options` - The program options.
fn load_config(options: &Options) -> Result<RayFireConfig> {
    let mut config = match options.config.as_ref() {
        Some(path) => {
            let file = File::open(path).map_err(|err| {
                error!("Failed to open config file '{}': {:?}", path, err);
                err
            })?;

            RayFireConfig::read(file)?
        }
        None => RayFireConfig::default(),
    };

    if let Some(input) = options.input.as_ref() {
        config.input = vec![input.clone()];
    }

    if let Some(num_rays) = options.num_rays {
        config.num_rays = num_rays;
    }

    if let Some(ray_fire_type) = options.ray_fire_type {
        config.ray_fire_type = ray_fire_type.into();
    }

    if let Some(num_threads) = options.num_threads {
        config.num_threads = num_threads;
    }

    config.validate()?;

    Ok(config)
}

/// Prints the scene information.
///
/// # Arguments
/// * `scene` - The scene to print the information for.
fn print_scene_info(scene: &Scene) {
    let num_vertices: usize = scene.surfaces.iter().map(|s| s.mesh.vertices.len()).sum();

    info!("Scene information:");
    info!("  - Number of surfaces: {}", scene.surfaces.len());
    info!("  - Number of triangles: {}", scene.num_triangles());
    info!("  - Number of vertices: {}", num_vertices);
    info!("  - Bounding box: {}", scene.bounding_box());
}

/// Runs the program.
///
/// # Arguments
/// * `options` - The program options.
fn run_program(options: Options) -> Result<()> {
    let s = Stats::root();
    let config = load_config(&options)?;

    let scene = if config.input.is_empty() {
        info!(
            "No input given, using sphere with radius {}",
            config.sphere.radius
        );
        builtin_scene(&config)
    } else {
        let _t = s.get_child("loading").register_timing();
        let t_ = Instant::now();

        let (scene, num_read) = load_cad_files(&config.input)?;

        info!(
            "Loaded {} CAD files in {} ms",
            num_read,
            t_.elapsed().as_secs_f64() * 1e3f64
        );

        if num_read == 0 {
            warn!("No CAD file could be loaded, all rays will miss");
        }

        scene
    };

    print_scene_info(&scene);

    if let Some(output) = options.output.as_ref() {
        info!("Writing scene to '{}'...", output);
        scene.write(BufWriter::new(File::create(output)?))?;
    }

    let executor = RayFireExecutor::new(config, scene);
    let report = executor.run(s.get_child("ray_fire"))?;

    info!("Misses: {}/{}", report.num_misses, report.num_rays);

    Ok(())
}

fn main() {
    let options = Options::parse();
    initialize_logging(options.log_level.into());
    options.dump_to_log();

    match run_program(options) {
        Ok(_) => {
            info!("Stat:");
            match Stats::root().lock() {
                Ok(stats) => info!("{}", *stats),
                Err(err) => error!("Failed to access the stats: {:?}", err),
            }
            info!("Program completed successfully");
        }
        Err(err) => {
            error!("Program failed: {:?}", err);
            std::process::exit(1);
        }
    }
}
