use clap::{Parser, ValueEnum};
use dd_raycasting::RayFireType;
use log::{info, LevelFilter};

/// Workaround for parsing the different log level
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
        }
    }
}

/// The kind of query the rays are fired for.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum QueryKind {
    /// Only hits on the front side of a surface count.
    RayFire,

    /// Every surface crossing counts.
    PointInVolume,
}

impl From<QueryKind> for RayFireType {
    fn from(value: QueryKind) -> Self {
        match value {
            QueryKind::RayFire => RayFireType::RayFire,
            QueryKind::PointInVolume => RayFireType::PointInVolume,
        }
    }
}

/// CLI for benchmarking double precision ray fire queries against triangle surfaces.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Options {
    /// The log level
    #[arg(short, value_enum, long, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// The ray fire configuration file. Without it, the defaults are used.
    #[arg(short, long)]
    pub config: Option<String>,

    /// Overrides the input files of the configuration, e.g., `data/*.glb`.
    #[arg(short, long)]
    pub input: Option<String>,

    /// Overrides the number of rays.
    #[arg(short, long)]
    pub num_rays: Option<usize>,

    /// Overrides the query kind.
    #[arg(short = 't', long, value_enum)]
    pub ray_fire_type: Option<QueryKind>,

    /// Overrides the number of threads.
    #[arg(short = 'j', long)]
    pub num_threads: Option<usize>,

    /// Optional path to write the loaded scene to.
    #[arg(short, long)]
    pub output: Option<String>,
}

impl Options {
    /// Dumps the options to the log.
    pub fn dump_to_log(&self) {
        info!("Log Level: {:?}", self.log_level);
        info!("Config file: {:?}", self.config);

        if let Some(input) = self.input.as_ref() {
            info!("Input: {}", input);
        }

        if let Some(output) = self.output.as_ref() {
            info!("Output: {}", output);
        }
    }
}
