//! Double precision ray queries on top of single precision acceleration structures.
//!
//! The acceleration structure in [`spatial`] traverses bounding boxes in single precision and
//! hands every candidate triangle to the callbacks in this crate, which decide about hits,
//! occlusion and closest points in double precision. The ray, hit and point query records carry
//! both precisions side by side.

mod callbacks;
mod config;
mod error;
mod executor;
pub mod math;
mod mesh;
mod primitive;
mod ray;
mod scene;
pub mod spatial;
mod stats;
mod utils;

pub use callbacks::*;
pub use config::*;
pub use error::*;
pub use executor::*;
pub use mesh::*;
pub use primitive::*;
pub use ray::*;
pub use scene::*;
pub use stats::*;
pub use utils::random_unit_vector;
