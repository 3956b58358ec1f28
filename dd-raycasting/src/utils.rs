use std::f64::consts::PI;

use nalgebra_glm::DVec3;
use rand::Rng;

use crate::math::clamp;

/// Returns a random unit vector uniformly distributed on the sphere.
///
/// # Arguments
/// * `rng` - The random number generator.
pub fn random_unit_vector<R: Rng + ?Sized>(rng: &mut R) -> DVec3 {
    let theta = 2.0 * PI * rng.random::<f64>();
    let u = 2.0 * rng.random::<f64>() - 1.0;

    let s = clamp(1.0 - u * u, 0.0, 1.0).sqrt();

    DVec3::new(s * theta.cos(), s * theta.sin(), u)
}
