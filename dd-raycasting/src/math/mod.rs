mod aabb;
mod intersection;
mod ray;

pub use aabb::*;
pub use intersection::*;
pub use ray::*;

use nalgebra_glm::{vec4_to_vec3, DMat4, DVec3, DVec4, Vec3};

/// Constraint a value to lie between two further values
///
/// # Arguments
/// * `x` - The value to constraint.
/// * `min_value` - The lower bound for the value constraint.
/// * `max_value` - The upper bound for the value constraint.
#[inline]
pub fn clamp<T>(x: T, min_value: T, max_value: T) -> T
where
    T: PartialOrd,
{
    if x < min_value {
        min_value
    } else if x > max_value {
        max_value
    } else {
        x
    }
}

/// Converts the double precision vector to its nearest single precision counterpart.
#[inline]
pub fn to_vec3(v: &DVec3) -> Vec3 {
    Vec3::new(v[0] as f32, v[1] as f32, v[2] as f32)
}

/// Transforms the given position with the given homogenous transformation matrix and returns the
/// transformed position.
///
/// # Arguments
/// * `t` - The 4x4 homogenous transformation matrix.
/// * `p` - The 3D position to transform.
#[inline]
pub fn transform_dvec3(t: &DMat4, p: &DVec3) -> DVec3 {
    let p = t * DVec4::new(p[0], p[1], p[2], 1f64);
    vec4_to_vec3(&p) / p[3]
}
