use nalgebra_glm::Vec3;

/// A single precision ray as seen by the acceleration structure. It starts at pos and goes along
/// dir. The direction is not required to be normalized.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// The start position of the ray
    pub pos: Vec3,

    /// The direction of the ray.
    pub dir: Vec3,
}

impl Ray {
    /// Creates a new ray from the given start position and direction.
    ///
    /// # Arguments
    /// * `pos` - The start position of the ray
    /// * `dir` - The direction of the ray.
    pub fn new(pos: Vec3, dir: Vec3) -> Self {
        Self { pos, dir }
    }
}
