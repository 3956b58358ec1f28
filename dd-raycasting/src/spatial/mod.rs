//! A single precision reference engine for ray queries against user defined geometries.
//!
//! The engine only knows the bounding boxes of the primitives. Everything that needs the actual
//! shape of a primitive is delegated to the callbacks of the [`UserGeometry`] the primitive
//! belongs to. The engine decides the traversal order, the callbacks decide what a hit is.

mod bvh;
mod scene;

pub use bvh::*;
pub use scene::*;

use std::ops::Range;

use crate::{
    math::{Ray, AABB},
    DPointQuery, DRay, DRayHit,
};

/// The callbacks of a geometry with user defined primitives. Every primitive is identified by a
/// dense id in `0..num_primitives()`.
///
/// The engine invokes the callbacks concurrently for independent queries, hence the geometry
/// must be safe to share between threads. The query records passed into the callbacks are
/// exclusively owned by the query.
pub trait UserGeometry: Sync {
    /// Returns the id under which the geometry is registered.
    fn geometry_id(&self) -> u32;

    /// Returns the number of primitives of the geometry.
    fn num_primitives(&self) -> usize;

    /// Returns the bounding box of the given primitive.
    ///
    /// # Arguments
    /// * `prim_id` - The id of the primitive.
    fn bounds(&self, prim_id: u32) -> AABB;

    /// Intersects the ray with the given primitive and updates the ray hit if the primitive is
    /// a closer, accepted hit.
    ///
    /// # Arguments
    /// * `prim_id` - The id of the primitive.
    /// * `rayhit` - The ray and the current hit of the query.
    fn intersect(&self, prim_id: u32, rayhit: &mut DRayHit);

    /// Tests the ray against the given primitive and collapses the ray length to negative
    /// infinity if the primitive blocks the ray.
    ///
    /// # Arguments
    /// * `prim_id` - The id of the primitive.
    /// * `ray` - The ray of the query.
    fn occluded(&self, prim_id: u32, ray: &mut DRay);

    /// Computes the distance between the query location and the given primitive and updates the
    /// query if the primitive is closer. Returns true if the search radius has been shrunk.
    ///
    /// # Arguments
    /// * `prim_id` - The id of the primitive.
    /// * `query` - The point query.
    fn point_query(&self, prim_id: u32, query: &mut DPointQuery) -> bool;

    /// Inspects the final hit of a ray query that ended on this geometry and may reject it by
    /// invalidating the hit. Does nothing by default.
    ///
    /// # Arguments
    /// * `rayhit` - The ray and its final hit.
    fn filter(&self, rayhit: &mut DRayHit) {
        let _ = rayhit;
    }
}

pub trait HierarchicalNode: Sized {
    /// The type of the bounding volume used by the node.
    type Volume: RayIntersectionTest;

    /// Returns the range of the children of the node within the nodes array.
    fn children(&self) -> Range<usize>;

    /// Returns the range of the objects that are stored in the node.
    fn objects(&self) -> Range<usize>;

    /// Returns the bounding volume of the node.
    fn bounding_volume(&self) -> &Self::Volume;

    /// Tests the children of the node for intersection with the ray.
    /// The function returns the number of children that intersect with the ray.
    /// The indices of the children that intersect with the ray are stored in the
    /// children_indices vector ordered by the distance to the ray origin.
    ///
    /// # Arguments
    /// * `ray` - The ray to test the intersection with.
    /// * `children_indices` - Reference for reusing the children indices vector.
    /// * `nodes` - The nodes of the hierarchical index.
    /// * `max_depth` - Optionally, a value can be provided to limit the intersection. This value
    ///                 usually comes previous intersection tests and can be used to reduce the
    ///                 search space.
    fn intersect_children(
        &self,
        ray: &Ray,
        children_indices: &mut [usize],
        nodes: &[Self],
        max_depth: Option<f32>,
    ) -> usize;
}

/// A trait to enable intersection tests with rays.
pub trait RayIntersectionTest {
    /// Tests the intersection of the ray with the object.
    /// Returns the distance to the intersection point if the ray intersects
    /// with the object, otherwise None.
    ///
    /// # Arguments
    /// * `ray` - The ray to test the intersection with.
    /// * `max_depth` - Optionally, a value can be provided to limit the intersection. This value
    ///             usually comes previous intersection tests and can be used to reduce the
    ///             search space.
    fn intersects_ray(&self, ray: &Ray, max_depth: Option<f32>) -> Option<f32>;
}
