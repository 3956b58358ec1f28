//! The callbacks the acceleration structure invokes for double precision triangle primitives.
//!
//! Each function is called once per (query, candidate primitive) pair in an order chosen by the
//! acceleration structure. A candidate only replaces the current hit if it is strictly closer,
//! so the final hit does not depend on the visiting order.

use nalgebra_glm::DVec3;

use crate::{
    math::{closest_point_on_triangle, ray_triangle_intersect, AABB},
    primitive::{DblTri, MeshAccess, Sense},
    spatial::UserGeometry,
    DPointQuery, DRay, DRayHit, RayFireType,
};

/// Returns the bounding box of the primitive, rounded outwards to single precision.
///
/// # Arguments
/// * `tris` - The primitives of the geometry.
/// * `prim_id` - The id of the primitive.
pub fn bounds<M: MeshAccess>(tris: &[DblTri<'_, M>], prim_id: u32) -> AABB {
    let vertices = tris[prim_id as usize].vertices();
    AABB::from_dvec_iter(vertices.iter())
}

/// Decides whether a hit with the given normal counts for the query kind.
/// Ray fire queries only accept hits where the ray and the normal point in opposite directions,
/// point in volume queries accept every crossing.
///
/// # Arguments
/// * `rf_type` - The kind of query.
/// * `direction` - The double precision ray direction.
/// * `normal` - The sense corrected normal of the hit primitive.
#[inline]
pub fn accepts_hit(rf_type: RayFireType, direction: &DVec3, normal: &DVec3) -> bool {
    match rf_type {
        RayFireType::RayFire => direction.dot(normal) < 0.0,
        RayFireType::PointInVolume => true,
    }
}

/// Applies the orientation policy of the ray's query kind to the current hit. A rejected hit is
/// reset to the invalid geometry id.
///
/// # Arguments
/// * `rayhit` - The ray and the hit to filter.
pub fn intersection_filter(rayhit: &mut DRayHit) {
    if !rayhit.hit.is_valid() {
        return;
    }

    if !accepts_hit(rayhit.ray.rf_type(), rayhit.ray.ddir(), rayhit.hit.dng()) {
        rayhit.hit.invalidate();
    }
}

/// Intersects the ray with the primitive and commits the hit if it is strictly closer than the
/// current one and passes the orientation filter. Otherwise the ray and the hit stay untouched.
///
/// # Arguments
/// * `tris` - The primitives of the geometry.
/// * `prim_id` - The id of the primitive.
/// * `rayhit` - The ray and the current hit of the query.
pub fn intersect<M: MeshAccess>(tris: &[DblTri<'_, M>], prim_id: u32, rayhit: &mut DRayHit) {
    let tri = &tris[prim_id as usize];
    let vertices = tri.vertices();

    let ray = &rayhit.ray;
    let hit = match ray_triangle_intersect(
        ray.dorg(),
        ray.ddir(),
        &vertices,
        tri.sense,
        ray.dtfar(),
    ) {
        Some(hit) => hit,
        None => return,
    };

    // ties keep the existing hit
    if hit.distance >= ray.dtfar() {
        return;
    }

    if !accepts_hit(ray.rf_type(), ray.ddir(), &hit.normal) {
        return;
    }

    rayhit.ray.set_len(hit.distance);
    rayhit.hit.set(tri.geom_id, prim_id, hit.normal);
}

/// Tests whether the primitive blocks the ray. If so, the ray length is collapsed to negative
/// infinity which tells the acceleration structure to stop the traversal.
///
/// # Arguments
/// * `tris` - The primitives of the geometry.
/// * `prim_id` - The id of the primitive.
/// * `ray` - The ray of the query.
pub fn occluded<M: MeshAccess>(tris: &[DblTri<'_, M>], prim_id: u32, ray: &mut DRay) {
    let tri = &tris[prim_id as usize];
    let vertices = tri.vertices();

    if ray_triangle_intersect(
        ray.dorg(),
        ray.ddir(),
        &vertices,
        tri.sense,
        ray.dtfar(),
    )
    .is_some()
    {
        ray.set_len(f64::NEG_INFINITY);
    }
}

/// Computes the distance between the query location and the primitive and records the primitive
/// if it is strictly closer than the current search radius. Returns true if the query has been
/// updated, i.e., the search radius has shrunk.
///
/// # Arguments
/// * `tris` - The primitives of the geometry.
/// * `geom_id` - The id of the geometry the primitives are registered under.
/// * `prim_id` - The id of the primitive.
/// * `query` - The point query.
pub fn point_query<M: MeshAccess>(
    tris: &[DblTri<'_, M>],
    geom_id: u32,
    prim_id: u32,
    query: &mut DPointQuery,
) -> bool {
    let vertices = tris[prim_id as usize].vertices();
    let (_, distance) = closest_point_on_triangle(query.dpoint(), &vertices);

    query.shrink_radius(distance, prim_id, geom_id)
}

/// A geometry made of double precision triangles of a single mesh.
pub struct TriangleGeometry<'m, M: MeshAccess> {
    geom_id: u32,
    tris: Vec<DblTri<'m, M>>,
}

impl<'m, M: MeshAccess> TriangleGeometry<'m, M> {
    /// Creates a new geometry from the given triangle handles.
    ///
    /// # Arguments
    /// * `geom_id` - The id under which the geometry is registered.
    /// * `mesh` - The mesh the triangles belong to.
    /// * `handles` - The handles of the triangles. The primitive ids are their positions.
    /// * `sense` - The orientation of all triangles w.r.t. the geometry.
    pub fn new<I>(geom_id: u32, mesh: &'m M, handles: I, sense: Sense) -> Self
    where
        I: IntoIterator<Item = M::Handle>,
    {
        let tris = handles
            .into_iter()
            .map(|handle| DblTri::new(mesh, handle, sense, geom_id))
            .collect();

        Self { geom_id, tris }
    }

    /// Returns the triangle primitives of the geometry indexed by their primitive id.
    #[inline]
    pub fn primitives(&self) -> &[DblTri<'m, M>] {
        &self.tris
    }
}

impl<M: MeshAccess> UserGeometry for TriangleGeometry<'_, M> {
    #[inline]
    fn geometry_id(&self) -> u32 {
        self.geom_id
    }

    #[inline]
    fn num_primitives(&self) -> usize {
        self.tris.len()
    }

    fn bounds(&self, prim_id: u32) -> AABB {
        bounds(&self.tris, prim_id)
    }

    fn intersect(&self, prim_id: u32, rayhit: &mut DRayHit) {
        intersect(&self.tris, prim_id, rayhit)
    }

    fn occluded(&self, prim_id: u32, ray: &mut DRay) {
        occluded(&self.tris, prim_id, ray)
    }

    fn point_query(&self, prim_id: u32, query: &mut DPointQuery) -> bool {
        point_query(&self.tris, self.geom_id, prim_id, query)
    }

    fn filter(&self, rayhit: &mut DRayHit) {
        intersection_filter(rayhit)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;

    use crate::{mesh::TriangleMesh, spatial::AccelerationScene, INVALID_GEOMETRY_ID};

    /// Three parallel squares at x = 1, 2 and 3, each made of two triangles, with normals along +x.
    fn parallel_walls() -> TriangleMesh {
        let mut mesh = TriangleMesh::default();
        for x in [3.0, 1.0, 2.0] {
            let base = mesh.vertices.len() as u32;
            mesh.vertices.extend([
                DVec3::new(x, -1.0, -1.0),
                DVec3::new(x, 1.0, -1.0),
                DVec3::new(x, 1.0, 1.0),
                DVec3::new(x, -1.0, 1.0),
            ]);
            mesh.triangles.push([base, base + 1, base + 2]);
            mesh.triangles.push([base, base + 2, base + 3]);
        }

        mesh
    }

    fn fire(ray_fire_type: RayFireType, dir: [f64; 3]) -> DRayHit {
        DRayHit::new(DRay::new([0.1, 0.2, 0.3], dir, 1000.0, ray_fire_type))
    }

    #[test]
    fn test_bounds() {
        let mesh = parallel_walls();
        let geometry = TriangleGeometry::new(0, &mesh, 0..mesh.n_elements() as u32, Sense::Forward);

        let aabb = bounds(geometry.primitives(), 2);
        assert_eq!(aabb.min, nalgebra_glm::vec3(1.0, -1.0, -1.0));
        assert_eq!(aabb.max, nalgebra_glm::vec3(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_intersect_commits_closest_hit_in_any_order() {
        let mesh = parallel_walls();
        let geometry =
            TriangleGeometry::new(4, &mesh, 0..mesh.n_elements() as u32, Sense::Reverse);
        let tris = geometry.primitives();

        let mut r = ChaCha8Rng::seed_from_u64(5);
        let mut order: Vec<u32> = (0..tris.len() as u32).collect();

        for _ in 0..20 {
            order.shuffle(&mut r);

            let mut rayhit = fire(RayFireType::RayFire, [1.0, 0.0, 0.0]);
            for prim_id in order.iter() {
                intersect(tris, *prim_id, &mut rayhit);
            }

            let hit = rayhit.hit().unwrap();
            assert_eq!(hit.geom_id, 4);
            assert!(hit.prim_id == 2 || hit.prim_id == 3);
            assert!((hit.distance - 0.9).abs() < 1e-12);
            assert!((hit.normal - DVec3::new(-1.0, 0.0, 0.0)).norm() < 1e-15);
            assert_eq!(rayhit.ray.tfar(), hit.distance as f32);
        }
    }

    #[test]
    fn test_intersect_miss_keeps_current_hit() {
        let mesh = parallel_walls();
        let geometry =
            TriangleGeometry::new(0, &mesh, 0..mesh.n_elements() as u32, Sense::Reverse);
        let tris = geometry.primitives();

        let mut rayhit = fire(RayFireType::RayFire, [1.0, 0.0, 0.0]);
        intersect(tris, 1, &mut rayhit);
        let before = rayhit.hit().unwrap();
        assert!((before.distance - 2.9).abs() < 1e-12);

        // the other triangle of the same wall is missed, the same triangle again is a tie
        intersect(tris, 0, &mut rayhit);
        intersect(tris, 1, &mut rayhit);
        assert_eq!(rayhit.hit(), Some(before));
        assert_eq!(rayhit.hit.prim_id(), 1);
    }

    #[test]
    fn test_intersect_rejects_farther_hits() {
        let mesh = parallel_walls();
        let geometry =
            TriangleGeometry::new(0, &mesh, 0..mesh.n_elements() as u32, Sense::Reverse);
        let tris = geometry.primitives();

        let mut rayhit = fire(RayFireType::RayFire, [1.0, 0.0, 0.0]);
        rayhit.ray.set_len(0.5);
        for prim_id in 0..tris.len() as u32 {
            intersect(tris, prim_id, &mut rayhit);
        }

        assert!(rayhit.hit().is_none());
        assert_eq!(rayhit.ray.dtfar(), 0.5);
    }

    #[test]
    fn test_orientation_filter_per_query_kind() {
        let mesh = parallel_walls();

        // forward sense: normals along +x, i.e., along the ray direction
        let geometry =
            TriangleGeometry::new(0, &mesh, 0..mesh.n_elements() as u32, Sense::Forward);
        let tris = geometry.primitives();

        let mut rayhit = fire(RayFireType::RayFire, [1.0, 0.0, 0.0]);
        for prim_id in 0..tris.len() as u32 {
            intersect(tris, prim_id, &mut rayhit);
        }
        assert!(rayhit.hit().is_none());
        assert_eq!(rayhit.ray.dtfar(), 1000.0);

        let mut rayhit = fire(RayFireType::PointInVolume, [1.0, 0.0, 0.0]);
        for prim_id in 0..tris.len() as u32 {
            intersect(tris, prim_id, &mut rayhit);
        }
        let hit = rayhit.hit().unwrap();
        assert!((hit.distance - 0.9).abs() < 1e-12);
        assert!(rayhit.dot_prod() > 0.0);
    }

    #[test]
    fn test_intersection_filter() {
        let mut rayhit = fire(RayFireType::RayFire, [1.0, 0.0, 0.0]);

        rayhit.hit.set(1, 2, DVec3::new(1.0, 0.0, 0.0));
        intersection_filter(&mut rayhit);
        assert_eq!(rayhit.hit.geom_id(), INVALID_GEOMETRY_ID);

        // perpendicular hits are rejected as well
        rayhit.hit.set(1, 2, DVec3::new(0.0, 1.0, 0.0));
        intersection_filter(&mut rayhit);
        assert_eq!(rayhit.hit.geom_id(), INVALID_GEOMETRY_ID);

        rayhit.hit.set(1, 2, DVec3::new(-1.0, 0.0, 0.0));
        intersection_filter(&mut rayhit);
        assert_eq!(rayhit.hit.geom_id(), 1);

        rayhit.ray.set_rf_type(RayFireType::PointInVolume);
        rayhit.hit.set(1, 2, DVec3::new(1.0, 0.0, 0.0));
        intersection_filter(&mut rayhit);
        assert_eq!(rayhit.hit.geom_id(), 1);
    }

    #[test]
    fn test_occluded() {
        let mesh = parallel_walls();
        let geometry =
            TriangleGeometry::new(0, &mesh, 0..mesh.n_elements() as u32, Sense::Forward);
        let tris = geometry.primitives();

        // orientation does not matter for occlusion
        let mut ray = DRay::new([0.1, 0.2, 0.3], [1.0, 0.0, 0.0], 1000.0, RayFireType::RayFire);
        // the first triangle of the far wall is missed, the second one blocks the ray
        occluded(tris, 0, &mut ray);
        assert!(!ray.is_exhausted());
        assert_eq!(ray.dtfar(), 1000.0);
        occluded(tris, 1, &mut ray);
        assert!(ray.is_exhausted());
        assert_eq!(ray.tfar(), f32::NEG_INFINITY);

        // an exhausted ray stays exhausted
        occluded(tris, 4, &mut ray);
        assert_eq!(ray.dtfar(), f64::NEG_INFINITY);

        // walls beyond the ray length do not occlude
        let mut ray = DRay::new([0.1, 0.2, 0.3], [1.0, 0.0, 0.0], 0.5, RayFireType::RayFire);
        for prim_id in 0..tris.len() as u32 {
            occluded(tris, prim_id, &mut ray);
        }
        assert!(!ray.is_exhausted());
    }

    #[test]
    fn test_point_query() {
        let mesh = parallel_walls();
        let geometry =
            TriangleGeometry::new(7, &mesh, 0..mesh.n_elements() as u32, Sense::Forward);
        let tris = geometry.primitives();

        let mut query = DPointQuery::new([1.4, 0.2, 0.3], 10.0);
        let mut order: Vec<u32> = (0..tris.len() as u32).collect();
        order.reverse();

        for prim_id in order {
            point_query(tris, 7, prim_id, &mut query);
        }

        // the projection onto the wall at x = 1 lies inside its second triangle
        let closest = query.closest().unwrap();
        assert_eq!(closest.geom_id, 7);
        assert_eq!(closest.prim_id, 3);
        assert!((closest.distance - 0.4).abs() < 1e-12);

        // a radius smaller than the distance to any triangle leaves the query untouched
        let mut query = DPointQuery::new([1.4, 0.2, 0.3], 0.25);
        for prim_id in 0..tris.len() as u32 {
            assert!(!point_query(tris, 7, prim_id, &mut query));
        }
        assert_eq!(query.dradius(), 0.25);
        assert_eq!(query.prim_id(), INVALID_GEOMETRY_ID);
        assert_eq!(query.geom_id(), INVALID_GEOMETRY_ID);
    }

    #[test]
    fn test_unit_sphere_ray_fire() {
        let mesh = TriangleMesh::uv_sphere(1.0, 64, 32);
        let outward = TriangleGeometry::new(0, &mesh, 0..mesh.n_elements() as u32, Sense::Forward);
        let inward = TriangleGeometry::new(1, &mesh, 0..mesh.n_elements() as u32, Sense::Reverse);

        let mut scene = AccelerationScene::default();
        scene.attach(&inward).unwrap();
        scene.commit();

        // from the center, the reversed sphere faces the ray
        let mut rayhit = fire(RayFireType::RayFire, [1.0, 0.0, 0.0]);
        rayhit.ray.set_org([0.0, 0.0, 0.0]);
        scene.intersect1(&mut rayhit);

        let hit = rayhit.hit().unwrap();
        assert_eq!(hit.geom_id, 1);
        assert!((hit.distance - 1.0).abs() < 1e-2);
        assert!((hit.normal - DVec3::new(-1.0, 0.0, 0.0)).norm() < 0.15);
        assert!(rayhit.dot_prod() < 0.0);

        // the outward facing sphere is crossed from the back and rejected
        let mut scene = AccelerationScene::default();
        scene.attach(&outward).unwrap();
        scene.commit();

        let mut rayhit = fire(RayFireType::RayFire, [1.0, 0.0, 0.0]);
        rayhit.ray.set_org([0.0, 0.0, 0.0]);
        scene.intersect1(&mut rayhit);
        assert!(rayhit.hit().is_none());
        assert_eq!(rayhit.hit.prim_id(), INVALID_GEOMETRY_ID);
    }

    #[test]
    fn test_unit_sphere_point_in_volume_counts_back_faces() {
        let mesh = TriangleMesh::uv_sphere(1.0, 64, 32);
        let inward = TriangleGeometry::new(0, &mesh, 0..mesh.n_elements() as u32, Sense::Reverse);

        let mut scene = AccelerationScene::default();
        scene.attach(&inward).unwrap();
        scene.commit();

        // fired from outside, the first crossing has its normal along the ray
        let ray = DRay::new(
            [-5.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            1000.0,
            RayFireType::PointInVolume,
        );
        let mut rayhit = DRayHit::new(ray);
        scene.intersect1(&mut rayhit);

        let hit = rayhit.hit().unwrap();
        assert!((hit.distance - 4.0).abs() < 1e-2);
        assert!(rayhit.dot_prod() >= 0.0);

        // the same ray as ray fire query skips the back face and exits on the far side
        let ray = DRay::new([-5.0, 0.0, 0.0], [1.0, 0.0, 0.0], 1000.0, RayFireType::RayFire);
        let mut rayhit = DRayHit::new(ray);
        scene.intersect1(&mut rayhit);

        let hit = rayhit.hit().unwrap();
        assert!((hit.distance - 6.0).abs() < 1e-2);
        assert!(rayhit.dot_prod() < 0.0);
    }

    #[test]
    fn test_occlusion_through_scene() {
        let mesh = TriangleMesh::uv_sphere(1.0, 32, 16);
        let geometry = TriangleGeometry::new(0, &mesh, 0..mesh.n_elements() as u32, Sense::Forward);

        let mut scene = AccelerationScene::default();
        scene.attach(&geometry).unwrap();
        scene.commit();

        let mut r = ChaCha8Rng::seed_from_u64(6);
        for _ in 0..100 {
            let dir = DVec3::new(
                r.random_range(-1.0..1.0),
                r.random_range(-1.0..1.0),
                r.random_range(-1.0..1.0),
            )
            .normalize();

            let mut ray = DRay::new([0.0; 3], dir, 1000.0, RayFireType::RayFire);
            assert!(scene.occluded1(&mut ray));
            assert!(ray.is_exhausted());
        }

        // a ray pointing away from the sphere is not occluded
        let mut ray = DRay::new([5.0, 0.0, 0.0], [1.0, 0.0, 0.0], 1000.0, RayFireType::RayFire);
        assert!(!scene.occluded1(&mut ray));
        assert_eq!(ray.dtfar(), 1000.0);
    }

    #[test]
    fn test_point_query_through_scene() {
        let mesh = TriangleMesh::cube(2.0);
        let geometry = TriangleGeometry::new(3, &mesh, 0..mesh.n_elements() as u32, Sense::Forward);

        let mut scene = AccelerationScene::default();
        scene.attach(&geometry).unwrap();
        scene.commit();

        let mut query = DPointQuery::new([0.0, 0.0, 0.5], f64::INFINITY);
        assert!(scene.point_query(&mut query));
        let closest = query.closest().unwrap();
        assert_eq!(closest.geom_id, 3);
        assert!((closest.distance - 0.5).abs() < 1e-12);

        // radius too small to reach any face
        let mut query = DPointQuery::new([0.0, 0.0, 0.0], 0.5);
        assert!(!scene.point_query(&mut query));
        assert!(query.closest().is_none());
        assert_eq!(query.dradius(), 0.5);
    }

    #[test]
    fn test_sphere_far_from_the_origin() {
        for offset in [1e4, 1e6] {
            let center = DVec3::new(offset, -offset, offset);
            let mut mesh = TriangleMesh::uv_sphere(1.0, 32, 16);
            for v in mesh.vertices.iter_mut() {
                *v += center;
            }

            let geometry =
                TriangleGeometry::new(0, &mesh, 0..mesh.n_elements() as u32, Sense::Reverse);

            let mut scene = AccelerationScene::default();
            scene.attach(&geometry).unwrap();
            scene.commit();

            let mut r = ChaCha8Rng::seed_from_u64(8);
            for _ in 0..500 {
                let dir = DVec3::new(
                    r.random_range(-1.0..1.0),
                    r.random_range(-1.0..1.0),
                    r.random_range(-1.0..1.0),
                )
                .normalize();

                let ray = DRay::new(center, dir, 1000.0, RayFireType::RayFire);
                let mut rayhit = DRayHit::new(ray.clone());
                scene.intersect1(&mut rayhit);

                let hit = rayhit.hit().unwrap();
                assert!(hit.distance > 0.97 && hit.distance <= 1.0 + 1e-9);
                assert!(rayhit.dot_prod() < 0.0);

                let mut ray = ray;
                assert!(scene.occluded1(&mut ray));
            }
        }
    }

    #[test]
    fn test_concurrent_queries_share_geometry() {
        let mesh = TriangleMesh::uv_sphere(2.0, 32, 16);
        let geometry = TriangleGeometry::new(0, &mesh, 0..mesh.n_elements() as u32, Sense::Reverse);

        let mut scene = AccelerationScene::default();
        scene.attach(&geometry).unwrap();
        scene.commit();

        let scene = &scene;
        std::thread::scope(|s| {
            for i in 0..4 {
                s.spawn(move || {
                    let mut r = ChaCha8Rng::seed_from_u64(100 + i);
                    for _ in 0..100 {
                        let dir = DVec3::new(
                            r.random_range(-1.0..1.0),
                            r.random_range(-1.0..1.0),
                            r.random_range(-1.0..1.0),
                        )
                        .normalize();

                        let ray = DRay::new([0.0; 3], dir, 1000.0, RayFireType::RayFire);
                        let mut rayhit = DRayHit::new(ray);
                        scene.intersect1(&mut rayhit);

                        let hit = rayhit.hit().unwrap();
                        assert!((hit.distance - 2.0).abs() < 0.05);
                    }
                });
            }
        });
    }
}
