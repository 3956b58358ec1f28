use std::collections::BTreeMap;

use log::{debug, info};

use crate::{DPointQuery, DRay, DRayHit, Error, Result};

use super::{BVHOptions, Builder, UserGeometry, BVH};

/// A geometry registered with the acceleration scene.
struct AttachedGeometry<'g> {
    geometry: &'g dyn UserGeometry,

    /// The acceleration structure, available after the scene has been committed.
    bvh: Option<BVH>,
}

/// A registry of user geometries and their acceleration structures.
///
/// Geometries are attached under their geometry id and become visible to queries once the scene
/// has been committed. The scene only borrows the geometries, hence they cannot be modified while
/// the scene is alive.
pub struct AccelerationScene<'g> {
    geometries: BTreeMap<u32, AttachedGeometry<'g>>,
    options: BVHOptions,
}

impl<'g> AccelerationScene<'g> {
    /// Creates a new empty scene.
    ///
    /// # Arguments
    /// * `options` - The options for building the acceleration structures.
    pub fn new(options: BVHOptions) -> Self {
        Self {
            geometries: BTreeMap::new(),
            options,
        }
    }

    /// Attaches the given geometry under its geometry id and returns the id.
    ///
    /// # Arguments
    /// * `geometry` - The geometry to attach.
    pub fn attach(&mut self, geometry: &'g dyn UserGeometry) -> Result<u32> {
        let geom_id = geometry.geometry_id();
        if self.geometries.contains_key(&geom_id) {
            return Err(Error::DuplicateGeometryId(geom_id));
        }

        self.geometries.insert(
            geom_id,
            AttachedGeometry {
                geometry,
                bvh: None,
            },
        );

        Ok(geom_id)
    }

    /// Detaches the geometry with the given id.
    ///
    /// # Arguments
    /// * `geom_id` - The id of the geometry to detach.
    pub fn detach(&mut self, geom_id: u32) -> Result<()> {
        match self.geometries.remove(&geom_id) {
            Some(_) => Ok(()),
            None => Err(Error::UnknownGeometryId(geom_id)),
        }
    }

    /// Returns the geometry attached under the given id.
    ///
    /// # Arguments
    /// * `geom_id` - The id of the geometry.
    pub fn get_geometry(&self, geom_id: u32) -> Option<&'g dyn UserGeometry> {
        self.geometries.get(&geom_id).map(|g| g.geometry)
    }

    /// Returns the number of attached geometries.
    pub fn num_geometries(&self) -> usize {
        self.geometries.len()
    }

    /// Builds the acceleration structures for all geometries that have been attached since the
    /// last commit.
    pub fn commit(&mut self) {
        for (geom_id, attached) in self.geometries.iter_mut() {
            if attached.bvh.is_some() {
                continue;
            }

            let geometry = attached.geometry;
            let volumes: Vec<_> = (0..geometry.num_primitives() as u32)
                .map(|prim_id| geometry.bounds(prim_id))
                .collect();

            debug!(
                "Building BVH for geometry {} with {} primitives...",
                geom_id,
                volumes.len()
            );

            let builder = Builder::new(self.options);
            attached.bvh = Some(builder.build(&volumes));
        }

        info!("Committed scene with {} geometries", self.geometries.len());
    }

    /// Finds the closest hit of the ray with all committed geometries. The result is written
    /// into the hit record and the ray length, after the geometry of the hit had the chance to
    /// reject it.
    ///
    /// # Arguments
    /// * `rayhit` - The ray and hit record of the query.
    pub fn intersect1(&self, rayhit: &mut DRayHit) {
        let ray = rayhit.ray.float_ray();

        for attached in self.geometries.values() {
            if let Some(bvh) = attached.bvh.as_ref() {
                let geometry = attached.geometry;
                bvh.traverse_ray(&ray, rayhit.ray.tfar(), |prim_id| {
                    geometry.intersect(prim_id, rayhit);
                    rayhit.ray.tfar()
                });
            }
        }

        if let Some(attached) = self.geometries.get(&rayhit.hit.geom_id()) {
            attached.geometry.filter(rayhit);
        }
    }

    /// Returns true if the ray is blocked by any committed geometry. An occluded ray has its
    /// length collapsed to negative infinity.
    ///
    /// # Arguments
    /// * `ray` - The ray of the query.
    pub fn occluded1(&self, ray: &mut DRay) -> bool {
        let float_ray = ray.float_ray();

        for attached in self.geometries.values() {
            if let Some(bvh) = attached.bvh.as_ref() {
                let geometry = attached.geometry;
                bvh.traverse_ray(&float_ray, ray.tfar(), |prim_id| {
                    geometry.occluded(prim_id, ray);
                    ray.tfar()
                });
            }

            if ray.is_exhausted() {
                return true;
            }
        }

        false
    }

    /// Finds the primitive closest to the query location within the query radius. Returns true
    /// if any primitive updated the query.
    ///
    /// # Arguments
    /// * `query` - The point query.
    pub fn point_query(&self, query: &mut DPointQuery) -> bool {
        let point = *query.point();
        let mut improved = false;

        for attached in self.geometries.values() {
            if let Some(bvh) = attached.bvh.as_ref() {
                let geometry = attached.geometry;
                bvh.traverse_point(&point, query.radius(), |prim_id| {
                    improved |= geometry.point_query(prim_id, query);
                    query.radius()
                });
            }
        }

        improved
    }
}

impl Default for AccelerationScene<'_> {
    fn default() -> Self {
        Self::new(BVHOptions::default())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::{RayFireType, Sense, TriangleGeometry, TriangleMesh};

    #[test]
    fn test_attach_and_detach() {
        let mesh = TriangleMesh::cube(1.0);
        let a = TriangleGeometry::new(3, &mesh, 0..12, Sense::Forward);
        let b = TriangleGeometry::new(3, &mesh, 0..12, Sense::Reverse);

        let mut scene = AccelerationScene::default();
        assert_eq!(scene.attach(&a).unwrap(), 3);
        assert!(matches!(scene.attach(&b), Err(Error::DuplicateGeometryId(3))));
        assert_eq!(scene.num_geometries(), 1);
        assert_eq!(scene.get_geometry(3).map(|g| g.num_primitives()), Some(12));

        scene.detach(3).unwrap();
        assert!(matches!(scene.detach(3), Err(Error::UnknownGeometryId(3))));
        assert!(scene.get_geometry(3).is_none());
        assert_eq!(scene.attach(&b).unwrap(), 3);
    }

    #[test]
    fn test_uncommitted_geometries_are_invisible() {
        let mesh = TriangleMesh::cube(2.0);
        let geometry = TriangleGeometry::new(0, &mesh, 0..12, Sense::Reverse);

        let mut scene = AccelerationScene::default();
        scene.attach(&geometry).unwrap();

        let ray = DRay::new([0.0; 3], [0.0, 0.0, 1.0], 100.0, RayFireType::RayFire);
        let mut rayhit = DRayHit::new(ray.clone());
        scene.intersect1(&mut rayhit);
        assert!(rayhit.hit().is_none());

        scene.commit();
        let mut rayhit = DRayHit::new(ray);
        scene.intersect1(&mut rayhit);

        let hit = rayhit.hit().unwrap();
        assert_eq!(hit.geom_id, 0);
        assert!((hit.distance - 1.0).abs() < 1e-12);
        assert_eq!(hit.normal, nalgebra_glm::DVec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_closest_hit_over_multiple_geometries() {
        let small = TriangleMesh::cube(2.0);
        let large = TriangleMesh::cube(6.0);
        let inner = TriangleGeometry::new(1, &small, 0..12, Sense::Reverse);
        let outer = TriangleGeometry::new(0, &large, 0..12, Sense::Reverse);

        let mut scene = AccelerationScene::default();
        scene.attach(&outer).unwrap();
        scene.attach(&inner).unwrap();
        scene.commit();

        let ray = DRay::new([0.1, 0.2, 0.0], [-1.0, 0.0, 0.0], 100.0, RayFireType::RayFire);
        let mut rayhit = DRayHit::new(ray);
        scene.intersect1(&mut rayhit);

        let hit = rayhit.hit().unwrap();
        assert_eq!(hit.geom_id, 1);
        assert!((hit.distance - 1.1).abs() < 1e-12);

        // starting between the cubes, the near face of the inner cube is entered from its back
        let ray = DRay::new([2.0, 0.2, 0.1], [-1.0, 0.0, 0.0], 100.0, RayFireType::RayFire);
        let mut rayhit = DRayHit::new(ray);
        scene.intersect1(&mut rayhit);

        let hit = rayhit.hit().unwrap();
        assert_eq!(hit.geom_id, 1);
        assert!((hit.distance - 3.0).abs() < 1e-12);

        let ray = DRay::new([2.0, 0.2, 0.1], [1.0, 0.0, 0.0], 100.0, RayFireType::RayFire);
        let mut rayhit = DRayHit::new(ray);
        scene.intersect1(&mut rayhit);

        let hit = rayhit.hit().unwrap();
        assert_eq!(hit.geom_id, 0);
        assert!((hit.distance - 1.0).abs() < 1e-12);
    }
}
