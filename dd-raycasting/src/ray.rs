//! Double precision extensions of the single precision ray, hit and point query records.
//!
//! The acceleration structure only reads and updates the single precision fields, while the
//! triangle callbacks work exclusively on the double precision ones. All fields are private and
//! every setter writes both representations, so they can never drift apart.

use nalgebra_glm::{DVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::math::{to_vec3, Ray};

/// The id used for geometries and primitives to express that nothing has been hit (yet).
pub const INVALID_GEOMETRY_ID: u32 = u32::MAX;

/// The kind of query a ray is fired for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RayFireType {
    /// Oriented boundary crossing, i.e., only hits on the front side of a surface count.
    #[default]
    RayFire,

    /// Membership testing, i.e., every crossing counts regardless of its orientation.
    PointInVolume,
}

/// A committed ray hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// The id of the geometry that has been hit.
    pub geom_id: u32,

    /// The id of the primitive that has been hit.
    pub prim_id: u32,

    /// The distance along the ray direction.
    pub distance: f64,

    /// The sense corrected unit normal of the hit primitive.
    pub normal: DVec3,
}

/// The nearest primitive found by a point query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPrimitive {
    /// The id of the geometry of the nearest primitive.
    pub geom_id: u32,

    /// The id of the nearest primitive.
    pub prim_id: u32,

    /// The distance between the query location and the primitive.
    pub distance: f64,
}

/// A ray with double precision versions of the origin, direction and length.
#[derive(Debug, Clone)]
pub struct DRay {
    org: Vec3,
    dir: Vec3,
    tfar: f32,

    dorg: DVec3,
    ddir: DVec3,
    dtfar: f64,

    rf_type: RayFireType,
}

impl DRay {
    /// Creates a new ray with the given origin, direction and length.
    ///
    /// # Arguments
    /// * `org` - The origin of the ray.
    /// * `dir` - The direction of the ray. Callers are expected to pass unit vectors.
    /// * `len` - The maximal length of the ray.
    /// * `rf_type` - The kind of query the ray is used for.
    pub fn new<O, D>(org: O, dir: D, len: f64, rf_type: RayFireType) -> Self
    where
        O: Into<DVec3>,
        D: Into<DVec3>,
    {
        let mut ray = Self::default();
        ray.set_org(org);
        ray.set_dir(dir);
        ray.set_len(len);
        ray.rf_type = rf_type;

        ray
    }

    /// Sets both the single and double precision versions of the ray origin.
    #[inline]
    pub fn set_org<O: Into<DVec3>>(&mut self, org: O) {
        self.dorg = org.into();
        self.org = to_vec3(&self.dorg);
    }

    /// Sets both the single and double precision versions of the ray direction.
    /// The length of the direction is not validated.
    #[inline]
    pub fn set_dir<D: Into<DVec3>>(&mut self, dir: D) {
        self.ddir = dir.into();
        self.dir = to_vec3(&self.ddir);
    }

    /// Sets both the single and double precision versions of the ray length.
    #[inline]
    pub fn set_len(&mut self, len: f64) {
        self.tfar = len as f32;
        self.dtfar = len;
    }

    /// Sets the kind of query the ray is used for.
    #[inline]
    pub fn set_rf_type(&mut self, rf_type: RayFireType) {
        self.rf_type = rf_type;
    }

    #[inline]
    pub fn org(&self) -> &Vec3 {
        &self.org
    }

    #[inline]
    pub fn dir(&self) -> &Vec3 {
        &self.dir
    }

    #[inline]
    pub fn tfar(&self) -> f32 {
        self.tfar
    }

    #[inline]
    pub fn dorg(&self) -> &DVec3 {
        &self.dorg
    }

    #[inline]
    pub fn ddir(&self) -> &DVec3 {
        &self.ddir
    }

    #[inline]
    pub fn dtfar(&self) -> f64 {
        self.dtfar
    }

    #[inline]
    pub fn rf_type(&self) -> RayFireType {
        self.rf_type
    }

    /// Returns true if the ray length has been collapsed by an occlusion test.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.dtfar < 0.0
    }

    /// Returns the single precision ray as seen by the acceleration structure.
    #[inline]
    pub fn float_ray(&self) -> Ray {
        Ray::new(self.org, self.dir)
    }
}

impl Default for DRay {
    fn default() -> Self {
        Self {
            org: Vec3::zeros(),
            dir: Vec3::zeros(),
            tfar: f32::INFINITY,
            dorg: DVec3::zeros(),
            ddir: DVec3::zeros(),
            dtfar: f64::INFINITY,
            rf_type: RayFireType::default(),
        }
    }
}

/// A ray hit with a double precision version of the primitive normal.
#[derive(Debug, Clone)]
pub struct DHit {
    geom_id: u32,
    prim_id: u32,

    /// Barycentric coordinates of the hit, always zero.
    u: f32,
    v: f32,

    ng: Vec3,
    dng: DVec3,
}

impl DHit {
    /// Sets the hit to the given primitive and its normal.
    ///
    /// # Arguments
    /// * `geom_id` - The id of the geometry that has been hit.
    /// * `prim_id` - The id of the primitive that has been hit.
    /// * `normal` - The double precision normal of the primitive.
    #[inline]
    pub fn set(&mut self, geom_id: u32, prim_id: u32, normal: DVec3) {
        self.geom_id = geom_id;
        self.prim_id = prim_id;
        self.u = 0.0;
        self.v = 0.0;
        self.dng = normal;
        self.ng = to_vec3(&normal);
    }

    /// Resets the hit to the invalid state.
    #[inline]
    pub fn invalidate(&mut self) {
        *self = Self::default();
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.geom_id != INVALID_GEOMETRY_ID
    }

    #[inline]
    pub fn geom_id(&self) -> u32 {
        self.geom_id
    }

    #[inline]
    pub fn prim_id(&self) -> u32 {
        self.prim_id
    }

    #[inline]
    pub fn uv(&self) -> (f32, f32) {
        (self.u, self.v)
    }

    #[inline]
    pub fn ng(&self) -> &Vec3 {
        &self.ng
    }

    #[inline]
    pub fn dng(&self) -> &DVec3 {
        &self.dng
    }
}

impl Default for DHit {
    fn default() -> Self {
        Self {
            geom_id: INVALID_GEOMETRY_ID,
            prim_id: INVALID_GEOMETRY_ID,
            u: 0.0,
            v: 0.0,
            ng: Vec3::zeros(),
            dng: DVec3::zeros(),
        }
    }
}

/// The ray and hit records passed together into a nearest hit query.
#[derive(Debug, Clone, Default)]
pub struct DRayHit {
    pub ray: DRay,
    pub hit: DHit,
}

impl DRayHit {
    /// Creates a new ray hit record for the given ray with an invalid hit.
    pub fn new(ray: DRay) -> Self {
        Self {
            ray,
            hit: DHit::default(),
        }
    }

    /// Computes the dot product of the ray direction and the current hit normal.
    #[inline]
    pub fn dot_prod(&self) -> f64 {
        self.ray.ddir.dot(&self.hit.dng)
    }

    /// Returns the committed hit or None if nothing has been hit.
    pub fn hit(&self) -> Option<Hit> {
        if !self.hit.is_valid() {
            return None;
        }

        Some(Hit {
            geom_id: self.hit.geom_id,
            prim_id: self.hit.prim_id,
            distance: self.ray.dtfar,
            normal: self.hit.dng,
        })
    }
}

/// A point query with double precision versions of the location and search radius.
#[derive(Debug, Clone)]
pub struct DPointQuery {
    point: Vec3,
    radius: f32,

    dpoint: DVec3,
    dradius: f64,

    prim_id: u32,
    geom_id: u32,
}

impl DPointQuery {
    /// Creates a new point query for the given location and radius.
    ///
    /// # Arguments
    /// * `point` - The query location.
    /// * `radius` - The initial search radius.
    pub fn new<P: Into<DVec3>>(point: P, radius: f64) -> Self {
        let mut query = Self::default();
        query.set_point(point);
        query.set_radius(radius);

        query
    }

    /// Sets both the single and double precision versions of the query location.
    #[inline]
    pub fn set_point<P: Into<DVec3>>(&mut self, point: P) {
        self.dpoint = point.into();
        self.point = to_vec3(&self.dpoint);
    }

    /// Sets both the single and double precision versions of the query radius.
    #[inline]
    pub fn set_radius(&mut self, radius: f64) {
        self.radius = radius as f32;
        self.dradius = radius;
    }

    /// Shrinks the radius to the given distance and records the primitive, if the distance is
    /// strictly smaller than the current radius. Returns true if the query has been updated.
    ///
    /// # Arguments
    /// * `distance` - The distance to the candidate primitive.
    /// * `prim_id` - The id of the candidate primitive.
    /// * `geom_id` - The id of the geometry of the candidate primitive.
    #[inline]
    pub fn shrink_radius(&mut self, distance: f64, prim_id: u32, geom_id: u32) -> bool {
        if distance < self.dradius {
            self.set_radius(distance);
            self.prim_id = prim_id;
            self.geom_id = geom_id;
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn point(&self) -> &Vec3 {
        &self.point
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    #[inline]
    pub fn dpoint(&self) -> &DVec3 {
        &self.dpoint
    }

    #[inline]
    pub fn dradius(&self) -> f64 {
        self.dradius
    }

    #[inline]
    pub fn prim_id(&self) -> u32 {
        self.prim_id
    }

    #[inline]
    pub fn geom_id(&self) -> u32 {
        self.geom_id
    }

    /// Returns the nearest primitive or None if no primitive lies within the search radius.
    pub fn closest(&self) -> Option<ClosestPrimitive> {
        if self.geom_id == INVALID_GEOMETRY_ID {
            return None;
        }

        Some(ClosestPrimitive {
            geom_id: self.geom_id,
            prim_id: self.prim_id,
            distance: self.dradius,
        })
    }
}

impl Default for DPointQuery {
    fn default() -> Self {
        Self {
            point: Vec3::zeros(),
            radius: f32::INFINITY,
            dpoint: DVec3::zeros(),
            dradius: f64::INFINITY,
            prim_id: INVALID_GEOMETRY_ID,
            geom_id: INVALID_GEOMETRY_ID,
        }
    }
}
