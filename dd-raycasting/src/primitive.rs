use nalgebra_glm::DVec3;
use serde::{Deserialize, Serialize};

/// The orientation of a triangle w.r.t. the geometry it bounds, i.e., whether the stored vertex
/// winding matches the outward normal of the geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Sense {
    /// The winding of the triangle produces the outward normal.
    #[default]
    Forward,

    /// The winding of the triangle produces the inward normal, i.e., the normal must be flipped.
    Reverse,
}

impl Sense {
    /// Returns +1 for a forward and -1 for a reversed sense.
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Sense::Forward => 1.0,
            Sense::Reverse => -1.0,
        }
    }

    /// Applies the given sense on top of this one, i.e., a reversed `other` flips the sense.
    ///
    /// # Arguments
    /// * `other` - The sense to apply.
    #[inline]
    pub fn compose(self, other: Sense) -> Self {
        match other {
            Sense::Forward => self,
            Sense::Reverse => self.reversed(),
        }
    }

    /// Returns the opposite sense.
    #[inline]
    pub fn reversed(self) -> Self {
        match self {
            Sense::Forward => Sense::Reverse,
            Sense::Reverse => Sense::Forward,
        }
    }
}

impl From<i32> for Sense {
    /// Maps the common +1/-1 convention onto a sense. Every negative value is reversed.
    fn from(value: i32) -> Self {
        if value < 0 {
            Sense::Reverse
        } else {
            Sense::Forward
        }
    }
}

/// Direct access onto the triangle coordinates of a mesh.
///
/// The ray tracing callbacks resolve the vertices of every candidate triangle through this trait,
/// so `get_vertex_coordinates` is on the hot path and must be cheap and free of allocations.
/// The mesh is only read during traversal, possibly from many threads at once.
pub trait MeshAccess: Sync {
    /// The handle that identifies a single triangle of the mesh.
    type Handle: Copy + Send + Sync;

    /// Returns the three vertex coordinates of the triangle with the given handle.
    ///
    /// # Arguments
    /// * `handle` - The handle of the triangle.
    fn get_vertex_coordinates(&self, handle: Self::Handle) -> [DVec3; 3];
}

/// A triangle primitive as registered with the acceleration structure.
///
/// The descriptor only stores the handle of the triangle and never caches its coordinates. They
/// are resolved on demand through the borrowed mesh.
pub struct DblTri<'m, M: MeshAccess> {
    /// The handle of the triangle within the mesh.
    pub handle: M::Handle,

    /// The orientation of the triangle w.r.t. the geometry.
    pub sense: Sense,

    /// The id of the geometry that owns the triangle.
    pub geom_id: u32,

    /// The mesh that is used to resolve the triangle coordinates.
    pub mesh: &'m M,
}

impl<'m, M: MeshAccess> DblTri<'m, M> {
    /// Creates a new triangle descriptor.
    ///
    /// # Arguments
    /// * `mesh` - The mesh the triangle belongs to.
    /// * `handle` - The handle of the triangle within the mesh.
    /// * `sense` - The orientation of the triangle w.r.t. the geometry.
    /// * `geom_id` - The id of the geometry that owns the triangle.
    pub fn new(mesh: &'m M, handle: M::Handle, sense: Sense, geom_id: u32) -> Self {
        Self {
            handle,
            sense,
            geom_id,
            mesh,
        }
    }

    /// Returns the coordinates of the triangle.
    #[inline]
    pub fn vertices(&self) -> [DVec3; 3] {
        self.mesh.get_vertex_coordinates(self.handle)
    }
}

// Derives would put the bounds onto M instead of M::Handle.
impl<M: MeshAccess> Clone for DblTri<'_, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: MeshAccess> Copy for DblTri<'_, M> {}
