mod io;
mod io_utils;

pub use io::*;

use serde::{Deserialize, Serialize};

use crate::{math::AABB, Error, Result, Sense, TriangleMesh};

/// A collection of surfaces, each being a triangle mesh with an orientation.
#[derive(Default, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub surfaces: Vec<Surface>,
}

impl Scene {
    /// Returns `true` if all surfaces are valid and false otherwise.
    pub fn is_valid(&self) -> bool {
        self.surfaces.iter().all(|s| s.mesh.is_valid())
    }

    /// Returns the total number of triangles over all surfaces.
    pub fn num_triangles(&self) -> usize {
        self.surfaces.iter().map(|s| s.mesh.n_elements()).sum()
    }

    /// Returns the bounding box over all surfaces.
    pub fn bounding_box(&self) -> AABB {
        let mut aabb = AABB::new();
        for surface in self.surfaces.iter() {
            aabb.extend_bbox(&surface.mesh.bounding_box());
        }

        aabb
    }

    /// Writes the scene to the given writer.
    ///
    /// # Arguments
    /// * `writer` - The writer to write the scene to.
    pub fn write<W: std::io::Write>(&self, writer: W) -> Result<()> {
        bincode::serialize_into(writer, self).map_err(|e| Error::SerializationError(Box::new(e)))
    }

    /// Reads the scene from the given reader.
    ///
    /// # Arguments
    /// * `reader` - The reader to read the scene from.
    pub fn read_from<R: std::io::Read>(reader: R) -> Result<Self> {
        bincode::deserialize_from(reader).map_err(|e| Error::DeserializationError(Box::new(e)))
    }
}

/// A triangulated surface in world coordinates.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Surface {
    pub mesh: TriangleMesh,

    /// The orientation of the triangles w.r.t. the volume they bound.
    pub sense: Sense,
}

impl Surface {
    /// Creates a new surface.
    ///
    /// # Arguments
    /// * `mesh` - The triangles of the surface.
    /// * `sense` - The orientation of the triangles.
    pub fn new(mesh: TriangleMesh, sense: Sense) -> Self {
        Self { mesh, sense }
    }
}
