use std::f64::consts::PI;

use nalgebra_glm::DVec3;
use serde::{Deserialize, Serialize};

use crate::{math::AABB, primitive::MeshAccess, Error, Result};

/// A double precision triangle mesh with direct access onto the triangle vertices.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<DVec3>,
    pub triangles: Vec<[u32; 3]>,
}

impl TriangleMesh {
    /// Creates a new mesh from the given vertices and triangles.
    ///
    /// # Arguments
    /// * `vertices` - The vertex positions.
    /// * `triangles` - The vertex indices of the triangles.
    pub fn new(vertices: Vec<DVec3>, triangles: Vec<[u32; 3]>) -> Result<Self> {
        let mesh = Self {
            vertices,
            triangles,
        };

        if mesh.is_valid() {
            Ok(mesh)
        } else {
            Err(Error::InvalidMesh(format!(
                "triangle index out of range for {} vertices",
                mesh.vertices.len()
            )))
        }
    }

    /// Returns `true` if all indices are valid and false otherwise.
    pub fn is_valid(&self) -> bool {
        let num_vertices = self.vertices.len() as u32;

        self.triangles
            .iter()
            .all(|t| t.iter().all(|i| *i < num_vertices))
    }

    /// Returns the number of triangles.
    #[inline]
    pub fn n_elements(&self) -> usize {
        self.triangles.len()
    }

    /// Returns the single precision bounding box of all vertices, rounded outwards.
    pub fn bounding_box(&self) -> AABB {
        AABB::from_dvec_iter(self.vertices.iter())
    }

    /// Creates a closed UV sphere around the origin whose triangles are wound such that their
    /// normals point outwards.
    ///
    /// # Arguments
    /// * `radius` - The radius of the sphere.
    /// * `slices` - The number of subdivisions around the z-axis, at least 3.
    /// * `stacks` - The number of subdivisions from pole to pole, at least 2.
    pub fn uv_sphere(radius: f64, slices: u32, stacks: u32) -> Self {
        let slices = slices.max(3);
        let stacks = stacks.max(2);

        let mut vertices = Vec::with_capacity((2 + (stacks - 1) * slices) as usize);
        vertices.push(DVec3::new(0.0, 0.0, radius));
        for i in 1..stacks {
            let phi = PI * i as f64 / stacks as f64;
            for j in 0..slices {
                let theta = 2.0 * PI * j as f64 / slices as f64;
                vertices.push(
                    DVec3::new(phi.sin() * theta.cos(), phi.sin() * theta.sin(), phi.cos())
                        * radius,
                );
            }
        }
        let south = vertices.len() as u32;
        vertices.push(DVec3::new(0.0, 0.0, -radius));

        let ring = |i: u32, j: u32| 1 + (i - 1) * slices + (j % slices);

        let mut triangles = Vec::with_capacity((2 * slices * (stacks - 1)) as usize);
        for j in 0..slices {
            triangles.push([0, ring(1, j), ring(1, j + 1)]);
        }

        for i in 1..(stacks - 1) {
            for j in 0..slices {
                let (a0, a1) = (ring(i, j), ring(i, j + 1));
                let (b0, b1) = (ring(i + 1, j), ring(i + 1, j + 1));

                triangles.push([a0, b0, b1]);
                triangles.push([a0, b1, a1]);
            }
        }

        for j in 0..slices {
            triangles.push([ring(stacks - 1, j), south, ring(stacks - 1, j + 1)]);
        }

        Self {
            vertices,
            triangles,
        }
    }

    /// Creates an axis aligned cube centered at the origin with outward normals.
    ///
    /// # Arguments
    /// * `size` - The edge length of the cube.
    pub fn cube(size: f64) -> Self {
        let h = size / 2.0;

        // bit 0, 1 and 2 of the index select the upper x, y and z coordinate
        let vertices = (0..8)
            .map(|i| {
                DVec3::new(
                    if i & 1 != 0 { h } else { -h },
                    if i & 2 != 0 { h } else { -h },
                    if i & 4 != 0 { h } else { -h },
                )
            })
            .collect();

        let triangles = vec![
            [0, 2, 3],
            [0, 3, 1],
            [4, 5, 7],
            [4, 7, 6],
            [0, 4, 6],
            [0, 6, 2],
            [1, 3, 7],
            [1, 7, 5],
            [0, 1, 5],
            [0, 5, 4],
            [2, 6, 7],
            [2, 7, 3],
        ];

        Self {
            vertices,
            triangles,
        }
    }
}

impl MeshAccess for TriangleMesh {
    type Handle = u32;

    #[inline]
    fn get_vertex_coordinates(&self, handle: u32) -> [DVec3; 3] {
        let t = &self.triangles[handle as usize];

        [
            self.vertices[t[0] as usize],
            self.vertices[t[1] as usize],
            self.vertices[t[2] as usize],
        ]
    }
}
