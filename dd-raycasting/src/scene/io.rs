use std::{collections::HashMap, path::Path};

use cad_import::{
    loader::Manager,
    structure::{CADData, IndexData, Node, Point3D, Shape},
    ID,
};
use log::{debug, error};
use nalgebra_glm::{DMat4, DVec3};

use crate::{math::transform_dvec3, Error, Result, Sense, TriangleMesh};

use super::{io_utils::TriangleIterator, Scene, Surface};

/// Tries to load the CAD file from the given path and appends one surface per shape instance.
///
/// # Arguments
/// * `scene` - The scene to load the data into.
/// * `path` - The path to load the scene from.
pub fn load_into_scene<P: AsRef<Path>>(scene: &mut Scene, path: P) -> Result<()> {
    let cad_data = load_cad_data(path.as_ref())?;
    add_cad_data_to_scene(scene, &cad_data);

    Ok(())
}

/// Tries to load the cad data from the given path
///
/// # Arguments
/// * `file_path` - The path to load the CAD data from.
fn load_cad_data(file_path: &Path) -> Result<CADData> {
    let manager = Manager::new();

    let mime_types = determine_mime_types(&manager, file_path)?;

    for mime_type in mime_types.iter() {
        if let Some(loader) = manager.get_loader_by_mime_type(mime_type.as_str()) {
            let cad_data = loader
                .read_file(file_path, mime_type)
                .map_err(Error::CadImport)?;

            return Ok(cad_data);
        }
    }

    error!("Cannot find loader for the input file {:?}", file_path);
    Err(Error::NoLoaderFound)
}

/// Tries to find the mime types for the given file based on the file extension.
///
/// # Arguments
/// * `input_file` - The input file whose extension will be used
pub fn determine_mime_types(manager: &Manager, input_file: &Path) -> Result<Vec<String>> {
    match input_file.extension().map(|ext| ext.to_str()) {
        Some(Some(ext)) => Ok(manager.get_mime_types_for_extension(ext)),
        _ => Err(Error::InvalidFileExtension),
    }
}

/// Adds the given CAD data to the given scene by traversing over the node structure. The node
/// transformations are applied to the vertices in double precision.
///
/// # Arguments
/// * `scene` - The scene to which the data will be added.
/// * `cad_data` - The CAD data to convert to surfaces.
pub fn add_cad_data_to_scene(scene: &mut Scene, cad_data: &CADData) {
    let root_node = cad_data.get_root_node();
    let traversal_context = TraversalContext::new(root_node);
    let mut traversal_data = TraversalData::new();

    traverse(scene, root_node, traversal_context, &mut traversal_data);

    debug!(
        "Created {} surfaces from {} unique shapes",
        scene.surfaces.len(),
        traversal_data.shape_map.len()
    );
}

/// Internal function for traversing over the node structure.
///
/// # Arguments
/// * `scene` - The scene to which the data will be added.
/// * `node` - The currently visited node.
/// * `traversal_context` - Additional information used during traversal.
/// * `traversal_data` - Additional data used during traversal.
fn traverse(
    scene: &mut Scene,
    node: &Node,
    traversal_context: TraversalContext,
    traversal_data: &mut TraversalData,
) {
    let shapes: &[std::rc::Rc<Shape>] = node.get_shapes();
    for shape in shapes {
        let local = get_or_create_mesh(shape, traversal_data);

        let mut mesh = local.clone();
        for v in mesh.vertices.iter_mut() {
            *v = transform_dvec3(&traversal_context.transform, v);
        }

        // mirroring transformations flip the winding and with it the normals
        let sense = if traversal_context.transform.determinant() < 0.0 {
            Sense::Reverse
        } else {
            Sense::Forward
        };

        scene.surfaces.push(Surface::new(mesh, sense));
    }

    for child in node.get_children().iter() {
        let child_traversal_context = traversal_context.derive(child);

        traverse(scene, child, child_traversal_context, traversal_data);
    }
}

/// Returns the untransformed mesh for the given shape. If the mesh does not exist yet, it will
/// be created.
///
/// # Arguments
/// * `shape` - The shape for which to get the mesh.
/// * `traversal_data` - Additional data used during traversal.
fn get_or_create_mesh<'a>(shape: &Shape, traversal_data: &'a mut TraversalData) -> &'a TriangleMesh {
    traversal_data
        .shape_map
        .entry(shape.get_id())
        .or_insert_with(|| create_mesh_from_shape(shape))
}

/// Creates a mesh based on the given shape.
///
/// # Arguments
/// * `shape` - The shape to create the mesh from.
fn create_mesh_from_shape(shape: &Shape) -> TriangleMesh {
    let mut mesh = TriangleMesh::default();

    // iterate over the parts of the shape and append them to the mesh if they are triangles
    for part in shape.get_parts() {
        let in_mesh = part.get_mesh();
        let positions = in_mesh.get_vertices().get_positions().as_slice();
        let in_primitive_data = in_mesh.get_primitives();
        let primitive_type = in_primitive_data.get_primitive_type();

        let appended = match in_primitive_data.get_raw_index_data() {
            IndexData::Indices(indices) => {
                TriangleIterator::new(primitive_type, indices.iter().copied())
                    .map(|triangles| append_to_mesh(&mut mesh, positions, triangles))
                    .is_some()
            }
            IndexData::NonIndexed(n) => TriangleIterator::new(primitive_type, 0..(*n as u32))
                .map(|triangles| append_to_mesh(&mut mesh, positions, triangles))
                .is_some(),
        };

        if !appended {
            debug!("Primitive type {:?} is not triangle", primitive_type);
        }
    }

    mesh
}

/// Appends the given triangles to the mesh in double precision.
///
/// # Arguments
/// * `mesh` - The mesh to which the triangles will be appended.
/// * `pos` - The positions of the vertices of the triangles.
/// * `triangles` - The triangles to append to the mesh.
fn append_to_mesh<I>(mesh: &mut TriangleMesh, pos: &[Point3D], triangles: TriangleIterator<I>)
where
    I: Iterator<Item = u32>,
{
    let index_offset = mesh.vertices.len() as u32;

    mesh.vertices.extend(pos.iter().map(|p| {
        let p = p.0.as_slice();
        DVec3::new(p[0] as f64, p[1] as f64, p[2] as f64)
    }));

    // drop triangles referencing missing vertices instead of producing an invalid mesh
    let num_vertices = pos.len() as u32;
    mesh.triangles.extend(
        triangles
            .filter(|t| t.iter().all(|i| *i < num_vertices))
            .map(|t| {
                [
                    t[0] + index_offset,
                    t[1] + index_offset,
                    t[2] + index_offset,
                ]
            }),
    );
}

/// Converts the single precision node transformation into double precision.
fn node_transform(node: &Node) -> Option<DMat4> {
    node.get_transform()
        .map(|t| DMat4::from_iterator(t.as_slice().iter().map(|v| *v as f64)))
}

/// Contextual data used during traversing the node data.
#[derive(Clone)]
struct TraversalContext {
    /// The current transformation matrix
    transform: DMat4,
}

impl TraversalContext {
    /// Returns a new traversal context for the root node.
    pub fn new(root_node: &Node) -> Self {
        let transform = node_transform(root_node).unwrap_or_else(DMat4::identity);

        Self { transform }
    }

    /// Returns a new traversal context by visiting the given node.
    ///
    /// # Arguments
    /// * `node` - The node to visit based on the current traversal context
    pub fn derive(&self, node: &Node) -> Self {
        let mut result = self.clone();

        if let Some(t) = node_transform(node) {
            result.transform *= t;
        }

        result
    }
}

struct TraversalData {
    pub shape_map: HashMap<ID, TriangleMesh>,
}

impl TraversalData {
    pub fn new() -> Self {
        Self {
            shape_map: HashMap::new(),
        }
    }
}
