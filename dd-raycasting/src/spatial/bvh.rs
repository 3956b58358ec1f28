use log::trace;
use nalgebra_glm::Vec3;

use crate::math::{aabb_ray, Ray, AABB};

use super::{HierarchicalNode, RayIntersectionTest};

/// The maximal number of nodes pending on the traversal stack. Bounds the depth of the tree.
const MAX_STACK_SIZE: usize = 64;

/// Bounding Volume Hierarchy
pub struct BVH {
    /// The nodes of the BVH. The first node is the root node.
    nodes: Vec<Node>,

    /// The objects of the BVH.
    objects: Vec<u32>,
}

impl BVH {
    /// Returns the nodes of the BVH. The children of a node are stored next to each other.
    #[inline]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns the object ids spatially sorted by the leaves of the BVH.
    #[inline]
    pub fn object_indices(&self) -> &[u32] {
        &self.objects
    }

    /// Traverses the BVH front to back along the given ray and visits all objects stored in the
    /// leaves whose volume intersects the ray within the current ray length.
    /// The visitor returns the ray length after visiting the object. A negative length stops
    /// the traversal.
    ///
    /// # Arguments
    /// * `ray` - The ray to traverse the BVH with.
    /// * `tfar` - The initial length of the ray.
    /// * `visit` - The visitor that is called with the id of every candidate object.
    pub fn traverse_ray<F>(&self, ray: &Ray, tfar: f32, mut visit: F)
    where
        F: FnMut(u32) -> f32,
    {
        let mut tfar = tfar;
        if self.objects.is_empty() || self.nodes[0].intersects_ray(ray, Some(tfar)).is_none() {
            return;
        }

        let mut stack = [0usize; MAX_STACK_SIZE];
        let mut stack_size = 1;
        let mut children = [0usize; 2];

        while stack_size > 0 {
            stack_size -= 1;
            let node = &self.nodes[stack[stack_size]];

            for object in self.objects[node.objects()].iter() {
                tfar = visit(*object);
                if tfar < 0f32 {
                    return;
                }
            }

            // push the farther child first, so that the nearer one is visited next
            let count = node.intersect_children(ray, &mut children, &self.nodes, Some(tfar));
            for child in children[..count].iter().rev() {
                stack[stack_size] = *child;
                stack_size += 1;
            }
        }
    }

    /// Traverses the BVH and visits all objects stored in the leaves whose volume is within the
    /// current search radius of the given point. Nearer nodes are visited first.
    /// The visitor returns the search radius after visiting the object.
    ///
    /// # Arguments
    /// * `point` - The query location.
    /// * `radius` - The initial search radius.
    /// * `visit` - The visitor that is called with the id of every candidate object.
    pub fn traverse_point<F>(&self, point: &Vec3, radius: f32, mut visit: F)
    where
        F: FnMut(u32) -> f32,
    {
        let mut radius = radius;
        if self.objects.is_empty() || self.nodes[0].volume.point_distance(point) > radius {
            return;
        }

        let mut stack = [0usize; MAX_STACK_SIZE];
        let mut stack_size = 1;

        while stack_size > 0 {
            stack_size -= 1;
            let node = &self.nodes[stack[stack_size]];

            for object in self.objects[node.objects()].iter() {
                radius = visit(*object);
            }

            let mut candidates = [(0usize, 0f32); 2];
            let mut count = 0;
            for child in node.children() {
                let d = self.nodes[child].volume.point_distance(point);
                if d <= radius {
                    candidates[count] = (child, d);
                    count += 1;
                }
            }

            if count == 2 && candidates[0].1 < candidates[1].1 {
                candidates.swap(0, 1);
            }

            for (child, _) in candidates[..count].iter() {
                stack[stack_size] = *child;
                stack_size += 1;
            }
        }
    }
}

pub struct Node {
    /// The bounding volume of the node.
    volume: AABB,

    /// The index of the first child node. 0 if the node has no children.
    children: u32,

    /// The range of the objects stored in the node.
    objects: std::ops::Range<u32>,
}

impl Node {
    fn new_leaf(objects: std::ops::Range<usize>) -> Self {
        Self {
            volume: AABB::new(),
            children: 0,
            objects: objects.start as u32..objects.end as u32,
        }
    }
}

impl HierarchicalNode for Node {
    type Volume = AABB;

    #[inline]
    fn children(&self) -> std::ops::Range<usize> {
        if self.children == 0 {
            0..0
        } else {
            (self.children as usize)..(self.children as usize + 2)
        }
    }

    #[inline]
    fn objects(&self) -> std::ops::Range<usize> {
        self.objects.start as usize..self.objects.end as usize
    }

    #[inline]
    fn bounding_volume(&self) -> &Self::Volume {
        &self.volume
    }

    fn intersect_children(
        &self,
        ray: &Ray,
        children_indices: &mut [usize],
        nodes: &[Self],
        max_depth: Option<f32>,
    ) -> usize {
        let mut count = 0;

        let mut f = [0f32; 2];
        for i in self.children() {
            if let Some(t) = nodes[i].bounding_volume().intersects_ray(ray, max_depth) {
                children_indices[count] = i;
                f[count] = t;
                count += 1;
            }
        }

        // Sort the children by distance to the ray origin.
        if count == 2 && f[0] > f[1] {
            children_indices.swap(0, 1);
        }

        count
    }
}

pub struct Builder {
    nodes: Vec<Node>,
    objects: Vec<u32>,
    options: BVHOptions,
}

impl Builder {
    /// Creates a new BVH builder with the provided options.
    ///
    /// # Arguments
    /// * `options` - The options for the BVH.
    pub fn new(options: BVHOptions) -> Self {
        Self {
            options,
            nodes: Vec::new(),
            objects: Vec::new(),
        }
    }

    /// Builds the BVH from the bounding volumes of the objects. The object ids are the indices of
    /// the volumes.
    ///
    /// # Arguments
    /// * `volumes` - The bounding volumes of the objects to build the BVH from.
    pub fn build(mut self, volumes: &[AABB]) -> BVH {
        self.objects = (0..volumes.len() as u32).collect();
        let centers: Vec<Vec3> = volumes.iter().map(|v| v.get_center()).collect();

        self.nodes.push(Node::new_leaf(0..volumes.len()));
        self.split(0, volumes, &centers, 0);

        trace!(
            "Built BVH with {} nodes for {} objects",
            self.nodes.len(),
            volumes.len()
        );

        BVH {
            nodes: self.nodes,
            objects: self.objects,
        }
    }

    /// Computes the volume of the given node and recursively splits it at the median of the
    /// object centers along the largest axis.
    fn split(&mut self, node_index: usize, volumes: &[AABB], centers: &[Vec3], depth: usize) {
        let range = self.nodes[node_index].objects();

        let mut volume = AABB::new();
        let mut center_volume = AABB::new();
        for object in self.objects[range.clone()].iter() {
            volume.extend_bbox(&volumes[*object as usize]);
            center_volume.extend_pos(&centers[*object as usize]);
        }
        self.nodes[node_index].volume = Self::pad(volume, self.options.relative_padding);

        // the stack of the traversal holds at most one pending sibling per level
        let max_depth = self.options.max_depth.min(MAX_STACK_SIZE - 2);
        if range.len() <= self.options.max_objects_per_node.max(1) || depth >= max_depth {
            return;
        }

        let axis = center_volume.largest_axis();
        let half = range.len() / 2;
        self.objects[range.clone()].select_nth_unstable_by(half, |a, b| {
            centers[*a as usize][axis].total_cmp(&centers[*b as usize][axis])
        });

        let first_child = self.nodes.len();
        let mid = range.start + half;
        self.nodes.push(Node::new_leaf(range.start..mid));
        self.nodes.push(Node::new_leaf(mid..range.end));

        let node = &mut self.nodes[node_index];
        node.children = first_child as u32;
        node.objects = range.start as u32..range.start as u32;

        self.split(first_child, volumes, centers, depth + 1);
        self.split(first_child + 1, volumes, centers, depth + 1);
    }

    /// Enlarges the volume relative to its size and distance to the origin, so that rounding of
    /// the single precision ray cannot cull primitives touching the volume.
    fn pad(mut volume: AABB, relative_padding: f32) -> AABB {
        if volume.is_empty() || relative_padding <= 0f32 {
            return volume;
        }

        let size = volume.get_size();
        let mut extent = size.x.max(size.y).max(size.z);
        for i in 0..3 {
            extent = extent.max(volume.min[i].abs()).max(volume.max[i].abs());
        }

        let pad = Vec3::repeat(extent * relative_padding);
        volume.min -= pad;
        volume.max += pad;

        volume
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BVHOptions {
    pub max_depth: usize,
    pub max_objects_per_node: usize,

    /// The padding of the node volumes relative to their extent.
    pub relative_padding: f32,
}

impl Default for BVHOptions {
    fn default() -> Self {
        Self {
            max_depth: 48,
            max_objects_per_node: 4,
            relative_padding: 1e-5,
        }
    }
}

impl RayIntersectionTest for AABB {
    fn intersects_ray(&self, ray: &Ray, max_depth: Option<f32>) -> Option<f32> {
        if self.is_empty() {
            return None;
        }

        aabb_ray(self, ray, max_depth)
    }
}

impl RayIntersectionTest for Node {
    #[inline]
    fn intersects_ray(&self, ray: &Ray, max_depth: Option<f32>) -> Option<f32> {
        self.volume.intersects_ray(ray, max_depth)
    }
}
