use nalgebra_glm::DVec3;

use crate::primitive::Sense;

use super::{Ray, AABB};

/// Plücker coordinates whose magnitude is below this threshold are treated as exactly zero, i.e.,
/// the ray passes through the edge.
const PLUCKER_ZERO_TOL: f64 = 10.0 * f64::EPSILON;

/// The result of a successful double precision ray triangle intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    /// The distance along the ray direction, i.e., origin + distance * direction is the hit.
    pub distance: f64,

    /// The unit normal of the triangle, already corrected by the triangle sense.
    pub normal: DVec3,
}

/// Returns true if `a` is lexicographically smaller than `b`.
#[inline]
fn first(a: &DVec3, b: &DVec3) -> bool {
    if a[0] != b[0] {
        a[0] < b[0]
    } else if a[1] != b[1] {
        a[1] < b[1]
    } else {
        a[2] < b[2]
    }
}

/// Computes the permuted inner product of the ray and the directed edge a->b in Plücker
/// coordinates. The edge is always evaluated starting at its lexicographically smaller vertex and
/// the sign is corrected afterwards, so that two triangles sharing an edge compute bit-identical
/// values for it and a ray can never slip through the gap between them.
///
/// # Arguments
/// * `a` - The start vertex of the edge.
/// * `b` - The end vertex of the edge.
/// * `ray_dir` - The direction of the ray.
/// * `ray_normal` - The moment of the ray, i.e., ray_dir x origin.
#[inline]
fn plucker_edge_test(a: &DVec3, b: &DVec3, ray_dir: &DVec3, ray_normal: &DVec3) -> f64 {
    let pip = if first(a, b) {
        let edge = b - a;
        let edge_normal = edge.cross(a);
        ray_dir.dot(&edge_normal) + ray_normal.dot(&edge)
    } else {
        let edge = a - b;
        let edge_normal = edge.cross(b);
        -(ray_dir.dot(&edge_normal) + ray_normal.dot(&edge))
    };

    if pip.abs() < PLUCKER_ZERO_TOL {
        0.0
    } else {
        pip
    }
}

/// Returns true if the two values have strictly opposite signs.
#[inline]
fn opposite_signs(a: f64, b: f64) -> bool {
    (a > 0.0 && b < 0.0) || (a < 0.0 && b > 0.0)
}

/// Determines the intersection between the given triangle and ray using the sign of the permuted
/// inner products of Plücker coordinates. If there is an intersection it returns the distance f
/// with origin + f * direction being the intersection point.
/// Hits on edges and vertices count as hits. Rays lying in the plane of the triangle never hit.
///
/// # Arguments
/// * `origin` - The origin of the ray.
/// * `direction` - The direction of the ray.
/// * `vertices` - The three vertices of the triangle.
/// * `max_distance` - Intersections further away than this value are discarded.
pub fn plucker_ray_triangle(
    origin: &DVec3,
    direction: &DVec3,
    vertices: &[DVec3; 3],
    max_distance: f64,
) -> Option<f64> {
    let ray_normal = direction.cross(origin);

    let c0 = plucker_edge_test(&vertices[0], &vertices[1], direction, &ray_normal);
    let c1 = plucker_edge_test(&vertices[1], &vertices[2], direction, &ray_normal);
    if opposite_signs(c0, c1) {
        return None;
    }

    let c2 = plucker_edge_test(&vertices[2], &vertices[0], direction, &ray_normal);
    if opposite_signs(c1, c2) || opposite_signs(c0, c2) {
        return None;
    }

    // coplanar ray, the barycentric weights below would be undefined
    if c0 == 0.0 && c1 == 0.0 && c2 == 0.0 {
        return None;
    }

    let inverse_sum = 1.0 / (c0 + c1 + c2);
    let intersection: DVec3 = (c0 * inverse_sum) * vertices[2]
        + (c1 * inverse_sum) * vertices[0]
        + (c2 * inverse_sum) * vertices[1];

    // the distance is recovered along the dominant axis to minimize the cancellation
    let mut axis = 0;
    for i in 1..3 {
        if direction[i].abs() > direction[axis].abs() {
            axis = i;
        }
    }
    let distance = (intersection[axis] - origin[axis]) / direction[axis];

    if distance > 0.0 && distance <= max_distance {
        Some(distance)
    } else {
        None
    }
}

/// Computes the unit normal of the given triangle as (v1 - v0) x (v2 - v0), flipped if the sense
/// of the triangle is reversed.
///
/// # Arguments
/// * `vertices` - The three vertices of the triangle.
/// * `sense` - The orientation of the triangle w.r.t. the geometry it belongs to.
pub fn triangle_normal(vertices: &[DVec3; 3], sense: Sense) -> DVec3 {
    let n = (vertices[1] - vertices[0]).cross(&(vertices[2] - vertices[0]));
    n.normalize() * sense.sign()
}

/// Determines whether the ray crosses the triangle within (0, max_distance] and returns the
/// distance together with the sense corrected triangle normal.
///
/// # Arguments
/// * `origin` - The origin of the ray.
/// * `direction` - The direction of the ray.
/// * `vertices` - The three vertices of the triangle.
/// * `sense` - The orientation of the triangle w.r.t. the geometry it belongs to.
/// * `max_distance` - Intersections further away than this value are discarded.
pub fn ray_triangle_intersect(
    origin: &DVec3,
    direction: &DVec3,
    vertices: &[DVec3; 3],
    sense: Sense,
    max_distance: f64,
) -> Option<TriangleHit> {
    let distance = plucker_ray_triangle(origin, direction, vertices, max_distance)?;

    Some(TriangleHit {
        distance,
        normal: triangle_normal(vertices, sense),
    })
}

/// Returns the point on the triangle that is closest to the given point and its distance to it.
/// The triangle must not be degenerated.
/// See: Ericson, Real-Time Collision Detection, 5.1.5
///
/// # Arguments
/// * `point` - The query location.
/// * `vertices` - The three vertices of the triangle.
pub fn closest_point_on_triangle(point: &DVec3, vertices: &[DVec3; 3]) -> (DVec3, f64) {
    let closest = closest_location_on_triangle(point, vertices);
    (closest, (closest - point).norm())
}

fn closest_location_on_triangle(p: &DVec3, vertices: &[DVec3; 3]) -> DVec3 {
    let [a, b, c] = vertices;

    let ab = b - a;
    let ac = c - a;
    let ap = p - a;

    // vertex region outside a
    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return *a;
    }

    // vertex region outside b
    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return *b;
    }

    // edge region of ab
    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    // vertex region outside c
    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return *c;
    }

    // edge region of ac
    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    // edge region of bc
    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    // inside the face
    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;

    a + ab * v + ac * w
}

/// Determines the intersection between the given AABB and the single precision ray. If there is
/// an intersection it returned the coefficient f that defines the entry point along the given ray.
/// That is, ray.pos + f * ray.dir is the intersection point
///
/// # Arguments
/// * `aabb` - The AABB to compute the intersection with.
/// * `ray` - The ray to compute the intersection with.
/// * `max_f` - Optionally, the maximum value for f. If the intersection point is further away
///             than max_f, None is returned.
pub fn aabb_ray(aabb: &AABB, ray: &Ray, max_f: Option<f32>) -> Option<f32> {
    let mut t_min = 0f32;
    let mut t_max = max_f.unwrap_or(f32::MAX);

    if t_max < t_min {
        return None;
    }

    // we iterate over each axis and determine the intersection point with the AABB
    for axis in 0..3 {
        // If the ray is parallel to the slab, it can only hit if it starts between the planes.
        if ray.dir[axis] == 0f32 {
            if ray.pos[axis] < aabb.min[axis] || ray.pos[axis] > aabb.max[axis] {
                return None;
            }

            continue;
        }

        let t0 = (aabb.min[axis] - ray.pos[axis]) / ray.dir[axis];
        let t1 = (aabb.max[axis] - ray.pos[axis]) / ray.dir[axis];

        t_min = t_min.max(t0.min(t1));
        t_max = t_max.min(t0.max(t1));

        if t_min > t_max {
            return None;
        }
    }

    Some(t_min)
}
