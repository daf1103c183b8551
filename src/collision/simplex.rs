//! Simplex solvers for GJK.
//!
//! Both solvers keep at most four points in an inline array with a usage
//! bitmask and reduce them to the feature closest to the origin by
//! Voronoi-region case analysis. Degenerate segments, triangles, and
//! tetrahedra fall back to the best sub-feature.

use glam::Vec3;

use super::support::MinkowskiVertex;

const EPSILON: f32 = 1e-8;
const FULL_MASK: u32 = 0b1111;

/// Closest feature of the current simplex.
#[derive(Debug, Clone, Copy)]
struct Feature {
    point: Vec3,
    mask: u32,
    lambdas: [f32; 4],
}

fn closest_segment(points: &[Vec3; 4], i0: usize, i1: usize) -> Feature {
    let a = points[i0];
    let b = points[i1];

    let v = b - a;
    let vsq = v.length_squared();
    let degenerate = vsq < EPSILON;

    let t = -a.dot(v) / vsq;
    let mut lambda0 = 1.0 - t;
    let mut lambda1 = t;
    let mut mask = (1 << i0) | (1 << i1);

    if lambda0 < 0.0 || degenerate {
        mask = 1 << i1;
        lambda0 = 0.0;
        lambda1 = 1.0;
    } else if lambda1 < 0.0 {
        mask = 1 << i0;
        lambda0 = 1.0;
        lambda1 = 0.0;
    }

    let mut lambdas = [0.0; 4];
    lambdas[i0] = lambda0;
    lambdas[i1] = lambda1;

    Feature {
        point: lambda0 * a + lambda1 * b,
        mask,
        lambdas,
    }
}

/// Keeps whichever candidate lies closer to the origin.
fn keep_closer(best: &mut (f32, Option<Feature>), candidate: Feature) {
    let dist = candidate.point.length_squared();
    if dist < best.0 {
        *best = (dist, Some(candidate));
    }
}

fn closest_triangle(points: &[Vec3; 4], i0: usize, i1: usize, i2: usize) -> Feature {
    let a = points[i0];
    let b = points[i1];
    let c = points[i2];

    let u = a - b;
    let v = a - c;
    let normal = u.cross(v);

    let t = normal.length_squared();
    let it = 1.0 / t;
    let degenerate = t < EPSILON;

    let lambda2 = u.cross(a).dot(normal) * it;
    let lambda1 = a.cross(v).dot(normal) * it;
    let lambda0 = 1.0 - lambda2 - lambda1;

    let mut best = (f32::MAX, None);
    if lambda0 < 0.0 || degenerate {
        keep_closer(&mut best, closest_segment(points, i1, i2));
    }
    if lambda1 < 0.0 || degenerate {
        keep_closer(&mut best, closest_segment(points, i0, i2));
    }
    if lambda2 < 0.0 || degenerate {
        keep_closer(&mut best, closest_segment(points, i0, i1));
    }
    if let (_, Some(feature)) = best {
        return feature;
    }

    let mut lambdas = [0.0; 4];
    lambdas[i0] = lambda0;
    lambdas[i1] = lambda1;
    lambdas[i2] = lambda2;

    Feature {
        point: lambda0 * a + lambda1 * b + lambda2 * c,
        mask: (1 << i0) | (1 << i1) | (1 << i2),
        lambdas,
    }
}

#[inline]
fn determinant(a: Vec3, b: Vec3, c: Vec3, d: Vec3) -> f32 {
    (b - a).dot((c - a).cross(d - a))
}

fn closest_tetrahedron(points: &[Vec3; 4]) -> Feature {
    let [v0, v1, v2, v3] = *points;

    let det = determinant(v0, v1, v2, v3);
    let inv_det = 1.0 / det;
    let degenerate = det * det < EPSILON;

    let lambda0 = determinant(Vec3::ZERO, v1, v2, v3) * inv_det;
    let lambda1 = determinant(v0, Vec3::ZERO, v2, v3) * inv_det;
    let lambda2 = determinant(v0, v1, Vec3::ZERO, v3) * inv_det;
    let lambda3 = 1.0 - lambda0 - lambda1 - lambda2;

    let mut best = (f32::MAX, None);
    if lambda0 < 0.0 || degenerate {
        keep_closer(&mut best, closest_triangle(points, 1, 2, 3));
    }
    if lambda1 < 0.0 || degenerate {
        keep_closer(&mut best, closest_triangle(points, 0, 2, 3));
    }
    if lambda2 < 0.0 || degenerate {
        keep_closer(&mut best, closest_triangle(points, 0, 1, 3));
    }
    if lambda3 < 0.0 || degenerate {
        keep_closer(&mut best, closest_triangle(points, 0, 1, 2));
    }
    if let (_, Some(feature)) = best {
        return feature;
    }

    // The origin is enclosed.
    Feature {
        point: Vec3::ZERO,
        mask: FULL_MASK,
        lambdas: [lambda0, lambda1, lambda2, lambda3],
    }
}

/// Picks a free slot for a new point and lists the used slots followed by it.
fn claim_slot(usage: u32) -> ([usize; 4], usize) {
    let mut order = [0usize; 4];
    let mut count = 0;
    let mut free = 0;
    for i in 0..4 {
        if usage & (1 << i) != 0 {
            order[count] = i;
            count += 1;
        } else {
            free = i;
        }
    }
    order[count] = free;
    (order, count + 1)
}

fn reduce(points: &[Vec3; 4], order: &[usize; 4], count: usize) -> Feature {
    match count {
        1 => {
            let i0 = order[0];
            let mut lambdas = [0.0; 4];
            lambdas[i0] = 1.0;
            Feature {
                point: points[i0],
                mask: 1 << i0,
                lambdas,
            }
        }
        2 => closest_segment(points, order[0], order[1]),
        3 => closest_triangle(points, order[0], order[1], order[2]),
        _ => closest_tetrahedron(points),
    }
}

/// GJK simplex over plain Minkowski-difference points.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimplexSolver {
    points: [Vec3; 4],
    usage: u32,
}

impl SimplexSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.usage = 0;
    }

    /// Number of points currently spanning the closest feature.
    pub fn len(&self) -> usize {
        self.usage.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.usage == 0
    }

    /// Adds `point` and returns the point of the reduced simplex closest to the
    /// origin, or `None` once the simplex is a tetrahedron enclosing the origin.
    pub fn add_vertex(&mut self, point: Vec3) -> Option<Vec3> {
        let (order, count) = claim_slot(self.usage);
        self.points[order[count - 1]] = point;

        let feature = reduce(&self.points, &order, count);
        self.usage = feature.mask;
        (feature.mask != FULL_MASK).then_some(feature.point)
    }
}

/// GJK simplex that also tracks the support points on A and B so closest
/// points can be reconstructed from barycentric weights.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimplexSolverAb {
    vertices: [MinkowskiVertex; 4],
    points: [Vec3; 4],
    barycentric: [f32; 4],
    usage: u32,
}

impl SimplexSolverAb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.usage = 0;
    }

    pub fn len(&self) -> usize {
        self.usage.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.usage == 0
    }

    /// See [`SimplexSolver::add_vertex`].
    pub fn add_vertex(&mut self, vertex: MinkowskiVertex) -> Option<Vec3> {
        let (order, count) = claim_slot(self.usage);
        let slot = order[count - 1];
        self.vertices[slot] = vertex;
        self.points[slot] = vertex.v;

        let feature = reduce(&self.points, &order, count);
        self.usage = feature.mask;
        self.barycentric = feature.lambdas;
        (feature.mask != FULL_MASK).then_some(feature.point)
    }

    /// Witness points on A and B of the last closest feature.
    pub fn closest_points(&self) -> (Vec3, Vec3) {
        let mut point_a = Vec3::ZERO;
        let mut point_b = Vec3::ZERO;
        for i in 0..4 {
            if self.usage & (1 << i) == 0 {
                continue;
            }
            point_a += self.barycentric[i] * self.vertices[i].a;
            point_b += self.barycentric[i] * self.vertices[i].b;
        }
        (point_a, point_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_projects_origin() {
        let mut solver = SimplexSolver::new();
        solver.add_vertex(Vec3::new(-1.0, 1.0, 0.0));
        let closest = solver
            .add_vertex(Vec3::new(1.0, 1.0, 0.0))
            .expect("segment cannot enclose origin");
        assert!((closest - Vec3::Y).length() < 1e-6);
        assert_eq!(solver.len(), 2);
    }

    #[test]
    fn segment_keeps_nearest_endpoint() {
        let mut solver = SimplexSolver::new();
        solver.add_vertex(Vec3::new(1.0, 0.0, 0.0));
        let closest = solver
            .add_vertex(Vec3::new(3.0, 0.0, 0.0))
            .expect("segment cannot enclose origin");
        assert!((closest - Vec3::X).length() < 1e-6);
        assert_eq!(solver.len(), 1);
    }

    #[test]
    fn enclosing_tetrahedron_reports_containment() {
        let mut solver = SimplexSolver::new();
        assert!(solver.add_vertex(Vec3::new(1.0, -1.0, -1.0)).is_some());
        assert!(solver.add_vertex(Vec3::new(-1.0, -1.0, -1.0)).is_some());
        assert!(solver.add_vertex(Vec3::new(0.0, 1.0, -1.0)).is_some());
        assert!(solver.add_vertex(Vec3::new(0.0, 0.0, 1.0)).is_none());
    }

    #[test]
    fn degenerate_triangle_falls_back_to_segment() {
        let mut solver = SimplexSolver::new();
        solver.add_vertex(Vec3::new(-1.0, 2.0, 0.0));
        solver.add_vertex(Vec3::new(1.0, 2.0, 0.0));
        let closest = solver
            .add_vertex(Vec3::new(3.0, 2.0, 0.0))
            .expect("collinear points cannot enclose origin");
        assert!((closest - Vec3::new(0.0, 2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn witness_points_follow_barycentric_weights() {
        let mut solver = SimplexSolverAb::new();
        let v0 = MinkowskiVertex {
            v: Vec3::new(-1.0, 1.0, 0.0),
            a: Vec3::new(-1.0, 2.0, 0.0),
            b: Vec3::new(0.0, 1.0, 0.0),
        };
        let v1 = MinkowskiVertex {
            v: Vec3::new(1.0, 1.0, 0.0),
            a: Vec3::new(1.0, 2.0, 0.0),
            b: Vec3::new(0.0, 1.0, 0.0),
        };
        solver.add_vertex(v0);
        solver.add_vertex(v1);
        let (a, b) = solver.closest_points();
        assert!((a - Vec3::new(0.0, 2.0, 0.0)).length() < 1e-6);
        assert!((b - Vec3::new(0.0, 1.0, 0.0)).length() < 1e-6);
    }
}
