//! Convex polytope scratch used by EPA.
//!
//! Storage is fixed: at most [`MAX_VERTICES`] vertices and [`MAX_TRIANGLES`]
//! triangles (the Euler bound for a closed triangulated hull). Growing past
//! either limit makes [`ConvexPolytope::add_vertex`] report that the hull could
//! not be extended, which EPA treats as convergence.

use glam::Vec3;

use super::support::MinkowskiVertex;

pub const MAX_VERTICES: usize = 128;
pub const MAX_TRIANGLES: usize = 2 * MAX_VERTICES;
const MAX_HOLE_EDGES: usize = 256;

const NUMERIC_EPSILON: f32 = 1e-16;

/// Edge length scale of the seed tetrahedron built around an interior point.
const SEED_SCALE: f32 = 1e-2;

#[derive(Debug, Clone, Copy, Default)]
pub struct Triangle {
    pub a: usize,
    pub b: usize,
    pub c: usize,
    pub facing_origin: bool,
    /// Unnormalized outward normal.
    pub normal: Vec3,
    pub normal_sq: f32,
    /// Point of the triangle (or its plane, once the origin is enclosed) closest to the origin.
    pub closest_to_origin: Vec3,
    pub closest_to_origin_sq: f32,
}

impl Triangle {
    #[inline]
    fn edge(&self, k: usize) -> Edge {
        let idx = [self.a, self.b, self.c];
        Edge {
            a: idx[k % 3],
            b: idx[(k + 1) % 3],
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Edge {
    a: usize,
    b: usize,
}

impl Edge {
    #[inline]
    fn same_undirected(&self, other: &Edge) -> bool {
        (self.a == other.a && self.b == other.b) || (self.a == other.b && self.b == other.a)
    }
}

/// Growing convex hull of Minkowski-difference vertices.
pub struct ConvexPolytope {
    vertices: [MinkowskiVertex; MAX_VERTICES],
    triangles: [Triangle; MAX_TRIANGLES],
    edges: [Edge; MAX_HOLE_EDGES],
    vertex_count: usize,
    triangle_count: usize,
    origin_enclosed: bool,
    center: Vec3,
}

impl Default for ConvexPolytope {
    fn default() -> Self {
        Self::new()
    }
}

impl ConvexPolytope {
    pub fn new() -> Self {
        Self {
            vertices: [MinkowskiVertex::default(); MAX_VERTICES],
            triangles: [Triangle::default(); MAX_TRIANGLES],
            edges: [Edge::default(); MAX_HOLE_EDGES],
            vertex_count: 0,
            triangle_count: 0,
            origin_enclosed: false,
            center: Vec3::ZERO,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles[..self.triangle_count]
    }

    /// Whether the origin is inside the hull. Only valid after
    /// [`Self::closest_triangle`]; invalidated by [`Self::add_vertex`].
    pub fn origin_enclosed(&self) -> bool {
        self.origin_enclosed
    }

    /// Seeds the hull with a tetrahedron spanned by four given vertices
    /// (typically the final MPR portal plus its interior point).
    pub fn init_tetrahedron(&mut self, seed: [MinkowskiVertex; 4]) {
        self.origin_enclosed = false;
        self.triangle_count = 0;
        self.vertices[..4].copy_from_slice(&seed);
        self.vertex_count = 4;
        self.center = 0.25 * (seed[0].v + seed[1].v + seed[2].v + seed[3].v);

        self.create_triangle(0, 2, 1);
        self.create_triangle(0, 1, 3);
        self.create_triangle(0, 3, 2);
        self.create_triangle(1, 2, 3);
    }

    /// Seeds the hull with a small regular tetrahedron around `point`.
    pub fn init_tetrahedron_around(&mut self, point: Vec3) {
        self.origin_enclosed = false;
        self.triangle_count = 0;
        self.center = point;

        let offsets = [
            Vec3::new((8.0f32 / 9.0).sqrt(), 0.0, -1.0 / 3.0),
            Vec3::new(-(2.0f32 / 9.0).sqrt(), (2.0f32 / 3.0).sqrt(), -1.0 / 3.0),
            Vec3::new(-(2.0f32 / 9.0).sqrt(), -(2.0f32 / 3.0).sqrt(), -1.0 / 3.0),
            Vec3::new(0.0, 0.0, 1.0),
        ];
        for (slot, offset) in offsets.iter().enumerate() {
            self.vertices[slot] = MinkowskiVertex::from_point(point + SEED_SCALE * *offset);
        }
        self.vertex_count = 4;

        self.create_triangle(2, 0, 1);
        self.create_triangle(1, 0, 3);
        self.create_triangle(3, 0, 2);
        self.create_triangle(2, 1, 3);
    }

    /// Barycentric coordinates of the origin projected onto `tri`'s plane.
    ///
    /// With `clamp` set, coordinates outside the triangle are moved to the
    /// nearest point on its boundary; the flag in the result reports whether that happened.
    fn barycentric(&self, tri: &Triangle, clamp: bool) -> (Vec3, bool) {
        let a = self.vertices[tri.a].v;
        let b = self.vertices[tri.b].v;
        let c = self.vertices[tri.c].v;

        let u = a - b;
        let v = a - c;
        let t = tri.normal_sq;

        let mut gamma = u.cross(a).dot(tri.normal) / t;
        let mut beta = a.cross(v).dot(tri.normal) / t;
        let mut alpha = 1.0 - gamma - beta;
        let mut clamped = false;

        if clamp {
            if alpha >= 0.0 && beta < 0.0 {
                let t = a.dot(u);
                if gamma < 0.0 && t > 0.0 {
                    beta = (t / u.length_squared()).min(1.0);
                    alpha = 1.0 - beta;
                    gamma = 0.0;
                } else {
                    gamma = (a.dot(v) / v.length_squared()).clamp(0.0, 1.0);
                    alpha = 1.0 - gamma;
                    beta = 0.0;
                }
                clamped = true;
            } else if beta >= 0.0 && gamma < 0.0 {
                let w = b - c;
                let t = b.dot(w);
                if alpha < 0.0 && t > 0.0 {
                    gamma = (t / w.length_squared()).min(1.0);
                    beta = 1.0 - gamma;
                    alpha = 0.0;
                } else {
                    alpha = (-b.dot(u) / u.length_squared()).clamp(0.0, 1.0);
                    beta = 1.0 - alpha;
                    gamma = 0.0;
                }
                clamped = true;
            } else if gamma >= 0.0 && alpha < 0.0 {
                let w = b - c;
                let t = -c.dot(v);
                if beta < 0.0 && t > 0.0 {
                    alpha = (t / v.length_squared()).min(1.0);
                    gamma = 1.0 - alpha;
                    beta = 0.0;
                } else {
                    beta = (-c.dot(w) / w.length_squared()).clamp(0.0, 1.0);
                    gamma = 1.0 - beta;
                    alpha = 0.0;
                }
                clamped = true;
            }
        }

        (Vec3::new(alpha, beta, gamma), clamped)
    }

    /// Witness points on A and B for the origin's projection onto `tri`.
    pub fn closest_points(&self, tri: &Triangle) -> (Vec3, Vec3) {
        let (bc, _) = self.barycentric(tri, !self.origin_enclosed);
        let (va, vb, vc) = (
            &self.vertices[tri.a],
            &self.vertices[tri.b],
            &self.vertices[tri.c],
        );
        (
            bc.x * va.a + bc.y * vb.a + bc.z * vc.a,
            bc.x * va.b + bc.y * vb.b + bc.z * vc.b,
        )
    }

    #[inline]
    fn is_lit(&self, candidate: usize, vertex: usize) -> bool {
        let tri = &self.triangles[candidate];
        (self.vertices[vertex].v - self.vertices[tri.a].v).dot(tri.normal) > 0.0
    }

    fn create_triangle(&mut self, a: usize, b: usize, c: usize) -> bool {
        if self.triangle_count == MAX_TRIANGLES {
            return false;
        }

        let mut tri = Triangle {
            a,
            b,
            c,
            ..Triangle::default()
        };

        let u = self.vertices[a].v - self.vertices[b].v;
        let v = self.vertices[a].v - self.vertices[c].v;
        tri.normal = u.cross(v);
        tri.normal_sq = tri.normal.length_squared();

        if tri.normal_sq < NUMERIC_EPSILON {
            return false;
        }

        // Orient outward, away from the interior reference point.
        if tri.normal.dot(self.vertices[a].v - self.center) < 0.0 {
            std::mem::swap(&mut tri.a, &mut tri.b);
            tri.normal = -tri.normal;
        }

        let delta = tri.normal.dot(self.vertices[tri.a].v);
        tri.facing_origin = delta >= 0.0;

        let projected = if self.origin_enclosed {
            None
        } else {
            match self.barycentric(&tri, true) {
                (bc, true) => Some(
                    bc.x * self.vertices[tri.a].v
                        + bc.y * self.vertices[tri.b].v
                        + bc.z * self.vertices[tri.c].v,
                ),
                (_, false) => None,
            }
        };

        tri.closest_to_origin = projected.unwrap_or(tri.normal * (delta / tri.normal_sq));
        tri.closest_to_origin_sq = tri.closest_to_origin.length_squared();

        self.triangles[self.triangle_count] = tri;
        self.triangle_count += 1;
        true
    }

    /// Triangle closest to the origin; also refreshes [`Self::origin_enclosed`].
    pub fn closest_triangle(&mut self) -> Option<Triangle> {
        let mut closest = None;
        let mut current_min = f32::MAX;
        self.origin_enclosed = true;

        for tri in &self.triangles[..self.triangle_count] {
            if tri.closest_to_origin_sq < current_min {
                current_min = tri.closest_to_origin_sq;
                closest = Some(*tri);
            }
            if !tri.facing_origin {
                self.origin_enclosed = false;
            }
        }

        closest
    }

    /// Adds a support vertex, deleting every triangle it can see and
    /// re-triangulating the hole. Returns whether the hull grew.
    pub fn add_vertex(&mut self, vertex: MinkowskiVertex) -> bool {
        if self.vertex_count == MAX_VERTICES {
            return false;
        }

        let new_index = self.vertex_count;
        self.vertices[new_index] = vertex;
        self.vertex_count += 1;

        let mut edge_count = 0;
        let mut index = self.triangle_count;
        while index > 0 {
            index -= 1;
            if !self.is_lit(index, new_index) {
                continue;
            }

            for k in 0..3 {
                let edge = self.triangles[index].edge(k);
                let mut added = true;

                // Shared edges between lit triangles cancel out.
                let mut e = edge_count;
                while e > 0 {
                    e -= 1;
                    if self.edges[e].same_undirected(&edge) {
                        edge_count -= 1;
                        self.edges[e] = self.edges[edge_count];
                        added = false;
                    }
                }

                if added {
                    if edge_count == MAX_HOLE_EDGES {
                        return false;
                    }
                    self.edges[edge_count] = edge;
                    edge_count += 1;
                }
            }

            self.triangle_count -= 1;
            self.triangles[index] = self.triangles[self.triangle_count];
        }

        for i in 0..edge_count {
            let edge = self.edges[i];
            if !self.create_triangle(edge.a, edge.b, new_index) {
                return false;
            }
        }

        edge_count > 0
    }
}
