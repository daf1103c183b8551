//! Expanding Polytope Algorithm.
//!
//! Two entry points share one loop: refinement of a final MPR portal, and a
//! standalone query seeded by a tiny tetrahedron around the Minkowski
//! difference's interior point. The latter also works for separated shapes
//! and then reports a negative depth.

use glam::{Quat, Vec3};
use log::warn;

use super::{
    gjk::NUMERIC_EPSILON,
    polytope::ConvexPolytope,
    support::{minkowski_center, minkowski_support, MinkowskiVertex, SupportMap},
};

/// Raw EPA output in A's local frame. `normal` points from A toward B.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Penetration {
    pub point_a: Vec3,
    pub point_b: Vec3,
    pub normal: Vec3,
    pub depth: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Seed {
    Portal,
    Interior,
}

pub struct EPAAlgorithm;

impl EPAAlgorithm {
    pub const MAX_ITERATIONS: usize = 85;
    const PORTAL_EPSILON: f32 = 1e-5;
    const INTERIOR_EPSILON: f32 = 1e-4;

    /// Refines the depth of a portal found by MPR. `seed` is the interior
    /// point followed by the three portal vertices.
    pub(crate) fn refine_portal<A, B>(
        polytope: &mut ConvexPolytope,
        seed: [MinkowskiVertex; 4],
        shape_a: &A,
        shape_b: &B,
        orientation_b: Quat,
        position_b: Vec3,
    ) -> Option<Penetration>
    where
        A: SupportMap + ?Sized,
        B: SupportMap + ?Sized,
    {
        polytope.init_tetrahedron(seed);
        Self::expand(polytope, Seed::Portal, shape_a, shape_b, orientation_b, position_b)
    }

    /// Signed penetration from the interior point. Negative depth means the
    /// shapes are separated by that distance.
    pub(crate) fn from_interior<A, B>(
        polytope: &mut ConvexPolytope,
        shape_a: &A,
        shape_b: &B,
        orientation_b: Quat,
        position_b: Vec3,
    ) -> Option<Penetration>
    where
        A: SupportMap + ?Sized,
        B: SupportMap + ?Sized,
    {
        let center = minkowski_center(shape_a, shape_b, orientation_b, position_b);
        polytope.init_tetrahedron_around(center.v);
        Self::expand(polytope, Seed::Interior, shape_a, shape_b, orientation_b, position_b)
    }

    fn expand<A, B>(
        polytope: &mut ConvexPolytope,
        seed: Seed,
        shape_a: &A,
        shape_b: &B,
        orientation_b: Quat,
        position_b: Vec3,
    ) -> Option<Penetration>
    where
        A: SupportMap + ?Sized,
        B: SupportMap + ?Sized,
    {
        let epsilon = match seed {
            Seed::Portal => Self::PORTAL_EPSILON,
            Seed::Interior => Self::INTERIOR_EPSILON,
        };

        let mut converged = None;

        for _ in 1..Self::MAX_ITERATIONS {
            let tri = polytope.closest_triangle()?;

            let mut search_dir = tri.closest_to_origin;
            let mut search_dir_sq = tri.closest_to_origin_sq;

            if seed == Seed::Interior && !polytope.origin_enclosed() {
                search_dir = -search_dir;
            }

            if tri.closest_to_origin_sq < NUMERIC_EPSILON {
                search_dir = tri.normal;
                search_dir_sq = tri.normal_sq;
            }

            let vertex = minkowski_support(shape_a, shape_b, orientation_b, position_b, search_dir);

            let delta = (tri.closest_to_origin - vertex.v).dot(search_dir);
            if delta * delta <= epsilon * epsilon * search_dir_sq {
                converged = Some(tri);
                break;
            }

            if !polytope.add_vertex(vertex) {
                converged = Some(tri);
                break;
            }
        }

        let Some(tri) = converged else {
            warn!(
                "EPA did not converge within {} iterations",
                Self::MAX_ITERATIONS
            );
            return None;
        };

        let (point_a, point_b) = polytope.closest_points(&tri);
        let face_normal = tri.normal / tri.normal_sq.sqrt();

        match seed {
            Seed::Portal => Some(Penetration {
                point_a,
                point_b,
                normal: face_normal,
                depth: tri.closest_to_origin_sq.sqrt(),
            }),
            Seed::Interior => {
                let mut depth = tri.closest_to_origin_sq.sqrt();
                if !polytope.origin_enclosed() {
                    depth = -depth;
                }

                let normal = if depth.abs() > NUMERIC_EPSILON {
                    tri.closest_to_origin / depth
                } else {
                    face_normal
                };

                Some(Penetration {
                    point_a,
                    point_b,
                    normal,
                    depth,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collider::ColliderShape;

    #[test]
    fn interior_seed_measures_box_overlap() {
        let a = ColliderShape::Box {
            half_extents: Vec3::splat(0.5),
        };
        let b = ColliderShape::Box {
            half_extents: Vec3::new(0.5, 1.0, 1.0),
        };
        let mut polytope = ConvexPolytope::new();
        let result = EPAAlgorithm::from_interior(
            &mut polytope,
            &a,
            &b,
            Quat::IDENTITY,
            Vec3::new(0.8, 0.0, 0.0),
        )
        .expect("EPA converges for boxes");
        assert!((result.depth - 0.2).abs() < 1e-2);
        assert!(result.normal.dot(Vec3::X) > 0.99);
    }

    #[test]
    fn interior_seed_reports_negative_depth_when_separated() {
        let a = ColliderShape::Box {
            half_extents: Vec3::splat(0.5),
        };
        let b = ColliderShape::Box {
            half_extents: Vec3::splat(0.5),
        };
        let mut polytope = ConvexPolytope::new();
        let result = EPAAlgorithm::from_interior(
            &mut polytope,
            &a,
            &b,
            Quat::IDENTITY,
            Vec3::new(0.0, 2.0, 0.0),
        )
        .expect("EPA converges for boxes");
        assert!((result.depth + 1.0).abs() < 1e-2);
        assert!(result.normal.dot(Vec3::Y) > 0.99);
    }
}
