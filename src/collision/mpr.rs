//! Minkowski Portal Refinement (XenoCollide).
//!
//! Finds a portal triangle of `A - B` that the ray from the interior point
//! toward the origin passes through, then pushes the portal outward until it
//! hugs the boundary. The depth along the portal normal is an upper bound on
//! the true penetration; deep results are handed to EPA for refinement.

use glam::{Quat, Vec3};
use log::{debug, warn};

use super::{
    contact::{Contact, DepthRefinement},
    epa::EPAAlgorithm,
    gjk::NUMERIC_EPSILON,
    polytope::ConvexPolytope,
    support::{minkowski_center, minkowski_support, MinkowskiVertex, SupportMap},
};

pub struct MPRAlgorithm;

impl MPRAlgorithm {
    pub const MAX_ITERATIONS: usize = 34;
    pub const EPSILON: f32 = 1e-5;
    const SPHERICAL_EPSILON: f32 = 1e-12;
    const CENTER_NUDGE: f32 = 1e-5;

    /// Penetration test in A's local frame.
    ///
    /// Returns `None` when the shapes are separated. If the MPR depth exceeds
    /// `epa_threshold`, EPA is run on the final portal using `polytope` as
    /// scratch space.
    pub fn solve<A, B>(
        shape_a: &A,
        shape_b: &B,
        orientation_b: Quat,
        position_b: Vec3,
        epa_threshold: f32,
        polytope: &mut ConvexPolytope,
    ) -> Option<Contact>
    where
        A: SupportMap + ?Sized,
        B: SupportMap + ?Sized,
    {
        let support = |direction: Vec3| -> MinkowskiVertex {
            minkowski_support(shape_a, shape_b, orientation_b, position_b, direction)
        };

        let mut v0 = minkowski_center(shape_a, shape_b, orientation_b, position_b);
        if v0.v.abs().max_element() < NUMERIC_EPSILON {
            // Any direction will do.
            v0.v.x = Self::CENTER_NUDGE;
        }

        let mut normal = -v0.v;
        let mut v1 = support(normal);
        if v1.v.dot(normal) <= 0.0 {
            return None;
        }

        normal = v1.v.cross(v0.v);
        if normal.length_squared() < Self::SPHERICAL_EPSILON {
            // Origin, v0 and v1 are collinear; typical for two spheres.
            let axis = (v1.v - v0.v).normalize_or_zero();
            return Some(Contact {
                point_a: v1.a,
                point_b: v1.b,
                normal: -axis,
                penetration: (v1.a - v1.b).dot(axis),
                refinement: DepthRefinement::Mpr,
            });
        }

        let mut v2 = support(normal);
        if v2.v.dot(normal) <= 0.0 {
            return None;
        }

        normal = (v1.v - v0.v).cross(v2.v - v0.v);
        if normal.dot(v0.v) > 0.0 {
            // Origin lies on the negative side of (v1, v0, v2).
            std::mem::swap(&mut v1, &mut v2);
            normal = -normal;
        }

        // Phase one: find a portal the origin ray passes through.
        let mut v3;
        let mut phase_one = 0;
        loop {
            if phase_one > Self::MAX_ITERATIONS {
                warn!(
                    "MPR portal discovery did not converge within {} iterations",
                    Self::MAX_ITERATIONS
                );
                return None;
            }
            phase_one += 1;

            v3 = support(normal);
            if v3.v.dot(normal) <= 0.0 {
                return None;
            }

            if v1.v.cross(v3.v).dot(v0.v) < 0.0 {
                v2 = v3;
                normal = (v1.v - v0.v).cross(v3.v - v0.v);
                continue;
            }

            if v3.v.cross(v2.v).dot(v0.v) < 0.0 {
                v1 = v3;
                normal = (v3.v - v0.v).cross(v2.v - v0.v);
                continue;
            }

            break;
        }

        // Phase two: refine the portal until it touches the boundary.
        let mut phase_two = 0;
        let mut hit = false;
        loop {
            phase_two += 1;

            let edge1 = v2.v - v1.v;
            let edge2 = v3.v - v1.v;
            let portal_normal = edge1.cross(edge2);
            let normal_sq = portal_normal.length_squared();

            if normal_sq < NUMERIC_EPSILON {
                debug!("MPR portal collapsed to a degenerate triangle");
                return None;
            }

            if !hit {
                hit = portal_normal.dot(v1.v) >= 0.0;
            }

            let v4 = support(portal_normal);
            let delta = (v4.v - v3.v).dot(portal_normal);
            let depth = v4.v.dot(portal_normal);

            if delta * delta <= Self::EPSILON * Self::EPSILON * normal_sq
                || depth <= 0.0
                || phase_two > Self::MAX_ITERATIONS
            {
                if !hit {
                    return None;
                }

                let inv_len = 1.0 / normal_sq.sqrt();
                let penetration = depth * inv_len;
                let mut refinement = DepthRefinement::Mpr;

                if penetration > epa_threshold {
                    match EPAAlgorithm::refine_portal(
                        polytope,
                        [v0, v1, v2, v3],
                        shape_a,
                        shape_b,
                        orientation_b,
                        position_b,
                    ) {
                        Some(epa) => {
                            return Some(Contact {
                                point_a: epa.point_a,
                                point_b: epa.point_b,
                                normal: -epa.normal,
                                penetration: epa.depth,
                                refinement: DepthRefinement::Epa,
                            });
                        }
                        None => refinement = DepthRefinement::EpaFailed,
                    }
                }

                let unit_normal = portal_normal * inv_len;

                // Barycentric coordinates of the origin's projection on the portal.
                let gamma = v1.v.cross(edge1).dot(unit_normal) * inv_len;
                let beta = edge2.cross(v1.v).dot(unit_normal) * inv_len;
                let alpha = 1.0 - gamma - beta;

                return Some(Contact {
                    point_a: alpha * v1.a + beta * v2.a + gamma * v3.a,
                    point_b: alpha * v1.b + beta * v2.b + gamma * v3.b,
                    normal: -unit_normal,
                    penetration,
                    refinement,
                });
            }

            // Split the portal by the plane through (v4, v0) and keep the
            // half the origin ray passes through.
            let split = v4.v.cross(v0.v);
            if split.dot(v1.v) >= 0.0 {
                if split.dot(v2.v) >= 0.0 {
                    v1 = v4;
                } else {
                    v3 = v4;
                }
            } else if split.dot(v3.v) >= 0.0 {
                v2 = v4;
            } else {
                v1 = v4;
            }
        }
    }
}
