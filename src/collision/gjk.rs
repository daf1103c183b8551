//! GJK queries over support maps: overlap, distance, point containment, ray cast,
//! and linear sweep.
//!
//! All functions work in the local frame of shape A (A at the origin, unrotated);
//! shape B is placed by `orientation_b` / `position_b`. Normals follow the crate
//! convention and point from B toward A.

use glam::{Quat, Vec3};
use log::warn;

use super::{
    simplex::{SimplexSolver, SimplexSolverAb},
    support::{minkowski_center, minkowski_support, MinkowskiVertex, SupportMap},
};

pub(crate) const NUMERIC_EPSILON: f32 = 1e-16;

/// Closest points between two separated shapes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPoints {
    pub point_a: Vec3,
    pub point_b: Vec3,
    /// Unit vector from `point_b` toward `point_a`.
    pub normal: Vec3,
    pub distance: f32,
}

/// Hit of a ray against a single shape: `origin + lambda * direction`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub lambda: f32,
    /// Outward surface normal; zero when the ray starts inside the shape.
    pub normal: Vec3,
}

/// Time of impact of a sweep, with witness points expressed at time zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepHit {
    pub point_a: Vec3,
    pub point_b: Vec3,
    /// Contact normal at impact, pointing from B toward A. Zero if the shapes
    /// already touch at time zero.
    pub normal: Vec3,
    /// Fraction of the sweep velocities at which the shapes first touch.
    pub lambda: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DistanceStatus {
    Separated,
    /// Origin enclosed or closer than the tolerance.
    Overlapping,
    /// Iteration cap hit; the values describe the last valid simplex.
    Exhausted,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct DistanceState {
    pub status: DistanceStatus,
    pub point_a: Vec3,
    pub point_b: Vec3,
    pub normal: Vec3,
    pub distance: f32,
}

/// Gilbert-Johnson-Keerthi queries.
pub struct GJKAlgorithm;

impl GJKAlgorithm {
    pub const MAX_ITERATIONS: usize = 34;
    pub const EPSILON: f32 = 1e-4;
    const SWEEP_PARALLEL_EPSILON: f32 = 1e-12;

    /// Boolean overlap test. Non-convergence is reported as `false`.
    pub fn overlap<A, B>(shape_a: &A, shape_b: &B, orientation_b: Quat, position_b: Vec3) -> bool
    where
        A: SupportMap + ?Sized,
        B: SupportMap + ?Sized,
    {
        let mut solver = SimplexSolver::new();
        let center = minkowski_center(shape_a, shape_b, orientation_b, position_b);

        let mut v = center.v;
        let mut dist_sq = v.length_squared();
        let mut iterations = 0;

        while dist_sq > Self::EPSILON * Self::EPSILON {
            if iterations == Self::MAX_ITERATIONS {
                warn!(
                    "GJK overlap did not converge within {} iterations",
                    Self::MAX_ITERATIONS
                );
                return false;
            }
            iterations += 1;

            let w = minkowski_support(shape_a, shape_b, orientation_b, position_b, -v);
            if v.dot(w.v) >= 0.0 {
                return false;
            }

            match solver.add_vertex(w.v) {
                Some(closest) => v = closest,
                None => return true,
            }
            dist_sq = v.length_squared();
        }

        true
    }

    pub(crate) fn distance_state<A, B>(
        shape_a: &A,
        shape_b: &B,
        orientation_b: Quat,
        position_b: Vec3,
    ) -> DistanceState
    where
        A: SupportMap + ?Sized,
        B: SupportMap + ?Sized,
    {
        let mut solver = SimplexSolverAb::new();
        let center = minkowski_center(shape_a, shape_b, orientation_b, position_b);

        let mut v = center.v;
        let mut dist_sq = v.length_squared();
        let mut status = DistanceStatus::Exhausted;

        for _ in 0..Self::MAX_ITERATIONS {
            if dist_sq < Self::EPSILON * Self::EPSILON {
                status = DistanceStatus::Overlapping;
                break;
            }

            let w = minkowski_support(shape_a, shape_b, orientation_b, position_b, -v);
            let delta = (v - w.v).dot(v);
            if delta * delta < Self::EPSILON * Self::EPSILON * dist_sq {
                status = DistanceStatus::Separated;
                break;
            }

            match solver.add_vertex(w) {
                Some(closest) => v = closest,
                None => {
                    status = DistanceStatus::Overlapping;
                    break;
                }
            }
            dist_sq = v.length_squared();
        }

        let (point_a, point_b) = solver.closest_points();
        if status == DistanceStatus::Overlapping {
            return DistanceState {
                status,
                point_a,
                point_b,
                normal: Vec3::ZERO,
                distance: 0.0,
            };
        }

        let distance = dist_sq.sqrt();
        DistanceState {
            status,
            point_a,
            point_b,
            normal: v / distance,
            distance,
        }
    }

    /// Distance and closest points of separated shapes.
    ///
    /// Returns `None` when the shapes overlap (or touch within tolerance) and
    /// when the iteration cap is exhausted.
    pub fn distance<A, B>(
        shape_a: &A,
        shape_b: &B,
        orientation_b: Quat,
        position_b: Vec3,
    ) -> Option<ClosestPoints>
    where
        A: SupportMap + ?Sized,
        B: SupportMap + ?Sized,
    {
        let state = Self::distance_state(shape_a, shape_b, orientation_b, position_b);
        match state.status {
            DistanceStatus::Separated => Some(ClosestPoints {
                point_a: state.point_a,
                point_b: state.point_b,
                normal: state.normal,
                distance: state.distance,
            }),
            DistanceStatus::Overlapping => None,
            DistanceStatus::Exhausted => {
                warn!(
                    "GJK distance did not converge within {} iterations",
                    Self::MAX_ITERATIONS
                );
                None
            }
        }
    }

    /// True if `point` (in the shape's local frame) lies inside the shape.
    pub fn point_test<S>(shape: &S, point: Vec3) -> bool
    where
        S: SupportMap + ?Sized,
    {
        let mut solver = SimplexSolver::new();
        let mut v = point - shape.center();
        let mut dist_sq = v.length_squared();
        let mut iterations = 0;

        while dist_sq > Self::EPSILON * Self::EPSILON && iterations < Self::MAX_ITERATIONS {
            iterations += 1;

            let w = point - shape.support(v);
            if v.dot(w) >= 0.0 {
                return false;
            }

            match solver.add_vertex(w) {
                Some(closest) => v = closest,
                None => return true,
            }
            dist_sq = v.length_squared();
        }

        true
    }

    /// Casts the ray `origin + lambda * direction` (local frame) against the shape.
    ///
    /// `direction` need not be normalized. Returns `None` if the ray misses or
    /// stops making progress.
    pub fn ray_cast<S>(shape: &S, origin: Vec3, direction: Vec3) -> Option<RayHit>
    where
        S: SupportMap + ?Sized,
    {
        let mut solver = SimplexSolver::new();
        let mut normal = Vec3::ZERO;
        let mut lambda = 0.0f32;

        let mut x = origin;
        let mut v = x - shape.center();
        let mut dist_sq = v.length_squared();
        let mut iterations = 0;

        while dist_sq > Self::EPSILON * Self::EPSILON && iterations < Self::MAX_ITERATIONS {
            iterations += 1;

            let p = shape.support(v);
            let mut w = x - p;
            let v_dot_w = v.dot(w);

            if v_dot_w > 0.0 {
                let v_dot_r = v.dot(direction);
                if v_dot_r >= -NUMERIC_EPSILON {
                    return None;
                }

                lambda -= v_dot_w / v_dot_r;
                x = origin + direction * lambda;
                w = x - p;
                normal = v;
            }

            match solver.add_vertex(w) {
                Some(closest) => v = closest,
                None => break,
            }
            dist_sq = v.length_squared();
        }

        let normal_sq = normal.length_squared();
        if normal_sq > NUMERIC_EPSILON {
            normal /= normal_sq.sqrt();
        }

        Some(RayHit { lambda, normal })
    }

    /// Time of impact for pure translation: A rests at the origin, B moves with
    /// `sweep_b` (relative to A, in A's frame).
    pub fn sweep_linear<A, B>(
        shape_a: &A,
        shape_b: &B,
        orientation_b: Quat,
        position_b: Vec3,
        sweep_b: Vec3,
    ) -> Option<SweepHit>
    where
        A: SupportMap + ?Sized,
        B: SupportMap + ?Sized,
    {
        let mut solver = SimplexSolverAb::new();
        let center = minkowski_center(shape_a, shape_b, orientation_b, position_b);

        let mut pos_b = position_b;
        let mut lambda = 0.0f32;
        let mut normal = Vec3::ZERO;

        let mut v = -center.v;
        let mut dist_sq = f32::MAX;
        let mut iterations = 0;

        while dist_sq > Self::EPSILON * Self::EPSILON && iterations < Self::MAX_ITERATIONS {
            iterations += 1;

            let vertex: MinkowskiVertex =
                minkowski_support(shape_a, shape_b, orientation_b, pos_b, v);
            let v_dot_w = -v.dot(vertex.v);

            if v_dot_w > 0.0 {
                let v_dot_r = v.dot(sweep_b);
                if v_dot_r >= -Self::SWEEP_PARALLEL_EPSILON {
                    return None;
                }

                lambda -= v_dot_w / v_dot_r;
                pos_b = position_b + lambda * sweep_b;
                normal = v;
            }

            match solver.add_vertex(vertex) {
                Some(closest) => v = -closest,
                None => break,
            }
            dist_sq = v.length_squared();
        }

        let (point_a, mut point_b) = solver.closest_points();
        // Back to time zero.
        point_b -= lambda * sweep_b;

        let normal_sq = normal.length_squared();
        if normal_sq > NUMERIC_EPSILON {
            normal /= normal_sq.sqrt();
        }

        Some(SweepHit {
            point_a,
            point_b,
            normal: -normal,
            lambda,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collider::ColliderShape;

    fn sphere(radius: f32) -> ColliderShape {
        ColliderShape::Sphere { radius }
    }

    #[test]
    fn overlap_matches_sphere_radii() {
        let a = sphere(0.5);
        let b = sphere(0.75);
        assert!(GJKAlgorithm::overlap(&a, &b, Quat::IDENTITY, Vec3::new(1.2, 0.0, 0.0)));
        assert!(!GJKAlgorithm::overlap(&a, &b, Quat::IDENTITY, Vec3::new(1.3, 0.0, 0.0)));
    }

    #[test]
    fn distance_between_spheres() {
        let a = sphere(0.5);
        let b = sphere(1.0);
        let result = GJKAlgorithm::distance(&a, &b, Quat::IDENTITY, Vec3::new(0.0, 4.0, 0.0))
            .expect("spheres are separated");
        assert!((result.distance - 2.5).abs() < 1e-3);
        assert!((result.normal - Vec3::NEG_Y).length() < 1e-3);
        assert!((result.point_a - Vec3::new(0.0, 0.5, 0.0)).length() < 1e-2);
        assert!((result.point_b - Vec3::new(0.0, 3.0, 0.0)).length() < 1e-2);
    }

    #[test]
    fn point_test_box() {
        let shape = ColliderShape::Box {
            half_extents: Vec3::splat(1.0),
        };
        assert!(GJKAlgorithm::point_test(&shape, Vec3::new(0.5, 0.9, -0.2)));
        assert!(!GJKAlgorithm::point_test(&shape, Vec3::new(1.5, 0.0, 0.0)));
    }

    #[test]
    fn ray_hits_sphere_front_face() {
        let shape = sphere(1.0);
        let hit = GJKAlgorithm::ray_cast(&shape, Vec3::new(-5.0, 0.0, 0.0), Vec3::X)
            .expect("ray points at the sphere");
        assert!((hit.lambda - 4.0).abs() < 1e-2);
        assert!((hit.normal - Vec3::NEG_X).length() < 1e-2);
    }

    #[test]
    fn ray_pointing_away_misses() {
        let shape = sphere(1.0);
        assert!(GJKAlgorithm::ray_cast(&shape, Vec3::new(-5.0, 0.0, 0.0), Vec3::NEG_X).is_none());
    }

    #[test]
    fn linear_sweep_finds_time_of_impact() {
        let a = sphere(1.0);
        let b = sphere(1.0);
        let hit = GJKAlgorithm::sweep_linear(
            &a,
            &b,
            Quat::IDENTITY,
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(-2.0, 0.0, 0.0),
        )
        .expect("B moves straight at A");
        assert!((hit.lambda - 4.0).abs() < 1e-2);
        assert!((hit.normal - Vec3::NEG_X).length() < 1e-2);
    }
}
