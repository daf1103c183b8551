//! Narrow-phase entry points.
//!
//! Every query exists in two flavours. The `*_local` functions run in the
//! frame of shape A (A at the origin, unrotated) with B placed by a relative
//! pose. The plain functions take world poses, move B into A's frame, run the
//! local query, and map the results back to world space.

use glam::{Quat, Vec3};

use super::{
    ccd::{ConservativeAdvancement, SweepBody},
    contact::{Contact, DepthRefinement},
    epa::EPAAlgorithm,
    gjk::{ClosestPoints, GJKAlgorithm, RayHit, SweepHit},
    mpr::MPRAlgorithm,
    polytope::ConvexPolytope,
    support::SupportMap,
};
use crate::{
    config::DEFAULT_EPA_THRESHOLD,
    core::types::{Transform, Velocity},
};

/// Per-worker narrow-phase context.
///
/// Owns the EPA polytope scratch so penetration queries never allocate.
/// Queries that need no scratch are associated functions.
pub struct NarrowPhase {
    polytope: Box<ConvexPolytope>,
    epa_threshold: f32,
}

impl Default for NarrowPhase {
    fn default() -> Self {
        Self::new()
    }
}

impl NarrowPhase {
    pub fn new() -> Self {
        Self::with_epa_threshold(DEFAULT_EPA_THRESHOLD)
    }

    /// MPR results deeper than `epa_threshold` are refined with EPA.
    pub fn with_epa_threshold(epa_threshold: f32) -> Self {
        Self {
            polytope: Box::default(),
            epa_threshold,
        }
    }

    pub fn epa_threshold(&self) -> f32 {
        self.epa_threshold
    }

    pub fn set_epa_threshold(&mut self, epa_threshold: f32) {
        self.epa_threshold = epa_threshold;
    }

    // Local frame

    pub fn overlap_local<A, B>(shape_a: &A, shape_b: &B, orientation_b: Quat, position_b: Vec3) -> bool
    where
        A: SupportMap + ?Sized,
        B: SupportMap + ?Sized,
    {
        GJKAlgorithm::overlap(shape_a, shape_b, orientation_b, position_b)
    }

    pub fn distance_local<A, B>(
        shape_a: &A,
        shape_b: &B,
        orientation_b: Quat,
        position_b: Vec3,
    ) -> Option<ClosestPoints>
    where
        A: SupportMap + ?Sized,
        B: SupportMap + ?Sized,
    {
        GJKAlgorithm::distance(shape_a, shape_b, orientation_b, position_b)
    }

    /// MPR penetration with EPA refinement above the threshold.
    pub fn mpr_epa_local<A, B>(
        &mut self,
        shape_a: &A,
        shape_b: &B,
        orientation_b: Quat,
        position_b: Vec3,
    ) -> Option<Contact>
    where
        A: SupportMap + ?Sized,
        B: SupportMap + ?Sized,
    {
        MPRAlgorithm::solve(
            shape_a,
            shape_b,
            orientation_b,
            position_b,
            self.epa_threshold,
            &mut self.polytope,
        )
    }

    /// EPA from the interior point. The penetration is signed: negative values
    /// are the separation distance of disjoint shapes.
    pub fn collision_local<A, B>(
        &mut self,
        shape_a: &A,
        shape_b: &B,
        orientation_b: Quat,
        position_b: Vec3,
    ) -> Option<Contact>
    where
        A: SupportMap + ?Sized,
        B: SupportMap + ?Sized,
    {
        let result =
            EPAAlgorithm::from_interior(&mut self.polytope, shape_a, shape_b, orientation_b, position_b)?;
        Some(Contact {
            point_a: result.point_a,
            point_b: result.point_b,
            normal: -result.normal,
            penetration: result.depth,
            refinement: DepthRefinement::Epa,
        })
    }

    pub fn point_test_local<S>(shape: &S, point: Vec3) -> bool
    where
        S: SupportMap + ?Sized,
    {
        GJKAlgorithm::point_test(shape, point)
    }

    pub fn ray_cast_local<S>(shape: &S, origin: Vec3, direction: Vec3) -> Option<RayHit>
    where
        S: SupportMap + ?Sized,
    {
        GJKAlgorithm::ray_cast(shape, origin, direction)
    }

    /// Conservative advancement with A resting at the origin of its frame.
    /// Velocities are expressed in A's frame.
    #[allow(clippy::too_many_arguments)]
    pub fn sweep_local<A, B>(
        shape_a: &A,
        shape_b: &B,
        orientation_b: Quat,
        position_b: Vec3,
        velocity_a: Velocity,
        velocity_b: Velocity,
        extent_a: f32,
        extent_b: f32,
    ) -> Option<SweepHit>
    where
        A: SupportMap + ?Sized,
        B: SupportMap + ?Sized,
    {
        let a = SweepBody {
            shape: shape_a,
            transform: Transform::default(),
            velocity: velocity_a,
            extent: extent_a,
        };
        let b = SweepBody {
            shape: shape_b,
            transform: Transform::new(position_b, orientation_b),
            velocity: velocity_b,
            extent: extent_b,
        };
        ConservativeAdvancement::sweep(&a, &b)
    }

    /// Pure translation sweep; `sweep_b` is B's motion relative to A.
    pub fn sweep_linear_local<A, B>(
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
        GJKAlgorithm::sweep_linear(shape_a, shape_b, orientation_b, position_b, sweep_b)
    }

    // World frame

    pub fn overlap<A, B>(shape_a: &A, transform_a: &Transform, shape_b: &B, transform_b: &Transform) -> bool
    where
        A: SupportMap + ?Sized,
        B: SupportMap + ?Sized,
    {
        let relative = transform_a.relative(transform_b);
        Self::overlap_local(shape_a, shape_b, relative.rotation, relative.position)
    }

    pub fn distance<A, B>(
        shape_a: &A,
        transform_a: &Transform,
        shape_b: &B,
        transform_b: &Transform,
    ) -> Option<ClosestPoints>
    where
        A: SupportMap + ?Sized,
        B: SupportMap + ?Sized,
    {
        let relative = transform_a.relative(transform_b);
        let local = Self::distance_local(shape_a, shape_b, relative.rotation, relative.position)?;
        Some(ClosestPoints {
            point_a: transform_a.transform_point(local.point_a),
            point_b: transform_a.transform_point(local.point_b),
            normal: transform_a.rotation * local.normal,
            distance: local.distance,
        })
    }

    pub fn mpr_epa<A, B>(
        &mut self,
        shape_a: &A,
        transform_a: &Transform,
        shape_b: &B,
        transform_b: &Transform,
    ) -> Option<Contact>
    where
        A: SupportMap + ?Sized,
        B: SupportMap + ?Sized,
    {
        let relative = transform_a.relative(transform_b);
        self.mpr_epa_local(shape_a, shape_b, relative.rotation, relative.position)
            .map(|contact| contact.transformed(transform_a))
    }

    pub fn collision<A, B>(
        &mut self,
        shape_a: &A,
        transform_a: &Transform,
        shape_b: &B,
        transform_b: &Transform,
    ) -> Option<Contact>
    where
        A: SupportMap + ?Sized,
        B: SupportMap + ?Sized,
    {
        let relative = transform_a.relative(transform_b);
        self.collision_local(shape_a, shape_b, relative.rotation, relative.position)
            .map(|contact| contact.transformed(transform_a))
    }

    pub fn point_test<S>(shape: &S, transform: &Transform, point: Vec3) -> bool
    where
        S: SupportMap + ?Sized,
    {
        Self::point_test_local(shape, transform.inverse_transform_point(point))
    }

    pub fn ray_cast<S>(shape: &S, transform: &Transform, origin: Vec3, direction: Vec3) -> Option<RayHit>
    where
        S: SupportMap + ?Sized,
    {
        let inv = transform.rotation.conjugate();
        let hit = Self::ray_cast_local(
            shape,
            transform.inverse_transform_point(origin),
            inv * direction,
        )?;
        Some(RayHit {
            lambda: hit.lambda,
            normal: transform.rotation * hit.normal,
        })
    }

    pub fn sweep<A, B>(a: &SweepBody<'_, A>, b: &SweepBody<'_, B>) -> Option<SweepHit>
    where
        A: SupportMap + ?Sized,
        B: SupportMap + ?Sized,
    {
        ConservativeAdvancement::sweep(a, b)
    }

    /// Pure translation sweep with world-space motions `sweep_a` and `sweep_b`.
    /// Returned points lie on each shape at time zero.
    #[allow(clippy::too_many_arguments)]
    pub fn sweep_linear<A, B>(
        shape_a: &A,
        transform_a: &Transform,
        sweep_a: Vec3,
        shape_b: &B,
        transform_b: &Transform,
        sweep_b: Vec3,
    ) -> Option<SweepHit>
    where
        A: SupportMap + ?Sized,
        B: SupportMap + ?Sized,
    {
        let relative = transform_a.relative(transform_b);
        let sweep = transform_a.rotation.conjugate() * (sweep_b - sweep_a);
        let hit = Self::sweep_linear_local(shape_a, shape_b, relative.rotation, relative.position, sweep)?;
        Some(SweepHit {
            point_a: transform_a.transform_point(hit.point_a),
            point_b: transform_a.transform_point(hit.point_b),
            normal: transform_a.rotation * hit.normal,
            lambda: hit.lambda,
        })
    }
}
