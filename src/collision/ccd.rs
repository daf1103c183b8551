//! Continuous collision detection by conservative advancement.

use glam::Vec3;
use log::warn;

use super::{
    gjk::{DistanceState, DistanceStatus, GJKAlgorithm, SweepHit, NUMERIC_EPSILON},
    support::SupportMap,
};
use crate::{
    core::{
        collider::{Collider, ColliderShape},
        types::{Transform, Velocity},
    },
    utils::math::angular_velocity_to_quat,
};

/// One side of a sweep: a shape, its pose at time zero, its motion per unit of
/// `lambda`, and its extent (largest distance from the rotation center).
#[derive(Debug, Clone, Copy)]
pub struct SweepBody<'a, S: ?Sized> {
    pub shape: &'a S,
    pub transform: Transform,
    pub velocity: Velocity,
    pub extent: f32,
}

impl<'a> SweepBody<'a, ColliderShape> {
    /// Sweep input for a collider moving with its velocity scaled by `dt`.
    pub fn from_collider(collider: &'a Collider, dt: f32) -> Self {
        Self {
            shape: &collider.shape,
            transform: collider.transform,
            velocity: Velocity {
                linear: collider.velocity.linear * dt,
                angular: collider.velocity.angular * dt,
            },
            extent: collider.bounding_radius(),
        }
    }
}

/// Time-of-impact search for shapes moving linearly and angularly.
pub struct ConservativeAdvancement;

impl ConservativeAdvancement {
    pub const EPSILON: f32 = 1e-4;
    pub const MAX_ITERATIONS: usize = 64;

    /// Finds the first `lambda >= 0` at which the moving shapes touch.
    ///
    /// Each iteration advances by `distance / closing_speed`, where the closing
    /// speed bounds the linear approach along the current normal plus the
    /// angular motion of both extents, so the shapes never tunnel. Returned
    /// points are world-space witnesses moved back to time zero. Shapes that
    /// already touch report `lambda == 0` and a zero normal.
    pub fn sweep<A, B>(a: &SweepBody<'_, A>, b: &SweepBody<'_, B>) -> Option<SweepHit>
    where
        A: SupportMap + ?Sized,
        B: SupportMap + ?Sized,
    {
        let max_angular_speed =
            a.extent * a.velocity.angular.length() + b.extent * b.velocity.angular.length();
        let combined_radius = a.extent + b.extent;
        let relative_linear = a.velocity.linear - b.velocity.linear;

        let mut pose_a = a.transform;
        let mut pose_b = b.transform;
        let mut lambda = 0.0f32;

        let mut state = world_distance(a.shape, &pose_a, b.shape, &pose_b);
        if state.status == DistanceStatus::Exhausted {
            warn!("sweep: initial distance query did not converge");
            return None;
        }
        if state.distance < Self::EPSILON {
            return Some(SweepHit {
                point_a: state.point_a,
                point_b: state.point_b,
                normal: Vec3::ZERO,
                lambda: 0.0,
            });
        }

        let mut normal = state.normal;
        let mut iterations = 0;

        loop {
            // Closing speed along the direction from A toward B.
            let linear_projection = (-normal).dot(relative_linear);
            let closing_speed = linear_projection + max_angular_speed;

            if closing_speed < NUMERIC_EPSILON
                || (linear_projection < 0.0 && state.distance > combined_radius)
            {
                return None;
            }

            lambda += state.distance / closing_speed;

            let delta_a = angular_velocity_to_quat(a.velocity.angular, lambda);
            let delta_b = angular_velocity_to_quat(b.velocity.angular, lambda);
            pose_a = Transform::new(
                a.transform.position + a.velocity.linear * lambda,
                delta_a * a.transform.rotation,
            );
            pose_b = Transform::new(
                b.transform.position + b.velocity.linear * lambda,
                delta_b * b.transform.rotation,
            );

            iterations += 1;
            if iterations > Self::MAX_ITERATIONS {
                warn!(
                    "sweep did not converge within {} iterations",
                    Self::MAX_ITERATIONS
                );
                return None;
            }

            state = world_distance(a.shape, &pose_a, b.shape, &pose_b);
            // Overlapping results carry no usable normal; keep the previous one.
            if state.status == DistanceStatus::Separated {
                normal = state.normal;
            }
            if state.status == DistanceStatus::Overlapping || state.distance < Self::EPSILON {
                break;
            }
        }

        // Undo the rotation accumulated up to the final lambda.
        let delta_a = angular_velocity_to_quat(a.velocity.angular, lambda);
        let delta_b = angular_velocity_to_quat(b.velocity.angular, lambda);
        let offset_a = state.point_a - pose_a.position;
        let offset_b = state.point_b - pose_b.position;
        let point_a = state.point_a
            - (a.velocity.linear * lambda + (offset_a - delta_a.conjugate() * offset_a));
        let point_b = state.point_b
            - (b.velocity.linear * lambda + (offset_b - delta_b.conjugate() * offset_b));

        Some(SweepHit {
            point_a,
            point_b,
            normal,
            lambda,
        })
    }
}

/// Distance query on world poses; results are mapped back to world space.
fn world_distance<A, B>(
    shape_a: &A,
    transform_a: &Transform,
    shape_b: &B,
    transform_b: &Transform,
) -> DistanceState
where
    A: SupportMap + ?Sized,
    B: SupportMap + ?Sized,
{
    let relative = transform_a.relative(transform_b);
    let mut state =
        GJKAlgorithm::distance_state(shape_a, shape_b, relative.rotation, relative.position);
    state.point_a = transform_a.transform_point(state.point_a);
    state.point_b = transform_a.transform_point(state.point_b);
    state.normal = transform_a.rotation * state.normal;
    if state.status == DistanceStatus::Overlapping {
        state.distance = 0.0;
    }
    state
}

/// Speed-gated continuous collision check between colliders over one step.
pub struct CCDDetector {
    pub enabled: bool,
    /// Pairs whose combined motion over the step is below this distance are skipped.
    pub motion_threshold: f32,
}

impl Default for CCDDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl CCDDetector {
    pub fn new() -> Self {
        Self {
            enabled: true,
            motion_threshold: 0.0,
        }
    }

    /// Time of impact within `[0, dt]` as a fraction of the step, if any.
    pub fn detect(&self, collider_a: &Collider, collider_b: &Collider, dt: f32) -> Option<SweepHit> {
        if !self.enabled {
            return None;
        }

        let a = SweepBody::from_collider(collider_a, dt);
        let b = SweepBody::from_collider(collider_b, dt);

        let motion = (a.velocity.linear - b.velocity.linear).length()
            + a.extent * a.velocity.angular.length()
            + b.extent * b.velocity.angular.length();
        if motion < self.motion_threshold {
            return None;
        }

        ConservativeAdvancement::sweep(&a, &b).filter(|hit| hit.lambda <= 1.0)
    }
}
