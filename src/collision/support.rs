//! Support-map abstraction and Minkowski-difference helpers.
//!
//! Every narrow-phase algorithm is generic over [`SupportMap`] and runs with
//! shape A at the origin of its local frame while shape B is placed by a
//! relative pose.

use glam::{Quat, Vec3};

/// Convex shape described implicitly by its support function.
pub trait SupportMap {
    /// Furthest point of the shape along `direction` (need not be normalized).
    fn support(&self, direction: Vec3) -> Vec3;

    /// Any point strictly inside the shape.
    fn center(&self) -> Vec3;
}

impl<T: SupportMap + ?Sized> SupportMap for &T {
    #[inline]
    fn support(&self, direction: Vec3) -> Vec3 {
        (**self).support(direction)
    }

    #[inline]
    fn center(&self) -> Vec3 {
        (**self).center()
    }
}

/// A point of the Minkowski difference `A - B` with its originating support points.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MinkowskiVertex {
    pub v: Vec3,
    pub a: Vec3,
    pub b: Vec3,
}

impl MinkowskiVertex {
    /// A vertex without witness data, used by single-shape queries.
    pub fn from_point(v: Vec3) -> Self {
        Self {
            v,
            a: Vec3::ZERO,
            b: Vec3::ZERO,
        }
    }
}

/// `S_{A-B}(d) = S_A(d) - S_B(-d)` with B placed at `(orientation_b, position_b)`.
#[inline]
pub fn minkowski_support<A, B>(
    shape_a: &A,
    shape_b: &B,
    orientation_b: Quat,
    position_b: Vec3,
    direction: Vec3,
) -> MinkowskiVertex
where
    A: SupportMap + ?Sized,
    B: SupportMap + ?Sized,
{
    let a = shape_a.support(direction);
    let local = shape_b.support(orientation_b.conjugate() * -direction);
    let b = orientation_b * local + position_b;
    MinkowskiVertex { v: a - b, a, b }
}

/// An interior point of the Minkowski difference.
#[inline]
pub fn minkowski_center<A, B>(
    shape_a: &A,
    shape_b: &B,
    orientation_b: Quat,
    position_b: Vec3,
) -> MinkowskiVertex
where
    A: SupportMap + ?Sized,
    B: SupportMap + ?Sized,
{
    let a = shape_a.center();
    let b = orientation_b * shape_b.center() + position_b;
    MinkowskiVertex { v: a - b, a, b }
}
