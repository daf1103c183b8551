//! Contact results and multi-point manifold reconstruction.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::{clipping::Silhouette, support::SupportMap};
use crate::core::types::Transform;

/// Which algorithm produced the reported penetration depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepthRefinement {
    /// MPR result below the refinement threshold.
    Mpr,
    /// MPR result replaced by an exact EPA depth.
    Epa,
    /// EPA was attempted but did not converge; the MPR estimate is reported.
    EpaFailed,
}

/// A single contact between two shapes.
///
/// `normal` points from B toward A; `penetration` is positive when the
/// shapes overlap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub point_a: Vec3,
    pub point_b: Vec3,
    pub normal: Vec3,
    pub penetration: f32,
    pub refinement: DepthRefinement,
}

impl Contact {
    /// Same contact seen from the other shape.
    pub fn flipped(&self) -> Self {
        Self {
            point_a: self.point_b,
            point_b: self.point_a,
            normal: -self.normal,
            ..*self
        }
    }

    pub(crate) fn transformed(&self, transform: &Transform) -> Self {
        Self {
            point_a: transform.transform_point(self.point_a),
            point_b: transform.transform_point(self.point_b),
            normal: transform.rotation * self.normal,
            ..*self
        }
    }
}

/// Up to six matched contact point pairs for one shape pair.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContactManifold {
    point_a: [Vec3; Self::MAX_POINTS],
    point_b: [Vec3; Self::MAX_POINTS],
    count: usize,
}

const SQRT3_OVER_2: f32 = 0.866_025_4;

const HEXAGON: [(f32, f32); 6] = [
    (1.0, 0.0),
    (0.5, SQRT3_OVER_2),
    (-0.5, SQRT3_OVER_2),
    (-1.0, 0.0),
    (-0.5, -SQRT3_OVER_2),
    (0.5, -SQRT3_OVER_2),
];

impl ContactManifold {
    pub const MAX_POINTS: usize = 6;
    pub const PERTURBATION: f32 = 0.01;

    /// Manifold holding only the pair of `contact`.
    pub fn from_contact(contact: &Contact) -> Self {
        let mut manifold = Self::default();
        manifold.push(contact.point_a, contact.point_b);
        manifold
    }

    /// Rebuilds a manifold around a confirmed world-space contact.
    ///
    /// Both shapes are support-mapped along six slightly tilted copies of the
    /// contact normal. Points of one silhouette that fall inside the other are
    /// projected onto the contact plane and paired; the original pair is
    /// appended last when room remains.
    pub fn build<A, B>(
        shape_a: &A,
        transform_a: &Transform,
        shape_b: &B,
        transform_b: &Transform,
        contact: &Contact,
    ) -> Self
    where
        A: SupportMap + ?Sized,
        B: SupportMap + ?Sized,
    {
        let mut manifold = Self::default();

        // A is pushed along the direction toward B.
        let normal = -contact.normal;
        let tangent_u = normal.any_orthonormal_vector();
        let tangent_v = normal.cross(tangent_u);

        let mut left = Silhouette::new();
        let mut right = Silhouette::new();

        for (u, v) in HEXAGON {
            let tilted =
                normal + u * Self::PERTURBATION * tangent_u + v * Self::PERTURBATION * tangent_v;

            left.push(world_support(shape_a, transform_a, tilted));
            right.push(world_support(shape_b, transform_b, -tilted));
        }

        if left.len() > 2 {
            for &p in right.points() {
                if left.contains(p) {
                    let diff = (p - contact.point_a).dot(normal);
                    manifold.push(p - diff * normal, p);
                    if manifold.is_full() {
                        return manifold;
                    }
                }
            }
        }

        if right.len() > 2 {
            for &p in left.points() {
                if right.contains(p) {
                    let diff = (p - contact.point_b).dot(normal);
                    manifold.push(p, p - diff * normal);
                    if manifold.is_full() {
                        return manifold;
                    }
                }
            }
        }

        manifold.push(contact.point_a, contact.point_b);
        manifold
    }

    fn push(&mut self, point_a: Vec3, point_b: Vec3) {
        if self.is_full() {
            return;
        }
        self.point_a[self.count] = point_a;
        self.point_b[self.count] = point_b;
        self.count += 1;
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count == Self::MAX_POINTS
    }

    pub fn points_a(&self) -> &[Vec3] {
        &self.point_a[..self.count]
    }

    pub fn points_b(&self) -> &[Vec3] {
        &self.point_b[..self.count]
    }

    /// Matched `(point_a, point_b)` pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (Vec3, Vec3)> + '_ {
        self.points_a()
            .iter()
            .copied()
            .zip(self.points_b().iter().copied())
    }
}

#[inline]
fn world_support<S>(shape: &S, transform: &Transform, direction: Vec3) -> Vec3
where
    S: SupportMap + ?Sized,
{
    let local = shape.support(transform.rotation.conjugate() * direction);
    transform.rotation * local + transform.position
}
