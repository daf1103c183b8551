//! Silhouette point sets used by manifold reconstruction.

use glam::Vec3;

/// Squared distance below which two silhouette points are merged.
pub const DEDUP_EPSILON_SQ: f32 = 1e-3;
/// Minimum agreement of edge cross products for a point to count as inside.
pub const SAME_SIGN_EPSILON: f32 = 1e-3;

pub const MAX_SILHOUETTE_POINTS: usize = 6;

/// Up to six support points gathered around a contact normal, in insertion
/// order (which is the winding order of the perturbation hexagon).
#[derive(Debug, Clone, Copy, Default)]
pub struct Silhouette {
    points: [Vec3; MAX_SILHOUETTE_POINTS],
    len: usize,
}

impl Silhouette {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points[..self.len]
    }

    /// Appends `point` unless it nearly coincides with the first or the last
    /// stored point. Returns whether it was stored.
    pub fn push(&mut self, point: Vec3) -> bool {
        if self.len == MAX_SILHOUETTE_POINTS {
            return false;
        }
        if self.len > 0 && (self.points[0] - point).length_squared() < DEDUP_EPSILON_SQ {
            return false;
        }
        if self.len > 1 && (self.points[self.len - 1] - point).length_squared() < DEDUP_EPSILON_SQ {
            return false;
        }

        self.points[self.len] = point;
        self.len += 1;
        true
    }

    /// Whether `point` lies on the same side of every edge of this polygon.
    ///
    /// Needs at least three points; smaller silhouettes contain nothing.
    pub fn contains(&self, point: Vec3) -> bool {
        if self.len < 3 {
            return false;
        }

        let poly = self.points();
        let closing = edge_cross(poly[self.len - 1], poly[0], point);

        poly.windows(2)
            .all(|edge| closing.dot(edge_cross(edge[0], edge[1], point)) > SAME_SIGN_EPSILON)
    }
}

#[inline]
fn edge_cross(a: Vec3, b: Vec3, point: Vec3) -> Vec3 {
    (b - a).cross(point - a)
}
