use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Below this squared direction component a ray is treated as parallel to a slab.
const RAY_PARALLEL_EPSILON: f32 = 1e-12;

/// Axis-aligned bounding box used by the broad phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            min: Vec3::ZERO,
            max: Vec3::ZERO,
        }
    }
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    pub fn extend(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn from_points(points: &[Vec3]) -> Self {
        let mut bounds = Self::empty();
        for &p in points {
            bounds.extend(p);
        }
        bounds
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    #[inline]
    pub fn merged(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Surface area in double precision; tree costs accumulate many of these.
    #[inline]
    pub fn surface_area(&self) -> f64 {
        let e = (self.max - self.min).as_dvec3();
        2.0 * (e.x * e.y + e.y * e.z + e.z * e.x)
    }

    /// Surface area of the box that would result from merging `self` and `other`.
    #[inline]
    pub fn merged_surface_area(&self, other: &Aabb) -> f64 {
        self.merged(other).surface_area()
    }

    /// True if `other` lies entirely inside this box.
    #[inline]
    pub fn encompasses(&self, other: &Aabb) -> bool {
        self.min.cmple(other.min).all() && self.max.cmpge(other.max).all()
    }

    /// True if the boxes touch or overlap.
    #[inline]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.min.cmple(point).all() && self.max.cmpge(point).all()
    }

    /// Grows the box along `direction` only, then pads every side by `margin`.
    pub fn expand_directional(&mut self, direction: Vec3, margin: f32) {
        for axis in 0..3 {
            if direction[axis] < 0.0 {
                self.min[axis] += direction[axis];
            } else {
                self.max[axis] += direction[axis];
            }
        }
        self.min -= Vec3::splat(margin);
        self.max += Vec3::splat(margin);
    }

    /// Slab test against the infinite ray `origin + t * direction`, `t >= 0`.
    ///
    /// Returns the entry parameter (zero when the origin is inside).
    pub fn ray_intersect(&self, origin: Vec3, direction: Vec3) -> Option<f32> {
        let mut enter = 0.0f32;
        let mut exit = f32::MAX;

        for axis in 0..3 {
            let start = origin[axis];
            let dir = direction[axis];
            let (min, max) = (self.min[axis], self.max[axis]);

            if dir * dir < RAY_PARALLEL_EPSILON * RAY_PARALLEL_EPSILON {
                if start < min || start > max {
                    return None;
                }
                continue;
            }

            let mut t0 = (min - start) / dir;
            let mut t1 = (max - start) / dir;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }

            if t0 > exit || t1 < enter {
                return None;
            }
            enter = enter.max(t0);
            exit = exit.min(t1);
        }

        Some(enter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Aabb {
        Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0))
    }

    #[test]
    fn touching_boxes_intersect() {
        let a = unit_box();
        let b = Aabb::new(Vec3::new(1.0, -1.0, -1.0), Vec3::new(3.0, 1.0, 1.0));
        assert!(a.intersects(&b));
        let c = Aabb::new(Vec3::new(1.01, -1.0, -1.0), Vec3::new(3.0, 1.0, 1.0));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn encompass_and_merge() {
        let a = unit_box();
        let inner = Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5));
        assert!(a.encompasses(&inner));
        assert!(!inner.encompasses(&a));

        let far = Aabb::new(Vec3::splat(4.0), Vec3::splat(5.0));
        let merged = a.merged(&far);
        assert!(merged.encompasses(&a) && merged.encompasses(&far));
        assert_eq!(unit_box().surface_area(), 24.0);
    }

    #[test]
    fn directional_expansion_only_grows_towards_motion() {
        let mut b = unit_box();
        b.expand_directional(Vec3::new(2.0, -1.0, 0.0), 0.1);
        assert!((b.max.x - 3.1).abs() < 1e-6);
        assert!((b.min.x + 1.1).abs() < 1e-6);
        assert!((b.min.y + 2.1).abs() < 1e-6);
        assert!((b.max.z - 1.1).abs() < 1e-6);
    }

    #[test]
    fn ray_entry_parameter() {
        let b = unit_box();
        let t = b
            .ray_intersect(Vec3::new(-5.0, 0.0, 0.0), Vec3::X)
            .expect("ray should enter box");
        assert!((t - 4.0).abs() < 1e-5);

        assert_eq!(b.ray_intersect(Vec3::ZERO, Vec3::Y), Some(0.0));
        assert!(b.ray_intersect(Vec3::new(-5.0, 2.0, 0.0), Vec3::X).is_none());
        assert!(b.ray_intersect(Vec3::new(5.0, 0.0, 0.0), Vec3::X).is_none());
    }
}
