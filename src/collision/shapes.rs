use glam::{Mat3, Vec3};

use super::support::SupportMap;
use crate::core::{aabb::Aabb, collider::ColliderShape, types::Transform};

const ZERO_EPSILON: f32 = 1e-12;

/// Helper utilities for computing support points and bounds of collider shapes.
pub struct ShapeUtil;

impl ShapeUtil {
    pub fn support(shape: &ColliderShape, direction: Vec3) -> Vec3 {
        match shape {
            ColliderShape::Sphere { radius } => direction.normalize_or_zero() * *radius,
            ColliderShape::Box { half_extents } => Vec3::new(
                if direction.x >= 0.0 { half_extents.x } else { -half_extents.x },
                if direction.y >= 0.0 { half_extents.y } else { -half_extents.y },
                if direction.z >= 0.0 { half_extents.z } else { -half_extents.z },
            ),
            ColliderShape::Capsule { radius, height } => {
                let mut point = direction.normalize_or_zero() * *radius;
                point.y += if direction.y >= 0.0 { 0.5 * height } else { -0.5 * height };
                point
            }
            ColliderShape::Cylinder { radius, height } => {
                let sigma = (direction.x * direction.x + direction.z * direction.z).sqrt();
                let y = axial_sign(direction.y) * 0.5 * height;
                if sigma > 0.0 {
                    Vec3::new(direction.x / sigma * radius, y, direction.z / sigma * radius)
                } else {
                    Vec3::new(0.0, y, 0.0)
                }
            }
            ColliderShape::Cone { radius, height } => {
                // Disk at -h/4 versus tip at 3h/4.
                let mut rim = Vec3::new(direction.x, 0.0, direction.z);
                let rim_sq = rim.length_squared();
                if rim_sq > ZERO_EPSILON {
                    rim *= radius / rim_sq.sqrt();
                }
                rim.y = -0.25 * height;

                if direction.dot(rim) >= direction.y * 0.75 * height {
                    rim
                } else {
                    Vec3::new(0.0, 0.75 * height, 0.0)
                }
            }
            ColliderShape::ConvexHull { vertices } => furthest_vertex(vertices, direction),
            ColliderShape::Triangle { a, b, c } => furthest_vertex(&[*a, *b, *c], direction),
        }
    }

    pub fn center(shape: &ColliderShape) -> Vec3 {
        match shape {
            ColliderShape::ConvexHull { vertices } => {
                vertices.iter().copied().sum::<Vec3>() / vertices.len().max(1) as f32
            }
            ColliderShape::Triangle { a, b, c } => (*a + *b + *c) / 3.0,
            _ => Vec3::ZERO,
        }
    }

    /// World-space bounding box of `shape` under `transform`.
    pub fn world_aabb(shape: &ColliderShape, transform: &Transform) -> Aabb {
        match shape {
            ColliderShape::Sphere { radius } => {
                Aabb::from_center_half_extents(transform.position, Vec3::splat(*radius))
            }
            ColliderShape::Box { half_extents } => {
                let rot = Mat3::from_quat(transform.rotation);
                let abs = Mat3::from_cols(rot.x_axis.abs(), rot.y_axis.abs(), rot.z_axis.abs());
                Aabb::from_center_half_extents(transform.position, abs * *half_extents)
            }
            _ => {
                // Six support queries along the world axes.
                let inv = transform.rotation.conjugate();
                let mut min = Vec3::ZERO;
                let mut max = Vec3::ZERO;
                for (axis, dir) in [Vec3::X, Vec3::Y, Vec3::Z].into_iter().enumerate() {
                    let hi = transform.rotation * Self::support(shape, inv * dir);
                    let lo = transform.rotation * Self::support(shape, inv * -dir);
                    max[axis] = hi[axis];
                    min[axis] = lo[axis];
                }
                Aabb::new(min + transform.position, max + transform.position)
            }
        }
    }
}

#[inline]
fn axial_sign(value: f32) -> f32 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn furthest_vertex(vertices: &[Vec3], direction: Vec3) -> Vec3 {
    let mut best = vertices.first().copied().unwrap_or(Vec3::ZERO);
    let mut best_dot = best.dot(direction);
    for v in vertices.iter().skip(1) {
        let dot = v.dot(direction);
        if dot > best_dot {
            best_dot = dot;
            best = *v;
        }
    }
    best
}

/// World-space bounding box of `shape` under `transform`.
pub fn world_aabb(shape: &ColliderShape, transform: &Transform) -> Aabb {
    ShapeUtil::world_aabb(shape, transform)
}

impl SupportMap for ColliderShape {
    #[inline]
    fn support(&self, direction: Vec3) -> Vec3 {
        ShapeUtil::support(self, direction)
    }

    #[inline]
    fn center(&self) -> Vec3 {
        ShapeUtil::center(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn box_support_picks_corner() {
        let shape = ColliderShape::Box {
            half_extents: Vec3::new(1.0, 2.0, 3.0),
        };
        assert_eq!(
            shape.support(Vec3::new(1.0, -1.0, 1.0)),
            Vec3::new(1.0, -2.0, 3.0)
        );
    }

    #[test]
    fn cone_support_switches_between_tip_and_rim() {
        let shape = ColliderShape::Cone {
            radius: 1.0,
            height: 2.0,
        };
        assert_eq!(shape.support(Vec3::Y), Vec3::new(0.0, 1.5, 0.0));
        let rim = shape.support(Vec3::new(1.0, -0.1, 0.0));
        assert!((rim - Vec3::new(1.0, -0.5, 0.0)).length() < 1e-6);
    }

    #[test]
    fn rotated_capsule_bounds_match_analytic_box() {
        let shape = ColliderShape::Capsule {
            radius: 0.5,
            height: 2.0,
        };
        let transform = Transform::new(
            Vec3::new(1.0, 0.0, 0.0),
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
        );
        let bounds = world_aabb(&shape, &transform);
        assert!((bounds.min.x - -0.5).abs() < 1e-5);
        assert!((bounds.max.x - 2.5).abs() < 1e-5);
        assert!((bounds.max.y - 0.5).abs() < 1e-5);
        assert!((bounds.max.z - 0.5).abs() < 1e-5);
    }

    #[test]
    fn hull_center_is_vertex_average() {
        let shape = ColliderShape::ConvexHull {
            vertices: vec![Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 2.0, 0.0)],
        };
        let c = shape.center();
        assert!((c - Vec3::new(2.0 / 3.0, 2.0 / 3.0, 0.0)).length() < 1e-6);
    }
}
