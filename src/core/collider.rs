use super::{aabb::Aabb, types::Transform, types::Velocity};
use crate::error::{CollisionError, Result};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Enumeration of supported convex collider geometries.
///
/// Every variant is described in its local frame; the origin is the rotation
/// center used by sweeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColliderShape {
    Sphere {
        radius: f32,
    },
    Box {
        half_extents: Vec3,
    },
    /// Capsule along local Y; `height` is the distance between the cap centers.
    Capsule {
        radius: f32,
        height: f32,
    },
    /// Cylinder along local Y with total `height`.
    Cylinder {
        radius: f32,
        height: f32,
    },
    /// Cone along local Y; the base sits at `-height/4` and the tip at `3*height/4`.
    Cone {
        radius: f32,
        height: f32,
    },
    ConvexHull {
        vertices: Vec<Vec3>,
    },
    Triangle {
        a: Vec3,
        b: Vec3,
        c: Vec3,
    },
}

fn check_dimension(name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(CollisionError::InvalidShape(format!(
            "{name} must be positive and finite, got {value}"
        )))
    }
}

fn check_points(points: &[Vec3]) -> Result<()> {
    if points.iter().all(|p| p.is_finite()) {
        Ok(())
    } else {
        Err(CollisionError::InvalidShape(
            "vertices must be finite".to_string(),
        ))
    }
}

impl ColliderShape {
    pub fn sphere(radius: f32) -> Result<Self> {
        check_dimension("sphere radius", radius)?;
        Ok(Self::Sphere { radius })
    }

    pub fn cuboid(half_extents: Vec3) -> Result<Self> {
        check_dimension("box half extent x", half_extents.x)?;
        check_dimension("box half extent y", half_extents.y)?;
        check_dimension("box half extent z", half_extents.z)?;
        Ok(Self::Box { half_extents })
    }

    pub fn capsule(radius: f32, height: f32) -> Result<Self> {
        check_dimension("capsule radius", radius)?;
        check_dimension("capsule height", height)?;
        Ok(Self::Capsule { radius, height })
    }

    pub fn cylinder(radius: f32, height: f32) -> Result<Self> {
        check_dimension("cylinder radius", radius)?;
        check_dimension("cylinder height", height)?;
        Ok(Self::Cylinder { radius, height })
    }

    pub fn cone(radius: f32, height: f32) -> Result<Self> {
        check_dimension("cone radius", radius)?;
        check_dimension("cone height", height)?;
        Ok(Self::Cone { radius, height })
    }

    pub fn convex_hull(vertices: Vec<Vec3>) -> Result<Self> {
        if vertices.is_empty() {
            return Err(CollisionError::InvalidShape(
                "convex hull needs at least one vertex".to_string(),
            ));
        }
        check_points(&vertices)?;
        Ok(Self::ConvexHull { vertices })
    }

    /// Flat triangle; a zero-area triangle is accepted and handled by the
    /// degenerate-case guards of the narrow phase.
    pub fn triangle(a: Vec3, b: Vec3, c: Vec3) -> Result<Self> {
        check_points(&[a, b, c])?;
        Ok(Self::Triangle { a, b, c })
    }

    /// Largest distance from the local origin to any point of the shape.
    pub fn bounding_radius(&self) -> f32 {
        match self {
            ColliderShape::Sphere { radius } => *radius,
            ColliderShape::Box { half_extents } => half_extents.length(),
            ColliderShape::Capsule { radius, height } => radius + height * 0.5,
            ColliderShape::Cylinder { radius, height } => {
                (radius.powi(2) + (height * 0.5).powi(2)).sqrt()
            }
            ColliderShape::Cone { radius, height } => {
                let base = (radius.powi(2) + (height * 0.25).powi(2)).sqrt();
                base.max(height * 0.75)
            }
            ColliderShape::ConvexHull { vertices } => {
                vertices.iter().map(|v| v.length()).fold(0.0, f32::max)
            }
            ColliderShape::Triangle { a, b, c } => a.length().max(b.length()).max(c.length()),
        }
    }
}

/// Layer/mask filtering between colliders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionFilter {
    pub layer: u32,
    pub mask: u32,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self {
            layer: 1,
            mask: u32::MAX,
        }
    }
}

impl CollisionFilter {
    pub fn allows(&self, other: &CollisionFilter) -> bool {
        (self.mask & other.layer) != 0 && (other.mask & self.layer) != 0
    }
}

/// A shape registered with the broad phase, carrying its world pose and motion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collider {
    pub shape: ColliderShape,
    pub transform: Transform,
    pub velocity: Velocity,
    /// Colliders sharing an owner never form potential pairs.
    pub owner: Option<u64>,
    pub collision_filter: CollisionFilter,
    pub(crate) world_box: Aabb,
}

impl Collider {
    pub fn new(shape: ColliderShape, transform: Transform) -> Self {
        let world_box = crate::collision::shapes::world_aabb(&shape, &transform);
        Self {
            shape,
            transform,
            velocity: Velocity::default(),
            owner: None,
            collision_filter: CollisionFilter::default(),
            world_box,
        }
    }

    pub fn builder() -> ColliderBuilder {
        ColliderBuilder::new()
    }

    pub fn bounding_radius(&self) -> f32 {
        self.shape.bounding_radius()
    }

    /// World box as of the last refit.
    pub fn world_box(&self) -> Aabb {
        self.world_box
    }

    /// Recomputes the cached world box from the current pose.
    pub fn refresh_world_box(&mut self) {
        self.world_box = crate::collision::shapes::world_aabb(&self.shape, &self.transform);
    }
}

pub struct ColliderBuilder {
    shape: ColliderShape,
    transform: Transform,
    velocity: Velocity,
    owner: Option<u64>,
    filter: CollisionFilter,
}

impl Default for ColliderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ColliderBuilder {
    pub fn new() -> Self {
        Self {
            shape: ColliderShape::Sphere { radius: 1.0 },
            transform: Transform::default(),
            velocity: Velocity::default(),
            owner: None,
            filter: CollisionFilter::default(),
        }
    }

    pub fn shape(mut self, shape: ColliderShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn position(mut self, position: Vec3) -> Self {
        self.transform.position = position;
        self
    }

    pub fn rotation(mut self, rotation: Quat) -> Self {
        self.transform.rotation = rotation;
        self
    }

    pub fn velocity(mut self, linear: Vec3, angular: Vec3) -> Self {
        self.velocity = Velocity { linear, angular };
        self
    }

    pub fn owner(mut self, owner: u64) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn filter(mut self, layer: u32, mask: u32) -> Self {
        self.filter = CollisionFilter { layer, mask };
        self
    }

    pub fn build(self) -> Collider {
        let mut collider = Collider::new(self.shape, self.transform);
        collider.velocity = self.velocity;
        collider.owner = self.owner;
        collider.collision_filter = self.filter;
        collider
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_reject_bad_dimensions() {
        assert!(ColliderShape::sphere(0.0).is_err());
        assert!(ColliderShape::sphere(-1.0).is_err());
        assert!(ColliderShape::sphere(f32::NAN).is_err());
        assert!(ColliderShape::cuboid(Vec3::new(1.0, 0.0, 1.0)).is_err());
        assert!(ColliderShape::capsule(0.5, -2.0).is_err());
        assert!(ColliderShape::convex_hull(Vec::new()).is_err());
        assert!(ColliderShape::sphere(0.5).is_ok());
    }

    #[test]
    fn filter_is_symmetric() {
        let a = CollisionFilter { layer: 0b01, mask: 0b10 };
        let b = CollisionFilter { layer: 0b10, mask: 0b01 };
        let c = CollisionFilter { layer: 0b100, mask: u32::MAX };
        assert!(a.allows(&b) && b.allows(&a));
        assert!(!a.allows(&c) && !c.allows(&a));
    }
}
