//! Core value types: poses, bounding boxes, shapes, and colliders.

pub mod aabb;
pub mod collider;
pub mod types;

pub use aabb::Aabb;
pub use collider::{Collider, ColliderBuilder, ColliderShape, CollisionFilter};
pub use types::{Transform, Velocity};
