use glam::Vec3;

use crate::utils::allocator::ProxyId;

/// Closest proxy hit by a tree ray cast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCastResult {
    pub proxy: ProxyId,
    /// Hit point is `origin + lambda * direction`.
    pub lambda: f32,
    pub normal: Vec3,
}

/// Ray used by [`CollisionWorld::raycast`](crate::world::CollisionWorld::raycast).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastQuery {
    pub origin: Vec3,
    pub direction: Vec3,
    /// Upper bound on `lambda`; `None` casts an unbounded ray.
    pub max_lambda: Option<f32>,
}

impl RaycastQuery {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            max_lambda: None,
        }
    }

    pub fn with_max_lambda(mut self, max_lambda: f32) -> Self {
        self.max_lambda = Some(max_lambda);
        self
    }
}

/// World ray cast result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub collider: ProxyId,
    pub point: Vec3,
    pub normal: Vec3,
    pub lambda: f32,
}

impl RaycastHit {
    pub(crate) fn from_result(query: &RaycastQuery, result: RayCastResult) -> Self {
        Self {
            collider: result.proxy,
            point: query.origin + query.direction * result.lambda,
            normal: result.normal,
            lambda: result.lambda,
        }
    }
}
