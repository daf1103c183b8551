use glam::Vec3;

use crate::{
    collision::gjk::{GJKAlgorithm, RayHit},
    core::{aabb::Aabb, collider::Collider},
};

/// Payload stored in a [`DynamicTree`](super::DynamicTree) leaf.
pub trait TreeProxy: Send + Sync {
    /// Tight world-space bounds as of the last refit.
    fn world_box(&self) -> Aabb;

    /// Linear velocity used to stretch the expanded leaf box.
    fn velocity(&self) -> Vec3;

    /// Refits [`Self::world_box`]; called for active proxies at the start of
    /// every tree update.
    fn refresh_world_box(&mut self, _dt: f32) {}

    /// Proxies with the same owner are ignored by the default pair filter.
    fn owner(&self) -> Option<u64> {
        None
    }

    /// Exact ray test used by the tree ray cast. Proxies without one are skipped.
    fn ray_cast(&self, _origin: Vec3, _direction: Vec3) -> Option<RayHit> {
        None
    }
}

impl TreeProxy for Collider {
    fn world_box(&self) -> Aabb {
        self.world_box
    }

    fn velocity(&self) -> Vec3 {
        self.velocity.linear
    }

    fn refresh_world_box(&mut self, _dt: f32) {
        Collider::refresh_world_box(self);
    }

    fn owner(&self) -> Option<u64> {
        self.owner
    }

    fn ray_cast(&self, origin: Vec3, direction: Vec3) -> Option<RayHit> {
        let inv = self.transform.rotation.conjugate();
        let local_origin = inv * (origin - self.transform.position);
        let local_dir = inv * direction;

        GJKAlgorithm::ray_cast(&self.shape, local_origin, local_dir).map(|hit| RayHit {
            lambda: hit.lambda,
            normal: self.transform.rotation * hit.normal,
        })
    }
}

/// Pair filter installed on a new tree: rejects proxies sharing an owner.
pub fn different_owners<T: TreeProxy + ?Sized>(a: &T, b: &T) -> bool {
    match (a.owner(), b.owner()) {
        (Some(x), Some(y)) => x != y,
        _ => true,
    }
}
