//! Particle Collision – collision detection core for Rust.
//!
//! `core` holds value types and shapes, `collision` the broad phase (dynamic AABB
//! tree with a concurrent pair table), the support-map narrow phase (GJK,
//! MPR, EPA), contact manifolds and continuous collision detection, and
//! [`CollisionWorld`] ties both phases together.

pub mod collision;
pub mod config;
pub mod core;
pub mod error;
pub mod utils;
pub mod world;

pub use glam::{Quat, Vec3};

pub use collision::{
    broadphase::{DynamicTree, Pair, PairHashSet, TreeProxy, TreeTraversal},
    ccd::{CCDDetector, ConservativeAdvancement, SweepBody},
    contact::{Contact, ContactManifold, DepthRefinement},
    gjk::{ClosestPoints, GJKAlgorithm, RayHit, SweepHit},
    narrowphase::NarrowPhase,
    queries::{RayCastResult, RaycastHit, RaycastQuery},
    support::SupportMap,
};
pub use config::{TreeSettings, WorldSettings};
pub use core::{
    aabb::Aabb,
    collider::{Collider, ColliderBuilder, ColliderShape, CollisionFilter},
    types::{Transform, Velocity},
};
pub use error::{CollisionError, Result};
pub use utils::allocator::{Arena, GenerationalId, ProxyId};
pub use world::{CollisionWorld, ContactPair};
