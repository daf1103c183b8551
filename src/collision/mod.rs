//! Collision detection: support maps, broad phase, narrow-phase solvers,
//! contact manifolds, queries and continuous collision detection.

pub mod broadphase;
pub mod ccd;
pub mod clipping;
pub mod contact;
pub mod epa;
pub mod gjk;
pub mod mpr;
pub mod narrowphase;
pub mod polytope;
pub mod queries;
pub mod shapes;
pub mod simplex;
pub mod support;

pub use broadphase::{DynamicTree, PairHashSet, TreeProxy, TreeTraversal};
pub use ccd::{CCDDetector, ConservativeAdvancement, SweepBody};
pub use contact::{Contact, ContactManifold, DepthRefinement};
pub use gjk::{ClosestPoints, GJKAlgorithm, RayHit, SweepHit};
pub use narrowphase::NarrowPhase;
pub use queries::{RayCastResult, RaycastHit, RaycastQuery};
pub use support::SupportMap;
