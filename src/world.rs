use std::{sync::Arc, time::Instant};

use glam::Vec3;
use log::trace;
use parking_lot::Mutex;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{
    collision::{
        broadphase::{different_owners, DynamicTree, TreeTraversal},
        ccd::CCDDetector,
        contact::{Contact, ContactManifold},
        gjk::SweepHit,
        narrowphase::NarrowPhase,
        queries::{RaycastHit, RaycastQuery},
    },
    config::WorldSettings,
    core::{
        aabb::Aabb,
        collider::Collider,
        types::{Transform, Velocity},
    },
    error::{CollisionError, Result},
    utils::{
        allocator::ProxyId,
        profiling::{CollisionProfiler, PhaseTimer, StepPhase},
    },
};

/// A confirmed contact between two registered colliders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPair {
    pub a: ProxyId,
    pub b: ProxyId,
    /// World-space contact; the normal points from `b` toward `a`.
    pub contact: Contact,
    pub manifold: Option<ContactManifold>,
}

/// Drives broad and narrow phase over a set of colliders.
///
/// Poses and velocities are supplied by the caller between steps; the world
/// never integrates motion itself.
pub struct CollisionWorld {
    tree: DynamicTree<Collider>,
    narrow_phase: NarrowPhase,
    ccd: CCDDetector,
    settings: WorldSettings,
    profiler: CollisionProfiler,
    /// Idle traversal stacks shared by the `&self` queries.
    traversals: Mutex<Vec<TreeTraversal>>,
}

impl Default for CollisionWorld {
    fn default() -> Self {
        Self::new(WorldSettings::default())
    }
}

impl CollisionWorld {
    pub fn new(settings: WorldSettings) -> Self {
        let filter = Arc::new(|a: &Collider, b: &Collider| {
            different_owners(a, b) && a.collision_filter.allows(&b.collision_filter)
        });

        Self {
            tree: DynamicTree::with_filter(settings.tree, filter),
            narrow_phase: NarrowPhase::with_epa_threshold(settings.epa_threshold),
            ccd: CCDDetector::new(),
            settings,
            profiler: CollisionProfiler::default(),
            traversals: Mutex::new(Vec::new()),
        }
    }

    /// Runs `query` with a pooled traversal stack. The lock is not held while
    /// the query runs, so filters may query the world again.
    fn with_traversal<R>(&self, query: impl FnOnce(&mut TreeTraversal) -> R) -> R {
        let mut traversal = self.traversals.lock().pop().unwrap_or_default();
        let result = query(&mut traversal);
        self.traversals.lock().push(traversal);
        result
    }

    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    pub fn set_multithreaded(&mut self, enabled: bool) {
        self.settings.multithreaded = enabled;
    }

    pub fn tree(&self) -> &DynamicTree<Collider> {
        &self.tree
    }

    pub fn profiler(&self) -> &CollisionProfiler {
        &self.profiler
    }

    pub fn ccd(&self) -> &CCDDetector {
        &self.ccd
    }

    pub fn ccd_mut(&mut self) -> &mut CCDDetector {
        &mut self.ccd
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Registers a moving collider.
    pub fn add_collider(&mut self, mut collider: Collider) -> Result<ProxyId> {
        collider.refresh_world_box();
        self.tree.add_proxy(collider, true)
    }

    /// Registers a collider that is not refit each step. Moving it later with
    /// [`Self::set_pose`] still updates the broad phase.
    pub fn add_static_collider(&mut self, mut collider: Collider) -> Result<ProxyId> {
        collider.refresh_world_box();
        self.tree.add_proxy(collider, false)
    }

    pub fn remove_collider(&mut self, id: ProxyId) -> Result<Collider> {
        self.tree.remove_proxy(id)
    }

    pub fn collider(&self, id: ProxyId) -> Option<&Collider> {
        self.tree.get(id)
    }

    pub fn colliders(&self) -> impl Iterator<Item = (ProxyId, &Collider)> + '_ {
        self.tree.iter()
    }

    /// Moves a collider. Inactive colliders are re-inserted immediately;
    /// active ones are picked up by the next [`Self::step`].
    pub fn set_pose(&mut self, id: ProxyId, transform: Transform) -> Result<()> {
        let collider = self.collider_mut(id)?;
        collider.transform = transform;
        collider.refresh_world_box();

        if !self.tree.is_active(id)? {
            self.tree.update_proxy(id)?;
        }
        Ok(())
    }

    pub fn set_velocity(&mut self, id: ProxyId, velocity: Velocity) -> Result<()> {
        self.collider_mut(id)?.velocity = velocity;
        Ok(())
    }

    pub fn activate(&mut self, id: ProxyId) -> Result<()> {
        self.tree.activate(id)
    }

    pub fn deactivate(&mut self, id: ProxyId) -> Result<()> {
        self.tree.deactivate(id)
    }

    pub fn is_active(&self, id: ProxyId) -> Result<bool> {
        self.tree.is_active(id)
    }

    fn collider_mut(&mut self, id: ProxyId) -> Result<&mut Collider> {
        self.tree.get_mut(id).ok_or_else(|| {
            CollisionError::UnknownProxy(format!("collider {} is not registered", id.index()))
        })
    }

    fn multithreaded(&self) -> bool {
        cfg!(feature = "parallel") && self.settings.multithreaded
    }

    /// Runs one collision step and returns every confirmed contact.
    pub fn step(&mut self, dt: f32) -> Vec<ContactPair> {
        let step_start = Instant::now();
        self.profiler.reset();
        let multithreaded = self.multithreaded();

        let timer = PhaseTimer::start(StepPhase::BroadPhase);
        self.tree.update(multithreaded, dt);
        let pairs = self.tree.overlapping_pairs();
        self.profiler.record(StepPhase::BroadPhase, timer.finish());
        self.profiler.tree = *self.tree.timings();

        let timer = PhaseTimer::start(StepPhase::NarrowPhase);
        let mut contacts = if multithreaded {
            self.narrow_phase_parallel(&pairs)
        } else {
            self.narrow_phase_sequential(&pairs)
        };
        self.profiler.record(StepPhase::NarrowPhase, timer.finish());

        if self.settings.build_manifolds {
            let timer = PhaseTimer::start(StepPhase::Manifolds);
            if multithreaded {
                self.build_manifolds_parallel(&mut contacts);
            } else {
                for pair in contacts.iter_mut() {
                    pair.manifold = self.manifold_for(pair);
                }
            }
            self.profiler.record(StepPhase::Manifolds, timer.finish());
        }

        self.profiler.proxy_count = self.tree.len();
        self.profiler.updated_proxy_count = self.tree.updated_proxy_count();
        self.profiler.potential_pair_count = self.tree.potential_pairs().len();
        self.profiler.pair_count = pairs.len();
        self.profiler.contact_count = contacts.len();
        self.profiler.total_step_time = step_start.elapsed();
        self.profiler.report();

        if let Some(budget) = self.settings.step_budget_ms {
            self.profiler.exceeds_budget(budget);
        }
        trace!(
            "collision step: {} overlapping pairs, {} contacts",
            pairs.len(),
            contacts.len()
        );

        contacts
    }

    fn narrow_phase_sequential(&mut self, pairs: &[(ProxyId, ProxyId)]) -> Vec<ContactPair> {
        let tree = &self.tree;
        let narrow_phase = &mut self.narrow_phase;
        pairs
            .iter()
            .filter_map(|&(a, b)| confirm_pair(tree, narrow_phase, a, b))
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn narrow_phase_parallel(&self, pairs: &[(ProxyId, ProxyId)]) -> Vec<ContactPair> {
        let threshold = self.narrow_phase.epa_threshold();
        let tree = &self.tree;
        let results: Vec<Option<ContactPair>> = pairs
            .par_iter()
            .map_init(
                || NarrowPhase::with_epa_threshold(threshold),
                |narrow_phase, &(a, b)| confirm_pair(tree, narrow_phase, a, b),
            )
            .collect();
        results.into_iter().flatten().collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn narrow_phase_parallel(&mut self, pairs: &[(ProxyId, ProxyId)]) -> Vec<ContactPair> {
        self.narrow_phase_sequential(pairs)
    }

    #[cfg(feature = "parallel")]
    fn build_manifolds_parallel(&self, contacts: &mut [ContactPair]) {
        contacts.par_iter_mut().for_each(|pair| {
            pair.manifold = self.manifold_for(pair);
        });
    }

    #[cfg(not(feature = "parallel"))]
    fn build_manifolds_parallel(&self, contacts: &mut [ContactPair]) {
        for pair in contacts.iter_mut() {
            pair.manifold = self.manifold_for(pair);
        }
    }

    fn manifold_for(&self, pair: &ContactPair) -> Option<ContactManifold> {
        let a = self.tree.get(pair.a)?;
        let b = self.tree.get(pair.b)?;
        Some(ContactManifold::build(
            &a.shape,
            &a.transform,
            &b.shape,
            &b.transform,
            &pair.contact,
        ))
    }

    /// Closest collider hit by the ray.
    pub fn raycast(&self, query: &RaycastQuery) -> Option<RaycastHit> {
        self.with_traversal(|traversal| {
            self.tree
                .ray_cast(traversal, query.origin, query.direction, query.max_lambda, None, None)
                .map(|result| RaycastHit::from_result(query, result))
        })
    }

    /// Closest hit among colliders accepted by `filter`.
    pub fn raycast_with_filter<F>(&self, query: &RaycastQuery, filter: F) -> Option<RaycastHit>
    where
        F: Fn(ProxyId, &Collider) -> bool,
    {
        let pre: &dyn Fn(ProxyId, &Collider) -> bool = &filter;
        self.with_traversal(|traversal| {
            self.tree
                .ray_cast(
                    traversal,
                    query.origin,
                    query.direction,
                    query.max_lambda,
                    Some(pre),
                    None,
                )
                .map(|result| RaycastHit::from_result(query, result))
        })
    }

    /// Colliders whose world boxes touch `bounds`.
    pub fn query_aabb(&self, bounds: &Aabb) -> Vec<ProxyId> {
        let mut hits = Vec::new();
        self.with_traversal(|traversal| self.tree.query_aabb(traversal, bounds, &mut hits));
        hits
    }

    /// Colliders containing `point`.
    pub fn point_query(&self, point: Vec3) -> Vec<ProxyId> {
        let mut candidates = Vec::new();
        self.with_traversal(|traversal| {
            self.tree
                .query_aabb(traversal, &Aabb::new(point, point), &mut candidates)
        });
        candidates.retain(|&id| {
            self.tree.get(id).is_some_and(|collider| {
                NarrowPhase::point_test(&collider.shape, &collider.transform, point)
            })
        });
        candidates
    }

    /// Continuous check of two colliders over the next `dt`.
    pub fn time_of_impact(&self, a: ProxyId, b: ProxyId, dt: f32) -> Result<Option<SweepHit>> {
        let unknown =
            |id: ProxyId| CollisionError::UnknownProxy(format!("collider {} is not registered", id.index()));
        let collider_a = self.tree.get(a).ok_or_else(|| unknown(a))?;
        let collider_b = self.tree.get(b).ok_or_else(|| unknown(b))?;
        Ok(self.ccd.detect(collider_a, collider_b, dt))
    }

    /// Improves broad-phase tree quality; see [`DynamicTree::optimize`].
    pub fn optimize_broad_phase(&mut self, sweeps: usize, chance: f32, incremental: bool) -> Result<()> {
        self.tree.optimize(sweeps, chance, incremental)
    }
}

fn confirm_pair(
    tree: &DynamicTree<Collider>,
    narrow_phase: &mut NarrowPhase,
    a: ProxyId,
    b: ProxyId,
) -> Option<ContactPair> {
    let collider_a = tree.get(a)?;
    let collider_b = tree.get(b)?;
    let contact = narrow_phase.mpr_epa(
        &collider_a.shape,
        &collider_a.transform,
        &collider_b.shape,
        &collider_b.transform,
    )?;
    Some(ContactPair {
        a,
        b,
        contact,
        manifold: None,
    })
}
