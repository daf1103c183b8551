//! Dynamic AABB tree with incremental potential-pair tracking.
//!
//! Leaves hold an *expanded* box: the proxy's world box padded by a constant
//! margin and stretched along its velocity. A proxy is only re-inserted once
//! its world box escapes that expanded box, and its leaf keeps the same node
//! index across re-insertion so pair keys stay valid. Potential pairs are
//! kept in a [`PairHashSet`] keyed by leaf indices; stale entries are pruned a
//! slice at a time on every update.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use glam::Vec3;
use log::{debug, trace, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::{
    pair_set::{Pair, PairHashSet},
    proxy::{different_owners, TreeProxy},
};
use crate::{
    collision::queries::RayCastResult,
    config::{TreeSettings, MAX_TREE_NODES},
    core::aabb::Aabb,
    error::{CollisionError, Result},
    utils::{
        allocator::{Arena, ProxyId},
        math::{hash_unit, XorShift64},
        profiling::TreeTimings,
    },
};

pub const NULL_NODE: u32 = u32::MAX;

/// Predicate deciding whether two proxies may form a pair.
pub type PairFilter<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// Node of the tree. Leaves carry a proxy; internal nodes always have two children.
#[derive(Debug, Clone, Copy)]
pub struct Node {
    pub left: u32,
    pub right: u32,
    pub parent: u32,
    pub expanded_box: Aabb,
    pub proxy: Option<ProxyId>,
    force_update: bool,
}

impl Node {
    fn empty() -> Self {
        Self {
            left: NULL_NODE,
            right: NULL_NODE,
            parent: NULL_NODE,
            expanded_box: Aabb::default(),
            proxy: None,
            force_update: false,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.proxy.is_some()
    }
}

/// Reusable traversal stack for tree queries.
///
/// Queries take one by `&mut` so repeated calls do not allocate; keep one per
/// worker thread.
#[derive(Debug, Default, Clone)]
pub struct TreeTraversal {
    stack: Vec<u32>,
}

impl TreeTraversal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            stack: Vec::with_capacity(capacity),
        }
    }

    /// Current stack capacity; grows to the deepest traversal seen so far.
    pub fn capacity(&self) -> usize {
        self.stack.capacity()
    }

    fn begin(&mut self, root: u32) {
        self.stack.clear();
        self.stack.push(root);
    }
}

struct Entry<T> {
    proxy: T,
    node: u32,
    active: bool,
    moved: bool,
}

pub struct DynamicTree<T: TreeProxy> {
    nodes: Vec<Node>,
    free_nodes: Vec<u32>,
    root: u32,
    proxies: Arena<Entry<T>>,
    active_count: usize,
    pairs: PairHashSet,
    filter: PairFilter<T>,
    settings: TreeSettings,
    moved: Vec<ProxyId>,
    /// Leaves freed by `remove_proxy` whose non-overlapping pairs may still
    /// sit in the table. Swept in one pass before any index is reused.
    released: Vec<u32>,
    stepper: usize,
    rng: XorShift64,
    timings: TreeTimings,
}

impl<T: TreeProxy + 'static> Default for DynamicTree<T> {
    fn default() -> Self {
        Self::new(TreeSettings::default())
    }
}

impl<T: TreeProxy + 'static> DynamicTree<T> {
    /// Creates a tree whose filter rejects proxies with the same owner.
    pub fn new(settings: TreeSettings) -> Self {
        Self::with_filter(settings, Arc::new(different_owners::<T>))
    }
}

impl<T: TreeProxy> DynamicTree<T> {
    pub fn with_filter(settings: TreeSettings, filter: PairFilter<T>) -> Self {
        Self {
            nodes: Vec::with_capacity(settings.initial_capacity),
            free_nodes: Vec::new(),
            root: NULL_NODE,
            proxies: Arena::with_capacity(settings.initial_capacity / 2),
            active_count: 0,
            pairs: PairHashSet::new(),
            filter,
            settings,
            moved: Vec::new(),
            released: Vec::new(),
            stepper: 0,
            rng: XorShift64::new(settings.optimize_seed),
            timings: TreeTimings::default(),
        }
    }

    /// Replaces the pair filter. Existing pairs are re-checked on enumeration.
    pub fn set_filter(&mut self, filter: impl Fn(&T, &T) -> bool + Send + Sync + 'static) {
        self.filter = Arc::new(filter);
    }

    pub fn settings(&self) -> &TreeSettings {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.active_count
    }

    /// Root node index, or [`NULL_NODE`] for an empty tree.
    pub fn root(&self) -> u32 {
        self.root
    }

    pub fn node(&self, index: u32) -> Option<&Node> {
        self.nodes.get(index as usize)
    }

    pub fn contains(&self, id: ProxyId) -> bool {
        self.proxies.contains(id)
    }

    pub fn get(&self, id: ProxyId) -> Option<&T> {
        self.proxies.get(id).map(|entry| &entry.proxy)
    }

    /// Mutable access to a proxy. Moves are picked up by the next
    /// [`Self::update`] if the proxy is active, or immediately through
    /// [`Self::update_proxy`].
    pub fn get_mut(&mut self, id: ProxyId) -> Option<&mut T> {
        self.proxies.get_mut(id).map(|entry| &mut entry.proxy)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProxyId, &T)> + '_ {
        self.proxies
            .iter_with_ids()
            .map(|(id, entry)| (id, &entry.proxy))
    }

    /// Leaf node index of a proxy; stable for the lifetime of the proxy.
    pub fn node_index(&self, id: ProxyId) -> Option<u32> {
        self.proxies.get(id).map(|entry| entry.node)
    }

    /// Potential pairs tracked by the tree, keyed by leaf node indices.
    pub fn potential_pairs(&self) -> &PairHashSet {
        &self.pairs
    }

    /// `(slots, count)` of the pair table.
    pub fn pair_table_info(&self) -> (usize, usize) {
        (self.pairs.slot_count(), self.pairs.len())
    }

    /// Proxies re-inserted by the last [`Self::update`].
    pub fn updated_proxy_count(&self) -> usize {
        self.moved.len()
    }

    pub fn timings(&self) -> &TreeTimings {
        &self.timings
    }

    /// Registers a proxy and records its potential pairs.
    pub fn add_proxy(&mut self, proxy: T, active: bool) -> Result<ProxyId> {
        let live_nodes = self.nodes.len() - self.free_nodes.len();
        if live_nodes + 2 > MAX_TREE_NODES {
            warn!("DynamicTree: node ceiling of {MAX_TREE_NODES} reached");
            return Err(CollisionError::CapacityExceeded(format!(
                "tree cannot hold more than {MAX_TREE_NODES} nodes"
            )));
        }

        let world_box = proxy.world_box();
        let velocity = proxy.velocity();

        let id = self.proxies.insert(Entry {
            proxy,
            node: NULL_NODE,
            active,
            moved: false,
        });

        let index = self.allocate_node();
        let expanded_box = self.expanded_box(world_box, velocity, index);
        self.nodes[index as usize] = Node {
            expanded_box,
            proxy: Some(id),
            ..Node::empty()
        };
        if let Some(entry) = self.proxies.get_mut(id) {
            entry.node = index;
        }
        if active {
            self.active_count += 1;
        }

        self.insert_leaf(index, self.root);
        self.overlap_check_add(self.root, index);

        Ok(id)
    }

    /// Unregisters a proxy, dropping every pair that references it.
    pub fn remove_proxy(&mut self, id: ProxyId) -> Result<T> {
        let node = self.node_index(id).ok_or_else(|| unknown_proxy(id))?;

        let mut stale = Vec::new();
        self.collect_overlaps(self.root, node, &mut stale);
        for pair in stale {
            self.pairs.remove(pair);
        }

        self.remove_leaf(node);
        self.free_node(node);
        // Pairs whose boxes separated since insertion are not reached by the
        // walk above.
        self.released.push(node);

        let entry = self.proxies.remove(id).ok_or_else(|| unknown_proxy(id))?;
        if entry.active {
            self.active_count -= 1;
        }
        Ok(entry.proxy)
    }

    /// Immediately refits and re-inserts one proxy, e.g. after a teleport.
    pub fn update_proxy(&mut self, id: ProxyId) -> Result<()> {
        let entry = self.proxies.get_mut(id).ok_or_else(|| unknown_proxy(id))?;
        entry.proxy.refresh_world_box(0.0);
        let node = entry.node;

        let mut stale = Vec::new();
        self.collect_overlaps(self.root, node, &mut stale);
        for pair in stale {
            self.pairs.remove(pair);
        }

        self.reinsert(id);
        self.overlap_check_add(self.root, node);
        Ok(())
    }

    /// Marks a proxy active; it is re-inserted on the next update.
    pub fn activate(&mut self, id: ProxyId) -> Result<()> {
        let entry = self.proxies.get_mut(id).ok_or_else(|| unknown_proxy(id))?;
        if !entry.active {
            entry.active = true;
            self.active_count += 1;
            self.nodes[entry.node as usize].force_update = true;
        }
        Ok(())
    }

    /// Marks a proxy inactive: it is assumed to stay inside its expanded box.
    pub fn deactivate(&mut self, id: ProxyId) -> Result<()> {
        let entry = self.proxies.get_mut(id).ok_or_else(|| unknown_proxy(id))?;
        if entry.active {
            entry.active = false;
            self.active_count -= 1;
        }
        Ok(())
    }

    pub fn is_active(&self, id: ProxyId) -> Result<bool> {
        self.proxies
            .get(id)
            .map(|entry| entry.active)
            .ok_or_else(|| unknown_proxy(id))
    }

    /// Advances the broad phase by one step.
    ///
    /// Prunes a slice of stale pairs, refits active proxies, re-inserts those
    /// that left their expanded boxes, and records their new potential pairs.
    pub fn update(&mut self, multithreaded: bool, dt: f32) {
        let mut clock = Instant::now();
        let mut lap = |slot: &mut Duration| {
            let now = Instant::now();
            *slot = now - clock;
            clock = now;
        };

        self.sweep_released();
        self.prune_invalid_pairs();
        lap(&mut self.timings.prune_invalid_pairs);

        if multithreaded {
            self.refit_active_parallel(dt);
        } else {
            self.refit_active(dt);
        }
        lap(&mut self.timings.update_bounding_boxes);

        if multithreaded {
            self.scan_moved_parallel();
        } else {
            self.scan_moved();
        }
        self.moved.clear();
        for (id, entry) in self.proxies.iter_with_ids() {
            if entry.moved {
                self.moved.push(id);
            }
        }
        lap(&mut self.timings.scan_moved);

        let moved = std::mem::take(&mut self.moved);
        for &id in &moved {
            self.reinsert(id);
        }
        self.moved = moved;
        lap(&mut self.timings.update_proxies);

        if multithreaded {
            self.scan_overlaps_parallel();
        } else {
            for &id in &self.moved {
                if let Some(node) = self.node_index(id) {
                    self.overlap_check_add(self.root, node);
                }
            }
        }
        lap(&mut self.timings.scan_overlaps);

        trace!(
            "DynamicTree: {} moved, {} pairs, {:?} total",
            self.moved.len(),
            self.pairs.len(),
            self.timings.total()
        );
    }

    fn refit_active(&mut self, dt: f32) {
        for entry in self.proxies.iter_mut() {
            if entry.active {
                entry.proxy.refresh_world_box(dt);
            }
        }
    }

    fn scan_moved(&mut self) {
        let nodes = &self.nodes;
        for entry in self.proxies.iter_mut() {
            entry.moved = entry.active && has_escaped(&nodes[entry.node as usize], &entry.proxy);
        }
    }

    #[cfg(feature = "parallel")]
    fn refit_active_parallel(&mut self, dt: f32) {
        self.proxies.par_iter_mut().for_each(|entry| {
            if entry.active {
                entry.proxy.refresh_world_box(dt);
            }
        });
    }

    #[cfg(feature = "parallel")]
    fn scan_moved_parallel(&mut self) {
        let nodes = &self.nodes;
        self.proxies.par_iter_mut().for_each(|entry| {
            entry.moved = entry.active && has_escaped(&nodes[entry.node as usize], &entry.proxy);
        });
    }

    #[cfg(feature = "parallel")]
    fn scan_overlaps_parallel(&self) {
        self.moved.par_iter().for_each(|&id| {
            if let Some(node) = self.node_index(id) {
                self.overlap_check_add(self.root, node);
            }
        });
    }

    #[cfg(not(feature = "parallel"))]
    fn refit_active_parallel(&mut self, dt: f32) {
        self.refit_active(dt);
    }

    #[cfg(not(feature = "parallel"))]
    fn scan_moved_parallel(&mut self) {
        self.scan_moved();
    }

    #[cfg(not(feature = "parallel"))]
    fn scan_overlaps_parallel(&self) {
        for &id in &self.moved {
            if let Some(node) = self.node_index(id) {
                self.overlap_check_add(self.root, node);
            }
        }
    }

    /// Removes and re-inserts the leaf of `id` with a fresh expanded box,
    /// keeping its node index.
    fn reinsert(&mut self, id: ProxyId) {
        let Some(entry) = self.proxies.get_mut(id) else {
            return;
        };
        entry.moved = false;
        let node = entry.node;
        let world_box = entry.proxy.world_box();
        let velocity = entry.proxy.velocity();

        let hint = self.remove_leaf(node);
        let expanded_box = self.expanded_box(world_box, velocity, node);
        let leaf = &mut self.nodes[node as usize];
        leaf.force_update = false;
        leaf.expanded_box = expanded_box;
        self.insert_leaf(node, hint);
    }

    fn expanded_box(&self, world_box: Aabb, velocity: Vec3, node: u32) -> Aabb {
        let salt = (self.stepper as u32).wrapping_mul(0x9E37_79B9);
        let jitter = hash_unit(node ^ salt);
        let mut expanded = world_box;
        expanded.expand_directional(
            velocity * self.settings.expand_factor * (1.0 + jitter),
            self.settings.expand_eps,
        );
        expanded
    }

    /// Drops every pair that references a released leaf.
    fn sweep_released(&mut self) {
        if self.released.is_empty() {
            return;
        }
        let mut released = std::mem::take(&mut self.released);
        released.sort_unstable();
        let removed = self.pairs.retain(|pair| {
            released.binary_search(&pair.id1).is_err() && released.binary_search(&pair.id2).is_err()
        });
        if removed > 0 {
            trace!(
                "DynamicTree: swept {removed} pairs of {} removed proxies",
                released.len()
            );
        }
        released.clear();
        self.released = released;
    }

    fn prune_invalid_pairs(&mut self) {
        self.stepper = self.stepper.wrapping_add(1);
        let fraction = self.settings.pruning_fraction.max(1);

        let mut i = 0;
        loop {
            let slots = self.pairs.slot_count();
            if i >= slots / fraction {
                break;
            }

            let slot = i.wrapping_mul(fraction).wrapping_add(self.stepper) % slots;
            match self.pairs.slot(slot) {
                Some(pair) if !self.pair_is_valid(pair) => {
                    // The slot may now hold a shifted entry; inspect it again.
                    self.pairs.remove_slot(slot);
                }
                _ => i += 1,
            }
        }
    }

    fn pair_is_valid(&self, pair: Pair) -> bool {
        let (Some(a), Some(b)) = (self.leaf_entry(pair.id1), self.leaf_entry(pair.id2)) else {
            return false;
        };
        let box_a = &self.nodes[pair.id1 as usize].expanded_box;
        let box_b = &self.nodes[pair.id2 as usize].expanded_box;
        box_a.intersects(box_b) && (a.active || b.active)
    }

    fn leaf_entry(&self, node: u32) -> Option<&Entry<T>> {
        let id = self.nodes.get(node as usize)?.proxy?;
        self.proxies.get(id)
    }

    fn passes_filter(&self, a: u32, b: u32) -> bool {
        match (self.leaf_entry(a), self.leaf_entry(b)) {
            (Some(a), Some(b)) => (self.filter)(&a.proxy, &b.proxy),
            _ => false,
        }
    }

    fn overlap_check_add(&self, index: u32, node: u32) {
        if index == NULL_NODE {
            return;
        }

        let current = &self.nodes[index as usize];
        if current.is_leaf() {
            if index != node && self.passes_filter(node, index) {
                self.pairs.concurrent_add(Pair::new(index, node));
            }
            return;
        }

        let target = &self.nodes[node as usize].expanded_box;
        for child in [current.left, current.right] {
            if self.nodes[child as usize].expanded_box.intersects(target) {
                self.overlap_check_add(child, node);
            }
        }
    }

    fn collect_overlaps(&self, index: u32, node: u32, out: &mut Vec<Pair>) {
        if index == NULL_NODE {
            return;
        }

        let current = &self.nodes[index as usize];
        if current.is_leaf() {
            // Unfiltered: pairs added under an older filter must go too.
            if index != node {
                out.push(Pair::new(index, node));
            }
            return;
        }

        let target = &self.nodes[node as usize].expanded_box;
        for child in [current.left, current.right] {
            if self.nodes[child as usize].expanded_box.intersects(target) {
                self.collect_overlaps(child, node, out);
            }
        }
    }

    fn resolve_overlap(&self, pair: Pair) -> Option<(ProxyId, &T, ProxyId, &T)> {
        let id_a = self.nodes.get(pair.id1 as usize)?.proxy?;
        let id_b = self.nodes.get(pair.id2 as usize)?.proxy?;
        let a = &self.proxies.get(id_a)?.proxy;
        let b = &self.proxies.get(id_b)?.proxy;

        if !(self.filter)(a, b) {
            return None;
        }
        a.world_box()
            .intersects(&b.world_box())
            .then_some((id_a, a, id_b, b))
    }

    /// Calls `f` for every potential pair whose world boxes currently overlap.
    pub fn enumerate_overlaps(&self, mut f: impl FnMut(ProxyId, &T, ProxyId, &T)) {
        self.pairs.for_each(|pair| {
            if let Some((id_a, a, id_b, b)) = self.resolve_overlap(pair) {
                f(id_a, a, id_b, b);
            }
        });
    }

    /// Parallel variant of [`Self::enumerate_overlaps`]; `f` runs on the rayon pool.
    #[cfg(feature = "parallel")]
    pub fn par_enumerate_overlaps(&self, f: impl Fn(ProxyId, &T, ProxyId, &T) + Send + Sync) {
        self.pairs.par_for_each(|pair| {
            if let Some((id_a, a, id_b, b)) = self.resolve_overlap(pair) {
                f(id_a, a, id_b, b);
            }
        });
    }

    pub fn overlapping_pairs(&self) -> Vec<(ProxyId, ProxyId)> {
        let mut out = Vec::new();
        self.enumerate_overlaps(|a, _, b, _| out.push((a, b)));
        out
    }

    /// Collects proxies whose world boxes touch `bounds`.
    pub fn query_aabb(&self, traversal: &mut TreeTraversal, bounds: &Aabb, hits: &mut Vec<ProxyId>) {
        if self.root == NULL_NODE {
            return;
        }

        traversal.begin(self.root);
        let stack = &mut traversal.stack;
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            if let Some(id) = node.proxy {
                if let Some(entry) = self.proxies.get(id) {
                    if entry.proxy.world_box().intersects(bounds) {
                        hits.push(id);
                    }
                }
                continue;
            }

            for child in [node.left, node.right] {
                if self.nodes[child as usize].expanded_box.intersects(bounds) {
                    stack.push(child);
                }
            }
        }
    }

    /// Collects proxies whose world boxes are crossed by the ray.
    pub fn query_ray(
        &self,
        traversal: &mut TreeTraversal,
        origin: Vec3,
        direction: Vec3,
        hits: &mut Vec<ProxyId>,
    ) {
        if self.root == NULL_NODE {
            return;
        }

        traversal.begin(self.root);
        let stack = &mut traversal.stack;
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            if let Some(id) = node.proxy {
                if let Some(entry) = self.proxies.get(id) {
                    if entry.proxy.world_box().ray_intersect(origin, direction).is_some() {
                        hits.push(id);
                    }
                }
                continue;
            }

            for child in [node.left, node.right] {
                if self.nodes[child as usize]
                    .expanded_box
                    .ray_intersect(origin, direction)
                    .is_some()
                {
                    stack.push(child);
                }
            }
        }
    }

    /// Closest ray hit among proxies that implement [`TreeProxy::ray_cast`].
    ///
    /// `pre` skips proxies before the exact test; `post` rejects individual
    /// hits. Subtrees entered beyond the best hit so far are skipped.
    #[allow(clippy::too_many_arguments)]
    pub fn ray_cast(
        &self,
        traversal: &mut TreeTraversal,
        origin: Vec3,
        direction: Vec3,
        max_lambda: Option<f32>,
        pre: Option<&dyn Fn(ProxyId, &T) -> bool>,
        post: Option<&dyn Fn(&RayCastResult) -> bool>,
    ) -> Option<RayCastResult> {
        if self.root == NULL_NODE {
            return None;
        }

        let mut best_lambda = max_lambda.unwrap_or(f32::MAX);
        let mut best = None;

        traversal.begin(self.root);
        let stack = &mut traversal.stack;
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];

            if let Some(id) = node.proxy {
                let Some(entry) = self.proxies.get(id) else {
                    continue;
                };
                if pre.is_some_and(|pre| !pre(id, &entry.proxy)) {
                    continue;
                }
                let Some(hit) = entry.proxy.ray_cast(origin, direction) else {
                    continue;
                };
                if hit.lambda < best_lambda {
                    let result = RayCastResult {
                        proxy: id,
                        lambda: hit.lambda,
                        normal: hit.normal,
                    };
                    if post.is_some_and(|post| !post(&result)) {
                        continue;
                    }
                    best_lambda = hit.lambda;
                    best = Some(result);
                }
                continue;
            }

            let enter = |child: u32| {
                self.nodes[child as usize]
                    .expanded_box
                    .ray_intersect(origin, direction)
                    .filter(|&t| t <= best_lambda)
            };

            match (enter(node.left), enter(node.right)) {
                (Some(l), Some(r)) => {
                    // Nearer child on top of the stack.
                    if l < r {
                        stack.push(node.right);
                        stack.push(node.left);
                    } else {
                        stack.push(node.left);
                        stack.push(node.right);
                    }
                }
                (Some(_), None) => stack.push(node.left),
                (None, Some(_)) => stack.push(node.right),
                (None, None) => {}
            }
        }

        best
    }

    /// Randomly removes and re-inserts leaves to improve tree quality.
    ///
    /// Each sweep visits every proxy and picks it with probability `chance`;
    /// picked leaves are shuffled and re-inserted from the root. With
    /// `incremental == false` the first sweep rebuilds the whole tree.
    pub fn optimize(&mut self, sweeps: usize, chance: f32, incremental: bool) -> Result<()> {
        if sweeps == 0 {
            return Err(CollisionError::InvalidArgument(
                "sweeps must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&chance) {
            return Err(CollisionError::InvalidArgument(format!(
                "chance must be within [0, 1], got {chance}"
            )));
        }

        let mut batch: Vec<u32> = Vec::new();
        for sweep in 0..sweeps {
            let take_all = sweep == 0 && !incremental;

            let leaves: Vec<u32> = self.proxies.iter().map(|entry| entry.node).collect();
            for node in leaves {
                if !take_all && self.rng.next_f64() > chance as f64 {
                    continue;
                }
                self.remove_leaf(node);
                batch.push(node);
            }

            // Fisher-Yates
            for i in (1..batch.len()).rev() {
                let j = self.rng.next_index(i + 1);
                batch.swap(i, j);
            }

            for &node in &batch {
                self.insert_leaf(node, self.root);
            }
            batch.clear();
        }

        Ok(())
    }

    /// Sum of the surface areas of all node boxes.
    pub fn calculate_cost(&self) -> f64 {
        if self.root == NULL_NODE {
            return 0.0;
        }
        self.cost(self.root)
    }

    fn cost(&self, index: u32) -> f64 {
        let node = &self.nodes[index as usize];
        let area = node.expanded_box.surface_area();
        if node.is_leaf() {
            return area;
        }
        area + self.cost(node.left) + self.cost(node.right)
    }

    /// Number of nodes on the longest root-to-leaf path.
    pub fn height(&self) -> usize {
        if self.root == NULL_NODE {
            return 0;
        }
        self.node_height(self.root)
    }

    fn node_height(&self, index: u32) -> usize {
        let node = &self.nodes[index as usize];
        if node.is_leaf() {
            return 1;
        }
        1 + self.node_height(node.left).max(self.node_height(node.right))
    }

    /// Visits every node box with its depth (root = 1).
    pub fn enumerate_boxes(&self, mut f: impl FnMut(&Aabb, usize)) {
        if self.root == NULL_NODE {
            return;
        }

        let mut stack = vec![(self.root, 1usize)];
        while let Some((index, depth)) = stack.pop() {
            let node = &self.nodes[index as usize];
            f(&node.expanded_box, depth);
            if !node.is_leaf() {
                stack.push((node.right, depth + 1));
                stack.push((node.left, depth + 1));
            }
        }
    }

    fn allocate_node(&mut self) -> u32 {
        if !self.free_nodes.is_empty() {
            self.sweep_released();
        }
        if let Some(index) = self.free_nodes.pop() {
            self.nodes[index as usize] = Node::empty();
            return index;
        }

        if self.nodes.len() == self.nodes.capacity() {
            debug!(
                "DynamicTree: growing node storage to {} elements",
                (self.nodes.capacity() * 2).max(self.settings.initial_capacity).max(4)
            );
            self.nodes
                .reserve_exact(self.nodes.capacity().max(self.settings.initial_capacity).max(4));
        }

        self.nodes.push(Node::empty());
        (self.nodes.len() - 1) as u32
    }

    fn free_node(&mut self, index: u32) {
        self.nodes[index as usize].proxy = None;
        self.free_nodes.push(index);
    }

    /// Detaches a leaf and refits its ancestors. Returns a node close to the
    /// old position, used as the starting point for re-insertion.
    fn remove_leaf(&mut self, node: u32) -> u32 {
        if node == self.root {
            self.root = NULL_NODE;
            return NULL_NODE;
        }

        let parent = self.nodes[node as usize].parent;
        let grand_parent = self.nodes[parent as usize].parent;
        let sibling = if self.nodes[parent as usize].left == node {
            self.nodes[parent as usize].right
        } else {
            self.nodes[parent as usize].left
        };

        if grand_parent == NULL_NODE {
            self.root = sibling;
            self.nodes[sibling as usize].parent = NULL_NODE;
            self.free_node(parent);
            return self.root;
        }

        let gp = &mut self.nodes[grand_parent as usize];
        if gp.left == parent {
            gp.left = sibling;
        } else {
            gp.right = sibling;
        }
        self.nodes[sibling as usize].parent = grand_parent;
        self.free_node(parent);

        let mut index = grand_parent;
        while index != NULL_NODE {
            let current = self.nodes[index as usize];
            let merged = self.nodes[current.left as usize]
                .expanded_box
                .merged(&self.nodes[current.right as usize].expanded_box);
            if merged == current.expanded_box {
                break;
            }
            self.nodes[index as usize].expanded_box = merged;
            index = current.parent;
        }

        grand_parent
    }

    /// Inserts a detached leaf, searching for the cheapest sibling starting
    /// from the lowest ancestor of `hint` that already contains the leaf box.
    fn insert_leaf(&mut self, node: u32, hint: u32) {
        if self.root == NULL_NODE {
            self.root = node;
            self.nodes[node as usize].parent = NULL_NODE;
            return;
        }

        let leaf_box = self.nodes[node as usize].expanded_box;

        let mut anchor = if hint == NULL_NODE { self.root } else { hint };
        while anchor != self.root {
            if self.nodes[anchor as usize].expanded_box.encompasses(&leaf_box) {
                break;
            }
            anchor = self.nodes[anchor as usize].parent;
        }
        let insertion_parent = self.nodes[anchor as usize].parent;

        let mut sibling = anchor;
        while !self.nodes[sibling as usize].is_leaf() {
            let current = &self.nodes[sibling as usize];
            let left = &self.nodes[current.left as usize];
            let right = &self.nodes[current.right as usize];

            let cost = 2.0 * current.expanded_box.surface_area();
            let child_cost = |child: &Node| {
                let merged = child.expanded_box.merged_surface_area(&leaf_box);
                if child.is_leaf() {
                    merged
                } else {
                    merged - child.expanded_box.surface_area()
                }
            };
            let cost_left = child_cost(left);
            let cost_right = child_cost(right);

            if cost < cost_left && cost < cost_right {
                break;
            }

            sibling = if cost_left < cost_right {
                current.left
            } else {
                current.right
            };
        }

        let old_parent = self.nodes[sibling as usize].parent;
        let new_parent = self.allocate_node();
        self.nodes[new_parent as usize] = Node {
            parent: old_parent,
            left: sibling,
            right: node,
            ..Node::empty()
        };

        if old_parent == NULL_NODE {
            self.root = new_parent;
        } else {
            let op = &mut self.nodes[old_parent as usize];
            if op.left == sibling {
                op.left = new_parent;
            } else {
                op.right = new_parent;
            }
        }
        self.nodes[sibling as usize].parent = new_parent;
        self.nodes[node as usize].parent = new_parent;

        let mut index = new_parent;
        while index != insertion_parent {
            let current = self.nodes[index as usize];
            self.nodes[index as usize].expanded_box = self.nodes[current.left as usize]
                .expanded_box
                .merged(&self.nodes[current.right as usize].expanded_box);
            index = current.parent;
        }
    }
}

#[inline]
fn has_escaped<T: TreeProxy>(node: &Node, proxy: &T) -> bool {
    node.force_update || !node.expanded_box.encompasses(&proxy.world_box())
}

fn unknown_proxy(id: ProxyId) -> CollisionError {
    CollisionError::UnknownProxy(format!(
        "proxy {} (generation {}) is not registered",
        id.index(),
        id.generation()
    ))
}
