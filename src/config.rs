//! Global configuration constants and tunable settings for the collision core.

use serde::{Deserialize, Serialize};

/// Initial node capacity of the dynamic tree.
pub const DEFAULT_TREE_CAPACITY: usize = 1024;

/// Hard ceiling on tree nodes; registration beyond it is a configuration error.
pub const MAX_TREE_NODES: usize = 1 << 24;

/// Fraction of the pair table inspected for stale pairs on every update.
pub const PRUNING_FRACTION: usize = 128;

/// Velocity-proportional skin added to expanded leaf boxes.
pub const EXPAND_FACTOR: f32 = 0.1;

/// Constant margin added on every side of an expanded leaf box.
pub const EXPAND_EPS: f32 = 0.1;

/// Smallest pair table size (slots). 16384 * 8 bytes = 128 KiB.
pub const PAIR_TABLE_MIN_SLOTS: usize = 16384;

/// The pair table shrinks once `count * PAIR_TABLE_TRIM_FACTOR < slots`.
pub const PAIR_TABLE_TRIM_FACTOR: usize = 8;

/// Hard ceiling on pair table slots.
pub const MAX_PAIR_SLOTS: usize = 1 << 28;

/// Penetration above which MPR results are refined with EPA.
pub const DEFAULT_EPA_THRESHOLD: f32 = 0.02;

/// Default number of optimize sweeps.
pub const DEFAULT_OPTIMIZE_SWEEPS: usize = 100;

/// Default per-proxy reinsertion chance during an optimize sweep.
pub const DEFAULT_OPTIMIZE_CHANCE: f32 = 0.01;

/// Seed of the deterministic generator used by tree optimization.
pub const DEFAULT_OPTIMIZE_SEED: u64 = 0x2545_f491_4f6c_dd1d;

/// Settings for the dynamic tree broad phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeSettings {
    pub initial_capacity: usize,
    pub expand_factor: f32,
    pub expand_eps: f32,
    pub pruning_fraction: usize,
    pub optimize_seed: u64,
}

impl Default for TreeSettings {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_TREE_CAPACITY,
            expand_factor: EXPAND_FACTOR,
            expand_eps: EXPAND_EPS,
            pruning_fraction: PRUNING_FRACTION,
            optimize_seed: DEFAULT_OPTIMIZE_SEED,
        }
    }
}

/// Settings for the [`crate::world::CollisionWorld`] driver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSettings {
    /// Refine MPR results with EPA once penetration exceeds this depth.
    pub epa_threshold: f32,
    /// Run broad- and narrow-phase batches on the rayon pool.
    pub multithreaded: bool,
    /// Build a multi-point manifold for every confirmed contact.
    pub build_manifolds: bool,
    /// Warn when a step takes longer than this many milliseconds.
    pub step_budget_ms: Option<f32>,
    pub tree: TreeSettings,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            epa_threshold: DEFAULT_EPA_THRESHOLD,
            multithreaded: cfg!(feature = "parallel"),
            build_manifolds: true,
            step_budget_ms: None,
            tree: TreeSettings::default(),
        }
    }
}
