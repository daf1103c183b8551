use std::time::{Duration, Instant};

use log::{debug, log_enabled, trace, warn, Level};

/// Per-phase durations of the last [`DynamicTree::update`](crate::collision::broadphase::DynamicTree::update).
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct TreeTimings {
    pub prune_invalid_pairs: Duration,
    pub update_bounding_boxes: Duration,
    pub scan_moved: Duration,
    pub update_proxies: Duration,
    pub scan_overlaps: Duration,
}

impl TreeTimings {
    pub fn total(&self) -> Duration {
        self.prune_invalid_pairs
            + self.update_bounding_boxes
            + self.scan_moved
            + self.update_proxies
            + self.scan_overlaps
    }
}

/// Sections of [`CollisionWorld::step`](crate::world::CollisionWorld::step).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    BroadPhase,
    NarrowPhase,
    Manifolds,
}

impl StepPhase {
    pub fn label(self) -> &'static str {
        match self {
            Self::BroadPhase => "broad phase",
            Self::NarrowPhase => "narrow phase",
            Self::Manifolds => "manifolds",
        }
    }
}

/// Measures one step phase. Entry and exit are traced when trace logging is on.
pub struct PhaseTimer {
    phase: StepPhase,
    start: Instant,
}

impl PhaseTimer {
    pub fn start(phase: StepPhase) -> Self {
        if log_enabled!(Level::Trace) {
            trace!("collision {}: begin", phase.label());
        }
        Self {
            phase,
            start: Instant::now(),
        }
    }

    /// Elapsed time of the phase.
    pub fn finish(self) -> Duration {
        let elapsed = self.start.elapsed();
        if log_enabled!(Level::Trace) {
            trace!(
                "collision {}: {} µs",
                self.phase.label(),
                elapsed.as_micros()
            );
        }
        elapsed
    }
}

/// Timing and counters of the last collision step.
#[derive(Debug, Default, Clone, Copy)]
pub struct CollisionProfiler {
    pub broad_phase_time: Duration,
    pub narrow_phase_time: Duration,
    pub manifold_time: Duration,
    pub total_step_time: Duration,
    /// Breakdown of the tree update inside the broad phase.
    pub tree: TreeTimings,

    pub proxy_count: usize,
    pub updated_proxy_count: usize,
    pub pair_count: usize,
    pub potential_pair_count: usize,
    pub contact_count: usize,
}

impl CollisionProfiler {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn record(&mut self, phase: StepPhase, elapsed: Duration) {
        match phase {
            StepPhase::BroadPhase => self.broad_phase_time = elapsed,
            StepPhase::NarrowPhase => self.narrow_phase_time = elapsed,
            StepPhase::Manifolds => self.manifold_time = elapsed,
        }
    }

    /// Warns and returns `true` when the step took longer than `budget_ms`.
    pub fn exceeds_budget(&self, budget_ms: f32) -> bool {
        let step_ms = self.total_step_time.as_secs_f32() * 1000.0;
        if step_ms <= budget_ms {
            return false;
        }
        warn!(
            "collision step took {:.2} ms (budget {:.2} ms): {} proxies, {} overlapping pairs, {} contacts",
            step_ms, budget_ms, self.proxy_count, self.pair_count, self.contact_count
        );
        true
    }

    pub fn report(&self) {
        let total_us = self.total_step_time.as_micros() as f32;
        if total_us < 1.0 || !log_enabled!(Level::Debug) {
            return;
        }
        let share = |d: Duration| (d.as_micros() as f32 / total_us) * 100.0;
        let ms = |d: Duration| d.as_secs_f32() * 1000.0;

        debug!(
            "collision step: {:.2} ms, proxies {} ({} updated), potential pairs {}, overlapping {}, contacts {}",
            ms(self.total_step_time),
            self.proxy_count,
            self.updated_proxy_count,
            self.potential_pair_count,
            self.pair_count,
            self.contact_count
        );
        debug!(
            "  broad phase  {:.2} ms ({:.1}%): prune {:.3}, refit {:.3}, scan moved {:.3}, reinsert {:.3}, rescan {:.3}",
            ms(self.broad_phase_time),
            share(self.broad_phase_time),
            ms(self.tree.prune_invalid_pairs),
            ms(self.tree.update_bounding_boxes),
            ms(self.tree.scan_moved),
            ms(self.tree.update_proxies),
            ms(self.tree.scan_overlaps)
        );
        debug!(
            "  narrow phase {:.2} ms ({:.1}%)",
            ms(self.narrow_phase_time),
            share(self.narrow_phase_time)
        );
        debug!(
            "  manifolds    {:.2} ms ({:.1}%)",
            ms(self.manifold_time),
            share(self.manifold_time)
        );
    }
}
