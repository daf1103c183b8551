//! Open-addressing hash set of unordered node pairs.
//!
//! Keys are packed into a single `u64` with `0` marking an empty slot, so the
//! table can be probed and filled lock-free through [`PairHashSet::concurrent_add`]
//! while structural changes (growth, deletion) require exclusive access.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use log::debug;
use parking_lot::RwLock;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::{MAX_PAIR_SLOTS, PAIR_TABLE_MIN_SLOTS, PAIR_TABLE_TRIM_FACTOR};

/// Unordered pair of tree node indices, stored as `(min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pair {
    pub id1: u32,
    pub id2: u32,
}

impl Pair {
    pub fn new(a: u32, b: u32) -> Self {
        if a < b {
            Self { id1: a, id2: b }
        } else {
            Self { id1: b, id2: a }
        }
    }

    #[inline]
    pub fn key(&self) -> u64 {
        ((self.id1 as u64) << 32) | self.id2 as u64
    }

    #[inline]
    pub fn from_key(key: u64) -> Option<Self> {
        (key != 0).then(|| Self {
            id1: (key >> 32) as u32,
            id2: key as u32,
        })
    }

    #[inline]
    pub fn hash(&self) -> usize {
        (self.id1.wrapping_add(self.id2.wrapping_mul(2281)) & 0x7FFF_FFFF) as usize
    }

    pub fn contains(&self, node: u32) -> bool {
        self.id1 == node || self.id2 == node
    }
}

struct Table {
    slots: Box<[AtomicU64]>,
    mask: usize,
    count: AtomicUsize,
}

impl Table {
    fn with_slots(size: usize) -> Self {
        Self {
            slots: (0..size).map(|_| AtomicU64::new(0)).collect(),
            mask: size - 1,
            count: AtomicUsize::new(0),
        }
    }

    fn find_slot(&mut self, pair: Pair) -> usize {
        let key = pair.key();
        let mut index = pair.hash() & self.mask;
        loop {
            let current = *self.slots[index].get_mut();
            if current == 0 || current == key {
                return index;
            }
            index = (index + 1) & self.mask;
        }
    }

    fn insert(&mut self, pair: Pair) -> bool {
        let index = self.find_slot(pair);
        let slot = self.slots[index].get_mut();
        if *slot != 0 {
            return false;
        }
        *slot = pair.key();
        *self.count.get_mut() += 1;
        true
    }
}

fn pick_size(min_size: usize) -> usize {
    let mut size = PAIR_TABLE_MIN_SLOTS;
    while size < min_size {
        size *= 2;
    }
    if size > MAX_PAIR_SLOTS {
        panic!(
            "pair table would need {size} slots, exceeding the ceiling of {MAX_PAIR_SLOTS}"
        );
    }
    size
}

/// Hash set of potentially overlapping node pairs.
pub struct PairHashSet {
    table: RwLock<Table>,
}

impl Default for PairHashSet {
    fn default() -> Self {
        Self::new()
    }
}

impl PairHashSet {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(Table::with_slots(pick_size(0))),
        }
    }

    pub fn len(&self) -> usize {
        self.table.read().count.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of slots (a power of two).
    pub fn slot_count(&self) -> usize {
        self.table.read().slots.len()
    }

    /// Pair stored in `slot`, if any.
    pub fn slot(&self, slot: usize) -> Option<Pair> {
        let table = self.table.read();
        table
            .slots
            .get(slot)
            .and_then(|s| Pair::from_key(s.load(Ordering::Acquire)))
    }

    pub fn contains(&self, pair: Pair) -> bool {
        let table = self.table.read();
        let key = pair.key();
        let mut index = pair.hash() & table.mask;
        loop {
            match table.slots[index].load(Ordering::Acquire) {
                0 => return false,
                k if k == key => return true,
                _ => index = (index + 1) & table.mask,
            }
        }
    }

    /// Inserts `pair`; returns `false` if it was already present.
    pub fn add(&mut self, pair: Pair) -> bool {
        let table = self.table.get_mut();
        if !table.insert(pair) {
            return false;
        }
        if table.slots.len() < 2 * *table.count.get_mut() {
            let size = pick_size(table.slots.len() * 2);
            Self::resize(table, size);
        }
        true
    }

    /// Thread-safe insertion from many workers at once.
    ///
    /// Existing pairs are detected under the shared lock without any write.
    /// Empty slots are claimed with a compare-and-swap; only growth takes the
    /// exclusive lock.
    pub fn concurrent_add(&self, pair: Pair) -> bool {
        let key = pair.key();

        let needs_growth = {
            let table = self.table.read();
            let mut index = pair.hash() & table.mask;
            loop {
                let slot = &table.slots[index];
                match slot.load(Ordering::Acquire) {
                    k if k == key => return false,
                    0 => match slot.compare_exchange(0, key, Ordering::AcqRel, Ordering::Acquire) {
                        Ok(_) => {
                            let count = table.count.fetch_add(1, Ordering::AcqRel) + 1;
                            break table.slots.len() < 2 * count;
                        }
                        // Lost the race for this slot; look at it again.
                        Err(_) => continue,
                    },
                    _ => index = (index + 1) & table.mask,
                }
            }
        };

        if needs_growth {
            let mut table = self.table.write();
            let count = *table.count.get_mut();
            if table.slots.len() < 2 * count {
                let size = pick_size(table.slots.len() * 2);
                Self::resize(&mut table, size);
            }
        }

        true
    }

    /// Removes `pair`; returns `false` if it was not present.
    pub fn remove(&mut self, pair: Pair) -> bool {
        let index = self.table.get_mut().find_slot(pair);
        self.remove_slot(index)
    }

    /// Empties `slot` with backward-shift deletion, then shrinks the table if
    /// it became sparse.
    pub fn remove_slot(&mut self, slot: usize) -> bool {
        if !self.remove_slot_keep_size(slot) {
            return false;
        }
        self.shrink_if_sparse();
        true
    }

    fn remove_slot_keep_size(&mut self, mut slot: usize) -> bool {
        let table = self.table.get_mut();
        if slot >= table.slots.len() || *table.slots[slot].get_mut() == 0 {
            return false;
        }

        let mask = table.mask;
        let mut j = slot;
        loop {
            j = (j + 1) & mask;
            let key = *table.slots[j].get_mut();
            let Some(moved) = Pair::from_key(key) else {
                break;
            };

            let k = moved.hash() & mask;
            let shift = if j > slot {
                k <= slot || k > j
            } else {
                k <= slot && k > j
            };
            if shift {
                *table.slots[slot].get_mut() = key;
                slot = j;
            }
        }

        *table.slots[slot].get_mut() = 0;
        *table.count.get_mut() -= 1;
        true
    }

    fn shrink_if_sparse(&mut self) {
        let table = self.table.get_mut();
        let count = *table.count.get_mut();
        if table.slots.len() > PAIR_TABLE_MIN_SLOTS && count * PAIR_TABLE_TRIM_FACTOR < table.slots.len() {
            let size = pick_size(count * 2);
            Self::resize(table, size);
        }
    }

    /// Removes every pair that references `node`.
    pub fn retain_without(&mut self, node: u32) -> usize {
        self.retain(|pair| !pair.contains(node))
    }

    /// Keeps only the pairs for which `keep` returns `true`, in one pass over
    /// the table. Returns the number of removed pairs.
    pub fn retain(&mut self, mut keep: impl FnMut(Pair) -> bool) -> usize {
        let mut removed = 0;
        let mut slot = 0;
        while slot < self.table.get_mut().slots.len() {
            let key = *self.table.get_mut().slots[slot].get_mut();
            match Pair::from_key(key) {
                // A shifted entry may now occupy this slot; look again.
                Some(pair) if !keep(pair) => {
                    self.remove_slot_keep_size(slot);
                    removed += 1;
                }
                _ => slot += 1,
            }
        }
        if removed > 0 {
            self.shrink_if_sparse();
        }
        removed
    }

    /// Drops every pair; the table keeps its current size.
    pub fn clear(&mut self) {
        let table = self.table.get_mut();
        for slot in table.slots.iter_mut() {
            *slot.get_mut() = 0;
        }
        *table.count.get_mut() = 0;
    }

    /// Calls `f` for every stored pair.
    pub fn for_each(&self, mut f: impl FnMut(Pair)) {
        let table = self.table.read();
        for slot in table.slots.iter() {
            if let Some(pair) = Pair::from_key(slot.load(Ordering::Acquire)) {
                f(pair);
            }
        }
    }

    /// Parallel variant of [`Self::for_each`].
    #[cfg(feature = "parallel")]
    pub fn par_for_each(&self, f: impl Fn(Pair) + Send + Sync) {
        let table = self.table.read();
        table.slots.par_iter().for_each(|slot| {
            if let Some(pair) = Pair::from_key(slot.load(Ordering::Acquire)) {
                f(pair);
            }
        });
    }

    pub fn pairs(&self) -> Vec<Pair> {
        let mut out = Vec::with_capacity(self.len());
        self.for_each(|pair| out.push(pair));
        out
    }

    fn resize(table: &mut Table, size: usize) {
        if table.slots.len() == size {
            return;
        }
        debug!("PairHashSet: resizing {} -> {}", table.slots.len(), size);

        let old = std::mem::replace(table, Table::with_slots(size));
        for slot in old.slots.iter() {
            if let Some(pair) = Pair::from_key(slot.load(Ordering::Relaxed)) {
                table.insert(pair);
            }
        }
    }
}
