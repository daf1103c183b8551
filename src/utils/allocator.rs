use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Slot index plus the generation the slot had when the proxy was stored.
/// The generation is bumped on removal, so a handle kept past its proxy's
/// removal no longer resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct GenerationalId {
    pub index: usize,
    pub generation: u32,
}

impl GenerationalId {
    pub fn new(index: usize, generation: u32) -> Self {
        Self { index, generation }
    }
}

/// Handle of a proxy registered with a [`DynamicTree`](crate::collision::broadphase::DynamicTree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ProxyId(pub GenerationalId);

impl ProxyId {
    pub fn new(index: usize, generation: u32) -> Self {
        Self(GenerationalId::new(index, generation))
    }

    pub fn index(&self) -> usize {
        self.0.index
    }

    pub fn generation(&self) -> u32 {
        self.0.generation
    }

    /// The unset handle returned by `ProxyId::default()`.
    pub fn is_null(&self) -> bool {
        self.0.index == usize::MAX
    }
}

impl Default for ProxyId {
    fn default() -> Self {
        Self(GenerationalId::new(usize::MAX, 0))
    }
}

/// Proxy storage of the broad-phase tree.
///
/// A proxy keeps its [`ProxyId`] for as long as it is registered, however
/// often its tree leaf is reinserted. Freed slots are reused oldest first.
pub struct Arena<T> {
    items: Vec<Option<T>>,
    generations: Vec<u32>,
    free_list: VecDeque<usize>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            generations: Vec::with_capacity(capacity),
            free_list: VecDeque::new(),
            len: 0,
        }
    }

    /// Stores a proxy, reusing the longest-freed slot when one exists.
    pub fn insert(&mut self, item: T) -> ProxyId {
        self.len += 1;

        if let Some(index) = self.free_list.pop_front() {
            let generation = self.generations[index];
            self.items[index] = Some(item);
            return ProxyId::new(index, generation);
        }

        let index = self.items.len();
        self.items.push(Some(item));
        self.generations.push(0);
        ProxyId::new(index, 0)
    }

    pub fn get(&self, id: ProxyId) -> Option<&T> {
        if self.is_valid(id) {
            self.items.get(id.index()).and_then(|slot| slot.as_ref())
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, id: ProxyId) -> Option<&mut T> {
        if self.is_valid(id) {
            self.items.get_mut(id.index()).and_then(|slot| slot.as_mut())
        } else {
            None
        }
    }

    pub fn contains(&self, id: ProxyId) -> bool {
        self.get(id).is_some()
    }

    /// Takes the proxy out and retires `id`; `None` for stale handles.
    pub fn remove(&mut self, id: ProxyId) -> Option<T> {
        if !self.is_valid(id) {
            return None;
        }

        let slot = self.items.get_mut(id.index())?;
        let item = slot.take()?;
        self.generations[id.index()] = self.generations[id.index()].wrapping_add(1);
        self.free_list.push_back(id.index());
        self.len -= 1;
        Some(item)
    }

    /// Drops every proxy. Handles issued before the call stop resolving.
    pub fn clear(&mut self) {
        for (index, slot) in self.items.iter_mut().enumerate() {
            if slot.take().is_some() {
                self.generations[index] = self.generations[index].wrapping_add(1);
                self.free_list.push_back(index);
            }
        }
        self.len = 0;
    }

    pub fn iter(&self) -> ArenaIter<'_, T> {
        ArenaIter {
            inner: self.items.iter(),
        }
    }

    pub fn iter_mut(&mut self) -> ArenaIterMut<'_, T> {
        ArenaIterMut {
            inner: self.items.iter_mut(),
        }
    }

    /// Live `(id, item)` pairs in slot order.
    pub fn iter_with_ids(&self) -> impl Iterator<Item = (ProxyId, &T)> + '_ {
        self.items.iter().enumerate().filter_map(|(index, slot)| {
            slot.as_ref()
                .map(|item| (ProxyId::new(index, self.generations[index]), item))
        })
    }

    pub fn ids(&self) -> impl Iterator<Item = ProxyId> + '_ {
        self.iter_with_ids().map(|(id, _)| id)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn is_valid(&self, id: ProxyId) -> bool {
        self.generations
            .get(id.index())
            .copied()
            .map(|gen| gen == id.generation())
            .unwrap_or(false)
    }
}

#[cfg(feature = "parallel")]
impl<T: Send + Sync> Arena<T> {
    /// Parallel mutable iteration over live items.
    pub fn par_iter_mut(&mut self) -> impl ParallelIterator<Item = &mut T> + '_ {
        self.items.par_iter_mut().filter_map(|slot| slot.as_mut())
    }
}

pub struct ArenaIter<'a, T> {
    inner: std::slice::Iter<'a, Option<T>>,
}

impl<'a, T> Iterator for ArenaIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        for slot in self.inner.by_ref() {
            if let Some(item) = slot.as_ref() {
                return Some(item);
            }
        }
        None
    }
}

pub struct ArenaIterMut<'a, T> {
    inner: std::slice::IterMut<'a, Option<T>>,
}

impl<'a, T> Iterator for ArenaIterMut<'a, T> {
    type Item = &'a mut T;

    fn next(&mut self) -> Option<Self::Item> {
        for slot in self.inner.by_ref() {
            if let Some(item) = slot.as_mut() {
                return Some(item);
            }
        }
        None
    }
}
