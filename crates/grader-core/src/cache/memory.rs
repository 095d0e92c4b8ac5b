//! Bounded in-process tier.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use super::{CacheLookup, CacheTier, TierKind};
use crate::error::GraderResult;
use crate::model::CacheEntry;

#[derive(Default)]
struct Slots {
    entries: HashMap<String, CacheEntry>,
    order: VecDeque<String>,
}

/// Capacity-bounded map; evicts the oldest inserted key on overflow.
pub struct MemoryTier {
    capacity: usize,
    slots: Mutex<Slots>,
}

impl MemoryTier {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Mutex::new(Slots::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    fn kind(&self) -> TierKind {
        TierKind::Memory
    }

    async fn get(&self, lookup: &CacheLookup<'_>) -> GraderResult<Option<CacheEntry>> {
        let mut slots = self.lock();
        Ok(slots.entries.get_mut(lookup.key).map(|entry| {
            entry.hits += 1;
            entry.clone()
        }))
    }

    async fn set(&self, key: &str, entry: &CacheEntry) -> GraderResult<()> {
        if self.capacity == 0 {
            return Ok(());
        }
        let mut slots = self.lock();
        if slots.entries.insert(key.to_string(), entry.clone()).is_some() {
            return Ok(());
        }
        slots.order.push_back(key.to_string());

        while slots.entries.len() > self.capacity {
            let Some(oldest) = slots.order.pop_front() else {
                break;
            };
            slots.entries.remove(&oldest);
            debug!(key = %oldest, capacity = self.capacity, "evicted cache entry");
        }
        Ok(())
    }

    async fn del(&self, key: &str) -> GraderResult<()> {
        let mut slots = self.lock();
        if slots.entries.remove(key).is_some() {
            slots.order.retain(|k| k != key);
        }
        Ok(())
    }

    async fn clear(&self) -> GraderResult<()> {
        let mut slots = self.lock();
        slots.entries.clear();
        slots.order.clear();
        Ok(())
    }
}
