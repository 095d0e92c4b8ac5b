//! Tiered result cache.
//!
//! Tiers are queried in order; the first hit wins:
//!
//! ```text
//! 1. memory    bounded in-process map            (keyed, read/write)
//! 2. remote    HTTP key/value store, optional    (keyed, read/write)
//! 3. template  heuristic canned results          (read only)
//! ```
//!
//! Keyed tiers receive every write, invalidation and clear. A hit in a later
//! keyed tier is promoted into the earlier keyed tiers. Template hits carry
//! the submission's own structural scan with canned semantic scores; they are
//! returned as cached but never written back.
//!
//! Tier failures never reach the caller: they are logged and treated as a
//! miss (reads) or skipped (writes).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::GraderResult;
use crate::model::{CacheEntry, CodeSubmission, GradingResult, Rubric};

mod key;
mod memory;
mod remote;
mod template;

pub use key::cache_key;
pub use memory::MemoryTier;
pub use remote::RemoteTier;
pub use template::TemplateTier;

/// What a tier is, which decides how the chain treats it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierKind {
    Memory,
    Remote,
    Template,
}

impl TierKind {
    /// Keyed tiers store entries under the cache key and accept writes.
    pub fn is_keyed(self) -> bool {
        matches!(self, Self::Memory | Self::Remote)
    }
}

/// Everything a tier may use to answer a lookup.
#[derive(Debug, Clone, Copy)]
pub struct CacheLookup<'a> {
    pub key: &'a str,
    pub submission: &'a CodeSubmission,
    pub rubric: &'a Rubric,
}

/// One layer of the result cache.
#[async_trait]
pub trait CacheTier: Send + Sync {
    fn kind(&self) -> TierKind;

    async fn get(&self, lookup: &CacheLookup<'_>) -> GraderResult<Option<CacheEntry>>;

    async fn set(&self, key: &str, entry: &CacheEntry) -> GraderResult<()>;

    async fn del(&self, key: &str) -> GraderResult<()>;

    async fn clear(&self) -> GraderResult<()>;
}

/// Cache counters since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub memory_hits: u64,
    pub remote_hits: u64,
    pub template_hits: u64,
    pub misses: u64,
    pub writes: u64,
}

#[derive(Debug, Default)]
struct Counters {
    memory_hits: AtomicU64,
    remote_hits: AtomicU64,
    template_hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl Counters {
    fn hit(&self, kind: TierKind) {
        let counter = match kind {
            TierKind::Memory => &self.memory_hits,
            TierKind::Remote => &self.remote_hits,
            TierKind::Template => &self.template_hits,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            remote_hits: self.remote_hits.load(Ordering::Relaxed),
            template_hits: self.template_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }
}

/// Ordered chain of cache tiers.
pub struct ResultCache {
    tiers: Vec<Arc<dyn CacheTier>>,
    counters: Counters,
}

impl ResultCache {
    /// Cache over `tiers`, queried in the given order.
    pub fn new(tiers: Vec<Arc<dyn CacheTier>>) -> Self {
        Self {
            tiers,
            counters: Counters::default(),
        }
    }

    /// Single in-process tier.
    pub fn memory_only(capacity: usize) -> Self {
        Self::new(vec![Arc::new(MemoryTier::new(capacity))])
    }

    /// Build the tier chain described by `config`.
    ///
    /// An unreachable distributed store does not fail construction; the tier
    /// starts disconnected and reconnects in the background.
    pub async fn from_config(config: &EngineConfig) -> GraderResult<Self> {
        let mut tiers: Vec<Arc<dyn CacheTier>> =
            vec![Arc::new(MemoryTier::new(config.cache_capacity))];
        if let Some(url) = &config.remote_url {
            let remote = RemoteTier::connect(url, config.remote_ttl_secs, config.remote_timeout_secs)
                .await?;
            tiers.push(Arc::new(remote));
        }
        if config.heuristic_templates {
            tiers.push(Arc::new(TemplateTier::new()));
        }
        Ok(Self::new(tiers))
    }

    pub fn tier_kinds(&self) -> Vec<TierKind> {
        self.tiers.iter().map(|t| t.kind()).collect()
    }

    /// First hit across the tiers, marked `cached`.
    pub async fn get(&self, lookup: &CacheLookup<'_>) -> Option<GradingResult> {
        for (idx, tier) in self.tiers.iter().enumerate() {
            let kind = tier.kind();
            let entry = match tier.get(lookup).await {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    debug!(tier = ?kind, key = lookup.key, "cache miss");
                    continue;
                }
                Err(e) => {
                    warn!(tier = ?kind, key = lookup.key, error = %e, "cache read failed, treating as miss");
                    continue;
                }
            };

            debug!(tier = ?kind, key = lookup.key, hits = entry.hits, "cache hit");
            self.counters.hit(kind);

            if kind.is_keyed() {
                for earlier in self.tiers[..idx].iter().filter(|t| t.kind().is_keyed()) {
                    if let Err(e) = earlier.set(lookup.key, &entry).await {
                        warn!(tier = ?earlier.kind(), error = %e, "cache promotion failed");
                    }
                }
            }

            let mut result = entry.result;
            result.cached = true;
            return Some(result);
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store `result` in every keyed tier.
    pub async fn set(&self, key: &str, result: &GradingResult) {
        let entry = CacheEntry::new(result.clone());
        for tier in self.keyed() {
            if let Err(e) = tier.set(key, &entry).await {
                warn!(tier = ?tier.kind(), key, error = %e, "cache write failed, skipping tier");
            }
        }
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Remove `key` from every keyed tier.
    pub async fn invalidate(&self, key: &str) {
        for tier in self.keyed() {
            if let Err(e) = tier.del(key).await {
                warn!(tier = ?tier.kind(), key, error = %e, "cache invalidation failed");
            }
        }
    }

    /// Empty every keyed tier.
    pub async fn clear(&self) {
        for tier in self.keyed() {
            if let Err(e) = tier.clear().await {
                warn!(tier = ?tier.kind(), error = %e, "cache clear failed");
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    fn keyed(&self) -> impl Iterator<Item = &Arc<dyn CacheTier>> {
        self.tiers.iter().filter(|t| t.kind().is_keyed())
    }
}
