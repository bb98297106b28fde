//! LRU cache wrapper for [`ExpansionPolicy`] that memoizes proposals.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use lru::LruCache;

use chem::{Molecule, MoleculeId};

use crate::engine::{ExpansionPolicy, ReactionCandidate};

/// Wraps an [`ExpansionPolicy`] with an LRU cache keyed by canonical molecule id.
///
/// The same intermediate often shows up in many branches of the tree; a
/// cached answer skips the model call. Failures are not cached.
pub struct CachedExpansionPolicy<P> {
    inner: P,
    cache: Mutex<LruCache<(MoleculeId, usize), Vec<ReactionCandidate>>>,
    hits: AtomicU32,
    misses: AtomicU32,
}

impl<P> CachedExpansionPolicy<P> {
    /// Create a cached wrapper holding at most `capacity` answers (minimum 1).
    pub fn new(inner: P, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU32::new(0),
            misses: AtomicU32::new(0),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Return (hits, misses) counters since last reset.
    pub fn counters(&self) -> (u32, u32) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    pub fn reset_counters(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<P: ExpansionPolicy> ExpansionPolicy for CachedExpansionPolicy<P> {
    async fn propose(
        &self,
        molecule: &Molecule,
        max: usize,
    ) -> anyhow::Result<Vec<ReactionCandidate>> {
        let key = (molecule.id().clone(), max);
        {
            let mut cache = self.cache.lock().unwrap();
            if let Some(cached) = cache.get(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(cached.clone());
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let candidates = self.inner.propose(molecule, max).await?;
        self.cache.lock().unwrap().put(key, candidates.clone());
        Ok(candidates)
    }

    fn cache_stats(&self) -> Option<(u32, u32)> {
        Some(self.counters())
    }
}
