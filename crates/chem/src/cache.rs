//! Explicitly scoped LRU memoization of canonicalization results.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lru::LruCache;

use crate::engine::ChemistryEngine;
use crate::types::{ChemError, Molecule, MoleculeId, TemplateId};

/// LRU cache from raw molecule representation to canonical [`Molecule`].
///
/// Owned by whoever creates it and handed to a [`CachingEngine`]; searches
/// that must not share memoized results simply use separate caches.
pub struct CanonicalCache {
    entries: Mutex<LruCache<String, Molecule>>,
    hits: AtomicU32,
    misses: AtomicU32,
}

impl CanonicalCache {
    /// Create a cache holding at most `capacity` entries.
    ///
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU32::new(0),
            misses: AtomicU32::new(0),
        }
    }

    fn get(&self, representation: &str) -> Option<Molecule> {
        let found = self.entries.lock().unwrap().get(representation).cloned();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    fn put(&self, representation: &str, molecule: Molecule) {
        self.entries
            .lock()
            .unwrap()
            .put(representation.to_string(), molecule);
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return (hits, misses) counters since creation or the last reset.
    pub fn counters(&self) -> (u32, u32) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    /// Reset hit/miss counters to zero.
    pub fn reset_counters(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

/// Wraps a [`ChemistryEngine`] so that `canonicalize` goes through a
/// [`CanonicalCache`]. Template application and identity are passed through
/// unchanged.
pub struct CachingEngine<E> {
    inner: E,
    cache: Arc<CanonicalCache>,
}

impl<E> CachingEngine<E> {
    pub fn new(inner: E, cache: Arc<CanonicalCache>) -> Self {
        Self { inner, cache }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn cache(&self) -> &Arc<CanonicalCache> {
        &self.cache
    }
}

#[async_trait]
impl<E: ChemistryEngine> ChemistryEngine for CachingEngine<E> {
    async fn canonicalize(&self, representation: &str) -> Result<Molecule, ChemError> {
        if let Some(molecule) = self.cache.get(representation) {
            return Ok(molecule);
        }
        match self.inner.canonicalize(representation).await {
            Ok(molecule) => {
                tracing::debug!(
                    representation,
                    id = %molecule.id(),
                    "Canonical cache miss"
                );
                self.cache.put(representation, molecule.clone());
                Ok(molecule)
            }
            Err(e) => {
                tracing::warn!(representation, error = %e, "Canonicalization failed");
                Err(e)
            }
        }
    }

    async fn apply(
        &self,
        template: &TemplateId,
        molecule: &Molecule,
    ) -> Result<Vec<Vec<Molecule>>, ChemError> {
        self.inner.apply(template, molecule).await
    }

    fn canonical_id(&self, molecule: &Molecule) -> MoleculeId {
        self.inner.canonical_id(molecule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Uppercases the input; counts calls to detect cache hits.
    struct UppercaseEngine {
        calls: AtomicUsize,
    }

    impl UppercaseEngine {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChemistryEngine for UppercaseEngine {
        async fn canonicalize(&self, representation: &str) -> Result<Molecule, ChemError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if representation.is_empty() {
                return Err(ChemError::Parse("empty".into()));
            }
            Ok(Molecule::new(representation, representation.to_uppercase()))
        }

        async fn apply(
            &self,
            _template: &TemplateId,
            _molecule: &Molecule,
        ) -> Result<Vec<Vec<Molecule>>, ChemError> {
            Ok(vec![])
        }

        fn canonical_id(&self, molecule: &Molecule) -> MoleculeId {
            MoleculeId::new(molecule.smiles().to_uppercase())
        }
    }

    #[tokio::test]
    async fn test_cache_hit_skips_inner() {
        let cache = Arc::new(CanonicalCache::new(8));
        let engine = CachingEngine::new(UppercaseEngine::new(), Arc::clone(&cache));

        let a = engine.canonicalize("cco").await.unwrap();
        let b = engine.canonicalize("cco").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.id().as_str(), "CCO");
        assert_eq!(engine.inner().calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.counters(), (1, 1));
    }

    #[test]
    fn test_canonical_id_delegates_to_inner() {
        let engine = CachingEngine::new(UppercaseEngine::new(), Arc::new(CanonicalCache::new(8)));
        let molecule = Molecule::from_canonical("cco");
        assert_eq!(engine.canonical_id(&molecule).as_str(), "CCO");
        assert_eq!(engine.canonical_id(&molecule), engine.inner().canonical_id(&molecule));
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = Arc::new(CanonicalCache::new(8));
        let engine = CachingEngine::new(UppercaseEngine::new(), Arc::clone(&cache));

        assert!(engine.canonicalize("").await.is_err());
        assert!(engine.canonicalize("").await.is_err());
        assert_eq!(engine.inner().calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_separate_caches_do_not_interfere() {
        let first = Arc::new(CanonicalCache::new(8));
        let second = Arc::new(CanonicalCache::new(8));
        let e1 = CachingEngine::new(UppercaseEngine::new(), Arc::clone(&first));
        let e2 = CachingEngine::new(UppercaseEngine::new(), Arc::clone(&second));

        e1.canonicalize("ccn").await.unwrap();
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());

        e2.canonicalize("ccn").await.unwrap();
        assert_eq!(e2.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = Arc::new(CanonicalCache::new(1));
        let engine = CachingEngine::new(UppercaseEngine::new(), Arc::clone(&cache));

        engine.canonicalize("a").await.unwrap();
        engine.canonicalize("b").await.unwrap();
        engine.canonicalize("a").await.unwrap();
        assert_eq!(engine.inner().calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_reset_and_clear() {
        let cache = CanonicalCache::new(0);
        cache.put("x", Molecule::from_canonical("X"));
        assert!(cache.get("x").is_some());
        assert!(cache.get("y").is_none());
        assert_eq!(cache.counters(), (1, 1));
        cache.reset_counters();
        assert_eq!(cache.counters(), (0, 0));
        cache.clear();
        assert!(cache.is_empty());
    }
}
