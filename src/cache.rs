//! Instance-retrieval memo table.
//!
//! Retrieval is by far the most expensive query the engines issue, and both
//! engines revisit expressions constantly (the evolutionary population is
//! full of repeats, refinement chains share prefixes). The cache memoizes
//! retrieval keyed by *normal form*, so syntactic variants of the same
//! concept share one entry. One cache lives for exactly one fit run and is
//! recreated on refit — entries are never shared across learning problems.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::error::KbResult;
use crate::expr::ConceptExpr;
use crate::kb::KnowledgeSource;
use crate::vocab::IndividualSet;

/// Concurrent retrieval cache, safe to share across rayon fitness workers.
#[derive(Debug, Default)]
pub struct RetrievalCache {
    entries: DashMap<ConceptExpr, Arc<IndividualSet>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Hit/miss counters of a cache, read at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl RetrievalCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieve the instance set of `expr`, consulting the cache first.
    ///
    /// The expression is normalized before lookup; the returned set is shared
    /// via `Arc` so callers can hold it without copying.
    pub fn retrieve<K: KnowledgeSource + ?Sized>(
        &self,
        expr: &ConceptExpr,
        kb: &K,
    ) -> KbResult<Arc<IndividualSet>> {
        let key = expr.normal_form();
        if let Some(cached) = self.entries.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(&cached));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let retrieved = Arc::new(kb.individuals_of(&key)?);
        // A concurrent worker may have raced us here; either entry is the
        // same retrieval, so last-write-wins is fine.
        self.entries.insert(key, Arc::clone(&retrieved));
        Ok(retrieved)
    }

    /// Current hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    /// Number of cached retrievals.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_kb() -> crate::kb::MemoryKnowledgeBase {
        let mut kb = crate::kb::MemoryKnowledgeBase::new();
        kb.assert_class("anna", "Female");
        kb.assert_class("bruno", "Male");
        kb
    }

    #[test]
    fn second_retrieval_hits() {
        let kb = small_kb();
        let cache = RetrievalCache::new();
        let expr = ConceptExpr::atomic("Female");

        let first = cache.retrieve(&expr, &kb).unwrap();
        let second = cache.retrieve(&expr, &kb).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn syntactic_variants_share_an_entry() {
        let kb = small_kb();
        let cache = RetrievalCache::new();

        let ab = ConceptExpr::and(vec![
            ConceptExpr::atomic("Female"),
            ConceptExpr::atomic("Male"),
        ])
        .unwrap();
        let ba = ConceptExpr::and(vec![
            ConceptExpr::atomic("Male"),
            ConceptExpr::atomic("Female"),
        ])
        .unwrap();

        cache.retrieve(&ab, &kb).unwrap();
        cache.retrieve(&ba, &kb).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().hits, 1);
    }
}
