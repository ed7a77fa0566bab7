//! Lookup memoization.
//!
//! One [`LookupMemo`] lives for a single expansion call. It maps each
//! distinct [`LookupTerm`] to the lookup answering it, so every node needing
//! the same index scan shares one in-flight request whatever its operator or
//! polarity. Insertion is an atomic insert-if-absent on a concurrent map; the
//! stored future is shared and can be awaited any number of times.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common_error::SiftResult;
use common_runtime::LookupPool;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use log::trace;
use sift_metadata::{IndexLookupService, IndexMatches, LookupError, LookupTerm};

/// Outcome of one lookup, shared between every placeholder waiting on it.
pub type LookupOutcome = Result<Arc<IndexMatches>, LookupError>;

/// A lookup that any number of waiters can await.
pub type SharedLookup = Shared<BoxFuture<'static, LookupOutcome>>;

/// Lookup term to in-flight lookup.
#[derive(Default)]
pub struct LookupMemo {
    entries: DashMap<LookupTerm, SharedLookup>,
    issued: AtomicUsize,
}

impl LookupMemo {
    /// An empty memo.
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit `term` unless a lookup for it already exists.
    ///
    /// Returns whether a new lookup was issued.
    pub fn submit(
        &self,
        term: &LookupTerm,
        index: &Arc<dyn IndexLookupService>,
        pool: &LookupPool,
    ) -> SiftResult<bool> {
        match self.entries.entry(term.clone()) {
            Entry::Occupied(_) => {
                trace!("Reusing lookup for {}", term);
                Ok(false)
            }
            Entry::Vacant(slot) => {
                trace!("Submitting lookup for {}", term);
                let index = Arc::clone(index);
                let term = term.clone();
                let handle = pool.spawn(async move { index.lookup(&term).await.map(Arc::new) })?;
                let lookup = async move {
                    match handle.await {
                        Ok(outcome) => outcome,
                        Err(e) => Err(LookupError::Unavailable(format!("lookup task failed: {e}"))),
                    }
                }
                .boxed()
                .shared();
                slot.insert(lookup);
                self.issued.fetch_add(1, Ordering::Relaxed);
                Ok(true)
            }
        }
    }

    /// The lookup registered for `term`.
    pub fn get(&self, term: &LookupTerm) -> Option<SharedLookup> {
        self.entries.get(term).map(|entry| entry.value().clone())
    }

    /// Number of distinct lookups issued.
    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use sift_metadata::memory::InMemoryIndex;

    use super::*;

    fn term(value: &str) -> LookupTerm {
        LookupTerm::Unfielded {
            value: value.to_string(),
            regex: false,
        }
    }

    #[test]
    fn test_one_lookup_per_term() {
        let memory = Arc::new(InMemoryIndex::new().with_values("F", ["x"]));
        let index: Arc<dyn IndexLookupService> = memory.clone();
        let pool = LookupPool::new("memo-test", 2).unwrap();
        let memo = LookupMemo::new();

        assert!(memo.submit(&term("x"), &index, &pool).unwrap());
        assert!(!memo.submit(&term("x"), &index, &pool).unwrap());
        assert!(memo.submit(&term("y"), &index, &pool).unwrap());
        assert_eq!(memo.issued(), 2);

        let first = pool.block_on(memo.get(&term("x")).unwrap()).unwrap();
        let again = pool.block_on(memo.get(&term("x")).unwrap()).unwrap();
        assert!(Arc::ptr_eq(&first.unwrap(), &again.unwrap()));
        assert_eq!(memory.calls(), 2);
    }

    #[test]
    fn test_regex_and_literal_terms_are_distinct() {
        let index: Arc<dyn IndexLookupService> = Arc::new(InMemoryIndex::new());
        let pool = LookupPool::new("memo-test", 1).unwrap();
        let memo = LookupMemo::new();

        let regex = LookupTerm::Unfielded {
            value: "x".to_string(),
            regex: true,
        };
        assert!(memo.submit(&term("x"), &index, &pool).unwrap());
        assert!(memo.submit(&regex, &index, &pool).unwrap());
        assert_eq!(memo.issued(), 2);
    }

    #[test]
    fn test_unknown_term() {
        let memo = LookupMemo::new();
        assert!(memo.get(&term("nothing")).is_none());
    }
}
