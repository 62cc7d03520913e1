//! Per-class predicate cache.
//!
//! Entries are populated lazily and kept for the lifetime of the client:
//! there is no TTL and no eviction, since a request class's schema does not
//! change within a session.
//!
//! # Single-flight population
//!
//! Each class gets its own `OnceCell`. Concurrent first-time lookups for the
//! same class await one shared fetch instead of each issuing a modeldef
//! request. A failed fetch leaves the cell empty, so the next lookup retries.

use crate::error::Result;
use crate::types::Predicate;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};

type Slot = Arc<OnceCell<Arc<[Predicate]>>>;

/// Thread-safe, never-evicting predicate cache.
#[derive(Default)]
pub struct PredicateCache {
    slots: RwLock<HashMap<String, Slot>>,
}

impl PredicateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the predicates for `class`, running `fetch` if they are not cached.
    pub async fn get_or_fetch<F, Fut>(&self, class: &str, fetch: F) -> Result<Arc<[Predicate]>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Predicate>>>,
    {
        let slot = self.slot(class).await;
        let predicates = slot
            .get_or_try_init(|| async {
                let predicates = fetch().await?;
                tracing::debug!(class = %class, count = predicates.len(), "Cached predicates");
                Ok::<_, crate::error::ClientError>(Arc::from(predicates))
            })
            .await?;
        Ok(predicates.clone())
    }

    /// Cached predicates for `class`, without fetching.
    pub async fn get(&self, class: &str) -> Option<Arc<[Predicate]>> {
        let slots = self.slots.read().await;
        slots.get(class).and_then(|slot| slot.get().cloned())
    }

    /// Number of classes with cached predicates.
    pub async fn len(&self) -> usize {
        let slots = self.slots.read().await;
        slots.values().filter(|slot| slot.initialized()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn slot(&self, class: &str) -> Slot {
        if let Some(slot) = self.slots.read().await.get(class) {
            return slot.clone();
        }
        let mut slots = self.slots.write().await;
        slots.entry(class.to_string()).or_default().clone()
    }
}

impl std::fmt::Debug for PredicateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateCache").finish_non_exhaustive()
    }
}
