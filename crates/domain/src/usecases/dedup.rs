//! Two-tier duplicate gate over posting links
//!
//! Tier one is an in-process set seeded from durable history at run start and
//! updated on every acceptance; tier two is a single round-trip to the
//! durable store for links the set has not seen. A positive answer from
//! either tier is authoritative and cached.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::ports::{PostingStore, StoreError};

/// Run-scoped duplicate gate; the sole enforcement point for link uniqueness
pub struct DedupGate {
    store: Arc<dyn PostingStore>,
    seen: Mutex<HashSet<String>>,
}

impl DedupGate {
    /// Seed the in-process set from durable history.
    ///
    /// Store failure here is fatal to the run: without history the gate
    /// cannot uphold the uniqueness invariant from the start.
    pub async fn seed(store: Arc<dyn PostingStore>, limit: u32) -> Result<Self, StoreError> {
        let links = store.recent_links(limit).await?;
        tracing::debug!(seeded = links.len(), "Seeded dedup set from history");
        Ok(Self {
            store,
            seen: Mutex::new(links.into_iter().collect()),
        })
    }

    /// Whether this link was already accepted, this run or any earlier one.
    ///
    /// A store outage on the tier-two lookup fails open: the posting is
    /// treated as new so a transient outage cannot halt the run, at the cost
    /// of a possible republish, and the degraded check is logged.
    pub async fn is_duplicate(&self, link: &str) -> bool {
        if self.seen_set().contains(link) {
            return true;
        }

        match self.store.link_exists(link).await {
            Ok(true) => {
                self.seen_set().insert(link.to_string());
                true
            }
            Ok(false) => false,
            Err(error) => {
                tracing::warn!(
                    %error,
                    link,
                    "Dedup store unavailable, treating link as new"
                );
                false
            }
        }
    }

    /// Record an acceptance so later postings in this run see it without I/O
    pub fn mark_accepted(&self, link: &str) {
        self.seen_set().insert(link.to_string());
    }

    fn seen_set(&self) -> MutexGuard<'_, HashSet<String>> {
        self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
