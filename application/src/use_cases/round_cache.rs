//! Read-through cache over a consensus repository.
//!
//! The store stays the only durable truth: the cache is filled on reads and
//! cleared after every successful commit or maintenance pass, never written
//! independently. A read that raced with an invalidation is returned to its
//! caller but not cached.

use crate::ports::consensus_store::{
    ConsensusRepository, MaintenanceReport, RetentionPolicy, StoreError,
};
use async_trait::async_trait;
use quorum_gate_domain::{AgentOutputRecord, ConsensusRound, RoundFilter, RoundId, StoredRound};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// Caching decorator for any [`ConsensusRepository`].
pub struct CachedConsensusStore<R: ConsensusRepository> {
    inner: Arc<R>,
    rounds: RwLock<HashMap<RoundId, StoredRound>>,
    listings: RwLock<HashMap<RoundFilter, Vec<ConsensusRound>>>,
    /// Bumped by every invalidation
    generation: AtomicU64,
}

impl<R: ConsensusRepository> CachedConsensusStore<R> {
    pub fn new(inner: Arc<R>) -> Self {
        Self {
            inner,
            rounds: RwLock::new(HashMap::new()),
            listings: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &Arc<R> {
        &self.inner
    }

    /// Drop every cached entry.
    pub async fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.rounds.write().await.clear();
        self.listings.write().await.clear();
        debug!("Round cache invalidated");
    }

    /// Number of cached rounds and listings.
    pub async fn cached_entries(&self) -> (usize, usize) {
        (self.rounds.read().await.len(), self.listings.read().await.len())
    }
}

#[async_trait]
impl<R: ConsensusRepository> ConsensusRepository for CachedConsensusStore<R> {
    async fn commit_round(
        &self,
        round: &ConsensusRound,
        outputs: &[AgentOutputRecord],
    ) -> Result<RoundId, StoreError> {
        let round_id = self.inner.commit_round(round, outputs).await?;
        self.invalidate().await;
        Ok(round_id)
    }

    async fn read_round(&self, round_id: &RoundId) -> Result<StoredRound, StoreError> {
        if let Some(hit) = self.rounds.read().await.get(round_id) {
            return Ok(hit.clone());
        }
        let generation = self.generation.load(Ordering::SeqCst);
        let stored = self.inner.read_round(round_id).await?;
        let mut rounds = self.rounds.write().await;
        if self.generation.load(Ordering::SeqCst) == generation {
            rounds.insert(round_id.clone(), stored.clone());
        }
        Ok(stored)
    }

    async fn list_rounds(&self, filter: &RoundFilter) -> Result<Vec<ConsensusRound>, StoreError> {
        if let Some(hit) = self.listings.read().await.get(filter) {
            return Ok(hit.clone());
        }
        let generation = self.generation.load(Ordering::SeqCst);
        let rounds = self.inner.list_rounds(filter).await?;
        let mut listings = self.listings.write().await;
        if self.generation.load(Ordering::SeqCst) == generation {
            listings.insert(filter.clone(), rounds.clone());
        } else {
            debug!("Not caching a listing read across an invalidation");
        }
        Ok(rounds)
    }

    async fn run_maintenance(
        &self,
        retention: &RetentionPolicy,
    ) -> Result<MaintenanceReport, StoreError> {
        let report = self.inner.run_maintenance(retention).await?;
        self.invalidate().await;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use quorum_gate_domain::{QuorumRule, Resolution, Verdict};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU32};
    use tokio::sync::Notify;

    /// Repository that counts reads and keeps rounds in memory.
    #[derive(Default)]
    struct CountingRepository {
        rounds: Mutex<Vec<StoredRound>>,
        reads: AtomicU32,
        lists: AtomicU32,
        /// Park the next listing after it has taken its snapshot
        hold_next_list: AtomicBool,
        list_snapshotted: Notify,
        release_list: Notify,
    }

    #[async_trait]
    impl ConsensusRepository for CountingRepository {
        async fn commit_round(
            &self,
            round: &ConsensusRound,
            outputs: &[AgentOutputRecord],
        ) -> Result<RoundId, StoreError> {
            self.rounds.lock().unwrap().push(StoredRound {
                round: round.clone(),
                outputs: outputs.to_vec(),
            });
            Ok(round.round_id.clone())
        }

        async fn read_round(&self, round_id: &RoundId) -> Result<StoredRound, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.rounds
                .lock()
                .unwrap()
                .iter()
                .find(|s| &s.round.round_id == round_id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(round_id.to_string()))
        }

        async fn list_rounds(&self, _filter: &RoundFilter) -> Result<Vec<ConsensusRound>, StoreError> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            let snapshot: Vec<ConsensusRound> =
                self.rounds.lock().unwrap().iter().map(|s| s.round.clone()).collect();
            if self.hold_next_list.swap(false, Ordering::SeqCst) {
                self.list_snapshotted.notify_one();
                self.release_list.notified().await;
            }
            Ok(snapshot)
        }

        async fn run_maintenance(
            &self,
            _retention: &RetentionPolicy,
        ) -> Result<MaintenanceReport, StoreError> {
            self.rounds.lock().unwrap().clear();
            Ok(MaintenanceReport::default())
        }
    }

    fn round(milestone: &str) -> ConsensusRound {
        let now = Utc::now();
        let resolution = Resolution {
            verdict: Verdict::Failed,
            synthesized_content: None,
            quorum_met: false,
            success_count: 0,
            required_successes: QuorumRule::Majority.required_successes(1),
            degraded: false,
        };
        ConsensusRound::settle(RoundId::generate(), milestone, "plan", now, now, 1, resolution)
    }

    #[tokio::test]
    async fn test_read_is_cached() {
        let inner = Arc::new(CountingRepository::default());
        let cache = CachedConsensusStore::new(Arc::clone(&inner));
        let r = round("SPEC-1");
        cache.commit_round(&r, &[]).await.unwrap();

        cache.read_round(&r.round_id).await.unwrap();
        cache.read_round(&r.round_id).await.unwrap();

        assert_eq!(inner.reads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.cached_entries().await, (1, 0));
    }

    #[tokio::test]
    async fn test_commit_invalidates_listings() {
        let inner = Arc::new(CountingRepository::default());
        let cache = CachedConsensusStore::new(Arc::clone(&inner));
        let filter = RoundFilter::new();

        cache.commit_round(&round("SPEC-1"), &[]).await.unwrap();
        assert_eq!(cache.list_rounds(&filter).await.unwrap().len(), 1);
        assert_eq!(cache.list_rounds(&filter).await.unwrap().len(), 1);
        assert_eq!(inner.lists.load(Ordering::SeqCst), 1);

        cache.commit_round(&round("SPEC-2"), &[]).await.unwrap();
        assert_eq!(cache.list_rounds(&filter).await.unwrap().len(), 2);
        assert_eq!(inner.lists.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_listing_read_across_a_commit_is_not_cached() {
        let inner = Arc::new(CountingRepository::default());
        inner.hold_next_list.store(true, Ordering::SeqCst);
        let cache = Arc::new(CachedConsensusStore::new(Arc::clone(&inner)));
        let filter = RoundFilter::new();

        let reader = {
            let cache = Arc::clone(&cache);
            let filter = filter.clone();
            tokio::spawn(async move { cache.list_rounds(&filter).await })
        };
        inner.list_snapshotted.notified().await;

        cache.commit_round(&round("SPEC-1"), &[]).await.unwrap();
        inner.release_list.notify_one();

        // The in-flight reader still sees its pre-commit snapshot
        assert!(reader.await.unwrap().unwrap().is_empty());
        assert_eq!(cache.cached_entries().await, (0, 0));
        assert_eq!(cache.list_rounds(&filter).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_maintenance_invalidates() {
        let inner = Arc::new(CountingRepository::default());
        let cache = CachedConsensusStore::new(Arc::clone(&inner));
        let r = round("SPEC-1");
        cache.commit_round(&r, &[]).await.unwrap();
        cache.read_round(&r.round_id).await.unwrap();

        cache.run_maintenance(&RetentionPolicy::default()).await.unwrap();

        assert!(matches!(
            cache.read_round(&r.round_id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_misses_are_not_cached() {
        let inner = Arc::new(CountingRepository::default());
        let cache = CachedConsensusStore::new(Arc::clone(&inner));
        let missing = RoundId::new("missing");

        assert!(cache.read_round(&missing).await.is_err());
        assert!(cache.read_round(&missing).await.is_err());
        assert_eq!(inner.reads.load(Ordering::SeqCst), 2);
    }
}
