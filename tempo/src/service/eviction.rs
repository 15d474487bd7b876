use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::service::delete::DeletionEntryPoint;
use crate::service::queue::PendingQueue;
use crate::storage::local::LocalStore;
use crate::storage::{ContentStore, with_deadline};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Evicting,
}

#[derive(Clone, Debug)]
pub struct EvictionPolicy {
    pub interval: Duration,
    /// Deadline for one call into the deletion entry point.
    pub delete_timeout: Duration,
    /// Consecutive failures before a name is quarantined, `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl EvictionPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.eviction_interval,
            delete_timeout: config.delete_timeout,
            max_attempts: config.max_eviction_attempts,
        }
    }
}

/// What one eviction cycle did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// The queue was rebuilt from the content store listing.
    pub reconciled: bool,
    pub evicted: Option<String>,
    pub requeued: Option<String>,
    pub quarantined: Option<String>,
    /// Local files removed because the content store no longer lists them.
    pub swept: Vec<String>,
}

/// Periodically evicts the oldest pending file from both tiers.
///
/// Every cycle runs reconcile, dequeue, delete, requeue on failure and a
/// local sweep, strictly in that order. Cycles never overlap: the loop awaits
/// each one before taking the next tick, and missed ticks are skipped.
pub struct EvictionScheduler {
    queue: Arc<PendingQueue>,
    content: Arc<dyn ContentStore>,
    local: Arc<LocalStore>,
    entry_point: Arc<dyn DeletionEntryPoint>,
    policy: EvictionPolicy,
    state: SchedulerState,
    failures: HashMap<String, u32>,
    quarantined: HashSet<String>,
}

impl EvictionScheduler {
    pub fn new(
        queue: Arc<PendingQueue>,
        content: Arc<dyn ContentStore>,
        local: Arc<LocalStore>,
        entry_point: Arc<dyn DeletionEntryPoint>,
        policy: EvictionPolicy,
    ) -> Self {
        Self {
            queue,
            content,
            local,
            entry_point,
            policy,
            state: SchedulerState::Idle,
            failures: HashMap::new(),
            quarantined: HashSet::new(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn quarantined(&self) -> &HashSet<String> {
        &self.quarantined
    }

    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(token))
    }

    /// Ticks until `token` is cancelled. Cancellation is only observed between
    /// cycles, a cycle in progress runs to completion.
    pub async fn run(mut self, token: CancellationToken) {
        let period = self.policy.interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!("Auto-cleanup scheduled every {:?}", period);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.run_cycle().await;
                    tracing::debug!(?report, "Auto-cleanup cycle finished");
                }
            }
        }
        tracing::info!("Auto-cleanup routine shutting down");
    }

    pub async fn run_cycle(&mut self) -> CycleReport {
        self.state = SchedulerState::Evicting;
        let report = self.evict_oldest().await;
        self.state = SchedulerState::Idle;
        report
    }

    async fn evict_oldest(&mut self) -> CycleReport {
        let mut report = CycleReport {
            reconciled: self.reconcile().await,
            ..Default::default()
        };

        let Some(filename) = self.queue.dequeue().await else {
            tracing::info!("Auto-cleanup: Queue is empty");
            return report;
        };
        tracing::info!("Auto-cleanup: Processing file {filename}");

        let deleted = with_deadline(
            self.policy.delete_timeout,
            "eviction delete",
            self.entry_point.delete(&filename),
        )
        .await;

        match deleted {
            Ok(()) => {
                self.failures.remove(&filename);
                tracing::info!("Auto-cleanup: File {filename} removed");
                report.evicted = Some(filename);
            }
            Err(err) => {
                let attempts = self.failures.entry(filename.clone()).or_insert(0);
                *attempts += 1;
                let attempts = *attempts;

                match self.policy.max_attempts {
                    Some(max) if attempts >= max => {
                        tracing::warn!(
                            "Auto-cleanup: giving up on {filename} after {attempts} attempts: {err}"
                        );
                        self.failures.remove(&filename);
                        self.quarantined.insert(filename.clone());
                        report.quarantined = Some(filename);
                    }
                    _ => {
                        tracing::warn!(
                            "Auto-cleanup: Error deleting {filename} (attempt {attempts}), \
                             re-queued: {err}"
                        );
                        self.queue.enqueue(filename.clone()).await;
                        report.requeued = Some(filename);
                    }
                }
            }
        }

        report.swept = self.sweep_local().await;
        report
    }

    /// Makes the content store listing authoritative for the queue.
    ///
    /// Failure counts of names the listing no longer has are dropped.
    async fn reconcile(&mut self) -> bool {
        match self.content.list().await {
            Ok(names) => {
                let listed: HashSet<&str> = names.iter().map(String::as_str).collect();
                self.failures.retain(|name, _| listed.contains(name.as_str()));

                let names: Vec<String> = names
                    .into_iter()
                    .filter(|name| !self.quarantined.contains(name))
                    .collect();
                self.queue.replace_all(names).await;
                true
            }
            Err(err) => {
                tracing::warn!("Auto-cleanup: reconciliation skipped, using existing queue: {err}");
                false
            }
        }
    }

    /// Removes local files the content store no longer knows about.
    async fn sweep_local(&self) -> Vec<String> {
        let remote: HashSet<String> = match self.content.list().await {
            Ok(names) => names.into_iter().collect(),
            Err(err) => {
                tracing::warn!("Auto-cleanup: local sweep skipped: {err}");
                return Vec::new();
            }
        };
        let local = match self.local.list().await {
            Ok(names) => names,
            Err(err) => {
                tracing::warn!("Auto-cleanup: local sweep skipped: {err}");
                return Vec::new();
            }
        };

        let mut removed = Vec::new();
        for filename in local.into_iter().filter(|name| !remote.contains(name)) {
            match self.local.delete(&filename).await {
                Ok(true) => removed.push(filename),
                Ok(false) => {}
                Err(err) => tracing::warn!("Auto-cleanup: could not remove {filename}: {err}"),
            }
        }
        if !removed.is_empty() {
            tracing::info!("Auto-cleanup: swept {} orphaned local files", removed.len());
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, Result};
    use crate::service::delete::DeletionCoordinator;
    use crate::test_support::FailingContentStore;
    use axum::body::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::{TempDir, tempdir};
    use tokio::sync::Notify;

    struct RefusingEntryPoint {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl DeletionEntryPoint for RefusingEntryPoint {
        async fn delete(&self, name: &str) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::StorageIo(format!("refused {name}")))
        }
    }

    struct HangingEntryPoint;

    /// Deletes through the coordinator after a pause, flagging when it started.
    struct SlowEntryPoint {
        inner: Arc<DeletionCoordinator>,
        pause: Duration,
        started: Arc<Notify>,
    }

    #[async_trait::async_trait]
    impl DeletionEntryPoint for SlowEntryPoint {
        async fn delete(&self, name: &str) -> Result<()> {
            self.started.notify_one();
            tokio::time::sleep(self.pause).await;
            self.inner.delete(name).await
        }
    }

    #[async_trait::async_trait]
    impl DeletionEntryPoint for HangingEntryPoint {
        async fn delete(&self, _name: &str) -> Result<()> {
            std::future::pending().await
        }
    }

    fn policy(max_attempts: Option<u32>) -> EvictionPolicy {
        EvictionPolicy {
            interval: Duration::from_millis(20),
            delete_timeout: Duration::from_millis(200),
            max_attempts,
        }
    }

    struct Fixture {
        _tmp: TempDir,
        local: Arc<LocalStore>,
        content: Arc<FailingContentStore>,
        queue: Arc<PendingQueue>,
    }

    impl Fixture {
        async fn new() -> Self {
            let tmp = tempdir().unwrap();
            let local = Arc::new(LocalStore::open(tmp.path()).await.unwrap());
            Self {
                _tmp: tmp,
                local,
                content: Arc::new(FailingContentStore::healthy()),
                queue: Arc::new(PendingQueue::new()),
            }
        }

        async fn stage(&self, name: &str, mirrored: bool) {
            self.local.write_bytes(name, Bytes::from_static(b"data")).await.unwrap();
            if mirrored {
                self.content.inner.put(name, Bytes::from_static(b"data")).await.unwrap();
            }
            self.queue.enqueue(name).await;
        }

        fn coordinator(&self) -> Arc<DeletionCoordinator> {
            Arc::new(DeletionCoordinator::new(
                self.local.clone(),
                self.content.clone(),
                self.queue.clone(),
            ))
        }

        fn scheduler(
            &self,
            entry_point: Arc<dyn DeletionEntryPoint>,
            max: Option<u32>,
        ) -> EvictionScheduler {
            EvictionScheduler::new(
                self.queue.clone(),
                self.content.clone(),
                self.local.clone(),
                entry_point,
                policy(max),
            )
        }
    }

    #[tokio::test]
    async fn empty_cycle_is_a_no_op() {
        let fx = Fixture::new().await;
        let mut scheduler = fx.scheduler(fx.coordinator(), None);

        let report = scheduler.run_cycle().await;
        assert!(report.reconciled);
        assert_eq!(report.evicted, None);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn evicts_the_oldest_file_from_both_tiers() {
        let fx = Fixture::new().await;
        fx.stage("old.bin", true).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        fx.stage("new.bin", true).await;
        let mut scheduler = fx.scheduler(fx.coordinator(), None);

        let report = scheduler.run_cycle().await;
        assert_eq!(report.evicted.as_deref(), Some("old.bin"));
        assert!(!fx.local.exists("old.bin").await);
        assert_eq!(fx.content.inner.list().await.unwrap(), vec!["new.bin"]);
        assert_eq!(fx.queue.snapshot().await, vec!["new.bin"]);
        assert!(fx.local.exists("new.bin").await);
    }

    #[tokio::test]
    async fn failed_delete_requeues_at_the_tail() {
        let fx = Fixture::new().await;
        fx.content.fail_list.store(true, Ordering::SeqCst);
        fx.stage("first", false).await;
        fx.stage("second", false).await;
        let refusing = Arc::new(RefusingEntryPoint {
            calls: AtomicUsize::new(0),
        });
        let mut scheduler = fx.scheduler(refusing.clone(), None);

        let report = scheduler.run_cycle().await;
        assert!(!report.reconciled);
        assert_eq!(report.requeued.as_deref(), Some("first"));
        assert_eq!(fx.queue.snapshot().await, vec!["second", "first"]);

        // retried on the next tick, forever by default
        for _ in 0..5 {
            scheduler.run_cycle().await;
        }
        assert_eq!(refusing.calls.load(Ordering::SeqCst), 6);
        assert_eq!(fx.queue.len().await, 2);
        assert!(scheduler.quarantined().is_empty());
    }

    #[tokio::test]
    async fn content_store_failure_in_coordinator_triggers_requeue() {
        let fx = Fixture::new().await;
        fx.stage("sticky", true).await;
        fx.content.fail_delete.store(true, Ordering::SeqCst);
        let mut scheduler = fx.scheduler(fx.coordinator(), None);

        let report = scheduler.run_cycle().await;
        assert_eq!(report.requeued.as_deref(), Some("sticky"));
        assert_eq!(fx.queue.snapshot().await, vec!["sticky"]);

        fx.content.fail_delete.store(false, Ordering::SeqCst);
        let report = scheduler.run_cycle().await;
        assert_eq!(report.evicted.as_deref(), Some("sticky"));
        assert!(fx.queue.is_empty().await);
    }

    #[tokio::test]
    async fn hanging_delete_times_out_and_requeues() {
        let fx = Fixture::new().await;
        fx.stage("slow", true).await;
        let mut scheduler = fx.scheduler(Arc::new(HangingEntryPoint), None);

        let report = scheduler.run_cycle().await;
        assert_eq!(report.requeued.as_deref(), Some("slow"));
        assert_eq!(fx.queue.snapshot().await, vec!["slow"]);
    }

    #[tokio::test]
    async fn capped_retries_quarantine_the_file() {
        let fx = Fixture::new().await;
        fx.stage("poison", true).await;
        let refusing = Arc::new(RefusingEntryPoint {
            calls: AtomicUsize::new(0),
        });
        let mut scheduler = fx.scheduler(refusing.clone(), Some(2));

        assert_eq!(scheduler.run_cycle().await.requeued.as_deref(), Some("poison"));
        assert_eq!(scheduler.run_cycle().await.quarantined.as_deref(), Some("poison"));
        assert!(scheduler.quarantined().contains("poison"));

        // reconciliation keeps it out of the queue from now on
        let report = scheduler.run_cycle().await;
        assert_eq!(report.evicted, None);
        assert!(fx.queue.is_empty().await);
        assert_eq!(refusing.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn reconciliation_replaces_local_drift() {
        let fx = Fixture::new().await;
        fx.stage("remote-a", true).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        fx.stage("remote-b", true).await;
        fx.queue.replace_all(["ghost".to_string()]).await;
        let mut scheduler = fx.scheduler(fx.coordinator(), None);

        let report = scheduler.run_cycle().await;
        assert!(report.reconciled);
        assert_eq!(report.evicted.as_deref(), Some("remote-a"));
        assert_eq!(fx.queue.snapshot().await, vec!["remote-b"]);
    }

    #[tokio::test]
    async fn sweep_removes_local_orphans() {
        let fx = Fixture::new().await;
        fx.stage("mirrored-old", true).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        fx.stage("mirrored-new", true).await;
        fx.stage("orphan", false).await;
        let mut scheduler = fx.scheduler(fx.coordinator(), None);

        let report = scheduler.run_cycle().await;
        assert_eq!(report.evicted.as_deref(), Some("mirrored-old"));
        assert_eq!(report.swept, vec!["orphan"]);
        assert!(fx.local.exists("mirrored-new").await);
        assert!(!fx.local.exists("orphan").await);
    }

    #[tokio::test]
    async fn run_loop_stops_on_cancel() {
        let fx = Fixture::new().await;
        fx.stage("tick", true).await;
        let token = CancellationToken::new();
        let handle = fx.scheduler(fx.coordinator(), None).spawn(token.clone());

        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
        assert!(fx.content.inner.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancellation_lets_the_running_cycle_finish() {
        let fx = Fixture::new().await;
        fx.stage("in-flight", true).await;
        let started = Arc::new(Notify::new());
        let slow = Arc::new(SlowEntryPoint {
            inner: fx.coordinator(),
            pause: Duration::from_millis(150),
            started: started.clone(),
        });
        let token = CancellationToken::new();
        let handle = fx.scheduler(slow, None).spawn(token.clone());

        tokio::time::timeout(Duration::from_secs(2), started.notified())
            .await
            .expect("no cycle started");
        token.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();

        assert!(!fx.local.exists("in-flight").await);
        assert!(fx.content.inner.list().await.unwrap().is_empty());
        assert!(fx.queue.is_empty().await);
    }

    #[tokio::test]
    async fn failure_counts_follow_the_content_listing() {
        let fx = Fixture::new().await;
        fx.stage("flaky", true).await;
        let refusing = Arc::new(RefusingEntryPoint {
            calls: AtomicUsize::new(0),
        });
        let mut scheduler = fx.scheduler(refusing, Some(3));

        scheduler.run_cycle().await;
        assert_eq!(scheduler.failures.get("flaky"), Some(&1));

        // removed behind the relay's back
        fx.content.inner.delete("flaky").await.unwrap();
        let report = scheduler.run_cycle().await;
        assert!(report.reconciled);
        assert!(scheduler.failures.is_empty());
        assert!(fx.queue.is_empty().await);
    }
}
