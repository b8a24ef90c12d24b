// ABOUTME: Background stats monitoring: at most one task per container or pod, feeding its history.
// ABOUTME: Streams continuously where the backend can, otherwise polls one-shot samples.

use super::history::{PodStatsHistory, StatsHistory};
use crate::model::{PodStatsEntry, StatsEntry};
use crate::runtime::{BackendError, BackendStream, Runtime, StatsMode};
use crate::types::{ContainerId, PodId};
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A kind of entity whose stats can be watched.
#[async_trait]
pub trait Watched: Send + Sync + 'static {
    type Id: Clone + Eq + Hash + fmt::Display + Send + Sync + 'static;
    type Sample: Send + 'static;
    type History: Default + Send + Sync + 'static;

    /// Log field value naming the entity kind.
    const KIND: &'static str;

    async fn open(
        runtime: &dyn Runtime,
        id: &Self::Id,
        mode: StatsMode,
        cancel: CancellationToken,
    ) -> Result<BackendStream<Self::Sample>, BackendError>;

    fn append(history: &Self::History, id: &Self::Id, sample: Self::Sample, max_age: Duration);
}

/// Container samples, with percentages derived against the previous one.
#[derive(Debug)]
pub struct ContainerStats;

#[async_trait]
impl Watched for ContainerStats {
    type Id = ContainerId;
    type Sample = StatsEntry;
    type History = StatsHistory;

    const KIND: &'static str = "container";

    async fn open(
        runtime: &dyn Runtime,
        id: &ContainerId,
        mode: StatsMode,
        cancel: CancellationToken,
    ) -> Result<BackendStream<StatsEntry>, BackendError> {
        runtime.container_stats(id, mode, cancel).await
    }

    fn append(history: &StatsHistory, id: &ContainerId, sample: StatsEntry, max_age: Duration) {
        let record = history.record(sample, max_age);
        tracing::trace!(
            container = %id,
            cpu = record.derived.cpu_percent,
            memory = record.derived.memory_percent,
            "stats sample"
        );
    }
}

/// Pod-wide samples as the engine reports them.
#[derive(Debug)]
pub struct PodStats;

#[async_trait]
impl Watched for PodStats {
    type Id = PodId;
    type Sample = PodStatsEntry;
    type History = PodStatsHistory;

    const KIND: &'static str = "pod";

    async fn open(
        runtime: &dyn Runtime,
        id: &PodId,
        mode: StatsMode,
        cancel: CancellationToken,
    ) -> Result<BackendStream<PodStatsEntry>, BackendError> {
        runtime.pod_stats(id, mode, cancel).await
    }

    fn append(history: &PodStatsHistory, id: &PodId, sample: PodStatsEntry, max_age: Duration) {
        let record = history.record(sample, max_age);
        tracing::trace!(
            pod = %id,
            cpu = record.stats.cpu_percent,
            memory = record.stats.memory_percent,
            "pod stats sample"
        );
    }
}

pub type StatsMonitor = Monitor<ContainerStats>;
pub type PodStatsMonitor = Monitor<PodStats>;

/// Why a monitoring task stopped.
#[derive(Debug)]
enum Exit {
    Cancelled,
    StreamEnded,
    NotSupported,
    Failed(BackendError),
}

/// A cancelled slot stays in the map until its task has exited, so a
/// re-listed entity never gets a second task next to the old one.
struct Slot<H> {
    history: Arc<H>,
    monitoring: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl<H: Default> Slot<H> {
    fn new(cancel: CancellationToken) -> Self {
        Self {
            history: Arc::new(H::default()),
            monitoring: Arc::new(AtomicBool::new(false)),
            cancel,
        }
    }

    fn is_running(&self) -> bool {
        self.monitoring.load(Ordering::SeqCst)
    }

    fn is_retired(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Owns one history per entity and the tasks that fill them.
pub struct Monitor<W: Watched> {
    runtime: Arc<dyn Runtime>,
    poll_interval: Duration,
    max_age: Duration,
    slots: Mutex<HashMap<W::Id, Slot<W::History>>>,
    /// Set once the backend reports stats unsupported; no task is started after that.
    unsupported: Arc<AtomicBool>,
    shutdown: CancellationToken,
}

impl<W: Watched> fmt::Debug for Monitor<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("kind", &W::KIND)
            .field("poll_interval", &self.poll_interval)
            .field("max_age", &self.max_age)
            .field("entities", &self.slots.lock().len())
            .finish_non_exhaustive()
    }
}

impl<W: Watched> Monitor<W> {
    pub fn new(runtime: Arc<dyn Runtime>, poll_interval: Duration, max_age: Duration) -> Self {
        Self {
            runtime,
            poll_interval,
            max_age,
            slots: Mutex::new(HashMap::new()),
            unsupported: Arc::new(AtomicBool::new(false)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Start monitoring `id` unless a task for it is already running or
    /// still winding down. Returns whether a new task was started.
    pub fn ensure(&self, id: &W::Id) -> bool {
        if self.unsupported.load(Ordering::SeqCst) || self.shutdown.is_cancelled() {
            return false;
        }

        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(id).filter(|slot| slot.is_retired()) {
            if slot.is_running() {
                return false;
            }
            slots.remove(id);
        }
        let slot = slots
            .entry(id.clone())
            .or_insert_with(|| Slot::new(self.shutdown.child_token()));
        if slot
            .monitoring
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let task = Task::<W> {
            runtime: self.runtime.clone(),
            id: id.clone(),
            history: slot.history.clone(),
            cancel: slot.cancel.clone(),
            poll_interval: self.poll_interval,
            max_age: self.max_age,
        };
        let monitoring = slot.monitoring.clone();
        let unsupported = self.unsupported.clone();
        tokio::spawn(async move {
            let id = task.id.clone();
            let exit = task.run().await;
            match &exit {
                Exit::Cancelled => tracing::debug!(kind = W::KIND, id = %id, "stats monitor cancelled"),
                Exit::StreamEnded => tracing::debug!(kind = W::KIND, id = %id, "stats stream ended"),
                Exit::NotSupported => {
                    unsupported.store(true, Ordering::SeqCst);
                    tracing::info!(kind = W::KIND, id = %id, "stats not supported by backend");
                }
                Exit::Failed(e) => {
                    tracing::warn!(kind = W::KIND, id = %id, "stats monitor stopped: {}", e)
                }
            }
            monitoring.store(false, Ordering::SeqCst);
        });
        true
    }

    pub fn is_monitoring(&self, id: &W::Id) -> bool {
        self.slots.lock().get(id).is_some_and(Slot::is_running)
    }

    /// History of a live entity. Removed entities have none, even while
    /// their task is still stopping.
    pub fn history(&self, id: &W::Id) -> Option<Arc<W::History>> {
        self.slots
            .lock()
            .get(id)
            .filter(|slot| !slot.is_retired())
            .map(|slot| slot.history.clone())
    }

    /// Stop every entity not in `live`. Its slot is dropped once the task
    /// has exited.
    pub fn retain(&self, live: &HashSet<W::Id>) {
        self.slots.lock().retain(|id, slot| {
            if live.contains(id) {
                return true;
            }
            slot.cancel.cancel();
            slot.is_running()
        });
    }

    /// Cancel every task. Nothing starts afterwards.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// One entity's monitoring loop.
struct Task<W: Watched> {
    runtime: Arc<dyn Runtime>,
    id: W::Id,
    history: Arc<W::History>,
    cancel: CancellationToken,
    poll_interval: Duration,
    max_age: Duration,
}

impl<W: Watched> Task<W> {
    async fn run(self) -> Exit {
        match W::open(self.runtime.as_ref(), &self.id, StatsMode::Continuous, self.cancel.clone()).await
        {
            Ok(stream) => return self.consume(stream).await,
            Err(e) if e.is_not_supported() => {
                tracing::debug!(kind = W::KIND, id = %self.id, "continuous stats unavailable, polling");
            }
            Err(e) => return Exit::Failed(e),
        }
        self.poll().await
    }

    async fn consume(&self, mut stream: BackendStream<W::Sample>) -> Exit {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return Exit::Cancelled,
                item = stream.next() => match item {
                    Some(Ok(sample)) => self.append(sample),
                    Some(Err(e)) if e.is_not_supported() => return Exit::NotSupported,
                    Some(Err(e)) => return Exit::Failed(e),
                    None => return Exit::StreamEnded,
                },
            }
        }
    }

    async fn poll(&self) -> Exit {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return Exit::Cancelled,
                _ = ticker.tick() => {}
            }

            let mut stream =
                match W::open(self.runtime.as_ref(), &self.id, StatsMode::OneShot, self.cancel.clone()).await {
                    Ok(stream) => stream,
                    Err(e) if e.is_not_supported() => return Exit::NotSupported,
                    Err(e) => return Exit::Failed(e),
                };
            match stream.next().await {
                Some(Ok(sample)) => self.append(sample),
                Some(Err(e)) => return Exit::Failed(e),
                None => return Exit::StreamEnded,
            }
        }
    }

    fn append(&self, sample: W::Sample) {
        W::append(&self.history, &self.id, sample, self.max_age);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CpuStats, MemoryStats};
    use crate::runtime::fake::FakeRuntime;
    use chrono::DateTime;

    fn sample(secs: i64, total: u64, system: u64) -> StatsEntry {
        let mut entry = StatsEntry::new(DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap());
        entry.cpu = CpuStats {
            total_usage: total,
            system_usage: system,
            online_cpus: 2,
        };
        entry.memory = MemoryStats {
            usage: 50,
            limit: 200,
            cache: 0,
        };
        entry
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        for _ in 0..200 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    fn monitor(runtime: Arc<FakeRuntime>) -> StatsMonitor {
        StatsMonitor::new(runtime, Duration::from_millis(10), Duration::from_secs(300))
    }

    #[tokio::test]
    async fn one_task_per_container() {
        let runtime = Arc::new(FakeRuntime {
            continuous: true,
            hold_open: true,
            ..Default::default()
        });
        runtime.push_samples("web", [sample(0, 100, 1_000), sample(1, 200, 2_000)]);
        let monitor = monitor(runtime.clone());
        let id = ContainerId::new("web");

        assert!(monitor.ensure(&id));
        assert!(!monitor.ensure(&id));
        assert!(!monitor.ensure(&id));
        assert!(monitor.is_monitoring(&id));

        let history = monitor.history(&id).unwrap();
        wait_until(|| history.len() == 2).await;
        assert_eq!(runtime.stats_calls.load(Ordering::SeqCst), 1);
        let latest = history.latest().unwrap();
        assert!((latest.derived.cpu_percent - 10.0).abs() < 1e-9);
        assert!((latest.derived.memory_percent - 25.0).abs() < 1e-9);

        monitor.shutdown();
        wait_until(|| !monitor.is_monitoring(&id)).await;
    }

    #[tokio::test]
    async fn polls_when_continuous_is_unsupported() {
        let runtime = Arc::new(FakeRuntime::default());
        runtime.push_samples("db", [sample(0, 0, 0), sample(1, 50, 1_000)]);
        let monitor = monitor(runtime.clone());
        let id = ContainerId::new("db");

        assert!(monitor.ensure(&id));
        let history = monitor.history(&id).unwrap();
        wait_until(|| history.len() == 2).await;

        // The third poll finds no sample and ends the task.
        wait_until(|| !monitor.is_monitoring(&id)).await;
        assert_eq!(history.len(), 2);
        assert!((history.latest().unwrap().derived.cpu_percent - 5.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn ended_stream_allows_restart() {
        let runtime = Arc::new(FakeRuntime {
            continuous: true,
            ..Default::default()
        });
        let monitor = monitor(runtime.clone());
        let id = ContainerId::new("api");

        assert!(monitor.ensure(&id));
        wait_until(|| !monitor.is_monitoring(&id)).await;
        assert!(monitor.ensure(&id));
    }

    #[tokio::test]
    async fn retain_cancels_removed_containers() {
        let runtime = Arc::new(FakeRuntime {
            continuous: true,
            hold_open: true,
            ..Default::default()
        });
        let monitor = monitor(runtime);
        let gone = ContainerId::new("gone");
        let kept = ContainerId::new("kept");
        monitor.ensure(&gone);
        monitor.ensure(&kept);

        monitor.retain(&HashSet::from([kept.clone()]));
        assert!(monitor.history(&gone).is_none());
        assert!(monitor.is_monitoring(&kept));
        wait_until(|| !monitor.is_monitoring(&gone)).await;

        // The stopped slot is dropped on the next pass.
        monitor.retain(&HashSet::from([kept.clone()]));
        assert_eq!(monitor.slots.lock().len(), 1);

        monitor.shutdown();
        assert!(!monitor.ensure(&ContainerId::new("late")));
    }

    #[tokio::test]
    async fn relisted_container_waits_for_old_task() {
        let runtime = Arc::new(FakeRuntime {
            continuous: true,
            hold_open: true,
            ..Default::default()
        });
        let monitor = monitor(runtime.clone());
        let id = ContainerId::new("flaky");
        assert!(monitor.ensure(&id));

        monitor.retain(&HashSet::new());
        // The cancelled task has not run yet, so it still counts.
        assert!(monitor.is_monitoring(&id));
        assert!(!monitor.ensure(&id));

        wait_until(|| !monitor.is_monitoring(&id)).await;
        assert!(monitor.ensure(&id));
        assert!(monitor.history(&id).is_some());
        wait_until(|| runtime.stats_calls.load(Ordering::SeqCst) == 2).await;

        monitor.shutdown();
    }

    mod pods {
        use super::*;
        use crate::model::PodStatsEntry;
        use crate::types::PodId;

        fn pod_sample(cpu: f64) -> PodStatsEntry {
            PodStatsEntry {
                pod_id: "p1".to_string(),
                pod_name: "backend".to_string(),
                cpu_percent: cpu,
                memory_percent: 12.5,
                ..Default::default()
            }
        }

        fn pod_monitor(runtime: Arc<FakeRuntime>) -> PodStatsMonitor {
            PodStatsMonitor::new(runtime, Duration::from_millis(10), Duration::from_secs(300))
        }

        #[tokio::test]
        async fn continuous_pod_samples_fill_history() {
            let runtime = Arc::new(FakeRuntime {
                continuous: true,
                hold_open: true,
                ..Default::default()
            });
            runtime.push_pod_samples("p1", [pod_sample(3.0), pod_sample(4.5)]);
            let monitor = pod_monitor(runtime.clone());
            let id = PodId::new("p1");

            assert!(monitor.ensure(&id));
            assert!(!monitor.ensure(&id));
            let history = monitor.history(&id).unwrap();
            wait_until(|| history.len() == 2).await;
            assert_eq!(history.latest().map(|r| r.stats.cpu_percent), Some(4.5));
            assert_eq!(runtime.pod_stats_calls.load(Ordering::SeqCst), 1);

            monitor.shutdown();
            wait_until(|| !monitor.is_monitoring(&id)).await;
        }

        #[tokio::test]
        async fn unsupported_pod_stats_stop_further_tasks() {
            let runtime = Arc::new(FakeRuntime {
                pods_unsupported: true,
                ..Default::default()
            });
            let monitor = pod_monitor(runtime.clone());
            let id = PodId::new("p1");

            assert!(monitor.ensure(&id));
            wait_until(|| !monitor.is_monitoring(&id)).await;
            assert!(!monitor.ensure(&PodId::new("p2")));
            // One continuous attempt, one one-shot attempt.
            assert_eq!(runtime.pod_stats_calls.load(Ordering::SeqCst), 2);
        }
    }
}
