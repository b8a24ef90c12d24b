// ABOUTME: Orchestration layer: live lists per kind, hierarchy, compose services and stats monitoring.
// ABOUTME: The display layer calls only this and the runtime contract.

mod compose;
mod hierarchy;
mod history;
mod monitor;

pub use compose::Compose;
pub use hierarchy::{GroupingRules, Hierarchy, PodGroup, ServiceSlot};
pub use history::{PodStatsHistory, PodStatsRecord, StatsHistory, StatsRecord};
pub use monitor::{PodStatsMonitor, StatsMonitor};

use crate::config::{DashboardConfig, LabelConfig};
use crate::model::{
    ContainerDetails, ContainerSummary, ImageSummary, NetworkSummary, PodSummary, VolumeSummary,
};
use crate::runtime::{BackendError, ContainerOps, Runtime, VolumeOps};
use crate::types::{ContainerId, PodId};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// A listed container plus its lazily fetched inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerEntity {
    pub summary: ContainerSummary,
    pub details: Option<ContainerDetails>,
    pub name: String,
}

impl ContainerEntity {
    pub fn id(&self) -> &ContainerId {
        &self.summary.id
    }
}

#[derive(Debug, Default)]
struct ContainerLists {
    containers: Vec<ContainerEntity>,
    pods: Vec<PodSummary>,
    services: Vec<String>,
    hierarchy: Hierarchy,
}

/// Live state behind the dashboard. Each kind has its own lock, held for
/// the whole of that kind's refresh.
pub struct Dashboard {
    runtime: Arc<dyn Runtime>,
    compose: Compose,
    labels: LabelConfig,
    monitor: StatsMonitor,
    pod_monitor: PodStatsMonitor,
    show_exited: AtomicBool,
    containers: Mutex<ContainerLists>,
    images: Mutex<Vec<ImageSummary>>,
    volumes: Mutex<Vec<VolumeSummary>>,
    networks: Mutex<Vec<NetworkSummary>>,
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("mode", &self.runtime.mode())
            .field("compose", &self.compose)
            .field("monitor", &self.monitor)
            .field("pod_monitor", &self.pod_monitor)
            .finish_non_exhaustive()
    }
}

impl Dashboard {
    pub fn new(runtime: Arc<dyn Runtime>, compose: Compose, config: &DashboardConfig) -> Self {
        let monitor = StatsMonitor::new(
            runtime.clone(),
            config.stats.poll_interval,
            config.stats.max_duration,
        );
        let pod_monitor = PodStatsMonitor::new(
            runtime.clone(),
            config.stats.poll_interval,
            config.stats.max_duration,
        );
        Self {
            runtime,
            compose,
            labels: config.labels.clone(),
            monitor,
            pod_monitor,
            show_exited: AtomicBool::new(true),
            containers: Mutex::new(ContainerLists::default()),
            images: Mutex::new(Vec::new()),
            volumes: Mutex::new(Vec::new()),
            networks: Mutex::new(Vec::new()),
        }
    }

    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        &self.runtime
    }

    pub fn show_exited(&self) -> bool {
        self.show_exited.load(Ordering::SeqCst)
    }

    /// Takes effect on the next container refresh.
    pub fn set_show_exited(&self, show: bool) {
        self.show_exited.store(show, Ordering::SeqCst);
    }

    /// List containers, fetch their details concurrently, regroup them and
    /// make sure every running container and pod is monitored.
    pub async fn refresh_containers(&self) -> Result<Hierarchy, BackendError> {
        let mut state = self.containers.lock().await;

        let summaries = self.runtime.list_containers().await?;
        let details = join_all(summaries.iter().map(|c| self.inspect(&c.id))).await;
        let containers: Vec<ContainerEntity> = summaries
            .into_iter()
            .zip(details)
            .map(|(summary, details)| ContainerEntity {
                name: summary.display_name(&self.labels.name),
                summary,
                details,
            })
            .collect();

        let pods = match self.runtime.list_pods().await {
            Ok(pods) => pods,
            Err(e) if e.is_not_supported() => Vec::new(),
            Err(e) => {
                tracing::warn!("pod listing failed: {}", e);
                Vec::new()
            }
        };
        let services = self.compose.services().await;
        // Without services there are no slots to fill.
        let project = if services.is_empty() {
            Vec::new()
        } else {
            self.compose.container_ids().await
        };

        let summaries: Vec<ContainerSummary> = containers.iter().map(|c| c.summary.clone()).collect();
        let hierarchy = Hierarchy::build(
            &summaries,
            &pods,
            &services,
            GroupingRules {
                labels: &self.labels,
                show_exited: self.show_exited(),
                project: &project,
            },
        );

        let live: HashSet<ContainerId> = containers.iter().map(|c| c.id().clone()).collect();
        self.monitor.retain(&live);
        for container in containers.iter().filter(|c| c.summary.state.is_running()) {
            self.monitor.ensure(container.id());
        }
        let live_pods: HashSet<PodId> = pods.iter().map(|p| p.id.clone()).collect();
        self.pod_monitor.retain(&live_pods);
        for pod in pods.iter().filter(|p| p.is_running()) {
            self.pod_monitor.ensure(&pod.id);
        }

        tracing::debug!(
            containers = containers.len(),
            pods = pods.len(),
            services = services.len(),
            "refreshed containers"
        );
        *state = ContainerLists {
            containers,
            pods,
            services,
            hierarchy: hierarchy.clone(),
        };
        Ok(hierarchy)
    }

    async fn inspect(&self, id: &ContainerId) -> Option<ContainerDetails> {
        match self.runtime.inspect_container(id).await {
            Ok(details) => Some(details),
            Err(e) => {
                tracing::warn!(container = %id, "inspect failed: {}", e);
                None
            }
        }
    }

    pub async fn refresh_images(&self) -> Result<Vec<ImageSummary>, BackendError> {
        let mut images = self.images.lock().await;
        *images = self.runtime.list_images().await?;
        Ok(images.clone())
    }

    pub async fn refresh_volumes(&self) -> Result<Vec<VolumeSummary>, BackendError> {
        let mut volumes = self.volumes.lock().await;
        *volumes = self.runtime.list_volumes().await?;
        Ok(volumes.clone())
    }

    pub async fn refresh_networks(&self) -> Result<Vec<NetworkSummary>, BackendError> {
        let mut networks = self.networks.lock().await;
        *networks = self.runtime.list_networks().await?;
        Ok(networks.clone())
    }

    pub async fn containers(&self) -> Vec<ContainerEntity> {
        self.containers.lock().await.containers.clone()
    }

    pub async fn pods(&self) -> Vec<PodSummary> {
        self.containers.lock().await.pods.clone()
    }

    pub async fn services(&self) -> Vec<String> {
        self.containers.lock().await.services.clone()
    }

    pub async fn hierarchy(&self) -> Hierarchy {
        self.containers.lock().await.hierarchy.clone()
    }

    /// Recorded samples for a container, oldest first.
    pub fn stats(&self, id: &ContainerId) -> Vec<StatsRecord> {
        self.monitor
            .history(id)
            .map(|history| history.records())
            .unwrap_or_default()
    }

    pub fn latest_stats(&self, id: &ContainerId) -> Option<StatsRecord> {
        self.monitor.history(id).and_then(|history| history.latest())
    }

    pub fn is_monitoring(&self, id: &ContainerId) -> bool {
        self.monitor.is_monitoring(id)
    }

    /// Recorded pod samples, oldest first.
    pub fn pod_stats(&self, id: &PodId) -> Vec<PodStatsRecord> {
        self.pod_monitor
            .history(id)
            .map(|history| history.records())
            .unwrap_or_default()
    }

    pub fn latest_pod_stats(&self, id: &PodId) -> Option<PodStatsRecord> {
        self.pod_monitor.history(id).and_then(|history| history.latest())
    }

    pub fn is_monitoring_pod(&self, id: &PodId) -> bool {
        self.pod_monitor.is_monitoring(id)
    }

    /// Stop every monitor, then release the backend with its tunnel or
    /// child process.
    pub async fn shutdown(&self) {
        self.monitor.shutdown();
        self.pod_monitor.shutdown();
        self.runtime.close().await;
        tracing::debug!("dashboard shut down");
    }
}
