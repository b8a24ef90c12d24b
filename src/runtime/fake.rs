// ABOUTME: In-memory runtime for orchestration tests.
// ABOUTME: Serves canned listings and scripted stats samples, and records what it was asked.

use crate::model::{
    ContainerDetails, ContainerSummary, Event, ImageDetails, ImageHistoryEntry, ImageSummary,
    LogLine, LogOptions, NetworkSummary, PodStatsEntry, PodSummary, PruneReport, RemoveOptions,
    StatsEntry, TopResponse, VolumeSummary,
};
use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{
    BackendStream, ContainerOps, EventOps, ImageOps, LogOps, NetworkOps, PodOps, RuntimeInfo,
    StatsMode, StatsOps, VolumeOps,
};
use crate::runtime::{BackendError, BackendMode};
use crate::types::{ContainerId, ImageId, NetworkId, PodId};
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const BACKEND: &str = "fake";

#[derive(Default)]
pub(crate) struct FakeRuntime {
    pub containers: Mutex<Vec<ContainerSummary>>,
    pub pods: Mutex<Vec<PodSummary>>,
    pub images: Mutex<Vec<ImageSummary>>,
    pub volumes: Mutex<Vec<VolumeSummary>>,
    pub networks: Mutex<Vec<NetworkSummary>>,
    /// Samples handed out per container ID, oldest first.
    pub samples: Mutex<HashMap<String, VecDeque<StatsEntry>>>,
    /// Samples handed out per pod ID, oldest first.
    pub pod_samples: Mutex<HashMap<String, VecDeque<PodStatsEntry>>>,
    /// Containers whose inspection fails.
    pub broken: Mutex<HashSet<String>>,
    /// Whether continuous stats are offered.
    pub continuous: bool,
    /// Keep continuous streams open after the samples run out.
    pub hold_open: bool,
    pub pods_unsupported: bool,
    pub stats_calls: AtomicUsize,
    pub pod_stats_calls: AtomicUsize,
    pub closed: AtomicBool,
}

impl FakeRuntime {
    pub fn with_containers(containers: Vec<ContainerSummary>) -> Self {
        Self {
            containers: Mutex::new(containers),
            ..Default::default()
        }
    }

    pub fn push_samples(&self, id: &str, samples: impl IntoIterator<Item = StatsEntry>) {
        self.samples
            .lock()
            .entry(id.to_string())
            .or_default()
            .extend(samples);
    }

    pub fn push_pod_samples(&self, id: &str, samples: impl IntoIterator<Item = PodStatsEntry>) {
        self.pod_samples
            .lock()
            .entry(id.to_string())
            .or_default()
            .extend(samples);
    }

    /// Continuous mode drains the queue, then ends or waits for
    /// cancellation. One-shot mode hands out one sample per call.
    fn serve<T: Send + 'static>(
        &self,
        queue: &mut VecDeque<T>,
        continuous_operation: &'static str,
        mode: StatsMode,
        cancel: CancellationToken,
    ) -> Result<BackendStream<T>, BackendError> {
        match mode {
            StatsMode::Continuous if !self.continuous => {
                Err(BackendError::not_supported(continuous_operation, BACKEND))
            }
            StatsMode::Continuous => {
                let items: Vec<Result<T, BackendError>> = queue.drain(..).map(Ok).collect();
                let head = futures::stream::iter(items);
                if self.hold_open {
                    let tail = futures::stream::once(async move { cancel.cancelled().await })
                        .filter_map(|()| async { None::<Result<T, BackendError>> });
                    Ok(Box::pin(head.chain(tail)))
                } else {
                    Ok(Box::pin(head))
                }
            }
            StatsMode::OneShot => {
                let item: Vec<Result<T, BackendError>> = queue.pop_front().map(Ok).into_iter().collect();
                Ok(Box::pin(futures::stream::iter(item)))
            }
        }
    }
}

fn not_found(id: &str) -> BackendError {
    BackendError::NotFound {
        kind: "container",
        id: id.to_string(),
    }
}

impl Sealed for FakeRuntime {}

#[async_trait]
impl ContainerOps for FakeRuntime {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, BackendError> {
        Ok(self.containers.lock().clone())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerDetails, BackendError> {
        if self.broken.lock().contains(id.as_str()) {
            return Err(BackendError::Runtime(format!("inspect {id} failed")));
        }
        let containers = self.containers.lock();
        let summary = containers
            .iter()
            .find(|c| &c.id == id)
            .ok_or_else(|| not_found(id.as_str()))?;
        let mut details = ContainerDetails::new(summary.id.clone());
        details.image = summary.image.clone();
        details.state.status = summary.state;
        details.state.running = summary.state.is_running();
        Ok(details)
    }

    async fn start_container(&self, _id: &ContainerId) -> Result<(), BackendError> {
        Ok(())
    }

    async fn stop_container(
        &self,
        _id: &ContainerId,
        _timeout: Option<Duration>,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    async fn pause_container(&self, _id: &ContainerId) -> Result<(), BackendError> {
        Ok(())
    }

    async fn unpause_container(&self, _id: &ContainerId) -> Result<(), BackendError> {
        Ok(())
    }

    async fn restart_container(
        &self,
        _id: &ContainerId,
        _timeout: Option<Duration>,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    async fn remove_container(
        &self,
        id: &ContainerId,
        _options: RemoveOptions,
    ) -> Result<(), BackendError> {
        self.containers.lock().retain(|c| &c.id != id);
        Ok(())
    }

    async fn top_container(&self, _id: &ContainerId) -> Result<TopResponse, BackendError> {
        Err(BackendError::not_supported("top_container", BACKEND))
    }

    async fn prune_containers(&self) -> Result<PruneReport, BackendError> {
        Ok(PruneReport::default())
    }
}

#[async_trait]
impl ImageOps for FakeRuntime {
    async fn list_images(&self) -> Result<Vec<ImageSummary>, BackendError> {
        Ok(self.images.lock().clone())
    }

    async fn inspect_image(&self, id: &ImageId) -> Result<ImageDetails, BackendError> {
        Ok(ImageDetails::new(id.clone()))
    }

    async fn image_history(&self, _id: &ImageId) -> Result<Vec<ImageHistoryEntry>, BackendError> {
        Ok(Vec::new())
    }

    async fn remove_image(&self, _id: &ImageId, _force: bool) -> Result<(), BackendError> {
        Ok(())
    }

    async fn prune_images(&self) -> Result<PruneReport, BackendError> {
        Ok(PruneReport::default())
    }
}

#[async_trait]
impl VolumeOps for FakeRuntime {
    async fn list_volumes(&self) -> Result<Vec<VolumeSummary>, BackendError> {
        Ok(self.volumes.lock().clone())
    }

    async fn create_volume(&self, name: &str) -> Result<VolumeSummary, BackendError> {
        let volume = VolumeSummary {
            name: name.to_string(),
            ..Default::default()
        };
        self.volumes.lock().push(volume.clone());
        Ok(volume)
    }

    async fn remove_volume(&self, name: &str, _force: bool) -> Result<(), BackendError> {
        self.volumes.lock().retain(|v| v.name != name);
        Ok(())
    }

    async fn prune_volumes(&self) -> Result<PruneReport, BackendError> {
        Ok(PruneReport::default())
    }
}

#[async_trait]
impl NetworkOps for FakeRuntime {
    async fn list_networks(&self) -> Result<Vec<NetworkSummary>, BackendError> {
        Ok(self.networks.lock().clone())
    }

    async fn remove_network(&self, _id: &NetworkId) -> Result<(), BackendError> {
        Ok(())
    }

    async fn prune_networks(&self) -> Result<PruneReport, BackendError> {
        Ok(PruneReport::default())
    }
}

#[async_trait]
impl PodOps for FakeRuntime {
    async fn list_pods(&self) -> Result<Vec<PodSummary>, BackendError> {
        if self.pods_unsupported {
            return Err(BackendError::not_supported("list_pods", BACKEND));
        }
        Ok(self.pods.lock().clone())
    }

    async fn pod_stats(
        &self,
        id: &PodId,
        mode: StatsMode,
        cancel: CancellationToken,
    ) -> Result<BackendStream<PodStatsEntry>, BackendError> {
        self.pod_stats_calls.fetch_add(1, Ordering::SeqCst);
        if self.pods_unsupported {
            return Err(BackendError::not_supported("pod_stats", BACKEND));
        }
        let mut samples = self.pod_samples.lock();
        let queue = samples.entry(id.as_str().to_string()).or_default();
        self.serve(queue, "continuous pod_stats", mode, cancel)
    }
}

#[async_trait]
impl StatsOps for FakeRuntime {
    async fn container_stats(
        &self,
        id: &ContainerId,
        mode: StatsMode,
        cancel: CancellationToken,
    ) -> Result<BackendStream<StatsEntry>, BackendError> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        let mut samples = self.samples.lock();
        let queue = samples.entry(id.as_str().to_string()).or_default();
        self.serve(queue, "continuous container_stats", mode, cancel)
    }
}

#[async_trait]
impl EventOps for FakeRuntime {
    async fn events(&self, _cancel: CancellationToken) -> Result<BackendStream<Event>, BackendError> {
        Ok(Box::pin(futures::stream::empty()))
    }
}

#[async_trait]
impl LogOps for FakeRuntime {
    async fn container_logs(
        &self,
        _id: &ContainerId,
        _options: &LogOptions,
        _cancel: CancellationToken,
    ) -> Result<BackendStream<LogLine>, BackendError> {
        Ok(Box::pin(futures::stream::empty()))
    }
}

#[async_trait]
impl RuntimeInfo for FakeRuntime {
    fn mode(&self) -> BackendMode {
        BackendMode::Socket
    }

    async fn ping(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
