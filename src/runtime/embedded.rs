// ABOUTME: Embedded backend: a private Podman API service owned by this process.
// ABOUTME: Starts the service on a temporary socket, serves through SocketRuntime, kills it on close.

use crate::exec::{CommandLine, ProcessGroup};
use crate::model::{
    ContainerDetails, ContainerSummary, Event, ImageDetails, ImageHistoryEntry, ImageSummary,
    LogLine, LogOptions, NetworkSummary, PodStatsEntry, PodSummary, PruneReport, RemoveOptions,
    StatsEntry, TopResponse, VolumeSummary,
};
use crate::runtime::cli::Feature;
use crate::runtime::http::Endpoint;
use crate::runtime::libpod::SocketRuntime;
use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{
    BackendStream, ContainerOps, EventOps, ImageOps, LogOps, NetworkOps, PodOps, RuntimeInfo,
    StatsMode, StatsOps, VolumeOps,
};
use crate::runtime::{BackendError, BackendMode};
use crate::types::{ContainerId, ImageId, NetworkId, PodId};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Interval between dial attempts while the service starts.
const DIAL_INTERVAL: Duration = Duration::from_millis(250);

/// Podman API service running as a child of this process.
#[derive(Debug)]
pub struct EmbeddedRuntime {
    socket: SocketRuntime,
    service: ProcessGroup,
    _dir: TempDir,
}

impl EmbeddedRuntime {
    /// Start `podman system service` on a private socket and wait up to
    /// `wait` for it to answer. Linux only.
    pub async fn start(podman_binary: &str, wait: Duration) -> Result<Self, BackendError> {
        if !cfg!(target_os = "linux") {
            return Err(BackendError::not_supported("embedded engine", "embedded"));
        }

        let dir = tempfile::Builder::new()
            .prefix("berth-podman-")
            .tempdir()
            .map_err(|e| BackendError::Runtime(format!("failed to create socket directory: {e}")))?;
        let path = dir.path().join("podman.sock");
        let command = CommandLine::new(podman_binary).args([
            "system".to_string(),
            "service".to_string(),
            "--time=0".to_string(),
            format!("unix://{}", path.display()),
        ]);
        let service = ProcessGroup::spawn(&command).map_err(|e| BackendError::Connection {
            endpoint: command.to_string(),
            reason: e.to_string(),
        })?;

        let socket = SocketRuntime::new(Endpoint::Unix(path));
        wait_until_ready(&socket, &service, wait).await?;

        tracing::info!(endpoint = %socket.endpoint(), "embedded podman service ready");
        Ok(Self {
            socket,
            service,
            _dir: dir,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.socket.endpoint()
    }
}

async fn wait_until_ready(
    socket: &SocketRuntime,
    service: &ProcessGroup,
    wait: Duration,
) -> Result<(), BackendError> {
    let deadline = Instant::now() + wait;
    loop {
        let err = match socket.ping().await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        if !service.is_running() {
            return Err(BackendError::Connection {
                endpoint: socket.endpoint().to_string(),
                reason: "podman service exited during startup".to_string(),
            });
        }
        if Instant::now() >= deadline {
            service.kill();
            return Err(BackendError::Connection {
                endpoint: socket.endpoint().to_string(),
                reason: format!("service did not answer within {wait:?}: {err}"),
            });
        }
        tokio::time::sleep(DIAL_INTERVAL).await;
    }
}

impl Sealed for EmbeddedRuntime {}

#[async_trait]
impl ContainerOps for EmbeddedRuntime {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, BackendError> {
        self.socket.list_containers().await
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerDetails, BackendError> {
        self.socket.inspect_container(id).await
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), BackendError> {
        self.socket.start_container(id).await
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Option<Duration>,
    ) -> Result<(), BackendError> {
        self.socket.stop_container(id, timeout).await
    }

    async fn pause_container(&self, id: &ContainerId) -> Result<(), BackendError> {
        self.socket.pause_container(id).await
    }

    async fn unpause_container(&self, id: &ContainerId) -> Result<(), BackendError> {
        self.socket.unpause_container(id).await
    }

    async fn restart_container(
        &self,
        id: &ContainerId,
        timeout: Option<Duration>,
    ) -> Result<(), BackendError> {
        self.socket.restart_container(id, timeout).await
    }

    async fn remove_container(
        &self,
        id: &ContainerId,
        options: RemoveOptions,
    ) -> Result<(), BackendError> {
        self.socket.remove_container(id, options).await
    }

    async fn top_container(&self, id: &ContainerId) -> Result<TopResponse, BackendError> {
        self.socket.top_container(id).await
    }

    async fn prune_containers(&self) -> Result<PruneReport, BackendError> {
        self.socket.prune_containers().await
    }
}

#[async_trait]
impl ImageOps for EmbeddedRuntime {
    async fn list_images(&self) -> Result<Vec<ImageSummary>, BackendError> {
        self.socket.list_images().await
    }

    async fn inspect_image(&self, id: &ImageId) -> Result<ImageDetails, BackendError> {
        self.socket.inspect_image(id).await
    }

    async fn image_history(&self, id: &ImageId) -> Result<Vec<ImageHistoryEntry>, BackendError> {
        self.socket.image_history(id).await
    }

    async fn remove_image(&self, id: &ImageId, force: bool) -> Result<(), BackendError> {
        self.socket.remove_image(id, force).await
    }

    async fn prune_images(&self) -> Result<PruneReport, BackendError> {
        self.socket.prune_images().await
    }
}

#[async_trait]
impl VolumeOps for EmbeddedRuntime {
    async fn list_volumes(&self) -> Result<Vec<VolumeSummary>, BackendError> {
        self.socket.list_volumes().await
    }

    async fn create_volume(&self, name: &str) -> Result<VolumeSummary, BackendError> {
        self.socket.create_volume(name).await
    }

    async fn remove_volume(&self, name: &str, force: bool) -> Result<(), BackendError> {
        self.socket.remove_volume(name, force).await
    }

    async fn prune_volumes(&self) -> Result<PruneReport, BackendError> {
        self.socket.prune_volumes().await
    }
}

#[async_trait]
impl NetworkOps for EmbeddedRuntime {
    async fn list_networks(&self) -> Result<Vec<NetworkSummary>, BackendError> {
        self.socket.list_networks().await
    }

    async fn remove_network(&self, id: &NetworkId) -> Result<(), BackendError> {
        self.socket.remove_network(id).await
    }

    async fn prune_networks(&self) -> Result<PruneReport, BackendError> {
        self.socket.prune_networks().await
    }
}

#[async_trait]
impl PodOps for EmbeddedRuntime {
    async fn list_pods(&self) -> Result<Vec<PodSummary>, BackendError> {
        self.socket.list_pods().await
    }

    async fn pod_stats(
        &self,
        id: &PodId,
        mode: StatsMode,
        cancel: CancellationToken,
    ) -> Result<BackendStream<PodStatsEntry>, BackendError> {
        self.socket.pod_stats(id, mode, cancel).await
    }
}

#[async_trait]
impl StatsOps for EmbeddedRuntime {
    async fn container_stats(
        &self,
        id: &ContainerId,
        mode: StatsMode,
        cancel: CancellationToken,
    ) -> Result<BackendStream<StatsEntry>, BackendError> {
        self.socket.container_stats(id, mode, cancel).await
    }
}

#[async_trait]
impl EventOps for EmbeddedRuntime {
    async fn events(&self, cancel: CancellationToken) -> Result<BackendStream<Event>, BackendError> {
        self.socket.events(cancel).await
    }
}

#[async_trait]
impl LogOps for EmbeddedRuntime {
    async fn container_logs(
        &self,
        id: &ContainerId,
        options: &LogOptions,
        cancel: CancellationToken,
    ) -> Result<BackendStream<LogLine>, BackendError> {
        self.socket.container_logs(id, options, cancel).await
    }
}

#[async_trait]
impl RuntimeInfo for EmbeddedRuntime {
    fn mode(&self) -> BackendMode {
        BackendMode::Embedded
    }

    fn supports(&self, feature: Feature) -> bool {
        self.socket.supports(feature)
    }

    async fn ping(&self) -> Result<(), BackendError> {
        self.socket.ping().await
    }

    async fn close(&self) {
        self.service.kill();
        tracing::debug!(endpoint = %self.socket.endpoint(), "embedded podman service stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn missing_podman_binary_fails_to_start() {
        let err = EmbeddedRuntime::start("berth-no-such-podman", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_connection());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn service_that_never_listens_times_out() {
        // `true` exits without ever listening.
        let err = EmbeddedRuntime::start("true", Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(err.is_connection());
    }
}
