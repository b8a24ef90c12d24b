// ABOUTME: Legacy backend on the Docker-compatible API via bollard.
// ABOUTME: Serves Docker engines and Podman's compat socket; pods are not available here.

use crate::model::{
    ContainerConfigDetails, ContainerDetails, ContainerState, ContainerStateDetails,
    ContainerSummary, CpuStats, EndpointInfo, Event, EventActor, HealthStatus, ImageDetails,
    ImageHistoryEntry, ImageSummary, LogLine, LogOptions, LogStream, MemoryStats, Mount,
    NetworkIo, NetworkSettings, NetworkSummary, PodStatsEntry, PodSummary, PortMapping,
    PruneReport, RemoveOptions, StatsEntry, TopResponse, VolumeSummary,
};
use crate::runtime::http::Endpoint;
use crate::runtime::json::parse_port_key;
use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{
    BackendStream, ContainerOps, EventOps, ImageOps, LogOps, NetworkOps, PodOps, RuntimeInfo,
    StatsMode, StatsOps, VolumeOps,
};
use crate::runtime::{BackendError, BackendMode, ErrorCode, error::must_stop_message};
use crate::types::{ContainerId, ImageId, NetworkId, PodId};
use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{ContainerStatsResponse, ImageInspect, VolumeCreateRequest};
use bollard::query_parameters::{
    EventsOptions, InspectContainerOptions, ListContainersOptions, ListImagesOptions,
    ListNetworksOptions, ListVolumesOptions, LogsOptions, PruneContainersOptions,
    PruneImagesOptions, PruneNetworksOptions, PruneVolumesOptions, RemoveContainerOptions,
    RemoveImageOptions, RemoveVolumeOptions, RestartContainerOptions, StartContainerOptions,
    StatsOptions, StopContainerOptions, TopOptions,
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const BACKEND: &str = "legacy";

/// Seconds bollard waits on any single request.

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_bollard_error(e: bollard::errors::Error, endpoint: &str) -> BackendError {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => BackendError::Runtime(format!("{message} (HTTP {status_code})")),
        bollard::errors::Error::JsonDataError { .. }
        | bollard::errors::Error::JsonSerdeError { .. } => {
            BackendError::parse("engine response", e)
        }
        other => BackendError::Connection {
            endpoint: endpoint.to_string(),
            reason: other.to_string(),
        },
    }
}

fn map_not_found_error(
    e: bollard::errors::Error,
    endpoint: &str,
    kind: &'static str,
    id: &str,
) -> BackendError {
    match &e {
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 404 =>
        {
            BackendError::NotFound {
                kind,
                id: id.to_string(),
            }
        }
        _ => map_bollard_error(e, endpoint),
    }
}

fn map_state_change_error(e: bollard::errors::Error, endpoint: &str, id: &str) -> BackendError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 304 => BackendError::coded(ErrorCode::AlreadyInState, message.clone()),
        _ => map_not_found_error(e, endpoint, "container", id),
    }
}

fn map_container_remove_error(e: bollard::errors::Error, endpoint: &str, id: &str) -> BackendError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 || must_stop_message(message) => {
            BackendError::coded(ErrorCode::MustStopContainer, message.clone())
        }
        _ => map_not_found_error(e, endpoint, "container", id),
    }
}

fn map_top_error(e: bollard::errors::Error, endpoint: &str, id: &str) -> BackendError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 || message.to_ascii_lowercase().contains("is not running") => {
            BackendError::coded(ErrorCode::ContainerNotRunning, message.clone())
        }
        _ => map_not_found_error(e, endpoint, "container", id),
    }
}

fn timeout_secs(timeout: Option<Duration>) -> Option<i32> {
    timeout.map(|t| i32::try_from(t.as_secs()).unwrap_or(i32::MAX))
}

fn unix_time(secs: i64) -> Option<DateTime<Utc>> {
    (secs > 0).then(|| DateTime::from_timestamp(secs, 0)).flatten()
}

// =============================================================================
// Model Conversions
// =============================================================================

fn convert_summary(c: bollard::models::ContainerSummary) -> Option<ContainerSummary> {
    let id = c.id.filter(|id| !id.is_empty())?;
    let ports = c
        .ports
        .unwrap_or_default()
        .into_iter()
        .map(|p| PortMapping {
            ip: p.ip.filter(|ip| !ip.is_empty()),
            private_port: p.private_port,
            public_port: p.public_port,
            protocol: p
                .typ
                .map(|t| t.to_string().to_lowercase())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "tcp".to_string()),
        })
        .collect();

    Some(ContainerSummary {
        names: c.names.unwrap_or_default(),
        image: c.image.unwrap_or_default(),
        image_id: c.image_id.filter(|i| !i.is_empty()).map(ImageId::new),
        command: c.command.unwrap_or_default(),
        created: c.created.and_then(unix_time),
        state: c
            .state
            .map(|s| ContainerState::parse(&format!("{:?}", s).to_lowercase()))
            .unwrap_or(ContainerState::Unknown),
        status: c.status.unwrap_or_default(),
        ports,
        labels: c.labels.unwrap_or_default(),
        size_rw: c.size_rw,
        size_root_fs: c.size_root_fs,
        ..ContainerSummary::new(ContainerId::new(id))
    })
}

fn convert_details(id: &ContainerId, d: bollard::models::ContainerInspectResponse) -> ContainerDetails {
    let state = d.state.unwrap_or_default();
    let health = state.health.unwrap_or_default();
    let config = d.config.unwrap_or_default();
    let network = d.network_settings.unwrap_or_default();

    let mut ports = Vec::new();
    for (key, bindings) in network.ports.unwrap_or_default() {
        let Some((private_port, protocol)) = parse_port_key(&key) else {
            continue;
        };
        let bindings = bindings.unwrap_or_default();
        if bindings.is_empty() {
            ports.push(PortMapping {
                ip: None,
                private_port,
                public_port: None,
                protocol: protocol.clone(),
            });
        }
        for binding in bindings {
            ports.push(PortMapping {
                ip: binding.host_ip.filter(|ip| !ip.is_empty()),
                private_port,
                public_port: binding.host_port.and_then(|p| p.parse().ok()),
                protocol: protocol.clone(),
            });
        }
    }
    ports.sort_by_key(|p| (p.private_port, p.public_port));

    let networks = network
        .networks
        .unwrap_or_default()
        .into_iter()
        .map(|(name, ep)| {
            (
                name,
                EndpointInfo {
                    network_id: ep.network_id.unwrap_or_default(),
                    ip_address: ep.ip_address.unwrap_or_default(),
                    gateway: ep.gateway.unwrap_or_default(),
                    mac_address: ep.mac_address.unwrap_or_default(),
                    aliases: ep.aliases.unwrap_or_default(),
                },
            )
        })
        .collect();

    ContainerDetails {
        name: d
            .name
            .unwrap_or_default()
            .trim_start_matches('/')
            .to_string(),
        created: d.created.map(|dt| dt.to_string()).unwrap_or_default(),
        image: config.image.clone().or(d.image).unwrap_or_default(),
        restart_count: d.restart_count.unwrap_or(0),
        state: ContainerStateDetails {
            status: state
                .status
                .map(|s| ContainerState::parse(&format!("{:?}", s).to_lowercase()))
                .unwrap_or(ContainerState::Unknown),
            running: state.running.unwrap_or(false),
            paused: state.paused.unwrap_or(false),
            restarting: state.restarting.unwrap_or(false),
            oom_killed: state.oom_killed.unwrap_or(false),
            dead: state.dead.unwrap_or(false),
            pid: state.pid.unwrap_or(0),
            exit_code: state.exit_code.unwrap_or(0),
            error: state.error.unwrap_or_default(),
            started_at: state.started_at.map(|t| t.to_string()),
            finished_at: state.finished_at.map(|t| t.to_string()),
            health: health
                .status
                .map(|s| HealthStatus::parse(&format!("{:?}", s).to_lowercase()))
                .unwrap_or(HealthStatus::None),
            failing_streak: health.failing_streak.unwrap_or(0),
        },
        config: ContainerConfigDetails {
            hostname: config.hostname.unwrap_or_default(),
            user: config.user.unwrap_or_default(),
            env: config.env.unwrap_or_default(),
            cmd: config.cmd.unwrap_or_default(),
            entrypoint: config.entrypoint.unwrap_or_default(),
            image: config.image.unwrap_or_default(),
            working_dir: config.working_dir.unwrap_or_default(),
            labels: config.labels.unwrap_or_default(),
            tty: config.tty.unwrap_or(false),
        },
        network_settings: NetworkSettings { networks, ports },
        mounts: d
            .mounts
            .unwrap_or_default()
            .into_iter()
            .map(|m| Mount {
                kind: m
                    .typ
                    .map(|t| format!("{:?}", t).to_lowercase())
                    .unwrap_or_default(),
                name: m.name.filter(|n| !n.is_empty()),
                source: m.source.unwrap_or_default(),
                destination: m.destination.unwrap_or_default(),
                driver: m.driver.filter(|d| !d.is_empty()),
                mode: m.mode.unwrap_or_default(),
                read_write: m.rw.unwrap_or(false),
            })
            .collect(),
        ..ContainerDetails::new(id.clone())
    }
}

fn convert_stats(s: ContainerStatsResponse) -> StatsEntry {
    fn cpu(stats: &bollard::models::ContainerCpuStats) -> CpuStats {
        CpuStats {
            total_usage: stats
                .cpu_usage
                .as_ref()
                .and_then(|u| u.total_usage)
                .unwrap_or(0),
            system_usage: stats.system_cpu_usage.unwrap_or(0),
            online_cpus: stats.online_cpus.map(|n| n as u32).unwrap_or(0),
        }
    }

    let memory = s
        .memory_stats
        .as_ref()
        .map(|m| MemoryStats {
            usage: m.usage.unwrap_or(0),
            limit: m.limit.unwrap_or(0),
            cache: m
                .stats
                .as_ref()
                .and_then(|st| st.get("cache").or_else(|| st.get("inactive_file")))
                .copied()
                .unwrap_or(0),
        })
        .unwrap_or_default();

    let mut block_read = 0u64;
    let mut block_write = 0u64;
    if let Some(entries) = s
        .blkio_stats
        .as_ref()
        .and_then(|b| b.io_service_bytes_recursive.as_ref())
    {
        for entry in entries {
            let value = entry.value.unwrap_or(0);
            match entry.op.as_deref().map(str::to_ascii_lowercase).as_deref() {
                Some("read") => block_read += value,
                Some("write") => block_write += value,
                _ => {}
            }
        }
    }

    let networks: HashMap<String, NetworkIo> = s
        .networks
        .unwrap_or_default()
        .into_iter()
        .map(|(iface, net)| {
            (
                iface,
                NetworkIo {
                    rx_bytes: net.rx_bytes.unwrap_or(0),
                    tx_bytes: net.tx_bytes.unwrap_or(0),
                },
            )
        })
        .collect();

    StatsEntry {
        cpu: s.cpu_stats.as_ref().map(cpu).unwrap_or_default(),
        precpu: s.precpu_stats.as_ref().map(cpu),
        memory,
        pids: s.pids_stats.and_then(|p| p.current).unwrap_or(0),
        networks,
        block_read,
        block_write,
        ..StatsEntry::new(Utc::now())
    }
}

// =============================================================================
// BollardRuntime
// =============================================================================

/// Runtime speaking the Docker-compatible API.
#[derive(Debug)]
pub struct BollardRuntime {
    client: Docker,
    endpoint: String,
}

impl BollardRuntime {
    /// Connect to the given engine endpoint. No request is issued yet.
    pub fn connect(endpoint: &Endpoint, timeout: Duration) -> Result<Self, BackendError> {
        let secs = timeout.as_secs().max(1);
        let client = match endpoint {
            Endpoint::Unix(path) => Docker::connect_with_unix(
                &path.to_string_lossy(),
                secs,
                bollard::API_DEFAULT_VERSION,
            ),
            Endpoint::Tcp(addr) => Docker::connect_with_http(
                &format!("http://{addr}"),
                secs,
                bollard::API_DEFAULT_VERSION,
            ),
        }
        .map_err(|e| BackendError::Connection {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

impl Sealed for BollardRuntime {}

#[async_trait]
impl RuntimeInfo for BollardRuntime {
    fn mode(&self) -> BackendMode {
        BackendMode::Legacy
    }

    async fn ping(&self) -> Result<(), BackendError> {
        self.client
            .ping()
            .await
            .map_err(|e| map_bollard_error(e, &self.endpoint))?;
        Ok(())
    }

    async fn close(&self) {}
}

#[async_trait]
impl ContainerOps for BollardRuntime {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, BackendError> {
        let opts = ListContainersOptions {
            all: true,
            ..Default::default()
        };

        // Podman's compat socket may report "stopping", which bollard fails to
        // deserialize. The state is transient, so retry briefly.
        let mut last_error = None;
        for attempt in 0..3 {
            match self.client.list_containers(Some(opts.clone())).await {
                Ok(containers) => {
                    return Ok(containers.into_iter().filter_map(convert_summary).collect());
                }
                Err(e) => {
                    let err_str = e.to_string();
                    if (err_str.contains("unknown variant `stopping`")
                        || err_str.contains("unknown variant `stopped`"))
                        && attempt < 2
                    {
                        tracing::debug!(attempt, "retrying container list after transient state");
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        last_error = Some(e);
                        continue;
                    }
                    return Err(map_bollard_error(e, &self.endpoint));
                }
            }
        }

        Err(match last_error {
            Some(e) => map_bollard_error(e, &self.endpoint),
            None => BackendError::Runtime("list_containers failed".to_string()),
        })
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerDetails, BackendError> {
        let details = self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(|e| map_not_found_error(e, &self.endpoint, "container", id.as_str()))?;
        Ok(convert_details(id, details))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), BackendError> {
        self.client
            .start_container(id.as_str(), None::<StartContainerOptions>)
            .await
            .map_err(|e| map_state_change_error(e, &self.endpoint, id.as_str()))
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Option<Duration>,
    ) -> Result<(), BackendError> {
        let opts = StopContainerOptions {
            t: timeout_secs(timeout),
            signal: None,
        };
        self.client
            .stop_container(id.as_str(), Some(opts))
            .await
            .map_err(|e| map_state_change_error(e, &self.endpoint, id.as_str()))
    }

    async fn pause_container(&self, id: &ContainerId) -> Result<(), BackendError> {
        self.client
            .pause_container(id.as_str())
            .await
            .map_err(|e| map_state_change_error(e, &self.endpoint, id.as_str()))
    }

    async fn unpause_container(&self, id: &ContainerId) -> Result<(), BackendError> {
        self.client
            .unpause_container(id.as_str())
            .await
            .map_err(|e| map_state_change_error(e, &self.endpoint, id.as_str()))
    }

    async fn restart_container(
        &self,
        id: &ContainerId,
        timeout: Option<Duration>,
    ) -> Result<(), BackendError> {
        let opts = RestartContainerOptions {
            t: timeout_secs(timeout),
            signal: None,
        };
        self.client
            .restart_container(id.as_str(), Some(opts))
            .await
            .map_err(|e| map_not_found_error(e, &self.endpoint, "container", id.as_str()))
    }

    async fn remove_container(
        &self,
        id: &ContainerId,
        options: RemoveOptions,
    ) -> Result<(), BackendError> {
        let opts = RemoveContainerOptions {
            force: options.force,
            v: options.volumes,
            ..Default::default()
        };
        self.client
            .remove_container(id.as_str(), Some(opts))
            .await
            .map_err(|e| map_container_remove_error(e, &self.endpoint, id.as_str()))
    }

    async fn top_container(&self, id: &ContainerId) -> Result<TopResponse, BackendError> {
        let top = self
            .client
            .top_processes(id.as_str(), None::<TopOptions>)
            .await
            .map_err(|e| map_top_error(e, &self.endpoint, id.as_str()))?;
        Ok(TopResponse {
            titles: top.titles.unwrap_or_default(),
            processes: top.processes.unwrap_or_default(),
        })
    }

    async fn prune_containers(&self) -> Result<PruneReport, BackendError> {
        let resp = self
            .client
            .prune_containers(None::<PruneContainersOptions>)
            .await
            .map_err(|e| map_bollard_error(e, &self.endpoint))?;
        Ok(PruneReport {
            deleted: resp.containers_deleted.unwrap_or_default(),
            space_reclaimed: resp.space_reclaimed.unwrap_or(0).max(0) as u64,
        })
    }
}

#[async_trait]
impl ImageOps for BollardRuntime {
    async fn list_images(&self) -> Result<Vec<ImageSummary>, BackendError> {
        let opts = ListImagesOptions {
            all: false,
            ..Default::default()
        };
        let images = self
            .client
            .list_images(Some(opts))
            .await
            .map_err(|e| map_bollard_error(e, &self.endpoint))?;

        Ok(images
            .into_iter()
            .filter(|i| !i.id.is_empty())
            .map(|i| ImageSummary {
                repo_tags: i.repo_tags,
                repo_digests: i.repo_digests,
                parent_id: Some(i.parent_id)
                    .filter(|p| !p.is_empty())
                    .map(ImageId::new),
                created: unix_time(i.created),
                size: i.size,
                labels: i.labels,
                containers: Some(i.containers).filter(|c| *c >= 0),
                ..ImageSummary::new(ImageId::new(i.id))
            })
            .collect())
    }

    async fn inspect_image(&self, id: &ImageId) -> Result<ImageDetails, BackendError> {
        let image = self
            .client
            .inspect_image(id.as_str())
            .await
            .map_err(|e| map_not_found_error(e, &self.endpoint, "image", id.as_str()))?;
        Ok(image_details(id, image))
    }

    async fn image_history(&self, id: &ImageId) -> Result<Vec<ImageHistoryEntry>, BackendError> {
        let history = self
            .client
            .image_history(id.as_str())
            .await
            .map_err(|e| map_not_found_error(e, &self.endpoint, "image", id.as_str()))?;

        Ok(history
            .into_iter()
            .map(|h| ImageHistoryEntry {
                id: h.id,
                created: unix_time(h.created),
                created_by: h.created_by,
                tags: h.tags,
                size: h.size,
                comment: h.comment,
            })
            .collect())
    }

    async fn remove_image(&self, id: &ImageId, force: bool) -> Result<(), BackendError> {
        let opts = RemoveImageOptions {
            force,
            ..Default::default()
        };
        self.client
            .remove_image(id.as_str(), Some(opts), None)
            .await
            .map_err(|e| map_not_found_error(e, &self.endpoint, "image", id.as_str()))?;
        Ok(())
    }

    async fn prune_images(&self) -> Result<PruneReport, BackendError> {
        let resp = self
            .client
            .prune_images(None::<PruneImagesOptions>)
            .await
            .map_err(|e| map_bollard_error(e, &self.endpoint))?;
        Ok(PruneReport {
            deleted: resp
                .images_deleted
                .unwrap_or_default()
                .into_iter()
                .filter_map(|item| item.deleted.or(item.untagged))
                .collect(),
            space_reclaimed: resp.space_reclaimed.unwrap_or(0).max(0) as u64,
        })
    }
}

#[async_trait]
impl VolumeOps for BollardRuntime {
    async fn list_volumes(&self) -> Result<Vec<VolumeSummary>, BackendError> {
        let resp = self
            .client
            .list_volumes(None::<ListVolumesOptions>)
            .await
            .map_err(|e| map_bollard_error(e, &self.endpoint))?;

        Ok(resp
            .volumes
            .unwrap_or_default()
            .into_iter()
            .map(convert_volume)
            .collect())
    }

    async fn create_volume(&self, name: &str) -> Result<VolumeSummary, BackendError> {
        let request = VolumeCreateRequest {
            name: Some(name.to_string()),
            ..Default::default()
        };
        let volume = self
            .client
            .create_volume(request)
            .await
            .map_err(|e| map_bollard_error(e, &self.endpoint))?;
        Ok(convert_volume(volume))
    }

    async fn remove_volume(&self, name: &str, force: bool) -> Result<(), BackendError> {
        self.client
            .remove_volume(name, Some(RemoveVolumeOptions { force }))
            .await
            .map_err(|e| map_not_found_error(e, &self.endpoint, "volume", name))
    }

    async fn prune_volumes(&self) -> Result<PruneReport, BackendError> {
        let resp = self
            .client
            .prune_volumes(None::<PruneVolumesOptions>)
            .await
            .map_err(|e| map_bollard_error(e, &self.endpoint))?;
        Ok(PruneReport {
            deleted: resp.volumes_deleted.unwrap_or_default(),
            space_reclaimed: resp.space_reclaimed.unwrap_or(0).max(0) as u64,
        })
    }
}

fn convert_volume(v: bollard::models::Volume) -> VolumeSummary {
    VolumeSummary {
        name: v.name,
        driver: v.driver,
        mountpoint: v.mountpoint,
        scope: v.scope.map(|s| s.to_string()),
        created_at: v.created_at.map(|dt| dt.to_string()),
        labels: v.labels,
        options: v.options,
    }
}

#[async_trait]
impl NetworkOps for BollardRuntime {
    async fn list_networks(&self) -> Result<Vec<NetworkSummary>, BackendError> {
        let networks = self
            .client
            .list_networks(None::<ListNetworksOptions>)
            .await
            .map_err(|e| map_bollard_error(e, &self.endpoint))?;

        Ok(networks
            .into_iter()
            .filter_map(|n| {
                let id = n.id.filter(|id| !id.is_empty())?;
                Some(NetworkSummary {
                    name: n.name.unwrap_or_else(|| id.clone()),
                    driver: n.driver.unwrap_or_default(),
                    scope: n.scope,
                    internal: n.internal.unwrap_or(false),
                    labels: n.labels.unwrap_or_default(),
                    options: n.options.unwrap_or_default(),
                    ..NetworkSummary::new(NetworkId::new(id))
                })
            })
            .collect())
    }

    async fn remove_network(&self, id: &NetworkId) -> Result<(), BackendError> {
        self.client
            .remove_network(id.as_str())
            .await
            .map_err(|e| map_not_found_error(e, &self.endpoint, "network", id.as_str()))
    }

    async fn prune_networks(&self) -> Result<PruneReport, BackendError> {
        let resp = self
            .client
            .prune_networks(None::<PruneNetworksOptions>)
            .await
            .map_err(|e| map_bollard_error(e, &self.endpoint))?;
        Ok(PruneReport {
            deleted: resp.networks_deleted.unwrap_or_default(),
            space_reclaimed: 0,
        })
    }
}

#[async_trait]
impl PodOps for BollardRuntime {
    async fn list_pods(&self) -> Result<Vec<PodSummary>, BackendError> {
        Err(BackendError::not_supported("list_pods", BACKEND))
    }

    async fn pod_stats(
        &self,
        _id: &PodId,
        _mode: StatsMode,
        _cancel: CancellationToken,
    ) -> Result<BackendStream<PodStatsEntry>, BackendError> {
        Err(BackendError::not_supported("pod_stats", BACKEND))
    }
}

#[async_trait]
impl StatsOps for BollardRuntime {
    async fn container_stats(
        &self,
        id: &ContainerId,
        mode: StatsMode,
        cancel: CancellationToken,
    ) -> Result<BackendStream<StatsEntry>, BackendError> {
        let streaming = mode == StatsMode::Continuous;
        let opts = StatsOptions {
            stream: streaming,
            one_shot: false,
        };
        let endpoint = self.endpoint.clone();
        let container = id.as_str().to_string();
        let stream = self
            .client
            .stats(id.as_str(), Some(opts))
            .take_until(cancel.cancelled_owned())
            .map(move |result| {
                result
                    .map(convert_stats)
                    .map_err(|e| map_not_found_error(e, &endpoint, "container", &container))
            });

        if streaming {
            Ok(Box::pin(stream))
        } else {
            Ok(Box::pin(stream.take(1)))
        }
    }
}

#[async_trait]
impl EventOps for BollardRuntime {
    async fn events(&self, cancel: CancellationToken) -> Result<BackendStream<Event>, BackendError> {
        let endpoint = self.endpoint.clone();
        let stream = self
            .client
            .events(None::<EventsOptions>)
            .take_until(cancel.cancelled_owned())
            .map(move |result| {
                let msg = result.map_err(|e| map_bollard_error(e, &endpoint))?;
                let actor = msg.actor.unwrap_or_default();
                Ok(Event {
                    kind: msg
                        .typ
                        .map(|t| t.to_string().to_lowercase())
                        .unwrap_or_default(),
                    action: msg.action.unwrap_or_default(),
                    actor: EventActor {
                        id: actor.id.unwrap_or_default(),
                        attributes: actor.attributes.unwrap_or_default(),
                    },
                    time: msg.time.and_then(unix_time),
                })
            });
        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl LogOps for BollardRuntime {
    async fn container_logs(
        &self,
        id: &ContainerId,
        options: &LogOptions,
        cancel: CancellationToken,
    ) -> Result<BackendStream<LogLine>, BackendError> {
        let opts = LogsOptions {
            stdout: true,
            stderr: true,
            follow: options.follow,
            timestamps: options.timestamps,
            tail: options
                .tail
                .map(|n| n.to_string())
                .unwrap_or_else(|| "all".to_string()),
            ..Default::default()
        };

        let endpoint = self.endpoint.clone();
        let container = id.as_str().to_string();
        let stream = self
            .client
            .logs(id.as_str(), Some(opts))
            .take_until(cancel.cancelled_owned())
            .map(move |result| {
                let output = result
                    .map_err(|e| map_not_found_error(e, &endpoint, "container", &container))?;
                let (stream, data) = match output {
                    bollard::container::LogOutput::StdErr { message } => {
                        (LogStream::Stderr, message)
                    }
                    bollard::container::LogOutput::StdOut { message }
                    | bollard::container::LogOutput::StdIn { message }
                    | bollard::container::LogOutput::Console { message } => {
                        (LogStream::Stdout, message)
                    }
                };
                Ok(LogLine {
                    stream,
                    content: String::from_utf8_lossy(&data)
                        .trim_end_matches(['\n', '\r'])
                        .to_string(),
                })
            });
        Ok(Box::pin(stream))
    }
}

/// The Engine API no longer reports a parent image; only libpod fills it.
fn image_details(id: &ImageId, image: ImageInspect) -> ImageDetails {
    let config = image.config.unwrap_or_default();
    ImageDetails {
        repo_tags: image.repo_tags.unwrap_or_default(),
        repo_digests: image.repo_digests.unwrap_or_default(),
        parent: None,
        comment: image.comment.unwrap_or_default(),
        created: image.created.map(|dt| dt.to_string()),
        author: image.author.unwrap_or_default(),
        architecture: image.architecture.unwrap_or_default(),
        os: image.os.unwrap_or_default(),
        size: image.size.unwrap_or(0),
        layers: image
            .root_fs
            .and_then(|r| r.layers)
            .unwrap_or_default(),
        env: config.env.unwrap_or_default(),
        cmd: config.cmd.unwrap_or_default(),
        labels: config.labels.unwrap_or_default(),
        ..ImageDetails::new(id.clone())
    }
}
