// ABOUTME: Podman REST response shapes and their translation into the unified model.
// ABOUTME: Unknown fields are ignored; nulls and missing optionals fall back to defaults.

use crate::model::{
    ContainerConfigDetails, ContainerDetails, ContainerState, ContainerStateDetails,
    ContainerSummary, CpuStats, EndpointInfo, Event, EventActor, HealthStatus, ImageDetails,
    ImageHistoryEntry, ImageSummary, MemoryStats, Mount, NetworkIo, NetworkSettings,
    NetworkSummary, PodSummary, PortMapping, PruneReport, StatsEntry, VolumeSummary,
};
use crate::runtime::json::{nullable, parse_port_key, string_or_seq, timestamp};
use crate::types::{ContainerId, ImageId, NetworkId, PodId};
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct ListContainer {
    #[serde(default)]
    id: String,
    #[serde(default, deserialize_with = "nullable")]
    names: Vec<String>,
    #[serde(default)]
    image: String,
    #[serde(rename = "ImageID", default)]
    image_id: String,
    #[serde(default, deserialize_with = "string_or_seq")]
    command: Vec<String>,
    #[serde(default)]
    created: serde_json::Value,
    #[serde(default)]
    state: String,
    #[serde(default)]
    status: String,
    #[serde(default, deserialize_with = "nullable")]
    ports: Vec<ListPort>,
    #[serde(default, deserialize_with = "nullable")]
    labels: HashMap<String, String>,
    #[serde(default)]
    size: Option<ListSize>,
    #[serde(default)]
    pod: String,
    #[serde(default)]
    pod_name: String,
    #[serde(default)]
    is_infra: bool,
}

#[derive(Debug, Deserialize)]
struct ListPort {
    #[serde(default)]
    host_ip: String,
    container_port: u16,
    #[serde(default)]
    host_port: u16,
    #[serde(default)]
    range: u16,
    #[serde(default)]
    protocol: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListSize {
    #[serde(default)]
    rw_size: i64,
    #[serde(default)]
    root_fs_size: i64,
}

impl ListContainer {
    pub(super) fn into_summary(self) -> Option<ContainerSummary> {
        if self.id.is_empty() {
            tracing::debug!("skipping container without an ID");
            return None;
        }

        let mut ports = Vec::new();
        for port in self.ports {
            // A range entry covers `range` consecutive ports.
            for offset in 0..port.range.max(1) {
                ports.push(PortMapping {
                    ip: Some(port.host_ip.clone()).filter(|ip| !ip.is_empty()),
                    private_port: port.container_port.saturating_add(offset),
                    public_port: Some(port.host_port)
                        .filter(|p| *p != 0)
                        .map(|p| p.saturating_add(offset)),
                    protocol: if port.protocol.is_empty() {
                        "tcp".to_string()
                    } else {
                        port.protocol.clone()
                    },
                });
            }
        }

        Some(ContainerSummary {
            names: self.names,
            image: self.image,
            image_id: Some(ImageId::new(self.image_id)).filter(|id| !id.is_empty()),
            command: self.command.join(" "),
            created: timestamp(&self.created),
            state: ContainerState::parse(&self.state),
            status: self.status,
            ports,
            labels: self.labels,
            size_rw: self.size.as_ref().map(|s| s.rw_size),
            size_root_fs: self.size.as_ref().map(|s| s.root_fs_size),
            pod_id: Some(PodId::new(self.pod)).filter(|id| !id.is_empty()),
            pod_name: Some(self.pod_name).filter(|n| !n.is_empty()),
            is_infra: self.is_infra,
            ..ContainerSummary::new(ContainerId::new(self.id))
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct InspectContainer {
    id: String,
    #[serde(default)]
    created: serde_json::Value,
    #[serde(default)]
    image_name: String,
    #[serde(default)]
    image: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    restart_count: i64,
    #[serde(default)]
    state: Option<InspectState>,
    #[serde(default, deserialize_with = "nullable")]
    mounts: Vec<InspectMount>,
    #[serde(default)]
    config: Option<InspectConfig>,
    #[serde(default)]
    network_settings: Option<InspectNetworkSettings>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct InspectState {
    status: String,
    running: bool,
    paused: bool,
    restarting: bool,
    #[serde(rename = "OOMKilled")]
    oom_killed: bool,
    dead: bool,
    pid: i64,
    exit_code: i64,
    error: String,
    started_at: Option<String>,
    finished_at: Option<String>,
    #[serde(alias = "Healthcheck")]
    health: Option<InspectHealth>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct InspectHealth {
    status: String,
    failing_streak: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct InspectMount {
    #[serde(rename = "Type")]
    kind: String,
    name: String,
    source: String,
    destination: String,
    driver: String,
    mode: String,
    #[serde(rename = "RW")]
    rw: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct InspectConfig {
    hostname: String,
    user: String,
    #[serde(deserialize_with = "nullable")]
    env: Vec<String>,
    #[serde(deserialize_with = "string_or_seq")]
    cmd: Vec<String>,
    #[serde(deserialize_with = "string_or_seq")]
    entrypoint: Vec<String>,
    image: String,
    working_dir: String,
    #[serde(deserialize_with = "nullable")]
    labels: HashMap<String, String>,
    tty: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct InspectNetworkSettings {
    #[serde(deserialize_with = "nullable")]
    networks: HashMap<String, InspectEndpoint>,
    #[serde(deserialize_with = "nullable")]
    ports: HashMap<String, Option<Vec<HostBinding>>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct InspectEndpoint {
    #[serde(rename = "NetworkID")]
    network_id: String,
    #[serde(rename = "IPAddress")]
    ip_address: String,
    gateway: String,
    mac_address: String,
    #[serde(deserialize_with = "nullable")]
    aliases: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct HostBinding {
    host_ip: String,
    host_port: String,
}

impl InspectContainer {
    pub(super) fn into_details(self) -> ContainerDetails {
        let state = self.state.unwrap_or_default();
        let health = state.health.unwrap_or_default();
        let config = self.config.unwrap_or_default();
        let network = self.network_settings.unwrap_or_default();

        let mut ports = Vec::new();
        for (key, bindings) in network.ports {
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
                    ip: Some(binding.host_ip).filter(|ip| !ip.is_empty()),
                    private_port,
                    public_port: binding.host_port.parse().ok(),
                    protocol: protocol.clone(),
                });
            }
        }
        ports.sort_by_key(|p| (p.private_port, p.public_port));

        ContainerDetails {
            name: self.name.trim_start_matches('/').to_string(),
            created: match &self.created {
                serde_json::Value::String(s) => s.clone(),
                other => timestamp(other).map(|t| t.to_rfc3339()).unwrap_or_default(),
            },
            image: if self.image_name.is_empty() {
                self.image
            } else {
                self.image_name
            },
            restart_count: self.restart_count,
            state: ContainerStateDetails {
                status: ContainerState::parse(&state.status),
                running: state.running,
                paused: state.paused,
                restarting: state.restarting,
                oom_killed: state.oom_killed,
                dead: state.dead,
                pid: state.pid,
                exit_code: state.exit_code,
                error: state.error,
                started_at: state.started_at,
                finished_at: state.finished_at,
                health: HealthStatus::parse(&health.status),
                failing_streak: health.failing_streak,
            },
            config: ContainerConfigDetails {
                hostname: config.hostname,
                user: config.user,
                env: config.env,
                cmd: config.cmd,
                entrypoint: config.entrypoint,
                image: config.image,
                working_dir: config.working_dir,
                labels: config.labels,
                tty: config.tty,
            },
            network_settings: NetworkSettings {
                networks: network
                    .networks
                    .into_iter()
                    .map(|(name, ep)| {
                        (
                            name,
                            EndpointInfo {
                                network_id: ep.network_id,
                                ip_address: ep.ip_address,
                                gateway: ep.gateway,
                                mac_address: ep.mac_address,
                                aliases: ep.aliases,
                            },
                        )
                    })
                    .collect(),
                ports,
            },
            mounts: self
                .mounts
                .into_iter()
                .map(|m| Mount {
                    kind: m.kind,
                    name: Some(m.name).filter(|n| !n.is_empty()),
                    source: m.source,
                    destination: m.destination,
                    driver: Some(m.driver).filter(|d| !d.is_empty()),
                    mode: m.mode,
                    read_write: m.rw,
                })
                .collect(),
            ..ContainerDetails::new(ContainerId::new(self.id))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct ListImage {
    #[serde(default)]
    id: String,
    #[serde(default)]
    parent_id: String,
    #[serde(default, deserialize_with = "nullable")]
    repo_tags: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    repo_digests: Vec<String>,
    #[serde(default)]
    created: serde_json::Value,
    #[serde(default)]
    size: i64,
    #[serde(default, deserialize_with = "nullable")]
    labels: HashMap<String, String>,
    #[serde(default)]
    containers: Option<i64>,
}

impl ListImage {
    pub(super) fn into_summary(self) -> Option<ImageSummary> {
        if self.id.is_empty() {
            return None;
        }
        Some(ImageSummary {
            repo_tags: self.repo_tags,
            repo_digests: self.repo_digests,
            parent_id: Some(ImageId::new(self.parent_id)).filter(|id| !id.is_empty()),
            created: timestamp(&self.created),
            size: self.size,
            labels: self.labels,
            containers: self.containers,
            ..ImageSummary::new(ImageId::new(self.id))
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct InspectImage {
    id: String,
    #[serde(default, deserialize_with = "nullable")]
    repo_tags: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    repo_digests: Vec<String>,
    #[serde(default)]
    parent: String,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    created: serde_json::Value,
    #[serde(default)]
    author: String,
    #[serde(default)]
    architecture: String,
    #[serde(default)]
    os: String,
    #[serde(default)]
    size: i64,
    #[serde(rename = "RootFS", default)]
    root_fs: Option<RootFs>,
    #[serde(default)]
    config: Option<ImageConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct RootFs {
    #[serde(deserialize_with = "nullable")]
    layers: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ImageConfig {
    #[serde(deserialize_with = "nullable")]
    env: Vec<String>,
    #[serde(deserialize_with = "string_or_seq")]
    cmd: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    labels: HashMap<String, String>,
}

impl InspectImage {
    pub(super) fn into_details(self) -> ImageDetails {
        let config = self.config.unwrap_or_default();
        ImageDetails {
            repo_tags: self.repo_tags,
            repo_digests: self.repo_digests,
            parent: Some(self.parent).filter(|p| !p.is_empty()),
            comment: self.comment,
            created: match &self.created {
                serde_json::Value::String(s) => Some(s.clone()),
                other => timestamp(other).map(|t| t.to_rfc3339()),
            },
            author: self.author,
            architecture: self.architecture,
            os: self.os,
            size: self.size,
            layers: self.root_fs.unwrap_or_default().layers,
            env: config.env,
            cmd: config.cmd,
            labels: config.labels,
            ..ImageDetails::new(ImageId::new(self.id))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct HistoryItem {
    #[serde(default, alias = "id")]
    id: String,
    #[serde(default, alias = "created")]
    created: serde_json::Value,
    #[serde(default, alias = "createdBy")]
    created_by: String,
    #[serde(default, alias = "tags", deserialize_with = "nullable")]
    tags: Vec<String>,
    #[serde(default, alias = "size")]
    size: i64,
    #[serde(default, alias = "comment")]
    comment: String,
}

impl From<HistoryItem> for ImageHistoryEntry {
    fn from(item: HistoryItem) -> Self {
        ImageHistoryEntry {
            id: item.id,
            created: timestamp(&item.created),
            created_by: item.created_by,
            tags: item.tags,
            size: item.size,
            comment: item.comment,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct ListVolume {
    #[serde(default)]
    name: String,
    #[serde(default)]
    driver: String,
    #[serde(default)]
    mountpoint: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    labels: HashMap<String, String>,
    #[serde(default, deserialize_with = "nullable")]
    options: HashMap<String, String>,
}

impl ListVolume {
    pub(super) fn into_summary(self) -> Option<VolumeSummary> {
        if self.name.is_empty() {
            return None;
        }
        Some(VolumeSummary {
            name: self.name,
            driver: self.driver,
            mountpoint: self.mountpoint,
            scope: self.scope,
            created_at: self.created_at,
            labels: self.labels,
            options: self.options,
        })
    }
}

/// Netavark-era network listing uses lowercase keys.
#[derive(Debug, Deserialize)]
pub(super) struct ListNetwork {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    driver: String,
    #[serde(default)]
    internal: bool,
    #[serde(default, deserialize_with = "nullable")]
    labels: HashMap<String, String>,
    #[serde(default, deserialize_with = "nullable")]
    options: HashMap<String, String>,
}

impl ListNetwork {
    pub(super) fn into_summary(self) -> Option<NetworkSummary> {
        let id = if self.id.is_empty() {
            self.name.clone()
        } else {
            self.id
        };
        if id.is_empty() {
            return None;
        }
        Some(NetworkSummary {
            name: if self.name.is_empty() {
                id.clone()
            } else {
                self.name
            },
            driver: self.driver,
            scope: Some("local".to_string()),
            internal: self.internal,
            labels: self.labels,
            options: self.options,
            ..NetworkSummary::new(NetworkId::new(id))
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct ListPod {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    created: serde_json::Value,
    #[serde(default)]
    infra_id: String,
    #[serde(default, deserialize_with = "nullable")]
    labels: HashMap<String, String>,
    #[serde(default, deserialize_with = "nullable")]
    containers: Vec<PodMember>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PodMember {
    #[serde(default)]
    id: String,
}

impl ListPod {
    pub(super) fn into_summary(self) -> Option<PodSummary> {
        if self.id.is_empty() {
            return None;
        }
        Some(PodSummary {
            status: self.status,
            created: timestamp(&self.created),
            infra_id: Some(ContainerId::new(self.infra_id)).filter(|id| !id.is_empty()),
            labels: self.labels,
            containers: self
                .containers
                .into_iter()
                .filter(|m| !m.id.is_empty())
                .map(|m| ContainerId::new(m.id))
                .collect(),
            ..PodSummary::new(PodId::new(self.id), self.name)
        })
    }
}

/// One line of `/libpod/containers/stats`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct StatsReport {
    #[serde(default)]
    pub(super) error: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "nullable")]
    pub(super) stats: Vec<ContainerStats>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct ContainerStats {
    #[serde(rename = "CPUNano")]
    cpu_nano: u64,
    #[serde(rename = "SystemNano")]
    system_nano: u64,
    #[serde(rename = "MemUsage")]
    mem_usage: u64,
    #[serde(rename = "MemLimit")]
    mem_limit: u64,
    #[serde(rename = "NetInput")]
    net_input: u64,
    #[serde(rename = "NetOutput")]
    net_output: u64,
    #[serde(rename = "BlockInput")]
    block_input: u64,
    #[serde(rename = "BlockOutput")]
    block_output: u64,
    #[serde(rename = "PIDs")]
    pids: u64,
    #[serde(rename = "Network", deserialize_with = "nullable")]
    network: HashMap<String, InterfaceStats>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct InterfaceStats {
    rx_bytes: u64,
    tx_bytes: u64,
}

impl From<ContainerStats> for StatsEntry {
    fn from(stats: ContainerStats) -> Self {
        let mut networks: HashMap<String, NetworkIo> = stats
            .network
            .into_iter()
            .map(|(iface, io)| {
                (
                    iface,
                    NetworkIo {
                        rx_bytes: io.rx_bytes,
                        tx_bytes: io.tx_bytes,
                    },
                )
            })
            .collect();
        if networks.is_empty() && (stats.net_input > 0 || stats.net_output > 0) {
            networks.insert(
                "total".to_string(),
                NetworkIo {
                    rx_bytes: stats.net_input,
                    tx_bytes: stats.net_output,
                },
            );
        }

        StatsEntry {
            cpu: CpuStats {
                total_usage: stats.cpu_nano,
                system_usage: stats.system_nano,
                online_cpus: 0,
            },
            memory: MemoryStats {
                usage: stats.mem_usage,
                limit: stats.mem_limit,
                cache: 0,
            },
            pids: stats.pids,
            networks,
            block_read: stats.block_input,
            block_write: stats.block_output,
            ..StatsEntry::new(Utc::now())
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct EventMessage {
    #[serde(rename = "Type", default)]
    kind: String,
    #[serde(rename = "Action", default)]
    action: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    id: String,
    #[serde(rename = "Actor", default)]
    actor: Option<EventActorMessage>,
    #[serde(default)]
    time: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct EventActorMessage {
    #[serde(rename = "ID")]
    id: String,
    #[serde(deserialize_with = "nullable")]
    attributes: HashMap<String, String>,
}

impl From<EventMessage> for Event {
    fn from(msg: EventMessage) -> Self {
        let actor = msg.actor.unwrap_or_default();
        Event {
            kind: msg.kind.to_ascii_lowercase(),
            action: if msg.action.is_empty() {
                msg.status
            } else {
                msg.action
            },
            actor: EventActor {
                id: if actor.id.is_empty() { msg.id } else { actor.id },
                attributes: actor.attributes,
            },
            time: timestamp(&msg.time),
        }
    }
}

/// Entry in a prune response. Networks report `Name`/`Error`, everything
/// else `Id`/`Size`/`Err`.
#[derive(Debug, Deserialize)]
pub(super) struct PruneItem {
    #[serde(rename = "Id", alias = "Name", default)]
    id: String,
    #[serde(rename = "Size", default)]
    size: Option<u64>,
    #[serde(rename = "Err", alias = "Error", default)]
    err: Option<String>,
}

pub(super) fn prune_report(items: Vec<PruneItem>) -> PruneReport {
    let mut report = PruneReport::default();
    for item in items {
        match item.err.filter(|e| !e.is_empty()) {
            Some(err) => tracing::warn!(id = %item.id, "prune skipped: {}", err),
            None => {
                report.space_reclaimed += item.size.unwrap_or(0);
                report.deleted.push(item.id);
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_container_translates_fields() {
        let raw = json!({
            "Id": "abc123",
            "Names": ["web"],
            "Image": "docker.io/library/nginx:latest",
            "ImageID": "sha256:img",
            "Command": ["nginx", "-g", "daemon off;"],
            "Created": "2024-01-02T03:04:05Z",
            "State": "running",
            "Status": "Up 2 minutes",
            "Ports": [{"host_ip": "", "container_port": 80, "host_port": 8080, "range": 2, "protocol": "tcp"}],
            "Labels": null,
            "Pod": "pod1",
            "PodName": "frontend",
            "IsInfra": false,
            "Unknown": {"ignored": true}
        });
        let list: ListContainer = serde_json::from_value(raw).unwrap();
        let summary = list.into_summary().unwrap();
        assert_eq!(summary.id.as_str(), "abc123");
        assert_eq!(summary.state, ContainerState::Running);
        assert_eq!(summary.command, "nginx -g daemon off;");
        assert_eq!(summary.ports.len(), 2);
        assert_eq!(summary.ports[1].public_port, Some(8081));
        assert_eq!(summary.pod_id.as_ref().map(|p| p.as_str()), Some("pod1"));
        assert!(summary.labels.is_empty());
    }

    #[test]
    fn list_container_without_id_is_dropped() {
        let list: ListContainer = serde_json::from_value(json!({"State": "running"})).unwrap();
        assert!(list.into_summary().is_none());
    }

    #[test]
    fn inspect_container_translates_state_and_ports() {
        let raw = json!({
            "Id": "abc123",
            "Name": "/web",
            "ImageName": "nginx:latest",
            "State": {"Status": "exited", "ExitCode": 137, "OOMKilled": true, "Health": {"Status": "unhealthy", "FailingStreak": 3}},
            "Config": {"Entrypoint": "/docker-entrypoint.sh", "Cmd": ["nginx"], "Env": null, "Labels": {"a": "b"}},
            "NetworkSettings": {
                "Networks": {"podman": {"NetworkID": "net1", "IPAddress": "10.88.0.2"}},
                "Ports": {"80/tcp": [{"HostIp": "127.0.0.1", "HostPort": "8080"}], "443/tcp": null}
            },
            "Mounts": [{"Type": "volume", "Name": "data", "Source": "/var/lib/data", "Destination": "/data", "RW": true}]
        });
        let inspect: InspectContainer = serde_json::from_value(raw).unwrap();
        let details = inspect.into_details();
        assert_eq!(details.name, "web");
        assert_eq!(details.state.status, ContainerState::Exited);
        assert_eq!(details.state.exit_code, 137);
        assert!(details.state.oom_killed);
        assert_eq!(details.state.health, HealthStatus::Unhealthy);
        assert_eq!(details.config.entrypoint, vec!["/docker-entrypoint.sh"]);
        assert_eq!(details.network_settings.networks["podman"].ip_address, "10.88.0.2");
        assert_eq!(details.network_settings.ports.len(), 2);
        assert_eq!(details.network_settings.ports[0].public_port, Some(8080));
        assert_eq!(details.mounts[0].name.as_deref(), Some("data"));
    }

    #[test]
    fn stats_report_maps_counters() {
        let raw = json!({
            "Error": null,
            "Stats": [{
                "ContainerID": "abc", "CPUNano": 5000, "SystemNano": 100000,
                "MemUsage": 1024, "MemLimit": 4096, "NetInput": 10, "NetOutput": 20,
                "BlockInput": 1, "BlockOutput": 2, "PIDs": 7
            }]
        });
        let mut report: StatsReport = serde_json::from_value(raw).unwrap();
        let entry: StatsEntry = report.stats.remove(0).into();
        assert_eq!(entry.cpu.total_usage, 5000);
        assert_eq!(entry.memory.limit, 4096);
        assert_eq!(entry.pids, 7);
        assert_eq!(entry.network_totals().tx_bytes, 20);
    }

    #[test]
    fn events_fall_back_to_legacy_fields() {
        let raw = json!({"Type": "container", "status": "died", "id": "abc", "time": 1700000000});
        let msg: EventMessage = serde_json::from_value(raw).unwrap();
        let event = Event::from(msg);
        assert_eq!(event.action, "died");
        assert_eq!(event.actor.id, "abc");
        assert!(event.time.is_some());
    }

    #[test]
    fn prune_report_skips_failed_items() {
        let items: Vec<PruneItem> = serde_json::from_value(json!([
            {"Id": "a", "Size": 100, "Err": null},
            {"Id": "b", "Size": 50, "Err": "in use"},
            {"Name": "net1", "Error": null}
        ]))
        .unwrap();
        let report = prune_report(items);
        assert_eq!(report.deleted, vec!["a", "net1"]);
        assert_eq!(report.space_reclaimed, 100);
    }
}
