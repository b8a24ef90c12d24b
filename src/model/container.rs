// ABOUTME: Container summary and inspection types.
// ABOUTME: Filled field-by-field by every adapter from its engine's native shape.

use crate::types::{ContainerId, ImageId, PodId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Lifecycle state as reported by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Stopping,
    Exited,
    Dead,
    #[default]
    Unknown,
}

impl ContainerState {
    /// Normalise an engine state string. `stopped` and `configured` are the
    /// Podman and CLI spellings of exited and created.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "created" | "configured" | "initialized" => ContainerState::Created,
            "running" | "up" => ContainerState::Running,
            "paused" => ContainerState::Paused,
            "restarting" => ContainerState::Restarting,
            "removing" => ContainerState::Removing,
            "stopping" => ContainerState::Stopping,
            "exited" | "stopped" => ContainerState::Exited,
            "dead" => ContainerState::Dead,
            _ => ContainerState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Paused => "paused",
            ContainerState::Restarting => "restarting",
            ContainerState::Removing => "removing",
            ContainerState::Stopping => "stopping",
            ContainerState::Exited => "exited",
            ContainerState::Dead => "dead",
            ContainerState::Unknown => "unknown",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ContainerState::Running | ContainerState::Restarting)
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A published or exposed port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub ip: Option<String>,
    pub private_port: u16,
    pub public_port: Option<u16>,
    pub protocol: String,
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(public) = self.public_port {
            let ip = self.ip.as_deref().filter(|ip| !ip.is_empty()).unwrap_or("0.0.0.0");
            write!(f, "{ip}:{public}->")?;
        }
        write!(f, "{}/{}", self.private_port, self.protocol)
    }
}

/// One row of a container listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub id: ContainerId,
    pub names: Vec<String>,
    pub image: String,
    pub image_id: Option<ImageId>,
    pub command: String,
    pub created: Option<DateTime<Utc>>,
    pub state: ContainerState,
    pub status: String,
    pub ports: Vec<PortMapping>,
    pub labels: HashMap<String, String>,
    pub size_rw: Option<i64>,
    pub size_root_fs: Option<i64>,
    pub pod_id: Option<PodId>,
    pub pod_name: Option<String>,
    /// Pod infrastructure container. Never shown in the hierarchy.
    pub is_infra: bool,
}

impl ContainerSummary {
    /// Summary with only the ID set.
    pub fn new(id: ContainerId) -> Self {
        Self {
            id,
            names: Vec::new(),
            image: String::new(),
            image_id: None,
            command: String::new(),
            created: None,
            state: ContainerState::Unknown,
            status: String::new(),
            ports: Vec::new(),
            labels: HashMap::new(),
            size_rw: None,
            size_root_fs: None,
            pod_id: None,
            pod_name: None,
            is_infra: false,
        }
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Display name: the value of `name_label` if set, else the first engine
    /// name without its leading slash, else the short ID.
    pub fn display_name(&self, name_label: &str) -> String {
        if let Some(name) = self.label(name_label).filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        self.names
            .iter()
            .map(|n| n.trim_start_matches('/'))
            .find(|n| !n.is_empty())
            .unwrap_or_else(|| self.id.short())
            .to_string()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    None,
    Starting,
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "starting" => HealthStatus::Starting,
            "healthy" => HealthStatus::Healthy,
            "unhealthy" => HealthStatus::Unhealthy,
            _ => HealthStatus::None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerStateDetails {
    pub status: ContainerState,
    pub running: bool,
    pub paused: bool,
    pub restarting: bool,
    pub oom_killed: bool,
    pub dead: bool,
    pub pid: i64,
    pub exit_code: i64,
    pub error: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub health: HealthStatus,
    pub failing_streak: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerConfigDetails {
    pub hostname: String,
    pub user: String,
    pub env: Vec<String>,
    pub cmd: Vec<String>,
    pub entrypoint: Vec<String>,
    pub image: String,
    pub working_dir: String,
    pub labels: HashMap<String, String>,
    pub tty: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub network_id: String,
    pub ip_address: String,
    pub gateway: String,
    pub mac_address: String,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkSettings {
    pub networks: HashMap<String, EndpointInfo>,
    pub ports: Vec<PortMapping>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mount {
    pub kind: String,
    pub name: Option<String>,
    pub source: String,
    pub destination: String,
    pub driver: Option<String>,
    pub mode: String,
    pub read_write: bool,
}

/// Full inspection result. Replaced wholesale on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerDetails {
    pub id: ContainerId,
    pub name: String,
    pub created: String,
    pub image: String,
    pub restart_count: i64,
    pub state: ContainerStateDetails,
    pub config: ContainerConfigDetails,
    pub network_settings: NetworkSettings,
    pub mounts: Vec<Mount>,
}

impl ContainerDetails {
    pub fn new(id: ContainerId) -> Self {
        Self {
            id,
            name: String::new(),
            created: String::new(),
            image: String::new(),
            restart_count: 0,
            state: ContainerStateDetails::default(),
            config: ContainerConfigDetails::default(),
            network_settings: NetworkSettings::default(),
            mounts: Vec::new(),
        }
    }
}

/// Process table from `top`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopResponse {
    pub titles: Vec<String>,
    pub processes: Vec<Vec<String>>,
}

impl TopResponse {
    /// Parse `ps`-style text: a header row followed by whitespace-separated
    /// rows. The final column absorbs any remaining whitespace (commands).
    pub fn from_table(text: &str) -> Self {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let Some(header) = lines.next() else {
            return Self::default();
        };
        let titles: Vec<String> = header.split_whitespace().map(str::to_string).collect();
        let columns = titles.len().max(1);
        let processes = lines
            .map(|line| {
                let mut row = Vec::with_capacity(columns);
                let mut rest = line.trim_start();
                while row.len() + 1 < columns {
                    match rest.split_once(char::is_whitespace) {
                        Some((cell, tail)) => {
                            row.push(cell.to_string());
                            rest = tail.trim_start();
                        }
                        None => break,
                    }
                }
                if !rest.is_empty() {
                    row.push(rest.trim_end().to_string());
                }
                row
            })
            .collect();
        Self { titles, processes }
    }
}

/// Whatever a prune removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneReport {
    pub deleted: Vec<String>,
    pub space_reclaimed: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    pub force: bool,
    /// Also remove anonymous volumes.
    pub volumes: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_maps_to_exited() {
        assert_eq!(ContainerState::parse("stopped"), ContainerState::Exited);
        assert_eq!(ContainerState::parse("Running"), ContainerState::Running);
        assert_eq!(ContainerState::parse("bogus"), ContainerState::Unknown);
    }

    #[test]
    fn display_name_prefers_label_then_name() {
        let mut summary = ContainerSummary::new(ContainerId::new("0123456789abcdef"));
        assert_eq!(summary.display_name("name"), "0123456789ab");

        summary.names = vec!["/web-1".to_string()];
        assert_eq!(summary.display_name("name"), "web-1");

        summary.labels.insert("name".to_string(), "frontend".to_string());
        assert_eq!(summary.display_name("name"), "frontend");
    }

    #[test]
    fn port_mapping_display() {
        let port = PortMapping {
            ip: None,
            private_port: 80,
            public_port: Some(8080),
            protocol: "tcp".to_string(),
        };
        assert_eq!(port.to_string(), "0.0.0.0:8080->80/tcp");
    }

    #[test]
    fn top_table_keeps_command_whole() {
        let top = TopResponse::from_table(
            "USER PID COMMAND\nroot 1 nginx: master process\nnginx 22 nginx: worker\n",
        );
        assert_eq!(top.titles, vec!["USER", "PID", "COMMAND"]);
        assert_eq!(top.processes.len(), 2);
        assert_eq!(top.processes[0][2], "nginx: master process");
    }
}
