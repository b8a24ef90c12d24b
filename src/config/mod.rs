// ABOUTME: Dashboard configuration loaded from berth.yml.
// ABOUTME: Backend selection, discovery timeouts, stats retention, compose and label names.

mod deserialize;

use crate::error::{Error, Result};
use crate::runtime::BackendMode;
use deserialize::{deserialize_backend_mode, deserialize_compose_commands};
use nonempty::NonEmpty;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "berth.yml";
pub const CONFIG_FILENAME_ALT: &str = "berth.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".berth/config.yml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DashboardConfig {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub stats: StatsConfig,

    #[serde(default)]
    pub compose: ComposeConfig,

    #[serde(default)]
    pub labels: LabelConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BackendConfig {
    /// Force an adapter instead of following discovery.
    #[serde(default, deserialize_with = "deserialize_backend_mode")]
    pub mode: Option<BackendMode>,

    #[serde(default = "default_cli_binary")]
    pub cli_binary: String,

    #[serde(default = "default_podman_binary")]
    pub podman_binary: String,

    /// Timeout of the engine API clients.
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// How long the embedded service may take to start answering.
    #[serde(default = "default_embedded_startup", with = "humantime_serde")]
    pub embedded_startup: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            mode: None,
            cli_binary: default_cli_binary(),
            podman_binary: default_podman_binary(),
            connect_timeout: default_connect_timeout(),
            embedded_startup: default_embedded_startup(),
        }
    }
}

fn default_cli_binary() -> String {
    "container".to_string()
}

fn default_podman_binary() -> String {
    "podman".to_string()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_embedded_startup() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_validate_timeout", with = "humantime_serde")]
    pub validate_timeout: Duration,

    #[serde(default = "default_tunnel_timeout", with = "humantime_serde")]
    pub tunnel_timeout: Duration,

    #[serde(default = "default_tunnel_retry_interval", with = "humantime_serde")]
    pub tunnel_retry_interval: Duration,

    /// Engine socket on the remote side of an SSH tunnel, unless the host URL names one.
    #[serde(default = "default_remote_socket")]
    pub remote_socket: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            validate_timeout: default_validate_timeout(),
            tunnel_timeout: default_tunnel_timeout(),
            tunnel_retry_interval: default_tunnel_retry_interval(),
            remote_socket: default_remote_socket(),
        }
    }
}

fn default_validate_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_tunnel_timeout() -> Duration {
    Duration::from_secs(8)
}

fn default_tunnel_retry_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_remote_socket() -> String {
    "/var/run/docker.sock".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatsConfig {
    /// Samples older than this are pruned from history.
    #[serde(default = "default_max_duration", with = "humantime_serde")]
    pub max_duration: Duration,

    /// Interval between one-shot samples when the backend cannot stream.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            max_duration: default_max_duration(),
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_max_duration() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ComposeConfig {
    /// Compose command to use, e.g. `docker compose`. Detected when unset.
    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub project_dir: Option<PathBuf>,

    /// Commands tried in order when `command` is unset.
    #[serde(
        default = "default_compose_candidates",
        deserialize_with = "deserialize_compose_commands"
    )]
    pub candidates: NonEmpty<String>,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            command: None,
            project_dir: None,
            candidates: default_compose_candidates(),
        }
    }
}

fn default_compose_candidates() -> NonEmpty<String> {
    NonEmpty::from((
        "podman-compose".to_string(),
        vec![
            "podman compose".to_string(),
            "docker-compose".to_string(),
            "docker compose".to_string(),
        ],
    ))
}

/// Label keys used to group containers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabelConfig {
    #[serde(default = "default_service_label")]
    pub service: String,
    #[serde(default = "default_project_label")]
    pub project: String,
    #[serde(default = "default_container_number_label")]
    pub container_number: String,
    #[serde(default = "default_one_off_label")]
    pub one_off: String,
    #[serde(default = "default_name_label")]
    pub name: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            service: default_service_label(),
            project: default_project_label(),
            container_number: default_container_number_label(),
            one_off: default_one_off_label(),
            name: default_name_label(),
        }
    }
}

fn default_service_label() -> String {
    "com.docker.compose.service".to_string()
}

fn default_project_label() -> String {
    "com.docker.compose.project".to_string()
}

fn default_container_number_label() -> String {
    "com.docker.compose.container-number".to_string()
}

fn default_one_off_label() -> String {
    "com.docker.compose.oneoff".to_string()
}

fn default_name_label() -> String {
    "name".to_string()
}

impl DashboardConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load the first config file found in `dir`, or defaults when there is none.
    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading config");
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }
}
