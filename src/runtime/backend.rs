// ABOUTME: The selected backend: one adapter variant chosen once at startup, dispatched statically.
// ABOUTME: Selection honours a configured mode, else follows discovery with per-engine fallbacks.

use crate::config::DashboardConfig;
use crate::discovery::{
    self, DiscoveredHost, Discovery, DiscoveryError, SshTunneler, TunnelHandle, Tunneler,
};
use crate::exec::{CommandRunner, OsCommandRunner};
use crate::model::{
    ContainerDetails, ContainerSummary, Event, ImageDetails, ImageHistoryEntry, ImageSummary,
    LogLine, LogOptions, NetworkSummary, PodStatsEntry, PodSummary, PruneReport, RemoveOptions,
    StatsEntry, TopResponse, VolumeSummary,
};
use crate::runtime::bollard::BollardRuntime;
use crate::runtime::cli::{CliRuntime, Feature};
use crate::runtime::embedded::EmbeddedRuntime;
use crate::runtime::http::Endpoint;
use crate::runtime::libpod::SocketRuntime;
use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{
    BackendStream, ContainerOps, EventOps, ImageOps, LogOps, NetworkOps, PodOps, RuntimeInfo,
    StatsMode, StatsOps, VolumeOps,
};
use crate::runtime::{BackendError, BackendMode, EngineKind, RuntimeError};
use crate::types::{ContainerId, ImageId, NetworkId, PodId};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
enum Adapter {
    Socket(SocketRuntime),
    Embedded(EmbeddedRuntime),
    Cli(CliRuntime),
    Legacy(BollardRuntime),
}

/// Forward a call to whichever adapter is active.
macro_rules! dispatch {
    ($adapter:expr, $rt:ident => $call:expr) => {
        match $adapter {
            Adapter::Socket($rt) => $call,
            Adapter::Embedded($rt) => $call,
            Adapter::Cli($rt) => $call,
            Adapter::Legacy($rt) => $call,
        }
    };
}

/// The runtime the dashboard talks to for the rest of the process.
#[derive(Debug)]
pub struct Backend {
    adapter: Adapter,
    tunnel: Option<TunnelHandle>,
}

impl Backend {
    /// Bring up a backend for this process: the configured mode when one is
    /// set, otherwise whatever discovery finds.
    pub async fn connect(config: &DashboardConfig) -> Result<Self, RuntimeError> {
        let runner: Arc<dyn CommandRunner> = Arc::new(OsCommandRunner::new());
        let tunneler = SshTunneler::new(
            config.discovery.tunnel_timeout,
            config.discovery.tunnel_retry_interval,
        );
        let discovery = Discovery::from_process(&config.discovery);
        Connector {
            config,
            runner,
            tunneler: &tunneler,
        }
        .connect(&discovery)
        .await
    }

    fn new(adapter: Adapter) -> Self {
        Self {
            adapter,
            tunnel: None,
        }
    }

    fn with_tunnel(mut self, tunnel: Option<TunnelHandle>) -> Self {
        self.tunnel = tunnel;
        self
    }

    /// Local socket of the SSH tunnel, when the engine is remote.
    pub fn tunnel(&self) -> Option<&TunnelHandle> {
        self.tunnel.as_ref()
    }
}

// =============================================================================
// Selection
// =============================================================================

struct Connector<'a> {
    config: &'a DashboardConfig,
    runner: Arc<dyn CommandRunner>,
    tunneler: &'a dyn Tunneler,
}

impl Connector<'_> {
    async fn connect(&self, discovery: &Discovery) -> Result<Backend, RuntimeError> {
        if let Some(mode) = self.config.backend.mode {
            tracing::debug!(mode = %mode, "backend mode configured");
            return self.connect_mode(mode, discovery).await;
        }

        match discovery::discover_host(discovery).await {
            Ok(found) => self.from_discovered(&found).await,
            Err(err @ DiscoveryError::NoEngineFound { .. }) => self.without_engine(err).await,
            Err(err) => Err(err.into()),
        }
    }

    async fn connect_mode(
        &self,
        mode: BackendMode,
        discovery: &Discovery,
    ) -> Result<Backend, RuntimeError> {
        match mode {
            BackendMode::Cli => Ok(self.cli().await?),
            BackendMode::Embedded => Ok(self.embedded().await?),
            BackendMode::Socket | BackendMode::Legacy => {
                let found = discovery::discover_host(discovery).await?;
                let active = discovery::activate(
                    &found,
                    self.tunneler,
                    &self.config.discovery.remote_socket,
                )
                .await?;
                let adapter = if mode == BackendMode::Socket {
                    self.socket(&active.endpoint).await?
                } else {
                    self.legacy(&active.endpoint).await?
                };
                Ok(Backend::new(adapter).with_tunnel(active.tunnel))
            }
        }
    }

    /// Podman prefers its native API and falls back to a private service;
    /// Docker prefers the Engine API client and falls back to the socket adapter.
    /// Hosts the user named get no fallback: their failure is the answer.
    async fn from_discovered(&self, found: &DiscoveredHost) -> Result<Backend, RuntimeError> {
        let active =
            discovery::activate(found, self.tunneler, &self.config.discovery.remote_socket).await?;
        let explicit = found.source.is_explicit();

        let first = match active.kind {
            EngineKind::Podman => self.socket(&active.endpoint).await,
            EngineKind::Docker => self.legacy(&active.endpoint).await,
        };
        let err = match first {
            Ok(adapter) => return Ok(Backend::new(adapter).with_tunnel(active.tunnel)),
            Err(e) => e,
        };

        if explicit {
            tracing::warn!(host = %found.host, "configured host does not answer: {}", err);
            if let Some(tunnel) = &active.tunnel {
                tunnel.close();
            }
            return Err(err.into());
        }

        match active.kind {
            EngineKind::Podman => {
                tracing::warn!(endpoint = %active.endpoint, "socket backend failed, trying embedded: {}", err);
                if let Some(tunnel) = &active.tunnel {
                    tunnel.close();
                }
                Ok(self.embedded().await?)
            }
            EngineKind::Docker => {
                tracing::warn!(endpoint = %active.endpoint, "legacy backend failed, trying socket: {}", err);
                let adapter = self.socket(&active.endpoint).await?;
                Ok(Backend::new(adapter).with_tunnel(active.tunnel))
            }
        }
    }

    /// No socket anywhere: the CLI tool, then a private Podman service.
    /// When neither comes up the discovery error is what the user sees.
    async fn without_engine(&self, err: DiscoveryError) -> Result<Backend, RuntimeError> {
        tracing::info!("{}", err);
        match self.cli().await {
            Ok(backend) => return Ok(backend),
            Err(e) => tracing::debug!("CLI backend unavailable: {}", e),
        }
        match self.embedded().await {
            Ok(backend) => Ok(backend),
            Err(e) => {
                tracing::debug!("embedded backend unavailable: {}", e);
                Err(err.into())
            }
        }
    }

    async fn socket(&self, endpoint: &Endpoint) -> Result<Adapter, BackendError> {
        let runtime = SocketRuntime::new(endpoint.clone());
        runtime.ping().await?;
        tracing::info!(endpoint = %endpoint, "using socket backend");
        Ok(Adapter::Socket(runtime))
    }

    async fn legacy(&self, endpoint: &Endpoint) -> Result<Adapter, BackendError> {
        let runtime = BollardRuntime::connect(endpoint, self.config.backend.connect_timeout)?;
        runtime.ping().await?;
        tracing::info!(endpoint = %endpoint, "using legacy backend");
        Ok(Adapter::Legacy(runtime))
    }

    async fn cli(&self) -> Result<Backend, BackendError> {
        let runtime = CliRuntime::connect(self.runner.clone(), &self.config.backend.cli_binary).await?;
        Ok(Backend::new(Adapter::Cli(runtime)))
    }

    async fn embedded(&self) -> Result<Backend, BackendError> {
        let runtime = EmbeddedRuntime::start(
            &self.config.backend.podman_binary,
            self.config.backend.embedded_startup,
        )
        .await?;
        Ok(Backend::new(Adapter::Embedded(runtime)))
    }
}

// =============================================================================
// Contract
// =============================================================================

impl Sealed for Backend {}

#[async_trait]
impl ContainerOps for Backend {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, BackendError> {
        dispatch!(&self.adapter, r => r.list_containers().await)
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerDetails, BackendError> {
        dispatch!(&self.adapter, r => r.inspect_container(id).await)
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), BackendError> {
        dispatch!(&self.adapter, r => r.start_container(id).await)
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Option<Duration>,
    ) -> Result<(), BackendError> {
        dispatch!(&self.adapter, r => r.stop_container(id, timeout).await)
    }

    async fn pause_container(&self, id: &ContainerId) -> Result<(), BackendError> {
        dispatch!(&self.adapter, r => r.pause_container(id).await)
    }

    async fn unpause_container(&self, id: &ContainerId) -> Result<(), BackendError> {
        dispatch!(&self.adapter, r => r.unpause_container(id).await)
    }

    async fn restart_container(
        &self,
        id: &ContainerId,
        timeout: Option<Duration>,
    ) -> Result<(), BackendError> {
        dispatch!(&self.adapter, r => r.restart_container(id, timeout).await)
    }

    async fn remove_container(
        &self,
        id: &ContainerId,
        options: RemoveOptions,
    ) -> Result<(), BackendError> {
        dispatch!(&self.adapter, r => r.remove_container(id, options).await)
    }

    async fn top_container(&self, id: &ContainerId) -> Result<TopResponse, BackendError> {
        dispatch!(&self.adapter, r => r.top_container(id).await)
    }

    async fn prune_containers(&self) -> Result<PruneReport, BackendError> {
        dispatch!(&self.adapter, r => r.prune_containers().await)
    }
}

#[async_trait]
impl ImageOps for Backend {
    async fn list_images(&self) -> Result<Vec<ImageSummary>, BackendError> {
        dispatch!(&self.adapter, r => r.list_images().await)
    }

    async fn inspect_image(&self, id: &ImageId) -> Result<ImageDetails, BackendError> {
        dispatch!(&self.adapter, r => r.inspect_image(id).await)
    }

    async fn image_history(&self, id: &ImageId) -> Result<Vec<ImageHistoryEntry>, BackendError> {
        dispatch!(&self.adapter, r => r.image_history(id).await)
    }

    async fn remove_image(&self, id: &ImageId, force: bool) -> Result<(), BackendError> {
        dispatch!(&self.adapter, r => r.remove_image(id, force).await)
    }

    async fn prune_images(&self) -> Result<PruneReport, BackendError> {
        dispatch!(&self.adapter, r => r.prune_images().await)
    }
}

#[async_trait]
impl VolumeOps for Backend {
    async fn list_volumes(&self) -> Result<Vec<VolumeSummary>, BackendError> {
        dispatch!(&self.adapter, r => r.list_volumes().await)
    }

    async fn create_volume(&self, name: &str) -> Result<VolumeSummary, BackendError> {
        dispatch!(&self.adapter, r => r.create_volume(name).await)
    }

    async fn remove_volume(&self, name: &str, force: bool) -> Result<(), BackendError> {
        dispatch!(&self.adapter, r => r.remove_volume(name, force).await)
    }

    async fn prune_volumes(&self) -> Result<PruneReport, BackendError> {
        dispatch!(&self.adapter, r => r.prune_volumes().await)
    }
}

#[async_trait]
impl NetworkOps for Backend {
    async fn list_networks(&self) -> Result<Vec<NetworkSummary>, BackendError> {
        dispatch!(&self.adapter, r => r.list_networks().await)
    }

    async fn remove_network(&self, id: &NetworkId) -> Result<(), BackendError> {
        dispatch!(&self.adapter, r => r.remove_network(id).await)
    }

    async fn prune_networks(&self) -> Result<PruneReport, BackendError> {
        dispatch!(&self.adapter, r => r.prune_networks().await)
    }
}

#[async_trait]
impl PodOps for Backend {
    async fn list_pods(&self) -> Result<Vec<PodSummary>, BackendError> {
        dispatch!(&self.adapter, r => r.list_pods().await)
    }

    async fn pod_stats(
        &self,
        id: &PodId,
        mode: StatsMode,
        cancel: CancellationToken,
    ) -> Result<BackendStream<PodStatsEntry>, BackendError> {
        dispatch!(&self.adapter, r => r.pod_stats(id, mode, cancel).await)
    }
}

#[async_trait]
impl StatsOps for Backend {
    async fn container_stats(
        &self,
        id: &ContainerId,
        mode: StatsMode,
        cancel: CancellationToken,
    ) -> Result<BackendStream<StatsEntry>, BackendError> {
        dispatch!(&self.adapter, r => r.container_stats(id, mode, cancel).await)
    }
}

#[async_trait]
impl EventOps for Backend {
    async fn events(&self, cancel: CancellationToken) -> Result<BackendStream<Event>, BackendError> {
        dispatch!(&self.adapter, r => r.events(cancel).await)
    }
}

#[async_trait]
impl LogOps for Backend {
    async fn container_logs(
        &self,
        id: &ContainerId,
        options: &LogOptions,
        cancel: CancellationToken,
    ) -> Result<BackendStream<LogLine>, BackendError> {
        dispatch!(&self.adapter, r => r.container_logs(id, options, cancel).await)
    }
}

#[async_trait]
impl RuntimeInfo for Backend {
    fn mode(&self) -> BackendMode {
        dispatch!(&self.adapter, r => r.mode())
    }

    fn supports(&self, feature: Feature) -> bool {
        dispatch!(&self.adapter, r => r.supports(feature))
    }

    async fn ping(&self) -> Result<(), BackendError> {
        dispatch!(&self.adapter, r => r.ping().await)
    }

    async fn close(&self) {
        dispatch!(&self.adapter, r => r.close().await);
        if let Some(tunnel) = &self.tunnel {
            tunnel.close();
        }
    }
}
