// ABOUTME: Startup discovery of the engine endpoint: overrides, contexts, candidate sockets.
// ABOUTME: The winner is cached for the whole process; remote hosts are reached via an SSH tunnel.

mod candidates;
mod context;
mod env;
mod host;
mod probe;
mod tunnel;

pub use candidates::{SocketCandidate, socket_candidates};
pub use context::{ContextError, ContextStore, context_digest};
pub use env::{CONTAINER_HOST, DOCKER_CONFIG, DOCKER_CONTEXT, DOCKER_HOST, HostEnv};
pub use host::{EngineHost, HostParseError, SshTarget};
pub use probe::{HostProbe, SocketProbe, ValidateError};
pub use tunnel::{SshTunneler, TunnelError, TunnelHandle, Tunneler};

use crate::config::DiscoveryConfig;
use crate::runtime::{Endpoint, EngineKind};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error(
        "no Docker or Podman socket found (checked {checked} locations); start an engine, \
         set CONTAINER_HOST, or run `systemctl --user enable --now podman.socket`"
    )]
    NoEngineFound { checked: usize },

    #[error("invalid {variable} `{value}`: {reason}")]
    InvalidHost {
        variable: &'static str,
        value: String,
        reason: HostParseError,
    },

    #[error("failed to use {variable} `{host}`: {reason}")]
    Validation {
        variable: &'static str,
        host: String,
        reason: ValidateError,
    },

    #[error("failed to use DOCKER_CONTEXT `{name}`: {reason}")]
    Context { name: String, reason: String },

    #[error(transparent)]
    Tunnel(#[from] TunnelError),
}

/// Where the winning host came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostSource {
    /// An environment variable override.
    Override(&'static str),
    /// A named CLI context; `explicit` when it came from `DOCKER_CONTEXT`.
    Context { name: String, explicit: bool },
    /// A well-known socket location.
    Candidate,
}

impl HostSource {
    /// Whether the user named this host. Such hosts must work as given.
    pub fn is_explicit(&self) -> bool {
        match self {
            HostSource::Override(_) => true,
            HostSource::Context { explicit, .. } => *explicit,
            HostSource::Candidate => false,
        }
    }
}

/// The single endpoint discovery settled on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredHost {
    pub host: EngineHost,
    pub kind: EngineKind,
    pub source: HostSource,
}

/// A host ready to dial: local endpoint plus the tunnel keeping it alive.
#[derive(Debug)]
pub struct ActiveHost {
    pub endpoint: Endpoint,
    pub kind: EngineKind,
    pub tunnel: Option<TunnelHandle>,
}

/// Discovery inputs. Build once per process with [`Discovery::from_process`].
pub struct Discovery {
    env: HostEnv,
    probe: Arc<dyn HostProbe>,
    candidates: Vec<SocketCandidate>,
}

impl std::fmt::Debug for Discovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Discovery")
            .field("env", &self.env)
            .field("candidates", &self.candidates)
            .finish_non_exhaustive()
    }
}

impl Discovery {
    pub fn new(env: HostEnv, probe: Arc<dyn HostProbe>) -> Self {
        let candidates = socket_candidates(&env);
        Self {
            env,
            probe,
            candidates,
        }
    }

    pub fn from_process(config: &DiscoveryConfig) -> Self {
        Self::new(
            HostEnv::from_process(),
            Arc::new(SocketProbe::new(config.validate_timeout)),
        )
    }

    /// Replace the well-known socket list.
    pub fn with_candidates(mut self, candidates: Vec<SocketCandidate>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Run discovery without consulting the process-wide cache.
    pub async fn discover(&self) -> Result<DiscoveredHost, DiscoveryError> {
        if let Some((variable, raw)) = self.env.host_override() {
            return self.from_override(variable, raw).await;
        }

        if let Some(found) = self.from_context().await? {
            return Ok(found);
        }

        self.from_candidates().await
    }

    /// Explicit overrides must work; nothing falls back from here.
    async fn from_override(
        &self,
        variable: &'static str,
        raw: &str,
    ) -> Result<DiscoveredHost, DiscoveryError> {
        let host = EngineHost::parse(raw).map_err(|reason| DiscoveryError::InvalidHost {
            variable,
            value: raw.to_string(),
            reason,
        })?;
        let kind = self
            .check(&host)
            .await
            .map_err(|reason| DiscoveryError::Validation {
                variable,
                host: host.to_string(),
                reason,
            })?;
        tracing::info!(host = %host, %kind, variable, "using host from environment");
        Ok(DiscoveredHost {
            host,
            kind,
            source: HostSource::Override(variable),
        })
    }

    /// Context host, when one is configured. Only an explicitly requested
    /// context turns a failure into an error.
    async fn from_context(&self) -> Result<Option<DiscoveredHost>, DiscoveryError> {
        let Some(store) = self.env.config_dir().map(ContextStore::new) else {
            return Ok(None);
        };
        let explicit = self.env.docker_context.clone();
        let name = match explicit.clone() {
            Some(name) => name,
            None => match store.current_context() {
                Ok(Some(name)) => name,
                Ok(None) => return Ok(None),
                Err(e) => {
                    tracing::debug!("ignoring unreadable CLI config: {}", e);
                    return Ok(None);
                }
            },
        };

        match self.context_host(&store, &name, explicit.is_some()).await {
            Ok(Some(found)) => Ok(Some(found)),
            Ok(None) => Ok(None),
            Err(reason) if explicit.is_some() => Err(DiscoveryError::Context { name, reason }),
            Err(reason) => {
                tracing::warn!(context = %name, "skipping context: {}", reason);
                Ok(None)
            }
        }
    }

    async fn context_host(
        &self,
        store: &ContextStore,
        name: &str,
        explicit: bool,
    ) -> Result<Option<DiscoveredHost>, String> {
        let Some(raw) = store.host(name).map_err(|e| e.to_string())? else {
            return Ok(None);
        };
        let host = EngineHost::parse(&raw).map_err(|e| format!("invalid host `{raw}`: {e}"))?;
        let kind = self
            .check(&host)
            .await
            .map_err(|e| format!("{host}: {e}"))?;
        tracing::info!(host = %host, %kind, context = name, "using host from context");
        Ok(Some(DiscoveredHost {
            host,
            kind,
            source: HostSource::Context {
                name: name.to_string(),
                explicit,
            },
        }))
    }

    async fn from_candidates(&self) -> Result<DiscoveredHost, DiscoveryError> {
        let existing: Vec<&SocketCandidate> =
            self.candidates.iter().filter(|c| c.path.exists()).collect();

        for candidate in &existing {
            let endpoint = Endpoint::Unix(candidate.path.clone());
            match self.probe.validate(&endpoint).await {
                Ok(()) => {
                    tracing::info!(socket = %candidate.path.display(), kind = %candidate.kind, "found engine socket");
                    return Ok(DiscoveredHost {
                        host: EngineHost::Unix(candidate.path.clone()),
                        kind: candidate.kind,
                        source: HostSource::Candidate,
                    });
                }
                Err(e) => {
                    tracing::debug!(socket = %candidate.path.display(), "candidate rejected: {}", e);
                }
            }
        }

        Err(DiscoveryError::NoEngineFound {
            checked: self.candidates.len(),
        })
    }

    /// Validate a local host and infer its kind. SSH hosts cannot be dialled
    /// before the tunnel exists, so they are accepted on their path alone.
    async fn check(&self, host: &EngineHost) -> Result<EngineKind, ValidateError> {
        match host.endpoint() {
            Some(endpoint) => {
                self.probe.validate(&endpoint).await?;
                Ok(self.probe.engine_kind(&endpoint).await)
            }
            None => Ok(EngineKind::from_path_hint(&host.to_string())),
        }
    }
}

// =============================================================================
// Process-wide cache
// =============================================================================

static DISCOVERED: Mutex<Option<DiscoveredHost>> = Mutex::const_new(None);

/// Discover once per process. Later calls return the first answer even if
/// the environment has changed since.
pub async fn discover_host(discovery: &Discovery) -> Result<DiscoveredHost, DiscoveryError> {
    let mut cached = DISCOVERED.lock().await;
    if let Some(found) = cached.as_ref() {
        return Ok(found.clone());
    }
    let found = discovery.discover().await?;
    *cached = Some(found.clone());
    Ok(found)
}

/// Forget the cached host. Intended for test isolation.
pub async fn reset_cache() {
    *DISCOVERED.lock().await = None;
}

/// Turn a discovered host into something dialable, tunnelling SSH hosts.
pub async fn activate(
    discovered: &DiscoveredHost,
    tunneler: &dyn Tunneler,
    default_remote_socket: &str,
) -> Result<ActiveHost, DiscoveryError> {
    match &discovered.host {
        EngineHost::Ssh(target) => {
            let remote = target.socket.as_deref().unwrap_or(default_remote_socket);
            let tunnel = tunneler.open(target, remote).await?;
            let endpoint = tunnel.endpoint();
            tracing::info!(
                remote = %discovered.host,
                local = %endpoint,
                "active host rewritten to ssh tunnel"
            );
            Ok(ActiveHost {
                endpoint,
                kind: discovered.kind,
                tunnel: Some(tunnel),
            })
        }
        EngineHost::Unix(path) => Ok(ActiveHost {
            endpoint: Endpoint::Unix(path.clone()),
            kind: discovered.kind,
            tunnel: None,
        }),
        EngineHost::Tcp(addr) => Ok(ActiveHost {
            endpoint: Endpoint::Tcp(addr.clone()),
            kind: discovered.kind,
            tunnel: None,
        }),
    }
}
