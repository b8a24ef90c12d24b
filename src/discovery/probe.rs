// ABOUTME: Validates endpoints with a bounded ping and asks them which engine they are.

use crate::model::EngineVersion;
use crate::runtime::{EngineHttp, EngineKind, Endpoint};
use async_trait::async_trait;
use hyper::Method;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ValidateError {
    #[error("no answer within {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Unreachable(String),
}

/// Checks whether an endpoint answers as a container engine.
#[async_trait]
pub trait HostProbe: Send + Sync {
    /// Connect and ping within a bounded time.
    async fn validate(&self, endpoint: &Endpoint) -> Result<(), ValidateError>;

    /// Ask the engine for its version report.
    async fn version(&self, endpoint: &Endpoint) -> Result<EngineVersion, ValidateError>;

    /// Engine kind from the version report, else from the endpoint path.
    async fn engine_kind(&self, endpoint: &Endpoint) -> EngineKind {
        match self.version(endpoint).await {
            Ok(version) => version.engine_kind(),
            Err(e) => {
                tracing::debug!(endpoint = %endpoint, "version probe failed, guessing from path: {}", e);
                EngineKind::from_path_hint(&endpoint.to_string())
            }
        }
    }
}

/// Probes over HTTP on the engine's socket.
#[derive(Debug, Clone)]
pub struct SocketProbe {
    timeout: Duration,
}

impl SocketProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl HostProbe for SocketProbe {
    async fn validate(&self, endpoint: &Endpoint) -> Result<(), ValidateError> {
        let http = EngineHttp::new(endpoint.clone());
        tokio::time::timeout(self.timeout, http.call(Method::GET, "/_ping"))
            .await
            .map_err(|_| ValidateError::Timeout(self.timeout))?
            .map_err(|e| ValidateError::Unreachable(e.to_string()))
    }

    async fn version(&self, endpoint: &Endpoint) -> Result<EngineVersion, ValidateError> {
        let http = EngineHttp::new(endpoint.clone());
        tokio::time::timeout(self.timeout, http.get_json::<EngineVersion>("/version"))
            .await
            .map_err(|_| ValidateError::Timeout(self.timeout))?
            .map_err(|e| ValidateError::Unreachable(e.to_string()))
    }
}
