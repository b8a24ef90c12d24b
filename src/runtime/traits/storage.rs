// ABOUTME: Volume and network operations.

use super::sealed::Sealed;
use crate::model::{NetworkSummary, PruneReport, VolumeSummary};
use crate::runtime::BackendError;
use crate::types::NetworkId;
use async_trait::async_trait;

/// Volume operations.
#[async_trait]
pub trait VolumeOps: Sealed + Send + Sync {
    async fn list_volumes(&self) -> Result<Vec<VolumeSummary>, BackendError>;

    async fn create_volume(&self, name: &str) -> Result<VolumeSummary, BackendError>;

    async fn remove_volume(&self, name: &str, force: bool) -> Result<(), BackendError>;

    async fn prune_volumes(&self) -> Result<PruneReport, BackendError>;
}

/// Network operations.
#[async_trait]
pub trait NetworkOps: Sealed + Send + Sync {
    async fn list_networks(&self) -> Result<Vec<NetworkSummary>, BackendError>;

    async fn remove_network(&self, id: &NetworkId) -> Result<(), BackendError>;

    async fn prune_networks(&self) -> Result<PruneReport, BackendError>;
}
