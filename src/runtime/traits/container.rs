// ABOUTME: Container lifecycle and inspection operations.
// ABOUTME: List, inspect, start/stop/pause/restart/remove, top and prune.

use super::sealed::Sealed;
use crate::model::{ContainerDetails, ContainerSummary, PruneReport, RemoveOptions, TopResponse};
use crate::runtime::BackendError;
use crate::types::ContainerId;
use async_trait::async_trait;
use std::time::Duration;

/// Container lifecycle operations.
#[async_trait]
pub trait ContainerOps: Sealed + Send + Sync {
    /// List every container, stopped ones included.
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, BackendError>;

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerDetails, BackendError>;

    async fn start_container(&self, id: &ContainerId) -> Result<(), BackendError>;

    /// Stop a container, waiting `timeout` before the engine kills it.
    /// `None` uses the engine default.
    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Option<Duration>,
    ) -> Result<(), BackendError>;

    async fn pause_container(&self, id: &ContainerId) -> Result<(), BackendError>;

    async fn unpause_container(&self, id: &ContainerId) -> Result<(), BackendError>;

    async fn restart_container(
        &self,
        id: &ContainerId,
        timeout: Option<Duration>,
    ) -> Result<(), BackendError>;

    /// Remove a container. Refusal because it is still running is reported
    /// as [`ErrorCode::MustStopContainer`](crate::runtime::ErrorCode::MustStopContainer).
    async fn remove_container(
        &self,
        id: &ContainerId,
        options: RemoveOptions,
    ) -> Result<(), BackendError>;

    /// Processes running inside a container.
    async fn top_container(&self, id: &ContainerId) -> Result<TopResponse, BackendError>;

    /// Remove all stopped containers.
    async fn prune_containers(&self) -> Result<PruneReport, BackendError>;
}
