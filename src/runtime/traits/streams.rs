// ABOUTME: Streaming operations: container stats, pod stats, lifecycle events and logs.
// ABOUTME: Every stream takes a cancellation token and ends when it fires.

use super::sealed::Sealed;
use crate::model::{Event, LogLine, LogOptions, PodStatsEntry, PodSummary, StatsEntry};
use crate::runtime::BackendError;
use crate::types::{ContainerId, PodId};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// Items produced by a backend stream.
pub type BackendStream<T> = Pin<Box<dyn Stream<Item = Result<T, BackendError>> + Send>>;

/// How many samples a stats call should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsMode {
    /// A single sample, then the stream ends.
    OneShot,
    /// Samples until the engine stops sending or the caller cancels.
    Continuous,
}

/// Resource usage sampling for containers.
#[async_trait]
pub trait StatsOps: Sealed + Send + Sync {
    async fn container_stats(
        &self,
        id: &ContainerId,
        mode: StatsMode,
        cancel: CancellationToken,
    ) -> Result<BackendStream<StatsEntry>, BackendError>;
}

/// Pod listing and pod-wide statistics.
#[async_trait]
pub trait PodOps: Sealed + Send + Sync {
    async fn list_pods(&self) -> Result<Vec<PodSummary>, BackendError>;

    async fn pod_stats(
        &self,
        id: &PodId,
        mode: StatsMode,
        cancel: CancellationToken,
    ) -> Result<BackendStream<PodStatsEntry>, BackendError>;
}

/// Engine lifecycle events.
#[async_trait]
pub trait EventOps: Sealed + Send + Sync {
    async fn events(&self, cancel: CancellationToken) -> Result<BackendStream<Event>, BackendError>;
}

/// Container log streaming.
#[async_trait]
pub trait LogOps: Sealed + Send + Sync {
    async fn container_logs(
        &self,
        id: &ContainerId,
        options: &LogOptions,
        cancel: CancellationToken,
    ) -> Result<BackendStream<LogLine>, BackendError>;
}
