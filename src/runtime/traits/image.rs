// ABOUTME: Image listing, inspection, history, removal and pruning.

use super::sealed::Sealed;
use crate::model::{ImageDetails, ImageHistoryEntry, ImageSummary, PruneReport};
use crate::runtime::BackendError;
use crate::types::ImageId;
use async_trait::async_trait;

#[async_trait]
pub trait ImageOps: Sealed + Send + Sync {
    async fn list_images(&self) -> Result<Vec<ImageSummary>, BackendError>;

    async fn inspect_image(&self, id: &ImageId) -> Result<ImageDetails, BackendError>;

    /// Layer history, newest layer first.
    async fn image_history(&self, id: &ImageId) -> Result<Vec<ImageHistoryEntry>, BackendError>;

    async fn remove_image(&self, id: &ImageId, force: bool) -> Result<(), BackendError>;

    /// Remove dangling images.
    async fn prune_images(&self) -> Result<PruneReport, BackendError>;
}
