// ABOUTME: Backend identity, capability queries and lifecycle.

use super::sealed::Sealed;
use crate::runtime::cli::Feature;
use crate::runtime::{BackendError, BackendMode};
use async_trait::async_trait;

#[async_trait]
pub trait RuntimeInfo: Sealed + Send + Sync {
    /// Which adapter this is.
    fn mode(&self) -> BackendMode;

    /// Whether an optional capability is available. Full-API backends
    /// support everything.
    fn supports(&self, _feature: Feature) -> bool {
        true
    }

    /// Check the engine still answers.
    async fn ping(&self) -> Result<(), BackendError>;

    /// Release tunnels, child processes and connections. Idempotent.
    async fn close(&self);
}
