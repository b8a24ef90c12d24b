// ABOUTME: The runtime contract and its four adapters: libpod socket, embedded service, CLI, Docker API.
// ABOUTME: Backend picks one adapter at startup and dispatches every call to it.

mod backend;
mod bollard;
pub mod cli;
mod embedded;
mod error;
#[cfg(test)]
pub(crate) mod fake;
mod http;
pub(crate) mod json;
mod libpod;
mod traits;
mod types;

pub use backend::Backend;
pub use self::bollard::BollardRuntime;
pub use cli::{CliRuntime, Feature, FeatureSet};
pub use embedded::EmbeddedRuntime;
pub use error::{BackendError, ErrorCode, RuntimeError, RuntimeErrorKind};
pub use http::{Endpoint, EngineHttp, HttpError};
pub use libpod::SocketRuntime;
pub use traits::{
    BackendStream, ContainerOps, EventOps, ImageOps, LogOps, NetworkOps, PodOps, Runtime,
    RuntimeInfo, StatsMode, StatsOps, VolumeOps,
};
pub use types::{BackendMode, EngineKind};
