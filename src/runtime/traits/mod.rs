// ABOUTME: Composable capability traits making up the runtime contract.
// ABOUTME: Container, image, volume, network, pod, stats, event, log and info operations.

mod container;
mod image;
mod runtime_info;
pub(crate) mod sealed;
mod storage;
mod streams;

pub use container::ContainerOps;
pub use image::ImageOps;
pub use runtime_info::RuntimeInfo;
pub use storage::{NetworkOps, VolumeOps};
pub use streams::{BackendStream, EventOps, LogOps, PodOps, StatsMode, StatsOps};

/// The full runtime contract. Implemented automatically for any type that
/// implements every capability trait.
pub trait Runtime:
    ContainerOps
    + ImageOps
    + VolumeOps
    + NetworkOps
    + PodOps
    + StatsOps
    + EventOps
    + LogOps
    + RuntimeInfo
{
}

impl<T> Runtime for T where
    T: ContainerOps
        + ImageOps
        + VolumeOps
        + NetworkOps
        + PodOps
        + StatsOps
        + EventOps
        + LogOps
        + RuntimeInfo
{
}
