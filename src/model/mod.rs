// ABOUTME: Backend-neutral value types shared by every runtime adapter.
// ABOUTME: Pure data for containers, images, volumes, networks, pods, stats and events.

mod container;
mod event;
mod image;
mod pod;
mod stats;
mod storage;
mod version;

pub use container::{
    ContainerConfigDetails, ContainerDetails, ContainerState, ContainerStateDetails,
    ContainerSummary, EndpointInfo, HealthStatus, Mount, NetworkSettings, PortMapping,
    PruneReport, RemoveOptions, TopResponse,
};
pub use event::{Event, EventActor, LogLine, LogOptions, LogStream};
pub use image::{ImageDetails, ImageHistoryEntry, ImageSummary};
pub use pod::{PodStatsEntry, PodSummary};
pub use stats::{
    CpuStats, DerivedStats, MemoryStats, NetworkIo, StatsEntry, cpu_percent, memory_percent,
};
pub use storage::{NetworkSummary, VolumeSummary};
pub use version::{EngineComponent, EnginePlatform, EngineVersion};
