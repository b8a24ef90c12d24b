// ABOUTME: Raw resource counters reported by engines and the percentages derived from them.
// ABOUTME: Percentages are computed from consecutive samples, never taken from the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Cumulative CPU counters at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuStats {
    /// Total CPU time consumed by the container.
    pub total_usage: u64,
    /// Host CPU time (or wall clock for engines that report it that way).
    pub system_usage: u64,
    pub online_cpus: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub usage: u64,
    pub limit: u64,
    pub cache: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkIo {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// A point-in-time sample for one container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsEntry {
    pub read: DateTime<Utc>,
    pub cpu: CpuStats,
    /// Counters from the engine's own previous sample, if it sends them.
    pub precpu: Option<CpuStats>,
    pub memory: MemoryStats,
    pub pids: u64,
    pub networks: HashMap<String, NetworkIo>,
    pub block_read: u64,
    pub block_write: u64,
}

impl StatsEntry {
    pub fn new(read: DateTime<Utc>) -> Self {
        Self {
            read,
            cpu: CpuStats::default(),
            precpu: None,
            memory: MemoryStats::default(),
            pids: 0,
            networks: HashMap::new(),
            block_read: 0,
            block_write: 0,
        }
    }

    pub fn network_totals(&self) -> NetworkIo {
        self.networks
            .values()
            .fold(NetworkIo::default(), |acc, io| NetworkIo {
                rx_bytes: acc.rx_bytes.saturating_add(io.rx_bytes),
                tx_bytes: acc.tx_bytes.saturating_add(io.tx_bytes),
            })
    }
}

/// Percentages derived from a pair of samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedStats {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_usage: u64,
    pub memory_limit: u64,
}

impl DerivedStats {
    /// Derive percentages for `current`.
    ///
    /// The CPU baseline is the engine-supplied previous counters when present,
    /// otherwise the previous sample recorded for the same entity. Without a
    /// baseline CPU% is zero.
    pub fn compute(current: &StatsEntry, previous: Option<&StatsEntry>) -> Self {
        let baseline = current
            .precpu
            .filter(|pre| pre.system_usage > 0)
            .or_else(|| previous.map(|p| p.cpu));

        Self {
            cpu_percent: baseline.map_or(0.0, |pre| cpu_percent(&pre, &current.cpu)),
            memory_percent: memory_percent(current.memory.usage, current.memory.limit),
            memory_usage: current.memory.usage,
            memory_limit: current.memory.limit,
        }
    }
}

/// CPU usage between two samples as a percentage of elapsed system time.
/// Zero unless both deltas are strictly positive.
pub fn cpu_percent(previous: &CpuStats, current: &CpuStats) -> f64 {
    let cpu_delta = current.total_usage as f64 - previous.total_usage as f64;
    let system_delta = current.system_usage as f64 - previous.system_usage as f64;
    if cpu_delta <= 0.0 || system_delta <= 0.0 {
        return 0.0;
    }
    cpu_delta / system_delta * 100.0
}

/// Memory usage as a percentage of the limit. Zero when there is no limit.
pub fn memory_percent(usage: u64, limit: u64) -> f64 {
    if limit == 0 {
        return 0.0;
    }
    usage as f64 / limit as f64 * 100.0
}
