// ABOUTME: Pod summary and aggregated pod statistics.

use crate::types::{ContainerId, PodId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodSummary {
    pub id: PodId,
    pub name: String,
    pub status: String,
    pub created: Option<DateTime<Utc>>,
    pub infra_id: Option<ContainerId>,
    pub labels: HashMap<String, String>,
    /// Member containers, infra container included.
    pub containers: Vec<ContainerId>,
}

impl PodSummary {
    pub fn new(id: PodId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: String::new(),
            created: None,
            infra_id: None,
            labels: HashMap::new(),
            containers: Vec::new(),
        }
    }

    /// Whether any member runs. Engines report `Degraded` when only some do.
    pub fn is_running(&self) -> bool {
        self.status.eq_ignore_ascii_case("running") || self.status.eq_ignore_ascii_case("degraded")
    }
}

/// One sample of pod-wide resource usage, summed over member containers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodStatsEntry {
    pub pod_id: String,
    pub pod_name: String,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub net_input: u64,
    pub net_output: u64,
    pub block_input: u64,
    pub block_output: u64,
    pub pids: u64,
}
