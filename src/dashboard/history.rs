// ABOUTME: Per-entity stats history: timestamped samples appended in order and pruned by age.
// ABOUTME: Each history carries its own lock so appends never contend with list refreshes.

use crate::model::{DerivedStats, PodStatsEntry, StatsEntry};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;

/// One recorded sample and the percentages derived for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsRecord {
    pub recorded_at: DateTime<Utc>,
    pub raw: StatsEntry,
    pub derived: DerivedStats,
}

/// Samples for one entity, oldest first.
#[derive(Debug, Default)]
pub struct StatsHistory {
    records: Mutex<Vec<StatsRecord>>,
}

impl StatsHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive percentages against the previous sample, append, then drop
    /// records older than `max_age` relative to the new one.
    pub fn record(&self, raw: StatsEntry, max_age: Duration) -> StatsRecord {
        let mut records = self.records.lock();
        let derived = DerivedStats::compute(&raw, records.last().map(|r| &r.raw));
        let record = StatsRecord {
            recorded_at: raw.read,
            raw,
            derived,
        };
        records.push(record.clone());
        prune(&mut records, record.recorded_at, max_age, |r| r.recorded_at);
        record
    }

    pub fn latest(&self) -> Option<StatsRecord> {
        self.records.lock().last().cloned()
    }

    pub fn records(&self) -> Vec<StatsRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

/// One pod sample, stamped when it arrived. Engines report pod
/// percentages ready-made.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PodStatsRecord {
    pub recorded_at: DateTime<Utc>,
    pub stats: PodStatsEntry,
}

/// Samples for one pod, oldest first.
#[derive(Debug, Default)]
pub struct PodStatsHistory {
    records: Mutex<Vec<PodStatsRecord>>,
}

impl PodStatsHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, stats: PodStatsEntry, max_age: Duration) -> PodStatsRecord {
        self.record_at(stats, Utc::now(), max_age)
    }

    fn record_at(&self, stats: PodStatsEntry, at: DateTime<Utc>, max_age: Duration) -> PodStatsRecord {
        let mut records = self.records.lock();
        let record = PodStatsRecord {
            recorded_at: at,
            stats,
        };
        records.push(record.clone());
        prune(&mut records, at, max_age, |r| r.recorded_at);
        record
    }

    pub fn latest(&self) -> Option<PodStatsRecord> {
        self.records.lock().last().cloned()
    }

    pub fn records(&self) -> Vec<PodStatsRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

/// Drop leading records older than `max_age` before `newest`.
fn prune<T>(
    records: &mut Vec<T>,
    newest: DateTime<Utc>,
    max_age: Duration,
    at: impl Fn(&T) -> DateTime<Utc>,
) {
    let cutoff = chrono::Duration::from_std(max_age)
        .ok()
        .and_then(|age| newest.checked_sub_signed(age));
    if let Some(cutoff) = cutoff {
        let stale = records.iter().take_while(|r| at(r) < cutoff).count();
        records.drain(..stale);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CpuStats, MemoryStats};

    fn sample(secs: i64, total: u64, system: u64) -> StatsEntry {
        let mut entry = StatsEntry::new(DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap());
        entry.cpu = CpuStats {
            total_usage: total,
            system_usage: system,
            online_cpus: 1,
        };
        entry.memory = MemoryStats {
            usage: 256,
            limit: 1024,
            cache: 0,
        };
        entry
    }

    #[test]
    fn first_sample_has_no_cpu_baseline() {
        let history = StatsHistory::new();
        let record = history.record(sample(0, 100, 1_000), Duration::from_secs(60));
        assert_eq!(record.derived.cpu_percent, 0.0);
        assert!((record.derived.memory_percent - 25.0).abs() < 1e-9);
    }

    #[test]
    fn later_samples_derive_from_previous() {
        let history = StatsHistory::new();
        history.record(sample(0, 100, 1_000), Duration::from_secs(60));
        let record = history.record(sample(1, 300, 2_000), Duration::from_secs(60));
        assert!((record.derived.cpu_percent - 20.0).abs() < 1e-9);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn old_records_are_pruned() {
        let history = StatsHistory::new();
        for secs in [0, 10, 20, 30] {
            history.record(sample(secs, 0, 0), Duration::from_secs(15));
        }
        let kept: Vec<i64> = history
            .records()
            .iter()
            .map(|r| r.recorded_at.timestamp() - 1_700_000_000)
            .collect();
        assert_eq!(kept, vec![20, 30]);
    }

    #[test]
    fn pod_records_are_pruned_by_arrival() {
        let history = PodStatsHistory::new();
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        for secs in [0, 10, 20] {
            let stats = PodStatsEntry {
                cpu_percent: secs as f64,
                ..Default::default()
            };
            history.record_at(stats, start + chrono::Duration::seconds(secs), Duration::from_secs(15));
        }
        let kept: Vec<f64> = history.records().iter().map(|r| r.stats.cpu_percent).collect();
        assert_eq!(kept, vec![10.0, 20.0]);
        assert_eq!(history.latest().map(|r| r.stats.cpu_percent), Some(20.0));
    }
}
