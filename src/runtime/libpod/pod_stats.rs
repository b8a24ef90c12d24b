// ABOUTME: Aggregates Podman's per-container pod stats report into one pod-level entry.
// ABOUTME: The engine formats values as human text ("75.5%", "1.2MB / 2GB"), parsed leniently here.

use crate::model::PodStatsEntry;
use serde::Deserialize;

/// One container row from `/libpod/pods/stats`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct PodStatsReport {
    #[serde(rename = "Pod")]
    pub pod: String,
    #[serde(rename = "CID")]
    pub cid: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "CPU")]
    pub cpu: String,
    #[serde(rename = "MemUsage")]
    pub mem_usage: String,
    #[serde(rename = "MemUsageBytes")]
    pub mem_usage_bytes: String,
    #[serde(rename = "Mem")]
    pub mem: String,
    #[serde(rename = "NetIO")]
    pub net_io: String,
    #[serde(rename = "BlockIO")]
    pub block_io: String,
    #[serde(rename = "PIDS")]
    pub pids: String,
}

/// Sum container rows into a single pod entry.
///
/// CPU and memory percentages are summed, byte pairs are summed per side.
/// The pod identity comes from the first row, falling back to the requested
/// name when the engine leaves it blank.
pub(super) fn aggregate(requested: &str, reports: &[PodStatsReport]) -> PodStatsEntry {
    let mut entry = PodStatsEntry {
        pod_id: requested.to_string(),
        pod_name: requested.to_string(),
        ..PodStatsEntry::default()
    };

    if let Some(first) = reports.first() {
        if !first.pod.is_empty() {
            entry.pod_id = first.pod.clone();
        }
    }

    for report in reports {
        entry.cpu_percent += parse_percentage(&report.cpu);
        entry.memory_percent += parse_percentage(&report.mem);

        let mem_pair = if report.mem_usage_bytes.is_empty() {
            &report.mem_usage
        } else {
            &report.mem_usage_bytes
        };
        let (usage, limit) = parse_pair(mem_pair);
        entry.memory_usage += usage;
        // Every member reports the same pod cgroup limit.
        entry.memory_limit = entry.memory_limit.max(limit);

        let (rx, tx) = parse_pair(&report.net_io);
        entry.net_input += rx;
        entry.net_output += tx;

        let (read, write) = parse_pair(&report.block_io);
        entry.block_input += read;
        entry.block_output += write;

        entry.pids += report.pids.trim().parse::<u64>().unwrap_or(0);
    }

    entry
}

/// `"75.5%"` -> 75.5. Anything unparseable counts as zero.
pub(super) fn parse_percentage(raw: &str) -> f64 {
    raw.trim()
        .trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// `"1.5kB / 2MB"` -> (1536, 2097152).
pub(super) fn parse_pair(raw: &str) -> (u64, u64) {
    match raw.split_once('/') {
        Some((left, right)) => (parse_byte_value(left), parse_byte_value(right)),
        None => (parse_byte_value(raw), 0),
    }
}

/// Parse a human byte size with 1024-based units. `--` and blanks are zero.
pub(super) fn parse_byte_value(raw: &str) -> u64 {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() || cleaned == "--" {
        return 0;
    }

    let split = cleaned
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(cleaned.len());
    let (number, unit) = cleaned.split_at(split);
    let Ok(value) = number.parse::<f64>() else {
        return 0;
    };

    let multiplier: f64 = match unit.to_ascii_lowercase().as_str() {
        "" | "b" => 1.0,
        "kb" | "kib" | "k" => 1024.0,
        "mb" | "mib" | "m" => 1024.0 * 1024.0,
        "gb" | "gib" | "g" => 1024.0 * 1024.0 * 1024.0,
        "tb" | "tib" | "t" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return 0,
    };

    (value * multiplier) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cpu: &str, mem: &str, usage: &str, net: &str, block: &str, pids: &str) -> PodStatsReport {
        PodStatsReport {
            pod: "pod123".into(),
            cpu: cpu.into(),
            mem: mem.into(),
            mem_usage: usage.into(),
            net_io: net.into(),
            block_io: block.into(),
            pids: pids.into(),
            ..Default::default()
        }
    }

    #[test]
    fn byte_values_use_binary_units() {
        assert_eq!(parse_byte_value("512B"), 512);
        assert_eq!(parse_byte_value("1.5kB"), 1536);
        assert_eq!(parse_byte_value("2MiB"), 2 * 1024 * 1024);
        assert_eq!(parse_byte_value("1GB"), 1024 * 1024 * 1024);
        assert_eq!(parse_byte_value("1,024B"), 1024);
        assert_eq!(parse_byte_value("--"), 0);
        assert_eq!(parse_byte_value(""), 0);
        assert_eq!(parse_byte_value("12 parsecs"), 0);
    }

    #[test]
    fn percentages_tolerate_garbage() {
        assert_eq!(parse_percentage("75.5%"), 75.5);
        assert_eq!(parse_percentage(" 3% "), 3.0);
        assert_eq!(parse_percentage("--"), 0.0);
    }

    #[test]
    fn rows_are_summed_into_pod_entry() {
        let rows = vec![
            row("10%", "1%", "1MB / 2GB", "1kB / 2kB", "0B / 1MB", "3"),
            row("5.5%", "2%", "3MB / 2GB", "1kB / 0B", "--", "2"),
        ];
        let entry = aggregate("web", &rows);
        assert_eq!(entry.pod_id, "pod123");
        assert_eq!(entry.pod_name, "web");
        assert!((entry.cpu_percent - 15.5).abs() < f64::EPSILON);
        assert!((entry.memory_percent - 3.0).abs() < f64::EPSILON);
        assert_eq!(entry.memory_usage, 4 * 1024 * 1024);
        assert_eq!(entry.memory_limit, 2 * 1024 * 1024 * 1024);
        assert_eq!(entry.net_input, 2048);
        assert_eq!(entry.net_output, 2048);
        assert_eq!(entry.block_output, 1024 * 1024);
        assert_eq!(entry.pids, 5);
    }

    #[test]
    fn empty_report_keeps_requested_identity() {
        let entry = aggregate("web", &[]);
        assert_eq!(entry.pod_id, "web");
        assert_eq!(entry.cpu_percent, 0.0);
    }
}
