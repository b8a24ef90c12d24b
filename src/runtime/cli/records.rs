// ABOUTME: Tolerant parsing of the container CLI's JSON listings into the unified model.
// ABOUTME: Malformed or id-less records are dropped with a log line; only unreadable output fails.

use crate::model::{
    ContainerConfigDetails, ContainerDetails, ContainerState, ContainerStateDetails,
    ContainerSummary, CpuStats, EndpointInfo, Event, EventActor, ImageDetails, ImageHistoryEntry,
    ImageSummary, MemoryStats, Mount, NetworkIo, NetworkSettings, NetworkSummary, StatsEntry,
    VolumeSummary,
};
use crate::runtime::BackendError;
use crate::runtime::json::timestamp;
use crate::types::{ContainerId, ImageId, ImageRef, NetworkId};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;

type Object = Map<String, Value>;

/// Split output into JSON records. Blank output is an empty listing; a single
/// object counts as a one-element listing.
fn records(what: &str, output: &str) -> Result<Vec<Value>, BackendError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(Value::Null) => Ok(Vec::new()),
        Ok(other @ Value::Object(_)) => Ok(vec![other]),
        Ok(other) => Err(BackendError::parse(
            what,
            format!("expected a JSON array, got {}", kind_of(&other)),
        )),
        Err(e) => Err(BackendError::parse(what, e)),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn str_field<'a>(obj: &'a Object, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn string(obj: &Object, key: &str) -> String {
    str_field(obj, key).unwrap_or_default().to_string()
}

fn object<'a>(obj: &'a Object, key: &str) -> Option<&'a Object> {
    obj.get(key).and_then(Value::as_object)
}

fn u64_field(obj: &Object, key: &str) -> u64 {
    obj.get(key)
        .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f.max(0.0) as u64)))
        .unwrap_or(0)
}

fn string_map(obj: &Object, key: &str) -> HashMap<String, String> {
    object(obj, key)
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

fn string_list(obj: &Object, key: &str) -> Vec<String> {
    obj.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Address of a container, wherever this CLI version puts it.
fn address(obj: &Object) -> Option<String> {
    str_field(obj, "addr")
        .or_else(|| object(obj, "network").and_then(|n| str_field(n, "addr")))
        .or_else(|| str_field(obj, "ip"))
        .or_else(|| {
            obj.get("networks")
                .and_then(Value::as_array)
                .and_then(|nets| nets.first())
                .and_then(Value::as_object)
                .and_then(|n| str_field(n, "address"))
        })
        .map(|a| a.split('/').next().unwrap_or(a).to_string())
}

fn container_state(obj: &Object) -> ContainerState {
    ContainerState::parse(str_field(obj, "status").unwrap_or_default())
}

// =============================================================================
// Containers
// =============================================================================

pub(super) fn parse_containers(output: &str) -> Result<Vec<ContainerSummary>, BackendError> {
    let items = records("container list", output)?;
    Ok(items.iter().filter_map(container_summary).collect())
}

fn container_summary(value: &Value) -> Option<ContainerSummary> {
    let Some(obj) = value.as_object() else {
        tracing::warn!("skipping container record that is not an object");
        return None;
    };
    let Some(config) = object(obj, "configuration") else {
        tracing::warn!("skipping container record without configuration");
        return None;
    };
    let Some(id) = str_field(config, "id") else {
        tracing::warn!("skipping container record without an ID");
        return None;
    };

    let image = object(config, "image")
        .map(|i| string(i, "reference"))
        .unwrap_or_default();
    let command = object(config, "initProcess")
        .map(|p| {
            let mut parts = vec![string(p, "executable")];
            parts.extend(string_list(p, "arguments"));
            parts.retain(|s| !s.is_empty());
            parts.join(" ")
        })
        .unwrap_or_default();

    Some(ContainerSummary {
        names: vec![id.to_string()],
        image,
        command,
        created: obj.get("created").and_then(timestamp),
        state: container_state(obj),
        status: string(obj, "status"),
        labels: string_map(config, "labels"),
        ..ContainerSummary::new(ContainerId::new(id))
    })
}

/// `container inspect <id>` prints a one-element array.
pub(super) fn parse_inspect(id: &ContainerId, output: &str) -> Result<ContainerDetails, BackendError> {
    let items = records("container inspect", output)?;
    let Some(obj) = items.first().and_then(Value::as_object) else {
        return Err(BackendError::NotFound {
            kind: "container",
            id: id.to_string(),
        });
    };
    let config = object(obj, "configuration").cloned().unwrap_or_default();
    let process = object(&config, "initProcess").cloned().unwrap_or_default();
    let state = container_state(obj);

    let mut networks = HashMap::new();
    if let Some(addr) = address(obj) {
        networks.insert(
            "default".to_string(),
            EndpointInfo {
                ip_address: addr,
                ..Default::default()
            },
        );
    }

    let mounts = config
        .get("mounts")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_object).map(mount).collect())
        .unwrap_or_default();

    let mut executable = vec![string(&process, "executable")];
    executable.retain(|s| !s.is_empty());

    Ok(ContainerDetails {
        name: str_field(&config, "id").unwrap_or(id.as_str()).to_string(),
        image: object(&config, "image")
            .map(|i| string(i, "reference"))
            .unwrap_or_default(),
        state: ContainerStateDetails {
            status: state,
            running: state == ContainerState::Running,
            ..Default::default()
        },
        config: ContainerConfigDetails {
            hostname: string(&config, "hostname"),
            user: object(&process, "user")
                .and_then(|u| object(u, "id"))
                .map(|u| u64_field(u, "uid").to_string())
                .unwrap_or_default(),
            env: string_list(&process, "environment"),
            cmd: string_list(&process, "arguments"),
            entrypoint: executable,
            image: object(&config, "image")
                .map(|i| string(i, "reference"))
                .unwrap_or_default(),
            working_dir: string(&process, "workingDirectory"),
            labels: string_map(&config, "labels"),
            tty: process.get("terminal").and_then(Value::as_bool).unwrap_or(false),
        },
        network_settings: NetworkSettings {
            networks,
            ports: Vec::new(),
        },
        mounts,
        ..ContainerDetails::new(id.clone())
    })
}

fn mount(obj: &Object) -> Mount {
    let kind = match object(obj, "type") {
        Some(t) if t.contains_key("virtiofs") => "virtiofs",
        Some(t) if t.contains_key("tmpfs") => "tmpfs",
        Some(t) if t.contains_key("volume") => "volume",
        _ => "unknown",
    };
    let options: Vec<String> = obj
        .get("options")
        .and_then(Value::as_array)
        .map(|opts| {
            opts.iter()
                .map(|o| match o {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    Mount {
        kind: kind.to_string(),
        name: None,
        source: string(obj, "source"),
        destination: string(obj, "destination"),
        driver: None,
        read_write: !options.iter().any(|o| o == "ro"),
        mode: options.join(","),
    }
}

// =============================================================================
// Images
// =============================================================================

pub(super) fn parse_images(output: &str) -> Result<Vec<ImageSummary>, BackendError> {
    let items = records("image list", output)?;
    Ok(items.iter().filter_map(image_summary).collect())
}

fn image_summary(value: &Value) -> Option<ImageSummary> {
    let obj = value.as_object()?;
    let Some(reference) = str_field(obj, "reference") else {
        tracing::warn!("skipping image record without a reference");
        return None;
    };
    let descriptor = object(obj, "descriptor");
    let mut digest = descriptor
        .and_then(|d| str_field(d, "digest"))
        .map(str::to_string);
    let size = descriptor.map(|d| u64_field(d, "size")).unwrap_or(0);

    if digest.is_none() {
        digest = ImageRef::parse(reference)
            .ok()
            .and_then(|r| r.digest().map(str::to_string));
    }
    let id = digest.clone().unwrap_or_else(|| reference.to_string());

    Some(ImageSummary {
        repo_tags: vec![reference.to_string()],
        repo_digests: digest.into_iter().collect(),
        size: i64::try_from(size).unwrap_or(i64::MAX),
        ..ImageSummary::new(ImageId::new(id))
    })
}

pub(super) fn parse_image_details(id: &ImageId, output: &str) -> Result<ImageDetails, BackendError> {
    let items = records("image inspect", output)?;
    let Some(obj) = items.first().and_then(Value::as_object) else {
        return Err(BackendError::NotFound {
            kind: "image",
            id: id.to_string(),
        });
    };
    let summary = image_summary(&Value::Object(obj.clone()));
    let config = obj
        .get("variants")
        .and_then(Value::as_array)
        .and_then(|v| v.first())
        .and_then(Value::as_object)
        .and_then(|v| object(v, "config"))
        .and_then(|c| object(c, "config"))
        .cloned()
        .unwrap_or_default();

    Ok(ImageDetails {
        repo_tags: summary
            .as_ref()
            .map(|s| s.repo_tags.clone())
            .unwrap_or_default(),
        repo_digests: summary
            .as_ref()
            .map(|s| s.repo_digests.clone())
            .unwrap_or_default(),
        size: summary.as_ref().map(|s| s.size).unwrap_or(0),
        env: string_list(&config, "Env"),
        cmd: string_list(&config, "Cmd"),
        labels: string_map(&config, "Labels"),
        ..ImageDetails::new(id.clone())
    })
}

pub(super) fn parse_history(output: &str) -> Result<Vec<ImageHistoryEntry>, BackendError> {
    let items = records("image history", output)?;
    Ok(items
        .iter()
        .filter_map(Value::as_object)
        .map(|obj| ImageHistoryEntry {
            id: str_field(obj, "id")
                .or_else(|| str_field(obj, "digest"))
                .unwrap_or("<missing>")
                .to_string(),
            created: obj.get("created").and_then(timestamp),
            created_by: str_field(obj, "createdBy")
                .or_else(|| str_field(obj, "created_by"))
                .unwrap_or_default()
                .to_string(),
            tags: string_list(obj, "tags"),
            size: i64::try_from(u64_field(obj, "size")).unwrap_or(i64::MAX),
            comment: string(obj, "comment"),
        })
        .collect())
}

// =============================================================================
// Volumes and networks
// =============================================================================

pub(super) fn parse_volumes(output: &str) -> Result<Vec<VolumeSummary>, BackendError> {
    let items = records("volume list", output)?;
    Ok(items.iter().filter_map(volume_summary).collect())
}

pub(super) fn volume_summary(value: &Value) -> Option<VolumeSummary> {
    let obj = value.as_object()?;
    let Some(name) = str_field(obj, "name").or_else(|| str_field(obj, "id")) else {
        tracing::warn!("skipping volume record without a name");
        return None;
    };
    Some(VolumeSummary {
        name: name.to_string(),
        driver: str_field(obj, "driver").unwrap_or("local").to_string(),
        mountpoint: string(obj, "mountpoint"),
        scope: Some("local".to_string()),
        created_at: obj
            .get("createdAt")
            .and_then(timestamp)
            .map(|t| t.to_rfc3339()),
        labels: string_map(obj, "labels"),
        options: string_map(obj, "options"),
    })
}

pub(super) fn parse_networks(output: &str) -> Result<Vec<NetworkSummary>, BackendError> {
    let items = records("network list", output)?;
    Ok(items.iter().filter_map(network_summary).collect())
}

fn network_summary(value: &Value) -> Option<NetworkSummary> {
    let obj = value.as_object()?;
    let Some(id) = str_field(obj, "id") else {
        tracing::warn!("skipping network record without an ID");
        return None;
    };
    let driver = object(obj, "config")
        .map(|c| string(c, "mode"))
        .unwrap_or_default();
    tracing::debug!(id, state = str_field(obj, "state"), "parsed network");

    Some(NetworkSummary {
        name: id.to_string(),
        driver,
        scope: Some("local".to_string()),
        labels: object(obj, "config")
            .map(|c| string_map(c, "labels"))
            .unwrap_or_default(),
        ..NetworkSummary::new(NetworkId::new(id))
    })
}

// =============================================================================
// Stats and events
// =============================================================================

/// One stats record. CPU time arrives in microseconds; wall-clock nanoseconds
/// stand in for the system counter so the usual delta ratio gives per-core
/// percent.
pub(super) fn parse_stats(output: &str) -> Result<Option<StatsEntry>, BackendError> {
    let items = records("stats", output)?;
    let Some(obj) = items.first().and_then(Value::as_object) else {
        return Ok(None);
    };
    let now = Utc::now();
    let wall_nanos = now
        .timestamp_nanos_opt()
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or(0);

    let mut networks = HashMap::new();
    let rx = u64_field(obj, "networkRxBytes");
    let tx = u64_field(obj, "networkTxBytes");
    if rx > 0 || tx > 0 {
        networks.insert(
            "total".to_string(),
            NetworkIo {
                rx_bytes: rx,
                tx_bytes: tx,
            },
        );
    }

    Ok(Some(StatsEntry {
        cpu: CpuStats {
            total_usage: u64_field(obj, "cpuUsageUsec").saturating_mul(1000),
            system_usage: wall_nanos,
            online_cpus: 0,
        },
        memory: MemoryStats {
            usage: u64_field(obj, "memoryUsageBytes"),
            limit: u64_field(obj, "memoryLimitBytes"),
            cache: 0,
        },
        pids: u64_field(obj, "numProcesses"),
        networks,
        block_read: u64_field(obj, "blockReadBytes"),
        block_write: u64_field(obj, "blockWriteBytes"),
        ..StatsEntry::new(now)
    }))
}

/// One line of `events --format json`. Unreadable lines yield `None`.
pub(super) fn parse_event(line: &str) -> Option<Event> {
    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!("skipping unreadable event line: {}", e);
            return None;
        }
    };
    let obj = value.as_object()?;
    let actor = object(obj, "actor");
    Some(Event {
        kind: str_field(obj, "type").unwrap_or("container").to_string(),
        action: str_field(obj, "action")
            .or_else(|| str_field(obj, "status"))
            .unwrap_or_default()
            .to_string(),
        actor: EventActor {
            id: actor
                .and_then(|a| str_field(a, "id"))
                .or_else(|| str_field(obj, "id"))
                .unwrap_or_default()
                .to_string(),
            attributes: actor
                .map(|a| string_map(a, "attributes"))
                .unwrap_or_default(),
        },
        time: obj.get("time").and_then(timestamp),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_without_id_is_dropped() {
        let parsed = parse_containers(r#"[{"status":"running"}]"#).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn blank_output_is_empty_listing() {
        assert!(parse_containers("  \n").unwrap().is_empty());
        assert!(parse_images("").unwrap().is_empty());
    }

    #[test]
    fn unreadable_output_is_parse_error() {
        let err = parse_containers("not json").unwrap_err();
        assert!(matches!(err, BackendError::Parse { .. }));
    }

    #[test]
    fn container_fields_are_translated() {
        let output = r#"[
            {"status":"stopped","configuration":{"id":"web","image":{"reference":"docker.io/library/nginx:latest"},
             "labels":{"tier":"front"},"initProcess":{"executable":"/docker-entrypoint.sh","arguments":["nginx"]}}},
            {"status":"running","configuration":{"id":"db"},"networks":[{"address":"192.168.64.3/24"}]},
            "garbage"
        ]"#;
        let parsed = parse_containers(output).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].id.as_str(), "web");
        assert_eq!(parsed[0].state, ContainerState::Exited);
        assert_eq!(parsed[0].image, "docker.io/library/nginx:latest");
        assert_eq!(parsed[0].command, "/docker-entrypoint.sh nginx");
        assert_eq!(parsed[0].label("tier"), Some("front"));
        assert_eq!(parsed[1].state, ContainerState::Running);
    }

    #[test]
    fn image_id_prefers_digest_then_reference() {
        let output = r#"[
            {"reference":"nginx:1.25","descriptor":{"digest":"sha256:abc","size":1024}},
            {"reference":"alpine:3"},
            {"descriptor":{"digest":"sha256:orphan"}}
        ]"#;
        let parsed = parse_images(output).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].id.as_str(), "sha256:abc");
        assert_eq!(parsed[0].size, 1024);
        assert_eq!(parsed[1].id.as_str(), "alpine:3");
    }

    #[test]
    fn volume_falls_back_to_id_and_local_driver() {
        let parsed = parse_volumes(r#"[{"id":"data","labels":{"a":"b"}},{"driver":"x"}]"#).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "data");
        assert_eq!(parsed[0].driver, "local");
        assert_eq!(parsed[0].labels["a"], "b");
    }

    #[test]
    fn network_uses_mode_as_driver() {
        let parsed =
            parse_networks(r#"[{"id":"default","state":"running","config":{"mode":"nat"}},{}]"#)
                .unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].driver, "nat");
    }

    #[test]
    fn inspect_collects_mounts_and_address() {
        let output = r#"[{"status":"running","networks":[{"address":"192.168.64.5/24"}],
            "configuration":{"id":"web","mounts":[
                {"source":"/Users/me/src","destination":"/src","options":["ro"],"type":{"virtiofs":{}}},
                {"destination":"/tmp","type":{"tmpfs":{}}}
            ]}}]"#;
        let details = parse_inspect(&ContainerId::new("web"), output).unwrap();
        assert!(details.state.running);
        assert_eq!(details.mounts.len(), 2);
        assert_eq!(details.mounts[0].kind, "virtiofs");
        assert!(!details.mounts[0].read_write);
        assert_eq!(details.mounts[1].kind, "tmpfs");
        assert_eq!(details.network_settings.networks["default"].ip_address, "192.168.64.5");
    }

    #[test]
    fn inspect_of_empty_array_is_not_found() {
        let err = parse_inspect(&ContainerId::new("gone"), "[]").unwrap_err();
        assert!(matches!(err, BackendError::NotFound { .. }));
    }

    #[test]
    fn stats_scale_cpu_to_nanoseconds() {
        let entry = parse_stats(r#"[{"id":"web","cpuUsageUsec":5,"memoryUsageBytes":10,"memoryLimitBytes":100,"numProcesses":3}]"#)
            .unwrap()
            .unwrap();
        assert_eq!(entry.cpu.total_usage, 5000);
        assert_eq!(entry.memory.limit, 100);
        assert_eq!(entry.pids, 3);
    }
}
