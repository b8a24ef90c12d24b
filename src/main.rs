// ABOUTME: Entry point for the berth CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod output;

use berth::config::DashboardConfig;
use berth::dashboard::{Compose, ContainerEntity, Dashboard, StatsRecord};
use berth::discovery::{self, Discovery, HostSource};
use berth::error::{Error, Result};
use berth::exec::{CommandRunner, OsCommandRunner};
use berth::runtime::{
    Backend, BackendError, EngineKind, ErrorCode, Feature, FeatureSet, RuntimeInfo,
};
use berth::types::ContainerId;
use chrono::{DateTime, Utc};
use clap::Parser;
use cli::{Cli, Commands};
use output::{Output, OutputMode};
use serde::Serialize;
use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let output = Output::new(if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Normal
    });

    if let Err(e) = run(cli, &output).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    let config = load_config(&cli)?;
    match cli.command {
        Commands::Detect => detect(&config, output).await,
        Commands::Ps { all } => ps(&config, all, output).await,
        Commands::Stats { container, samples } => {
            stats(&config, &container, samples, output).await
        }
        Commands::Features { binary } => {
            let binary = binary.unwrap_or_else(|| config.backend.cli_binary.clone());
            features(&binary, output).await;
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<DashboardConfig> {
    let mut config = match &cli.config {
        Some(path) if !path.exists() => return Err(Error::ConfigNotFound(path.clone())),
        Some(path) => DashboardConfig::load(path)?,
        None => DashboardConfig::discover(&env::current_dir()?)?,
    };
    if let Some(mode) = cli.backend {
        config.backend.mode = Some(mode);
    }
    Ok(config)
}

#[derive(Serialize)]
struct DetectRecord {
    host: String,
    kind: EngineKind,
    source: String,
}

async fn detect(config: &DashboardConfig, output: &Output) -> Result<()> {
    let discovery = Discovery::from_process(&config.discovery);
    let found = discovery::discover_host(&discovery).await?;
    let source = match &found.source {
        HostSource::Override(variable) => variable.to_string(),
        HostSource::Context { name, .. } => format!("context {name}"),
        HostSource::Candidate => "socket search".to_string(),
    };

    output.line(&format!("Host:   {}", found.host));
    output.line(&format!("Engine: {}", found.kind));
    output.line(&format!("Source: {source}"));
    output.record(&DetectRecord {
        host: found.host.to_string(),
        kind: found.kind,
        source,
    });
    Ok(())
}

/// Connect a backend and wrap it with compose interrogation when the
/// backend can run compose projects at all.
async fn open_dashboard(config: &DashboardConfig) -> Result<Dashboard> {
    let backend = Backend::connect(config).await?;
    let runner: Arc<dyn CommandRunner> = Arc::new(OsCommandRunner::new());
    let compose = if backend.supports(Feature::Services) {
        Compose::detect(runner, &config.compose).await
    } else {
        Compose::unavailable(runner)
    };
    tracing::debug!(mode = %backend.mode(), "backend connected");
    Ok(Dashboard::new(Arc::new(backend), compose, config))
}

#[derive(Serialize)]
struct ContainerRecord<'a> {
    id: &'a str,
    name: &'a str,
    image: &'a str,
    state: &'a str,
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pod: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    service: Option<&'a str>,
}

async fn ps(config: &DashboardConfig, all: bool, output: &Output) -> Result<()> {
    let dashboard = open_dashboard(config).await?;
    dashboard.set_show_exited(all);
    let result = print_hierarchy(&dashboard, output).await;
    dashboard.shutdown().await;
    result
}

async fn print_hierarchy(dashboard: &Dashboard, output: &Output) -> Result<()> {
    let hierarchy = dashboard.refresh_containers().await?;
    let containers = dashboard.containers().await;
    let find = |id: &ContainerId| containers.iter().find(|c| c.id() == id);

    output.line(&format!("Backend: {}", dashboard.runtime().mode()));
    for group in &hierarchy.pods {
        output.line(&format!("pod {} ({})", group.pod.name, group.pod.status));
        for entity in group.members.iter().filter_map(|id| find(id)) {
            output.line(&format!("  {}", container_line(entity)));
            output.record(&container_record(entity, Some(&group.pod.name), None));
        }
    }
    for slot in &hierarchy.services {
        output.line(&format!("service {}", slot.name));
        match slot.container.as_ref().and_then(|id| find(id)) {
            Some(entity) => {
                output.line(&format!("  {}", container_line(entity)));
                output.record(&container_record(entity, None, Some(&slot.name)));
            }
            None => output.line("  (no container)"),
        }
    }
    for entity in hierarchy.standalone.iter().filter_map(|id| find(id)) {
        output.line(&container_line(entity));
        output.record(&container_record(entity, None, None));
    }
    Ok(())
}

fn container_line(entity: &ContainerEntity) -> String {
    format!(
        "{:<32} {:<12} {:<10} {}",
        entity.name,
        entity.id().short(),
        entity.summary.state.as_str(),
        entity.summary.status
    )
}

fn container_record<'a>(
    entity: &'a ContainerEntity,
    pod: Option<&'a str>,
    service: Option<&'a str>,
) -> ContainerRecord<'a> {
    ContainerRecord {
        id: entity.id().as_str(),
        name: &entity.name,
        image: &entity.summary.image,
        state: entity.summary.state.as_str(),
        status: &entity.summary.status,
        pod,
        service,
    }
}

#[derive(Serialize)]
struct StatsLine<'a> {
    container: &'a str,
    #[serde(flatten)]
    record: &'a StatsRecord,
}

async fn stats(
    config: &DashboardConfig,
    target: &str,
    samples: usize,
    output: &Output,
) -> Result<()> {
    let dashboard = open_dashboard(config).await?;
    let result = sample_stats(&dashboard, config, target, samples, output).await;
    dashboard.shutdown().await;
    result
}

async fn sample_stats(
    dashboard: &Dashboard,
    config: &DashboardConfig,
    target: &str,
    samples: usize,
    output: &Output,
) -> Result<()> {
    dashboard.refresh_containers().await?;
    let entity = dashboard
        .containers()
        .await
        .into_iter()
        .find(|c| c.name == target || c.id().as_str().starts_with(target))
        .ok_or_else(|| Error::UnknownContainer(target.to_string()))?;
    if !entity.summary.state.is_running() {
        return Err(BackendError::coded(
            ErrorCode::ContainerNotRunning,
            format!("{} is {}", entity.name, entity.summary.state.as_str()),
        )
        .into());
    }

    let id = entity.id().clone();
    // A budget past the clock's range means no deadline.
    let deadline = Instant::now().checked_add(stats_budget(config.stats.poll_interval, samples));
    let mut printed = 0;
    let mut last_seen = None;
    while printed < samples && deadline.is_none_or(|d| Instant::now() < d) {
        let records = dashboard.stats(&id);
        for record in unseen(&records, last_seen).take(samples - printed) {
            output.line(&format!(
                "{}  cpu {:>6.2}%  mem {} / {} ({:.2}%)",
                record.recorded_at.format("%H:%M:%S"),
                record.derived.cpu_percent,
                format_bytes(record.derived.memory_usage),
                format_bytes(record.derived.memory_limit),
                record.derived.memory_percent
            ));
            output.record(&StatsLine {
                container: id.as_str(),
                record,
            });
            last_seen = Some(record.recorded_at);
            printed += 1;
        }
        if printed < samples && !dashboard.is_monitoring(&id) {
            tracing::warn!(container = %id, "stats monitor stopped after {} samples", printed);
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Ok(())
}

/// Time to wait for `samples` polls, plus slack for the first one.
fn stats_budget(poll_interval: Duration, samples: usize) -> Duration {
    let polls = u32::try_from(samples).unwrap_or(u32::MAX).saturating_add(2);
    poll_interval
        .saturating_mul(polls)
        .saturating_add(Duration::from_secs(10))
}

/// Records newer than the last one printed. History prunes from the
/// front, so positions are not stable between reads.
fn unseen(
    records: &[StatsRecord],
    last_seen: Option<DateTime<Utc>>,
) -> impl Iterator<Item = &StatsRecord> {
    records
        .iter()
        .filter(move |r| last_seen.is_none_or(|last| r.recorded_at > last))
}

#[derive(Serialize)]
struct FeatureRecord {
    feature: &'static str,
    supported: bool,
}

async fn features(binary: &str, output: &Output) {
    let features = FeatureSet::probe(&OsCommandRunner::new(), binary).await;
    output.line(&format!("Features of `{binary}`:"));
    for feature in Feature::ALL {
        let supported = features.supports(feature);
        output.line(&format!(
            "  {:<20} {}",
            feature.as_str(),
            if supported { "yes" } else { "no" }
        ));
        output.record(&FeatureRecord {
            feature: feature.as_str(),
            supported,
        });
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use berth::model::StatsEntry;

    fn record(secs: i64) -> StatsRecord {
        let at = DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap();
        StatsRecord {
            recorded_at: at,
            raw: StatsEntry::new(at),
            derived: Default::default(),
        }
    }

    #[test]
    fn budget_saturates_instead_of_wrapping() {
        assert_eq!(
            stats_budget(Duration::from_secs(1), 3),
            Duration::from_secs(15)
        );
        assert_eq!(
            stats_budget(Duration::from_secs(1), usize::MAX),
            Duration::from_secs(u64::from(u32::MAX) + 10)
        );
        assert_eq!(stats_budget(Duration::MAX, 1), Duration::MAX);
    }

    #[test]
    fn pruned_history_does_not_hide_new_records() {
        let first = vec![record(0), record(1), record(2)];
        let last = unseen(&first, None).last().map(|r| r.recorded_at);
        assert_eq!(last, Some(record(2).recorded_at));

        // Two old records were pruned and two new ones arrived.
        let second = vec![record(2), record(3), record(4)];
        let fresh: Vec<i64> = unseen(&second, last)
            .map(|r| r.recorded_at.timestamp() - 1_700_000_000)
            .collect();
        assert_eq!(fresh, vec![3, 4]);
    }
}
