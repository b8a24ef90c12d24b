// ABOUTME: CLI-driven backend shelling out to Apple's `container` tool with JSON output.
// ABOUTME: Operations the probe did not find fail with NotSupported instead of being attempted.

use super::features::{Feature, FeatureSet};
use super::records;
use crate::exec::{CommandLine, CommandRunner, ExecError};
use crate::model::{
    ContainerDetails, ContainerSummary, Event, ImageDetails, ImageHistoryEntry, ImageSummary,
    LogLine, LogOptions, LogStream, NetworkSummary, PodStatsEntry, PodSummary, PruneReport,
    RemoveOptions, StatsEntry, TopResponse, VolumeSummary,
};
use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{
    BackendStream, ContainerOps, EventOps, ImageOps, LogOps, NetworkOps, PodOps, RuntimeInfo,
    StatsMode, StatsOps, VolumeOps,
};
use crate::runtime::{BackendError, BackendMode, ErrorCode, error::must_stop_message};
use crate::types::{ContainerId, ImageId, NetworkId, PodId};
use async_trait::async_trait;
use futures::StreamExt;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const BACKEND: &str = "cli";

/// Default binary name of the tool.
pub const DEFAULT_CLI_BINARY: &str = "container";

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_exec_error(e: ExecError) -> BackendError {
    match e {
        ExecError::Spawn { command, source } => BackendError::Connection {
            endpoint: command,
            reason: source.to_string(),
        },
        other => BackendError::Command(other),
    }
}

fn map_not_found_error(e: ExecError, kind: &'static str, id: &str) -> BackendError {
    match e {
        ExecError::Failed { ref stderr, .. } if stderr.to_ascii_lowercase().contains("not found") => {
            BackendError::NotFound {
                kind,
                id: id.to_string(),
            }
        }
        _ => map_exec_error(e),
    }
}

fn map_state_change_error(e: ExecError, id: &ContainerId) -> BackendError {
    match e {
        ExecError::Failed { ref stderr, .. } if stderr.to_ascii_lowercase().contains("already") => {
            BackendError::coded(ErrorCode::AlreadyInState, stderr.clone())
        }
        _ => map_not_found_error(e, "container", id.as_str()),
    }
}

fn map_container_remove_error(e: ExecError, id: &ContainerId) -> BackendError {
    match e {
        ExecError::Failed { ref stderr, .. } if must_stop_message(stderr) => {
            BackendError::coded(ErrorCode::MustStopContainer, stderr.clone())
        }
        _ => map_not_found_error(e, "container", id.as_str()),
    }
}

fn map_top_error(e: ExecError, id: &ContainerId) -> BackendError {
    match e {
        ExecError::Failed { ref stderr, .. }
            if stderr.to_ascii_lowercase().contains("not running") =>
        {
            BackendError::coded(ErrorCode::ContainerNotRunning, stderr.clone())
        }
        _ => map_not_found_error(e, "container", id.as_str()),
    }
}

/// Prune commands print one removed name per line.
fn prune_report(output: &str) -> PruneReport {
    PruneReport {
        deleted: output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect(),
        space_reclaimed: 0,
    }
}

// =============================================================================
// CliRuntime
// =============================================================================

/// Backend that drives the `container` command line tool.
pub struct CliRuntime {
    runner: Arc<dyn CommandRunner>,
    binary: String,
    features: FeatureSet,
}

impl fmt::Debug for CliRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CliRuntime")
            .field("binary", &self.binary)
            .field("features", &self.features)
            .finish_non_exhaustive()
    }
}

impl CliRuntime {
    /// Probe the tool's capabilities, then make sure it answers.
    pub async fn connect(
        runner: Arc<dyn CommandRunner>,
        binary: impl Into<String>,
    ) -> Result<Self, BackendError> {
        let binary = binary.into();
        let features = FeatureSet::probe(runner.as_ref(), &binary).await;
        let runtime = Self::with_features(runner, binary, features);
        runtime.ping().await?;
        tracing::info!(binary = %runtime.binary, "using CLI runtime");
        Ok(runtime)
    }

    /// Build without probing or pinging.
    pub fn with_features(
        runner: Arc<dyn CommandRunner>,
        binary: impl Into<String>,
        features: FeatureSet,
    ) -> Self {
        Self {
            runner,
            binary: binary.into(),
            features,
        }
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    fn command(&self) -> CommandLine {
        CommandLine::new(&self.binary)
    }

    fn require(&self, feature: Feature, operation: &'static str) -> Result<(), BackendError> {
        if self.features.supports(feature) {
            Ok(())
        } else {
            Err(BackendError::not_supported(operation, BACKEND))
        }
    }

    async fn run(&self, command: CommandLine) -> Result<String, ExecError> {
        self.runner.run(&command).await
    }
}

impl Sealed for CliRuntime {}

// =============================================================================
// ContainerOps
// =============================================================================

#[async_trait]
impl ContainerOps for CliRuntime {
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, BackendError> {
        let output = self
            .run(self.command().args(["ls", "--all", "--format", "json"]))
            .await
            .map_err(map_exec_error)?;
        records::parse_containers(&output)
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerDetails, BackendError> {
        let output = self
            .run(self.command().args(["inspect", id.as_str()]))
            .await
            .map_err(|e| map_not_found_error(e, "container", id.as_str()))?;
        records::parse_inspect(id, &output)
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), BackendError> {
        self.run(self.command().args(["start", id.as_str()]))
            .await
            .map_err(|e| map_state_change_error(e, id))?;
        Ok(())
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Option<Duration>,
    ) -> Result<(), BackendError> {
        let mut command = self.command().arg("stop");
        if let Some(timeout) = timeout {
            command = command.args(["--time".to_string(), timeout.as_secs().to_string()]);
        }
        self.run(command.arg(id.as_str()))
            .await
            .map_err(|e| map_state_change_error(e, id))?;
        Ok(())
    }

    async fn pause_container(&self, id: &ContainerId) -> Result<(), BackendError> {
        self.require(Feature::ContainerPause, "pause_container")?;
        self.run(self.command().args(["pause", id.as_str()]))
            .await
            .map_err(|e| map_state_change_error(e, id))?;
        Ok(())
    }

    async fn unpause_container(&self, id: &ContainerId) -> Result<(), BackendError> {
        self.require(Feature::ContainerPause, "unpause_container")?;
        self.run(self.command().args(["unpause", id.as_str()]))
            .await
            .map_err(|e| map_state_change_error(e, id))?;
        Ok(())
    }

    async fn restart_container(
        &self,
        id: &ContainerId,
        timeout: Option<Duration>,
    ) -> Result<(), BackendError> {
        // No restart subcommand.
        match self.stop_container(id, timeout).await {
            Ok(()) => {}
            Err(e) if e.code() == Some(ErrorCode::AlreadyInState) => {
                tracing::debug!(id = %id, "container already stopped before restart");
            }
            Err(e) => return Err(e),
        }
        self.start_container(id).await
    }

    async fn remove_container(
        &self,
        id: &ContainerId,
        options: RemoveOptions,
    ) -> Result<(), BackendError> {
        let mut command = self.command().arg("rm");
        if options.force {
            command = command.arg("--force");
        }
        self.run(command.arg(id.as_str()))
            .await
            .map_err(|e| map_container_remove_error(e, id))?;
        Ok(())
    }

    async fn top_container(&self, id: &ContainerId) -> Result<TopResponse, BackendError> {
        self.require(Feature::ContainerTop, "top_container")?;
        let output = self
            .run(self.command().args(["top", id.as_str()]))
            .await
            .map_err(|e| map_top_error(e, id))?;
        Ok(TopResponse::from_table(&output))
    }

    async fn prune_containers(&self) -> Result<PruneReport, BackendError> {
        self.require(Feature::ContainerPrune, "prune_containers")?;
        let output = self
            .run(self.command().args(["container", "prune"]))
            .await
            .map_err(map_exec_error)?;
        Ok(prune_report(&output))
    }
}

// =============================================================================
// ImageOps
// =============================================================================

#[async_trait]
impl ImageOps for CliRuntime {
    async fn list_images(&self) -> Result<Vec<ImageSummary>, BackendError> {
        let output = self
            .run(self.command().args(["images", "list", "--format", "json"]))
            .await
            .map_err(map_exec_error)?;
        records::parse_images(&output)
    }

    async fn inspect_image(&self, id: &ImageId) -> Result<ImageDetails, BackendError> {
        let output = self
            .run(self.command().args(["images", "inspect", id.as_str()]))
            .await
            .map_err(|e| map_not_found_error(e, "image", id.as_str()))?;
        records::parse_image_details(id, &output)
    }

    async fn image_history(&self, id: &ImageId) -> Result<Vec<ImageHistoryEntry>, BackendError> {
        self.require(Feature::ImageHistory, "image_history")?;
        let output = self
            .run(
                self.command()
                    .args(["images", "history", "--format", "json", id.as_str()]),
            )
            .await
            .map_err(|e| map_not_found_error(e, "image", id.as_str()))?;
        records::parse_history(&output)
    }

    async fn remove_image(&self, id: &ImageId, force: bool) -> Result<(), BackendError> {
        self.require(Feature::ImageRemove, "remove_image")?;
        let mut command = self.command().args(["images", "rm"]);
        if force {
            command = command.arg("--force");
        }
        self.run(command.arg(id.as_str()))
            .await
            .map_err(|e| map_not_found_error(e, "image", id.as_str()))?;
        Ok(())
    }

    async fn prune_images(&self) -> Result<PruneReport, BackendError> {
        self.require(Feature::ImagePrune, "prune_images")?;
        let output = self
            .run(self.command().args(["images", "prune"]))
            .await
            .map_err(map_exec_error)?;
        Ok(prune_report(&output))
    }
}

// =============================================================================
// VolumeOps / NetworkOps
// =============================================================================

#[async_trait]
impl VolumeOps for CliRuntime {
    async fn list_volumes(&self) -> Result<Vec<VolumeSummary>, BackendError> {
        let output = self
            .run(self.command().args(["volume", "list", "--format", "json"]))
            .await
            .map_err(map_exec_error)?;
        records::parse_volumes(&output)
    }

    async fn create_volume(&self, name: &str) -> Result<VolumeSummary, BackendError> {
        self.require(Feature::VolumeCreate, "create_volume")?;
        self.run(self.command().args(["volume", "create", "--name", name]))
            .await
            .map_err(map_exec_error)?;

        let created = self
            .list_volumes()
            .await?
            .into_iter()
            .find(|v| v.name == name);
        Ok(created.unwrap_or_else(|| VolumeSummary {
            name: name.to_string(),
            driver: "local".to_string(),
            scope: Some("local".to_string()),
            ..Default::default()
        }))
    }

    async fn remove_volume(&self, name: &str, force: bool) -> Result<(), BackendError> {
        let mut command = self.command().args(["volume", "rm"]);
        if force {
            command = command.arg("--force");
        }
        self.run(command.arg(name))
            .await
            .map_err(|e| map_not_found_error(e, "volume", name))?;
        Ok(())
    }

    async fn prune_volumes(&self) -> Result<PruneReport, BackendError> {
        self.require(Feature::VolumePrune, "prune_volumes")?;
        let output = self
            .run(self.command().args(["volume", "prune", "--force"]))
            .await
            .map_err(map_exec_error)?;
        Ok(prune_report(&output))
    }
}

#[async_trait]
impl NetworkOps for CliRuntime {
    async fn list_networks(&self) -> Result<Vec<NetworkSummary>, BackendError> {
        let output = self
            .run(self.command().args(["network", "list", "--format", "json"]))
            .await
            .map_err(map_exec_error)?;
        records::parse_networks(&output)
    }

    async fn remove_network(&self, id: &NetworkId) -> Result<(), BackendError> {
        self.run(self.command().args(["network", "rm", id.as_str()]))
            .await
            .map_err(|e| map_not_found_error(e, "network", id.as_str()))?;
        Ok(())
    }

    async fn prune_networks(&self) -> Result<PruneReport, BackendError> {
        self.require(Feature::NetworkPrune, "prune_networks")?;
        let output = self
            .run(self.command().args(["network", "prune"]))
            .await
            .map_err(map_exec_error)?;
        Ok(prune_report(&output))
    }
}

// =============================================================================
// Pods, stats, events, logs
// =============================================================================

#[async_trait]
impl PodOps for CliRuntime {
    async fn list_pods(&self) -> Result<Vec<PodSummary>, BackendError> {
        Err(BackendError::not_supported("list_pods", BACKEND))
    }

    async fn pod_stats(
        &self,
        _id: &PodId,
        _mode: StatsMode,
        _cancel: CancellationToken,
    ) -> Result<BackendStream<PodStatsEntry>, BackendError> {
        Err(BackendError::not_supported("pod_stats", BACKEND))
    }
}

#[async_trait]
impl StatsOps for CliRuntime {
    /// One sample per call; callers poll for continuous readings.
    async fn container_stats(
        &self,
        id: &ContainerId,
        mode: StatsMode,
        _cancel: CancellationToken,
    ) -> Result<BackendStream<StatsEntry>, BackendError> {
        self.require(Feature::Stats, "container_stats")?;
        if mode == StatsMode::Continuous {
            return Err(BackendError::not_supported("continuous container_stats", BACKEND));
        }
        let output = self
            .run(
                self.command()
                    .args(["stats", "--no-stream", "--format", "json", id.as_str()]),
            )
            .await
            .map_err(|e| map_not_found_error(e, "container", id.as_str()))?;
        let entry = records::parse_stats(&output)?;
        Ok(Box::pin(futures::stream::iter(entry.map(Ok))))
    }
}

#[async_trait]
impl EventOps for CliRuntime {
    async fn events(&self, cancel: CancellationToken) -> Result<BackendStream<Event>, BackendError> {
        self.require(Feature::EventsStream, "events")?;
        let lines = self
            .runner
            .lines(&self.command().args(["events", "--format", "json"]), cancel)
            .await
            .map_err(map_exec_error)?;
        let events = lines.filter_map(|line| async move {
            match line {
                Ok(line) => records::parse_event(&line).map(Ok),
                Err(e) => Some(Err(map_exec_error(e))),
            }
        });
        Ok(Box::pin(events))
    }
}

#[async_trait]
impl LogOps for CliRuntime {
    async fn container_logs(
        &self,
        id: &ContainerId,
        options: &LogOptions,
        cancel: CancellationToken,
    ) -> Result<BackendStream<LogLine>, BackendError> {
        let mut command = self.command().arg("logs");
        if options.follow {
            command = command.arg("--follow");
        }
        if let Some(tail) = options.tail {
            command = command.args(["-n".to_string(), tail.to_string()]);
        }
        let lines = self
            .runner
            .lines(&command.arg(id.as_str()), cancel)
            .await
            .map_err(map_exec_error)?;
        Ok(Box::pin(lines.map(|line| {
            line.map(|content| LogLine {
                stream: LogStream::Stdout,
                content,
            })
            .map_err(map_exec_error)
        })))
    }
}

#[async_trait]
impl RuntimeInfo for CliRuntime {
    fn mode(&self) -> BackendMode {
        BackendMode::Cli
    }

    fn supports(&self, feature: Feature) -> bool {
        self.features.supports(feature)
    }

    async fn ping(&self) -> Result<(), BackendError> {
        self.run(self.command().args(["system", "status", "--format", "json"]))
            .await
            .map_err(|e| match e {
                ExecError::Failed { command, stderr, .. } => BackendError::Connection {
                    endpoint: command,
                    reason: stderr,
                },
                other => map_exec_error(other),
            })?;
        Ok(())
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{CommandOutput, LineStream};
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Answers commands from a table keyed by the full command line.
    #[derive(Default)]
    struct ScriptedRunner {
        answers: HashMap<String, CommandOutput>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        fn answer(mut self, command: &str, status: i32, stdout: &str, stderr: &str) -> Self {
            self.answers.insert(
                command.to_string(),
                CommandOutput {
                    status: Some(status),
                    stdout: stdout.to_string(),
                    stderr: stderr.to_string(),
                },
            );
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn output(&self, command: &CommandLine) -> Result<CommandOutput, ExecError> {
            let key = command.to_string();
            self.calls.lock().push(key.clone());
            self.answers.get(&key).cloned().ok_or_else(|| ExecError::Spawn {
                command: key,
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        }

        async fn lines(
            &self,
            command: &CommandLine,
            _cancel: CancellationToken,
        ) -> Result<LineStream, ExecError> {
            let output = self.output(command).await?;
            let lines: Vec<Result<String, ExecError>> =
                output.stdout.lines().map(|l| Ok(l.to_string())).collect();
            Ok(Box::pin(futures::stream::iter(lines)))
        }
    }

    fn runtime(runner: ScriptedRunner, features: FeatureSet) -> (Arc<ScriptedRunner>, CliRuntime) {
        let runner = Arc::new(runner);
        let runtime = CliRuntime::with_features(runner.clone(), "container", features);
        (runner, runtime)
    }

    #[tokio::test]
    async fn unsupported_operation_is_not_attempted() {
        let (runner, runtime) = runtime(ScriptedRunner::default(), FeatureSet::default());
        let err = runtime.top_container(&ContainerId::new("web")).await.unwrap_err();
        assert!(err.is_not_supported());
        assert!(err.to_string().contains("top_container"));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn restart_is_stop_then_start() {
        let runner = ScriptedRunner::default()
            .answer("container stop --time 5 web", 0, "web\n", "")
            .answer("container start web", 0, "web\n", "");
        let (runner, runtime) = runtime(runner, FeatureSet::all());
        runtime
            .restart_container(&ContainerId::new("web"), Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(
            runner.calls(),
            vec!["container stop --time 5 web", "container start web"]
        );
    }

    #[tokio::test]
    async fn running_container_removal_is_coded() {
        let runner = ScriptedRunner::default().answer(
            "container rm web",
            1,
            "",
            "Error: container is running. Stop the container before attempting removal or force remove",
        );
        let (_, runtime) = runtime(runner, FeatureSet::all());
        let err = runtime
            .remove_container(&ContainerId::new("web"), RemoveOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::MustStopContainer));
    }

    #[tokio::test]
    async fn missing_binary_is_a_connection_error() {
        let (_, runtime) = runtime(ScriptedRunner::default(), FeatureSet::all());
        let err = runtime.ping().await.unwrap_err();
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn listing_drops_records_without_id() {
        let runner = ScriptedRunner::default().answer(
            "container ls --all --format json",
            0,
            r#"[{"status":"running"},{"status":"running","configuration":{"id":"db"}}]"#,
            "",
        );
        let (_, runtime) = runtime(runner, FeatureSet::default());
        let containers = runtime.list_containers().await.unwrap();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].id.as_str(), "db");
    }

    #[tokio::test]
    async fn continuous_stats_are_not_supported() {
        let (_, runtime) = runtime(ScriptedRunner::default(), FeatureSet::all());
        let result = runtime
            .container_stats(
                &ContainerId::new("web"),
                StatsMode::Continuous,
                CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(ref e) if e.is_not_supported()));
    }

    #[tokio::test]
    async fn logs_pass_tail_and_follow() {
        let runner = ScriptedRunner::default().answer(
            "container logs --follow -n 2 web",
            0,
            "one\ntwo\n",
            "",
        );
        let (_, runtime) = runtime(runner, FeatureSet::default());
        let options = LogOptions {
            follow: true,
            tail: Some(2),
            timestamps: false,
        };
        let lines: Vec<LogLine> = runtime
            .container_logs(&ContainerId::new("web"), &options, CancellationToken::new())
            .await
            .unwrap()
            .map(|l| l.unwrap())
            .collect()
            .await;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].content, "two");
    }

    #[tokio::test]
    async fn connect_probes_then_pings() {
        let runner = ScriptedRunner::default()
            .answer("container --help", 0, "SUBCOMMANDS:\n  stats   Show stats\n", "")
            .answer("container system status --format json", 0, "{}", "");
        let runner: Arc<dyn CommandRunner> = Arc::new(runner);
        let runtime = CliRuntime::connect(runner, "container").await.unwrap();
        assert!(runtime.supports(Feature::Stats));
        assert!(!runtime.supports(Feature::ContainerTop));
        assert_eq!(runtime.mode(), BackendMode::Cli);
    }
}
