// ABOUTME: Integration tests driving the dashboard over the CLI-driven backend.
// ABOUTME: A scripted command runner stands in for the container tool.

use async_trait::async_trait;
use berth::config::DashboardConfig;
use berth::dashboard::{Compose, Dashboard};
use berth::exec::{CommandLine, CommandOutput, CommandRunner, ExecError, LineStream};
use berth::runtime::{CliRuntime, Feature, FeatureSet, RuntimeInfo};
use berth::types::ContainerId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const LISTING: &str = r#"[
  {"status":"running","configuration":{"id":"web","image":{"reference":"docker.io/library/nginx:1.27"}}},
  {"status":"stopped","configuration":{"id":"migrate","image":{"reference":"docker.io/library/alpine:3"}}},
  {"status":"running"}
]"#;

const STATS: &str = r#"[{"id":"web","cpuUsageUsec":1500,"memoryUsageBytes":52428800,"memoryLimitBytes":104857600,"numProcesses":4}]"#;

/// Answers commands from a table keyed by the full command line and
/// records every call.
#[derive(Default)]
struct ScriptedRunner {
    answers: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    fn answer(mut self, command: &str, stdout: &str) -> Self {
        self.answers.insert(command.to_string(), stdout.to_string());
        self
    }

    fn count(&self, command: &str) -> usize {
        self.calls.lock().iter().filter(|c| *c == command).count()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn output(&self, command: &CommandLine) -> Result<CommandOutput, ExecError> {
        let key = command.to_string();
        self.calls.lock().push(key.clone());
        match self.answers.get(&key) {
            Some(stdout) => Ok(CommandOutput {
                status: Some(0),
                stdout: stdout.clone(),
                stderr: String::new(),
            }),
            None => Ok(CommandOutput {
                status: Some(1),
                stdout: String::new(),
                stderr: format!("Error: {key} not found"),
            }),
        }
    }

    async fn lines(
        &self,
        command: &CommandLine,
        _cancel: CancellationToken,
    ) -> Result<LineStream, ExecError> {
        Err(ExecError::Spawn {
            command: command.to_string(),
            source: std::io::Error::from(std::io::ErrorKind::Unsupported),
        })
    }
}

fn config() -> DashboardConfig {
    let mut config = DashboardConfig::default();
    config.stats.poll_interval = Duration::from_millis(20);
    config
}

fn dashboard(runner: ScriptedRunner, features: FeatureSet) -> (Arc<ScriptedRunner>, Dashboard) {
    let runner = Arc::new(runner);
    let runtime = CliRuntime::with_features(runner.clone(), "container", features);
    let compose = Compose::unavailable(runner.clone());
    (runner, Dashboard::new(Arc::new(runtime), compose, &config()))
}

async fn wait_for(mut done: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

mod listing {
    use super::*;

    #[tokio::test]
    async fn containers_without_pods_are_standalone() {
        let runner = ScriptedRunner::default().answer("container ls --all --format json", LISTING);
        let (_, dashboard) = dashboard(runner, FeatureSet::default());

        let hierarchy = dashboard.refresh_containers().await.unwrap();
        assert!(hierarchy.pods.is_empty());
        assert!(hierarchy.services.is_empty());
        let names: Vec<&str> = hierarchy.standalone.iter().map(ContainerId::as_str).collect();
        assert_eq!(names, vec!["migrate", "web"]);

        let containers = dashboard.containers().await;
        assert_eq!(containers.len(), 2);
        // Inspection failures leave details empty instead of failing the refresh.
        assert!(containers.iter().all(|c| c.details.is_none()));
        dashboard.shutdown().await;
    }

    #[tokio::test]
    async fn exited_containers_can_be_hidden() {
        let runner = ScriptedRunner::default().answer("container ls --all --format json", LISTING);
        let (_, dashboard) = dashboard(runner, FeatureSet::default());
        dashboard.set_show_exited(false);

        let hierarchy = dashboard.refresh_containers().await.unwrap();
        let names: Vec<&str> = hierarchy.standalone.iter().map(ContainerId::as_str).collect();
        assert_eq!(names, vec!["web"]);
        dashboard.shutdown().await;
    }

    #[tokio::test]
    async fn listing_failure_is_reported() {
        let (_, dashboard) = dashboard(ScriptedRunner::default(), FeatureSet::default());
        let err = dashboard.refresh_containers().await.unwrap_err();
        assert!(err.to_string().contains("container ls"));
        assert!(dashboard.containers().await.is_empty());
    }

    #[tokio::test]
    async fn services_feature_is_never_reported() {
        let (_, dashboard) = dashboard(ScriptedRunner::default(), FeatureSet::all());
        assert!(!dashboard.runtime().supports(Feature::Services));
        assert!(dashboard.runtime().supports(Feature::Stats));
    }
}

mod stats {
    use super::*;

    #[tokio::test]
    async fn one_shot_samples_are_polled_into_history() {
        let runner = ScriptedRunner::default()
            .answer("container ls --all --format json", LISTING)
            .answer("container stats --no-stream --format json web", STATS);
        let (runner, dashboard) = dashboard(runner, FeatureSet::all());
        dashboard.refresh_containers().await.unwrap();

        let web = ContainerId::new("web");
        let migrate = ContainerId::new("migrate");
        assert!(dashboard.is_monitoring(&web));
        assert!(!dashboard.is_monitoring(&migrate));

        wait_for(|| dashboard.stats(&web).len() >= 2).await;
        let latest = dashboard.latest_stats(&web).unwrap();
        assert_eq!(latest.derived.memory_usage, 52_428_800);
        assert_eq!(latest.derived.memory_limit, 104_857_600);
        assert!((latest.derived.memory_percent - 50.0).abs() < f64::EPSILON);
        assert!(runner.count("container stats --no-stream --format json web") >= 2);

        dashboard.shutdown().await;
        wait_for(|| !dashboard.is_monitoring(&web)).await;
    }

    #[tokio::test]
    async fn refresh_does_not_start_a_second_monitor() {
        let runner = ScriptedRunner::default()
            .answer("container ls --all --format json", LISTING)
            .answer("container stats --no-stream --format json web", STATS);
        let (_, dashboard) = dashboard(runner, FeatureSet::all());
        let web = ContainerId::new("web");

        dashboard.refresh_containers().await.unwrap();
        wait_for(|| !dashboard.stats(&web).is_empty()).await;
        let before = dashboard.stats(&web).len();
        dashboard.refresh_containers().await.unwrap();

        // History survives the refresh because the same monitor keeps running.
        assert!(dashboard.stats(&web).len() >= before);
        assert!(dashboard.is_monitoring(&web));
        dashboard.shutdown().await;
    }

    #[tokio::test]
    async fn monitor_stops_without_stats_feature() {
        let runner = ScriptedRunner::default().answer("container ls --all --format json", LISTING);
        let (runner, dashboard) = dashboard(runner, FeatureSet::default());
        dashboard.refresh_containers().await.unwrap();

        let web = ContainerId::new("web");
        wait_for(|| !dashboard.is_monitoring(&web)).await;
        assert!(dashboard.stats(&web).is_empty());
        assert_eq!(runner.count("container stats --no-stream --format json web"), 0);
        dashboard.shutdown().await;
    }
}
