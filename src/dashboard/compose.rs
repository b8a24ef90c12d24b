// ABOUTME: Compose interrogation: which compose tool is installed, its service names and container IDs.
// ABOUTME: Failures degrade to an empty answer. Service names are read once per session.

use crate::config::ComposeConfig;
use crate::exec::{CommandLine, CommandRunner};
use crate::types::ContainerId;
use parking_lot::Mutex;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// The compose tool found on this host, if any.
pub struct Compose {
    runner: Arc<dyn CommandRunner>,
    command: Option<CommandLine>,
    project_dir: Option<PathBuf>,
    /// The first successful `config --services` answer.
    services: Mutex<Option<Vec<String>>>,
}

impl fmt::Debug for Compose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compose")
            .field("command", &self.command.as_ref().map(ToString::to_string))
            .field("project_dir", &self.project_dir)
            .finish_non_exhaustive()
    }
}

impl Compose {
    /// Use the configured command, else the first candidate whose
    /// `version` subcommand succeeds.
    pub async fn detect(runner: Arc<dyn CommandRunner>, config: &ComposeConfig) -> Self {
        let command = match config.command.as_deref().and_then(CommandLine::from_template) {
            Some(command) => Some(command),
            None => detect_command(runner.as_ref(), config).await,
        };
        match &command {
            Some(command) => tracing::debug!(command = %command, "using compose command"),
            None => tracing::debug!("no compose command found"),
        }
        Self {
            runner,
            command,
            project_dir: config.project_dir.clone(),
            services: Mutex::new(None),
        }
    }

    /// No compose tooling: every query answers empty.
    pub fn unavailable(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            command: None,
            project_dir: None,
            services: Mutex::new(None),
        }
    }

    pub fn is_available(&self) -> bool {
        self.command.is_some()
    }

    pub fn command(&self) -> Option<&CommandLine> {
        self.command.as_ref()
    }

    /// Service names declared by the project. Asked once; failures are
    /// retried on the next call.
    pub async fn services(&self) -> Vec<String> {
        if let Some(services) = self.services.lock().as_ref() {
            return services.clone();
        }
        let Some(stdout) = self.query(&["config", "--services"]).await else {
            return Vec::new();
        };
        let services: Vec<String> = non_blank_lines(&stdout).map(str::to_string).collect();
        *self.services.lock() = Some(services.clone());
        services
    }

    /// Drop the cached service names so the next call asks again.
    pub fn forget_services(&self) {
        *self.services.lock() = None;
    }

    /// IDs of the project's containers.
    pub async fn container_ids(&self) -> Vec<ContainerId> {
        match self.query(&["ps", "-q"]).await {
            Some(stdout) => non_blank_lines(&stdout).map(ContainerId::new).collect(),
            None => Vec::new(),
        }
    }

    async fn query(&self, args: &[&str]) -> Option<String> {
        let mut command = self.command.clone()?.args(args.iter().copied());
        if let Some(dir) = &self.project_dir {
            command = command.current_dir(dir);
        }
        match self.runner.run(&command).await {
            Ok(stdout) => Some(stdout),
            Err(e) => {
                tracing::warn!("compose query failed: {}", e);
                None
            }
        }
    }
}

async fn detect_command(runner: &dyn CommandRunner, config: &ComposeConfig) -> Option<CommandLine> {
    for candidate in config.candidates.iter() {
        let Some(command) = CommandLine::from_template(candidate) else {
            continue;
        };
        match runner.run(&command.clone().arg("version")).await {
            Ok(_) => return Some(command),
            Err(e) => tracing::trace!(candidate = %candidate, "compose candidate rejected: {}", e),
        }
    }
    None
}

fn non_blank_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|line| !line.is_empty())
}
