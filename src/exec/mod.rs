// ABOUTME: Process execution facility used by the CLI adapter, compose interrogation and tunnels.
// ABOUTME: Run-to-completion, line streaming, and process-group lifetimes behind a mockable trait.

mod command;
mod group;

pub use command::{CommandLine, CommandOutput};
pub use group::ProcessGroup;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

/// Lines read from a child's stdout.
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String, ExecError>> + Send>>;

/// Errors from running external commands.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    TimedOut { command: String, timeout: Duration },

    #[error("failed reading output of `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Spawns external commands.
///
/// Adapters only ever talk to processes through this trait so tests can
/// substitute canned output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion and capture stdout and stderr. A non-zero exit is
    /// reported in the output, not as an error.
    async fn output(&self, command: &CommandLine) -> Result<CommandOutput, ExecError>;

    /// Spawn the command and stream stdout line by line until it exits or
    /// `cancel` fires. Dropping the stream kills the child.
    async fn lines(
        &self,
        command: &CommandLine,
        cancel: CancellationToken,
    ) -> Result<LineStream, ExecError>;

    /// Run to completion and require a zero exit status. Returns stdout.
    async fn run(&self, command: &CommandLine) -> Result<String, ExecError> {
        let output = self.output(command).await?;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(ExecError::Failed {
                command: command.to_string(),
                status: output.status_text(),
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}

/// Runs commands on the local machine with tokio.
#[derive(Debug, Clone, Default)]
pub struct OsCommandRunner {
    timeout: Option<Duration>,
}

impl OsCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every run-to-completion call. Streaming calls are unbounded.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl CommandRunner for OsCommandRunner {
    async fn output(&self, command: &CommandLine) -> Result<CommandOutput, ExecError> {
        let mut cmd = command.to_tokio();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let started = Instant::now();
        let run = cmd.output();
        let result = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, run).await.map_err(|_| {
                ExecError::TimedOut {
                    command: command.to_string(),
                    timeout,
                }
            })?,
            None => run.await,
        };
        let output = result.map_err(|source| ExecError::Spawn {
            command: command.to_string(),
            source,
        })?;

        tracing::debug!(command = %command, elapsed = ?started.elapsed(), "command finished");

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn lines(
        &self,
        command: &CommandLine,
        cancel: CancellationToken,
    ) -> Result<LineStream, ExecError> {
        let mut cmd = command.to_tokio();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
            command: command.to_string(),
            source,
        })?;
        let stdout = child.stdout.take().ok_or_else(|| ExecError::Io {
            command: command.to_string(),
            source: std::io::Error::other("stdout was not captured"),
        })?;

        let state = LineState {
            child,
            lines: BufReader::new(stdout).lines(),
            command: command.to_string(),
        };

        let stream = futures::stream::unfold(Some(state), |state| async move {
            let mut state = state?;
            match state.lines.next_line().await {
                Ok(Some(line)) => Some((Ok(line), Some(state))),
                Ok(None) => {
                    let _ = state.child.wait().await;
                    None
                }
                Err(source) => Some((
                    Err(ExecError::Io {
                        command: state.command.clone(),
                        source,
                    }),
                    None,
                )),
            }
        });

        Ok(Box::pin(stream.take_until(cancel.cancelled_owned())))
    }
}

struct LineState {
    child: tokio::process::Child,
    lines: tokio::io::Lines<BufReader<tokio::process::ChildStdout>>,
    command: String,
}
