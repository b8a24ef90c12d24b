// ABOUTME: SSH tunnel forwarding a local temporary socket to a remote engine socket.
// ABOUTME: The ssh child runs in its own process group and is killed by the handle's closer.

use super::host::SshTarget;
use crate::exec::{CommandLine, ExecError, ProcessGroup};
use crate::runtime::Endpoint;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::UnixStream;

#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    #[error("failed to create ssh tunnel socket directory: {0}")]
    SocketDir(#[source] std::io::Error),

    #[error("failed to start ssh tunnel: {0}")]
    Spawn(#[source] ExecError),

    #[error("ssh tunneled socket {} never became available within {timeout:?}", path.display())]
    Timeout { path: PathBuf, timeout: Duration },

    #[error("ssh exited before the tunnel to {destination} came up")]
    Exited { destination: String },
}

/// A live tunnel. [`TunnelHandle::close`] kills the forwarding process.
#[derive(Debug)]
pub struct TunnelHandle {
    local: PathBuf,
    process: Option<ProcessGroup>,
    _dir: Option<TempDir>,
}

impl TunnelHandle {
    /// A tunnel whose forwarding process is owned elsewhere.
    pub fn unmanaged(local: impl Into<PathBuf>) -> Self {
        Self {
            local: local.into(),
            process: None,
            _dir: None,
        }
    }

    pub fn local_path(&self) -> &Path {
        &self.local
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::Unix(self.local.clone())
    }

    pub fn close(&self) {
        if let Some(process) = &self.process {
            process.kill();
            tracing::info!(socket = %self.local.display(), "closed ssh tunnel");
        }
    }
}

/// Opens tunnels to remote engines.
#[async_trait]
pub trait Tunneler: Send + Sync {
    async fn open(
        &self,
        target: &SshTarget,
        remote_socket: &str,
    ) -> Result<TunnelHandle, TunnelError>;
}

/// Tunnels with the system `ssh` client.
#[derive(Debug, Clone)]
pub struct SshTunneler {
    ssh_binary: String,
    timeout: Duration,
    retry_interval: Duration,
}

impl SshTunneler {
    pub fn new(timeout: Duration, retry_interval: Duration) -> Self {
        Self {
            ssh_binary: "ssh".to_string(),
            timeout,
            retry_interval,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.ssh_binary = binary.into();
        self
    }

    fn command(&self, target: &SshTarget, local: &Path, remote_socket: &str) -> CommandLine {
        let mut command = CommandLine::new(&self.ssh_binary)
            .arg("-L")
            .arg(format!("{}:{remote_socket}", local.display()));
        if let Some(port) = target.port {
            command = command.arg("-p").arg(port.to_string());
        }
        command.arg(target.destination()).arg("-N")
    }
}

#[async_trait]
impl Tunneler for SshTunneler {
    async fn open(
        &self,
        target: &SshTarget,
        remote_socket: &str,
    ) -> Result<TunnelHandle, TunnelError> {
        let dir = tempfile::Builder::new()
            .prefix("berth-sshtunnel-")
            .tempdir()
            .map_err(TunnelError::SocketDir)?;
        let local = dir.path().join("dockerhost.sock");

        let command = self.command(target, &local, remote_socket);
        let process = ProcessGroup::spawn(&command).map_err(TunnelError::Spawn)?;
        tracing::info!(
            destination = %target.destination(),
            remote_socket,
            local = %local.display(),
            "started ssh tunnel"
        );

        match retry_dial(&local, &process, self.retry_interval, self.timeout).await {
            Ok(()) => Ok(TunnelHandle {
                local,
                process: Some(process),
                _dir: Some(dir),
            }),
            Err(DialFailure::Exited) => Err(TunnelError::Exited {
                destination: target.destination(),
            }),
            Err(DialFailure::Timeout) => {
                process.kill();
                Err(TunnelError::Timeout {
                    path: local,
                    timeout: self.timeout,
                })
            }
        }
    }
}

enum DialFailure {
    Exited,
    Timeout,
}

/// Dial `path` every `interval` until it answers, the process dies, or
/// `timeout` elapses.
async fn retry_dial(
    path: &Path,
    process: &ProcessGroup,
    interval: Duration,
    timeout: Duration,
) -> Result<(), DialFailure> {
    let attempts = async {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if UnixStream::connect(path).await.is_ok() {
                return Ok(());
            }
            if !process.is_running() {
                return Err(DialFailure::Exited);
            }
            tracing::debug!(socket = %path.display(), "tunnel socket not ready yet");
        }
    };
    tokio::time::timeout(timeout, attempts)
        .await
        .unwrap_or(Err(DialFailure::Timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UnixListener;

    fn target() -> SshTarget {
        SshTarget {
            user: Some("dev".into()),
            host: "build-box".into(),
            port: Some(2222),
            socket: None,
        }
    }

    #[test]
    fn command_forwards_local_to_remote() {
        let tunneler = SshTunneler::new(Duration::from_secs(8), Duration::from_secs(1));
        let command = tunneler.command(
            &target(),
            Path::new("/tmp/t/dockerhost.sock"),
            "/var/run/docker.sock",
        );
        assert_eq!(
            command.to_string(),
            "ssh -L /tmp/t/dockerhost.sock:/var/run/docker.sock -p 2222 dev@build-box -N"
        );
    }

    #[tokio::test]
    async fn dial_succeeds_once_socket_listens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.sock");
        let process = ProcessGroup::spawn(&CommandLine::new("sleep").arg("30")).unwrap();

        let bind_path = path.clone();
        let listener = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            let listener = UnixListener::bind(&bind_path).unwrap();
            let _ = listener.accept().await;
        });

        let result = retry_dial(
            &path,
            &process,
            Duration::from_millis(50),
            Duration::from_secs(5),
        )
        .await;
        assert!(result.is_ok());
        listener.abort();
    }

    #[tokio::test]
    async fn dial_gives_up_after_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let process = ProcessGroup::spawn(&CommandLine::new("sleep").arg("30")).unwrap();
        let result = retry_dial(
            &dir.path().join("never.sock"),
            &process,
            Duration::from_millis(20),
            Duration::from_millis(200),
        )
        .await;
        assert!(matches!(result, Err(DialFailure::Timeout)));
    }

    #[tokio::test]
    async fn ssh_that_exits_reports_exit() {
        let tunneler = SshTunneler::new(Duration::from_secs(5), Duration::from_millis(50))
            .with_binary("false");
        let err = tunneler.open(&target(), "/var/run/docker.sock").await.unwrap_err();
        assert!(matches!(err, TunnelError::Exited { .. }));
    }
}
