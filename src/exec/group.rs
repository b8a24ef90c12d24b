// ABOUTME: Long-lived child processes owned through their process group.
// ABOUTME: Used for SSH tunnels and the private engine service; killed explicitly at shutdown.

use super::{CommandLine, ExecError};
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::process::Stdio;

/// A background process started as the leader of its own process group.
///
/// [`ProcessGroup::kill`] signals the whole group so helpers the process
/// forked die with it. Dropping the handle kills it too.
pub struct ProcessGroup {
    command: String,
    pgid: Option<i32>,
    child: Mutex<Option<tokio::process::Child>>,
}

impl ProcessGroup {
    pub fn spawn(command: &CommandLine) -> Result<Self, ExecError> {
        let mut cmd = command.to_tokio();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| ExecError::Spawn {
            command: command.to_string(),
            source,
        })?;
        let pgid = child.id().and_then(|pid| i32::try_from(pid).ok());

        tracing::debug!(command = %command, pgid = ?pgid, "started process group");

        Ok(Self {
            command: command.to_string(),
            pgid,
            child: Mutex::new(Some(child)),
        })
    }

    /// Process group ID (equal to the leader's PID).
    pub fn pgid(&self) -> Option<i32> {
        self.pgid
    }

    /// Whether the leader is still alive.
    pub fn is_running(&self) -> bool {
        match self.child.lock().as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// SIGKILL the whole group. Safe to call more than once.
    pub fn kill(&self) {
        let Some(mut child) = self.child.lock().take() else {
            return;
        };
        if let Some(pgid) = self.pgid
            && let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL)
        {
            tracing::debug!(command = %self.command, "killpg failed: {}", e);
        }
        if let Err(e) = child.start_kill() {
            tracing::debug!(command = %self.command, "kill failed: {}", e);
        }
        tracing::debug!(command = %self.command, "killed process group");
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

impl std::fmt::Debug for ProcessGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessGroup")
            .field("command", &self.command)
            .field("pgid", &self.pgid)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn kill_stops_the_group() {
        let group = ProcessGroup::spawn(&CommandLine::new("sleep").arg("30")).unwrap();
        assert!(group.is_running());
        group.kill();
        assert!(!group.is_running());
        // Second kill is a no-op.
        group.kill();
    }
}
