// ABOUTME: Engine kinds and backend modes.
// ABOUTME: EngineKind names what answers on a socket; BackendMode names which adapter talks to it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The container engine behind an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Docker,
    Podman,
}

impl EngineKind {
    /// Guess the engine from a socket path or host string.
    pub fn from_path_hint(path: &str) -> Self {
        if path.to_ascii_lowercase().contains("podman") {
            EngineKind::Podman
        } else {
            EngineKind::Docker
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Docker => write!(f, "docker"),
            EngineKind::Podman => write!(f, "podman"),
        }
    }
}

/// Which adapter implements the runtime contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// Podman REST API over a local or tunneled socket.
    Socket,
    /// Private Podman service owned by this process.
    Embedded,
    /// Vendor CLI driven through subprocesses.
    Cli,
    /// Docker Engine API client.
    Legacy,
}

impl BackendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendMode::Socket => "socket",
            BackendMode::Embedded => "embedded",
            BackendMode::Cli => "cli",
            BackendMode::Legacy => "legacy",
        }
    }
}

impl FromStr for BackendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "socket" => Ok(BackendMode::Socket),
            "embedded" => Ok(BackendMode::Embedded),
            "cli" => Ok(BackendMode::Cli),
            "legacy" => Ok(BackendMode::Legacy),
            other => Err(format!(
                "unknown backend mode `{other}` (expected socket, embedded, cli or legacy)"
            )),
        }
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_hint_detects_podman() {
        assert_eq!(
            EngineKind::from_path_hint("/run/user/1000/podman/podman.sock"),
            EngineKind::Podman
        );
        assert_eq!(
            EngineKind::from_path_hint("/var/run/docker.sock"),
            EngineKind::Docker
        );
    }

    #[test]
    fn mode_deserializes_lowercase() {
        let mode: BackendMode = serde_yaml::from_str("legacy").unwrap();
        assert_eq!(mode, BackendMode::Legacy);
        assert_eq!(mode.to_string(), "legacy");
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("CLI".parse::<BackendMode>(), Ok(BackendMode::Cli));
        assert!("vm".parse::<BackendMode>().is_err());
    }
}
