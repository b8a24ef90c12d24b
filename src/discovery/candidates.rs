// ABOUTME: Well-known engine socket locations, in probing order.
// ABOUTME: System sockets first, then per-user rootless and desktop VM sockets.

use super::env::HostEnv;
use crate::runtime::EngineKind;
use std::path::PathBuf;

/// A socket location worth probing and the engine it usually belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketCandidate {
    pub path: PathBuf,
    pub kind: EngineKind,
}

impl SocketCandidate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = EngineKind::from_path_hint(&path.to_string_lossy());
        Self { path, kind }
    }
}

/// Candidate sockets for this user. Entries whose base directory is unknown
/// are left out.
pub fn socket_candidates(env: &HostEnv) -> Vec<SocketCandidate> {
    let mut paths: Vec<PathBuf> = vec![
        PathBuf::from("/var/run/docker.sock"),
        PathBuf::from("/run/podman/podman.sock"),
    ];

    if let Some(runtime_dir) = env.runtime_dir() {
        paths.push(runtime_dir.join("podman").join("podman.sock"));
        paths.push(runtime_dir.join("docker.sock"));
    }

    if let Some(home) = &env.home {
        for rel in [
            ".docker/run/docker.sock",
            ".docker/desktop/docker.sock",
            ".colima/default/docker.sock",
            ".orbstack/run/docker.sock",
            ".lima/default/sock/docker.sock",
            ".rd/docker.sock",
            ".local/share/containers/podman/machine/podman.sock",
        ] {
            paths.push(home.join(rel));
        }
    }

    paths.into_iter().map(SocketCandidate::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn includes_system_rootless_and_desktop_sockets() {
        let env = HostEnv {
            home: Some(PathBuf::from("/home/dev")),
            xdg_runtime_dir: Some(PathBuf::from("/run/user/1000")),
            ..Default::default()
        };
        let paths: Vec<PathBuf> = socket_candidates(&env).into_iter().map(|c| c.path).collect();
        for expected in [
            "/var/run/docker.sock",
            "/run/podman/podman.sock",
            "/run/user/1000/podman/podman.sock",
            "/run/user/1000/docker.sock",
            "/home/dev/.docker/run/docker.sock",
            "/home/dev/.colima/default/docker.sock",
            "/home/dev/.local/share/containers/podman/machine/podman.sock",
        ] {
            assert!(paths.contains(&PathBuf::from(expected)), "missing {expected}");
        }
        assert_eq!(paths[0], PathBuf::from("/var/run/docker.sock"));
    }

    #[test]
    fn kind_comes_from_path() {
        let candidates = socket_candidates(&HostEnv::default());
        assert_eq!(candidates[0].kind, EngineKind::Docker);
        assert_eq!(candidates[1].kind, EngineKind::Podman);
    }
}
