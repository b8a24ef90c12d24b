// ABOUTME: Snapshot of the environment variables discovery reads.
// ABOUTME: Captured once so discovery logic never touches the process environment directly.

use std::path::PathBuf;

/// Primary host override.
pub const CONTAINER_HOST: &str = "CONTAINER_HOST";
/// Legacy host override, consulted when the primary one is unset.
pub const DOCKER_HOST: &str = "DOCKER_HOST";
/// Explicit context name.
pub const DOCKER_CONTEXT: &str = "DOCKER_CONTEXT";
/// Directory holding `config.json` and the context store.
pub const DOCKER_CONFIG: &str = "DOCKER_CONFIG";

/// Environment values relevant to discovery. Empty values count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostEnv {
    pub container_host: Option<String>,
    pub docker_host: Option<String>,
    pub docker_context: Option<String>,
    pub docker_config: Option<PathBuf>,
    pub home: Option<PathBuf>,
    pub xdg_runtime_dir: Option<PathBuf>,
    pub uid: Option<u32>,
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl HostEnv {
    /// Read the current process environment.
    pub fn from_process() -> Self {
        Self {
            container_host: var(CONTAINER_HOST),
            docker_host: var(DOCKER_HOST),
            docker_context: var(DOCKER_CONTEXT),
            docker_config: var(DOCKER_CONFIG).map(PathBuf::from),
            home: var("HOME").map(PathBuf::from),
            xdg_runtime_dir: var("XDG_RUNTIME_DIR").map(PathBuf::from),
            uid: var("UID")
                .and_then(|u| u.parse().ok())
                .or_else(|| Some(nix::unistd::getuid().as_raw())),
        }
    }

    /// The host override in effect and the variable it came from.
    pub fn host_override(&self) -> Option<(&'static str, &str)> {
        self.container_host
            .as_deref()
            .map(|h| (CONTAINER_HOST, h))
            .or_else(|| self.docker_host.as_deref().map(|h| (DOCKER_HOST, h)))
    }

    /// `$DOCKER_CONFIG`, else `~/.docker`.
    pub fn config_dir(&self) -> Option<PathBuf> {
        self.docker_config
            .clone()
            .or_else(|| self.home.as_ref().map(|h| h.join(".docker")))
    }

    /// `$XDG_RUNTIME_DIR`, else `/run/user/<uid>`.
    pub fn runtime_dir(&self) -> Option<PathBuf> {
        self.xdg_runtime_dir
            .clone()
            .or_else(|| self.uid.map(|uid| PathBuf::from(format!("/run/user/{uid}"))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_host_wins_over_docker_host() {
        let env = HostEnv {
            container_host: Some("unix:///podman.sock".into()),
            docker_host: Some("unix:///docker.sock".into()),
            ..Default::default()
        };
        assert_eq!(
            env.host_override(),
            Some((CONTAINER_HOST, "unix:///podman.sock"))
        );
    }

    #[test]
    fn docker_host_is_the_fallback() {
        let env = HostEnv {
            docker_host: Some("unix:///var/run/docker.sock".into()),
            ..Default::default()
        };
        assert_eq!(
            env.host_override(),
            Some((DOCKER_HOST, "unix:///var/run/docker.sock"))
        );
    }

    #[test]
    fn empty_variables_count_as_unset() {
        temp_env::with_vars(
            [(CONTAINER_HOST, Some("")), (DOCKER_HOST, Some("  ")), ("UID", Some("1234"))],
            || {
                let env = HostEnv::from_process();
                assert_eq!(env.host_override(), None);
                assert_eq!(env.uid, Some(1234));
            },
        );
    }

    #[test]
    fn runtime_dir_falls_back_to_uid() {
        let env = HostEnv {
            uid: Some(1000),
            ..Default::default()
        };
        assert_eq!(env.runtime_dir(), Some(PathBuf::from("/run/user/1000")));
    }
}
