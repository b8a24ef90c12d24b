// ABOUTME: Engine host strings: unix sockets, tcp addresses and ssh remotes.
// ABOUTME: A bare absolute path is shorthand for a unix socket.

use crate::runtime::Endpoint;
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// A remote engine reached over SSH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub user: Option<String>,
    pub host: String,
    pub port: Option<u16>,
    /// Socket path on the remote machine, when the URL names one.
    pub socket: Option<String>,
}

impl SshTarget {
    /// `user@host` or `host`, as ssh expects it.
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{user}@{}", self.host),
            None => self.host.clone(),
        }
    }
}

/// Where an engine lives, as written in `CONTAINER_HOST`/`DOCKER_HOST` or a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineHost {
    Unix(PathBuf),
    Tcp(String),
    Ssh(SshTarget),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HostParseError {
    #[error("host is empty")]
    Empty,
    #[error("{0}")]
    Url(String),
    #[error("unsupported scheme `{0}`")]
    UnsupportedScheme(String),
    #[error("missing {0}")]
    Missing(&'static str),
}

impl EngineHost {
    pub fn parse(raw: &str) -> Result<Self, HostParseError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(HostParseError::Empty);
        }
        if raw.starts_with('/') {
            return Ok(EngineHost::Unix(PathBuf::from(raw)));
        }

        let url = Url::parse(raw).map_err(|e| HostParseError::Url(e.to_string()))?;
        match url.scheme() {
            "unix" => {
                let path = url.path();
                if path.is_empty() || path == "/" {
                    return Err(HostParseError::Missing("socket path"));
                }
                Ok(EngineHost::Unix(PathBuf::from(path)))
            }
            "tcp" | "http" => {
                let host = url.host_str().ok_or(HostParseError::Missing("host"))?;
                let port = url.port().unwrap_or(2375);
                Ok(EngineHost::Tcp(format!("{host}:{port}")))
            }
            "ssh" => {
                let host = url
                    .host_str()
                    .filter(|h| !h.is_empty())
                    .ok_or(HostParseError::Missing("host"))?;
                let socket = Some(url.path())
                    .filter(|p| !p.is_empty() && *p != "/")
                    .map(str::to_string);
                Ok(EngineHost::Ssh(SshTarget {
                    user: Some(url.username())
                        .filter(|u| !u.is_empty())
                        .map(str::to_string),
                    host: host.to_string(),
                    port: url.port(),
                    socket,
                }))
            }
            other => Err(HostParseError::UnsupportedScheme(other.to_string())),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, EngineHost::Ssh(_))
    }

    /// Local endpoint for this host; `None` for ssh hosts, which need a tunnel first.
    pub fn endpoint(&self) -> Option<Endpoint> {
        match self {
            EngineHost::Unix(path) => Some(Endpoint::Unix(path.clone())),
            EngineHost::Tcp(addr) => Some(Endpoint::Tcp(addr.clone())),
            EngineHost::Ssh(_) => None,
        }
    }
}

impl fmt::Display for EngineHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineHost::Unix(path) => write!(f, "unix://{}", path.display()),
            EngineHost::Tcp(addr) => write!(f, "tcp://{addr}"),
            EngineHost::Ssh(target) => {
                write!(f, "ssh://{}", target.destination())?;
                if let Some(port) = target.port {
                    write!(f, ":{port}")?;
                }
                if let Some(socket) = &target.socket {
                    f.write_str(socket)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unix_and_bare_paths() {
        assert_eq!(
            EngineHost::parse("unix:///var/run/docker.sock").unwrap(),
            EngineHost::Unix(PathBuf::from("/var/run/docker.sock"))
        );
        let bare = EngineHost::parse("/tmp/berth-test.sock").unwrap();
        assert_eq!(bare.to_string(), "unix:///tmp/berth-test.sock");
    }

    #[test]
    fn parses_ssh_with_user_port_and_socket() {
        let host = EngineHost::parse("ssh://user@remote.host:22/run/podman/podman.sock").unwrap();
        let EngineHost::Ssh(target) = &host else {
            panic!("expected ssh host, got {host:?}");
        };
        assert_eq!(target.destination(), "user@remote.host");
        assert_eq!(target.port, Some(22));
        assert_eq!(target.socket.as_deref(), Some("/run/podman/podman.sock"));
        assert_eq!(host.to_string(), "ssh://user@remote.host:22/run/podman/podman.sock");
        assert!(host.is_remote());
        assert!(host.endpoint().is_none());
    }

    #[test]
    fn ssh_without_path_has_no_socket() {
        let host = EngineHost::parse("ssh://user@host").unwrap();
        assert_eq!(host.to_string(), "ssh://user@host");
    }

    #[test]
    fn tcp_defaults_port() {
        assert_eq!(
            EngineHost::parse("tcp://10.0.0.5").unwrap(),
            EngineHost::Tcp("10.0.0.5:2375".into())
        );
    }

    #[test]
    fn rejects_unknown_schemes_and_empty() {
        assert_eq!(EngineHost::parse("  "), Err(HostParseError::Empty));
        assert!(matches!(
            EngineHost::parse("npipe:////./pipe/docker_engine"),
            Err(HostParseError::UnsupportedScheme(_))
        ));
        assert!(EngineHost::parse("not a host").is_err());
    }
}
