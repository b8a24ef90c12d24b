// ABOUTME: Reads the Docker CLI context store to find the host of a named context.
// ABOUTME: Metadata lives under contexts/meta/<sha256(name)>/meta.json.

use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("context `{0}` does not exist")]
    Missing(String),

    #[error("context `{0}` has no docker endpoint")]
    NoEndpoint(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    #[serde(default)]
    current_context: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContextMeta {
    #[serde(default)]
    endpoints: HashMap<String, EndpointMeta>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EndpointMeta {
    #[serde(default)]
    host: Option<String>,
}

/// The context store rooted at a Docker config directory.
#[derive(Debug, Clone)]
pub struct ContextStore {
    dir: PathBuf,
}

impl ContextStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `currentContext` from `config.json`. A missing file means no context.
    pub fn current_context(&self) -> Result<Option<String>, ContextError> {
        let path = self.dir.join("config.json");
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ContextError::Read { path, source }),
        };
        let config: ConfigFile =
            serde_json::from_str(&text).map_err(|source| ContextError::Parse { path, source })?;
        Ok(config.current_context.filter(|c| !c.is_empty()))
    }

    /// Host of the docker endpoint of `name`. The `default` context has none.
    pub fn host(&self, name: &str) -> Result<Option<String>, ContextError> {
        if name.is_empty() || name == "default" {
            return Ok(None);
        }
        let path = self
            .dir
            .join("contexts")
            .join("meta")
            .join(context_digest(name))
            .join("meta.json");
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ContextError::Missing(name.to_string()));
            }
            Err(source) => return Err(ContextError::Read { path, source }),
        };
        let meta: ContextMeta =
            serde_json::from_str(&text).map_err(|source| ContextError::Parse { path, source })?;
        meta.endpoints
            .get("docker")
            .and_then(|e| e.host.clone())
            .filter(|h| !h.is_empty())
            .map(Some)
            .ok_or_else(|| ContextError::NoEndpoint(name.to_string()))
    }
}

/// Directory name of a context: hex sha256 of its name.
pub fn context_digest(name: &str) -> String {
    hex::encode(Sha256::digest(name.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_context(dir: &Path, name: &str, host: &str) {
        let meta = dir
            .join("contexts")
            .join("meta")
            .join(context_digest(name));
        std::fs::create_dir_all(&meta).unwrap();
        std::fs::write(
            meta.join("meta.json"),
            format!(r#"{{"Name":"{name}","Endpoints":{{"docker":{{"Host":"{host}"}}}}}}"#),
        )
        .unwrap();
    }

    #[test]
    fn digest_is_hex_sha256() {
        assert_eq!(
            context_digest("default"),
            "37a8eec1ce19687d132fe29051dca629d164e2c4958ba141d5f4133a33f0688f"
        );
    }

    #[test]
    fn reads_current_context_and_host() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), r#"{"currentContext":"my-context"}"#)
            .unwrap();
        write_context(dir.path(), "my-context", "unix:///tmp/my-context.sock");

        let store = ContextStore::new(dir.path());
        assert_eq!(store.current_context().unwrap().as_deref(), Some("my-context"));
        assert_eq!(
            store.host("my-context").unwrap().as_deref(),
            Some("unix:///tmp/my-context.sock")
        );
    }

    #[test]
    fn default_context_has_no_host() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContextStore::new(dir.path());
        assert_eq!(store.host("default").unwrap(), None);
        assert_eq!(store.current_context().unwrap(), None);
    }

    #[test]
    fn unknown_context_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ContextStore::new(dir.path()).host("nonexistent").unwrap_err();
        assert!(matches!(err, ContextError::Missing(_)));
    }
}
