// ABOUTME: Engine version report returned by the `/version` endpoint of Docker and Podman.

use crate::runtime::EngineKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnginePlatform {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EngineComponent {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// What an engine says about itself. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EngineVersion {
    #[serde(deserialize_with = "crate::runtime::json::nullable")]
    pub platform: EnginePlatform,
    #[serde(deserialize_with = "crate::runtime::json::nullable")]
    pub components: Vec<EngineComponent>,
    pub version: String,
    pub api_version: String,
    pub os: String,
    pub arch: String,
}

impl EngineVersion {
    /// Podman identifies itself in the platform name or a component name.
    pub fn engine_kind(&self) -> EngineKind {
        let is_podman = |name: &str| name.to_ascii_lowercase().contains("podman");
        if is_podman(&self.platform.name) || self.components.iter().any(|c| is_podman(&c.name)) {
            EngineKind::Podman
        } else {
            EngineKind::Docker
        }
    }
}
