// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Handles backend modes and the compose command list.

use crate::runtime::BackendMode;
use nonempty::NonEmpty;
use serde::Deserialize;

pub fn deserialize_backend_mode<'de, D>(deserializer: D) -> Result<Option<BackendMode>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") | Some("auto") => Ok(None),
        Some(mode) => mode.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

pub fn deserialize_compose_commands<'de, D>(deserializer: D) -> Result<NonEmpty<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<String> = Vec::deserialize(deserializer)?;
    let commands: Vec<String> = values
        .into_iter()
        .map(|c| c.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|c| !c.is_empty())
        .collect();

    NonEmpty::from_vec(commands)
        .ok_or_else(|| serde::de::Error::custom("at least one compose command is required"))
}
