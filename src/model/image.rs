// ABOUTME: Image listing, inspection and layer history types.

use crate::types::{ImageId, ImageRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSummary {
    pub id: ImageId,
    pub repo_tags: Vec<String>,
    pub repo_digests: Vec<String>,
    pub parent_id: Option<ImageId>,
    pub created: Option<DateTime<Utc>>,
    pub size: i64,
    pub labels: HashMap<String, String>,
    /// Number of containers using the image, when the engine reports it.
    pub containers: Option<i64>,
}

impl ImageSummary {
    pub fn new(id: ImageId) -> Self {
        Self {
            id,
            repo_tags: Vec::new(),
            repo_digests: Vec::new(),
            parent_id: None,
            created: None,
            size: 0,
            labels: HashMap::new(),
            containers: None,
        }
    }

    /// Repository and tag of the first usable tag, `<none>` for dangling images.
    pub fn name_and_tag(&self) -> (String, String) {
        self.repo_tags
            .iter()
            .filter(|t| t.as_str() != "<none>:<none>")
            .find_map(|t| ImageRef::parse(t).ok())
            .map(|r| (r.familiar_name().to_string(), r.tag_or_latest().to_string()))
            .unwrap_or_else(|| ("<none>".to_string(), "<none>".to_string()))
    }

    pub fn is_dangling(&self) -> bool {
        self.repo_tags.iter().all(|t| t == "<none>:<none>")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDetails {
    pub id: ImageId,
    pub repo_tags: Vec<String>,
    pub repo_digests: Vec<String>,
    pub parent: Option<String>,
    pub comment: String,
    pub created: Option<String>,
    pub author: String,
    pub architecture: String,
    pub os: String,
    pub size: i64,
    pub layers: Vec<String>,
    pub env: Vec<String>,
    pub cmd: Vec<String>,
    pub labels: HashMap<String, String>,
}

impl ImageDetails {
    pub fn new(id: ImageId) -> Self {
        Self {
            id,
            repo_tags: Vec::new(),
            repo_digests: Vec::new(),
            parent: None,
            comment: String::new(),
            created: None,
            author: String::new(),
            architecture: String::new(),
            os: String::new(),
            size: 0,
            layers: Vec::new(),
            env: Vec::new(),
            cmd: Vec::new(),
            labels: HashMap::new(),
        }
    }
}

/// One layer in an image's build history, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageHistoryEntry {
    pub id: String,
    pub created: Option<DateTime<Utc>>,
    pub created_by: String,
    pub tags: Vec<String>,
    pub size: i64,
    pub comment: String,
}
