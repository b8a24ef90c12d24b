// ABOUTME: Volume and network summaries.

use crate::types::NetworkId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSummary {
    pub name: String,
    pub driver: String,
    pub mountpoint: String,
    pub scope: Option<String>,
    pub created_at: Option<String>,
    pub labels: HashMap<String, String>,
    pub options: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub id: NetworkId,
    pub name: String,
    pub driver: String,
    pub scope: Option<String>,
    pub internal: bool,
    pub labels: HashMap<String, String>,
    pub options: HashMap<String, String>,
}

impl NetworkSummary {
    pub fn new(id: NetworkId) -> Self {
        Self {
            name: id.as_str().to_string(),
            id,
            driver: String::new(),
            scope: None,
            internal: false,
            labels: HashMap::new(),
            options: HashMap::new(),
        }
    }
}
