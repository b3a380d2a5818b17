// ABOUTME: Read-only discovery listings for runners, integrations, and secrets
// ABOUTME: Used by the compiler to annotate suggestions; never required for correctness

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerInfo {
    pub id: String,
    pub status: RunnerStatus,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerStatus {
    Online,
    Busy,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationInfo {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub required_secrets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretInfo {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    pub pattern: Option<String>,
}

/// Snapshot of the discovery services' listings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryCatalog {
    #[serde(default)]
    pub runners: Vec<RunnerInfo>,
    #[serde(default)]
    pub integrations: Vec<IntegrationInfo>,
    #[serde(default)]
    pub secrets: Vec<SecretInfo>,
}

impl DiscoveryCatalog {
    pub fn online_runners(&self) -> Vec<&RunnerInfo> {
        self.runners
            .iter()
            .filter(|r| r.status == RunnerStatus::Online)
            .collect()
    }

    pub fn integration(&self, name: &str) -> Option<&IntegrationInfo> {
        self.integrations.iter().find(|i| i.name == name)
    }

    pub fn has_secret(&self, name: &str) -> bool {
        self.secrets.iter().any(|s| s.name == name)
    }
}
