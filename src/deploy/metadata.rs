// ABOUTME: Audit record attached to every updated service as the `deployer` label.
// ABOUTME: Who deployed what, when, and from which machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::System;

/// Label key holding the serialized metadata.
pub const METADATA_LABEL: &str = "deployer";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentMetadata {
    pub date: DateTime<Utc>,
    pub deployer_version: String,
    /// Project name from the config.
    pub name: String,
    pub computer_username: String,
    pub device_name: String,
    pub operating_system: OperatingSystem,
    /// Image reference the service was updated to.
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingSystem {
    #[serde(rename = "type")]
    pub kind: String,
    pub platform: String,
    pub architecture: String,
    /// Kernel release; absent from labels written by older versions.
    #[serde(default)]
    pub release: String,
}

impl OperatingSystem {
    pub fn current() -> Self {
        Self {
            kind: std::env::consts::FAMILY.to_string(),
            platform: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            release: System::kernel_version().unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

impl DeploymentMetadata {
    /// Describe a deployment of `image` happening now on this machine.
    pub fn collect(name: &str, image: &str) -> Self {
        let computer_username = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            date: Utc::now(),
            deployer_version: env!("CARGO_PKG_VERSION").to_string(),
            name: name.to_string(),
            computer_username,
            device_name: gethostname::gethostname().to_string_lossy().into_owned(),
            operating_system: OperatingSystem::current(),
            image: image.to_string(),
        }
    }

    /// JSON label value.
    pub fn to_label(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_label(value: &str) -> serde_json::Result<Self> {
        serde_json::from_str(value)
    }
}
