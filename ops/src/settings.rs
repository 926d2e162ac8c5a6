use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const TFVARS: &str = "terraform.tfvars";
pub const TFVARS_EXAMPLE: &str = "terraform.tfvars.example";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Used when `terraform.tfvars` has no `aws_profile`.
    pub default_profile: String,
    /// Substring identifying project buckets when Terraform outputs are gone.
    pub bucket_marker: String,
    /// How many recent query executions to stop in the workgroup.
    pub query_history_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_profile: "default".to_string(),
            bucket_marker: "shop-etl".to_string(),
            query_history_limit: 10,
        }
    }
}

impl Settings {
    /// Reads `path` if it exists, otherwise returns the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let settings = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let settings: Settings = serde_yaml::from_str(&settings)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        Ok(settings)
    }

    pub fn profile(&self, dir: &Path) -> String {
        fs::read_to_string(dir.join(TFVARS))
            .ok()
            .and_then(|tfvars| profile_from_tfvars(&tfvars))
            .unwrap_or_else(|| self.default_profile.clone())
    }
}

/// Value of the first `aws_profile = "..."` assignment.
pub fn profile_from_tfvars(tfvars: &str) -> Option<String> {
    tfvars
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("aws_profile"))
        .find_map(|line| line.split_once('='))
        .map(|(_, value)| value.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|profile| !profile.is_empty())
}
