/// Configuration management for kube-debug
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Image used for debug pods
pub const DEFAULT_IMAGE: &str = "digitalocean/doks-debug:latest";

/// Container the shell is attached to
pub const DEFAULT_CONTAINER: &str = "main";

/// Session defaults, optionally loaded from a YAML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Debug image reference
    pub image: String,

    /// Name of the debug container
    pub container: String,

    /// Command executed interactively in the container
    pub shell: Vec<String>,

    /// Seconds between two pod status checks
    pub poll_interval_secs: u64,

    /// Seconds to wait for the pod to become Running
    pub wait_timeout_secs: u64,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            container: DEFAULT_CONTAINER.to_string(),
            shell: vec!["bash".to_string()],
            poll_interval_secs: 2,
            wait_timeout_secs: 300,
        }
    }
}

impl DebugConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML; missing keys keep their defaults
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: DebugConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.image.trim().is_empty() {
            anyhow::bail!("image cannot be empty");
        }

        if self.container.trim().is_empty() {
            anyhow::bail!("container cannot be empty");
        }

        if self.shell.is_empty() {
            anyhow::bail!("shell must contain at least one argument");
        }

        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be greater than zero");
        }

        if self.wait_timeout_secs < self.poll_interval_secs {
            anyhow::bail!(
                "wait_timeout_secs ({}) must not be shorter than poll_interval_secs ({})",
                self.wait_timeout_secs,
                self.poll_interval_secs
            );
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}
