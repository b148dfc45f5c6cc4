//! Configuration loading and types

use std::path::{Path, PathBuf};

use invupload_report::{OrganizationInfo, ReportContext, StaticOrganizations};
use serde::{Deserialize, Serialize};

/// Top-level configuration for invupload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
    /// Values reported with every host
    #[serde(default)]
    pub report: ReportContext,
    /// Known organizations
    #[serde(default)]
    pub organization: Vec<OrganizationConfig>,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// One organization entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationConfig {
    pub id: u64,
    /// Upstream account number
    pub account: Option<String>,
    /// Unlimited entitlement enabled
    #[serde(default)]
    pub golden_ticket: bool,
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// Returns error if the text is not valid configuration
    pub fn parse(content: &str) -> eyre::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Find the config file to use when none was given on the command line
    ///
    /// `INVUPLOAD_CONFIG` wins when set, otherwise the first existing file
    /// among the standard locations.
    #[must_use]
    pub fn locate() -> Option<PathBuf> {
        let env_path = std::env::var_os("INVUPLOAD_CONFIG").map(PathBuf::from);

        let mut candidates = vec![
            PathBuf::from("invupload.toml"),
            PathBuf::from("/etc/invupload/invupload.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join("invupload/invupload.toml"));
        }

        Self::locate_from(env_path, &candidates)
    }

    /// An explicit path is returned as is, even if missing, so that loading
    /// it reports the error
    fn locate_from(env_path: Option<PathBuf>, candidates: &[PathBuf]) -> Option<PathBuf> {
        env_path.or_else(|| candidates.iter().find(|path| path.is_file()).cloned())
    }

    /// Organization lookup built from the `[[organization]]` entries
    #[must_use]
    pub fn organizations(&self) -> StaticOrganizations {
        self.organization
            .iter()
            .map(|org| {
                (
                    org.id,
                    OrganizationInfo {
                        account: org.account.clone(),
                        golden_ticket: org.golden_ticket,
                    },
                )
            })
            .collect()
    }
}
