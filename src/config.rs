//! Configuration management for modelport.
//!
//! Options are loaded in order of precedence, later sources overriding
//! earlier ones:
//! 1. Built-in defaults
//! 2. User-specified configuration file (TOML)
//! 3. Environment variables (prefixed with `MODELPORT_`)
//! 4. Command-line arguments
//!
//! # Environment Variables
//!
//! - `MODELPORT_REGION` - target region for resolution
//! - `MODELPORT_TIMEOUT_SECS` - hard bound on a single invocation
//! - `MODELPORT_REGISTRY_FILE` - extra model registry (TOML)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_INVOKE_TIMEOUT, ENV_PREFIX};

/// Application configuration shared by the CLI commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Region resolution runs against.
    #[serde(default = "default_region")]
    pub region: String,
    /// Hard upper bound on a single invocation, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra model registry file layered over the built-in catalog.
    #[serde(default)]
    pub registry_file: Option<PathBuf>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_INVOKE_TIMEOUT.as_secs()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            timeout_secs: default_timeout_secs(),
            registry_file: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from all sources.
    pub fn load(config_file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("region", default_region())?
            .set_default("timeout_secs", default_timeout_secs() as i64)?;

        if let Some(path) = config_file {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX));

        builder.build()?.try_deserialize()
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_without_a_file() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.timeout(), DEFAULT_INVOKE_TIMEOUT);
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "region = \"eu-west-1\"\ntimeout_secs = 60").unwrap();
        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.timeout_secs, 60);
    }
}
