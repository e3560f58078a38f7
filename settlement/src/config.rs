//! Configuration for the settlement engine

use custody_core::CoreConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Settlement engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Custody core configuration (alert thresholds, audit retention)
    #[serde(default)]
    pub core: CoreConfig,

    /// Actor string recorded on audit entries produced by the engine
    #[serde(default = "default_actor")]
    pub audit_actor: String,
}

fn default_actor() -> String {
    "settlement-engine".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("read {}: {e}", path.as_ref().display())))?;
        toml::from_str(&contents).map_err(|e| Error::Config(format!("parse config: {e}")))
    }
}
