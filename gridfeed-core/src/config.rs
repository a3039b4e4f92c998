//! TOML configuration: warehouse endpoint, credential sources, and table
//! references.
//!
//! ```toml
//! [warehouse]
//! project = "datamachine-407200"
//! timeout_secs = 60
//!
//! [credentials]
//! source = "GCP_SA"
//! token_env = "GCP_ACCESS_TOKEN"
//!
//! [tables]
//! layoffs = "datamachine-407200.macro.layoffs_fyi"
//! real_estate = "datamachine-407200.commercial_real_estate.loopnet_agg"
//! ```

use crate::error::GridError;
use crate::warehouse::ServiceAccountKey;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridfeedConfig {
    pub warehouse: WarehouseConfig,
    pub credentials: CredentialsConfig,
    pub tables: TablesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    /// Billing project for query jobs. Falls back to the service-account key's project.
    pub project: Option<String>,
    /// BigQuery REST base URL.
    pub endpoint: String,
    /// Job location, e.g. `US` or `EU`.
    pub location: Option<String>,
    /// HTTP timeout per request. BigQuery is asked to answer 10 s sooner
    /// (half the timeout when it is 20 s or less) so long jobs are polled.
    pub timeout_secs: u64,
    /// Rows requested per result page.
    pub page_size: u32,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            project: None,
            endpoint: "https://bigquery.googleapis.com/bigquery/v2".to_string(),
            location: None,
            timeout_secs: 60,
            page_size: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Environment variable holding the service-account key JSON.
    pub source: String,
    /// Environment variable holding an OAuth access token.
    pub token_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            source: "GCP_SA".to_string(),
            token_env: "GCP_ACCESS_TOKEN".to_string(),
        }
    }
}

/// Fully qualified `project.dataset.table` references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TablesConfig {
    pub layoffs: String,
    pub real_estate: String,
}

impl Default for TablesConfig {
    fn default() -> Self {
        Self {
            layoffs: "datamachine-407200.macro.layoffs_fyi".to_string(),
            real_estate: "datamachine-407200.commercial_real_estate.loopnet_agg".to_string(),
        }
    }
}

impl GridfeedConfig {
    /// Parse a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, GridError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| GridError::Config(format!("parse config TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, GridError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GridError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String, GridError> {
        toml::to_string_pretty(self).map_err(|e| GridError::Config(format!("serialize config: {e}")))
    }

    fn validate(&self) -> Result<(), GridError> {
        for (name, table) in [
            ("tables.layoffs", &self.tables.layoffs),
            ("tables.real_estate", &self.tables.real_estate),
        ] {
            if table.split('.').count() != 3 || table.split('.').any(str::is_empty) {
                return Err(GridError::Config(format!(
                    "{name} must be project.dataset.table, got '{table}'"
                )));
            }
        }
        if self.warehouse.page_size == 0 {
            return Err(GridError::Config("warehouse.page_size must be positive".into()));
        }
        Ok(())
    }

    /// Project to bill queries to: the configured one, else the project of
    /// the service-account key named by `credentials.source`.
    pub fn resolve_project(&self) -> Result<String, GridError> {
        if let Some(project) = &self.warehouse.project {
            return Ok(project.clone());
        }
        ServiceAccountKey::from_env(&self.credentials.source)
            .map(|key| key.project_id)
            .map_err(|e| GridError::Config(format!("no warehouse.project configured and {e}")))
    }
}
