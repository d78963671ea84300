#![forbid(unsafe_code)]

use super::StoreError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tg_core::SchemaCatalog;

/// Thirty days.
pub const DEFAULT_UNDO_PERIOD_SECS: u64 = 30 * 24 * 60 * 60;

pub const STORAGE_DIR_ENV: &str = "TREEGRID_STORAGE_DIR";
pub const UNDO_PERIOD_ENV: &str = "TREEGRID_UNDO_PERIOD_SECS";

/// Engine configuration, usually loaded from YAML:
///
/// ```yaml
/// storage_dir: /var/lib/treegrid
/// undo_period_secs: 86400
/// tables:
///   tl_page: { pid: true, sorting: true, children: [tl_article] }
///   tl_article: { pid: true, sorting: true, parent: tl_page }
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
    #[serde(default = "default_undo_period_secs")]
    pub undo_period_secs: u64,
    #[serde(default)]
    pub tables: SchemaCatalog,
}

fn default_undo_period_secs() -> u64 {
    DEFAULT_UNDO_PERIOD_SECS
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            undo_period_secs: DEFAULT_UNDO_PERIOD_SECS,
            tables: SchemaCatalog::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self, StoreError> {
        let config: Self =
            serde_yaml::from_str(raw).map_err(|err| StoreError::Config(err.to_string()))?;
        config
            .tables
            .validate()
            .map_err(|err| StoreError::Config(err.to_string()))?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&raw)
    }

    /// Applies `TREEGRID_*` environment overrides.
    pub fn with_env_overrides(self) -> Result<Self, StoreError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, StoreError> {
        if let Some(raw) = lookup(STORAGE_DIR_ENV) {
            let raw = raw.trim();
            if !raw.is_empty() {
                self.storage_dir = Some(PathBuf::from(raw));
            }
        }
        if let Some(raw) = lookup(UNDO_PERIOD_ENV) {
            self.undo_period_secs = raw.trim().parse::<u64>().map_err(|_| {
                StoreError::Config(format!("{UNDO_PERIOD_ENV} must be a number of seconds"))
            })?;
        }
        Ok(self)
    }
}
