//! Per-run context built once at startup and passed through the pipeline

use crate::config::Config;
use crate::offset::OffsetStore;
use std::path::PathBuf;

/// Everything a run needs to know about where it is and what it ships
#[derive(Debug, Clone)]
pub struct ShipperContext {
    pub config: Config,
    /// Name the configuration was selected by; part of every local file name
    pub config_name: String,
    /// Directory holding config files, the offset marker and `logs/`
    pub base_dir: PathBuf,
    /// Local host name, used in the uploaded object key
    pub hostname: String,
}

impl ShipperContext {
    pub fn new(
        config: Config,
        config_name: impl Into<String>,
        base_dir: impl Into<PathBuf>,
        hostname: impl Into<String>,
    ) -> Self {
        Self {
            config,
            config_name: config_name.into(),
            base_dir: base_dir.into(),
            hostname: hostname.into(),
        }
    }

    /// Marker file `log_track_<config-name>` in the base directory
    pub fn offset_store(&self) -> OffsetStore {
        OffsetStore::new(self.base_dir.join(format!("log_track_{}", self.config_name)))
    }

    /// Directory receiving the local JSON exports
    pub fn export_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    pub fn domain(&self) -> &str {
        &self.config.site.domain
    }
}
