//! Writing the JSON export and shipping it to object storage

use crate::context::ShipperContext;
use crate::error::Result;
use crate::models::ExportItem;
use crate::storage::ObjectStore;
use std::path::PathBuf;
use tracing::{error, info};

/// First segment of every uploaded object key. Downstream consumers list by it.
pub const OBJECT_KEY_PREFIX: &str = "wordpress";

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// `wp-audit-logs-<config-name>-<last-id>.json`
pub fn export_file_name(config_name: &str, last_id: i64) -> String {
    format!("wp-audit-logs-{}-{}.json", config_name, last_id)
}

/// `wordpress/<domain>/<hostname>--<file-name>`
pub fn object_key(domain: &str, hostname: &str, file_name: &str) -> String {
    format!("{}/{}/{}--{}", OBJECT_KEY_PREFIX, domain, hostname, file_name)
}

/// What an export produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    pub file_path: PathBuf,
    /// Set only when the file was uploaded
    pub object_key: Option<String>,
    pub bytes: usize,
}

/// Serializes export batches and hands them to an [`ObjectStore`]
pub struct Exporter<'a> {
    ctx: &'a ShipperContext,
    store: &'a dyn ObjectStore,
}

impl<'a> Exporter<'a> {
    pub fn new(ctx: &'a ShipperContext, store: &'a dyn ObjectStore) -> Self {
        Self { ctx, store }
    }

    /// Write `batch` to the local export file and, unless `dry_run`, upload the
    /// same bytes.
    ///
    /// An `Err` means nothing may be considered shipped: the caller must not
    /// advance the offset.
    pub async fn export(
        &self,
        batch: &[ExportItem],
        last_id: i64,
        dry_run: bool,
    ) -> Result<ExportOutcome> {
        let file_name = export_file_name(&self.ctx.config_name, last_id);
        let export_dir = self.ctx.export_dir();
        let file_path = export_dir.join(&file_name);

        let data = serde_json::to_vec(batch)?;
        tokio::fs::create_dir_all(&export_dir).await?;
        tokio::fs::write(&file_path, &data).await?;

        info!(
            path = %file_path.display(),
            items = batch.len(),
            bytes = data.len(),
            "Export file written"
        );

        let bytes = data.len();

        if dry_run {
            return Ok(ExportOutcome {
                file_path,
                object_key: None,
                bytes,
            });
        }

        let key = object_key(self.ctx.domain(), &self.ctx.hostname, &file_name);
        if let Err(e) = self.store.put(&key, data, JSON_CONTENT_TYPE).await {
            error!(key = %key, error = %e, "Upload failed");
            return Err(e);
        }

        Ok(ExportOutcome {
            file_path,
            object_key: Some(key),
            bytes,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_format() {
        assert_eq!(export_file_name("config", 12), "wp-audit-logs-config-12.json");
        assert_eq!(export_file_name("prod-eu", 0), "wp-audit-logs-prod-eu-0.json");
    }

    #[test]
    fn test_object_key_format() {
        assert_eq!(
            object_key("example.com", "web-01", "wp-audit-logs-config-12.json"),
            "wordpress/example.com/web-01--wp-audit-logs-config-12.json"
        );
    }
}
