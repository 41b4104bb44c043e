//! One delta-export run: offset → query → join → export → offset

use crate::context::ShipperContext;
use crate::error::Result;
use crate::export::Exporter;
use crate::join::join;
use crate::source::AuditSource;
use crate::storage::ObjectStore;
use std::path::PathBuf;
use tracing::{info, instrument, warn};

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// No event above the stored offset
    NothingToUpdate { offset: i64 },

    /// Local file written, no upload, offset untouched
    DryRun {
        last_id: i64,
        events: usize,
        file_path: PathBuf,
    },

    /// Uploaded. `offset_saved` is false when the marker could not be written,
    /// in which case the next run exports the same rows again.
    Shipped {
        last_id: i64,
        events: usize,
        file_path: PathBuf,
        object_key: String,
        offset_saved: bool,
    },
}

impl RunOutcome {
    /// One-line summary printed on stdout
    pub fn status_line(&self) -> String {
        match self {
            RunOutcome::NothingToUpdate { .. } => "[-] Nothing to update.".to_string(),
            RunOutcome::DryRun { .. } => "[+] Dry run, nothing was uploaded.".to_string(),
            RunOutcome::Shipped {
                last_id,
                offset_saved: true,
                ..
            } => format!("[+] Updated the log file. Last ID is now: {}", last_id),
            RunOutcome::Shipped {
                last_id,
                offset_saved: false,
                ..
            } => format!(
                "[!] Uploaded logs up to ID {} but could not update the log file; \
                 they will be exported again next run.",
                last_id
            ),
        }
    }
}

/// Run the pipeline once.
///
/// Holds the run lock for the whole read-modify-write of the offset. The offset
/// only advances after the export file was written and, for a live run, uploaded.
/// A dry run never writes the marker, not even to reset a malformed one.
#[instrument(skip_all, fields(config = %ctx.config_name, dry_run = dry_run))]
pub async fn run(
    ctx: &ShipperContext,
    source: &dyn AuditSource,
    store: &dyn ObjectStore,
    dry_run: bool,
) -> Result<RunOutcome> {
    let offsets = ctx.offset_store();
    let _lock = offsets.lock()?;

    let loaded = offsets.load();
    if loaded.malformed && !dry_run {
        if let Err(e) = offsets.reset() {
            warn!(path = %offsets.path().display(), error = %e, "Failed to reset offset marker");
        }
    }
    let offset = loaded.offset;
    info!(offset, "Starting export");

    let events = source.fetch_events(offset).await?;
    let Some(last_id) = events.last().map(|e| e.id) else {
        info!(offset, "No new events");
        return Ok(RunOutcome::NothingToUpdate { offset });
    };

    let metadata = source.fetch_metadata(offset).await?;
    info!(
        events = events.len(),
        metadata = metadata.len(),
        last_id,
        "Fetched new rows"
    );

    let batch = join(&events, &metadata);
    let outcome = Exporter::new(ctx, store)
        .export(&batch, last_id, dry_run)
        .await?;

    let bytes = outcome.bytes;
    let Some(object_key) = outcome.object_key else {
        return Ok(RunOutcome::DryRun {
            last_id,
            events: events.len(),
            file_path: outcome.file_path,
        });
    };

    let offset_saved = match offsets.save(last_id) {
        Ok(()) => true,
        Err(e) => {
            warn!(
                path = %offsets.path().display(),
                last_id,
                error = %e,
                "Upload succeeded but the offset marker was not updated"
            );
            false
        }
    };

    info!(last_id, bytes, key = %object_key, "Export shipped");

    Ok(RunOutcome::Shipped {
        last_id,
        events: events.len(),
        file_path: outcome.file_path,
        object_key,
        offset_saved,
    })
}
