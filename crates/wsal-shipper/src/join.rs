//! Merge metadata rows into their parent events

use crate::models::{EventRecord, ExportItem, MetadataRecord};
use std::collections::HashMap;

/// Build one [`ExportItem`] per event, in event order.
///
/// Metadata is indexed by `occurrence_id` first so the merge is linear in the
/// size of both inputs. Within one event, metadata is applied in fetch order,
/// so a repeated name keeps the last value. Metadata without a matching event
/// is ignored.
pub fn join(events: &[EventRecord], metadata: &[MetadataRecord]) -> Vec<ExportItem> {
    let mut by_event: HashMap<i64, Vec<&MetadataRecord>> = HashMap::new();
    for meta in metadata {
        by_event.entry(meta.occurrence_id).or_default().push(meta);
    }

    events
        .iter()
        .map(|event| {
            let mut item = ExportItem::from_event(event);
            if let Some(entries) = by_event.get(&event.id) {
                for meta in entries {
                    item.insert(&meta.name, meta.value.as_deref());
                }
            }
            item
        })
        .collect()
}
