use nextspin_core::{FusionOutcome, FusionResolver, Record, RecordStore, SourceResponse};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub entries: usize,
    pub added_or_updated: usize,
    pub unchanged: usize,
    /// Entries without an artist or title
    pub skipped: usize,
}

/// Fuse collection listing entries into the store.
pub fn ingest_collection(store: &mut RecordStore, entries: Vec<SourceResponse>) -> ImportReport {
    let resolver = FusionResolver::new();
    let mut report = ImportReport::default();

    for entry in entries {
        report.entries += 1;
        if entry.identity().is_none() {
            tracing::warn!(release_id = ?entry.release_id, "collection entry without artist or title, skipping");
            report.skipped += 1;
            continue;
        }
        match resolver.ingest(store, std::slice::from_ref(&entry)) {
            FusionOutcome::Updated => report.added_or_updated += 1,
            FusionOutcome::Unchanged => report.unchanged += 1,
            FusionOutcome::NoData => {
                // identity alone still establishes the record
                if let (Some(artist), Some(title)) = (entry.artist.as_deref(), entry.title.as_deref()) {
                    let record = Record::new(artist, title);
                    if !store.contains(&record.key) && store.upsert(record) {
                        report.added_or_updated += 1;
                        continue;
                    }
                }
                report.unchanged += 1;
            }
        }
    }

    tracing::info!(
        entries = report.entries,
        added_or_updated = report.added_or_updated,
        skipped = report.skipped,
        "collection imported"
    );
    report
}
