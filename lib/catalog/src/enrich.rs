//! Batch enrichment
//!
//! For each record the [`Enricher`] plans a short chain of lookups, fuses
//! whatever comes back over the stored record and writes the result. Items
//! are looked up and fused concurrently (up to `concurrency` at a time);
//! writes to the store happen one at a time on the calling task.

use crate::source::{CatalogSource, LookupRequest};
use futures_util::stream::{self, StreamExt};
use nextspin_core::{FusionOutcome, FusionResolver, IdentityKey, NumericAttr, Record, RecordStore, SourceResponse};
use serde::Serialize;
use std::fmt;

/// Counts for one enrichment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentReport {
    pub items: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub no_data: usize,
    /// Individual lookups that failed (transport, timeout, bad status)
    pub failed_lookups: usize,
}

impl EnrichmentReport {
    fn record(&mut self, outcome: FusionOutcome, failed_lookups: usize) {
        self.items += 1;
        self.failed_lookups += failed_lookups;
        match outcome {
            FusionOutcome::Updated => self.updated += 1,
            FusionOutcome::Unchanged => self.unchanged += 1,
            FusionOutcome::NoData => self.no_data += 1,
        }
    }
}

impl fmt::Display for EnrichmentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} items: {} updated, {} unchanged, {} without data, {} failed lookups",
            self.items, self.updated, self.unchanged, self.no_data, self.failed_lookups
        )
    }
}

/// Result of enriching a single record, before it is written.
#[derive(Debug, Clone)]
pub struct ItemEnrichment {
    pub key: IdentityKey,
    /// `None` when no lookup returned data
    pub fused: Option<Record>,
    pub failed_lookups: usize,
}

pub struct Enricher<S> {
    source: S,
    resolver: FusionResolver,
    concurrency: usize,
}

impl<S: CatalogSource> Enricher<S> {
    pub fn new(source: S, concurrency: usize) -> Self {
        Self {
            source,
            resolver: FusionResolver::new(),
            concurrency: concurrency.max(1),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    async fn fetch(&self, request: LookupRequest, key: &IdentityKey, failed: &mut usize) -> Option<SourceResponse> {
        match self.source.lookup(&request).await {
            Ok(response) => response,
            Err(e) => {
                *failed += 1;
                tracing::warn!(%key, %request, error = %e, "lookup failed, continuing without it");
                None
            }
        }
    }

    /// Run the lookup plan for one record and fuse the responses over it.
    ///
    /// 1. no release or master id known: search by artist and title
    /// 2. release id known: release lookup
    /// 3. release missing or lacking a demand counter: master lookup
    /// 4. still no price: marketplace stats for the release
    pub async fn enrich_record(&self, record: &Record) -> ItemEnrichment {
        let key = record.key.clone();
        let mut failed = 0;
        let mut responses: Vec<SourceResponse> = Vec::new();

        let mut release_id = record.release_id;
        let mut master_id = record.master_id;

        if release_id.is_none() && master_id.is_none() {
            let search = LookupRequest::Search {
                artist: record.artist.clone(),
                title: record.title.clone(),
            };
            if let Some(hit) = self.fetch(search, &key, &mut failed).await {
                release_id = hit.release_id;
                master_id = hit.master_id;
                responses.push(hit);
            }
        }

        let mut release_has_demand = false;
        if let Some(id) = release_id {
            if let Some(release) = self.fetch(LookupRequest::Release(id), &key, &mut failed).await {
                release_has_demand = release.numeric.contains_key(&NumericAttr::WantCount)
                    && release.numeric.contains_key(&NumericAttr::HaveCount);
                master_id = master_id.or(release.master_id);
                responses.push(release);
            }
        }

        if !release_has_demand {
            if let Some(id) = master_id {
                if let Some(master) = self.fetch(LookupRequest::Master(id), &key, &mut failed).await {
                    responses.push(master);
                }
            }
        }

        let price_known = record.numeric(NumericAttr::LowestPrice).is_some()
            || responses
                .iter()
                .any(|r| r.numeric.contains_key(&NumericAttr::LowestPrice));
        if !price_known {
            if let Some(id) = release_id {
                if let Some(stats) = self.fetch(LookupRequest::MarketplaceStats(id), &key, &mut failed).await {
                    responses.push(stats);
                }
            }
        }

        let fused = self
            .resolver
            .fuse(&record.artist, &record.title, Some(record), &responses);
        ItemEnrichment {
            key,
            fused,
            failed_lookups: failed,
        }
    }

    /// Enrich every record in the store.
    pub async fn enrich_store(&self, store: &mut RecordStore) -> EnrichmentReport {
        let records: Vec<Record> = store.iter().cloned().collect();
        self.enrich_records(store, records).await
    }

    /// Enrich `records` and write the fused results into `store`.
    pub async fn enrich_records(&self, store: &mut RecordStore, records: Vec<Record>) -> EnrichmentReport {
        let total = records.len();
        let mut report = EnrichmentReport::default();

        let mut results = stream::iter(records.iter())
            .map(|record| self.enrich_record(record))
            .buffer_unordered(self.concurrency);

        while let Some(item) = results.next().await {
            let outcome = self.resolver.apply(store, item.fused);
            tracing::debug!(key = %item.key, ?outcome, "enriched");
            if outcome == FusionOutcome::NoData {
                tracing::warn!(key = %item.key, "no catalog data found");
            }
            report.record(outcome, item.failed_lookups);
            if report.items % 25 == 0 {
                tracing::info!(done = report.items, total, "enrichment progress");
            }
        }

        tracing::info!(%report, "enrichment finished");
        report
    }
}
