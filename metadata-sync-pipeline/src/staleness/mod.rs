//! Staleness resolution.
//!
//! Decides which upsert candidates need (re)indexing by comparing each
//! row's effective timestamp with the timestamp stored in the index.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::errors::{EntryFailure, Operation};
use metadata_sync_repository::IndexClient;
use metadata_sync_shared::{fields, ChangeRow, DocumentId};

/// Rows that need indexing, plus the lookups that failed.
#[derive(Debug, Default)]
pub struct StalenessReport {
    /// Stale or absent rows, in lookup response order.
    pub stale: Vec<(DocumentId, ChangeRow)>,
    pub failures: Vec<EntryFailure>,
}

/// Whether a row with timestamp `row_ms` must be written over a document
/// storing `stored_ms` (`None` when the document does not exist).
pub fn is_stale(row_ms: i64, stored_ms: Option<i64>) -> bool {
    match stored_ms {
        None => true,
        Some(stored) => row_ms > stored,
    }
}

/// Classifies candidate rows against the index.
pub struct StalenessResolver {
    index_client: Arc<dyn IndexClient>,
    index: String,
}

impl StalenessResolver {
    pub fn new(index_client: Arc<dyn IndexClient>, index: impl Into<String>) -> Self {
        Self {
            index_client,
            index: index.into(),
        }
    }

    /// Look up the stored timestamp of every candidate in one multi-get and
    /// keep the rows that are newer than what is indexed.
    ///
    /// The index is refreshed before the lookup so deletes and writes from
    /// the same or the previous batch are visible. Rows that are current are
    /// dropped without being reported.
    #[instrument(skip(self, candidates), fields(index = %self.index, candidates = candidates.len()))]
    pub async fn classify(&self, candidates: &BTreeMap<DocumentId, ChangeRow>) -> StalenessReport {
        let mut report = StalenessReport::default();
        if candidates.is_empty() {
            return report;
        }

        let ids: Vec<DocumentId> = candidates.keys().cloned().collect();
        let outcomes = match self
            .index_client
            .multi_get(&self.index, &ids, &[fields::TIMESTAMP], true)
            .await
        {
            Ok(outcomes) => outcomes,
            Err(e) => {
                report.failures.push(EntryFailure::new(
                    Operation::Lookup,
                    None,
                    format!("Multi-get of {} documents failed: {}", ids.len(), e),
                ));
                return report;
            }
        };

        let mut answered: HashSet<DocumentId> = HashSet::with_capacity(outcomes.len());
        for outcome in outcomes {
            let Some(row) = candidates.get(&outcome.id) else {
                report.failures.push(EntryFailure::for_doc(
                    Operation::Lookup,
                    &outcome.id,
                    "Unknown row for id",
                ));
                continue;
            };
            answered.insert(outcome.id.clone());

            if let Some(error) = &outcome.error {
                report
                    .failures
                    .push(EntryFailure::for_doc(Operation::Lookup, &outcome.id, error.clone()));
                continue;
            }

            let row_ms = match row.last_modified() {
                Ok(ts) => ts.as_millis(),
                Err(e) => {
                    report.failures.push(EntryFailure::for_doc(
                        Operation::Lookup,
                        &outcome.id,
                        format!("Row {} has an unusable timestamp: {}", row.row_id, e),
                    ));
                    continue;
                }
            };

            let stored_ms = outcome
                .found
                .then(|| outcome.source_i64(fields::TIMESTAMP).unwrap_or(0));
            if is_stale(row_ms, stored_ms) {
                report.stale.push((outcome.id, row.clone()));
            } else {
                debug!(doc_id = %outcome.id, row_ms, "Skipping current document");
            }
        }

        for id in ids.iter().filter(|id| !answered.contains(*id)) {
            report.failures.push(EntryFailure::for_doc(
                Operation::Lookup,
                id,
                "No lookup result for id",
            ));
        }

        debug!(
            stale = report.stale.len(),
            failures = report.failures.len(),
            "Classified candidates"
        );
        report
    }
}
