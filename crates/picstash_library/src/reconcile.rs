//! Out-of-band consistency sweep between the metadata and blob stores.

use crate::ImageLibrary;
use chrono::{DateTime, Utc};
use picstash_core::BlobKey;
use picstash_error::PicstashResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, warn};

/// What [`ImageLibrary::reconcile`] does with what it finds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileMode {
    /// Only report
    #[default]
    ReportOnly,
    /// Delete blobs no record references once they outlive the grace period
    RemoveOrphans,
}

/// Findings of a reconciliation sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Stored blobs no record referenced when the sweep ran
    pub orphaned_blobs: Vec<BlobKey>,
    /// Keys referenced by records but missing from the blob store
    pub dangling_keys: Vec<BlobKey>,
    /// Orphans actually deleted
    pub removed_blobs: Vec<BlobKey>,
    /// Orphans written within the grace period, left for a later sweep
    pub deferred_blobs: Vec<BlobKey>,
}

impl ReconciliationReport {
    /// Whether both stores agree.
    pub fn is_consistent(&self) -> bool {
        self.orphaned_blobs.is_empty() && self.dangling_keys.is_empty()
    }
}

impl ImageLibrary {
    /// Compare the keys referenced by metadata with the keys held by the
    /// blob store.
    ///
    /// Dangling keys are the residue of an interrupted delete and are only
    /// reported. Orphans are removed in [`ReconcileMode::RemoveOrphans`]
    /// when they were last written before the configured grace period and
    /// are still unreferenced when re-counted. An upload writes its blob
    /// before its record exists, so a younger orphan may be one in flight.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, mode: ReconcileMode) -> PicstashResult<ReconciliationReport> {
        let stored: BTreeSet<BlobKey> = self.blobs.list_keys().await?.into_iter().collect();
        let referenced = self.metadata.referenced_blob_keys().await?;

        let mut report = ReconciliationReport {
            orphaned_blobs: stored.difference(&referenced).cloned().collect(),
            dangling_keys: referenced.difference(&stored).cloned().collect(),
            removed_blobs: Vec::new(),
            deferred_blobs: Vec::new(),
        };

        for key in &report.dangling_keys {
            warn!(blob_key = %key, "Records reference a missing blob");
        }

        if mode == ReconcileMode::RemoveOrphans {
            let cutoff = Utc::now()
                .checked_sub_signed(self.config().orphan_grace_period())
                .unwrap_or(DateTime::<Utc>::MIN_UTC);

            for key in &report.orphaned_blobs {
                match self.blobs.stored_at(key).await {
                    Ok(stored_at) if stored_at > cutoff => {
                        debug!(
                            blob_key = %key,
                            %stored_at,
                            "Orphan within grace period, deferring"
                        );
                        report.deferred_blobs.push(key.clone());
                        continue;
                    }
                    Ok(_) => {}
                    Err(e) if e.is_not_found() => continue,
                    Err(e) => return Err(e.into()),
                }

                if self.release_blob(key).await? {
                    report.removed_blobs.push(key.clone());
                }
            }
        }

        info!(
            stored = stored.len(),
            referenced = referenced.len(),
            orphaned = report.orphaned_blobs.len(),
            dangling = report.dangling_keys.len(),
            removed = report.removed_blobs.len(),
            deferred = report.deferred_blobs.len(),
            "Reconciliation finished"
        );
        Ok(report)
    }
}
