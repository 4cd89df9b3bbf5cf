//! Background reconciliation from the remote store.

use serde::Serialize;

use super::SyncEngine;
use crate::error::Result;
use crate::models::Record;
use crate::remote::{decode_record, ListFilter, PageRequest};

/// Outcome of pulling one collection for a user
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PullReport {
    /// Remote records seen
    pub fetched: usize,
    /// Records written to the local store
    pub applied: usize,
    /// Records left alone because the local copy is newer or has queued changes
    pub kept_local: usize,
}

impl SyncEngine {
    /// Page through a user's remote records and merge them locally.
    ///
    /// Newer remote copies overwrite the cache (last writer wins by
    /// `updated_at`); documents with queued operations are never touched.
    pub async fn pull<R: Record>(&self, user_id: &str) -> Result<PullReport> {
        let filter = ListFilter::new().owner(user_id);
        let mut page = PageRequest::default();
        let mut report = PullReport::default();

        loop {
            let description = format!("list {}", R::COLLECTION);
            let remote = &self.inner.remote;
            let batch = self
                .with_timeout(&description, remote.list(R::COLLECTION, &filter, &page))
                .await?;

            for document in batch.records {
                report.fetched += 1;
                let record: R = decode_record(document)?;
                if self.store().reconcile(&record).await? {
                    report.applied += 1;
                } else {
                    report.kept_local += 1;
                }
            }

            match batch.cursor {
                Some(cursor) if batch.has_more => page.cursor = Some(cursor),
                _ => break,
            }
        }

        tracing::info!(
            "Pulled {} for {user_id}: fetched={} applied={} kept_local={}",
            R::COLLECTION,
            report.fetched,
            report.applied,
            report.kept_local
        );
        Ok(report)
    }
}
