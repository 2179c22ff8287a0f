use tally_core::NewTransaction;
use tracing::{debug, info, warn};

use crate::db::{insert_if_absent, InsertOutcome, LedgerStore, StorageError};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub skipped: usize,
}

/// Writes normalized statement records, skipping natural-key duplicates.
pub struct DedupWriter<'a> {
    store: &'a LedgerStore,
}

impl<'a> DedupWriter<'a> {
    pub fn new(store: &'a LedgerStore) -> Self {
        Self { store }
    }

    /// Writes the whole batch in one store transaction.
    ///
    /// Duplicates are counted and logged, never raised. Any store failure
    /// leaves the ledger as it was before the call.
    pub async fn write_batch<I>(&self, records: I) -> Result<ImportSummary, StorageError>
    where
        I: IntoIterator<Item = NewTransaction>,
    {
        let mut txn = self.store.begin().await?;
        let mut summary = ImportSummary::default();

        for record in records {
            match insert_if_absent(&mut *txn, &record).await? {
                InsertOutcome::Inserted(id) => {
                    summary.inserted += 1;
                    debug!(record_id = %id, key = %record.natural_key(), "record inserted");
                }
                InsertOutcome::Duplicate => {
                    summary.skipped += 1;
                    warn!(key = %record.natural_key(), "record already exists, skipped");
                }
            }
        }

        txn.commit().await?;
        info!(
            inserted = summary.inserted,
            skipped = summary.skipped,
            "import committed"
        );
        Ok(summary)
    }
}
