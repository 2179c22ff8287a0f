use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tally_core::{RecordId, TransactionRecord};
use tally_storage::{fetch_uncategorized, set_category, LedgerStore, StorageError};
use thiserror::Error;
use tracing::{error, info};

use crate::engine::{CategorizeError, Categorizer, Resolution, ResolutionSource};
use crate::prompt::{PromptError, PromptPort};

/// What a categorization run does when the operator's answer is not a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidInputPolicy {
    /// Leave the record uncategorized and move on. Every resolved record is
    /// committed on its own.
    #[default]
    Skip,
    /// Stop the run and roll back every update it made. The run commits as
    /// one unit.
    Abort,
}

impl fmt::Display for InvalidInputPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidInputPolicy::Skip => f.write_str("skip"),
            InvalidInputPolicy::Abort => f.write_str("abort"),
        }
    }
}

impl FromStr for InvalidInputPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip" => Ok(InvalidInputPolicy::Skip),
            "abort" => Ok(InvalidInputPolicy::Abort),
            other => Err(format!("Unknown invalid-input policy: '{other}'")),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub auto: usize,
    pub manual: usize,
    pub skipped: usize,
}

impl RunSummary {
    pub fn categorized(&self) -> usize {
        self.auto + self.manual
    }

    fn count(&mut self, resolution: &Resolution) {
        match resolution.source {
            ResolutionSource::Keyword(_) => self.auto += 1,
            ResolutionSource::Operator => self.manual += 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Run aborted on invalid input '{input}' for record {id}; {rolled_back} update(s) rolled back")]
    Aborted {
        id: RecordId,
        input: String,
        rolled_back: usize,
    },
    #[error(transparent)]
    Store(#[from] StorageError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// Applies categorization decisions to the ledger with defined failure semantics.
///
/// A run owns the store and closes it when it finishes, whatever the outcome.
pub struct Coordinator {
    store: LedgerStore,
    categorizer: Categorizer,
    policy: InvalidInputPolicy,
}

impl Coordinator {
    pub fn new(store: LedgerStore, categorizer: Categorizer, policy: InvalidInputPolicy) -> Self {
        Self {
            store,
            categorizer,
            policy,
        }
    }

    pub async fn run<P>(self, prompt: &mut P) -> Result<RunSummary, RunError>
    where
        P: PromptPort + ?Sized,
    {
        let Coordinator {
            store,
            categorizer,
            policy,
        } = self;

        info!(%policy, "categorization run started");
        let result = match policy {
            InvalidInputPolicy::Skip => run_per_record(&store, &categorizer, prompt).await,
            InvalidInputPolicy::Abort => run_atomic(&store, &categorizer, prompt).await,
        };

        match &result {
            Ok(summary) => info!(
                auto = summary.auto,
                manual = summary.manual,
                skipped = summary.skipped,
                "categorization run finished"
            ),
            Err(e) => error!(error = %e, "categorization run failed"),
        }

        store.close().await;
        result
    }
}

/// Commits each record as soon as it is resolved; a bad answer only costs
/// that record.
async fn run_per_record<P>(
    store: &LedgerStore,
    categorizer: &Categorizer,
    prompt: &mut P,
) -> Result<RunSummary, RunError>
where
    P: PromptPort + ?Sized,
{
    let pending = store.uncategorized().await?;
    let mut summary = RunSummary::default();

    for record in &pending {
        // The prompt blocks; no store transaction is open while it waits.
        let resolution = match categorizer.resolve(record, prompt) {
            Ok(resolution) => resolution,
            Err(CategorizeError::InvalidCategoryInput { id, input }) => {
                error!(record_id = %id, input = %input, "invalid category input, record left uncategorized");
                prompt.notify_invalid(record, &input);
                summary.skipped += 1;
                continue;
            }
            Err(CategorizeError::Prompt(e)) => return Err(e.into()),
        };

        let mut txn = store.begin().await?;
        set_category(&mut *txn, record.id, resolution.category).await?;
        txn.commit().await.map_err(StorageError::from)?;

        log_resolution(record, &resolution);
        summary.count(&resolution);
    }

    Ok(summary)
}

/// Stages every update in one transaction; a bad answer discards them all.
async fn run_atomic<P>(
    store: &LedgerStore,
    categorizer: &Categorizer,
    prompt: &mut P,
) -> Result<RunSummary, RunError>
where
    P: PromptPort + ?Sized,
{
    let mut txn = store.begin().await?;
    let pending = fetch_uncategorized(&mut *txn).await?;
    let mut summary = RunSummary::default();

    for record in &pending {
        let resolution = match categorizer.resolve(record, prompt) {
            Ok(resolution) => resolution,
            Err(CategorizeError::InvalidCategoryInput { id, input }) => {
                error!(record_id = %id, input = %input, "invalid category input, aborting run");
                prompt.notify_invalid(record, &input);
                let rolled_back = summary.categorized();
                // Nothing is committed even if the rollback fails; report the abort.
                if let Err(e) = txn.rollback().await {
                    error!(error = %e, "rollback after invalid input failed");
                }
                return Err(RunError::Aborted {
                    id,
                    input,
                    rolled_back,
                });
            }
            Err(CategorizeError::Prompt(e)) => {
                if let Err(rollback) = txn.rollback().await {
                    error!(error = %rollback, "rollback after prompt failure failed");
                }
                return Err(e.into());
            }
        };

        set_category(&mut *txn, record.id, resolution.category).await?;
        log_resolution(record, &resolution);
        summary.count(&resolution);
    }

    txn.commit().await.map_err(StorageError::from)?;
    Ok(summary)
}

fn log_resolution(record: &TransactionRecord, resolution: &Resolution) {
    match &resolution.source {
        ResolutionSource::Keyword(keyword) => info!(
            record_id = %record.id,
            category = %resolution.category,
            keyword = %keyword,
            "auto-categorized"
        ),
        ResolutionSource::Operator => info!(
            record_id = %record.id,
            category = %resolution.category,
            "categorized by operator"
        ),
    }
}
