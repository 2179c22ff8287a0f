use anyhow::{Context, Result};
use std::path::Path;
use tally_categorize::{Categorizer, Coordinator, InvalidInputPolicy, PromptPort, RunSummary};
use tally_core::{Category, TransactionRecord};
use tally_import::read_statement;
use tally_storage::{DedupWriter, ImportSummary, LedgerStore};
use tracing::{error, info, warn};

use crate::config::Config;

async fn open_store(config: &Config) -> Result<LedgerStore> {
    if let Some(parent) = config.database.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    match LedgerStore::open(&config.database).await {
        Ok(store) => Ok(store),
        Err(e) => {
            error!(database = %config.database.display(), error = %e, "ledger store unavailable");
            Err(e).with_context(|| format!("open ledger {}", config.database.display()))
        }
    }
}

/// Reads the whole statement, then writes it as one batch. A malformed
/// statement is rejected before the ledger is touched.
pub async fn import(config: &Config, file: &Path) -> Result<ImportSummary> {
    info!(file = %file.display(), "import started");
    let records = match read_statement(file, &config.statement) {
        Ok(records) => records,
        Err(e) => {
            error!(file = %file.display(), error = %e, "statement rejected, nothing imported");
            return Err(e).with_context(|| format!("read statement {}", file.display()));
        }
    };

    let store = open_store(config).await?;
    let result = DedupWriter::new(&store).write_batch(records).await;
    store.close().await;

    match result {
        Ok(summary) => Ok(summary),
        Err(e) => {
            error!(file = %file.display(), error = %e, "import rolled back");
            Err(e).context("import rolled back, ledger unchanged")
        }
    }
}

pub async fn categorize<P>(
    config: &Config,
    policy: InvalidInputPolicy,
    prompt: &mut P,
) -> Result<RunSummary>
where
    P: PromptPort + ?Sized,
{
    let keywords = config.keyword_table().inspect_err(|e| {
        error!(error = %format!("{e:#}"), "keyword table rejected");
    })?;
    if keywords.is_empty() {
        warn!("keyword table is empty, every record goes to the operator");
    }
    let categorizer = Categorizer::new(keywords);
    let store = open_store(config).await?;
    let summary = Coordinator::new(store, categorizer, policy)
        .run(prompt)
        .await?;
    Ok(summary)
}

pub async fn pending(config: &Config) -> Result<Vec<TransactionRecord>> {
    let store = open_store(config).await?;
    let result = store.uncategorized().await;
    store.close().await;
    Ok(result.inspect_err(|e| error!(error = %e, "listing uncategorized records failed"))?)
}

pub async fn summary(config: &Config) -> Result<Vec<(Option<Category>, i64)>> {
    let store = open_store(config).await?;
    let result = store.category_counts().await;
    store.close().await;
    Ok(result.inspect_err(|e| error!(error = %e, "category summary failed"))?)
}
