pub mod db;
pub mod writer;

pub use db::{
    fetch_uncategorized, insert_if_absent, set_category, DbPool, InsertOutcome, LedgerStore,
    StorageError,
};
pub use writer::{DedupWriter, ImportSummary};
