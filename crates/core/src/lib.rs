pub mod category;
pub mod money;
pub mod transaction;

pub use category::{Category, CategoryParseError};
pub use money::Money;
pub use transaction::{
    LedgerError, NaturalKey, NewTransaction, RecordId, TransactionRecord, TransactionType,
};
