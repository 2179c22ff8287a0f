use chrono::NaiveDate;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Executor, Pool, Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tally_core::{Category, Money, NewTransaction, RecordId, TransactionRecord, TransactionType};
use thiserror::Error;

pub type DbPool = Pool<Sqlite>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Ledger store unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
    #[error("Record {id} is corrupt: {reason}")]
    Corrupt { id: RecordId, reason: String },
    #[error("Record {0} is not awaiting a category")]
    NotUncategorized(RecordId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(RecordId),
    Duplicate,
}

const RECORD_COLUMNS: &str =
    "id, date, transaction_type, spent_cents, received_cents, operation, category";

type RecordRow = (i64, String, String, i64, i64, String, Option<String>);

/// Exclusive handle on the ledger database.
///
/// The pool holds a single connection, so an open [`Transaction`] owns the
/// store until it is committed or dropped.
pub struct LedgerStore {
    pool: DbPool,
}

impl LedgerStore {
    pub async fn open(path: &Path) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// A private store that lives as long as the handle. Used by tests.
    pub async fn open_in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, StorageError> {
        Ok(self.pool.begin().await?)
    }

    pub async fn insert_if_absent(
        &self,
        record: &NewTransaction,
    ) -> Result<InsertOutcome, StorageError> {
        insert_if_absent(&self.pool, record).await
    }

    pub async fn uncategorized(&self) -> Result<Vec<TransactionRecord>, StorageError> {
        fetch_uncategorized(&self.pool).await
    }

    pub async fn set_category(&self, id: RecordId, category: Category) -> Result<(), StorageError> {
        set_category(&self.pool, id, category).await
    }

    pub async fn get(&self, id: RecordId) -> Result<Option<TransactionRecord>, StorageError> {
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM budget WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(record_from_row).transpose()
    }

    pub async fn all(&self) -> Result<Vec<TransactionRecord>, StorageError> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM budget ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(record_from_row).collect()
    }

    /// Record count per category, uncategorized (`None`) last.
    pub async fn category_counts(&self) -> Result<Vec<(Option<Category>, i64)>, StorageError> {
        let rows = sqlx::query_as::<_, (Option<String>, i64)>(
            "SELECT category, COUNT(*) FROM budget GROUP BY category ORDER BY category IS NULL, category",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(category, count)| {
                let category = category
                    .map(|c| Category::from_str(&c))
                    .transpose()
                    .map_err(|e| StorageError::Corrupt {
                        id: RecordId(0),
                        reason: e.to_string(),
                    })?;
                Ok((category, count))
            })
            .collect()
    }

    /// Releases the connection. Uncommitted work has already been rolled back
    /// by then, because every transaction borrows from this handle.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    // `id` is an alias of the SQLite rowid. A NULL category means the row
    // still waits for categorization.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS budget (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            transaction_type TEXT NOT NULL CHECK (transaction_type IN ('income', 'outcome')),
            spent_cents INTEGER NOT NULL DEFAULT 0 CHECK (spent_cents >= 0),
            received_cents INTEGER NOT NULL DEFAULT 0 CHECK (received_cents >= 0),
            operation TEXT NOT NULL,
            category TEXT CHECK (category IS NULL OR category IN
                ('food', 'entertainment', 'transport', 'home', 'other', 'na')),
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            CHECK (spent_cents = 0 OR received_cents = 0),
            UNIQUE (date, operation, spent_cents, received_cents)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS budget_uncategorized ON budget (id) WHERE category IS NULL",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Inserts `record` unless a row with the same natural key exists.
pub async fn insert_if_absent<'e, E>(
    executor: E,
    record: &NewTransaction,
) -> Result<InsertOutcome, StorageError>
where
    E: Executor<'e, Database = Sqlite>,
{
    // Only the uniqueness conflict is absorbed; CHECK violations still fail.
    let result = sqlx::query(
        "INSERT INTO budget (date, transaction_type, spent_cents, received_cents, operation) \
         VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT (date, operation, spent_cents, received_cents) DO NOTHING",
    )
    .bind(record.date().to_string())
    .bind(record.transaction_type().as_str())
    .bind(record.spent().to_cents())
    .bind(record.received().to_cents())
    .bind(record.description())
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        Ok(InsertOutcome::Duplicate)
    } else {
        Ok(InsertOutcome::Inserted(RecordId(result.last_insert_rowid())))
    }
}

/// Rows without a category, in insertion order.
pub async fn fetch_uncategorized<'e, E>(executor: E) -> Result<Vec<TransactionRecord>, StorageError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, RecordRow>(&format!(
        "SELECT {RECORD_COLUMNS} FROM budget WHERE category IS NULL ORDER BY id"
    ))
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(record_from_row).collect()
}

/// Assigns a category to a row that does not have one yet.
pub async fn set_category<'e, E>(
    executor: E,
    id: RecordId,
    category: Category,
) -> Result<(), StorageError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE budget SET category = ? WHERE id = ? AND category IS NULL")
        .bind(category.as_str())
        .bind(id.0)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StorageError::NotUncategorized(id));
    }
    Ok(())
}

fn record_from_row(row: RecordRow) -> Result<TransactionRecord, StorageError> {
    let (id, date, transaction_type, spent_cents, received_cents, operation, category) = row;
    let id = RecordId(id);
    let corrupt = |reason: String| StorageError::Corrupt { id, reason };

    Ok(TransactionRecord {
        id,
        date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|e| corrupt(format!("date '{date}': {e}")))?,
        transaction_type: TransactionType::from_str(&transaction_type).map_err(corrupt)?,
        spent: Money::from_cents(spent_cents),
        received: Money::from_cents(received_cents),
        description: operation,
        category: category
            .map(|c| Category::from_str(&c))
            .transpose()
            .map_err(|e| corrupt(e.to_string()))?,
    })
}
