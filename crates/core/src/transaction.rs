use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::category::Category;
use super::money::Money;

/// Surrogate key assigned by the ledger store on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Outcome,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Outcome => "outcome",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(TransactionType::Income),
            "outcome" => Ok(TransactionType::Outcome),
            other => Err(format!("Unknown transaction type: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Both spent ({spent}) and received ({received}) are nonzero")]
    AmountConflict { spent: Money, received: Money },
    #[error("Neither spent nor received carries an amount")]
    MissingAmount,
    #[error("Negative amount: {0}")]
    NegativeAmount(Money),
    #[error("Description is empty")]
    EmptyDescription,
}

/// A normalized statement row that has not been stored yet.
///
/// Construction enforces that exactly one of `spent` / `received` is nonzero,
/// and derives the transaction type from whichever one it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTransaction {
    date: NaiveDate,
    transaction_type: TransactionType,
    spent: Money,
    received: Money,
    description: String,
}

impl NewTransaction {
    pub fn new(
        date: NaiveDate,
        spent: Money,
        received: Money,
        description: impl Into<String>,
    ) -> Result<Self, LedgerError> {
        for amount in [spent, received] {
            if amount.is_negative() {
                return Err(LedgerError::NegativeAmount(amount));
            }
        }

        let transaction_type = match (spent.is_zero(), received.is_zero()) {
            (true, false) => TransactionType::Income,
            (false, true) => TransactionType::Outcome,
            (false, false) => return Err(LedgerError::AmountConflict { spent, received }),
            (true, true) => return Err(LedgerError::MissingAmount),
        };

        let description = description.into().trim().to_string();
        if description.is_empty() {
            return Err(LedgerError::EmptyDescription);
        }

        Ok(NewTransaction {
            date,
            transaction_type,
            spent,
            received,
            description,
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    pub fn spent(&self) -> Money {
        self.spent
    }

    pub fn received(&self) -> Money {
        self.received
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The nonzero side of the record.
    pub fn amount(&self) -> Money {
        match self.transaction_type {
            TransactionType::Income => self.received,
            TransactionType::Outcome => self.spent,
        }
    }

    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            date: self.date,
            description: self.description.clone(),
            transaction_type: self.transaction_type,
            amount: self.amount(),
        }
    }
}

/// Identity of a statement row for duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub date: NaiveDate,
    pub description: String,
    pub transaction_type: TransactionType,
    pub amount: Money,
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}' {} {}",
            self.date, self.description, self.transaction_type, self.amount
        )
    }
}

/// A row of the ledger store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    pub id: RecordId,
    pub date: NaiveDate,
    pub transaction_type: TransactionType,
    pub spent: Money,
    pub received: Money,
    pub description: String,
    pub category: Option<Category>,
}

impl TransactionRecord {
    pub fn amount(&self) -> Money {
        match self.transaction_type {
            TransactionType::Income => self.received,
            TransactionType::Outcome => self.spent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn outcome_when_spent() {
        let tx = NewTransaction::new(
            date(2024, 3, 12),
            Money::from_cents(450),
            Money::zero(),
            "TESCO LONDON",
        )
        .unwrap();
        assert_eq!(tx.transaction_type(), TransactionType::Outcome);
        assert_eq!(tx.amount(), Money::from_cents(450));
    }

    #[test]
    fn income_when_received() {
        let tx = NewTransaction::new(
            date(2024, 3, 1),
            Money::zero(),
            Money::from_cents(250_000),
            "SALARY",
        )
        .unwrap();
        assert_eq!(tx.transaction_type(), TransactionType::Income);
        assert_eq!(tx.amount(), Money::from_cents(250_000));
    }

    #[test]
    fn rejects_both_amounts() {
        let result = NewTransaction::new(
            date(2024, 3, 1),
            Money::from_cents(1),
            Money::from_cents(2),
            "BOTH",
        );
        assert!(matches!(result, Err(LedgerError::AmountConflict { .. })));
    }

    #[test]
    fn rejects_no_amount() {
        let result = NewTransaction::new(date(2024, 3, 1), Money::zero(), Money::zero(), "NONE");
        assert_eq!(result, Err(LedgerError::MissingAmount));
    }

    #[test]
    fn rejects_negative_amount() {
        let result = NewTransaction::new(
            date(2024, 3, 1),
            Money::from_cents(-300),
            Money::zero(),
            "REFUND",
        );
        assert!(matches!(result, Err(LedgerError::NegativeAmount(_))));
    }

    #[test]
    fn rejects_blank_description() {
        let result = NewTransaction::new(date(2024, 3, 1), Money::from_cents(1), Money::zero(), "  ");
        assert_eq!(result, Err(LedgerError::EmptyDescription));
    }

    #[test]
    fn natural_key_ignores_zero_side() {
        let a = NewTransaction::new(date(2024, 3, 1), Money::from_cents(999), Money::zero(), "UBER")
            .unwrap();
        let b = NewTransaction::new(date(2024, 3, 1), Money::from_cents(999), Money::zero(), " UBER ")
            .unwrap();
        assert_eq!(a.natural_key(), b.natural_key());
    }

    #[test]
    fn natural_keys_collapse_in_a_set() {
        use std::collections::HashSet;

        let spent = |desc: &str| {
            NewTransaction::new(date(2024, 3, 1), Money::from_cents(999), Money::zero(), desc)
                .unwrap()
                .natural_key()
        };
        let received =
            NewTransaction::new(date(2024, 3, 1), Money::zero(), Money::from_cents(999), "UBER")
                .unwrap()
                .natural_key();

        let keys: HashSet<NaturalKey> = [spent("UBER"), spent("UBER "), received].into_iter().collect();
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn transaction_type_parse() {
        assert_eq!("income".parse::<TransactionType>().unwrap(), TransactionType::Income);
        assert!("expense".parse::<TransactionType>().is_err());
    }
}
