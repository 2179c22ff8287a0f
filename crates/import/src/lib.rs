pub mod amount;
pub mod date;
pub mod rules;
pub mod statement;

pub use rules::{KeywordGroup, KeywordMatch, KeywordTable, RulesError};
pub use statement::{read_statement, ColumnNames, ParseError, StatementProfile, StatementReader};
