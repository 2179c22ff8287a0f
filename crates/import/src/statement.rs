use calamine::{open_workbook_auto, Data, Reader};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::File;
use std::path::{Path, PathBuf};
use tally_core::{LedgerError, Money, NewTransaction};
use thiserror::Error;

use crate::amount::parse_amount;
use crate::date::{parse_date, DEFAULT_DATE_FORMATS};

/// Header names of the logical statement columns.
///
/// The payer/recipient column some banks export is never read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub date: String,
    pub spent: String,
    pub received: String,
    pub operation: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            date: "date".to_string(),
            spent: "spent".to_string(),
            received: "received".to_string(),
            operation: "operation".to_string(),
        }
    }
}

/// Layout of one bank's statement export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementProfile {
    /// Zero-based index of the header row. Rows above it are preamble.
    /// Delimited files do not count blank lines.
    pub header_row: usize,
    /// Trailing rows (totals, disclaimers) dropped from the end of the source.
    pub footer_rows: usize,
    pub delimiter: char,
    /// Worksheet to read from a spreadsheet; the first one when unset.
    pub sheet: Option<String>,
    pub date_formats: Vec<String>,
    pub columns: ColumnNames,
}

impl Default for StatementProfile {
    fn default() -> Self {
        Self {
            header_row: 0,
            footer_rows: 0,
            delimiter: ',',
            sheet: None,
            date_formats: DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect(),
            columns: ColumnNames::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Statement not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    #[error("Unsupported statement format: '{0}'")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),
    #[error("Spreadsheet has no worksheets")]
    NoWorksheet,
    #[error("Header row {0} is past the end of the statement")]
    MissingHeader(usize),
    #[error("Missing required column: {0}")]
    MissingColumn(String),
    #[error("Row {row}: missing value for '{column}'")]
    MissingField { row: usize, column: String },
    #[error("Row {row}: invalid date '{value}'")]
    InvalidDate { row: usize, value: String },
    #[error("Row {row}: invalid amount '{value}' in '{column}'")]
    InvalidAmount {
        row: usize,
        column: String,
        value: String,
    },
    #[error("Row {row}: {source}")]
    InvalidRecord { row: usize, source: LedgerError },
}

type RawRow = Vec<String>;

/// Raw rows from whichever tabular backend the source needs.
enum Rows {
    Delimited(csv::StringRecordsIntoIter<File>),
    Sheet(std::vec::IntoIter<RawRow>),
}

impl Iterator for Rows {
    type Item = Result<RawRow, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Rows::Delimited(records) => records.next().map(|record| {
                record
                    .map(|r| r.iter().map(str::to_string).collect())
                    .map_err(ParseError::from)
            }),
            Rows::Sheet(rows) => rows.next().map(Ok),
        }
    }
}

struct ColumnIndex {
    date: usize,
    spent: usize,
    received: usize,
    operation: usize,
}

impl ColumnIndex {
    fn resolve(header: &[String], names: &ColumnNames) -> Result<Self, ParseError> {
        let find = |name: &str| {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name.trim()))
                .ok_or_else(|| ParseError::MissingColumn(name.to_string()))
        };
        Ok(Self {
            date: find(&names.date)?,
            spent: find(&names.spent)?,
            received: find(&names.received)?,
            operation: find(&names.operation)?,
        })
    }
}

/// Single-pass reader over a statement, yielding normalized records.
///
/// The reader holds back `footer_rows` rows so the footer is never yielded.
/// After the first error it yields nothing further.
pub struct StatementReader {
    rows: Rows,
    index: ColumnIndex,
    names: ColumnNames,
    date_formats: Vec<String>,
    footer_rows: usize,
    pending: VecDeque<(usize, RawRow)>,
    consumed: usize,
    exhausted: bool,
    failed: bool,
}

impl StatementReader {
    pub fn open(path: &Path, profile: &StatementProfile) -> Result<Self, ParseError> {
        if !path.is_file() {
            return Err(ParseError::SourceNotFound(path.to_path_buf()));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let rows = match extension.as_str() {
            "csv" | "txt" | "tsv" => delimited_rows(path, profile)?,
            "xls" | "xlsx" | "xlsm" | "xlsb" | "ods" => sheet_rows(path, profile.sheet.as_deref())?,
            other => return Err(ParseError::UnsupportedFormat(other.to_string())),
        };

        Self::from_rows(rows, profile)
    }

    fn from_rows(mut rows: Rows, profile: &StatementProfile) -> Result<Self, ParseError> {
        let mut consumed = 0;
        let header = loop {
            let row = rows
                .next()
                .ok_or(ParseError::MissingHeader(profile.header_row))??;
            consumed += 1;
            if consumed > profile.header_row {
                break row;
            }
        };
        let index = ColumnIndex::resolve(&header, &profile.columns)?;

        Ok(Self {
            rows,
            index,
            names: profile.columns.clone(),
            date_formats: profile.date_formats.clone(),
            footer_rows: profile.footer_rows,
            pending: VecDeque::with_capacity(profile.footer_rows + 1),
            consumed,
            exhausted: false,
            failed: false,
        })
    }

    fn fill(&mut self) -> Result<(), ParseError> {
        while !self.exhausted && self.pending.len() <= self.footer_rows {
            match self.rows.next() {
                Some(row) => {
                    self.consumed += 1;
                    self.pending.push_back((self.consumed, row?));
                }
                None => self.exhausted = true,
            }
        }
        Ok(())
    }

    fn normalize(&self, row_number: usize, row: &[String]) -> Result<NewTransaction, ParseError> {
        let cell = |idx: usize| row.get(idx).map(|s| s.trim()).unwrap_or_default();

        let raw_date = cell(self.index.date);
        if raw_date.is_empty() {
            return Err(ParseError::MissingField {
                row: row_number,
                column: self.names.date.clone(),
            });
        }
        let date = parse_date(raw_date, &self.date_formats).ok_or_else(|| ParseError::InvalidDate {
            row: row_number,
            value: raw_date.to_string(),
        })?;

        let amount = |idx: usize, column: &str| {
            let raw = cell(idx);
            // Sub-penny precision is malformed input, never rounded away.
            parse_amount(raw)
                .filter(|value| value.round_dp(2) == *value)
                .map(Money::from_decimal)
                .ok_or_else(|| ParseError::InvalidAmount {
                    row: row_number,
                    column: column.to_string(),
                    value: raw.to_string(),
                })
        };
        let spent = amount(self.index.spent, &self.names.spent)?;
        let received = amount(self.index.received, &self.names.received)?;

        let description = cell(self.index.operation);
        if description.is_empty() {
            return Err(ParseError::MissingField {
                row: row_number,
                column: self.names.operation.clone(),
            });
        }

        NewTransaction::new(date, spent, received, description).map_err(|source| {
            ParseError::InvalidRecord {
                row: row_number,
                source,
            }
        })
    }
}

impl Iterator for StatementReader {
    type Item = Result<NewTransaction, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Err(e) = self.fill() {
                self.failed = true;
                return Some(Err(e));
            }
            if self.pending.len() <= self.footer_rows {
                return None;
            }
            let (row_number, row) = self.pending.pop_front()?;
            if row.iter().all(|c| c.trim().is_empty()) {
                continue;
            }
            let result = self.normalize(row_number, &row);
            self.failed = result.is_err();
            return Some(result);
        }
    }
}

fn delimited_rows(path: &Path, profile: &StatementProfile) -> Result<Rows, ParseError> {
    let delimiter = u8::try_from(profile.delimiter)
        .map_err(|_| ParseError::UnsupportedFormat(format!("delimiter {:?}", profile.delimiter)))?;
    let reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(delimiter)
        .from_reader(File::open(path)?);
    Ok(Rows::Delimited(reader.into_records()))
}

fn sheet_rows(path: &Path, sheet: Option<&str>) -> Result<Rows, ParseError> {
    let mut workbook = open_workbook_auto(path)?;
    let range = match sheet {
        Some(name) => workbook.worksheet_range(name)?,
        None => workbook.worksheet_range_at(0).ok_or(ParseError::NoWorksheet)??,
    };

    // The range starts at the first used cell; pad it back to sheet coordinates
    // so `header_row` counts from the top of the sheet.
    let (top, left) = range.start().unwrap_or((0, 0));
    let mut rows: Vec<RawRow> = vec![Vec::new(); top as usize];
    rows.extend(range.rows().map(|row| {
        std::iter::repeat(String::new())
            .take(left as usize)
            .chain(row.iter().map(cell_text))
            .collect()
    }));
    Ok(Rows::Sheet(rows.into_iter()))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.date().format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
        other => other.to_string(),
    }
}

/// Reads a whole statement, failing on the first malformed row.
pub fn read_statement(
    path: &Path,
    profile: &StatementProfile,
) -> Result<Vec<NewTransaction>, ParseError> {
    StatementReader::open(path, profile)?.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;
    use tally_core::TransactionType;
    use tempfile::NamedTempFile;

    fn write_statement(contents: &str) -> NamedTempFile {
        let mut tmp = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(tmp, "{contents}").unwrap();
        tmp
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn spreadsheet_fixture() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("fixtures")
            .join("march-statement.xlsx")
    }

    /// Header on sheet row 4 behind a blank first row, two footer rows.
    fn march_sheet_profile() -> StatementProfile {
        StatementProfile {
            header_row: 3,
            footer_rows: 2,
            sheet: Some("March".to_string()),
            ..StatementProfile::default()
        }
    }

    #[test]
    fn reads_spreadsheet_with_offsets() {
        let records = read_statement(&spreadsheet_fixture(), &march_sheet_profile()).unwrap();
        assert_eq!(records.len(), 3);

        // Native date cell.
        assert_eq!(records[0].date(), ymd(2024, 3, 12));
        assert_eq!(records[0].description(), "TESCO LONDON");
        assert_eq!(records[0].spent(), Money::from_cents(450));

        // Text date cell in the same column.
        assert_eq!(records[1].date(), ymd(2024, 3, 14));
        assert_eq!(records[1].spent(), Money::from_cents(1200));

        assert_eq!(records[2].date(), ymd(2024, 3, 15));
        assert_eq!(records[2].transaction_type(), TransactionType::Income);
        assert_eq!(records[2].received(), Money::from_cents(250_000));
    }

    #[test]
    fn spreadsheet_defaults_to_first_sheet() {
        let profile = StatementProfile {
            sheet: None,
            ..march_sheet_profile()
        };
        let err = read_statement(&spreadsheet_fixture(), &profile).unwrap_err();
        assert!(matches!(err, ParseError::MissingHeader(3)));
    }

    #[test]
    fn unknown_sheet_is_spreadsheet_error() {
        let profile = StatementProfile {
            sheet: Some("April".to_string()),
            ..march_sheet_profile()
        };
        let err = read_statement(&spreadsheet_fixture(), &profile).unwrap_err();
        assert!(matches!(err, ParseError::Spreadsheet(_)));
    }

    #[test]
    fn reads_basic_statement() {
        let tmp = write_statement(
            "date,recipient/payer,spent,received,operation\n\
             12.03.2024,Tesco,4.50,,TESCO LONDON\n\
             13.03.2024,ACME Ltd,,2500.00,SALARY MARCH\n",
        );
        let records = read_statement(tmp.path(), &StatementProfile::default()).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].date(), ymd(2024, 3, 12));
        assert_eq!(records[0].description(), "TESCO LONDON");
        assert_eq!(records[0].spent(), Money::from_cents(450));
        assert_eq!(records[0].transaction_type(), TransactionType::Outcome);

        assert_eq!(records[1].received(), Money::from_cents(250_000));
        assert_eq!(records[1].transaction_type(), TransactionType::Income);
    }

    #[test]
    fn skips_preamble_and_footer() {
        let tmp = write_statement(
            "Account statement\n\
             Period: March 2024\n\
             date;spent;received;operation\n\
             12.03.2024;4,50;;TESCO LONDON\n\
             14.03.2024;12,00;;UBER TRIP 42\n\
             Total;16,50;;\n\
             Generated by the bank\n",
        );
        let profile = StatementProfile {
            header_row: 2,
            footer_rows: 2,
            delimiter: ';',
            ..StatementProfile::default()
        };
        let records = read_statement(tmp.path(), &profile).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].description(), "UBER TRIP 42");
        assert_eq!(records[1].spent(), Money::from_cents(1200));
    }

    #[test]
    fn sub_penny_amounts_are_rejected() {
        for cell in ["\"1,234\"", "0.004"] {
            let tmp = write_statement(&format!(
                "date,spent,received,operation\n12.03.2024,{cell},,IKEA\n"
            ));
            match read_statement(tmp.path(), &StatementProfile::default()) {
                Err(ParseError::InvalidAmount { row, column, .. }) => {
                    assert_eq!(row, 2);
                    assert_eq!(column, "spent");
                }
                other => panic!("expected invalid amount for {cell}, got {other:?}"),
            }
        }

        let tmp = write_statement("date,spent,received,operation\n12.03.2024,4.500,,IKEA\n");
        let records = read_statement(tmp.path(), &StatementProfile::default()).unwrap();
        assert_eq!(records[0].spent(), Money::from_cents(450));
    }

    #[test]
    fn reader_is_lazy_and_stops_after_error() {
        let tmp = write_statement(
            "date,spent,received,operation\n\
             12.03.2024,4.50,,TESCO\n\
             not-a-date,1.00,,BROKEN\n\
             14.03.2024,2.00,,LIDL\n",
        );
        let mut reader = StatementReader::open(tmp.path(), &StatementProfile::default()).unwrap();
        assert!(reader.next().unwrap().is_ok());
        match reader.next() {
            Some(Err(ParseError::InvalidDate { row, value })) => {
                assert_eq!(row, 3);
                assert_eq!(value, "not-a-date");
            }
            other => panic!("expected invalid date, got {other:?}"),
        }
        assert!(reader.next().is_none());
    }

    #[test]
    fn broken_row_fails_whole_read() {
        let tmp = write_statement(
            "date,spent,received,operation\n\
             12.03.2024,4.50,,TESCO\n\
             13.03.2024,abc,,BROKEN\n",
        );
        let err = read_statement(tmp.path(), &StatementProfile::default()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidAmount { row: 3, .. }));
    }

    #[test]
    fn header_match_is_case_insensitive() {
        let tmp = write_statement(
            " Date , Spent ,Received, OPERATION\n\
             2024-03-12,1.00,,COFFEE\n",
        );
        let records = read_statement(tmp.path(), &StatementProfile::default()).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn custom_column_names() {
        let tmp = write_statement(
            "Booking date,Debit,Credit,Details\n\
             12.03.2024,3.20,,CUPP BUBBLE TEA\n",
        );
        let profile = StatementProfile {
            columns: ColumnNames {
                date: "Booking date".to_string(),
                spent: "Debit".to_string(),
                received: "Credit".to_string(),
                operation: "Details".to_string(),
            },
            ..StatementProfile::default()
        };
        let records = read_statement(tmp.path(), &profile).unwrap();
        assert_eq!(records[0].description(), "CUPP BUBBLE TEA");
    }

    #[test]
    fn missing_column() {
        let tmp = write_statement("date,spent,operation\n12.03.2024,1.00,X\n");
        let err = read_statement(tmp.path(), &StatementProfile::default()).unwrap_err();
        assert!(matches!(err, ParseError::MissingColumn(c) if c == "received"));
    }

    #[test]
    fn missing_description() {
        let tmp = write_statement("date,spent,received,operation\n12.03.2024,1.00,,\n");
        let err = read_statement(tmp.path(), &StatementProfile::default()).unwrap_err();
        assert!(matches!(err, ParseError::MissingField { row: 2, .. }));
    }

    #[test]
    fn both_amounts_rejected() {
        let tmp = write_statement("date,spent,received,operation\n12.03.2024,1.00,2.00,ODD\n");
        let err = read_statement(tmp.path(), &StatementProfile::default()).unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidRecord {
                source: LedgerError::AmountConflict { .. },
                ..
            }
        ));
    }

    #[test]
    fn header_past_end() {
        let tmp = write_statement("only one line\n");
        let profile = StatementProfile {
            header_row: 5,
            ..StatementProfile::default()
        };
        assert!(matches!(
            StatementReader::open(tmp.path(), &profile),
            Err(ParseError::MissingHeader(5))
        ));
    }

    #[test]
    fn missing_source() {
        let result = read_statement(Path::new("does/not/exist.csv"), &StatementProfile::default());
        assert!(matches!(result, Err(ParseError::SourceNotFound(_))));
    }

    #[test]
    fn unsupported_extension() {
        let tmp = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        let result = read_statement(tmp.path(), &StatementProfile::default());
        assert!(matches!(result, Err(ParseError::UnsupportedFormat(ext)) if ext == "pdf"));
    }

    #[test]
    fn footer_larger_than_body_yields_nothing() {
        let tmp = write_statement("date,spent,received,operation\n12.03.2024,1.00,,X\n");
        let profile = StatementProfile {
            footer_rows: 3,
            ..StatementProfile::default()
        };
        assert!(read_statement(tmp.path(), &profile).unwrap().is_empty());
    }

    #[test]
    fn profile_from_toml() {
        let profile: StatementProfile = toml::from_str(
            r#"
            header_row = 12
            footer_rows = 7
            delimiter = ";"

            [columns]
            operation = "Description"
            "#,
        )
        .unwrap();
        assert_eq!(profile.header_row, 12);
        assert_eq!(profile.delimiter, ';');
        assert_eq!(profile.columns.operation, "Description");
        assert_eq!(profile.columns.date, "date");
        assert_eq!(profile.date_formats, StatementProfile::default().date_formats);
    }
}
