//! CSV ingestion: parse a `date,amount` batch, aggregate it and hand both to
//! a [`SummaryStore`].

use std::{
    io::Read,
    path::{Path, PathBuf},
    str::FromStr,
};

use rust_decimal::Decimal;
use stori_core::{StorageError, Summary, SummaryStore, Transaction};
use thiserror::Error;
use time::{macros::format_description, Date};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing `{0}` column in header")]
    MissingColumn(&'static str),
    #[error("line {line}: {message}")]
    Invalid { line: u64, message: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Parses transactions from CSV with a header row naming `date` and
/// `amount` (any order, case-insensitive, extra columns ignored). Dates are
/// `YYYY-MM-DD`; amounts are signed decimals such as `+60.5` or `-10.3`.
pub fn read_transactions<R: Read>(reader: R) -> Result<Vec<Transaction>, IngestError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let column = |name: &'static str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or(IngestError::MissingColumn(name))
    };
    let date_col = column("date")?;
    let amount_col = column("amount")?;

    let mut transactions = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let invalid = |message: String| IngestError::Invalid { line, message };

        let date_field = record.get(date_col).unwrap_or_default();
        let amount_field = record.get(amount_col).unwrap_or_default();
        if date_field.is_empty() && amount_field.is_empty() {
            continue;
        }

        let date = parse_date(date_field).map_err(invalid)?;
        let amount = parse_amount(amount_field).map_err(invalid)?;
        transactions.push(Transaction::new(date, amount));
    }

    Ok(transactions)
}

pub fn read_transactions_file(path: &Path) -> Result<Vec<Transaction>, IngestError> {
    let file = std::fs::File::open(path).map_err(|source| IngestError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    read_transactions(std::io::BufReader::new(file))
}

fn parse_date(value: &str) -> Result<Date, String> {
    Date::parse(value, format_description!("[year]-[month]-[day]"))
        .map_err(|e| format!("invalid date '{}': {}", value, e))
}

fn parse_amount(value: &str) -> Result<Decimal, String> {
    let unsigned = value.strip_prefix('+').unwrap_or(value);
    Decimal::from_str(unsigned).map_err(|e| format!("invalid amount '{}': {}", value, e))
}

/// Aggregates `transactions`, then replaces the stored batch and appends the
/// resulting summary.
pub fn ingest(store: &dyn SummaryStore, transactions: &[Transaction]) -> Result<Summary, IngestError> {
    let summary = Summary::from_transactions(transactions);
    store.save_transactions_and_summary(transactions, &summary)?;
    tracing::info!(
        transactions = transactions.len(),
        total_balance = %summary.total_balance,
        "batch ingested"
    );
    Ok(summary)
}

pub fn ingest_file(store: &dyn SummaryStore, path: &Path) -> Result<Summary, IngestError> {
    let transactions = read_transactions_file(path)?;
    tracing::debug!(path = %path.display(), count = transactions.len(), "parsed transactions");
    ingest(store, &transactions)
}
