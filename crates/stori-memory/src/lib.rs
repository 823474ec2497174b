//! In-memory `SummaryStore`.
//!
//! Behaves like the PostgreSQL schema it stands in for: money columns hold
//! `DECIMAL(10,2)` values, the transactions table is replaced wholesale on
//! every write and summary rows only ever accumulate.

use std::sync::RwLock;

use rust_decimal::{Decimal, RoundingStrategy};
use stori_core::{
    models::MONEY_SCALE, StorageError, Summary, SummaryRecord, SummaryStore, Transaction,
    WriteStep,
};
use time::OffsetDateTime;

/// Integer digits a `DECIMAL(10,2)` column has room for.
const MONEY_INTEGER_DIGITS: u32 = 8;

#[derive(Clone, Default)]
struct Tables {
    transactions: Vec<Transaction>,
    summaries: Vec<SummaryRecord>,
    next_summary_id: i32,
}

pub struct InMemoryStore {
    tables: RwLock<Option<Tables>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates a store with no schema; call `initialize` before use.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(None),
        }
    }
}

fn to_money_column(value: Decimal) -> Result<Decimal, String> {
    let stored = value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    if stored.abs() >= Decimal::from(10u64.pow(MONEY_INTEGER_DIGITS)) {
        return Err("numeric field overflow".to_string());
    }
    Ok(stored)
}

fn store_summary(summary: &Summary) -> Result<Summary, String> {
    Ok(Summary {
        total_balance: to_money_column(summary.total_balance)?,
        total_transactions: summary.total_transactions,
        avg_debit: to_money_column(summary.avg_debit)?,
        avg_credit: to_money_column(summary.avg_credit)?,
    })
}

fn latest(tables: &Tables) -> Option<&SummaryRecord> {
    tables
        .summaries
        .iter()
        .max_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)))
}

impl SummaryStore for InMemoryStore {
    fn initialize(&self) -> Result<(), StorageError> {
        let mut tables = self.tables.write().unwrap();
        if tables.is_none() {
            *tables = Some(Tables {
                next_summary_id: 1,
                ..Tables::default()
            });
            tracing::debug!("in-memory schema created");
        }
        Ok(())
    }

    fn save_transactions_and_summary(
        &self,
        transactions: &[Transaction],
        summary: &Summary,
    ) -> Result<(), StorageError> {
        let mut guard = self.tables.write().unwrap();
        let current = guard
            .as_ref()
            .ok_or_else(|| StorageError::TransactionStart("schema not initialized".to_string()))?;

        // Work on a copy so a failed step leaves the visible state untouched.
        let mut staged = current.clone();
        staged.transactions.clear();

        for (index, txn) in transactions.iter().enumerate() {
            let amount = to_money_column(txn.amount)
                .map_err(|e| StorageError::write(WriteStep::InsertTransaction { index }, e))?;
            staged.transactions.push(Transaction::new(txn.date, amount));
        }

        let stored = store_summary(summary)
            .map_err(|e| StorageError::write(WriteStep::InsertSummary, e))?;
        let id = staged.next_summary_id;
        staged.next_summary_id += 1;
        staged.summaries.push(SummaryRecord {
            id,
            summary: stored,
            created_at: Some(OffsetDateTime::now_utc()),
        });

        *guard = Some(staged);
        tracing::debug!(
            transactions = transactions.len(),
            summary_id = id,
            "in-memory transactions and summary saved"
        );
        Ok(())
    }

    fn latest_summary(&self) -> Result<Option<Summary>, StorageError> {
        let guard = self.tables.read().unwrap();
        let tables = guard
            .as_ref()
            .ok_or_else(|| StorageError::read("get latest summary", "schema not initialized"))?;
        Ok(latest(tables).map(|record| record.summary.clone()))
    }

    fn list_transactions(&self) -> Result<Vec<Transaction>, StorageError> {
        let guard = self.tables.read().unwrap();
        let tables = guard
            .as_ref()
            .ok_or_else(|| StorageError::read("list transactions", "schema not initialized"))?;
        Ok(tables.transactions.clone())
    }

    fn summary_history(&self, limit: usize) -> Result<Vec<SummaryRecord>, StorageError> {
        let guard = self.tables.read().unwrap();
        let tables = guard
            .as_ref()
            .ok_or_else(|| StorageError::read("list summaries", "schema not initialized"))?;
        let mut records = tables.summaries.clone();
        records.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        records.truncate(limit);
        Ok(records)
    }
}
