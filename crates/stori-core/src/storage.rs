use std::fmt::Display;

use crate::models::{Summary, SummaryRecord, Transaction};

use thiserror::Error;

/// Statement inside the replace-all write that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStep {
    ClearTransactions,
    InsertTransaction { index: usize },
    InsertSummary,
}

impl Display for WriteStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteStep::ClearTransactions => f.write_str("clean transactions"),
            WriteStep::InsertTransaction { index } => write!(f, "insert transaction #{}", index),
            WriteStep::InsertSummary => f.write_str("insert summary"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to database: {0}")]
    Connection(String),
    #[error("failed to {context}: {message}")]
    Schema { context: String, message: String },
    #[error("failed to start transaction: {0}")]
    TransactionStart(String),
    #[error("failed to {step}: {message}")]
    Write { step: WriteStep, message: String },
    #[error("failed to commit transaction: {0}")]
    Commit(String),
    #[error("failed to {context}: {message}")]
    Read { context: String, message: String },
}

impl StorageError {
    pub fn schema(context: impl Into<String>, err: impl Display) -> Self {
        StorageError::Schema {
            context: context.into(),
            message: err.to_string(),
        }
    }

    pub fn write(step: WriteStep, err: impl Display) -> Self {
        StorageError::Write {
            step,
            message: err.to_string(),
        }
    }

    pub fn read(context: impl Into<String>, err: impl Display) -> Self {
        StorageError::Read {
            context: context.into(),
            message: err.to_string(),
        }
    }

    /// The failing write step, when this is a write error.
    pub fn write_step(&self) -> Option<WriteStep> {
        match self {
            StorageError::Write { step, .. } => Some(*step),
            _ => None,
        }
    }
}

pub trait SummaryStore: Send + Sync {
    /// Creates or upgrades the schema. Safe to call on every startup.
    fn initialize(&self) -> Result<(), StorageError>;

    /// Atomically replaces every stored transaction with `transactions`
    /// and appends `summary` to the summary history.
    fn save_transactions_and_summary(
        &self,
        transactions: &[Transaction],
        summary: &Summary,
    ) -> Result<(), StorageError>;

    /// Most recently created summary, or `None` when none has been written.
    fn latest_summary(&self) -> Result<Option<Summary>, StorageError>;

    fn list_transactions(&self) -> Result<Vec<Transaction>, StorageError>;
    fn summary_history(&self, limit: usize) -> Result<Vec<SummaryRecord>, StorageError>;
}
