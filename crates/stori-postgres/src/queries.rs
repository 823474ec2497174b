use postgres::{Client, GenericClient, Row};
use stori_core::{StorageError, Summary, SummaryRecord, Transaction, WriteStep};

/// Replaces the contents of `transactions` with `transactions` and appends
/// `summary`, all inside one database transaction.
pub fn save_transactions_and_summary(
    client: &mut Client,
    transactions: &[Transaction],
    summary: &Summary,
) -> Result<(), StorageError> {
    // Dropping `tx` before `commit` rolls everything back.
    let mut tx = client
        .transaction()
        .map_err(|e| StorageError::TransactionStart(e.to_string()))?;

    tx.batch_execute("TRUNCATE TABLE transactions RESTART IDENTITY")
        .map_err(|e| StorageError::write(WriteStep::ClearTransactions, e))?;

    for (index, txn) in transactions.iter().enumerate() {
        tx.execute(
            "INSERT INTO transactions (date, amount) VALUES ($1, $2)",
            &[&txn.date, &txn.amount],
        )
        .map_err(|e| StorageError::write(WriteStep::InsertTransaction { index }, e))?;
    }

    tx.execute(
        "INSERT INTO summary (total_balance, total_transactions, avg_debit, avg_credit)
         VALUES ($1, $2, $3, $4)",
        &[
            &summary.total_balance,
            &summary.total_transactions,
            &summary.avg_debit,
            &summary.avg_credit,
        ],
    )
    .map_err(|e| StorageError::write(WriteStep::InsertSummary, e))?;

    tx.commit()
        .map_err(|e| StorageError::Commit(e.to_string()))?;

    tracing::info!(
        transactions = transactions.len(),
        "transactions and summary saved"
    );
    Ok(())
}

/// Most recently created summary, `None` while the table is empty.
pub fn latest_summary<C: GenericClient>(client: &mut C) -> Result<Option<Summary>, StorageError> {
    let row = client
        .query_opt(
            "SELECT total_balance, total_transactions, avg_debit, avg_credit
             FROM summary
             ORDER BY created_at DESC NULLS LAST, id DESC
             LIMIT 1",
            &[],
        )
        .map_err(|e| StorageError::read("get latest summary", e))?;

    match row {
        Some(row) => summary_from_row(&row, 0)
            .map(Some)
            .map_err(|e| StorageError::read("get latest summary", e)),
        None => Ok(None),
    }
}

/// Stored transactions in insertion order.
pub fn list_transactions<C: GenericClient>(client: &mut C) -> Result<Vec<Transaction>, StorageError> {
    let rows = client
        .query("SELECT date, amount FROM transactions ORDER BY id", &[])
        .map_err(|e| StorageError::read("list transactions", e))?;

    rows.iter()
        .map(|row| -> Result<Transaction, postgres::Error> {
            Ok(Transaction::new(row.try_get(0)?, row.try_get(1)?))
        })
        .collect::<Result<_, _>>()
        .map_err(|e| StorageError::read("list transactions", e))
}

/// Up to `limit` summary rows, newest first.
pub fn summary_history<C: GenericClient>(
    client: &mut C,
    limit: usize,
) -> Result<Vec<SummaryRecord>, StorageError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = client
        .query(
            "SELECT id, created_at, total_balance, total_transactions, avg_debit, avg_credit
             FROM summary
             ORDER BY created_at DESC NULLS LAST, id DESC
             LIMIT $1",
            &[&limit],
        )
        .map_err(|e| StorageError::read("list summaries", e))?;

    rows.iter()
        .map(|row| -> Result<SummaryRecord, postgres::Error> {
            Ok(SummaryRecord {
                id: row.try_get(0)?,
                created_at: row.try_get(1)?,
                summary: summary_from_row(row, 2)?,
            })
        })
        .collect::<Result<_, _>>()
        .map_err(|e| StorageError::read("list summaries", e))
}

fn summary_from_row(row: &Row, offset: usize) -> Result<Summary, postgres::Error> {
    Ok(Summary {
        total_balance: row.try_get(offset)?,
        total_transactions: row.try_get(offset + 1)?,
        avg_debit: row.try_get(offset + 2)?,
        avg_credit: row.try_get(offset + 3)?,
    })
}
