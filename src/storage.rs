// Re-export the storage crates so callers only depend on `stori`
pub use stori_core::storage::{StorageError, SummaryStore, WriteStep};
pub use stori_core::{Summary, SummaryRecord, Transaction};
pub use stori_postgres::{connect, connect_with, PostgresStore};

/// Connects with `config` and brings the schema up to date.
pub fn open_postgres(config: &postgres::Config) -> Result<PostgresStore, StorageError> {
    let store = PostgresStore::open(config)?;
    tracing::info!("PostgreSQL store ready");
    Ok(store)
}
