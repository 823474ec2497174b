//! PostgreSQL storage backend for Stori.
//!
//! The free functions in [`migrations`] and [`queries`] take the client they
//! run on, so callers decide how connections are opened and shared.
//! [`PostgresStore`] wraps a single injected client behind the
//! [`SummaryStore`] trait.

use std::sync::Mutex;

use postgres::{Client, Config, NoTls};
use stori_core::{StorageError, Summary, SummaryRecord, SummaryStore, Transaction};

pub mod migrations;
pub mod queries;

pub use migrations::{initialize, run_migrations, Migration, MigrationStep, MIGRATIONS};
pub use queries::{latest_summary, list_transactions, save_transactions_and_summary, summary_history};

/// Parses a libpq-style connection string and connects with it.
pub fn connect(connection_string: &str) -> Result<Client, StorageError> {
    let config: Config = connection_string
        .parse()
        .map_err(|e: postgres::Error| StorageError::Connection(e.to_string()))?;
    connect_with(&config)
}

/// Opens a client and checks that the server answers.
pub fn connect_with(config: &Config) -> Result<Client, StorageError> {
    let mut client = config
        .connect(NoTls)
        .map_err(|e| StorageError::Connection(e.to_string()))?;

    client
        .batch_execute("SELECT 1")
        .map_err(|e| StorageError::Connection(format!("failed to ping database: {}", e)))?;

    tracing::debug!("PostgreSQL connection established");
    Ok(client)
}

pub struct PostgresStore {
    client: Mutex<Client>,
}

impl PostgresStore {
    pub fn new(client: Client) -> Self {
        Self {
            client: Mutex::new(client),
        }
    }

    /// Connects and brings the schema up to date.
    pub fn open(config: &Config) -> Result<Self, StorageError> {
        let store = Self::new(connect_with(config)?);
        store.initialize()?;
        Ok(store)
    }
}

impl SummaryStore for PostgresStore {
    fn initialize(&self) -> Result<(), StorageError> {
        let mut client = self.client.lock().unwrap();
        migrations::initialize(&mut client)
    }

    fn save_transactions_and_summary(
        &self,
        transactions: &[Transaction],
        summary: &Summary,
    ) -> Result<(), StorageError> {
        let mut client = self.client.lock().unwrap();
        queries::save_transactions_and_summary(&mut client, transactions, summary)
    }

    fn latest_summary(&self) -> Result<Option<Summary>, StorageError> {
        let mut client = self.client.lock().unwrap();
        queries::latest_summary(&mut *client)
    }

    fn list_transactions(&self) -> Result<Vec<Transaction>, StorageError> {
        let mut client = self.client.lock().unwrap();
        queries::list_transactions(&mut *client)
    }

    fn summary_history(&self, limit: usize) -> Result<Vec<SummaryRecord>, StorageError> {
        let mut client = self.client.lock().unwrap();
        queries::summary_history(&mut *client, limit)
    }
}
