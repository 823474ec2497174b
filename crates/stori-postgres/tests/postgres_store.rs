//! These tests need a reachable PostgreSQL server and are ignored by
//! default. Point `STORI_TEST_DATABASE_URL` at one (e.g.
//! `host=localhost user=postgres password=postgres dbname=stori_test`) and
//! run `cargo test -p stori-postgres -- --ignored`. Each test works in its
//! own schema.

use postgres::Client;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use stori_core::{StorageError, Summary, SummaryStore, Transaction, WriteStep};
use stori_postgres::{
    connect, initialize, latest_summary, list_transactions, migrations, save_transactions_and_summary,
    summary_history, PostgresStore,
};
use time::macros::date;

struct TestSchema {
    client: Client,
    name: String,
}

impl TestSchema {
    fn client(&mut self) -> &mut Client {
        &mut self.client
    }
}

impl Drop for TestSchema {
    fn drop(&mut self) {
        let _ = self
            .client
            .batch_execute(&format!("DROP SCHEMA IF EXISTS {} CASCADE", self.name));
    }
}

fn test_url() -> String {
    std::env::var("STORI_TEST_DATABASE_URL").expect("STORI_TEST_DATABASE_URL must be set")
}

fn setup(test_name: &str) -> TestSchema {
    let mut client = connect(&test_url()).expect("Failed to connect to test database");
    let name = format!("stori_{}_{}", test_name, std::process::id());
    client
        .batch_execute(&format!(
            "DROP SCHEMA IF EXISTS {name} CASCADE;
             CREATE SCHEMA {name};
             SET search_path TO {name};"
        ))
        .expect("Failed to create test schema");
    TestSchema { client, name }
}

fn sample_batch() -> (Vec<Transaction>, Summary) {
    let txns = vec![
        Transaction::new(date!(2024 - 01 - 01), dec!(10.50)),
        Transaction::new(date!(2024 - 01 - 02), dec!(-3.25)),
    ];
    let summary = Summary {
        total_balance: dec!(7.25),
        total_transactions: 2,
        avg_debit: dec!(-3.25),
        avg_credit: dec!(10.50),
    };
    (txns, summary)
}

#[test]
#[ignore = "needs STORI_TEST_DATABASE_URL"]
fn test_initialize_is_idempotent() {
    let mut schema = setup("init_idempotent");

    initialize(schema.client()).unwrap();
    initialize(schema.client()).unwrap();

    assert_eq!(migrations::applied_migrations(schema.client()).unwrap(), vec![1, 2]);
    assert!(migrations::column_exists(schema.client(), "summary", "total_transactions").unwrap());
    assert!(migrations::column_exists(schema.client(), "transactions", "amount").unwrap());
}

#[test]
#[ignore = "needs STORI_TEST_DATABASE_URL"]
fn test_legacy_summary_table_gets_total_transactions() {
    let mut schema = setup("legacy_migration");

    schema
        .client()
        .batch_execute(
            "CREATE TABLE summary (
                id SERIAL PRIMARY KEY,
                total_balance DECIMAL(10, 2) NOT NULL,
                avg_debit DECIMAL(10, 2) NOT NULL,
                avg_credit DECIMAL(10, 2) NOT NULL,
                created_at TIMESTAMP WITH TIME ZONE DEFAULT CURRENT_TIMESTAMP
            );
            INSERT INTO summary (total_balance, avg_debit, avg_credit) VALUES (5.00, -1.00, 6.00);",
        )
        .unwrap();
    assert!(!migrations::column_exists(schema.client(), "summary", "total_transactions").unwrap());

    initialize(schema.client()).unwrap();
    initialize(schema.client()).unwrap();

    assert!(migrations::column_exists(schema.client(), "summary", "total_transactions").unwrap());
    let legacy = latest_summary(schema.client()).unwrap().unwrap();
    assert_eq!(legacy.total_transactions, 0);
    assert_eq!(legacy.total_balance, dec!(5.00));
}

#[test]
#[ignore = "needs STORI_TEST_DATABASE_URL"]
fn test_latest_summary_on_empty_schema_is_none() {
    let mut schema = setup("empty_read");
    initialize(schema.client()).unwrap();

    assert_eq!(latest_summary(schema.client()).unwrap(), None);
    assert!(list_transactions(schema.client()).unwrap().is_empty());
}

#[test]
#[ignore = "needs STORI_TEST_DATABASE_URL"]
fn test_save_and_read_back() {
    let mut schema = setup("read_back");
    initialize(schema.client()).unwrap();

    let (txns, summary) = sample_batch();
    save_transactions_and_summary(schema.client(), &txns, &summary).unwrap();

    assert_eq!(list_transactions(schema.client()).unwrap(), txns);
    assert_eq!(latest_summary(schema.client()).unwrap(), Some(summary));
}

#[test]
#[ignore = "needs STORI_TEST_DATABASE_URL"]
fn test_save_replaces_previous_batch_and_restarts_identity() {
    let mut schema = setup("replace_all");
    initialize(schema.client()).unwrap();

    let first: Vec<Transaction> = (1..=5)
        .map(|d| Transaction::new(date!(2024 - 03 - 01).replace_day(d).unwrap(), Decimal::from(d)))
        .collect();
    save_transactions_and_summary(schema.client(), &first, &Summary::from_transactions(&first))
        .unwrap();

    let (second, summary) = sample_batch();
    save_transactions_and_summary(schema.client(), &second, &summary).unwrap();
    assert_eq!(list_transactions(schema.client()).unwrap(), second);

    let ids: Vec<i32> = schema
        .client()
        .query("SELECT id FROM transactions ORDER BY id", &[])
        .unwrap()
        .iter()
        .map(|row| row.get(0))
        .collect();
    assert_eq!(ids, vec![1, 2]);

    save_transactions_and_summary(schema.client(), &[], &Summary::from_transactions(&[])).unwrap();
    assert!(list_transactions(schema.client()).unwrap().is_empty());
}

#[test]
#[ignore = "needs STORI_TEST_DATABASE_URL"]
fn test_failed_summary_insert_rolls_back_transactions() {
    let mut schema = setup("atomicity");
    initialize(schema.client()).unwrap();

    let (txns, summary) = sample_batch();
    save_transactions_and_summary(schema.client(), &txns, &summary).unwrap();

    let replacement = vec![Transaction::new(date!(2024 - 05 - 01), dec!(42.00))];
    let overflowing = Summary {
        avg_debit: dec!(-1000000000.00),
        ..summary.clone()
    };
    let err = save_transactions_and_summary(schema.client(), &replacement, &overflowing).unwrap_err();

    assert_eq!(err.write_step(), Some(WriteStep::InsertSummary));
    assert_eq!(list_transactions(schema.client()).unwrap(), txns);
    assert_eq!(summary_history(schema.client(), 10).unwrap().len(), 1);
    assert_eq!(latest_summary(schema.client()).unwrap(), Some(summary));
}

#[test]
#[ignore = "needs STORI_TEST_DATABASE_URL"]
fn test_write_before_initialize_names_clear_step() {
    let mut schema = setup("uninitialized");

    let (txns, summary) = sample_batch();
    let err = save_transactions_and_summary(schema.client(), &txns, &summary).unwrap_err();
    assert_eq!(err.write_step(), Some(WriteStep::ClearTransactions));

    assert!(matches!(
        latest_summary(schema.client()),
        Err(StorageError::Read { .. })
    ));
}

#[test]
#[ignore = "needs STORI_TEST_DATABASE_URL"]
fn test_store_keeps_summary_history() {
    let schema = setup("history");
    let mut client = connect(&test_url()).unwrap();
    client
        .batch_execute(&format!("SET search_path TO {}", schema.name))
        .unwrap();

    let store = PostgresStore::new(client);
    store.initialize().unwrap();
    store.initialize().unwrap();

    let (txns, first) = sample_batch();
    store.save_transactions_and_summary(&txns, &first).unwrap();

    let batch = vec![Transaction::new(date!(2024 - 02 - 01), dec!(100.00))];
    let second = Summary::from_transactions(&batch);
    store.save_transactions_and_summary(&batch, &second).unwrap();

    let history = store.summary_history(10).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].summary, second);
    assert_eq!(history[1].summary, first);
    assert!(history.iter().all(|record| record.created_at.is_some()));
    assert_eq!(store.summary_history(1).unwrap().len(), 1);
    assert_eq!(store.latest_summary().unwrap(), Some(second));
    assert_eq!(store.list_transactions().unwrap(), batch);
}

#[test]
#[ignore = "needs STORI_TEST_DATABASE_URL"]
fn test_amount_beyond_column_range_fails_without_panicking() {
    let mut schema = setup("decimal_range");
    initialize(schema.client()).unwrap();

    let (txns, summary) = sample_batch();
    save_transactions_and_summary(schema.client(), &txns, &summary).unwrap();

    let batch = vec![
        Transaction::new(date!(2024 - 01 - 01), Decimal::MAX),
        Transaction::new(date!(2024 - 01 - 02), Decimal::MAX),
    ];
    let err = save_transactions_and_summary(schema.client(), &batch, &Summary::from_transactions(&batch))
        .unwrap_err();

    assert_eq!(err.write_step(), Some(WriteStep::InsertTransaction { index: 0 }));
    assert_eq!(list_transactions(schema.client()).unwrap(), txns);
    assert_eq!(latest_summary(schema.client()).unwrap(), Some(summary));
}
