//! Versioned schema migrations.
//!
//! Every migration is written to be idempotent so it is safe against
//! databases created before `schema_migrations` existed. Applied versions are
//! recorded and skipped on later startups.

use postgres::{Client, GenericClient};
use stori_core::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStep {
    /// Idempotent SQL, usually `CREATE ... IF NOT EXISTS`.
    Sql(&'static str),
    /// Adds `column` to `table` unless the catalog already lists it.
    AddColumnIfMissing {
        table: &'static str,
        column: &'static str,
        definition: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub version: i32,
    pub name: &'static str,
    pub steps: &'static [MigrationStep],
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create transactions and summary tables",
        steps: &[MigrationStep::Sql(
            "
            CREATE TABLE IF NOT EXISTS transactions (
                id SERIAL PRIMARY KEY,
                date DATE NOT NULL,
                amount DECIMAL(10, 2) NOT NULL
            );

            CREATE TABLE IF NOT EXISTS summary (
                id SERIAL PRIMARY KEY,
                total_balance DECIMAL(10, 2) NOT NULL,
                total_transactions INTEGER NOT NULL,
                avg_debit DECIMAL(10, 2) NOT NULL,
                avg_credit DECIMAL(10, 2) NOT NULL,
                created_at TIMESTAMP WITH TIME ZONE DEFAULT CURRENT_TIMESTAMP
            );
            ",
        )],
    },
    // Summary tables created before the count existed get it backfilled as
    // zero. Historical rows therefore report 0 transactions.
    Migration {
        version: 2,
        name: "add summary.total_transactions",
        steps: &[MigrationStep::AddColumnIfMissing {
            table: "summary",
            column: "total_transactions",
            definition: "INTEGER NOT NULL DEFAULT 0",
        }],
    },
];

const CREATE_MIGRATIONS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS schema_migrations (
        version INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        applied_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
";

/// Brings the schema up to date with `MIGRATIONS`.
pub fn initialize(client: &mut Client) -> Result<(), StorageError> {
    run_migrations(client, MIGRATIONS)
}

/// Applies every migration in `migrations` that has not been recorded yet,
/// in version order. Each migration commits together with its bookkeeping
/// row, so a failure leaves earlier migrations applied and later ones
/// untouched.
pub fn run_migrations(client: &mut Client, migrations: &[Migration]) -> Result<(), StorageError> {
    validate(migrations)?;

    client
        .batch_execute(CREATE_MIGRATIONS_TABLE)
        .map_err(|e| StorageError::schema("create schema_migrations table", e))?;

    let applied = applied_migrations(client)?;

    for migration in migrations {
        if applied.contains(&migration.version) {
            tracing::debug!(version = migration.version, "migration already applied");
            continue;
        }
        apply(client, migration)?;
    }

    Ok(())
}

/// Versions recorded in `schema_migrations`, ascending.
pub fn applied_migrations<C: GenericClient>(client: &mut C) -> Result<Vec<i32>, StorageError> {
    let rows = client
        .query("SELECT version FROM schema_migrations ORDER BY version", &[])
        .map_err(|e| StorageError::schema("read applied migrations", e))?;

    rows.iter()
        .map(|row| row.try_get::<_, i32>(0))
        .collect::<Result<Vec<i32>, _>>()
        .map_err(|e| StorageError::schema("read applied migrations", e))
}

fn validate(migrations: &[Migration]) -> Result<(), StorageError> {
    for pair in migrations.windows(2) {
        if pair[1].version <= pair[0].version {
            return Err(StorageError::schema(
                "validate migrations",
                format!(
                    "version {} ({}) must be greater than version {} ({})",
                    pair[1].version, pair[1].name, pair[0].version, pair[0].name
                ),
            ));
        }
    }
    Ok(())
}

fn apply(client: &mut Client, migration: &Migration) -> Result<(), StorageError> {
    let context = format!("apply migration {} ({})", migration.version, migration.name);
    let mut tx = client
        .transaction()
        .map_err(|e| StorageError::schema(context.as_str(), e))?;

    for step in migration.steps {
        match step {
            MigrationStep::Sql(sql) => {
                tx.batch_execute(sql)
                    .map_err(|e| StorageError::schema(context.as_str(), e))?;
            }
            MigrationStep::AddColumnIfMissing {
                table,
                column,
                definition,
            } => {
                if column_exists(&mut tx, table, column)? {
                    continue;
                }
                tx.batch_execute(&format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    table, column, definition
                ))
                .map_err(|e| StorageError::schema(format!("add {} column", column), e))?;
                tracing::warn!(table, column, definition, "added missing column");
            }
        }
    }

    tx.execute(
        "INSERT INTO schema_migrations (version, name) VALUES ($1, $2)
         ON CONFLICT (version) DO NOTHING",
        &[&migration.version, &migration.name],
    )
    .map_err(|e| StorageError::schema(context.as_str(), e))?;

    tx.commit()
        .map_err(|e| StorageError::schema(context.as_str(), e))?;

    tracing::info!(
        version = migration.version,
        migration = migration.name,
        "migration applied"
    );
    Ok(())
}

/// Looks `table.column` up in the catalog of the current schema.
pub fn column_exists<C: GenericClient>(
    client: &mut C,
    table: &str,
    column: &str,
) -> Result<bool, StorageError> {
    let row = client
        .query_one(
            "SELECT EXISTS (
                SELECT 1
                FROM information_schema.columns
                WHERE table_schema = current_schema()
                  AND table_name = $1
                  AND column_name = $2
            )",
            &[&table, &column],
        )
        .map_err(|e| StorageError::schema("check column existence", e))?;

    row.try_get(0)
        .map_err(|e| StorageError::schema("check column existence", e))
}
