use anyhow::Context;
use clap::Parser;
use stori::config::{CliArgs, Command, Config};
use stori::storage::{open_postgres, SummaryStore};
use stori::{ingest, logging};

fn main() -> anyhow::Result<()> {
    let cli = CliArgs::parse();
    let config = Config::load(&cli)?;
    logging::init_tracing(&config.logging)?;

    tracing::info!(
        host = %config.database.host,
        port = config.database.port,
        database = %config.database.name,
        "connecting to PostgreSQL"
    );
    let store = open_postgres(&config.database.to_pg_config())
        .context("failed to open database")?;

    match cli.command {
        Command::Init => {
            println!("Schema is up to date");
        }
        Command::Ingest { file } => {
            let summary = ingest::ingest_file(&store, &file)
                .with_context(|| format!("failed to ingest {}", file.display()))?;
            print!("{}", summary);
        }
        Command::Summary { json, history } => match history {
            Some(limit) => {
                let records = store.summary_history(limit)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&records)?);
                } else if records.is_empty() {
                    println!("No summary yet");
                } else {
                    for record in records {
                        let created = record
                            .created_at
                            .map(|t| t.to_string())
                            .unwrap_or_else(|| "unknown".to_string());
                        print!("#{} created {}{}", record.id, created, record.summary);
                    }
                }
            }
            None => {
                let latest = store.latest_summary()?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&latest)?);
                } else {
                    match latest {
                        Some(summary) => print!("{}", summary),
                        None => println!("No summary yet"),
                    }
                }
            }
        },
    }

    Ok(())
}
