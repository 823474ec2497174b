use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use postgres::config::SslMode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(name = "stori", about = "Stori - persists transaction batches and their summaries")]
pub struct CliArgs {
    /// Path to config file
    #[arg(short, long, default_value = "stori.toml")]
    pub config: PathBuf,

    /// Log level (overrides config file)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Database host (overrides config file)
    #[arg(long, env = "STORI_DB_HOST")]
    pub db_host: Option<String>,

    /// Database port (overrides config file)
    #[arg(long, env = "STORI_DB_PORT")]
    pub db_port: Option<u16>,

    /// Database user (overrides config file)
    #[arg(long, env = "STORI_DB_USER")]
    pub db_user: Option<String>,

    /// Database password (overrides config file)
    #[arg(long, env = "STORI_DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    /// Database name (overrides config file)
    #[arg(long, env = "STORI_DB_NAME")]
    pub db_name: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create or upgrade the database schema
    Init,
    /// Replace stored transactions with a CSV batch and record its summary
    Ingest {
        /// CSV file with `date,amount` columns
        file: PathBuf,
    },
    /// Show the most recent summary
    Summary {
        /// Print as JSON
        #[arg(long)]
        json: bool,

        /// Show up to N summaries, newest first
        #[arg(long)]
        history: Option<usize>,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_database")]
    pub name: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_user() -> String {
    "postgres".to_string()
}

fn default_database() -> String {
    "stori".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: String::new(),
            name: default_database(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let mut config = Config::from_file(&cli.config)?;

        // CLI and environment overrides
        if let Some(ref level) = cli.log_level {
            config.logging.level = level.clone();
        }
        if let Some(ref host) = cli.db_host {
            config.database.host = host.clone();
        }
        if let Some(port) = cli.db_port {
            config.database.port = port;
        }
        if let Some(ref user) = cli.db_user {
            config.database.user = user.clone();
        }
        if let Some(ref password) = cli.db_password {
            config.database.password = password.clone();
        }
        if let Some(ref name) = cli.db_name {
            config.database.name = name.clone();
        }

        Ok(config)
    }
}

impl DatabaseConfig {
    pub fn to_pg_config(&self) -> postgres::Config {
        let mut config = postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .user(&self.user)
            .password(&self.password)
            .dbname(&self.name)
            .ssl_mode(SslMode::Disable);
        config
    }
}
