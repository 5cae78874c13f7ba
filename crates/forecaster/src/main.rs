//! stockcast forecaster CLI
//!
//! Runs monthly demand forecasts against PostgreSQL and prints results as JSON.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use stockcast_core::{ForecastKey, KeyType};
use stockcast_infra::{
    ForecastConfig, ForecastService, PostgresHistorySource, PostgresPredictionStore,
    PredictionFilter, ensure_schema,
};
use stockcast_inventory::RecordMovement;
use stockcast_observability::tracing::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "stockcast-forecaster")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Monthly inventory demand forecasting", long_about = None)]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Maximum pooled connections
    #[arg(long, default_value = "5")]
    max_connections: u32,

    /// Log output format (json or pretty)
    #[arg(long, default_value = "json")]
    log_format: LogFormat,

    /// Create missing tables before running the command
    #[arg(long)]
    ensure_schema: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Forecast one category or product name and replace its stored predictions
    Forecast(KeyArgs),
    /// Forecast every known key of a type
    ForecastAll {
        #[arg(long = "type", value_parser = parse_key_type)]
        key_type: KeyType,
    },
    /// List stored predictions
    List {
        #[arg(long = "type", value_parser = parse_key_type)]
        key_type: Option<KeyType>,
        #[arg(long = "value")]
        key_value: Option<String>,
    },
    /// List known categories or product names
    Keys {
        #[arg(long = "type", value_parser = parse_key_type)]
        key_type: KeyType,
    },
    /// Record one inventory movement
    Record {
        #[arg(long)]
        name: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        quantity: u64,
        /// RFC 3339 timestamp; defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct KeyArgs {
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    name: Option<String>,
}

fn parse_key_type(s: &str) -> Result<KeyType, String> {
    s.parse::<KeyType>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    stockcast_observability::tracing::init(cli.log_format);

    let pool = PgPoolOptions::new()
        .max_connections(cli.max_connections)
        .connect(&cli.database_url)
        .await
        .context("failed to connect to DATABASE_URL")?;

    if cli.ensure_schema {
        ensure_schema(&pool).await.context("failed to ensure schema")?;
    }

    let config = ForecastConfig::from_env();
    info!(?config, "forecast configuration");

    let history = PostgresHistorySource::new(pool.clone());
    let service = ForecastService::with_config(
        history.clone(),
        PostgresPredictionStore::new(pool),
        config,
    );

    match cli.command {
        Command::Forecast(args) => {
            let key = ForecastKey::from_parts(args.category.as_deref(), args.name.as_deref())?;
            let run = service.run(&key).await.with_context(|| format!("forecast for {key}"))?;
            print_json(&run)?;
        }
        Command::ForecastAll { key_type } => {
            let reports = service.run_all(key_type).await?;
            let failed = reports.iter().filter(|r| !r.is_ok()).count();
            let lines: Vec<_> = reports
                .iter()
                .map(|r| match &r.result {
                    Ok(run) => json!({ "key": r.key, "ok": true, "points": run.points }),
                    Err(e) => json!({
                        "key": r.key,
                        "ok": false,
                        "error": e.to_string(),
                        "retryable": e.is_retryable(),
                    }),
                })
                .collect();
            print_json(&lines)?;
            if failed > 0 {
                warn!(failed, total = reports.len(), "some keys failed to forecast");
            }
        }
        Command::List {
            key_type,
            key_value,
        } => {
            if key_value.is_some() && key_type.is_none() {
                bail!("--value requires --type");
            }
            let filter = PredictionFilter {
                key_type,
                key_value,
            };
            print_json(&service.list_predictions(&filter).await?)?;
        }
        Command::Keys { key_type } => {
            print_json(&service.list_keys(key_type).await?)?;
        }
        Command::Record {
            name,
            category,
            quantity,
            at,
        } => {
            let cmd = RecordMovement::new(name, category, quantity, at.unwrap_or_else(Utc::now));
            let id = history.record_movement(cmd).await?;
            print_json(&json!({ "movement_id": id }))?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{out}");
    Ok(())
}
