use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use stock_trend::analyzer::TrendAnalyzer;
use stock_trend::config::AppConfig;
use stock_trend::fetcher::AlphaVantageClient;
use stock_trend::pipeline::Pipeline;
use stock_trend::server::{self, AppState};
use stock_trend::storage::SqliteStore;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "stock-trend", version, about = "Daily moving-average crossover analysis")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch, analyze and print the report for one symbol
    Report {
        #[arg(short, long)]
        symbol: Option<String>,
        /// Do not write bars or the report to the database
        #[arg(long)]
        no_store: bool,
    },
    /// Store the bars of one symbol within a date range, in batches
    Backfill {
        #[arg(short, long)]
        symbol: Option<String>,
        /// First date to store (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Last date to store (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Create the database schema and exit
    InitDb,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Set panic hook to log details about any panic
    std::panic::set_hook(Box::new(|panic_info| {
        error!("Panic occurred: {panic_info}");
    }));

    let cli = Cli::parse();

    // Load configuration once; it is read-only from here on
    let config = match AppConfig::from_env() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            error!("Config load error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    command: Option<Command>,
    config: Arc<AppConfig>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = SqliteStore::new(&config.database_path);
    let analyzer = TrendAnalyzer::new(config.short_window, config.long_window)?;
    let source = Arc::new(AlphaVantageClient::new(&config)?);

    let command = command.unwrap_or(Command::Report {
        symbol: None,
        no_store: false,
    });

    match command {
        Command::InitDb => {
            store.create_schema_if_absent()?;
            info!("Schema ready at {}", store.path().display());
        }
        Command::Report { symbol, no_store } => {
            let symbol = symbol.unwrap_or_else(|| config.default_symbol.clone());
            let store = if no_store {
                None
            } else if let Err(e) = store.create_schema_if_absent() {
                warn!("Continuing without storage: {e}");
                None
            } else {
                Some(store)
            };

            let pipeline = Pipeline::new(source, analyzer, store);
            let outcome = pipeline.run(&symbol).await?;
            for signal in outcome.series.signals() {
                info!(
                    "{:?} signal on {} at {:.2}",
                    signal.kind, signal.date, signal.price
                );
            }
            print!("{}", outcome.report);
        }
        Command::Backfill { symbol, start, end } => {
            let symbol = symbol.unwrap_or_else(|| config.default_symbol.clone());
            store.create_schema_if_absent()?;
            let pipeline = Pipeline::new(source, analyzer, Some(store))
                .with_batch_days(config.backfill_batch_days);
            let report = pipeline.backfill(&symbol, start, end).await?;
            for batch in &report.batches {
                info!(
                    "{} to {}: {} stored, {} skipped",
                    batch.start, batch.end, batch.inserted, batch.failed
                );
            }
            println!(
                "{}: {} bars stored, {} skipped",
                report.symbol,
                report.inserted(),
                report.failed()
            );
        }
        Command::Serve { port } => {
            store.create_schema_if_absent()?;
            let state = Arc::new(AppState {
                pipeline: Pipeline::new(source, analyzer, Some(store.clone()))
                    .with_batch_days(config.backfill_batch_days),
                store,
            });
            server::serve(state, port.unwrap_or(config.server_port)).await?;
        }
    }

    Ok(())
}
