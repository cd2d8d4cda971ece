use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use pagefetch::config::Config;
use pagefetch::http::Record;
use pagefetch::{ApiClient, ExternalServiceError, logging};

/// pagefetch - resilient client for paginated JSON APIs
///
/// Fetches a collection from a remote API, retrying transient failures with
/// exponential backoff, and prints every record as one JSON line.
///
/// Examples:
///   pagefetch fetch-all
///   pagefetch fetch-pages --page-size 20 --limit 100
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to config/config.json; also via PAGEFETCH_CONFIG)
    #[arg(
        long = "config",
        short = 'c',
        env = "PAGEFETCH_CONFIG",
        value_name = "PATH",
        global = true
    )]
    pub config: Option<PathBuf>,

    /// API base URL (overrides the configuration file)
    #[arg(long = "base-url", value_name = "URL", global = true)]
    pub base_url: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Fetch the whole collection in a single request
    FetchAll,

    /// Stream the collection page by page
    FetchPages(FetchPagesArgs),
}

#[derive(clap::Args, Debug)]
pub struct FetchPagesArgs {
    /// Number of records requested per page
    #[arg(long = "page-size", short = 'p', value_name = "N", default_value_t = 10)]
    pub page_size: usize,

    /// Stop after this many records
    #[arg(long = "limit", short = 'l', value_name = "N")]
    pub limit: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.chain()
                .any(|cause| cause.downcast_ref::<ExternalServiceError>().is_some())
            {
                eprintln!("Controlled ingestion failure: {:#}", e);
            } else {
                eprintln!("Unhandled system failure: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        config.api.base_url = base_url;
        config.validate()?;
    }

    logging::init(&config.logging)?;

    info!("Application started");
    info!("Environment: {}", config.app.environment);

    let span = tracing::info_span!("fetch", app = %config.app.name);
    let client = ApiClient::from_config(&config.api)?.with_span(span);
    let mut out = io::stdout().lock();

    match cli.command {
        Commands::FetchAll => {
            let records = client.fetch_all().await?;
            for record in &records {
                write_record(&mut out, record)?;
            }
        }
        Commands::FetchPages(args) => {
            let mut records = client.fetch_pages(args.page_size)?;
            let mut written = 0;
            while args.limit.is_none_or(|limit| written < limit) {
                match records.try_next().await? {
                    Some(record) => {
                        write_record(&mut out, &record)?;
                        written += 1;
                    }
                    None => break,
                }
            }
        }
    }

    out.flush().context("Failed to flush output")?;
    info!("Application finished successfully");
    Ok(())
}

fn write_record<W: Write>(out: &mut W, record: &Record) -> Result<()> {
    serde_json::to_writer(&mut *out, record).context("Failed to write record")?;
    writeln!(out).context("Failed to write record")?;
    Ok(())
}
