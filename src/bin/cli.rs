use anyhow::Result;
use colored::*;
use harvester::{
    core::config::HarvestConfig,
    edgar::{ArchiveFetcher, FilingCatalogClient, RateLimiter},
    entities::load_entities,
    utils::{dirs, http::build_client},
    Ledger, Orchestrator, PackageExtractor, ProgressTracker,
};
use std::path::PathBuf;
use std::sync::Arc;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "harvest-cli",
    about = "Download and extract XBRL filing packages from SEC EDGAR"
)]
struct Opt {
    /// CSV file with `ticker` and `cik_str` columns
    #[structopt(parse(from_os_str))]
    entities: PathBuf,

    /// Contact string sent as User-Agent on every request
    #[structopt(long)]
    user_agent: Option<String>,

    /// Root of the extracted filing tree
    #[structopt(long, parse(from_os_str))]
    filings_dir: Option<PathBuf>,

    /// SQLite URL of the download ledger
    #[structopt(long)]
    database_url: Option<String>,

    /// Download attempts per filing
    #[structopt(long)]
    max_retries: Option<u32>,

    /// Disable the progress bar
    #[structopt(long)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let opt = Opt::from_args();

    let mut config = HarvestConfig::from_env()?;
    if let Some(user_agent) = opt.user_agent {
        config.user_agent = user_agent;
    }
    if let Some(filings_dir) = opt.filings_dir {
        config.filings_dir = filings_dir;
    }
    if let Some(database_url) = opt.database_url {
        config.database_url = database_url;
    }
    if let Some(max_retries) = opt.max_retries {
        config.max_retries = max_retries;
    }
    log::debug!("Using configuration: {:?}", config);

    let entities = load_entities(&opt.entities)?;
    println!(
        "{} {} entities from {}",
        "Loaded".green().bold(),
        entities.len(),
        opt.entities.display()
    );

    dirs::ensure_dir(&config.filings_dir)?;
    dirs::ensure_database_parent(&config.database_url)?;
    let ledger = Ledger::open(&config.database_url).await?;

    let client = build_client(config.request_timeout)?;
    let limiter = Arc::new(RateLimiter::new(config.max_calls, config.period));
    let catalog = FilingCatalogClient::new(
        client.clone(),
        limiter,
        &config.data_url,
        &config.user_agent,
    );
    let fetcher = ArchiveFetcher::new(client, &config.archives_url, &config.user_agent)
        .with_max_retries(config.max_retries)
        .with_retry_delay(config.retry_delay);

    let progress = if opt.no_progress {
        ProgressTracker::hidden()
    } else {
        ProgressTracker::new(entities.len() as u64)
    };

    let summary = Orchestrator::new(
        catalog,
        fetcher,
        PackageExtractor::new(&config.filings_dir),
        ledger,
    )
    .with_progress(progress)
    .run(&entities)
    .await?;

    println!(
        "{} {} entities processed, {} failed",
        "Done:".green().bold(),
        summary.entities_attempted,
        summary.entities_failed
    );
    println!(
        "      {} filings fetched, {} already downloaded, {}",
        summary.filings_fetched,
        summary.filings_skipped,
        if summary.filings_failed > 0 {
            format!("{} failed", summary.filings_failed).red().to_string()
        } else {
            "0 failed".to_string()
        }
    );

    Ok(())
}
