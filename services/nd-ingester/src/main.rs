//! Day-file ingester.
//!
//! Writes decoded grid datasets (JSON) into per-day time-series files and
//! answers simple inspection queries against them.

mod config;
mod ingest;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use ndfile::{DayFileId, DayFileReader, ParameterCode};
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use config::IngesterConfig;
use ingest::{InboxWatcher, Ingester};

#[derive(Parser, Debug)]
#[command(name = "nd-ingester")]
#[command(about = "Write decoded weather grids into per-day time-series files")]
struct Args {
    /// Configuration file path (environment variables are used when absent)
    #[arg(short, long, env = "ND_INGESTER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write one or more JSON datasets
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Poll the inbox directory and ingest new datasets
    Watch {
        /// Process the inbox once and exit
        #[arg(long)]
        once: bool,
    },
    /// Print a day file's header as JSON
    Inspect { file: PathBuf },
    /// Print the day's values for the cell nearest a coordinate
    Point {
        #[arg(long)]
        type_code: i32,
        /// UTC date, YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = IngesterConfig::load(args.config.as_deref())?;
    info!(
        root = %config.store.root_path.display(),
        interval_minutes = config.store.interval.minutes(),
        "Loaded configuration"
    );

    match args.command {
        Command::Ingest { files } => ingest_files(&config, &files),
        Command::Watch { once } => watch(&config, once).await,
        Command::Inspect { file } => inspect(&file),
        Command::Point {
            type_code,
            date,
            lat,
            lng,
        } => point(&config, type_code, date, lat, lng),
    }
}

fn ingest_files(config: &IngesterConfig, files: &[PathBuf]) -> Result<()> {
    let ingester = Ingester::new(config)?;
    let mut failed = 0;

    for file in files {
        if let Err(e) = ingester.ingest_file(file) {
            error!(file = %file.display(), error = %format!("{:#}", e), "Ingest failed");
            failed += 1;
        }
    }

    info!(total = files.len(), failed, "Ingest complete");
    if failed > 0 {
        bail!("{} of {} datasets failed", failed, files.len());
    }
    Ok(())
}

async fn watch(config: &IngesterConfig, once: bool) -> Result<()> {
    let watcher = InboxWatcher::new(Ingester::new(config)?, config.watch.clone())?;

    if once {
        let summary = watcher.poll_once().await?;
        info!(ingested = summary.ingested, failed = summary.failed, "Inbox processed");
        return Ok(());
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_tx_clone.send(()).ok();
    });

    watcher.run_forever(shutdown_tx.subscribe()).await
}

fn inspect(file: &Path) -> Result<()> {
    let reader = DayFileReader::open(file)?;
    let header = reader.header();
    let id = file
        .file_name()
        .and_then(|name| DayFileId::parse(&name.to_string_lossy()));

    let report = json!({
        "path": file,
        "file": id,
        "parameter": ParameterCode::parts(header.type_code),
        "data_offset": reader.data_offset(),
        "slots_per_day": reader.slots_per_day(),
        "header": header,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn point(config: &IngesterConfig, type_code: i32, date: NaiveDate, lat: f64, lng: f64) -> Result<()> {
    let id = DayFileId::for_date(type_code, date);
    let path = id.path_in(&config.store.root_path);
    let mut reader =
        DayFileReader::open(&path).with_context(|| format!("No day file for {}", id))?;

    let Some(series) = reader.point_series(lat, lng)? else {
        bail!("({}, {}) is not within half a grid step of any cell in {}", lat, lng, id);
    };

    println!("{}", serde_json::to_string_pretty(&series)?);
    Ok(())
}
