//! Writing decoded datasets into day files, and the inbox watcher.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use ndfile::{DayFileStore, GridDataset, WriteOutcome};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::{IngesterConfig, WatchConfig};

/// Loads dataset files and hands them to the store.
#[derive(Debug, Clone)]
pub struct Ingester {
    store: DayFileStore,
    normalize_latitudes: bool,
}

impl Ingester {
    pub fn new(config: &IngesterConfig) -> Result<Self> {
        let store = DayFileStore::new(config.store.clone()).with_context(|| {
            format!(
                "Failed to open day-file store at {}",
                config.store.root_path.display()
            )
        })?;
        Ok(Self {
            store,
            normalize_latitudes: config.normalize_latitudes,
        })
    }

    /// Parse one JSON dataset file and write it.
    pub fn ingest_file(&self, path: &Path) -> Result<WriteOutcome> {
        let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let mut dataset = GridDataset::from_json_slice(&data)
            .with_context(|| format!("Failed to parse dataset {}", path.display()))?;

        if self.normalize_latitudes {
            dataset.normalize_latitudes();
        }

        let outcome = self
            .store
            .write(&dataset)
            .with_context(|| format!("Failed to write dataset {}", path.display()))?;

        info!(
            source = %path.display(),
            file = %outcome.id,
            kind = ?outcome.kind,
            slot = outcome.slot_index,
            valid_time = %dataset.valid_time,
            "Ingested dataset"
        );
        Ok(outcome)
    }
}

/// Counts for one pass over the inbox.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary {
    pub ingested: usize,
    pub failed: usize,
}

/// Polls an inbox directory and ingests new `*.json` datasets in name order.
///
/// Files are written one at a time so that two datasets for the same day
/// file never race.
pub struct InboxWatcher {
    ingester: Arc<Ingester>,
    config: WatchConfig,
}

impl InboxWatcher {
    pub fn new(ingester: Ingester, config: WatchConfig) -> Result<Self> {
        for dir in [&config.inbox_dir, &config.archive_dir, &config.failed_dir()] {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }
        Ok(Self {
            ingester: Arc::new(ingester),
            config,
        })
    }

    /// Dataset files waiting in the inbox, sorted by name.
    pub fn pending_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.config.inbox_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| path.extension().map(|ext| ext == "json").unwrap_or(false))
            .collect();
        files.sort();
        files
    }

    /// Ingest every pending file once.
    pub async fn poll_once(&self) -> Result<PollSummary> {
        let mut summary = PollSummary::default();

        for path in self.pending_files() {
            let ingester = self.ingester.clone();
            let source = path.clone();
            // a panicking task fails its file, not the whole pass
            let result = tokio::task::spawn_blocking(move || ingester.ingest_file(&source))
                .await
                .unwrap_or_else(|e| Err(anyhow!("Ingest task failed: {}", e)));

            match result {
                Ok(_) => {
                    move_into(&path, &self.config.archive_dir)?;
                    summary.ingested += 1;
                }
                Err(e) => {
                    error!(file = %path.display(), error = %format!("{:#}", e), "Dataset rejected");
                    move_into(&path, &self.config.failed_dir())?;
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Poll until a shutdown signal arrives.
    pub async fn run_forever(&self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.poll_interval_secs));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            inbox = %self.config.inbox_dir.display(),
            interval_secs = self.config.poll_interval_secs,
            "Watching inbox"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutting down inbox watcher");
                    break;
                }
                _ = interval.tick() => {
                    match self.poll_once().await {
                        Ok(summary) if summary.ingested + summary.failed > 0 => {
                            info!(ingested = summary.ingested, failed = summary.failed, "Inbox poll complete");
                        }
                        Ok(_) => debug!("Inbox empty"),
                        Err(e) => warn!(error = %e, "Inbox poll failed"),
                    }
                }
            }
        }

        Ok(())
    }
}

/// Move `path` into `dir`, keeping its file name.
fn move_into(path: &Path, dir: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .with_context(|| format!("No file name in {}", path.display()))?;
    let target = dir.join(name);
    fs::rename(path, &target).with_context(|| {
        format!("Failed to move {} to {}", path.display(), target.display())
    })?;
    Ok(target)
}
