//! File-backed persistence
//!
//! Records and settings live as two pretty-printed JSON files in a data
//! directory. Writes from the tracker go through [`DebouncedWriter`], which
//! coalesces bursts of mutations and writes only the latest state once the
//! quiet period has elapsed. State queued inside that window is lost if the
//! process dies before it is written; [`DebouncedWriter::flush`] forces it out.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{Result, TrackerError};
use crate::models::{Settings, WeightRecord};

const RECORDS_FILE: &str = "records.json";
const SETTINGS_FILE: &str = "settings.json";

/// Everything that is written to disk
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedState {
    pub records: Vec<WeightRecord>,
    pub settings: Settings,
}

/// `records.json` and `settings.json` in one directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn records_path(&self) -> PathBuf {
        self.dir.join(RECORDS_FILE)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    /// Saved records, or an empty list when nothing was saved yet
    ///
    /// The file may have been edited by hand, so every record is rebuilt
    /// through [`WeightRecord::new`]; ones that fail are dropped.
    pub fn load_records(&self) -> Result<Vec<WeightRecord>> {
        let saved: Vec<WeightRecord> = read_json(&self.records_path())?.unwrap_or_default();
        let total = saved.len();
        let records: Vec<WeightRecord> = saved
            .into_iter()
            .filter_map(|r| match WeightRecord::new(r.date, r.weight, r.fat) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(date = %r.date, error = %e, "Dropping invalid saved record");
                    None
                }
            })
            .collect();
        if records.len() < total {
            warn!(
                path = %self.records_path().display(),
                dropped = total - records.len(),
                "Saved records failed validation"
            );
        }
        Ok(records)
    }

    /// Saved settings, if any
    pub fn load_settings(&self) -> Result<Option<Settings>> {
        read_json(&self.settings_path())
    }

    pub fn save(&self, state: &PersistedState) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        write_json(&self.records_path(), &state.records)?;
        write_json(&self.settings_path(), &state.settings)?;
        debug!(
            dir = %self.dir.display(),
            records = state.records.len(),
            "Persisted state"
        );
        Ok(())
    }

    /// Delete both files; missing files are fine
    pub fn clear(&self) -> Result<()> {
        for path in [self.records_path(), self.settings_path()] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if content.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| TrackerError::Serialization(format!("{}: {}", path.display(), e)))
}

/// Write through a sibling temp file so a crash never leaves half a file
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

enum Command {
    Save(PersistedState),
    Flush(oneshot::Sender<Result<()>>),
}

/// Background writer that coalesces saves until a quiet period passes
///
/// Must be created inside a tokio runtime.
pub struct DebouncedWriter {
    tx: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<()>,
}

impl DebouncedWriter {
    pub fn spawn(store: JsonFileStore, quiet_period: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_writer(store, quiet_period, rx));
        Self { tx, handle }
    }

    /// Queue `state`, replacing anything queued before it
    pub fn schedule(&self, state: PersistedState) {
        if self.tx.send(Command::Save(state)).is_err() {
            error!("Persistence task has stopped; change not queued");
        }
    }

    /// Write any queued state now
    pub async fn flush(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(reply_tx))
            .map_err(|_| TrackerError::Internal("persistence task has stopped".to_string()))?;
        reply_rx
            .await
            .map_err(|_| TrackerError::Internal("persistence task dropped a flush".to_string()))?
    }

    /// Flush and stop the background task
    pub async fn shutdown(self) -> Result<()> {
        let result = self.flush().await;
        drop(self.tx);
        if let Err(e) = self.handle.await {
            error!(error = %e, "Persistence task panicked");
        }
        result
    }
}

async fn run_writer(
    store: JsonFileStore,
    quiet_period: Duration,
    mut rx: mpsc::UnboundedReceiver<Command>,
) {
    let mut pending: Option<PersistedState> = None;

    loop {
        let command = if pending.is_some() {
            match tokio::time::timeout(quiet_period, rx.recv()).await {
                Ok(command) => command,
                Err(_elapsed) => {
                    if let Err(e) = write_pending(&store, &mut pending).await {
                        error!(error = %e, "Debounced write failed");
                    }
                    continue;
                }
            }
        } else {
            rx.recv().await
        };

        match command {
            Some(Command::Save(state)) => {
                pending = Some(state);
            }
            Some(Command::Flush(reply)) => {
                let result = write_pending(&store, &mut pending).await;
                let _ = reply.send(result);
            }
            None => {
                if let Err(e) = write_pending(&store, &mut pending).await {
                    error!(error = %e, "Final write failed");
                }
                debug!("Persistence task stopped");
                break;
            }
        }
    }
}

async fn write_pending(store: &JsonFileStore, pending: &mut Option<PersistedState>) -> Result<()> {
    let Some(state) = pending.take() else {
        return Ok(());
    };

    let store = store.clone();
    let records = state.records.len();
    tokio::task::spawn_blocking(move || store.save(&state))
        .await
        .map_err(|e| TrackerError::Internal(format!("persistence write panicked: {}", e)))??;

    info!(records, "Saved data directory");
    Ok(())
}
