//! Application controller
//!
//! [`Tracker`] owns the record store, the settings and the injected clock.
//! Mutations are serialised through a mutex; analytics read a snapshot that is
//! recomputed only when the store or settings version changed since the last
//! read. Every successful mutation hands the new state to the persister.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::dates::Clock;
use crate::error::{Result, TrackerError};
use crate::export::{self, ExportFormat};
use crate::import::{ImportManager, ImportMode, ParsedImport};
use crate::models::{Settings, WeightRecord};
use crate::persistence::{DebouncedWriter, JsonFileStore, PersistedState};
use crate::stats::{AnalysisContext, AnalyticsConfig, AnalyticsSnapshot, StatsCalculator};
use crate::store::{ImportSummary, OverwritePolicy, RecordStore, UpsertOutcome};

/// Outcome of importing one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub mode: ImportMode,
    pub summary: ImportSummary,
    /// Lines that could not be read as records at all
    pub skipped: usize,
    pub settings_restored: bool,
}

impl ImportReport {
    /// Everything that did not make it into the store
    pub fn failed(&self) -> usize {
        self.summary.rejected + self.skipped
    }
}

struct VersionedSettings {
    settings: Settings,
    version: u64,
}

struct CachedSnapshot {
    store_version: u64,
    settings_version: u64,
    snapshot: Arc<AnalyticsSnapshot>,
}

/// Single owner of mutable application state
pub struct Tracker {
    store: Mutex<RecordStore>,
    settings: Mutex<VersionedSettings>,
    cache: Mutex<Option<CachedSnapshot>>,
    analytics: AnalyticsConfig,
    calculator: StatsCalculator,
    clock: Arc<dyn Clock>,
    persister: Option<DebouncedWriter>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Tracker {
    /// In-memory tracker without persistence
    pub fn new(records: Vec<WeightRecord>, settings: Settings, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Mutex::new(RecordStore::from_records(records)),
            settings: Mutex::new(VersionedSettings {
                settings,
                version: 0,
            }),
            cache: Mutex::new(None),
            analytics: AnalyticsConfig::default(),
            calculator: StatsCalculator::new(),
            clock,
            persister: None,
        }
    }

    pub fn with_analytics(mut self, config: AnalyticsConfig) -> Self {
        self.calculator = StatsCalculator::with_config(config.clone());
        self.analytics = config;
        self
    }

    pub fn analytics_config(&self) -> &AnalyticsConfig {
        &self.analytics
    }

    pub fn with_persister(mut self, persister: DebouncedWriter) -> Self {
        self.persister = Some(persister);
        self
    }

    /// Load a data directory and persist changes back to it
    ///
    /// Uses `default_settings` when the directory holds no settings yet.
    /// Must be called inside a tokio runtime.
    pub fn open(
        files: JsonFileStore,
        default_settings: Settings,
        quiet_period: std::time::Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let records = files.load_records()?;
        let settings = files.load_settings()?.unwrap_or(default_settings);
        info!(
            dir = %files.dir().display(),
            records = records.len(),
            "Opened data directory"
        );

        let persister = DebouncedWriter::spawn(files, quiet_period);
        Ok(Self::new(records, settings, clock).with_persister(persister))
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn records(&self) -> Vec<WeightRecord> {
        lock(&self.store).records().to_vec()
    }

    pub fn record_count(&self) -> usize {
        lock(&self.store).len()
    }

    pub fn settings(&self) -> Settings {
        lock(&self.settings).settings.clone()
    }

    /// Add a weigh-in; an occupied date needs `overwrite`
    pub fn add_record(
        &self,
        date: NaiveDate,
        weight: Decimal,
        fat: Option<Decimal>,
        overwrite: bool,
    ) -> Result<UpsertOutcome> {
        let record = WeightRecord::new(date, weight, fat)?;
        let outcome = lock(&self.store).upsert(record, policy(overwrite))?;
        info!(%date, %weight, ?outcome, "Record saved");
        self.persist();
        Ok(outcome)
    }

    /// Change the record on `from`, possibly moving it to `date`
    pub fn edit_record(
        &self,
        from: NaiveDate,
        date: NaiveDate,
        weight: Decimal,
        fat: Option<Decimal>,
        overwrite: bool,
    ) -> Result<UpsertOutcome> {
        let record = WeightRecord::new(date, weight, fat)?;
        let outcome = lock(&self.store).move_record(from, record, policy(overwrite))?;
        info!(%from, to = %date, "Record edited");
        self.persist();
        Ok(outcome)
    }

    pub fn remove_record(&self, date: NaiveDate) -> Result<WeightRecord> {
        let removed = lock(&self.store).remove(date)?;
        info!(%date, "Record removed");
        self.persist();
        Ok(removed)
    }

    /// Replace the settings after validation
    pub fn update_settings(&self, settings: Settings) -> Result<()> {
        settings.validate()?;
        {
            let mut current = lock(&self.settings);
            current.settings = settings;
            current.version += 1;
        }
        info!("Settings updated");
        self.persist();
        Ok(())
    }

    /// Apply parsed import data
    ///
    /// JSON backups replace the history and, when present, the settings. CSV
    /// rows are merged by date.
    pub fn apply_import(&self, parsed: ParsedImport) -> Result<ImportReport> {
        let summary = {
            let mut store = lock(&self.store);
            match parsed.mode {
                ImportMode::Replace => store.bulk_replace(&parsed.candidates),
                ImportMode::Merge => store.merge(&parsed.candidates),
            }
        };

        let settings_restored = match parsed.settings {
            Some(settings) => {
                let mut current = lock(&self.settings);
                current.settings = settings;
                current.version += 1;
                true
            }
            None => false,
        };

        let report = ImportReport {
            mode: parsed.mode,
            summary,
            skipped: parsed.skipped,
            settings_restored,
        };
        info!(
            accepted = report.summary.accepted,
            failed = report.failed(),
            settings_restored,
            "Import applied"
        );
        self.persist();
        Ok(report)
    }

    /// Parse and apply an import file, picking the format by extension
    pub fn import_file(&self, path: &Path) -> Result<ImportReport> {
        let parsed = ImportManager::new().import_file(path)?;
        self.apply_import(parsed)
    }

    /// Write the current history in `format`
    pub fn export_to_path(&self, format: ExportFormat, path: &Path) -> Result<()> {
        let records = self.records();
        let settings = self.settings();
        export::export_to_path(format, &records, &settings, Utc::now(), path).map_err(
            |e| match e {
                export::ExportError::IoError(io) => TrackerError::Io(io),
                other => TrackerError::Serialization(other.to_string()),
            },
        )
    }

    /// Drop every record and restore `settings`
    pub fn reset(&self, settings: Settings) -> Result<()> {
        settings.validate()?;
        lock(&self.store).clear();
        {
            let mut current = lock(&self.settings);
            current.settings = settings;
            current.version += 1;
        }
        info!("All data reset");
        self.persist();
        Ok(())
    }

    /// Cached statistics, recomputed when records or settings changed
    pub fn snapshot(&self) -> Arc<AnalyticsSnapshot> {
        let store = lock(&self.store);
        self.snapshot_for(&store)
    }

    fn snapshot_for(&self, store: &RecordStore) -> Arc<AnalyticsSnapshot> {
        let settings_version = lock(&self.settings).version;
        let mut cache = lock(&self.cache);

        if let Some(cached) = cache.as_ref() {
            if cached.store_version == store.version()
                && cached.settings_version == settings_version
            {
                return Arc::clone(&cached.snapshot);
            }
        }

        debug!(
            store_version = store.version(),
            settings_version, "Recomputing analytics snapshot"
        );
        let snapshot = Arc::new(self.calculator.analyze(store.records()));
        *cache = Some(CachedSnapshot {
            store_version: store.version(),
            settings_version,
            snapshot: Arc::clone(&snapshot),
        });
        snapshot
    }

    /// Run an analysis against a consistent view of records and settings
    pub fn analyze<R>(&self, f: impl FnOnce(&AnalysisContext) -> R) -> R {
        let store = lock(&self.store);
        let snapshot = self.snapshot_for(&store);
        let settings = self.settings();
        let ctx = AnalysisContext::new(store.records(), &settings, &snapshot, self.today());
        f(&ctx)
    }

    /// Queue the current state for writing
    ///
    /// The store guard is held across the copy and the send, so states reach
    /// the writer in the order the mutations happened and the last one queued
    /// is always the newest.
    fn persist(&self) {
        let Some(persister) = &self.persister else {
            return;
        };
        let store = lock(&self.store);
        let settings = lock(&self.settings).settings.clone();
        persister.schedule(PersistedState {
            records: store.records().to_vec(),
            settings,
        });
    }

    /// Write any pending changes now
    pub async fn flush(&self) -> Result<()> {
        match &self.persister {
            Some(persister) => persister.flush().await,
            None => Ok(()),
        }
    }
}

fn policy(overwrite: bool) -> OverwritePolicy {
    if overwrite {
        OverwritePolicy::Replace
    } else {
        OverwritePolicy::Reject
    }
}
