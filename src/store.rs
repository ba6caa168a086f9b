//! Ordered, date-unique record collection
//!
//! The store keeps records strictly ascending by date and bumps a version
//! counter on every mutation so cached analytics can tell when they are stale.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dates::parse_date;
use crate::error::{Result, TrackerError, ValidationError};
use crate::models::WeightRecord;

/// What to do when an insert lands on an occupied date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwritePolicy {
    /// Refuse with [`TrackerError::Duplicate`]
    Reject,
    /// Replace the existing record in place
    Replace,
}

/// Result of a successful upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced(WeightRecord),
}

/// Unvalidated record as it arrives from an import file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub date: Option<String>,
    pub weight: Option<Decimal>,
    pub fat: Option<Decimal>,
}

impl CandidateRecord {
    pub fn new(date: impl Into<String>, weight: Decimal, fat: Option<Decimal>) -> Self {
        Self {
            date: Some(date.into()),
            weight: Some(weight),
            fat,
        }
    }

    /// Validate into a record, or explain why not
    pub fn validate(&self) -> Result<WeightRecord> {
        let raw_date = self.date.as_deref().ok_or_else(|| {
            TrackerError::Validation(ValidationError::MissingField {
                field: "date".to_string(),
            })
        })?;
        let date = parse_date(raw_date)?;
        let weight = self.weight.ok_or_else(|| {
            TrackerError::Validation(ValidationError::MissingField {
                field: "weight".to_string(),
            })
        })?;
        Ok(WeightRecord::new(date, weight, self.fat)?)
    }
}

/// Counts reported back from a bulk import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub accepted: usize,
    pub rejected: usize,
}

impl ImportSummary {
    pub fn merge(self, other: ImportSummary) -> Self {
        Self {
            accepted: self.accepted + other.accepted,
            rejected: self.rejected + other.rejected,
        }
    }
}

/// Date-ascending collection with at most one record per date
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<WeightRecord>,
    version: u64,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from already-validated records, sorting and deduplicating
    ///
    /// For duplicate dates the later entry in `records` wins.
    pub fn from_records(records: Vec<WeightRecord>) -> Self {
        let mut store = Self::new();
        store.records = dedupe_sorted(records);
        store
    }

    pub fn records(&self) -> &[WeightRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Monotonic mutation counter
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, date: NaiveDate) -> Option<&WeightRecord> {
        self.position(date).ok().map(|i| &self.records[i])
    }

    pub fn last(&self) -> Option<&WeightRecord> {
        self.records.last()
    }

    fn position(&self, date: NaiveDate) -> std::result::Result<usize, usize> {
        self.records.binary_search_by_key(&date, |r| r.date)
    }

    fn touch(&mut self) {
        self.version += 1;
    }

    /// Insert a record, or replace the one on the same date when allowed
    pub fn upsert(
        &mut self,
        record: WeightRecord,
        policy: OverwritePolicy,
    ) -> Result<UpsertOutcome> {
        // Records built through serde skip the constructor checks
        let record = WeightRecord::new(record.date, record.weight, record.fat)?;

        let outcome = match self.position(record.date) {
            Ok(index) => {
                if policy == OverwritePolicy::Reject {
                    return Err(TrackerError::Duplicate { date: record.date });
                }
                let previous = std::mem::replace(&mut self.records[index], record);
                UpsertOutcome::Replaced(previous)
            }
            Err(index) => {
                self.records.insert(index, record);
                UpsertOutcome::Inserted
            }
        };

        self.touch();
        debug!(version = self.version, count = self.records.len(), "Record upserted");
        Ok(outcome)
    }

    /// Edit a record, possibly moving it to a new date
    ///
    /// The target date follows the same overwrite rules as [`upsert`](Self::upsert).
    /// On failure the store is left unchanged.
    pub fn move_record(
        &mut self,
        from: NaiveDate,
        record: WeightRecord,
        policy: OverwritePolicy,
    ) -> Result<UpsertOutcome> {
        let index = self
            .position(from)
            .map_err(|_| TrackerError::NotFound { date: from })?;

        if record.date == from {
            return self.upsert(record, OverwritePolicy::Replace);
        }

        let original = self.records.remove(index);
        match self.upsert(record, policy) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                let restore = self.position(original.date).unwrap_or_else(|i| i);
                self.records.insert(restore, original);
                Err(err)
            }
        }
    }

    /// Delete the record on `date`
    pub fn remove(&mut self, date: NaiveDate) -> Result<WeightRecord> {
        let index = self
            .position(date)
            .map_err(|_| TrackerError::NotFound { date })?;
        let removed = self.records.remove(index);
        self.touch();
        debug!(%date, version = self.version, "Record removed");
        Ok(removed)
    }

    /// Replace the whole history with the valid subset of `candidates`
    pub fn bulk_replace(&mut self, candidates: &[CandidateRecord]) -> ImportSummary {
        let (valid, summary) = validate_candidates(candidates);
        self.records = dedupe_sorted(valid);
        self.touch();
        summary
    }

    /// Merge the valid subset of `candidates` into the existing history
    ///
    /// Incoming records overwrite existing ones with the same date.
    pub fn merge(&mut self, candidates: &[CandidateRecord]) -> ImportSummary {
        let (valid, summary) = validate_candidates(candidates);
        let mut combined = std::mem::take(&mut self.records);
        combined.extend(valid);
        self.records = dedupe_sorted(combined);
        self.touch();
        summary
    }

    /// Drop every record
    pub fn clear(&mut self) {
        self.records.clear();
        self.touch();
    }
}

fn validate_candidates(candidates: &[CandidateRecord]) -> (Vec<WeightRecord>, ImportSummary) {
    let mut summary = ImportSummary::default();
    let mut valid = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        match candidate.validate() {
            Ok(record) => {
                summary.accepted += 1;
                valid.push(record);
            }
            Err(err) => {
                summary.rejected += 1;
                warn!(date = ?candidate.date, error = %err, "Skipping invalid record");
            }
        }
    }

    (valid, summary)
}

/// Stable sort by date, keeping the last occurrence of each date
fn dedupe_sorted(records: Vec<WeightRecord>) -> Vec<WeightRecord> {
    let mut indexed: Vec<(usize, WeightRecord)> = records.into_iter().enumerate().collect();
    indexed.sort_by(|(ia, a), (ib, b)| a.date.cmp(&b.date).then(ib.cmp(ia)));
    indexed.dedup_by_key(|(_, r)| r.date);
    indexed.into_iter().map(|(_, r)| r).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn rec(day: u32, weight: Decimal) -> WeightRecord {
        WeightRecord::new(d(day), weight, None).unwrap()
    }

    #[test]
    fn test_upsert_keeps_order() {
        let mut store = RecordStore::new();
        store.upsert(rec(3, dec!(79)), OverwritePolicy::Reject).unwrap();
        store.upsert(rec(1, dec!(80)), OverwritePolicy::Reject).unwrap();
        store.upsert(rec(2, dec!(79.5)), OverwritePolicy::Reject).unwrap();

        let dates: Vec<_> = store.records().iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![d(1), d(2), d(3)]);
        assert_eq!(store.version(), 3);
    }

    #[test]
    fn test_upsert_duplicate_policy() {
        let mut store = RecordStore::new();
        store.upsert(rec(1, dec!(80)), OverwritePolicy::Reject).unwrap();

        let err = store.upsert(rec(1, dec!(81)), OverwritePolicy::Reject).unwrap_err();
        assert!(matches!(err, TrackerError::Duplicate { .. }));
        assert_eq!(store.version(), 1);

        let outcome = store.upsert(rec(1, dec!(81)), OverwritePolicy::Replace).unwrap();
        assert_eq!(outcome, UpsertOutcome::Replaced(rec(1, dec!(80))));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(d(1)).unwrap().weight, dec!(81));
    }

    #[test]
    fn test_upsert_revalidates() {
        let mut store = RecordStore::new();
        let bogus = WeightRecord {
            date: d(1),
            weight: dec!(12),
            fat: None,
        };
        assert!(matches!(
            store.upsert(bogus, OverwritePolicy::Replace),
            Err(TrackerError::Validation(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_missing_is_not_found() {
        let mut store = RecordStore::from_records(vec![rec(1, dec!(80))]);
        assert!(matches!(store.remove(d(2)), Err(TrackerError::NotFound { .. })));
        assert_eq!(store.remove(d(1)).unwrap().weight, dec!(80));
        assert!(store.is_empty());
    }

    #[test]
    fn test_move_record_restores_on_conflict() {
        let mut store = RecordStore::from_records(vec![rec(1, dec!(80)), rec(2, dec!(79))]);
        let err = store
            .move_record(d(1), rec(2, dec!(78)), OverwritePolicy::Reject)
            .unwrap_err();
        assert!(matches!(err, TrackerError::Duplicate { .. }));
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(d(1)).unwrap().weight, dec!(80));

        store
            .move_record(d(1), rec(5, dec!(78)), OverwritePolicy::Reject)
            .unwrap();
        assert!(store.get(d(1)).is_none());
        assert_eq!(store.last().unwrap().date, d(5));
    }

    #[test]
    fn test_bulk_replace_drops_invalid_and_keeps_latest() {
        let mut store = RecordStore::from_records(vec![rec(9, dec!(90))]);
        let candidates = vec![
            CandidateRecord::new("2024-01-02", dec!(79), None),
            CandidateRecord::new("2024-02-30", dec!(79), None),
            CandidateRecord {
                date: Some("2024-01-03".to_string()),
                weight: None,
                fat: None,
            },
            CandidateRecord::new("2024-01-01", dec!(80), None),
            CandidateRecord::new("2024-01-02", dec!(78.5), None),
        ];

        let summary = store.bulk_replace(&candidates);
        assert_eq!(summary, ImportSummary { accepted: 3, rejected: 2 });
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(d(2)).unwrap().weight, dec!(78.5));
        assert!(store.get(d(9)).is_none());
    }

    #[test]
    fn test_merge_overwrites_existing() {
        let mut store = RecordStore::from_records(vec![rec(1, dec!(80)), rec(2, dec!(79))]);
        store.merge(&[CandidateRecord::new("2024-01-02", dec!(78), None)]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(d(2)).unwrap().weight, dec!(78));
    }
}
