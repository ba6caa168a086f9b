use csv::{ReaderBuilder, Trim};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use crate::error::ImportError;
use crate::import::{has_extension, ImportFormat, ImportMode, ParsedImport};
use crate::store::CandidateRecord;

/// Positional `date,weight[,bodyFat]` importer
///
/// Header lines are recognised by a first field starting with "date" and
/// ignored wherever they appear. Rows are merged into existing history.
pub struct CsvImporter;

impl CsvImporter {
    pub fn new() -> Self {
        Self
    }

    fn parse_number(field: Option<&str>) -> Option<Decimal> {
        let field = field?.trim().trim_matches('"');
        if field.is_empty() {
            return None;
        }
        Decimal::from_str(field)
            .or_else(|_| Decimal::from_scientific(field))
            .ok()
    }

    fn is_header(first_field: &str) -> bool {
        first_field
            .trim_matches('"')
            .to_ascii_lowercase()
            .starts_with("date")
    }
}

impl Default for CsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for CsvImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        has_extension(file_path, "csv")
    }

    fn parse(&self, content: &str) -> Result<ParsedImport, ImportError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(content.as_bytes());

        let mut candidates = Vec::new();
        let mut skipped = 0;

        for (line, row) in reader.records().enumerate() {
            let row = row.map_err(|e| ImportError::Csv(e.to_string()))?;

            let Some(first) = row.get(0) else {
                continue;
            };
            if first.is_empty() && row.len() == 1 {
                continue;
            }
            if Self::is_header(first) {
                continue;
            }
            if row.len() < 2 {
                debug!(line = line + 1, "Skipping row without a weight column");
                skipped += 1;
                continue;
            }

            candidates.push(CandidateRecord {
                date: Some(first.trim_matches('"').to_string()),
                weight: Self::parse_number(row.get(1)),
                fat: Self::parse_number(row.get(2)),
            });
        }

        Ok(ParsedImport {
            candidates,
            skipped,
            settings: None,
            mode: ImportMode::Merge,
        })
    }

    fn format_name(&self) -> &'static str {
        "CSV"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RecordStore;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_basic_backup() {
        let content = "Date,Weight,BodyFat\n2024-01-01,80.0,25.0\n2024-01-02,79.5,\n";
        let parsed = CsvImporter::new().parse(content).unwrap();

        assert_eq!(parsed.candidates.len(), 2);
        assert_eq!(parsed.candidates[0].weight, Some(dec!(80.0)));
        assert_eq!(parsed.candidates[0].fat, Some(dec!(25.0)));
        assert_eq!(parsed.candidates[1].fat, None);
        assert_eq!(parsed.mode, ImportMode::Merge);
        assert!(parsed.settings.is_none());
    }

    #[test]
    fn test_quoted_fields_and_crlf() {
        let content = "\"date\",\"weight\"\r\n\"2024-01-01\",\"80.2\"\r\n";
        let parsed = CsvImporter::new().parse(content).unwrap();

        assert_eq!(parsed.candidates.len(), 1);
        assert_eq!(parsed.candidates[0].date.as_deref(), Some("2024-01-01"));
        assert_eq!(parsed.candidates[0].weight, Some(dec!(80.2)));
    }

    #[test]
    fn test_invalid_rows_are_rejected_by_the_store() {
        let content = "Date,Weight\n\
                       2024-01-01,80.0\n\
                       \"2024-02-30\",oops\n\
                       2024-01-02,79.8\n\
                       \n\
                       2024-01-03,79.6\n";
        let parsed = CsvImporter::new().parse(content).unwrap();
        assert_eq!(parsed.candidates.len(), 4);
        assert_eq!(parsed.candidates[1].weight, None);

        let mut store = RecordStore::new();
        let summary = store.merge(&parsed.candidates);
        assert_eq!(summary.accepted, 3);
        assert_eq!(summary.rejected, 1);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_single_column_rows_are_skipped() {
        let content = "2024-01-01\n2024-01-02,80.0\n";
        let parsed = CsvImporter::new().parse(content).unwrap();
        assert_eq!(parsed.skipped, 1);
        assert_eq!(parsed.candidates.len(), 1);
    }
}
