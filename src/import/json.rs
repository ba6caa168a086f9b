use rust_decimal::Decimal;
use serde_json::Value;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

use crate::error::ImportError;
use crate::import::{has_extension, ImportFormat, ImportMode, ParsedImport};
use crate::models::Settings;
use crate::store::CandidateRecord;

/// Full backup importer: `{ "settings": {...}, "records": [...] }`
///
/// A JSON backup replaces the whole history. Settings are optional and a
/// settings object that does not parse is ignored with a warning.
pub struct JsonImporter;

impl JsonImporter {
    pub fn new() -> Self {
        Self
    }

    /// Accept numbers as well as numeric strings
    fn number(value: Option<&Value>) -> Option<Decimal> {
        match value? {
            Value::Number(n) => Decimal::from_str(&n.to_string())
                .or_else(|_| Decimal::from_scientific(&n.to_string()))
                .ok(),
            Value::String(s) => Decimal::from_str(s.trim()).ok(),
            _ => None,
        }
    }

    fn candidate(entry: &Value) -> Option<CandidateRecord> {
        let object = entry.as_object()?;
        let date = object
            .get("date")
            .and_then(Value::as_str)
            .map(str::to_string);
        Some(CandidateRecord {
            date,
            weight: Self::number(object.get("weight")),
            fat: Self::number(object.get("fat")),
        })
    }
}

impl Default for JsonImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for JsonImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        has_extension(file_path, "json")
    }

    fn parse(&self, content: &str) -> Result<ParsedImport, ImportError> {
        let document: Value =
            serde_json::from_str(content).map_err(|e| ImportError::Json(e.to_string()))?;

        let entries = document
            .get("records")
            .and_then(Value::as_array)
            .ok_or(ImportError::MissingRecords)?;

        let mut candidates = Vec::with_capacity(entries.len());
        let mut skipped = 0;
        for entry in entries {
            match Self::candidate(entry) {
                Some(candidate) => candidates.push(candidate),
                None => skipped += 1,
            }
        }

        let settings = match document.get("settings") {
            Some(Value::Null) | None => None,
            Some(raw) => match serde_json::from_value::<Settings>(raw.clone()) {
                Ok(settings) => Some(settings),
                Err(e) => {
                    warn!(error = %e, "Ignoring unreadable settings in backup");
                    None
                }
            },
        };

        Ok(ParsedImport {
            candidates,
            skipped,
            settings,
            mode: ImportMode::Replace,
        })
    }

    fn format_name(&self) -> &'static str {
        "JSON"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_full_backup() {
        let content = r#"{
            "settings": {"height": 170, "startWeight": 90, "goal1": 75},
            "records": [
                {"date": "2024-01-01", "weight": 90.0, "fat": 30.1},
                {"date": "2024-01-02", "weight": "89.6"}
            ],
            "exportDate": "2024-01-03T08:00:00Z"
        }"#;
        let parsed = JsonImporter::new().parse(content).unwrap();

        assert_eq!(parsed.mode, ImportMode::Replace);
        assert_eq!(parsed.candidates.len(), 2);
        assert_eq!(parsed.candidates[0].fat, Some(dec!(30.1)));
        assert_eq!(parsed.candidates[1].weight, Some(dec!(89.6)));

        let settings = parsed.settings.unwrap();
        assert_eq!(settings.height_cm, dec!(170));
        assert_eq!(settings.goal_weight, dec!(75));
    }

    #[test]
    fn test_missing_records_array() {
        let err = JsonImporter::new().parse(r#"{"settings": {}}"#).unwrap_err();
        assert!(matches!(err, ImportError::MissingRecords));

        let err = JsonImporter::new().parse(r#"{"records": 3}"#).unwrap_err();
        assert!(matches!(err, ImportError::MissingRecords));
    }

    #[test]
    fn test_malformed_json() {
        let err = JsonImporter::new().parse("{not json").unwrap_err();
        assert!(matches!(err, ImportError::Json(_)));
    }

    #[test]
    fn test_non_object_entries_are_skipped() {
        let content = r#"{"records": [42, {"date": "2024-01-01", "weight": "heavy"}]}"#;
        let parsed = JsonImporter::new().parse(content).unwrap();

        assert_eq!(parsed.skipped, 1);
        assert_eq!(parsed.candidates.len(), 1);
        assert_eq!(parsed.candidates[0].weight, None);
        assert!(parsed.settings.is_none());
    }

    #[test]
    fn test_bad_settings_are_ignored() {
        let content = r#"{"settings": {"height": "tall"}, "records": []}"#;
        let parsed = JsonImporter::new().parse(content).unwrap();
        assert!(parsed.settings.is_none());
        assert!(parsed.candidates.is_empty());
    }
}
