//! Backup import
//!
//! Importers only parse; validation of each candidate and merging into the
//! store happen in [`crate::store::RecordStore`]. Rows that cannot even be
//! split into fields are counted as skipped here.

use std::path::Path;
use tracing::info;

use crate::error::ImportError;
use crate::models::Settings;
use crate::store::CandidateRecord;

pub mod csv;
pub mod json;

/// How parsed candidates combine with the existing history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Merge by date into existing records
    Merge,
    /// Replace the whole history
    Replace,
}

/// Candidates parsed from one file
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedImport {
    pub candidates: Vec<CandidateRecord>,
    /// Lines that were not records at all
    pub skipped: usize,
    /// Settings carried by a full backup
    pub settings: Option<Settings>,
    pub mode: ImportMode,
}

/// Trait for importing weight records from different file formats
pub trait ImportFormat {
    /// Check if this importer can handle the given file
    fn can_import(&self, file_path: &Path) -> bool;

    /// Parse file content with any byte-order mark already removed
    fn parse(&self, content: &str) -> Result<ParsedImport, ImportError>;

    /// Get the format name for this importer
    fn format_name(&self) -> &'static str;
}

/// Picks an importer by file extension
pub struct ImportManager {
    importers: Vec<Box<dyn ImportFormat>>,
}

impl ImportManager {
    pub fn new() -> Self {
        let importers: Vec<Box<dyn ImportFormat>> = vec![
            Box::new(csv::CsvImporter::new()),
            Box::new(json::JsonImporter::new()),
        ];

        Self { importers }
    }

    pub fn importer_for(&self, file_path: &Path) -> Result<&dyn ImportFormat, ImportError> {
        self.importers
            .iter()
            .find(|importer| importer.can_import(file_path))
            .map(|importer| importer.as_ref())
            .ok_or_else(|| ImportError::UnsupportedFormat {
                format: file_path
                    .extension()
                    .map(|ext| ext.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            })
    }

    /// Read and parse a file, auto-detecting the format
    pub fn import_file(&self, file_path: &Path) -> Result<ParsedImport, ImportError> {
        let importer = self.importer_for(file_path)?;
        let content = std::fs::read_to_string(file_path).map_err(|e| ImportError::Unreadable {
            path: file_path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let parsed = importer.parse(strip_bom(&content).trim())?;
        info!(
            file = %file_path.display(),
            format = importer.format_name(),
            candidates = parsed.candidates.len(),
            skipped = parsed.skipped,
            "Parsed import file"
        );
        Ok(parsed)
    }
}

impl Default for ImportManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop a leading UTF-8 byte-order mark
pub fn strip_bom(content: &str) -> &str {
    content.strip_prefix('\u{feff}').unwrap_or(content)
}

fn has_extension(file_path: &Path, wanted: &str) -> bool {
    file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case(wanted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_strip_bom() {
        assert_eq!(strip_bom("\u{feff}Date,Weight"), "Date,Weight");
        assert_eq!(strip_bom("Date,Weight"), "Date,Weight");
    }

    #[test]
    fn test_importer_detection() {
        let manager = ImportManager::new();
        assert_eq!(
            manager.importer_for(Path::new("backup.CSV")).unwrap().format_name(),
            "CSV"
        );
        assert_eq!(
            manager.importer_for(Path::new("backup.json")).unwrap().format_name(),
            "JSON"
        );
        assert!(matches!(
            manager.importer_for(Path::new("backup.xml")),
            Err(ImportError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_import_file_with_bom() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "\u{feff}Date,Weight,BodyFat\n2024-01-01,80.0,\n").unwrap();

        let parsed = ImportManager::new().import_file(file.path()).unwrap();
        assert_eq!(parsed.candidates.len(), 1);
        assert_eq!(parsed.mode, ImportMode::Merge);
    }

    #[test]
    fn test_missing_file() {
        let err = ImportManager::new()
            .import_file(Path::new("/nonexistent/backup.csv"))
            .unwrap_err();
        assert!(matches!(err, ImportError::Unreadable { .. }));
    }
}
