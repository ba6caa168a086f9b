use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

use crate::models::{Settings, WeightRecord};

pub mod csv;
pub mod json;

/// Export format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    /// Records only, spreadsheet friendly
    Csv,
    /// Full backup with settings
    Json,
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    /// `YYMMDD_Weight_Backup.<ext>` for the given day
    pub fn default_file_name(&self, date: NaiveDate) -> String {
        format!("{}_Weight_Backup.{}", date.format("%y%m%d"), self.extension())
    }
}

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Write records (and, for JSON, settings) in `format` to any writer
pub fn export_to_writer<W: Write>(
    format: ExportFormat,
    records: &[WeightRecord],
    settings: &Settings,
    exported_at: DateTime<Utc>,
    writer: W,
) -> Result<(), ExportError> {
    match format {
        ExportFormat::Csv => csv::write_records(records, writer),
        ExportFormat::Json => json::write_backup(records, settings, exported_at, writer),
    }
}

/// Write an export file, replacing any existing file at `output_path`
pub fn export_to_path<P: AsRef<Path>>(
    format: ExportFormat,
    records: &[WeightRecord],
    settings: &Settings,
    exported_at: DateTime<Utc>,
    output_path: P,
) -> Result<(), ExportError> {
    let output_path = output_path.as_ref();
    let mut writer = BufWriter::new(File::create(output_path)?);
    export_to_writer(format, records, settings, exported_at, &mut writer)?;
    writer.flush()?;

    info!(
        file = %output_path.display(),
        format = format.extension(),
        records = records.len(),
        "Exported records"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!(matches!(
            "pdf".parse::<ExportFormat>(),
            Err(ExportError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_default_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            ExportFormat::Csv.default_file_name(date),
            "240309_Weight_Backup.csv"
        );
        assert_eq!(
            ExportFormat::Json.default_file_name(date),
            "240309_Weight_Backup.json"
        );
    }
}
