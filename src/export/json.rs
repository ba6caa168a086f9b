use super::ExportError;
use crate::models::{Settings, WeightRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Full backup document, readable by the JSON importer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub settings: Settings,
    pub records: Vec<WeightRecord>,
    #[serde(rename = "exportDate")]
    pub export_date: DateTime<Utc>,
}

/// Write a pretty-printed backup with settings and every record
pub fn write_backup<W: Write>(
    records: &[WeightRecord],
    settings: &Settings,
    exported_at: DateTime<Utc>,
    mut writer: W,
) -> Result<(), ExportError> {
    let document = ExportDocument {
        settings: settings.clone(),
        records: records.to_vec(),
        export_date: exported_at,
    };

    serde_json::to_writer_pretty(&mut writer, &document)
        .map_err(|e| ExportError::SerializationError(e.to_string()))?;
    writeln!(writer)?;

    Ok(())
}
