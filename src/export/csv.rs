use super::ExportError;
use crate::models::WeightRecord;
use crate::numeric::format_fixed;
use std::io::Write;

/// Byte-order mark so spreadsheet tools pick UTF-8
const BOM: &str = "\u{feff}";

/// Write records as `Date,Weight,BodyFat`, one row per day
///
/// Body fat is left blank when it was not measured.
pub fn write_records<W: Write>(records: &[WeightRecord], mut writer: W) -> Result<(), ExportError> {
    write!(writer, "{}", BOM)?;
    writeln!(writer, "Date,Weight,BodyFat")?;

    for record in records {
        writeln!(
            writer,
            "{},{},{}",
            record.date.format("%Y-%m-%d"),
            format_fixed(record.weight, 1),
            record.fat.map_or(String::new(), |f| format_fixed(f, 1))
        )?;
    }

    Ok(())
}
