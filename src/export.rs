//! JSON and CSV export of stored records.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone, Utc};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::models::{timestamp, EnrichedRecord};
use crate::safety::validate_export_path;
use crate::store::write_atomic;
use crate::Result;

/// Play times on the page are Japan Standard Time without an offset.
const PLAY_TIME_OFFSET_SECS: i32 = 9 * 3600;

const PLAY_TIME_FORMAT: &str = "%Y/%m/%d %H:%M";

pub const CSV_HEADER: [&str; 10] = [
    "date",
    "title",
    "difficulty",
    "percentage",
    "dxscore",
    "rate",
    "fc",
    "fs",
    "chart",
    "fetched_at",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

/// Play time of a record as an instant, if the page gave a readable one.
pub fn played_at(record: &EnrichedRecord) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(&record.record.played_at, PLAY_TIME_FORMAT).ok()?;
    let offset = FixedOffset::east_opt(PLAY_TIME_OFFSET_SECS)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Records played (or, lacking a play time, ingested) within the last
/// `days` days before `now`. A window reaching past the earliest
/// representable time keeps every record.
pub fn within_days(records: &[EnrichedRecord], days: u32, now: DateTime<Utc>) -> Vec<&EnrichedRecord> {
    let Some(cutoff) = now.checked_sub_signed(Duration::days(i64::from(days))) else {
        return records.iter().collect();
    };
    records
        .iter()
        .filter(|r| played_at(r).unwrap_or(r.fetched_at) >= cutoff)
        .collect()
}

/// `maimai_records_<timestamp>.<ext>`
pub fn default_file_name(format: ExportFormat, now: DateTime<Utc>) -> String {
    format!(
        "maimai_records_{}.{}",
        now.format("%Y-%m-%dT%H-%M-%S"),
        format.extension()
    )
}

pub fn write_json<W: Write>(w: W, records: &[&EnrichedRecord]) -> Result<()> {
    serde_json::to_writer_pretty(w, records)?;
    Ok(())
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn write_row<W: Write>(w: &mut W, row: &[&str]) -> io::Result<()> {
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            w.write_all(b",")?;
        }
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            w.write_all(cell.as_bytes())?;
        }
    }
    w.write_all(b"\r\n")
}

/// CSV with a UTF-8 BOM so spreadsheet apps pick the right encoding for
/// Japanese titles.
pub fn write_csv<W: Write>(mut w: W, records: &[&EnrichedRecord]) -> Result<()> {
    w.write_all("\u{FEFF}".as_bytes())?;
    write_row(&mut w, &CSV_HEADER)?;
    for e in records {
        let r = &e.record;
        let fetched = timestamp::format(&e.fetched_at);
        let row = [
            r.played_at.as_str(),
            r.title.as_str(),
            r.difficulty.as_str(),
            r.percentage.as_str(),
            r.dx_score.as_str(),
            r.rank.as_ref().map(|k| k.as_str()).unwrap_or(""),
            r.combo.map(|t| t.as_str()).unwrap_or(""),
            r.sync.map(|t| t.as_str()).unwrap_or(""),
            if r.is_dx { "DX" } else { "Standard" },
            fetched.as_str(),
        ];
        write_row(&mut w, &row)?;
    }
    w.flush()?;
    Ok(())
}

/// Write `records` to `path` after checking it cannot clobber the store.
pub fn export_to_file(
    records: &[&EnrichedRecord],
    format: ExportFormat,
    path: &Path,
    store_path: &Path,
) -> Result<PathBuf> {
    validate_export_path(path, format.extension(), store_path)?;

    let mut buf = Vec::new();
    match format {
        ExportFormat::Json => write_json(&mut buf, records)?,
        ExportFormat::Csv => write_csv(&mut buf, records)?,
    }
    write_atomic(path, &buf)?;

    info!("Exported {} records to {}", records.len(), path.display());
    Ok(path.to_path_buf())
}
