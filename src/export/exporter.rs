use crate::marker::Marker;
use chrono::{DateTime, Local, TimeZone, Utc};
use log::info;
use std::fmt::Display;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const HEADER: [&str; 9] = [
    "Label",
    "Type",
    "Quantity",
    "Location",
    "Purpose",
    "Page",
    "X",
    "Y",
    "Created Date",
];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Export directory not found: {}", .0.display())]
    ExportDirNotFound(PathBuf),
    #[error("Failed to encode CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Failed to write export: {0}")]
    Io(#[from] std::io::Error),
}

/// One CSV line, already formatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub label: String,
    pub kind: String,
    pub quantity: String,
    pub location: String,
    pub purpose: String,
    pub page: String,
    pub x: String,
    pub y: String,
    pub created: String,
}

impl ExportRow {
    pub fn from_marker<Tz>(marker: &Marker, tz: &Tz) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        Self {
            label: marker.label.clone(),
            kind: marker.kind.clone(),
            quantity: marker.quantity.to_string(),
            location: marker.location.clone(),
            purpose: marker.purpose.clone(),
            page: (marker.page_index + 1).to_string(),
            x: format!("{:.2}", marker.x),
            y: format!("{:.2}", marker.y),
            created: format_created(&marker.created_at, tz),
        }
    }

    pub fn fields(&self) -> [&str; 9] {
        [
            self.label.as_str(),
            self.kind.as_str(),
            self.quantity.as_str(),
            self.location.as_str(),
            self.purpose.as_str(),
            self.page.as_str(),
            self.x.as_str(),
            self.y.as_str(),
            self.created.as_str(),
        ]
    }
}

/// `M/D/YYYY, h:mm:ss AM` in the given zone
pub fn format_created<Tz>(created_at: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    created_at
        .with_timezone(tz)
        .format("%-m/%-d/%Y, %-I:%M:%S %p")
        .to_string()
}

/// Writes the full marker list as CSV, ignoring any view filter.
pub struct CsvExporter;

impl CsvExporter {
    /// Rows in store order, dates in local time
    pub fn rows(markers: &[Marker]) -> Vec<ExportRow> {
        Self::rows_in(markers, &Local)
    }

    pub fn rows_in<Tz>(markers: &[Marker], tz: &Tz) -> Vec<ExportRow>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        markers
            .iter()
            .map(|m| ExportRow::from_marker(m, tz))
            .collect()
    }

    pub fn write_csv<W: Write>(writer: W, rows: &[ExportRow]) -> Result<(), ExportError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(HEADER)?;
        for row in rows {
            csv_writer.write_record(row.fields())?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Write every marker to `path`. An empty list still produces the header.
    pub fn export_to_file(markers: &[Marker], path: &Path) -> Result<PathBuf, ExportError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(ExportError::ExportDirNotFound(parent.to_path_buf()));
            }
        }

        let file = fs::File::create(path)?;
        Self::write_csv(file, &Self::rows(markers))?;
        info!("Exported {} markers to {}", markers.len(), path.display());
        Ok(path.to_path_buf())
    }
}
