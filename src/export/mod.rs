pub mod exporter;
pub mod filename;

pub use exporter::{CsvExporter, ExportError, ExportRow, HEADER};
pub use filename::{DEFAULT_EXPORT_FILENAME, resolve_export_path, sanitize_filename};
