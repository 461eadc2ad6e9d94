use std::io;
use std::path::PathBuf;

use super::domain::StudentRecord;

/// Fixed column order of the derived roster export. Import accepts these
/// headers verbatim, so an exported roster re-imports as pure updates.
pub const EXPORT_HEADER: [&str; 7] = [
    "student_number",
    "program",
    "year_of_study",
    "term",
    "gpa",
    "attendance_rate",
    "balance",
];

/// Render the full record set as a csv document. Values containing
/// delimiters or quotes are quoted by the writer.
pub fn render_roster(records: &[StudentRecord]) -> Result<String, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_HEADER)?;
    for record in records {
        writer.write_record(&[
            record.student_number.as_str().to_string(),
            record.program.clone(),
            record.year_of_study.to_string(),
            record.term.label().to_string(),
            record.gpa.to_string(),
            record.attendance_rate.to_string(),
            record.balance.to_string(),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| csv::Error::from(io::Error::new(io::ErrorKind::Other, err.to_string())))?;
    String::from_utf8(bytes)
        .map_err(|err| csv::Error::from(io::Error::new(io::ErrorKind::InvalidData, err)))
}

/// Outbound destination for the regenerated roster.
pub trait ExportSink: Send + Sync {
    fn publish(&self, roster_csv: &str) -> Result<(), ExportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("export sink unavailable: {0}")]
    Sink(String),
}

/// Writes the roster to a local file, replacing the previous snapshot.
pub struct FileExportSink {
    path: PathBuf,
}

impl FileExportSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl ExportSink for FileExportSink {
    fn publish(&self, roster_csv: &str) -> Result<(), ExportError> {
        std::fs::write(&self.path, roster_csv)
            .map_err(|err| ExportError::Sink(format!("{}: {err}", self.path.display())))
    }
}
