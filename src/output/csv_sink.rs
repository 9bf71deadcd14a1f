//! CSV record sink

use crate::output::traits::{OutputError, OutputResult, RecordSchema, RecordSink};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Append-only CSV file guarded by a mutex
///
/// Every row is written and flushed while the lock is held, so concurrent
/// writers never interleave partial rows.
pub struct CsvSink {
    path: PathBuf,
    schema: RecordSchema,
    writer: Mutex<csv::Writer<File>>,
}

impl CsvSink {
    /// Creates (truncating) the file at `path` and writes the schema header
    pub fn create(path: &Path, schema: RecordSchema) -> OutputResult<Self> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(schema.header())?;
        writer.flush()?;

        Ok(Self {
            path: path.to_path_buf(),
            schema,
            writer: Mutex::new(writer),
        })
    }

    /// Opens `path` for appending; writes the header only if the file is new
    pub fn open_append(path: &Path, schema: RecordSchema) -> OutputResult<Self> {
        let existing = path.exists() && std::fs::metadata(path)?.len() > 0;
        if !existing {
            return Self::create(path, schema);
        }

        let file = OpenOptions::new().append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            schema,
            writer: Mutex::new(csv::Writer::from_writer(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> RecordSchema {
        self.schema
    }
}

impl RecordSink for CsvSink {
    fn append(&self, record: &[String]) -> OutputResult<()> {
        let expected = self.schema.width();
        if record.len() != expected {
            return Err(OutputError::FieldCount {
                expected,
                actual: record.len(),
            });
        }

        let mut writer = self.writer.lock().unwrap();
        writer.write_record(record)?;
        writer.flush()?;
        Ok(())
    }
}

/// Reads every data row of a CSV file written by [`CsvSink`]
pub fn read_records(path: &Path) -> OutputResult<Vec<Vec<String>>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok(rows)
}
