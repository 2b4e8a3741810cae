use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::AppError;

/// A record type with a fixed column layout in a delimited log.
pub trait LogRecord: Serialize + DeserializeOwned {
    const HEADER: &'static [&'static str];
}

/// Append-only CSV file holding records of one type behind a header row.
#[derive(Debug, Clone)]
pub struct CsvLog<R> {
    path: PathBuf,
    _record: PhantomData<fn() -> R>,
}

impl<R: LogRecord> CsvLog<R> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file with only its header row. Returns `false` and leaves
    /// the file alone when it already exists.
    pub fn initialize(&self) -> Result<bool, AppError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(R::HEADER)?;
        writer.flush()?;
        tracing::info!(path = %self.path.display(), "Created log with header");
        Ok(true)
    }

    /// Append `records` in order with a single write. Rows are encoded up
    /// front so an encoding failure leaves the file untouched, and a failed
    /// write is truncated back to the previous length.
    pub fn append(&self, records: &[R]) -> Result<usize, AppError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        for record in records {
            writer.serialize(record)?;
        }
        let bytes = writer.into_inner().map_err(|e| e.into_error())?;

        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        append_or_rollback(&mut file, &bytes, |f, buf| f.write_all(buf))?;
        Ok(records.len())
    }

    pub fn read_all(&self) -> Result<Vec<R>, AppError> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let records = reader.deserialize().collect::<Result<Vec<R>, _>>()?;
        Ok(records)
    }

    /// Number of data rows, header excluded.
    pub fn row_count(&self) -> Result<usize, AppError> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut count = 0;
        for record in reader.records() {
            record?;
            count += 1;
        }
        Ok(count)
    }
}

/// Run `write` and sync; on any failure cut the file back to its length
/// before the write and return the original error.
fn append_or_rollback<F>(file: &mut File, bytes: &[u8], write: F) -> io::Result<()>
where
    F: FnOnce(&mut File, &[u8]) -> io::Result<()>,
{
    let prev_len = file.metadata()?.len();
    if let Err(e) = write(file, bytes).and_then(|()| file.sync_data()) {
        if let Err(truncate_err) = file.set_len(prev_len) {
            tracing::error!(
                error = %truncate_err,
                prev_len,
                "Failed to roll back partial append"
            );
        }
        return Err(e);
    }
    Ok(())
}
