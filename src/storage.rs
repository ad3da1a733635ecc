//! Result persistence.
//!
//! A campaign writes a one-shot settings snapshot, a header row, and then
//! appends one batch of rows per completed cycle. [`CsvResultSink`] reopens
//! the result file for every batch so that a crash loses at most the cycle
//! in flight.

use crate::error::{MotionError, MotionResult};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// One result row: record fields followed by instrument readings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    /// Cell values, in header order
    pub fields: Vec<String>,
}

impl ResultRow {
    /// Build a row from record fields and instrument readings.
    pub fn new(mut fields: Vec<String>, readings: Vec<String>) -> Self {
        fields.extend(readings);
        Self { fields }
    }

    /// Value of column `index`, if present.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }
}

/// Destination of campaign output.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Write the settings snapshot, one `Label: value` line each.
    async fn write_settings(&mut self, lines: &[String]) -> MotionResult<()>;

    /// Write the header row. Called once, before any `append`.
    async fn write_header(&mut self, columns: &[String]) -> MotionResult<()>;

    /// Append and flush a batch of rows.
    async fn append(&mut self, rows: &[ResultRow]) -> MotionResult<()>;
}

/// File stem shared by the settings snapshot and the result file.
pub fn file_stem(axis: u32, title: &str, timestamp: DateTime<Local>) -> String {
    format!("{} Axis {axis}~ {title}", timestamp.format("%y%m%d %H;%M;%S"))
}

// =============================================================================
// CSV
// =============================================================================

/// Writes `<stem>.settingsfile` and `<stem>.csv` into an output directory.
#[cfg(feature = "storage_csv")]
#[derive(Debug)]
pub struct CsvResultSink {
    settings_path: PathBuf,
    results_path: PathBuf,
    columns: Option<usize>,
}

#[cfg(feature = "storage_csv")]
impl CsvResultSink {
    /// Create the output directory and derive both file names.
    pub fn create(
        dir: impl AsRef<Path>,
        axis: u32,
        title: &str,
        timestamp: DateTime<Local>,
    ) -> MotionResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let stem = file_stem(axis, title, timestamp);
        Ok(Self {
            settings_path: dir.join(format!("{stem}.settingsfile")),
            results_path: dir.join(format!("{stem}.csv")),
            columns: None,
        })
    }

    /// Path of the settings snapshot.
    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// Path of the result file.
    pub fn results_path(&self) -> &Path {
        &self.results_path
    }
}

#[cfg(feature = "storage_csv")]
#[async_trait]
impl ResultSink for CsvResultSink {
    async fn write_settings(&mut self, lines: &[String]) -> MotionResult<()> {
        let mut text = lines.join("\n");
        text.push('\n');
        tokio::fs::write(&self.settings_path, text).await?;
        debug!(path = %self.settings_path.display(), "settings snapshot written");
        Ok(())
    }

    async fn write_header(&mut self, columns: &[String]) -> MotionResult<()> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(columns)?;
        append_bytes(&self.results_path, &into_bytes(writer)?).await?;
        self.columns = Some(columns.len());
        debug!(path = %self.results_path.display(), columns = columns.len(), "result header written");
        Ok(())
    }

    async fn append(&mut self, rows: &[ResultRow]) -> MotionResult<()> {
        let columns = self
            .columns
            .ok_or_else(|| MotionError::Storage("append before header".into()))?;
        if let Some(row) = rows.iter().find(|row| row.fields.len() != columns) {
            return Err(MotionError::Storage(format!(
                "row has {} fields, header has {columns}",
                row.fields.len()
            )));
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        for row in rows {
            writer.write_record(&row.fields)?;
        }
        append_bytes(&self.results_path, &into_bytes(writer)?).await?;
        debug!(rows = rows.len(), "result rows appended");
        Ok(())
    }
}

/// Encoded CSV text held by an in-memory writer.
#[cfg(feature = "storage_csv")]
fn into_bytes(writer: csv::Writer<Vec<u8>>) -> MotionResult<Vec<u8>> {
    writer
        .into_inner()
        .map_err(|err| MotionError::Storage(err.to_string()))
}

/// Append `bytes` to `path`, creating the file if needed. Existing content is
/// never truncated.
#[cfg(feature = "storage_csv")]
async fn append_bytes(path: &Path, bytes: &[u8]) -> MotionResult<()> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    Ok(())
}

// =============================================================================
// In-memory
// =============================================================================

/// Everything a [`MemorySink`] has received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryContents {
    /// Settings snapshot lines
    pub settings: Vec<String>,
    /// Header columns
    pub header: Vec<String>,
    /// Appended rows
    pub rows: Vec<ResultRow>,
    /// Number of `append` calls
    pub flushes: usize,
}

/// Cloneable in-memory sink; clones share contents.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<MemoryContents>>,
}

impl MemorySink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current contents.
    pub fn contents(&self) -> MemoryContents {
        self.inner.lock().clone()
    }

    /// Number of rows appended so far.
    pub fn row_count(&self) -> usize {
        self.inner.lock().rows.len()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn write_settings(&mut self, lines: &[String]) -> MotionResult<()> {
        self.inner.lock().settings = lines.to_vec();
        Ok(())
    }

    async fn write_header(&mut self, columns: &[String]) -> MotionResult<()> {
        self.inner.lock().header = columns.to_vec();
        Ok(())
    }

    async fn append(&mut self, rows: &[ResultRow]) -> MotionResult<()> {
        let mut inner = self.inner.lock();
        inner.rows.extend_from_slice(rows);
        inner.flushes += 1;
        Ok(())
    }
}
