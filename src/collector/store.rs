//! Durable span storage.
//!
//! # Responsibilities
//! - Append flushed batches to per-day JSONL files
//! - Serve filtered reads, lazy export streams, and age-based cleanup
//!
//! # Design Decisions
//! - One file per UTC day (`spans-YYYY-MM-DD.jsonl`), append-only
//! - Line-delimited JSON keeps export append-friendly and re-ingestable
//! - Cleanup deletes whole expired-day files and rewrites only the
//!   boundary day, so repeated runs are cheap and idempotent
//! - Mutations (append, cleanup) are serialized: the flush task and the
//!   admin cleanup run independently, and a boundary-day rewrite must not
//!   lose a concurrent append

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::stream::{self, Stream, StreamExt};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio_util::io::ReaderStream;

use crate::collector::QueryFilter;
use crate::span::SpanRecord;

/// Error type for storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io: {0}")]
    Io(#[from] io::Error),

    #[error("record encoding: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Append-only span storage rooted at a data directory.
pub struct FileStore {
    data_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn file_for(&self, date: NaiveDate) -> PathBuf {
        self.data_dir.join(format!("spans-{}.jsonl", date))
    }

    /// Append one flushed batch. Records land in the file for their
    /// `collected_at` day, in batch order.
    pub async fn append_batch(&self, batch: &[SpanRecord]) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let _write = self.write_lock.lock().await;
        fs::create_dir_all(&self.data_dir).await?;

        let mut by_day: BTreeMap<NaiveDate, String> = BTreeMap::new();
        for record in batch {
            let line = serde_json::to_string(record)?;
            let buf = by_day.entry(record.collected_at.date_naive()).or_default();
            buf.push_str(&line);
            buf.push('\n');
        }

        for (date, payload) in by_day {
            let mut file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(self.file_for(date))
                .await?;
            file.write_all(payload.as_bytes()).await?;
        }
        Ok(())
    }

    /// Read all persisted records matching the filter.
    pub async fn query(&self, filter: &QueryFilter) -> Result<Vec<SpanRecord>, StoreError> {
        let from = filter.since.date_naive();
        let to = filter.until.date_naive();
        let mut out = Vec::new();

        for date in self.existing_dates().await? {
            if date < from || date > to {
                continue;
            }
            let content = fs::read_to_string(self.file_for(date)).await?;
            for line in content.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<SpanRecord>(line) {
                    Ok(record) => {
                        if filter.matches(&record) {
                            out.push(record);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, %date, "skipping corrupt span record");
                    }
                }
            }
        }
        Ok(out)
    }

    /// Stream raw file bytes for the given date range, oldest day first.
    /// An open-ended bound means "from the first / to the last stored day".
    /// Files are opened and read only as the consumer pulls, so a dropped
    /// consumer never touches the remaining days.
    pub async fn export(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<impl Stream<Item = io::Result<Bytes>> + Send + 'static, StoreError> {
        let paths = self.export_paths(from, to).await?;
        Ok(stream::iter(paths)
            .then(|path| async move {
                match fs::File::open(&path).await {
                    Ok(file) => ReaderStream::new(file).boxed(),
                    Err(e) => stream::once(async move { Err::<Bytes, io::Error>(e) }).boxed(),
                }
            })
            .flatten())
    }

    /// Day files covered by an export range, oldest first.
    async fn export_paths(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<PathBuf>, StoreError> {
        let mut paths = Vec::new();
        for date in self.existing_dates().await? {
            if from.is_some_and(|f| date < f) || to.is_some_and(|t| date > t) {
                continue;
            }
            paths.push(self.file_for(date));
        }
        Ok(paths)
    }

    /// Delete records collected before the cutoff. Returns the number of
    /// records removed. Corrupt lines on the boundary day are dropped and
    /// counted as removed.
    pub async fn cleanup(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let _write = self.write_lock.lock().await;
        let cutoff_day = cutoff.date_naive();
        let mut removed = 0u64;

        for date in self.existing_dates().await? {
            if date > cutoff_day {
                continue;
            }
            let path = self.file_for(date);
            let content = fs::read_to_string(&path).await?;

            if date < cutoff_day {
                removed += content.lines().filter(|l| !l.trim().is_empty()).count() as u64;
                fs::remove_file(&path).await?;
                continue;
            }

            // Boundary day: keep only records at or past the cutoff.
            let mut retained = String::new();
            for line in content.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<SpanRecord>(line) {
                    Ok(r) if r.collected_at >= cutoff => {
                        retained.push_str(line);
                        retained.push('\n');
                    }
                    _ => removed += 1,
                }
            }
            if retained.is_empty() {
                fs::remove_file(&path).await?;
            } else {
                fs::write(&path, retained).await?;
            }
        }
        Ok(removed)
    }

    async fn existing_dates(&self) -> Result<Vec<NaiveDate>, StoreError> {
        let mut dates = Vec::new();
        let mut dir = match fs::read_dir(&self.data_dir).await {
            Ok(d) => d,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(dates),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            if let Some(date) = name.to_str().and_then(parse_file_name) {
                dates.push(date);
            }
        }
        dates.sort();
        Ok(dates)
    }
}

fn parse_file_name(name: &str) -> Option<NaiveDate> {
    let stem = name.strip_prefix("spans-")?.strip_suffix(".jsonl")?;
    NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
}
