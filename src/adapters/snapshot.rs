//! Content-hash-keyed snapshot of validated events.
//!
//! Validating a large event file means a bar lookup per row; the snapshot
//! skips that work across runs. The key is a hash of the source file's size
//! and mtime plus a salt (the data source id, since validation outcomes depend
//! on which price data was loaded). A stale or unreadable snapshot is simply
//! rebuilt.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::domain::error::EarntraderError;
use crate::domain::event::ValidEvent;
use crate::domain::validate::EventCounters;
use crate::ports::event_port::EventBook;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    hash: String,
    tickers: Vec<String>,
    counters: EventCounters,
    /// Buckets as pairs; JSON object keys must be strings.
    buckets: Vec<(NaiveDate, Vec<ValidEvent>)>,
}

pub struct EventSnapshotStore {
    path: PathBuf,
}

impl EventSnapshotStore {
    /// Snapshot file inside `data_dir`, named after the event source.
    pub fn new(data_dir: &Path, source_id: &str) -> Self {
        Self {
            path: data_dir.join(format!("{source_id}_events_cache.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hash of the source file's identity (size + mtime) and a salt.
    pub fn content_hash(source_file: &Path, salt: &str) -> Result<String, EarntraderError> {
        let meta = fs::metadata(source_file)?;
        let mtime = meta
            .modified()?
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);

        let mut hasher = Sha256::new();
        hasher.update(format!("{},{}", meta.len(), mtime).as_bytes());
        hasher.update(salt.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Load the snapshot if it exists and matches `hash`.
    pub fn load(&self, hash: &str) -> Option<(EventBook, EventCounters)> {
        let content = fs::read_to_string(&self.path).ok()?;
        let snapshot: Snapshot = match serde_json::from_str(&content) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(target: "hypercache", path = %self.path.display(), error = %e, "unreadable snapshot ignored");
                return None;
            }
        };
        if snapshot.hash != hash {
            tracing::info!(target: "hypercache", path = %self.path.display(), "snapshot stale, rebuilding");
            return None;
        }

        tracing::info!(target: "hypercache", path = %self.path.display(), "events loaded from snapshot");
        let by_entry_date: BTreeMap<NaiveDate, Vec<ValidEvent>> =
            snapshot.buckets.into_iter().collect();
        Some((
            EventBook {
                tickers: snapshot.tickers,
                by_entry_date,
            },
            snapshot.counters,
        ))
    }

    pub fn save(
        &self,
        hash: &str,
        book: &EventBook,
        counters: &EventCounters,
    ) -> Result<(), EarntraderError> {
        let snapshot = Snapshot {
            hash: hash.to_string(),
            tickers: book.tickers.clone(),
            counters: counters.clone(),
            buckets: book
                .by_entry_date
                .iter()
                .map(|(date, events)| (*date, events.clone()))
                .collect(),
        };
        let json = serde_json::to_string(&snapshot).map_err(|e| EarntraderError::EventData {
            file: self.path.display().to_string(),
            reason: format!("snapshot serialization failed: {e}"),
        })?;
        fs::write(&self.path, json)?;
        tracing::info!(target: "hypercache", path = %self.path.display(), "snapshot saved");
        Ok(())
    }
}
