//! CSV shard cache — one immutable file per (symbol, resolution, day).
//!
//! Layout: `{root}/{symbol}/{resolution}/{YYYY-MM-DD}.csv`, rows keyed by
//! timestamp under the column name `last_traded`.
//!
//! Writes are atomic (serialize to `.tmp`, rename into place) so a concurrent
//! reader never observes a torn shard; when two processes race on the same
//! missing day the last writer wins, which is safe because a day's content is
//! reproducible. Presence of a file is the only completeness check — shards
//! are never re-validated or rewritten.

use crate::domain::{Bar, Resolution};
use crate::error::DataError;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Addresses one shard on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShardKey {
    pub symbol: String,
    pub resolution: Resolution,
    pub day: NaiveDate,
}

impl ShardKey {
    pub fn new(symbol: impl Into<String>, resolution: Resolution, day: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            resolution,
            day,
        }
    }
}

pub struct ShardCache {
    root: PathBuf,
}

impl ShardCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic shard location for a key.
    pub fn shard_path(&self, key: &ShardKey) -> PathBuf {
        self.root
            .join(&key.symbol)
            .join(key.resolution.as_str())
            .join(format!("{}.csv", key.day.format("%Y-%m-%d")))
    }

    pub fn exists(&self, key: &ShardKey) -> bool {
        self.shard_path(key).exists()
    }

    /// Persist a shard atomically.
    pub fn write(&self, key: &ShardKey, bars: &[Bar]) -> Result<(), DataError> {
        if bars.is_empty() {
            return Err(DataError::Cache("refusing to write an empty shard".into()));
        }

        let path = self.shard_path(key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| DataError::Cache(format!("create {}: {e}", dir.display())))?;
        }

        let tmp = path.with_extension("csv.tmp");
        if let Err(err) = write_csv(&tmp, bars) {
            let _ = fs::remove_file(&tmp);
            return Err(err);
        }
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            DataError::Cache(format!("atomic rename failed for {}: {e}", path.display()))
        })?;

        info!(path = %path.display(), bars = bars.len(), "shard written");
        Ok(())
    }

    /// Read a shard. Absence is a hard error: the fill protocol guarantees
    /// every day in range was written first, so a missing file means the
    /// protocol was violated or the cache was tampered with externally.
    pub fn read(&self, key: &ShardKey) -> Result<Vec<Bar>, DataError> {
        let path = self.shard_path(key);
        if !path.exists() {
            return Err(DataError::MissingShard { path });
        }

        let mut reader = csv::Reader::from_path(&path)
            .map_err(|e| DataError::Cache(format!("open {}: {e}", path.display())))?;
        let mut bars = Vec::new();
        for row in reader.deserialize() {
            let bar: Bar =
                row.map_err(|e| DataError::Cache(format!("read {}: {e}", path.display())))?;
            bars.push(bar);
        }

        debug!(path = %path.display(), bars = bars.len(), "shard read");
        Ok(bars)
    }
}

fn write_csv(path: &Path, bars: &[Bar]) -> Result<(), DataError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| DataError::Cache(format!("create {}: {e}", path.display())))?;
    for bar in bars {
        writer
            .serialize(bar)
            .map_err(|e| DataError::Cache(format!("serialize row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| DataError::Cache(format!("flush {}: {e}", path.display())))?;
    Ok(())
}
