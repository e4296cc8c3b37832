//! Append-only persistence log.
//!
//! One JSON record per line after a magic/version header line. Committed
//! `set`/`del` records are appended in commit order; replay on open rebuilds
//! the keyspace. A truncated or corrupted tail is tolerated: replay stops at
//! the first undecodable line and the store continues from what it has.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{StorageConfig, SyncPolicy};
use crate::error::{Result, StorageError};

const MAGIC: &str = "segmentdb";
const VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    magic: String,
    version: u32,
}

/// A committed write, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub(crate) enum LogRecord {
    Set { key: String, value: String },
    Del { key: String },
}

pub(crate) struct Aof {
    path: PathBuf,
    writer: BufWriter<File>,
    sync_policy: SyncPolicy,
    last_sync: Instant,
    size: u64,
    shrink_baseline: u64,
    auto_shrink_percentage: Option<u64>,
    auto_shrink_min_size: u64,
}

impl Aof {
    /// Open (or create) the log at `path`, replaying any existing records
    /// into the returned keyspace.
    pub(crate) fn open(
        path: &Path,
        config: &StorageConfig,
    ) -> Result<(Self, BTreeMap<String, String>)> {
        let mut keys = BTreeMap::new();
        let existed = path.exists();
        if existed {
            replay(path, &mut keys)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);
        if !existed {
            let header = Header { magic: MAGIC.to_owned(), version: VERSION };
            writeln!(writer, "{}", serde_json::to_string(&header).map_err(encode_err)?)?;
            writer.flush()?;
        }

        let size = std::fs::metadata(path)?.len();
        Ok((
            Self {
                path: path.to_path_buf(),
                writer,
                sync_policy: config.sync_policy,
                last_sync: Instant::now(),
                size,
                shrink_baseline: size,
                auto_shrink_percentage: config.auto_shrink_percentage,
                auto_shrink_min_size: config.auto_shrink_min_size,
            },
            keys,
        ))
    }

    /// Append one commit's records and apply the sync policy.
    pub(crate) fn append(&mut self, records: &[LogRecord]) -> Result<()> {
        for record in records {
            let line = serde_json::to_string(record).map_err(encode_err)?;
            self.size += line.len() as u64 + 1;
            writeln!(self.writer, "{line}")?;
        }
        self.writer.flush()?;

        match self.sync_policy {
            SyncPolicy::Never => {}
            SyncPolicy::Always => self.sync()?,
            SyncPolicy::EverySecond => {
                if self.last_sync.elapsed().as_secs() >= 1 {
                    self.sync()?;
                }
            }
        }
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.writer.get_ref().sync_data()?;
        self.last_sync = Instant::now();
        Ok(())
    }

    /// Rewrite the log as a snapshot of the live keyspace when it has grown
    /// past the configured threshold.
    pub(crate) fn maybe_shrink(&mut self, live: &BTreeMap<String, String>) -> Result<()> {
        let Some(pct) = self.auto_shrink_percentage else { return Ok(()) };
        if self.size < self.auto_shrink_min_size {
            return Ok(());
        }
        let threshold = self.shrink_baseline + self.shrink_baseline * pct / 100;
        if self.size < threshold {
            return Ok(());
        }

        let tmp_path = self.path.with_extension("shrink");
        {
            let tmp = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(tmp);
            let header = Header { magic: MAGIC.to_owned(), version: VERSION };
            writeln!(writer, "{}", serde_json::to_string(&header).map_err(encode_err)?)?;
            for (key, value) in live {
                let record = LogRecord::Set { key: key.clone(), value: value.clone() };
                writeln!(writer, "{}", serde_json::to_string(&record).map_err(encode_err)?)?;
            }
            writer.flush()?;
            writer.get_ref().sync_data()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;

        let file = OpenOptions::new().append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.size = std::fs::metadata(&self.path)?.len();
        self.shrink_baseline = self.size;
        Ok(())
    }
}

fn replay(path: &Path, keys: &mut BTreeMap<String, String>) -> Result<()> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = reader.lines();

    let Some(header_line) = lines.next() else { return Ok(()) };
    let header: Header = serde_json::from_str(&header_line?)
        .map_err(|e| StorageError::Corrupted(format!("bad header: {e}")))?;
    if header.magic != MAGIC || header.version != VERSION {
        return Err(StorageError::Corrupted(format!(
            "unexpected header {}/{}",
            header.magic, header.version
        )));
    }

    for (number, line) in lines.enumerate() {
        let line = line?;
        match serde_json::from_str(&line) {
            Ok(LogRecord::Set { key, value }) => {
                keys.insert(key, value);
            }
            Ok(LogRecord::Del { key }) => {
                keys.remove(&key);
            }
            Err(e) => {
                // Torn tail from a crash mid-append; keep what replayed.
                warn!(line = number + 2, error = %e, "stopping replay at undecodable record");
                break;
            }
        }
    }
    Ok(())
}

fn encode_err(e: serde_json::Error) -> StorageError {
    StorageError::Corrupted(format!("failed to encode record: {e}"))
}
