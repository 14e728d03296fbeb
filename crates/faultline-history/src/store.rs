//! ---
//! fl_section: "03-persistence-logging"
//! fl_subsection: "module"
//! fl_type: "source"
//! fl_scope: "code"
//! fl_description: "Persistence abstractions for the run history."
//! fl_version: "v0.0.0-prealpha"
//! fl_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use faultline_common::AdvisoryLock;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::records::{HistoryRecord, HistorySnapshot};
use crate::{HistoryError, Result};

/// On-disk format version written into the header line.
pub const HISTORY_FORMAT_VERSION: u16 = 1;

const LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Header stored as the first line of the history file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct HistoryHeader {
    version: u16,
    created_at: DateTime<Utc>,
}

/// One persisted line: sequence, checksum, and the tagged record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct HistoryEntry {
    sequence: u64,
    recorded_at: DateTime<Utc>,
    checksum: String,
    record: HistoryRecord,
}

fn checksum(record: &HistoryRecord) -> Result<String> {
    let bytes = serde_json::to_vec(record)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[derive(Debug)]
struct WriterState {
    next_sequence: u64,
    known_len: u64,
}

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    writer: Mutex<WriterState>,
}

/// Append-only store handle. Clones share one in-process writer; a sibling lock
/// file serializes writers across processes.
///
/// Each record is written as one complete newline-terminated line, and readers
/// ignore an unterminated tail or a line whose checksum does not match, so a
/// partially written record is never observed.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    inner: Arc<Inner>,
}

impl HistoryStore {
    /// Open (creating if needed) the history file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let _lock = AdvisoryLock::acquire(&path, LOCK_TIMEOUT)?;
        let needs_header = !path.exists() || fs::metadata(&path)?.len() == 0;
        if needs_header {
            let header = HistoryHeader {
                version: HISTORY_FORMAT_VERSION,
                created_at: Utc::now(),
            };
            let mut line = serde_json::to_string(&header)?;
            line.push('\n');
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            file.write_all(line.as_bytes())?;
            file.sync_data()?;
            info!(path = %path.display(), "created history store");
        } else {
            verify_header(&path)?;
        }

        let last = last_sequence(&path)?;
        let known_len = fs::metadata(&path)?.len();
        Ok(Self {
            inner: Arc::new(Inner {
                path,
                writer: Mutex::new(WriterState {
                    next_sequence: last + 1,
                    known_len,
                }),
            }),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Append a single record, returning its sequence number.
    pub fn append(&self, record: impl Into<HistoryRecord>) -> Result<u64> {
        let sequences = self.append_all(vec![record.into()])?;
        Ok(sequences.into_iter().next().unwrap_or_default())
    }

    /// Append records atomically with respect to other writers, in order.
    pub fn append_all(&self, records: Vec<HistoryRecord>) -> Result<Vec<u64>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let mut state = self.inner.writer.lock();
        let _lock = AdvisoryLock::acquire(&self.inner.path, LOCK_TIMEOUT)?;

        let current_len = fs::metadata(&self.inner.path)?.len();
        if current_len != state.known_len {
            state.next_sequence = last_sequence(&self.inner.path)? + 1;
        }

        let mut buffer = String::new();
        if !ends_with_newline(&self.inner.path)? {
            warn!(path = %self.inner.path.display(), "sealing unterminated history tail");
            buffer.push('\n');
        }
        let mut sequences = Vec::with_capacity(records.len());
        for record in records {
            let entry = HistoryEntry {
                sequence: state.next_sequence,
                recorded_at: Utc::now(),
                checksum: checksum(&record)?,
                record,
            };
            buffer.push_str(&serde_json::to_string(&entry)?);
            buffer.push('\n');
            sequences.push(entry.sequence);
            state.next_sequence += 1;
        }

        let mut file = OpenOptions::new().append(true).open(&self.inner.path)?;
        file.write_all(buffer.as_bytes())?;
        file.sync_data()?;
        state.known_len = fs::metadata(&self.inner.path)?.len();
        debug!(
            path = %self.inner.path.display(),
            appended = sequences.len(),
            "history records appended"
        );
        Ok(sequences)
    }

    /// Read every intact record in append order.
    pub fn records(&self) -> Result<Vec<HistoryRecord>> {
        read_records(&self.inner.path)
    }

    /// All records grouped by collection.
    pub fn load(&self) -> Result<HistorySnapshot> {
        let mut snapshot = HistorySnapshot::default();
        for record in self.records()? {
            snapshot.push(record);
        }
        Ok(snapshot)
    }

    /// Records whose timestamp falls in `[start, end)`.
    pub fn load_window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<HistorySnapshot> {
        let mut snapshot = HistorySnapshot::default();
        for record in self.records()? {
            let at = record.timestamp();
            if at >= start && at < end {
                snapshot.push(record);
            }
        }
        Ok(snapshot)
    }

    /// Append records from a JSON export, skipping ids already present.
    pub fn import(&self, path: impl AsRef<Path>) -> Result<ImportSummary> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let export: HistorySnapshot = serde_json::from_str(&contents)?;
        let known: HashSet<Uuid> = self.records()?.iter().map(HistoryRecord::id).collect();

        let mut summary = ImportSummary::default();
        let mut fresh = Vec::new();
        let mut seen = HashSet::new();
        for record in export.into_records() {
            if known.contains(&record.id()) || !seen.insert(record.id()) {
                summary.skipped += 1;
            } else {
                fresh.push(record);
            }
        }
        summary.imported = fresh.len();
        self.append_all(fresh)?;
        info!(
            source = %path.display(),
            imported = summary.imported,
            skipped = summary.skipped,
            "history import completed"
        );
        Ok(summary)
    }
}

/// Outcome of [`HistoryStore::import`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

fn verify_header(path: &Path) -> Result<()> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut first_line = String::new();
    reader.read_line(&mut first_line)?;
    let header: HistoryHeader = serde_json::from_str(first_line.trim())
        .map_err(|_| HistoryError::InvalidHeader(path.display().to_string()))?;
    if header.version > HISTORY_FORMAT_VERSION {
        return Err(HistoryError::UnsupportedVersion(header.version));
    }
    Ok(())
}

fn ends_with_newline(path: &Path) -> Result<bool> {
    let mut file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn last_sequence(path: &Path) -> Result<u64> {
    Ok(read_entries(path)?
        .last()
        .map(|entry| entry.sequence)
        .unwrap_or(0))
}

fn read_records(path: &Path) -> Result<Vec<HistoryRecord>> {
    Ok(read_entries(path)?
        .into_iter()
        .map(|entry| entry.record)
        .collect())
}

fn read_entries(path: &Path) -> Result<Vec<HistoryEntry>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };
    // Only newline-terminated lines are complete; an unterminated tail is an in-flight write.
    let complete = match contents.rfind('\n') {
        Some(idx) => &contents[..=idx],
        None => return Ok(Vec::new()),
    };
    let mut entries = Vec::new();
    for (index, line) in complete.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let entry: HistoryEntry = match serde_json::from_str(line) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(line = index + 1, error = %err, "skipping unreadable history line");
                continue;
            }
        };
        if checksum(&entry.record)? != entry.checksum {
            warn!(line = index + 1, "skipping history line with checksum mismatch");
            continue;
        }
        entries.push(entry);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{RunKind, RunRecord};
    use tempfile::tempdir;

    fn run(subject: &str, started_at: DateTime<Utc>) -> RunRecord {
        RunRecord {
            id: Uuid::new_v4(),
            kind: RunKind::Heal,
            subject: subject.into(),
            started_at,
            finished_at: started_at,
            duration_seconds: 1.0,
            success: true,
            status: "success".into(),
            attempts: 1,
        }
    }

    #[test]
    fn append_assigns_increasing_sequences_across_handles() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let first = HistoryStore::open(&path).unwrap();
        let second = HistoryStore::open(&path).unwrap();

        assert_eq!(first.append(run("a", Utc::now())).unwrap(), 1);
        assert_eq!(second.append(run("b", Utc::now())).unwrap(), 2);
        assert_eq!(first.append(run("c", Utc::now())).unwrap(), 3);

        let subjects: Vec<_> = first
            .load()
            .unwrap()
            .runs
            .into_iter()
            .map(|r| r.subject)
            .collect();
        assert_eq!(subjects, vec!["a", "b", "c"]);
    }

    #[test]
    fn torn_tail_and_tampered_lines_are_invisible() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let store = HistoryStore::open(&path).unwrap();
        store.append(run("intact", Utc::now())).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(br#"{"sequence":2,"recorded_at":"#).unwrap();
        drop(file);
        assert_eq!(store.load().unwrap().runs.len(), 1);

        store.append(run("after-tear", Utc::now())).unwrap();
        let subjects: Vec<_> = store.load().unwrap().runs.into_iter().map(|r| r.subject).collect();
        assert_eq!(subjects, vec!["intact", "after-tear"]);

        let contents = fs::read_to_string(&path).unwrap();
        fs::write(&path, contents.replace("\"intact\"", "\"forged\"")).unwrap();
        let subjects: Vec<_> = store.load().unwrap().runs.into_iter().map(|r| r.subject).collect();
        assert_eq!(subjects, vec!["after-tear"]);
    }

    #[test]
    fn window_is_half_open() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::open(dir.path().join("h.jsonl")).unwrap();
        let end = Utc::now();
        let start = end - chrono::Duration::days(7);
        store.append(run("before", start - chrono::Duration::seconds(1))).unwrap();
        store.append(run("start", start)).unwrap();
        store.append(run("end", end)).unwrap();
        let window = store.load_window(start, end).unwrap();
        let subjects: Vec<_> = window.runs.iter().map(|r| r.subject.as_str()).collect();
        assert_eq!(subjects, vec!["start"]);
    }
}
