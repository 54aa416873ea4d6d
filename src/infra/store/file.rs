//! File-backed job store.
//!
//! Keeps the table in memory and persists a JSON-lines snapshot after every
//! mutation. The snapshot is written to a sibling temp file and renamed over
//! the previous one, so a crash mid-write leaves the old snapshot intact.
//!
//! The first line is a header carrying the highest id ever assigned; each
//! following line is one job definition.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::SchedulerError;
use crate::core::job::{JobDefinition, JobId, JobKey};
use crate::core::store::JobStore;

use super::memory::JobTable;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SnapshotHeader {
    high_water_id: JobId,
}

#[derive(Debug, Default)]
struct Snapshot {
    high_water_id: JobId,
    rows: Vec<JobDefinition>,
}

/// File-backed job store using JSON lines for durability.
pub struct FileJobStore {
    path: PathBuf,
    table: Mutex<JobTable>,
}

impl FileJobStore {
    /// Open (or create) a store at `path`, loading any existing snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::Backend` if the directory cannot be created
    /// or the snapshot cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| SchedulerError::Backend(e.to_string()))?;
        }

        let snapshot = load_from_disk(&path)?;
        let table = JobTable::from_rows(snapshot.rows, snapshot.high_water_id)?;
        debug!(path = %path.display(), jobs = table.rows().count(), "FileJobStore opened");

        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    /// Location of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rewrite_disk(&self, table: &JobTable) -> Result<(), SchedulerError> {
        let tmp_path = self.path.with_extension("jsonl.tmp");
        {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)
                .map_err(|e| SchedulerError::Backend(e.to_string()))?;
            let mut writer = BufWriter::new(file);
            let header = SnapshotHeader {
                high_water_id: table.high_water(),
            };
            let line = serde_json::to_string(&header).map_err(|e| SchedulerError::Backend(e.to_string()))?;
            writeln!(writer, "{line}").map_err(|e| SchedulerError::Backend(e.to_string()))?;
            for row in table.rows() {
                let line =
                    serde_json::to_string(row).map_err(|e| SchedulerError::Backend(e.to_string()))?;
                writeln!(writer, "{line}").map_err(|e| SchedulerError::Backend(e.to_string()))?;
            }
            writer
                .flush()
                .map_err(|e| SchedulerError::Backend(e.to_string()))?;
        }
        fs::rename(&tmp_path, &self.path).map_err(|e| SchedulerError::Backend(e.to_string()))
    }

    /// Apply `mutate` to a copy of the table and commit it only if the
    /// snapshot was written.
    fn commit<T>(
        &self,
        mutate: impl FnOnce(&mut JobTable) -> Result<T, SchedulerError>,
    ) -> Result<T, SchedulerError> {
        let mut table = self.table.lock();
        let mut next = table.clone();
        let out = mutate(&mut next)?;
        self.rewrite_disk(&next)?;
        *table = next;
        Ok(out)
    }
}

fn load_from_disk(path: &Path) -> Result<Snapshot, SchedulerError> {
    let mut snapshot = Snapshot::default();
    if !path.exists() {
        return Ok(snapshot);
    }
    let file = File::open(path).map_err(|e| SchedulerError::Backend(e.to_string()))?;
    let mut first = true;
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| SchedulerError::Backend(e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        if std::mem::take(&mut first) {
            // Snapshots without a header fall back to the largest stored id.
            if let Ok(header) = serde_json::from_str::<SnapshotHeader>(&line) {
                snapshot.high_water_id = header.high_water_id;
                continue;
            }
        }
        let row: JobDefinition =
            serde_json::from_str(&line).map_err(|e| SchedulerError::Backend(e.to_string()))?;
        snapshot.rows.push(row);
    }
    Ok(snapshot)
}

impl JobStore for FileJobStore {
    fn find_all(&self) -> Result<Vec<JobDefinition>, SchedulerError> {
        Ok(self.table.lock().rows().cloned().collect())
    }

    fn find_by_name_and_group(&self, key: &JobKey) -> Result<Option<JobDefinition>, SchedulerError> {
        Ok(self.table.lock().find_by_key(key).cloned())
    }

    fn find_by_id(&self, id: JobId) -> Result<Option<JobDefinition>, SchedulerError> {
        Ok(self.table.lock().find_by_id(id).cloned())
    }

    fn save(&self, job: JobDefinition) -> Result<JobDefinition, SchedulerError> {
        self.commit(|table| table.upsert(job))
    }

    fn delete(&self, job: &JobDefinition) -> Result<(), SchedulerError> {
        self.commit(|table| {
            table.remove(job);
            Ok(())
        })
    }
}
