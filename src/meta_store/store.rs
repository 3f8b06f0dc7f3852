//! Meta Store - append-only schema history
//!
//! Records live in a JSON-lines file, one [`MetaRecord`] per line, and are
//! cached in memory in append order. An append is written and fsync'ed
//! before the in-memory history changes.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::types::{MetaRecord, SchemaDefinition};

/// The MetaStore manages the schema version history of every logical path
pub struct MetaStore {
    file_path: PathBuf,
    records: Vec<MetaRecord>,
}

impl MetaStore {
    /// Open the history at `file_path`, loading any existing records
    pub fn open<P: AsRef<Path>>(file_path: P) -> StoreResult<Self> {
        let file_path = file_path.as_ref().to_path_buf();
        let records = Self::load_records(&file_path)?;
        debug!(path = %file_path.display(), records = records.len(), "meta store loaded");
        Ok(Self { file_path, records })
    }

    fn load_records(file_path: &Path) -> StoreResult<Vec<MetaRecord>> {
        if !file_path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(file_path)?);
        let mut records = Vec::new();

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }

            match MetaRecord::from_json_line(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(line = line_num + 1, error = %e, "skipping unparsable meta record");
                }
            }
        }

        Ok(records)
    }

    /// Path of the backing file
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Highest recorded version for `path`
    pub fn current_version(&self, path: &str) -> Option<u64> {
        self.records
            .iter()
            .filter(|r| r.path == path)
            .map(|r| r.schema_version)
            .max()
    }

    /// The record with the highest version for `path`
    pub fn get_latest(&self, path: &str) -> StoreResult<MetaRecord> {
        self.records
            .iter()
            .filter(|r| r.path == path)
            .max_by_key(|r| r.schema_version)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("no schema history for path '{}'", path)))
    }

    /// All records for `path`, oldest first
    pub fn history(&self, path: &str) -> Vec<MetaRecord> {
        let mut records: Vec<MetaRecord> = self
            .records
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.schema_version);
        records
    }

    /// Append a record; its version must exceed the current maximum for its path
    pub fn append(&mut self, record: MetaRecord) -> StoreResult<()> {
        if let Some(current) = self.current_version(&record.path) {
            if record.schema_version <= current {
                return Err(StoreError::VersionConflict {
                    path: record.path.clone(),
                    attempted: record.schema_version,
                    current,
                });
            }
        }

        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        writeln!(file, "{}", record.to_json_line()?)?;
        file.sync_all()?;

        info!(
            path = %record.path,
            schema_version = record.schema_version,
            "appended meta record"
        );
        self.records.push(record);
        Ok(())
    }

    /// Seed the history of `path` with `schema` at version 0 if it has none
    ///
    /// Returns whether a record was written.
    pub fn bootstrap(&mut self, path: &str, schema: &SchemaDefinition) -> StoreResult<bool> {
        if self.current_version(path).is_some() {
            return Ok(false);
        }
        info!(path, "bootstrapping meta store with default schema");
        self.append(MetaRecord::new(0, schema, path)?)?;
        Ok(true)
    }
}
