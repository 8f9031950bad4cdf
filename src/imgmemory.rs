//! In-process signature storage with an inverted word index and JSON
//! snapshots.

use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

use crate::imgstore::{SignatureRecord, SignatureStorage};
use crate::imgwords::WordTerm;

/// Snapshot layout version written by [`MemoryStorage::save_json`]
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors reading or writing a storage snapshot
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// File could not be opened, read or written
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// File is not a valid snapshot
    #[error("Snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Snapshot written by an incompatible version
    #[error("Unsupported snapshot version {found}, expected {expected}")]
    Version { found: u32, expected: u32 },
}

#[derive(Debug, Clone)]
struct Entry<M> {
    seq: u64,
    record: SignatureRecord<M>,
}

#[derive(Serialize)]
struct SnapshotOut<'a, M> {
    version: u32,
    records: Vec<&'a SignatureRecord<M>>,
}

#[derive(Deserialize)]
struct SnapshotIn<M> {
    version: u32,
    records: Vec<SignatureRecord<M>>,
}

/// Storage keeping every record in memory.
///
/// Query results come back in insertion order; replacing a key keeps its
/// original position.
#[derive(Debug, Clone)]
pub struct MemoryStorage<M> {
    records: FxHashMap<String, Entry<M>>,
    postings: FxHashMap<WordTerm, FxHashSet<String>>,
    next_seq: u64,
    limit: Option<usize>,
}

impl<M> Default for MemoryStorage<M> {
    fn default() -> Self {
        Self {
            records: FxHashMap::default(),
            postings: FxHashMap::default(),
            next_seq: 0,
            limit: None,
        }
    }
}

impl<M> MemoryStorage<M> {
    /// Empty storage without a result cap
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty storage returning at most `limit` candidates per query
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record stored under `key`
    pub fn get(&self, key: &str) -> Option<&SignatureRecord<M>> {
        self.records.get(key).map(|e| &e.record)
    }

    /// All records in insertion order
    pub fn records(&self) -> Vec<&SignatureRecord<M>> {
        let mut entries: Vec<&Entry<M>> = self.records.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| &e.record).collect()
    }

    fn insert(&mut self, record: SignatureRecord<M>) {
        let seq = match self.remove(&record.key) {
            Some(seq) => seq,
            None => {
                self.next_seq += 1;
                self.next_seq
            }
        };

        for term in &record.words {
            self.postings
                .entry(*term)
                .or_default()
                .insert(record.key.clone());
        }
        self.records.insert(record.key.clone(), Entry { seq, record });
    }

    fn remove(&mut self, key: &str) -> Option<u64> {
        let entry = self.records.remove(key)?;
        for term in &entry.record.words {
            if let Some(keys) = self.postings.get_mut(term) {
                keys.remove(key);
                if keys.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
        Some(entry.seq)
    }
}

impl<M: Clone> SignatureStorage<M> for MemoryStorage<M> {
    type Error = Infallible;

    fn upsert(&mut self, record: SignatureRecord<M>) -> Result<(), Infallible> {
        debug!("upsert `{}`", record.key);
        self.insert(record);
        Ok(())
    }

    fn query_by_any_term(&self, terms: &[WordTerm]) -> Result<Vec<SignatureRecord<M>>, Infallible> {
        let mut hits: FxHashSet<&str> = FxHashSet::default();
        for term in terms {
            if let Some(keys) = self.postings.get(term) {
                hits.extend(keys.iter().map(String::as_str));
            }
        }

        let mut entries: Vec<&Entry<M>> = hits
            .into_iter()
            .filter_map(|key| self.records.get(key))
            .collect();
        entries.sort_by_key(|e| e.seq);
        if let Some(limit) = self.limit {
            entries.truncate(limit);
        }

        debug!("{} terms matched {} records", terms.len(), entries.len());
        Ok(entries.into_iter().map(|e| e.record.clone()).collect())
    }

    fn delete(&mut self, key: &str) -> Result<(), Infallible> {
        if self.remove(key).is_some() {
            debug!("deleted `{}`", key);
        }
        Ok(())
    }
}

impl<M: Serialize> MemoryStorage<M> {
    /// Write every record, in insertion order, to a JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), SnapshotError> {
        let snapshot = SnapshotOut {
            version: SNAPSHOT_VERSION,
            records: self.records(),
        };
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &snapshot)?;
        writer.flush()?;
        Ok(())
    }
}

impl<M: DeserializeOwned> MemoryStorage<M> {
    /// Load a snapshot written by [`MemoryStorage::save_json`] and rebuild
    /// the word index.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, SnapshotError> {
        let reader = BufReader::new(File::open(path)?);
        let snapshot: SnapshotIn<M> = serde_json::from_reader(reader)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Version {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }

        let mut storage = Self::default();
        for record in snapshot.records {
            storage.insert(record);
        }
        Ok(storage)
    }
}
