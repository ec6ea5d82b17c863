//! Persistent record store.
//!
//! The store is a single JSON document holding every record ever ingested,
//! an identity index for duplicate checks, and a few counters. Records are
//! only ever appended.
//!
//! ## Invariants
//!
//! - `index` holds exactly the identities of `records`.
//! - `total_fetches` grows by one per `merge` call.
//! - `save` replaces the file atomically (temp file + rename), so a crash
//!   leaves either the old or the new document on disk.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::identity::identify;
use crate::models::{timestamp, EnrichedRecord, PlayRecord};
use crate::Result;

/// Current on-disk schema version
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(with = "timestamp", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp::option", default)]
    pub last_updated: Option<DateTime<Utc>>,
    /// Number of ingest calls merged into this store
    #[serde(default)]
    pub total_fetches: u64,
    pub records: Vec<EnrichedRecord>,
    /// Rebuilt from `records` on load when missing or out of sync
    #[serde(rename = "recordIndex", with = "record_index", default)]
    index: FxHashSet<String>,
}

fn default_version() -> u32 {
    SCHEMA_VERSION
}

/// Outcome of one merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    /// Newly stored records, in input order
    pub added: Vec<EnrichedRecord>,
    /// Input records whose identity was already known
    pub duplicates: usize,
}

impl Store {
    pub fn new() -> Self {
        Self::new_at(Utc::now())
    }

    pub fn new_at(now: DateTime<Utc>) -> Self {
        Self {
            version: SCHEMA_VERSION,
            created_at: now,
            last_updated: None,
            total_fetches: 0,
            records: Vec::new(),
            index: FxHashSet::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    /// Read the store at `path`.
    ///
    /// A missing, unreadable or malformed file yields a fresh empty store;
    /// the problem is logged, never returned.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No store at {}, starting a new one", path.display());
                return Self::new();
            }
            Err(e) => {
                warn!("Failed to read store {}: {}, starting a new one", path.display(), e);
                return Self::new();
            }
        };

        match serde_json::from_str::<Store>(&content) {
            Ok(mut store) => {
                if store.version > SCHEMA_VERSION {
                    warn!(
                        "Store {} has schema version {}, newer than {}",
                        path.display(),
                        store.version,
                        SCHEMA_VERSION
                    );
                }
                let dropped = store.drop_duplicate_records();
                if dropped > 0 {
                    warn!(
                        "Store {} had {} records with a repeated _id, kept the first of each",
                        path.display(),
                        dropped
                    );
                }
                if store.rebuild_index() {
                    warn!(
                        "Store {} index did not match its records, rebuilt from {} records",
                        path.display(),
                        store.records.len()
                    );
                }
                info!("Loaded store {} with {} records", path.display(), store.records.len());
                store
            }
            Err(e) => {
                warn!("Failed to parse store {}: {}, starting a new one", path.display(), e);
                Self::new()
            }
        }
    }

    /// Keep only the first record for each `_id`. Returns how many were dropped.
    fn drop_duplicate_records(&mut self) -> usize {
        let before = self.records.len();
        let mut seen: FxHashSet<String> = FxHashSet::default();
        self.records.retain(|r| seen.insert(r.id.clone()));
        before - self.records.len()
    }

    /// Reset the index to the record identities. Returns whether it changed.
    fn rebuild_index(&mut self) -> bool {
        let rebuilt: FxHashSet<String> = self.records.iter().map(|r| r.id.clone()).collect();
        if rebuilt == self.index {
            return false;
        }
        self.index = rebuilt;
        true
    }

    /// Merge `records` stamped with the current time.
    pub fn merge(&mut self, records: Vec<PlayRecord>) -> MergeOutcome {
        self.merge_at(records, Utc::now())
    }

    /// Append every record whose identity is unknown, in input order, and
    /// count the rest as duplicates. Counts as one ingest call regardless of
    /// how many records were added.
    pub fn merge_at(&mut self, records: Vec<PlayRecord>, now: DateTime<Utc>) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        for record in records {
            let id = identify(&record);
            if self.index.contains(&id) {
                debug!(id = %id, title = %record.title, "Duplicate record");
                outcome.duplicates += 1;
                continue;
            }

            let enriched = EnrichedRecord {
                record,
                id: id.clone(),
                fetched_at: now,
            };
            self.index.insert(id);
            self.records.push(enriched.clone());
            outcome.added.push(enriched);
        }

        self.total_fetches += 1;
        outcome
    }

    /// Write the store to `path`, stamping `last_updated`.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.save_at(path, Utc::now())
    }

    pub fn save_at(&mut self, path: &Path, now: DateTime<Utc>) -> Result<()> {
        self.last_updated = Some(now);
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, json.as_bytes())?;
        info!("Saved store {} with {} records", path.display(), self.records.len());
        Ok(())
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write to a sibling temp file, sync it, then rename over `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    let result = (|| {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// `recordIndex` is a JSON object of `id -> true`. Keys are written sorted
/// so the file is stable across saves.
mod record_index {
    use rustc_hash::FxHashSet;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::HashMap;

    pub fn serialize<S: Serializer>(index: &FxHashSet<String>, serializer: S) -> Result<S::Ok, S::Error> {
        let mut keys: Vec<&String> = index.iter().collect();
        keys.sort();
        let mut map = serializer.serialize_map(Some(keys.len()))?;
        for key in keys {
            map.serialize_entry(key, &true)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<FxHashSet<String>, D::Error> {
        let map = HashMap::<String, bool>::deserialize(deserializer)?;
        Ok(map.into_iter().filter(|(_, present)| *present).map(|(k, _)| k).collect())
    }
}
