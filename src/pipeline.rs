//! One ingest call: load the store, extract records from a page, merge,
//! summarize and save.
//!
//! The store file is not locked. Callers must run at most one ingest at a
//! time per store file.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::Config;
use crate::extract::Extractor;
use crate::models::EnrichedRecord;
use crate::stats::{summarize, Stats};
use crate::store::Store;
use crate::Result;

#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Records extracted from the page
    pub parsed: usize,
    /// Entry blocks dropped for lack of a title
    pub untitled: usize,
    /// Entry blocks dropped as malformed
    pub failed: usize,
    /// Newly stored records, in page order
    pub added: Vec<EnrichedRecord>,
    /// Records already present in the store
    pub duplicates: usize,
    /// Store size after the merge
    pub total_records: usize,
    pub total_fetches: u64,
    pub stats: Stats,
}

pub struct Ingestor {
    extractor: Extractor,
    store_path: PathBuf,
}

impl Ingestor {
    pub fn new(config: &Config) -> Self {
        Self {
            extractor: Extractor::new(config.extractor.clone()),
            store_path: config.store_path.clone(),
        }
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Run the full pipeline over one page. Only a failure to persist the
    /// store is an error; a page with nothing usable still counts as an
    /// ingest call and is saved.
    pub fn ingest(&self, markup: &str) -> Result<IngestReport> {
        let mut store = Store::load(&self.store_path);

        let extraction = self.extractor.extract(markup);
        let parsed = extraction.records.len();
        if extraction.untitled + extraction.failed > 0 {
            info!(
                untitled = extraction.untitled,
                failed = extraction.failed,
                "Dropped entry blocks"
            );
        }

        let outcome = store.merge(extraction.records);
        let stats = summarize(&store);
        store.save(&self.store_path)?;

        info!(
            parsed,
            added = outcome.added.len(),
            duplicates = outcome.duplicates,
            total = store.len(),
            "Ingest complete"
        );

        Ok(IngestReport {
            parsed,
            untitled: extraction.untitled,
            failed: extraction.failed,
            added: outcome.added,
            duplicates: outcome.duplicates,
            total_records: store.len(),
            total_fetches: store.total_fetches,
            stats,
        })
    }
}
