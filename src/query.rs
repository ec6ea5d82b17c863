//! Read-only views over stored records: recent plays, personal bests and
//! title search.

use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use unicode_normalization::UnicodeNormalization;

use crate::models::{Difficulty, EnrichedRecord};

/// Most recent plays first. Records without a play time sort last; ties keep
/// store order.
pub fn recent(records: &[EnrichedRecord], limit: usize) -> Vec<&EnrichedRecord> {
    let mut sorted: Vec<&EnrichedRecord> = records.iter().collect();
    sorted.sort_by(|a, b| {
        let (a, b) = (&a.record.played_at, &b.record.played_at);
        match (a.is_empty(), b.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => b.cmp(a),
        }
    });
    sorted.truncate(limit);
    sorted
}

/// Best achievement per (title, difficulty), highest first.
pub fn best(records: &[EnrichedRecord], limit: usize) -> Vec<&EnrichedRecord> {
    let mut bests: FxHashMap<(&str, Difficulty), &EnrichedRecord> = FxHashMap::default();
    let mut order: Vec<(&str, Difficulty)> = Vec::new();

    for r in records {
        let Some(pct) = r.record.achievement() else {
            continue;
        };
        let key = (r.record.title.as_str(), r.record.difficulty);
        let better = match bests.get(&key) {
            Some(current) => current.record.achievement().unwrap_or(0.0) < pct,
            None => {
                order.push(key);
                true
            }
        };
        if better {
            bests.insert(key, r);
        }
    }

    let mut result: Vec<&EnrichedRecord> = order.iter().filter_map(|k| bests.get(k).copied()).collect();
    result.sort_by(|a, b| {
        let (a, b) = (a.record.achievement(), b.record.achievement());
        b.partial_cmp(&a).unwrap_or(Ordering::Equal)
    });
    result.truncate(limit);
    result
}

/// Fold for matching: NFKC (full-width to half-width and so on) plus
/// lowercase.
fn fold(s: &str) -> String {
    s.nfkc().collect::<String>().to_lowercase()
}

/// Records whose title contains `keyword`, in store order.
pub fn search<'a>(records: &'a [EnrichedRecord], keyword: &str) -> Vec<&'a EnrichedRecord> {
    let needle = fold(keyword.trim());
    if needle.is_empty() {
        return Vec::new();
    }
    records
        .iter()
        .filter(|r| fold(&r.record.title).contains(&needle))
        .collect()
}
