//! Distribution summaries over stored records.
//!
//! Always recomputed from the full record list; nothing here is updated
//! incrementally. Frequency tables keep a fixed display order and leave out
//! empty buckets.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::Path;

use crate::models::{ComboTag, Difficulty, EnrichedRecord, Rank, SyncTag};
use crate::store::Store;

/// Ordered `(label, count)` pairs, serialized as a JSON object in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Distribution(pub Vec<(String, usize)>);

impl Distribution {
    pub fn get(&self, label: &str) -> Option<usize> {
        self.0.iter().find(|(l, _)| l == label).map(|(_, n)| *n)
    }

    pub fn labels(&self) -> Vec<&str> {
        self.0.iter().map(|(l, _)| l.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Distribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, count) in &self.0 {
            map.serialize_entry(label, count)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AchievementSummary {
    pub average: f64,
    pub max: f64,
    pub min: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DateRange {
    pub earliest: String,
    pub latest: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total: usize,
    pub dx_charts: usize,
    pub new_records: usize,
    pub full_combos: usize,
    pub full_syncs: usize,
    pub difficulties: Distribution,
    pub ratings: Distribution,
    pub combo_tiers: Distribution,
    pub sync_tiers: Distribution,
    /// Over records with a parseable, non-zero achievement
    pub achievement: Option<AchievementSummary>,
    /// Over records with a play timestamp
    pub date_range: Option<DateRange>,
}

impl Stats {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &Path) -> crate::Result<()> {
        let json = self.to_json_pretty()?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Summarize every record in the store.
pub fn summarize(store: &Store) -> Stats {
    summarize_records(&store.records)
}

pub fn summarize_records<'a>(records: impl IntoIterator<Item = &'a EnrichedRecord>) -> Stats {
    let mut stats = Stats::default();

    let mut difficulties: BTreeMap<Difficulty, usize> = BTreeMap::new();
    let mut ratings: Vec<(Rank, usize)> = Vec::new();
    let mut combos: Vec<(ComboTag, usize)> = Vec::new();
    let mut syncs: Vec<(SyncTag, usize)> = Vec::new();
    let mut achievements: Vec<f64> = Vec::new();
    let mut dates: Vec<&str> = Vec::new();

    for r in records.into_iter().map(|e| &e.record) {
        stats.total += 1;
        if r.is_dx {
            stats.dx_charts += 1;
        }
        if r.is_new_record {
            stats.new_records += 1;
        }
        if let Some(tag) = r.combo {
            stats.full_combos += 1;
            bump(&mut combos, tag);
        }
        if let Some(tag) = r.sync {
            stats.full_syncs += 1;
            bump(&mut syncs, tag);
        }
        *difficulties.entry(r.difficulty).or_insert(0) += 1;
        if let Some(rank) = &r.rank {
            bump(&mut ratings, rank.clone());
        }
        if let Some(pct) = r.achievement().filter(|p| *p > 0.0) {
            achievements.push(pct);
        }
        if !r.played_at.is_empty() {
            dates.push(&r.played_at);
        }
    }

    stats.difficulties = Distribution(
        Difficulty::ORDER
            .iter()
            .filter_map(|d| difficulties.get(d).map(|&n| (d.to_string(), n)))
            .collect(),
    );
    stats.ratings = ordered_ranks(ratings);
    stats.combo_tiers = ordered(&ComboTag::ORDER, &combos, |t| t.as_str());
    stats.sync_tiers = ordered(&SyncTag::ORDER, &syncs, |t| t.as_str());

    if !achievements.is_empty() {
        let sum: f64 = achievements.iter().sum();
        stats.achievement = Some(AchievementSummary {
            average: round2(sum / achievements.len() as f64),
            max: achievements.iter().cloned().fold(f64::MIN, f64::max),
            min: achievements.iter().cloned().fold(f64::MAX, f64::min),
        });
    }

    // "YYYY/MM/DD HH:MM" sorts chronologically as text
    if let (Some(earliest), Some(latest)) = (dates.iter().min(), dates.iter().max()) {
        stats.date_range = Some(DateRange {
            earliest: earliest.to_string(),
            latest: latest.to_string(),
        });
    }

    stats
}

fn bump<T: PartialEq>(counts: &mut Vec<(T, usize)>, key: T) {
    match counts.iter_mut().find(|(k, _)| *k == key) {
        Some((_, n)) => *n += 1,
        None => counts.push((key, 1)),
    }
}

fn ordered<T: PartialEq>(order: &[T], counts: &[(T, usize)], label: impl Fn(&T) -> &str) -> Distribution {
    Distribution(
        order
            .iter()
            .filter_map(|key| {
                counts
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(k, n)| (label(k).to_string(), *n))
            })
            .collect(),
    )
}

/// Known ranks in canonical order, then unmapped ones alphabetically.
fn ordered_ranks(counts: Vec<(Rank, usize)>) -> Distribution {
    let mut dist = ordered(&Rank::ORDER, &counts, |r| r.as_str());
    let mut others: Vec<(String, usize)> = counts
        .into_iter()
        .filter_map(|(rank, n)| match rank {
            Rank::Other(label) => Some((label, n)),
            _ => None,
        })
        .collect();
    others.sort();
    dist.0.extend(others);
    dist
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
