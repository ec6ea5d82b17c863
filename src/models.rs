//! Core data models for play-log ingestion.
//!
//! Field names on the wire follow the store format written by earlier
//! tooling (`diff`, `rate`, `dxscore`, `_id`, `_fetchedAt`, ...), so existing
//! store files load without migration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// ============================================================================
// Difficulty
// ============================================================================

/// Chart difficulty, read from the `diff_<token>.png` icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Difficulty {
    Basic,
    Advanced,
    Expert,
    Master,
    ReMaster,
    Unknown,
}

impl Difficulty {
    /// Canonical display order used by statistics.
    pub const ORDER: [Difficulty; 6] = [
        Difficulty::Basic,
        Difficulty::Advanced,
        Difficulty::Expert,
        Difficulty::Master,
        Difficulty::ReMaster,
        Difficulty::Unknown,
    ];

    /// Map an icon filename token; unrecognized tokens are `Unknown`.
    pub fn from_icon_token(token: &str) -> Self {
        match token.to_ascii_lowercase().as_str() {
            "basic" => Difficulty::Basic,
            "advanced" => Difficulty::Advanced,
            "expert" => Difficulty::Expert,
            "master" => Difficulty::Master,
            "remaster" => Difficulty::ReMaster,
            _ => Difficulty::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Basic => "Basic",
            Difficulty::Advanced => "Advanced",
            Difficulty::Expert => "Expert",
            Difficulty::Master => "Master",
            Difficulty::ReMaster => "Re:Master",
            Difficulty::Unknown => "Unknown",
        }
    }

    /// Inverse of `as_str`; anything unrecognized is `Unknown`.
    pub fn from_display(s: &str) -> Self {
        Self::ORDER
            .into_iter()
            .find(|d| d.as_str() == s)
            .unwrap_or(Difficulty::Unknown)
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Unknown
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Difficulty {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Difficulty {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Difficulty::from_display(&s))
    }
}

// ============================================================================
// Letter grade
// ============================================================================

/// Score rank from the `playlog_scorerank` icon.
///
/// Tokens outside the fixed table are kept as `Other` with the token
/// uppercased, so a new rank icon upstream is not silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Rank {
    SssPlus,
    Sss,
    SsPlus,
    Ss,
    SPlus,
    S,
    Aaa,
    Aa,
    A,
    Bbb,
    Bb,
    B,
    C,
    D,
    Other(String),
}

impl Rank {
    /// Canonical display order, best first.
    pub const ORDER: [Rank; 14] = [
        Rank::SssPlus,
        Rank::Sss,
        Rank::SsPlus,
        Rank::Ss,
        Rank::SPlus,
        Rank::S,
        Rank::Aaa,
        Rank::Aa,
        Rank::A,
        Rank::Bbb,
        Rank::Bb,
        Rank::B,
        Rank::C,
        Rank::D,
    ];

    pub fn from_icon_token(token: &str) -> Self {
        match token.to_ascii_lowercase().as_str() {
            "sssp" => Rank::SssPlus,
            "sss" => Rank::Sss,
            "ssp" => Rank::SsPlus,
            "ss" => Rank::Ss,
            "sp" => Rank::SPlus,
            "s" => Rank::S,
            "aaa" => Rank::Aaa,
            "aa" => Rank::Aa,
            "a" => Rank::A,
            "bbb" => Rank::Bbb,
            "bb" => Rank::Bb,
            "b" => Rank::B,
            "c" => Rank::C,
            "d" => Rank::D,
            _ => Rank::Other(token.to_uppercase()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Rank::SssPlus => "SSS+",
            Rank::Sss => "SSS",
            Rank::SsPlus => "SS+",
            Rank::Ss => "SS",
            Rank::SPlus => "S+",
            Rank::S => "S",
            Rank::Aaa => "AAA",
            Rank::Aa => "AA",
            Rank::A => "A",
            Rank::Bbb => "BBB",
            Rank::Bb => "BB",
            Rank::B => "B",
            Rank::C => "C",
            Rank::D => "D",
            Rank::Other(s) => s,
        }
    }

    fn from_display(s: &str) -> Self {
        Self::ORDER
            .iter()
            .find(|r| r.as_str() == s)
            .cloned()
            .unwrap_or_else(|| Rank::Other(s.to_string()))
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialized as the display string, `""` when absent.
mod rank_field {
    use super::Rank;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(rank: &Option<Rank>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(rank.as_ref().map(Rank::as_str).unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Rank>, D::Error> {
        let s = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(if s.is_empty() { None } else { Some(Rank::from_display(&s)) })
    }
}

// ============================================================================
// Clear badges
// ============================================================================

/// Badge fields read `null`, `""` and labels this crate does not know as
/// absent, so one odd value never makes a whole store unreadable.
mod badge_field {
    use serde::de::{DeserializeOwned, IntoDeserializer};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer, T: Serialize>(badge: &Option<T>, serializer: S) -> Result<S::Ok, S::Error> {
        badge.serialize(serializer)
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let Some(label) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        let parsed = T::deserialize(IntoDeserializer::<serde::de::value::Error>::into_deserializer(
            label.as_str(),
        ));
        if parsed.is_err() && !label.is_empty() {
            tracing::debug!(label = %label, "Unrecognized badge label");
        }
        Ok(parsed.ok())
    }
}

/// Full-combo badge tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComboTag {
    #[serde(rename = "FC")]
    FullCombo,
    #[serde(rename = "FC+")]
    FullComboPlus,
    #[serde(rename = "AP")]
    AllPerfect,
    #[serde(rename = "AP+")]
    AllPerfectPlus,
}

impl ComboTag {
    /// Display order, highest tier first.
    pub const ORDER: [ComboTag; 4] = [
        ComboTag::AllPerfectPlus,
        ComboTag::AllPerfect,
        ComboTag::FullComboPlus,
        ComboTag::FullCombo,
    ];

    pub fn from_icon_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "fc" => Some(ComboTag::FullCombo),
            "fcp" => Some(ComboTag::FullComboPlus),
            "ap" => Some(ComboTag::AllPerfect),
            "app" => Some(ComboTag::AllPerfectPlus),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ComboTag::FullCombo => "FC",
            ComboTag::FullComboPlus => "FC+",
            ComboTag::AllPerfect => "AP",
            ComboTag::AllPerfectPlus => "AP+",
        }
    }
}

/// Full-sync badge tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncTag {
    #[serde(rename = "SYNC")]
    Sync,
    #[serde(rename = "FS")]
    FullSync,
    #[serde(rename = "FS+")]
    FullSyncPlus,
    #[serde(rename = "FDX")]
    FullSyncDx,
    #[serde(rename = "FDX+")]
    FullSyncDxPlus,
}

impl SyncTag {
    /// Display order, highest tier first.
    pub const ORDER: [SyncTag; 5] = [
        SyncTag::FullSyncDxPlus,
        SyncTag::FullSyncDx,
        SyncTag::FullSyncPlus,
        SyncTag::FullSync,
        SyncTag::Sync,
    ];

    pub fn from_icon_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "sync" => Some(SyncTag::Sync),
            "fs" => Some(SyncTag::FullSync),
            "fsp" => Some(SyncTag::FullSyncPlus),
            "fsd" => Some(SyncTag::FullSyncDx),
            "fsdp" => Some(SyncTag::FullSyncDxPlus),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SyncTag::Sync => "SYNC",
            SyncTag::FullSync => "FS",
            SyncTag::FullSyncPlus => "FS+",
            SyncTag::FullSyncDx => "FDX",
            SyncTag::FullSyncDxPlus => "FDX+",
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// One attempt at a song at a given difficulty, as scraped from the page.
///
/// Only `title` is guaranteed non-empty. String fields that could not be
/// read are empty, optional badges are `None`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayRecord {
    pub title: String,
    #[serde(rename = "diff", default)]
    pub difficulty: Difficulty,
    /// Achievement rate such as `"100.5000"`
    #[serde(default)]
    pub percentage: String,
    #[serde(rename = "rate", with = "rank_field", default)]
    pub rank: Option<Rank>,
    /// Play time as shown on the page, `YYYY/MM/DD HH:MM`
    #[serde(rename = "date", default)]
    pub played_at: String,
    #[serde(rename = "fc", with = "badge_field", default)]
    pub combo: Option<ComboTag>,
    #[serde(rename = "fs", with = "badge_field", default)]
    pub sync: Option<SyncTag>,
    #[serde(rename = "dxscore", default)]
    pub dx_score: String,
    #[serde(rename = "dxmax", default)]
    pub dx_score_max: String,
    #[serde(rename = "trackId", default)]
    pub track_id: String,
    #[serde(rename = "isDx", default)]
    pub is_dx: bool,
    #[serde(rename = "isNewRecord", default)]
    pub is_new_record: bool,
}

impl PlayRecord {
    /// Achievement as a number; `None` when empty or unparseable.
    pub fn achievement(&self) -> Option<f64> {
        self.percentage.parse().ok()
    }
}

/// A stored record: the scraped fields plus identity and ingestion time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub record: PlayRecord,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_fetchedAt", with = "timestamp")]
    pub fetched_at: DateTime<Utc>,
}

// ============================================================================
// Timestamps
// ============================================================================

/// Written as RFC 3339 with millisecond precision and a `Z` suffix.
///
/// Read leniently: any RFC 3339 value, or a naive ISO-8601 value such as
/// `2024-01-01T10:00:00.123456`, taken as local time. Stores written by the
/// earlier capture scripts use the naive form.
pub mod timestamp {
    use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    pub fn format(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn parse(s: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        let naive = NaiveDateTime::parse_from_str(s, NAIVE_FORMAT).ok()?;
        let local = Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc));
        Some(local.unwrap_or_else(|| Utc.from_utc_datetime(&naive)))
    }

    fn parse_or_err<E: serde::de::Error>(s: &str) -> Result<DateTime<Utc>, E> {
        parse(s).ok_or_else(|| E::custom(format!("invalid timestamp: {}", s)))
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_or_err(&s)
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            ts: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match ts {
                Some(ts) => serializer.serialize_str(&super::format(ts)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|s| super::parse_or_err(&s))
                .transpose()
        }
    }
}
