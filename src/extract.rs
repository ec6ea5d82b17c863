//! Record extraction from the play history page.
//!
//! The page is treated as a versionless, schema-less document: it is cut
//! into entry blocks on a recurring container tag, and each field is then
//! pulled out of its block by an independent pattern. Every field extractor
//! returns `Option` and must fail soft. The only hard requirement for a
//! record is its title.

use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ExtractorConfig;
use crate::markup;
use crate::models::{ComboTag, Difficulty, PlayRecord, Rank, SyncTag};

/// Filenames containing this are layout placeholders, not badges.
pub const PLACEHOLDER_MARKER: &str = "dummy";

// ============================================================================
// Field Patterns
// ============================================================================

static DIFFICULTY_ICON: Lazy<Regex> = Lazy::new(|| Regex::new(r"diff_(\w+)\.png").unwrap());

static PLAY_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<span class="v_b">(\d{4}/\d{2}/\d{2} \d{2}:\d{2})</span>"#).unwrap()
});

/// Title text sits between the clear-state icon and the end of its container.
static TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)clear\.png"[^>]*/>(.*?)</div>"#).unwrap());

static ACHIEVEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"playlog_achievement_txt[^>]*>(\d+)<span[^>]*>\.(\d+)%</span>").unwrap()
});

static SCORE_RANK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"playlog/(\w+)\.png[^>]*class="playlog_scorerank""#).unwrap()
});

static DX_SCORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"white p_r_5 f_15 f_r">([\d,]+)\s*/\s*([\d,]+)</div>"#).unwrap()
});

static COMBO_ICON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"playlog/((?:fc|ap)\w*)\.png").unwrap());

static SYNC_ICON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"playlog/((?:fs|sync)\w*)\.png").unwrap());

static TRACK_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"name="idx" value="([^"]+)""#).unwrap());

const DX_CHART_ICON: &str = "music_dx.png";
const NEW_RECORD_ICON: &str = "newrecord.png";

// ============================================================================
// Field Extractors
// ============================================================================

fn capture<'a>(re: &Regex, block: &'a str) -> Option<&'a str> {
    re.captures(block).and_then(|c| c.get(1)).map(|m| m.as_str())
}

pub fn extract_title(block: &str) -> Option<String> {
    let raw = capture(&TITLE, block)?;
    let title = markup::inner_text(raw);
    (!title.trim().is_empty()).then_some(title)
}

pub fn extract_difficulty(block: &str) -> Option<Difficulty> {
    capture(&DIFFICULTY_ICON, block).map(Difficulty::from_icon_token)
}

pub fn extract_play_date(block: &str) -> Option<String> {
    capture(&PLAY_DATE, block).map(str::to_string)
}

pub fn extract_achievement(block: &str) -> Option<String> {
    let caps = ACHIEVEMENT.captures(block)?;
    Some(format!("{}.{}", &caps[1], &caps[2]))
}

pub fn extract_rank(block: &str) -> Option<Rank> {
    capture(&SCORE_RANK, block).map(Rank::from_icon_token)
}

/// `(current, max)` with thousands separators removed.
pub fn extract_dx_score(block: &str) -> Option<(String, String)> {
    let caps = DX_SCORE.captures(block)?;
    Some((caps[1].replace(',', ""), caps[2].replace(',', "")))
}

/// Badge token from an icon filename, `None` for placeholder icons.
fn badge_token<'a>(re: &Regex, block: &'a str) -> Option<&'a str> {
    let token = capture(re, block)?;
    if token.contains(PLACEHOLDER_MARKER) {
        return None;
    }
    Some(token)
}

pub fn extract_combo(block: &str) -> Option<ComboTag> {
    let token = badge_token(&COMBO_ICON, block)?;
    let tag = ComboTag::from_icon_token(token);
    if tag.is_none() {
        debug!(token, "Unrecognized combo icon");
    }
    tag
}

pub fn extract_sync(block: &str) -> Option<SyncTag> {
    let token = badge_token(&SYNC_ICON, block)?;
    let tag = SyncTag::from_icon_token(token);
    if tag.is_none() {
        debug!(token, "Unrecognized sync icon");
    }
    tag
}

pub fn extract_track_id(block: &str) -> Option<String> {
    capture(&TRACK_ID, block).map(str::to_string)
}

// ============================================================================
// Block Parsing
// ============================================================================

/// Why a block produced no record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("no title found")]
    MissingTitle,

    #[error("block is {len} bytes, limit is {limit}")]
    Oversized { len: usize, limit: usize },
}

/// Build a record from one entry block. Every field except the title falls
/// back to its empty value.
pub fn parse_block(block: &str) -> Result<PlayRecord, BlockError> {
    let title = extract_title(block).ok_or(BlockError::MissingTitle)?;
    let (dx_score, dx_score_max) = extract_dx_score(block).unwrap_or_default();

    Ok(PlayRecord {
        title,
        difficulty: extract_difficulty(block).unwrap_or_default(),
        percentage: extract_achievement(block).unwrap_or_default(),
        rank: extract_rank(block),
        played_at: extract_play_date(block).unwrap_or_default(),
        combo: extract_combo(block),
        sync: extract_sync(block),
        dx_score,
        dx_score_max,
        track_id: extract_track_id(block).unwrap_or_default(),
        is_dx: block.contains(DX_CHART_ICON),
        is_new_record: block.contains(NEW_RECORD_ICON),
    })
}

// ============================================================================
// Extractor
// ============================================================================

/// Result of one extraction pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Records in page order
    pub records: Vec<PlayRecord>,
    /// Blocks dropped for lack of a title
    pub untitled: usize,
    /// Blocks dropped for any other reason
    pub failed: usize,
}

impl Extraction {
    pub fn blocks_seen(&self) -> usize {
        self.records.len() + self.untitled + self.failed
    }
}

#[derive(Debug, Clone, Default)]
pub struct Extractor {
    config: ExtractorConfig,
}

impl Extractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Cut the page into entry blocks.
    ///
    /// A block runs from just after its marker to the next marker, or to the
    /// first trailer that still has the footer after it. With no trailer the
    /// last block runs to the end of the input.
    pub fn split_blocks<'a>(&self, markup: &'a str) -> Vec<&'a str> {
        let marker = self.config.block_marker.as_str();
        if marker.is_empty() {
            return Vec::new();
        }

        let starts: Vec<usize> = markup
            .match_indices(marker)
            .map(|(i, _)| i + marker.len())
            .collect();
        if starts.is_empty() {
            return Vec::new();
        }

        let footer_at = if self.config.footer_marker.is_empty() {
            Some(markup.len())
        } else {
            markup.rfind(self.config.footer_marker.as_str())
        };
        let trailers: Vec<usize> = match (footer_at, self.config.trailer_marker.as_str()) {
            (Some(limit), trailer) if !trailer.is_empty() => markup
                .match_indices(trailer)
                .map(|(i, _)| i)
                .take_while(|&i| i < limit)
                .collect(),
            _ => Vec::new(),
        };

        starts
            .iter()
            .enumerate()
            .map(|(n, &start)| {
                let next_marker = starts
                    .get(n + 1)
                    .map(|&s| s - marker.len())
                    .unwrap_or(markup.len());
                let trailer = trailers
                    .iter()
                    .copied()
                    .find(|&t| t >= start)
                    .unwrap_or(markup.len());
                &markup[start..next_marker.min(trailer)]
            })
            .collect()
    }

    fn parse_checked(&self, block: &str) -> Result<PlayRecord, BlockError> {
        if block.len() > self.config.max_block_len {
            return Err(BlockError::Oversized {
                len: block.len(),
                limit: self.config.max_block_len,
            });
        }
        parse_block(block)
    }

    /// Extract every titled record, in page order.
    pub fn extract(&self, markup: &str) -> Extraction {
        let blocks = self.split_blocks(markup);

        let results: Vec<Result<PlayRecord, BlockError>> = if self.config.parallel {
            blocks.par_iter().map(|b| self.parse_checked(b)).collect()
        } else {
            blocks.iter().map(|b| self.parse_checked(b)).collect()
        };

        let mut extraction = Extraction::default();
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(record) => extraction.records.push(record),
                Err(BlockError::MissingTitle) => {
                    debug!(block = index, "Skipping entry without title");
                    extraction.untitled += 1;
                }
                Err(e) => {
                    warn!(block = index, error = %e, "Skipping malformed entry");
                    extraction.failed += 1;
                }
            }
        }

        debug!(
            blocks = blocks.len(),
            records = extraction.records.len(),
            "Extraction finished"
        );
        extraction
    }
}

/// Extract with default markers.
pub fn extract(markup: &str) -> Vec<PlayRecord> {
    Extractor::default().extract(markup).records
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const IMG: &str = "https://maimaidx-eng.com/maimai-mobile/img";

    fn block(title: Option<&str>, diff: &str, fc: &str, fs: &str, idx: &str) -> String {
        let title_div = match title {
            Some(t) => format!(
                r#"<div class="basic_block m_5 p_5 p_l_10 f_13 break"><img src="{IMG}/playlog/clear.png" class="w_80"/>{t}</div>"#
            ),
            None => r#"<div class="basic_block m_5 p_5 p_l_10 f_13 break"></div>"#.to_string(),
        };
        format!(
            r#"<div class="p_10 t_l f_0 v_b">
  <div class="playlog_top_container p_r">
    <img src="{IMG}/diff_{diff}.png" class="playlog_diff v_b"/>
    <div class="sub_title t_c f_r f_11"><span class="red f_b v_b">TRACK 01</span><span class="v_b">2024/01/01 10:00</span></div>
  </div>
  <div class="playlog_{diff}_container">
    {title_div}
    <div class="p_r f_0">
      <img src="{IMG}/music_dx.png" class="playlog_music_kind_icon"/>
      <img src="{IMG}/playlog/newrecord.png" class="playlog_achievement_newrecord"/>
      <div class="playlog_achievement_txt t_r">100<span class="f_20">.5000%</span></div>
      <img src="{IMG}/playlog/sssp.png?ver=1.40" class="playlog_scorerank"/>
      <div class="playlog_score_block p_r f_0"><div class="white p_r_5 f_15 f_r">2,345 / 2,400</div></div>
      <div class="playlog_result_innerblock">
        <img src="{IMG}/playlog/{fc}.png"/>
        <img src="{IMG}/playlog/{fs}.png"/>
      </div>
    </div>
    <form action="/record/playlogDetail/"><input type="hidden" name="idx" value="{idx}"/></form>
  </div>
</div>
"#
        )
    }

    fn page(blocks: &[String]) -> String {
        format!(
            "<html><body><div class=\"main_wrapper\">{}<div class=\"f_0\"><a href=\"/home\">back</a></div></div><footer>(c)</footer></body></html>",
            blocks.concat()
        )
    }

    #[test]
    fn test_empty_markup() {
        assert!(extract("").is_empty());
        assert!(extract("<html><body>no plays</body></html>").is_empty());
    }

    #[test]
    fn test_full_block() {
        let html = page(&[block(Some("Song A"), "master", "app", "fsdp", "1001")]);
        let records = extract(&html);
        assert_eq!(records.len(), 1);

        let r = &records[0];
        assert_eq!(r.title, "Song A");
        assert_eq!(r.difficulty, Difficulty::Master);
        assert_eq!(r.played_at, "2024/01/01 10:00");
        assert_eq!(r.percentage, "100.5000");
        assert_eq!(r.rank, Some(Rank::SssPlus));
        assert_eq!(r.dx_score, "2345");
        assert_eq!(r.dx_score_max, "2400");
        assert_eq!(r.combo, Some(ComboTag::AllPerfectPlus));
        assert_eq!(r.sync, Some(SyncTag::FullSyncDxPlus));
        assert_eq!(r.track_id, "1001");
        assert!(r.is_dx);
        assert!(r.is_new_record);
    }

    #[test]
    fn test_untitled_block_is_dropped() {
        let html = page(&[
            block(Some("First"), "basic", "fc", "fs", "1"),
            block(None, "expert", "fc", "fs", "2"),
            block(Some("Third"), "remaster", "fc", "fs", "3"),
        ]);
        let extraction = Extractor::default().extract(&html);
        let titles: Vec<_> = extraction.records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Third"]);
        assert_eq!(extraction.untitled, 1);
        assert_eq!(extraction.failed, 0);
        assert_eq!(extraction.blocks_seen(), 3);
    }

    #[test]
    fn test_placeholder_badges_are_absent() {
        let html = page(&[block(Some("Song"), "expert", "fc_dummy", "sync_dummy", "7")]);
        let records = extract(&html);
        assert_eq!(records[0].combo, None);
        assert_eq!(records[0].sync, None);
    }

    #[test]
    fn test_badge_tiers() {
        let cases = [
            ("fc", "sync", Some(ComboTag::FullCombo), Some(SyncTag::Sync)),
            ("fcp", "fs", Some(ComboTag::FullComboPlus), Some(SyncTag::FullSync)),
            ("ap", "fsp", Some(ComboTag::AllPerfect), Some(SyncTag::FullSyncPlus)),
            ("app", "fsd", Some(ComboTag::AllPerfectPlus), Some(SyncTag::FullSyncDx)),
        ];
        for (fc, fs, combo, sync) in cases {
            let html = page(&[block(Some("Song"), "master", fc, fs, "1")]);
            let r = &extract(&html)[0];
            assert_eq!(r.combo, combo, "combo icon {}", fc);
            assert_eq!(r.sync, sync, "sync icon {}", fs);
        }
    }

    #[test]
    fn test_missing_fields_degrade() {
        let html = page(&[format!(
            r#"<div class="p_10 t_l f_0 v_b"><div><img src="{IMG}/playlog/clear.png"/>Bare</div></div>"#
        )]);
        let records = extract(&html);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.title, "Bare");
        assert_eq!(r.difficulty, Difficulty::Unknown);
        assert_eq!(r.percentage, "");
        assert_eq!(r.rank, None);
        assert_eq!(r.played_at, "");
        assert_eq!(r.dx_score, "");
        assert_eq!(r.track_id, "");
        assert!(!r.is_dx);
        assert!(!r.is_new_record);
    }

    #[test]
    fn test_title_entities_decoded() {
        let html = page(&[block(
            Some("Don&#039;t Stop &amp; <span>Go</span>"),
            "master",
            "fc",
            "fs",
            "",
        )]);
        assert_eq!(extract(&html)[0].title, "Don't Stop & Go");
    }

    #[test]
    fn test_title_keeps_inner_whitespace() {
        let html = page(&[block(Some("Song  A\n  Remix &hellip;"), "master", "fc", "fs", "")]);
        assert_eq!(extract(&html)[0].title, "Song  A\n  Remix \u{2026}");
    }

    #[test]
    fn test_blank_title_is_dropped() {
        let html = page(&[block(Some("&nbsp;"), "master", "fc", "fs", "1")]);
        let extraction = Extractor::default().extract(&html);
        assert!(extraction.records.is_empty());
        assert_eq!(extraction.untitled, 1);
    }

    #[test]
    fn test_order_preserved() {
        let blocks: Vec<String> = (0..20)
            .map(|i| block(Some(&format!("Song {}", i)), "expert", "fc", "fs", &i.to_string()))
            .collect();
        let html = page(&blocks);

        let sequential = Extractor::default().extract(&html);
        let parallel = Extractor::new(ExtractorConfig {
            parallel: true,
            ..Default::default()
        })
        .extract(&html);

        assert_eq!(sequential.records.len(), 20);
        assert_eq!(sequential, parallel);
        assert_eq!(sequential.records[0].title, "Song 0");
        assert_eq!(sequential.records[19].title, "Song 19");
    }

    #[test]
    fn test_trailer_ends_last_block() {
        let html = page(&[block(Some("Last"), "master", "fc", "fs", "1")]);
        let extractor = Extractor::default();
        let blocks = extractor.split_blocks(&html);
        assert_eq!(blocks.len(), 1);
        assert!(!blocks[0].contains("back"));
        assert!(!blocks[0].contains("footer"));
    }

    #[test]
    fn test_last_block_without_trailer_runs_to_end() {
        let html = block(Some("Cut off"), "basic", "fc", "fs", "9");
        let records = extract(&html);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].track_id, "9");
    }

    #[test]
    fn test_oversized_block_fails() {
        let extractor = Extractor::new(ExtractorConfig {
            max_block_len: 100,
            ..Default::default()
        });
        let html = page(&[block(Some("Big"), "master", "fc", "fs", "1")]);
        let extraction = extractor.extract(&html);
        assert!(extraction.records.is_empty());
        assert_eq!(extraction.failed, 1);
    }

    #[test]
    fn test_parse_block_missing_title() {
        assert_eq!(
            parse_block("<div>diff_master.png</div>"),
            Err(BlockError::MissingTitle)
        );
        let whitespace_only = r#"<img src="x/clear.png"/>   <b> </b></div>"#;
        assert_eq!(parse_block(whitespace_only), Err(BlockError::MissingTitle));
    }
}
