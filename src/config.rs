//! Runtime configuration.
//!
//! Values resolve in this order:
//! 1. Command-line flag (applied by the binary)
//! 2. TOML config file given with `--config`
//! 3. Compiled defaults
//!
//! The resolved `Config` is passed explicitly to the extractor and the store
//! manager; nothing here is global.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Opening tag of every play entry on the history page.
pub const DEFAULT_BLOCK_MARKER: &str = r#"<div class="p_10 t_l f_0 v_b">"#;

/// Container that follows the last entry, before the page footer.
pub const DEFAULT_TRAILER_MARKER: &str = r#"<div class="f_0">"#;

pub const DEFAULT_FOOTER_MARKER: &str = "</footer>";

/// A single entry is a few kilobytes; anything far larger means a
/// terminator was missed.
pub const DEFAULT_MAX_BLOCK_LEN: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub block_marker: String,
    pub trailer_marker: String,
    pub footer_marker: String,
    pub max_block_len: usize,
    /// Extract blocks on the rayon pool; output order is unchanged.
    pub parallel: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            block_marker: DEFAULT_BLOCK_MARKER.to_string(),
            trailer_marker: DEFAULT_TRAILER_MARKER.to_string(),
            footer_marker: DEFAULT_FOOTER_MARKER.to_string(),
            max_block_len: DEFAULT_MAX_BLOCK_LEN,
            parallel: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Persisted record store (JSON)
    pub store_path: PathBuf,
    /// Directory for JSON/CSV exports
    pub export_dir: PathBuf,
    pub extractor: ExtractorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("data").join("play_history_db.json"),
            export_dir: PathBuf::from("exports"),
            extractor: ExtractorConfig::default(),
        }
    }
}

impl Config {
    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Load from `path` when given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.store_path, PathBuf::from("data/play_history_db.json"));
        assert_eq!(config.extractor.block_marker, DEFAULT_BLOCK_MARKER);
        assert!(!config.extractor.parallel);
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml_str(
            r#"
            store_path = "/var/lib/playlog/store.json"

            [extractor]
            parallel = true
            "#,
        )
        .unwrap();
        assert_eq!(config.store_path, PathBuf::from("/var/lib/playlog/store.json"));
        assert_eq!(config.export_dir, PathBuf::from("exports"));
        assert!(config.extractor.parallel);
        assert_eq!(config.extractor.max_block_len, DEFAULT_MAX_BLOCK_LEN);
    }

    #[test]
    fn test_invalid_toml() {
        let result = Config::from_toml_str("store_path = [");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load(Some(Path::new("/nonexistent/playlog.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
