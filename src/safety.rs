//! Safety checks to keep exports from clobbering the record store.
//!
//! The store is the only copy of the play history; an export pointed at it
//! by mistake would replace every record with a flat dump.

use std::path::{Path, PathBuf};

use crate::{Error, Result};

fn resolved(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Validates that an export path is safe to write.
///
/// Checks:
/// - Output must carry the expected extension (e.g. "csv", "json")
/// - Output cannot be the store file or the store's temp file
pub fn validate_export_path(output: &Path, extension: &str, store_path: &Path) -> Result<()> {
    let unsafe_output = |reason: String| Error::UnsafeOutput {
        path: output.to_path_buf(),
        reason,
    };

    let ext = output.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !ext.eq_ignore_ascii_case(extension) {
        return Err(unsafe_output(format!("expected a .{} file", extension)));
    }

    let output_resolved = resolved(output);
    let mut store_tmp = store_path.as_os_str().to_os_string();
    store_tmp.push(".tmp");
    for protected in [store_path.to_path_buf(), PathBuf::from(store_tmp)] {
        if output == protected || output_resolved == resolved(&protected) {
            return Err(unsafe_output(format!(
                "cannot overwrite the record store {}",
                protected.display()
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_export() {
        let output = PathBuf::from("/tmp/exports/maimai_records.csv");
        let store = PathBuf::from("/data/play_history_db.json");
        assert!(validate_export_path(&output, "csv", &store).is_ok());
    }

    #[test]
    fn test_wrong_extension() {
        let output = PathBuf::from("/tmp/exports/records.txt");
        let store = PathBuf::from("/data/play_history_db.json");
        let result = validate_export_path(&output, "csv", &store);
        assert!(result.unwrap_err().to_string().contains("expected a .csv file"));
    }

    #[test]
    fn test_output_equals_store() {
        let path = PathBuf::from("/data/play_history_db.json");
        let result = validate_export_path(&path, "json", &path);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("cannot overwrite the record store"));
    }

    #[test]
    fn test_output_equals_store_temp() {
        let store = PathBuf::from("/data/play_history_db.json");
        let output = PathBuf::from("/data/play_history_db.json.tmp");
        assert!(validate_export_path(&output, "tmp", &store).is_err());
    }
}
