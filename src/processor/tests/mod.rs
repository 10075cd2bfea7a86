//! Scenario tests for the batch converter
//!
//! Each scenario builds a small extract tree in a temp dir and runs the
//! whole discover → dispatch → report path over it.

pub mod chunking;

use crate::config::ConvertConfig;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Write `{root}/in/{year}/{quarter}/ascii/{name}` and return its path
pub fn write_extract_file(
    temp_dir: &TempDir,
    year: &str,
    quarter: &str,
    name: &str,
    content: &[u8],
) -> PathBuf {
    let path = temp_dir
        .path()
        .join("in")
        .join(year)
        .join(quarter)
        .join("ascii")
        .join(name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

/// Config rooted in the temp dir, with instant retries
pub fn test_config(temp_dir: &TempDir) -> ConvertConfig {
    ConvertConfig::new(temp_dir.path().join("in"), temp_dir.path().join("out"))
        .with_log_root(temp_dir.path().join("logs"))
        .with_backoff_base_secs(0.0)
        .with_workers(2)
}

/// Every `.tmp` file left anywhere below `dir`
pub fn leftover_temp_files(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return found;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            found.extend(leftover_temp_files(&path));
        } else if path.extension().is_some_and(|e| e == "tmp") {
            found.push(path);
        }
    }
    found
}
