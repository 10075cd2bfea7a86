//! Task discovery for FAERS quarterly extracts
//!
//! Walks the unpacked extract tree and turns every allow-listed table file
//! into a conversion [`Task`].

use crate::config::ConvertConfig;
use crate::constants::{ASCII_DIR_NAME, OUTPUT_EXTENSION, QUARTERS};
use crate::error::{Error, Result};
use crate::models::Task;

use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::fs;
use tracing::{debug, info};

static YEAR_DIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}$").expect("year pattern is valid"));

/// `(year, quarter, stem)` identity of a task
pub type TaskKey = (String, String, String);

/// Discovery component for FAERS extract trees
#[derive(Debug)]
pub struct TaskDiscovery<'a> {
    config: &'a ConvertConfig,
    only: Option<HashSet<TaskKey>>,
    year_count: usize,
}

impl<'a> TaskDiscovery<'a> {
    pub fn new(config: &'a ConvertConfig) -> Self {
        Self {
            config,
            only: None,
            year_count: 0,
        }
    }

    /// Restrict discovery to the given task keys (e.g. a previous failed list)
    pub fn with_only(mut self, keys: HashSet<TaskKey>) -> Self {
        self.only = Some(keys);
        self
    }

    /// Number of year directories seen by the last discovery
    pub fn year_count(&self) -> usize {
        self.year_count
    }

    /// Discover all conversion tasks
    ///
    /// Extracts follow this structure:
    /// ```text
    /// input_root/
    ///   2020/
    ///     Q1/
    ///       ascii/
    ///         DEMO20Q1.txt
    ///         DRUG20Q1.txt
    ///     Q2/
    ///       ascii/
    ///         ...
    /// ```
    pub async fn discover_tasks(&mut self) -> Result<Vec<Task>> {
        let input_root = &self.config.input_root;
        if !is_dir(input_root).await {
            return Err(Error::InputRootNotFound {
                path: input_root.clone(),
            });
        }

        let years = list_year_dirs(input_root).await?;
        self.year_count = years.len();

        let mut tasks = Vec::new();
        for year in &years {
            for quarter in QUARTERS {
                let ascii_dir = input_root.join(year).join(quarter).join(ASCII_DIR_NAME);
                if !is_dir(&ascii_dir).await {
                    continue;
                }

                for input_path in self.list_data_files(&ascii_dir).await? {
                    if let Some(task) = self.build_task(year, quarter, input_path) {
                        tasks.push(task);
                    }
                }
            }
        }

        let preview: Vec<_> = years.iter().take(5).collect();
        info!(
            "Discovered years: {} -> {:?}{}",
            years.len(),
            preview,
            if years.len() > 5 { "..." } else { "" }
        );
        info!("Discovered tasks: {}", tasks.len());

        Ok(tasks)
    }

    /// Data files in one `ascii` directory, sorted by name
    async fn list_data_files(&self, ascii_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut dir = fs::read_dir(ascii_dir).await?;

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if self.is_data_file(&path) && is_file(&path).await {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    fn is_data_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                self.config
                    .data_extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
    }

    fn build_task(&self, year: &str, quarter: &str, input_path: PathBuf) -> Option<Task> {
        let stem = input_path.file_stem()?.to_string_lossy().to_string();

        if !self.config.is_allowed_table(&stem) {
            debug!("Skipping non-allow-listed table: {}", input_path.display());
            return None;
        }

        if let Some(only) = &self.only {
            let key = (year.to_string(), quarter.to_string(), stem.clone());
            if !only.contains(&key) {
                return None;
            }
        }

        let output_path = self
            .config
            .output_root
            .join(year)
            .join(quarter)
            .join(format!("{}.{}", stem, OUTPUT_EXTENSION));

        Some(Task {
            year: year.to_string(),
            quarter: quarter.to_string(),
            stem,
            input_path,
            output_path,
        })
    }
}

// `fs::metadata` follows symlinks; a dangling link counts as absent
async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

/// Four-digit year directories under the root, sorted
async fn list_year_dirs(input_root: &Path) -> Result<Vec<String>> {
    let mut years = Vec::new();
    let mut dir = fs::read_dir(input_root).await?;

    while let Some(entry) = dir.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if YEAR_DIR.is_match(&name) && is_dir(&entry.path()).await {
            years.push(name);
        }
    }

    years.sort();
    Ok(years)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "primaryid$caseid$\n1$2$\n").unwrap();
    }

    /// Helper to create a small extract tree
    fn create_test_tree(temp_dir: &TempDir) -> ConvertConfig {
        let input = temp_dir.path().join("UNZIP_DATA");
        let output = temp_dir.path().join("CSV_DATA");

        touch(&input.join("2020/Q1/ascii/DEMO20Q1.txt"));
        touch(&input.join("2020/Q1/ascii/DRUG20Q1.TXT"));
        touch(&input.join("2020/Q1/ascii/XXXX20Q1.txt"));
        touch(&input.join("2020/Q1/ascii/ASC_NTS.pdf"));
        touch(&input.join("2020/Q2/ascii/reac20q2.txt"));
        touch(&input.join("2019/Q4/ascii/THER19Q4.txt"));

        // Ignored: not a year, no ascii dir, bad quarter name
        touch(&input.join("misc/Q1/ascii/DEMO00Q1.txt"));
        touch(&input.join("2021/Q1/DEMO21Q1.txt"));
        touch(&input.join("2021/Q5/ascii/DEMO21Q5.txt"));

        ConvertConfig::new(input, output)
    }

    #[tokio::test]
    async fn test_discover_tasks() {
        let temp_dir = TempDir::new().unwrap();
        let config = create_test_tree(&temp_dir);

        let mut discovery = TaskDiscovery::new(&config);
        let tasks = discovery.discover_tasks().await.unwrap();

        let stems: Vec<_> = tasks.iter().map(|t| t.stem.as_str()).collect();
        assert_eq!(stems, vec!["THER19Q4", "DEMO20Q1", "DRUG20Q1", "reac20q2"]);
        assert_eq!(discovery.year_count(), 3);

        let demo = &tasks[1];
        assert_eq!(demo.year, "2020");
        assert_eq!(demo.quarter, "Q1");
        assert_eq!(
            demo.output_path,
            config.output_root.join("2020").join("Q1").join("DEMO20Q1.csv")
        );
    }

    #[tokio::test]
    async fn test_missing_input_root_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConvertConfig::new(
            temp_dir.path().join("nonexistent"),
            temp_dir.path().join("out"),
        );

        let result = TaskDiscovery::new(&config).discover_tasks().await;
        match result.unwrap_err() {
            Error::InputRootNotFound { path } => assert!(path.ends_with("nonexistent")),
            other => panic!("Expected InputRootNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_root_yields_no_tasks() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConvertConfig::new(temp_dir.path().to_path_buf(), temp_dir.path().join("o"));

        let tasks = TaskDiscovery::new(&config).discover_tasks().await.unwrap();
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_only_filter() {
        let temp_dir = TempDir::new().unwrap();
        let config = create_test_tree(&temp_dir);

        let only = HashSet::from([(
            "2020".to_string(),
            "Q1".to_string(),
            "DRUG20Q1".to_string(),
        )]);
        let tasks = TaskDiscovery::new(&config)
            .with_only(only)
            .discover_tasks()
            .await
            .unwrap();

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].stem, "DRUG20Q1");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_files_and_years_are_followed() {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in");
        let elsewhere = temp_dir.path().join("elsewhere");

        let real_file = elsewhere.join("demo.txt");
        touch(&real_file);
        fs::create_dir_all(input.join("2020/Q1/ascii")).unwrap();
        symlink(&real_file, input.join("2020/Q1/ascii/DEMO20Q1.txt")).unwrap();
        symlink(
            elsewhere.join("missing.txt"),
            input.join("2020/Q1/ascii/DRUG20Q1.txt"),
        )
        .unwrap();

        let real_year = elsewhere.join("year");
        touch(&real_year.join("Q2/ascii/REAC21Q2.txt"));
        symlink(&real_year, input.join("2021")).unwrap();

        let config = ConvertConfig::new(input, temp_dir.path().join("out"));
        let mut discovery = TaskDiscovery::new(&config);
        let tasks = discovery.discover_tasks().await.unwrap();

        let stems: Vec<_> = tasks.iter().map(|t| t.stem.as_str()).collect();
        assert_eq!(stems, vec!["DEMO20Q1", "REAC21Q2"]);
        assert_eq!(discovery.year_count(), 2);
    }
}
