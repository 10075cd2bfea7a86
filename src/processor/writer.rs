//! Atomic CSV writer
//!
//! Output goes to a `{stem}.csv.*.tmp` sibling and is renamed onto the
//! final path only by [`AtomicCsvWriter::finish`]. Dropping the writer
//! before that removes the temp file, so the final path never holds a
//! partial file.

use crate::error::Result;
use crate::processor::table::Table;

use csv::{Writer, WriterBuilder};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Mode given to finished outputs; temp files start out as 0600
#[cfg(unix)]
const OUTPUT_FILE_MODE: u32 = 0o644;

/// Rows and columns written to a finished output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub rows: usize,
    pub cols: usize,
}

/// Write-to-temp-then-rename CSV writer
///
/// The first table written fixes the column set; later tables with a
/// different column set are aligned onto it by name.
pub struct AtomicCsvWriter {
    final_path: PathBuf,
    temp_path: PathBuf,
    writer: Writer<NamedTempFile>,
    columns: Option<Vec<String>>,
    rows: usize,
    chunks: usize,
}

impl AtomicCsvWriter {
    /// Create the output directory and a temp file beside `final_path`
    pub fn create(final_path: &Path) -> Result<Self> {
        let dir = match final_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let file_name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "output.csv".to_string());
        let temp = tempfile::Builder::new()
            .prefix(&format!("{}.", file_name))
            .suffix(".tmp")
            .tempfile_in(&dir)?;
        let temp_path = temp.path().to_path_buf();

        debug!("Writing {} via {}", final_path.display(), temp_path.display());

        Ok(Self {
            final_path: final_path.to_path_buf(),
            temp_path,
            writer: WriterBuilder::new().from_writer(temp),
            columns: None,
            rows: 0,
            chunks: 0,
        })
    }

    /// Path of the temp file currently being written
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn has_header(&self) -> bool {
        self.columns.is_some()
    }

    /// Append a table; the first one also writes the header row
    pub fn write_table(&mut self, table: Table) -> Result<()> {
        self.chunks += 1;
        let table = match &self.columns {
            None => {
                self.write_header(&table.columns)?;
                table
            }
            Some(expected) if *expected != table.columns => {
                warn!(
                    "Chunk column mismatch: expected={}, got={} -> align by name",
                    expected.len(),
                    table.column_count()
                );
                table.align_to(expected)
            }
            Some(_) => table,
        };

        for row in &table.rows {
            self.writer
                .write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
        }
        self.rows += table.row_count();
        Ok(())
    }

    /// Write `columns` as the header if nothing has been written yet
    pub fn ensure_header(&mut self, columns: &[String]) -> Result<()> {
        if self.columns.is_none() {
            self.write_header(columns)?;
        }
        Ok(())
    }

    fn write_header(&mut self, columns: &[String]) -> Result<()> {
        // An empty record cannot be represented in CSV; leave the file empty
        if !columns.is_empty() {
            self.writer.write_record(columns)?;
        }
        self.columns = Some(columns.to_vec());
        Ok(())
    }

    /// Flush, sync and atomically move the temp file onto the final path
    pub fn finish(self) -> Result<WriteStats> {
        let temp = self.writer.into_inner().map_err(|e| e.into_error())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(OUTPUT_FILE_MODE))?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.final_path).map_err(|e| e.error)?;

        let stats = WriteStats {
            rows: self.rows,
            cols: self.columns.map(|c| c.len()).unwrap_or(0),
        };
        debug!(
            "Persisted {} ({} rows, {} cols, {} tables)",
            self.final_path.display(),
            stats.rows,
            stats.cols,
            self.chunks
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| Some(c.to_string())).collect())
                .collect(),
        }
    }

    fn tmp_files(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().is_some_and(|e| e == "tmp"))
            .collect()
    }

    #[test]
    fn test_write_full_table() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("2020").join("Q1").join("DEMO20Q1.csv");

        let mut writer = AtomicCsvWriter::create(&out).unwrap();
        assert!(writer.temp_path().to_string_lossy().ends_with(".tmp"));
        assert!(!out.exists());

        writer
            .write_table(table(&["id", "name"], &[&["1", "a,b"], &["2", "café"]]))
            .unwrap();
        let stats = writer.finish().unwrap();

        assert_eq!(stats, WriteStats { rows: 2, cols: 2 });
        assert_eq!(
            fs::read_to_string(&out).unwrap(),
            "id,name\n1,\"a,b\"\n2,café\n"
        );
        assert!(tmp_files(out.parent().unwrap()).is_empty());
    }

    #[test]
    fn test_chunks_append_without_header_and_realign() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("DRUG20Q1.csv");

        let mut writer = AtomicCsvWriter::create(&out).unwrap();
        writer
            .write_table(table(&["a", "b", "c"], &[&["1", "2", "3"]]))
            .unwrap();
        writer.write_table(table(&["a", "c"], &[&["4", "6"]])).unwrap();
        writer
            .write_table(table(&["a", "b", "c", "d"], &[&["7", "8", "9", "x"]]))
            .unwrap();
        let stats = writer.finish().unwrap();

        assert_eq!(stats, WriteStats { rows: 3, cols: 3 });
        assert_eq!(
            fs::read_to_string(&out).unwrap(),
            "a,b,c\n1,2,3\n4,,6\n7,8,9\n"
        );
    }

    #[test]
    fn test_header_only_output() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("OUTC20Q1.csv");

        let mut writer = AtomicCsvWriter::create(&out).unwrap();
        writer
            .ensure_header(&["primaryid".to_string(), "outc_cod".to_string()])
            .unwrap();
        let stats = writer.finish().unwrap();

        assert_eq!(stats, WriteStats { rows: 0, cols: 2 });
        assert_eq!(fs::read_to_string(&out).unwrap(), "primaryid,outc_cod\n");
    }

    #[test]
    fn test_dropped_writer_leaves_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("REAC20Q1.csv");

        {
            let mut writer = AtomicCsvWriter::create(&out).unwrap();
            writer.write_table(table(&["a"], &[&["1"]])).unwrap();
            assert!(writer.temp_path().exists());
        }

        assert!(!out.exists());
        assert!(tmp_files(temp_dir.path()).is_empty());
    }

    #[test]
    fn test_finish_replaces_existing_output() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("STAT20Q1.csv");
        fs::write(&out, "stale\n").unwrap();

        let mut writer = AtomicCsvWriter::create(&out).unwrap();
        writer.write_table(table(&["a"], &[&["fresh"]])).unwrap();
        writer.finish().unwrap();

        assert_eq!(fs::read_to_string(&out).unwrap(), "a\nfresh\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_output_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("INDI20Q1.csv");

        let mut writer = AtomicCsvWriter::create(&out).unwrap();
        writer.write_table(table(&["a"], &[&["1"]])).unwrap();
        writer.finish().unwrap();

        let mode = fs::metadata(&out).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }
}
