//! Record reader for `$`-delimited FAERS extracts
//!
//! Fields are split raw: no quoting, no escapes, no null inference. The
//! first non-blank line is the header. Lines wider than the header are
//! skipped with a warning; narrower lines are padded with missing cells.

use crate::config::{ConvertConfig, TextEncoding};
use crate::error::Result;
use crate::processor::table::{Cell, Table};

use csv::{ByteRecord, Reader, ReaderBuilder};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Lazy, forward-only sequence of row chunks
///
/// Never yields an empty chunk; an input with a header and no data rows
/// yields nothing.
pub struct ChunkReader {
    path: PathBuf,
    reader: Reader<File>,
    record: ByteRecord,
    columns: Vec<String>,
    encoding: TextEncoding,
    chunk_rows: usize,
    skipped_lines: usize,
    rows_read: usize,
    finished: bool,
}

impl ChunkReader {
    /// Open `path` and consume its header line
    pub fn open(path: &Path, config: &ConvertConfig) -> Result<Self> {
        Self::with_chunk_rows(path, config, config.chunk_rows)
    }

    pub fn with_chunk_rows(path: &Path, config: &ConvertConfig, chunk_rows: usize) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .delimiter(config.delimiter_byte())
            .quoting(false)
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;

        let mut record = ByteRecord::new();
        let mut columns = Vec::new();
        let mut finished = true;
        while reader.read_byte_record(&mut record)? {
            if is_blank(&record) {
                continue;
            }
            columns = header_names(&record, config.encoding);
            finished = false;
            break;
        }

        debug!(
            "Opened {} with {} columns (chunk_rows={})",
            path.display(),
            columns.len(),
            chunk_rows
        );

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            record,
            columns,
            encoding: config.encoding,
            chunk_rows: chunk_rows.max(1),
            skipped_lines: 0,
            rows_read: 0,
            finished,
        })
    }

    /// Header columns, after blank/duplicate name normalisation
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Malformed lines skipped so far
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    /// Data rows yielded so far
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    fn next_chunk(&mut self) -> Result<Option<Table>> {
        let mut chunk = Table::new(self.columns.clone());
        let width = self.columns.len();

        while chunk.rows.len() < self.chunk_rows {
            if !self.reader.read_byte_record(&mut self.record)? {
                self.finished = true;
                break;
            }
            if is_blank(&self.record) {
                continue;
            }
            if self.record.len() > width {
                self.skipped_lines += 1;
                let line = self.record.position().map(|p| p.line()).unwrap_or(0);
                warn!(
                    "Skipping malformed line {} in {}: expected {} fields, saw {}",
                    line,
                    self.path.display(),
                    width,
                    self.record.len()
                );
                continue;
            }

            let mut row: Vec<Cell> = self
                .record
                .iter()
                .map(|field| Some(self.encoding.decode(field)))
                .collect();
            row.resize(width, None);
            chunk.rows.push(row);
        }

        self.rows_read += chunk.rows.len();
        Ok((!chunk.is_empty()).then_some(chunk))
    }
}

impl Iterator for ChunkReader {
    type Item = Result<Table>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Read the whole file into one table
pub fn read_full(path: &Path, config: &ConvertConfig) -> Result<Table> {
    let mut reader = ChunkReader::with_chunk_rows(path, config, usize::MAX)?;
    let mut table = Table::new(reader.columns().to_vec());

    for chunk in &mut reader {
        table.rows.extend(chunk?.rows);
    }

    if reader.skipped_lines() > 0 {
        warn!(
            "Skipped {} malformed lines in {}",
            reader.skipped_lines(),
            path.display()
        );
    }
    Ok(table)
}

fn is_blank(record: &ByteRecord) -> bool {
    record.is_empty() || (record.len() == 1 && record[0].is_empty())
}

/// Decode header names; blanks become `Unnamed: {i}`, repeats get `.{n}`
fn header_names(record: &ByteRecord, encoding: TextEncoding) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();

    record
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let mut name = encoding.decode(raw);
            if name.is_empty() {
                name = format!("Unnamed: {}", i);
            }
            let count = seen.entry(name.clone()).or_insert(0);
            let unique = if *count == 0 {
                name.clone()
            } else {
                format!("{}.{}", name, count)
            };
            *count += 1;
            unique
        })
        .collect()
}
