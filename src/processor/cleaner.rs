//! Row cleaning applied to full tables and chunks alike
//!
//! Order matters: empty columns are dropped first, then missing cells are
//! filled, then every cell is trimmed.

use crate::config::ConvertConfig;
use crate::processor::table::{Cell, Table};

/// Column cleanup driven by the run configuration
#[derive(Debug, Clone, Copy)]
pub struct RowCleaner {
    pub drop_empty_columns: bool,
    pub fill_missing: bool,
    pub strip_whitespace: bool,
}

impl RowCleaner {
    pub fn from_config(config: &ConvertConfig) -> Self {
        Self {
            drop_empty_columns: config.drop_empty_columns,
            fill_missing: config.fill_missing,
            strip_whitespace: config.strip_whitespace,
        }
    }

    /// A missing cell, or one that is blank once whitespace handling applies
    pub fn is_empty_cell(&self, cell: &Cell) -> bool {
        match cell {
            None => true,
            Some(value) if self.strip_whitespace => value.trim().is_empty(),
            Some(value) => value.is_empty(),
        }
    }

    /// Clean a table, judging column emptiness from its own rows
    pub fn clean(&self, table: Table) -> Table {
        let mut profile = ColumnProfile::new(table.column_count());
        profile.observe(&table, self);
        self.clean_with_profile(table, &profile)
    }

    /// Clean a table, judging column emptiness from a wider profile
    pub fn clean_with_profile(&self, mut table: Table, profile: &ColumnProfile) -> Table {
        if self.drop_empty_columns {
            table.retain_columns(&profile.keep_mask());
        }

        if self.fill_missing || self.strip_whitespace {
            for cell in table.rows.iter_mut().flatten() {
                if self.fill_missing && cell.is_none() {
                    *cell = Some(String::new());
                }
                if self.strip_whitespace {
                    if let Some(value) = cell {
                        let trimmed = value.trim();
                        if trimmed.len() != value.len() {
                            *value = trimmed.to_string();
                        }
                    }
                }
            }
        }

        table
    }
}

/// Which columns hold at least one non-empty cell across observed rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnProfile {
    non_empty: Vec<bool>,
    rows: usize,
}

impl ColumnProfile {
    pub fn new(width: usize) -> Self {
        Self {
            non_empty: vec![false; width],
            rows: 0,
        }
    }

    /// Fold another table (or chunk) of the same width into the profile
    pub fn observe(&mut self, table: &Table, cleaner: &RowCleaner) {
        self.rows += table.row_count();
        for row in &table.rows {
            for (seen, cell) in self.non_empty.iter_mut().zip(row) {
                if !*seen && !cleaner.is_empty_cell(cell) {
                    *seen = true;
                }
            }
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Columns to keep; with zero rows observed every column is kept
    pub fn keep_mask(&self) -> Vec<bool> {
        if self.rows == 0 {
            vec![true; self.non_empty.len()]
        } else {
            self.non_empty.clone()
        }
    }

    /// Apply the keep mask to a header
    pub fn kept_columns(&self, columns: &[String]) -> Vec<String> {
        columns
            .iter()
            .zip(self.keep_mask())
            .filter_map(|(c, keep)| keep.then(|| c.clone()))
            .collect()
    }
}
