//! In-memory tabular data shared by the reader, cleaner and writer.

/// A cell is `None` when the source line was shorter than the header
pub type Cell = Option<String>;

/// Named columns plus rows of cells; every row has `columns.len()` cells
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keep only the columns whose flag in `keep` is set
    pub fn retain_columns(&mut self, keep: &[bool]) {
        if keep.iter().all(|k| *k) {
            return;
        }
        self.columns = select(std::mem::take(&mut self.columns), keep);
        for row in &mut self.rows {
            *row = select(std::mem::take(row), keep);
        }
    }

    /// Project onto `target` columns by name; absent columns become `""`
    pub fn align_to(self, target: &[String]) -> Table {
        let positions: Vec<Option<usize>> = target
            .iter()
            .map(|name| self.columns.iter().position(|c| c == name))
            .collect();

        let rows = self
            .rows
            .into_iter()
            .map(|mut row| {
                positions
                    .iter()
                    .map(|pos| match pos {
                        Some(i) => row[*i].take().or_else(|| Some(String::new())),
                        None => Some(String::new()),
                    })
                    .collect()
            })
            .collect();

        Table {
            columns: target.to_vec(),
            rows,
        }
    }
}

fn select<T>(items: Vec<T>, keep: &[bool]) -> Vec<T> {
    items
        .into_iter()
        .zip(keep.iter())
        .filter_map(|(item, k)| k.then_some(item))
        .collect()
}
