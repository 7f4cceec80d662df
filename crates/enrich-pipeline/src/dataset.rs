//! In-memory working dataset.
//!
//! A [`Dataset`] is an ordered list of column names plus rows of string
//! cells. Every row always has exactly one cell per column; missing values
//! are empty strings. It is owned by the orchestrator and serialized as the
//! checkpoint state.

use serde::{Deserialize, Serialize};

/// Ordered columns and rows of string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DatasetRepr")]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

#[derive(Deserialize)]
struct DatasetRepr {
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Vec<String>>,
}

impl From<DatasetRepr> for Dataset {
    fn from(repr: DatasetRepr) -> Self {
        let mut dataset = Self::new(repr.columns);
        for row in repr.rows {
            dataset.push_row(row);
        }
        dataset
    }
}

impl Dataset {
    /// Create an empty dataset with the given columns.
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Column names in order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the dataset has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Append a row, padding or truncating it to the column count.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.columns.len(), String::new());
        self.rows.push(row);
    }

    /// Index of `name`, if present.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Whether `name` is a column.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Index of `name`, appending an empty column if it does not exist yet.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(index) = self.column_index(name) {
            return index;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
        self.columns.len() - 1
    }

    /// Remove the named columns that exist; returns the ones removed.
    pub fn drop_columns(&mut self, names: &[String]) -> Vec<String> {
        let doomed: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| names.contains(c))
            .map(|(i, _)| i)
            .collect();
        if doomed.is_empty() {
            return Vec::new();
        }

        let removed = doomed.iter().map(|&i| self.columns[i].clone()).collect();
        let keep = |i: &usize| !doomed.contains(i);
        self.columns = retain_indexed(std::mem::take(&mut self.columns), keep);
        for row in &mut self.rows {
            *row = retain_indexed(std::mem::take(row), keep);
        }
        removed
    }

    /// Cell at `row`/`column`.
    #[must_use]
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column).map(String::as_str)
    }

    /// Cell at `row` in the column called `name`.
    #[must_use]
    pub fn cell_by_name(&self, row: usize, name: &str) -> Option<&str> {
        self.cell(row, self.column_index(name)?)
    }

    /// Overwrite a cell. Out-of-range positions are ignored.
    pub fn set_cell(&mut self, row: usize, column: usize, value: impl Into<String>) {
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(column)) {
            *cell = value.into();
        }
    }

    /// Keep only the rows for which `keep` returns true.
    pub fn retain_rows(&mut self, mut keep: impl FnMut(&[String]) -> bool) {
        self.rows.retain(|row| keep(row));
    }
}

fn retain_indexed<T>(items: Vec<T>, keep: impl Fn(&usize) -> bool) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter(|(i, _)| keep(i))
        .map(|(_, item)| item)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        let mut ds = Dataset::new(vec!["Name".into(), "Work Email".into(), "LinkedIn".into()]);
        ds.push_row(vec!["Ada".into(), "ada@corp.com".into(), "li/ada".into()]);
        ds.push_row(vec!["Bob".into()]);
        ds
    }

    #[test]
    fn test_rows_are_padded() {
        let ds = sample();
        assert_eq!(ds.cell_by_name(1, "LinkedIn"), Some(""));
        assert_eq!(ds.len(), 2);
    }

    #[test]
    fn test_drop_columns() {
        let mut ds = sample();
        let removed = ds.drop_columns(&["Work Email".to_string(), "Missing".to_string()]);
        assert_eq!(removed, vec!["Work Email".to_string()]);
        assert_eq!(ds.columns(), &["Name".to_string(), "LinkedIn".to_string()]);
        assert_eq!(ds.cell(0, 1), Some("li/ada"));
    }

    #[test]
    fn test_ensure_column_is_idempotent() {
        let mut ds = sample();
        let idx = ds.ensure_column("Status");
        assert_eq!(ds.ensure_column("Status"), idx);
        ds.set_cell(1, idx, "ok");
        assert_eq!(ds.cell_by_name(1, "Status"), Some("ok"));
        assert_eq!(ds.cell_by_name(0, "Status"), Some(""));
    }

    #[test]
    fn test_deserialize_normalizes_rows() {
        let ds: Dataset =
            serde_json::from_str(r#"{"columns": ["a", "b"], "rows": [["1"], ["1", "2", "3"]]}"#)
                .expect("parse dataset");
        assert!(ds.rows().all(|r| r.len() == 2));
    }

    #[test]
    fn test_retain_rows() {
        let mut ds = sample();
        ds.retain_rows(|row| !row[1].is_empty());
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.cell(0, 0), Some("Ada"));
    }
}
