//! In-memory tabular dataset as materialized by the fetcher.

use super::cell::Cell;
use serde::{Deserialize, Serialize};

/// Rows of heterogeneous cells under named columns, in feed order.
///
/// Row order is meaningful: the aggregator keeps the last value seen per
/// group, so callers must not reorder rows between fetch and summarize.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDataset {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl RawDataset {
    /// Create an empty dataset with the given column names.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a dataset from columns and rows, checking every row's width.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, String> {
        let width = columns.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(format!(
                "row {i} has {} cells but the dataset has {width} columns",
                row.len()
            ));
        }
        Ok(Self { columns, rows })
    }

    /// Append a row. Panics if the row width does not match the column count.
    pub fn push_row(&mut self, row: Vec<Cell>) {
        assert_eq!(
            row.len(),
            self.columns.len(),
            "row width must match column count"
        );
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Iterate over one column's cells.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Cell> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Replace every cell of a column through `f`, stopping at the first error.
    pub fn map_column<F>(&mut self, name: &str, mut f: F) -> Result<(), String>
    where
        F: FnMut(&Cell) -> Result<Cell, String>,
    {
        let idx = self
            .column_index(name)
            .ok_or_else(|| format!("missing column '{name}'"))?;
        for (i, row) in self.rows.iter_mut().enumerate() {
            row[idx] = f(&row[idx]).map_err(|e| format!("column '{name}', row {i}: {e}"))?;
        }
        Ok(())
    }

    /// Keep only the rows for which `keep` returns true, preserving order.
    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[Cell]) -> bool,
    {
        self.rows.retain(|row| keep(row));
    }

    /// Move a column to the front, keeping the relative order of the others.
    pub fn move_to_front(&mut self, name: &str) -> Result<(), String> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| format!("missing column '{name}'"))?;
        let col = self.columns.remove(idx);
        self.columns.insert(0, col);
        for row in &mut self.rows {
            let cell = row.remove(idx);
            row.insert(0, cell);
        }
        Ok(())
    }

    /// Split into the column names and rows.
    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<Cell>>) {
        (self.columns, self.rows)
    }

    /// BLAKE3 fingerprint over the column names and every cell, in order.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for name in &self.columns {
            hasher.update(name.as_bytes());
            hasher.update(&[0]);
        }
        for row in &self.rows {
            for cell in row {
                cell.hash_into(&mut hasher);
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawDataset {
        RawDataset::from_rows(
            vec!["a".into(), "b".into(), "c".into()],
            vec![
                vec![Cell::Int(1), Cell::from("x"), Cell::Null],
                vec![Cell::Int(2), Cell::from("y"), Cell::Float(1.5)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn from_rows_rejects_ragged_rows() {
        let err = RawDataset::from_rows(vec!["a".into()], vec![vec![Cell::Null, Cell::Null]])
            .unwrap_err();
        assert!(err.contains("row 0"));
    }

    #[test]
    fn column_lookup_by_name() {
        let ds = sample();
        assert_eq!(ds.column_index("b"), Some(1));
        let b: Vec<_> = ds.column("b").unwrap().cloned().collect();
        assert_eq!(b, vec![Cell::from("x"), Cell::from("y")]);
        assert!(ds.column("zzz").is_none());
    }

    #[test]
    fn move_to_front_reorders_cells() {
        let mut ds = sample();
        ds.move_to_front("c").unwrap();
        assert_eq!(ds.columns(), &["c", "a", "b"]);
        assert_eq!(ds.rows()[1][0], Cell::Float(1.5));
        assert_eq!(ds.rows()[1][2], Cell::from("y"));
    }

    #[test]
    fn map_column_reports_row_of_failure() {
        let mut ds = sample();
        let err = ds
            .map_column("b", |c| c.to_f64().map(Cell::from_f64))
            .unwrap_err();
        assert!(err.contains("column 'b', row 0"), "{err}");
    }

    #[test]
    fn fingerprint_is_order_sensitive() {
        let ds = sample();
        let mut swapped = RawDataset::new(["a", "b", "c"]);
        swapped.push_row(ds.rows()[1].clone());
        swapped.push_row(ds.rows()[0].clone());
        assert_eq!(ds.fingerprint(), sample().fingerprint());
        assert_ne!(ds.fingerprint(), swapped.fingerprint());
    }
}
