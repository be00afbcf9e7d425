use serde::{Deserialize, Serialize};

use crate::error::{McdsError, Result};

/// One named column of a [`Table`] with its unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub unit: String,
    pub values: Vec<f64>,
}

/// A column-oriented table of `f64` values. Every column has the same
/// length; column order is insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    /// An empty table that will hold `rows` rows per column.
    pub fn with_rows(rows: usize) -> Self {
        Table { columns: Vec::new(), rows }
    }

    /// Number of rows (agents, voxels).
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in table order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.iter().find(|c| c.name == name).map(|c| c.values.as_slice())
    }

    /// Like [`Table::column`], but a missing column is an error.
    pub fn require(&self, name: &str) -> Result<&[f64]> {
        self.column(name).ok_or_else(|| McdsError::MissingColumn(name.to_string()))
    }

    pub fn unit(&self, name: &str) -> Option<&str> {
        self.columns.iter().find(|c| c.name == name).map(|c| c.unit.as_str())
    }

    /// Appends a column, replacing any column of the same name in place.
    pub fn push_column(&mut self, name: impl Into<String>, unit: impl Into<String>, values: Vec<f64>) -> Result<()> {
        if values.len() != self.rows {
            return Err(McdsError::ShapeMismatch {
                what: "table column length",
                expected: self.rows,
                found: values.len(),
            });
        }
        let column = Column { name: name.into(), unit: unit.into(), values };
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    /// Rows where `mask` is true, in their original order.
    pub fn filter(&self, mask: &[bool]) -> Table {
        let keep: Vec<usize> = (0..self.rows).filter(|&r| mask.get(r).copied().unwrap_or(false)).collect();
        Table {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    unit: c.unit.clone(),
                    values: keep.iter().map(|&r| c.values[r]).collect(),
                })
                .collect(),
            rows: keep.len(),
        }
    }

    /// Reorders the columns by name, keeping any column named `first` in front.
    pub fn sort_columns(&mut self, first: &str) {
        self.columns.sort_by(|a, b| (a.name != first, &a.name).cmp(&(b.name != first, &b.name)));
    }

    /// Values of row `r` in column order.
    pub fn row(&self, r: usize) -> Option<Vec<f64>> {
        (r < self.rows).then(|| self.columns.iter().map(|c| c.values[r]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut t = Table::with_rows(3);
        t.push_column("ID", "none", vec![0.0, 1.0, 2.0]).unwrap();
        t.push_column("volume", "micron^3", vec![10.0, 20.0, 30.0]).unwrap();
        t
    }

    #[test]
    fn columns_keep_insertion_order_and_units() {
        let t = sample();
        assert_eq!(t.column_names().collect::<Vec<_>>(), vec!["ID", "volume"]);
        assert_eq!(t.unit("volume"), Some("micron^3"));
        assert_eq!(t.column("volume"), Some(&[10.0, 20.0, 30.0][..]));
        assert_eq!(t.row(1), Some(vec![1.0, 20.0]));
        assert_eq!(t.row(3), None);
    }

    #[test]
    fn wrong_length_column_is_rejected() {
        let mut t = sample();
        assert!(t.push_column("short", "none", vec![1.0]).is_err());
        assert!(matches!(t.require("missing"), Err(McdsError::MissingColumn(_))));
    }

    #[test]
    fn filter_and_sort() {
        let mut t = sample();
        t.push_column("age", "min", vec![5.0, 6.0, 7.0]).unwrap();
        t.sort_columns("ID");
        assert_eq!(t.column_names().collect::<Vec<_>>(), vec!["ID", "age", "volume"]);

        let picked = t.filter(&[true, false, true]);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked.column("ID"), Some(&[0.0, 2.0][..]));
        assert_eq!(picked.column("age"), Some(&[5.0, 7.0][..]));
    }
}
