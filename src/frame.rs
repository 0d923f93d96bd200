//! In-memory tabular representation shared by every pipeline stage.
//!
//! A [`Frame`] keeps ordered column metadata plus row-major cells where a
//! missing value is `None`. Stages add and drop columns but never
//! reorder rows; the final column order is applied once through
//! [`Frame::project`].

use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use encoding_rs::Encoding;

use crate::{
    data::{Value, parse_typed_value},
    io_utils,
    schema::{ColumnMeta, ColumnType, infer_column_types},
};

pub type Row = Vec<Option<Value>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Row>,
}

impl Frame {
    pub fn new(columns: Vec<ColumnMeta>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a frame from decoded CSV cells, inferring one type per column.
    pub fn from_strings(headers: Vec<String>, raw_rows: Vec<Vec<String>>) -> Result<Self> {
        let columns = infer_column_types(&headers, &raw_rows);
        let mut rows = Vec::with_capacity(raw_rows.len());
        for (row_idx, raw) in raw_rows.into_iter().enumerate() {
            let mut row = Vec::with_capacity(columns.len());
            for (col_idx, column) in columns.iter().enumerate() {
                let cell = raw.get(col_idx).map(|s| s.as_str()).unwrap_or("");
                let value = parse_typed_value(cell, &column.data_type).with_context(|| {
                    format!("Row {} column '{}'", row_idx + 2, column.name)
                })?;
                row.push(value);
            }
            rows.push(row);
        }
        Ok(Self { columns, rows })
    }

    pub fn read_csv(path: &Path, encoding: &'static Encoding) -> Result<Self> {
        let (headers, rows) = io_utils::read_all(path, encoding)?;
        Self::from_strings(headers, rows).with_context(|| format!("Loading {path:?}"))
    }

    pub fn write_csv(&self, path: &Path, with_bom: bool) -> Result<()> {
        let mut writer = io_utils::open_csv_writer(path, with_bom)?;
        writer
            .write_record(self.headers())
            .context("Writing headers")?;
        for row in &self.rows {
            writer
                .write_record(
                    row.iter()
                        .map(|cell| cell.as_ref().map(Value::as_display).unwrap_or_default()),
                )
                .context("Writing row")?;
        }
        writer.flush().with_context(|| format!("Flushing {path:?}"))?;
        Ok(())
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| anyhow!("Column '{name}' not found"))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.column_index(name).map(|idx| self.columns[idx].data_type)
    }

    pub fn get(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column)).and_then(|c| c.as_ref())
    }

    pub fn values<'a>(&'a self, column: usize) -> impl Iterator<Item = Option<&'a Value>> + 'a {
        self.rows.iter().map(move |row| row.get(column).and_then(|c| c.as_ref()))
    }

    /// Appends a column; `values` must hold one entry per row.
    pub fn push_column(&mut self, meta: ColumnMeta, values: Vec<Option<Value>>) -> Result<()> {
        if self.has_column(&meta.name) {
            bail!("Column '{}' already exists", meta.name);
        }
        if values.len() != self.rows.len() {
            bail!(
                "Column '{}' has {} value(s) for {} row(s)",
                meta.name,
                values.len(),
                self.rows.len()
            );
        }
        self.columns.push(meta);
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }

    /// Replaces every cell of an existing column through `f`.
    pub fn map_column<F>(&mut self, name: &str, mut f: F) -> Result<()>
    where
        F: FnMut(Option<Value>) -> Option<Value>,
    {
        let idx = self.require_column(name)?;
        for row in &mut self.rows {
            let current = row[idx].take();
            row[idx] = f(current);
        }
        Ok(())
    }

    pub fn set_column_type(&mut self, name: &str, data_type: ColumnType) -> Result<()> {
        let idx = self.require_column(name)?;
        self.columns[idx].data_type = data_type;
        Ok(())
    }

    /// Removes the named columns when present and returns how many were dropped.
    pub fn drop_columns<S: AsRef<str>>(&mut self, names: &[S]) -> usize {
        let mut keep = vec![true; self.columns.len()];
        let mut dropped = 0usize;
        for name in names {
            if let Some(idx) = self.column_index(name.as_ref())
                && keep[idx]
            {
                keep[idx] = false;
                dropped += 1;
            }
        }
        if dropped == 0 {
            return 0;
        }
        self.retain_columns(&keep);
        dropped
    }

    fn retain_columns(&mut self, keep: &[bool]) {
        let mut flags = keep.iter();
        self.columns.retain(|_| *flags.next().unwrap_or(&true));
        for row in &mut self.rows {
            let mut flags = keep.iter();
            row.retain(|_| *flags.next().unwrap_or(&true));
        }
    }

    /// Returns a new frame holding only `order`, in that order.
    pub fn project<S: AsRef<str>>(&self, order: &[S]) -> Result<Frame> {
        let indices = order
            .iter()
            .map(|name| self.require_column(name.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let columns = indices.iter().map(|idx| self.columns[*idx].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|idx| row[*idx].clone()).collect())
            .collect();
        Ok(Frame { columns, rows })
    }

    /// Counts missing cells per column, in column order.
    pub fn null_counts(&self) -> Vec<(String, usize)> {
        self.columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let nulls = self.rows.iter().filter(|row| row[idx].is_none()).count();
                (column.name.clone(), nulls)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Frame {
        Frame::from_strings(
            vec!["periodo".into(), "depto".into(), "punt_global".into()],
            vec![
                vec!["20242".into(), "ANTIOQUIA".into(), "310".into()],
                vec!["20242".into(), "".into(), "250".into()],
            ],
        )
        .expect("frame")
    }

    #[test]
    fn from_strings_types_cells_and_keeps_nulls() {
        let frame = sample();
        assert_eq!(frame.shape(), (2, 3));
        assert_eq!(frame.column_type("periodo"), Some(ColumnType::Integer));
        assert_eq!(frame.get(0, 2), Some(&Value::Integer(310)));
        assert_eq!(frame.get(1, 1), None);
    }

    #[test]
    fn drop_and_project_preserve_rows() {
        let mut frame = sample();
        assert_eq!(frame.drop_columns(&["depto", "missing"]), 1);
        let projected = frame.project(&["punt_global", "periodo"]).expect("project");
        assert_eq!(projected.headers(), vec!["punt_global", "periodo"]);
        assert_eq!(projected.rows[1][0], Some(Value::Integer(250)));
    }

    #[test]
    fn push_column_rejects_wrong_length() {
        let mut frame = sample();
        let err = frame
            .push_column(ColumnMeta::new("extra", ColumnType::Integer), vec![None])
            .unwrap_err();
        assert!(err.to_string().contains("1 value(s) for 2 row(s)"));
    }

    #[test]
    fn null_counts_reports_every_column() {
        let counts = sample().null_counts();
        assert_eq!(counts[1], ("depto".to_string(), 1));
        assert_eq!(counts[0].1, 0);
    }
}
