//! Post-join null handling: the foreign-residence zero fill, final column
//! types, and the per-column null report.

use anyhow::{Context, Result};
use log::{info, warn};

use crate::{
    aliases::AliasCatalog,
    data::{Value, coerce_value},
    fields,
    frame::Frame,
    schema::ColumnType,
    table::TextTable,
};

/// Zero-fills population and indicator columns for rows whose residence
/// department is the foreign sentinel. Returns the number of rows touched.
pub fn zero_fill_foreign(frame: &mut Frame, catalog: &AliasCatalog) -> Result<usize> {
    let department = frame.require_column(fields::RESIDENCE_DEPARTMENT)?;
    let integer_targets: Vec<usize> = fields::POPULATION_COLUMNS
        .iter()
        .filter_map(|name| frame.column_index(name))
        .collect();
    let float_targets: Vec<usize> = fields::INDICATOR_COLUMNS
        .iter()
        .filter_map(|name| frame.column_index(name))
        .collect();

    let mut filled = 0usize;
    for row in &mut frame.rows {
        let is_foreign = row[department]
            .as_ref()
            .is_some_and(|value| catalog.is_foreign(&value.as_display()));
        if !is_foreign {
            continue;
        }
        for idx in &integer_targets {
            row[*idx] = Some(Value::Integer(0));
        }
        for idx in &float_targets {
            row[*idx] = Some(Value::Float(0.0));
        }
        filled += 1;
    }
    info!(
        "Zero-filled {filled} row(s) residing in '{}'",
        catalog.foreign_sentinel
    );
    Ok(filled)
}

/// Population columns become nullable integers, indicators floats.
pub fn coerce_types(frame: &mut Frame) -> Result<()> {
    let targets = fields::POPULATION_COLUMNS
        .iter()
        .map(|name| (*name, ColumnType::Integer))
        .chain(
            fields::INDICATOR_COLUMNS
                .iter()
                .map(|name| (*name, ColumnType::Float)),
        );
    for (name, ty) in targets {
        let Some(idx) = frame.column_index(name) else {
            warn!("Column '{name}' missing; skipping type coercion");
            continue;
        };
        for (row_idx, row) in frame.rows.iter_mut().enumerate() {
            if let Some(value) = row[idx].take() {
                row[idx] = Some(
                    coerce_value(value, &ty)
                        .with_context(|| format!("Coercing row {} column '{name}'", row_idx + 1))?,
                );
            }
        }
        frame.columns[idx].data_type = ty;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct NullEntry {
    pub column: String,
    pub nulls: usize,
    pub percent: f64,
}

/// Columns holding at least one null, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct NullReport {
    pub rows: usize,
    pub entries: Vec<NullEntry>,
}

impl NullReport {
    pub fn from_frame(frame: &Frame) -> Self {
        let rows = frame.rows.len();
        let entries = frame
            .null_counts()
            .into_iter()
            .filter(|(_, nulls)| *nulls > 0)
            .map(|(column, nulls)| NullEntry {
                column,
                nulls,
                percent: nulls as f64 / rows as f64 * 100.0,
            })
            .collect();
        Self { rows, entries }
    }

    pub fn nulls_in(&self, column: &str) -> usize {
        self.entries
            .iter()
            .find(|e| e.column == column)
            .map(|e| e.nulls)
            .unwrap_or(0)
    }

    pub fn render(&self) -> String {
        let mut table = TextTable::new(&["column", "nulls", "percent"])
            .align_right(1)
            .align_right(2);
        for entry in &self.entries {
            table.push_row(vec![
                entry.column.clone(),
                entry.nulls.to_string(),
                format!("{:.2}%", entry.percent),
            ]);
        }
        table.render()
    }

    pub fn log(&self, stage: &str) {
        if self.entries.is_empty() {
            info!("Null report ({stage}): no nulls in {} row(s)", self.rows);
        } else {
            info!("Null report ({stage}), {} row(s):\n{}", self.rows, self.render());
        }
    }
}
