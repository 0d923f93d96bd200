use std::collections::HashMap;

use anyhow::{Result, anyhow, bail};
use log::{debug, info, warn};

use crate::{
    data::Value,
    frame::{Frame, Row},
    schema::{ColumnMeta, ColumnType},
    sources,
};

const KEY_SEPARATOR: &str = "\u{1f}";

/// Column holding the resolved department key in the combined department
/// reference.
pub const DEPARTMENT_REFERENCE_KEY: &str = "departamento_key";

/// Describes one LEFT join: key pairs plus the right-hand columns to carry
/// over under their output names.
#[derive(Debug, Clone)]
pub struct JoinSpec {
    pub label: String,
    pub left_keys: Vec<String>,
    pub right_keys: Vec<String>,
    pub columns: Vec<(String, String)>,
}

impl JoinSpec {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            left_keys: Vec::new(),
            right_keys: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn on(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.left_keys.push(left.into());
        self.right_keys.push(right.into());
        self
    }

    pub fn carry(mut self, right: impl Into<String>, output: impl Into<String>) -> Self {
        self.columns.push((right.into(), output.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSummary {
    pub label: String,
    pub rows: usize,
    pub matched: usize,
    pub unmatched: usize,
}

impl JoinSummary {
    pub fn match_rate(&self) -> f64 {
        if self.rows == 0 {
            0.0
        } else {
            self.matched as f64 / self.rows as f64 * 100.0
        }
    }

    pub fn log(&self) {
        info!(
            "Merge '{}': {} row(s), {} matched, {} unmatched ({:.2}% match rate)",
            self.label,
            self.rows,
            self.matched,
            self.unmatched,
            self.match_rate()
        );
    }
}

/// LEFT joins `right` into `left` in place. Every left row is kept in order;
/// rows whose key has a null part or no counterpart receive nulls.
pub fn left_join(left: &mut Frame, right: &Frame, spec: &JoinSpec) -> Result<JoinSummary> {
    if spec.left_keys.is_empty() || spec.left_keys.len() != spec.right_keys.len() {
        bail!(
            "Join '{}' requires the same, non-zero number of left and right keys",
            spec.label
        );
    }
    let left_indices = column_indices(left, &spec.left_keys)?;
    let right_indices = column_indices(right, &spec.right_keys)?;
    let carried = spec
        .columns
        .iter()
        .map(|(name, output)| {
            let idx = right
                .column_index(name)
                .ok_or_else(|| anyhow!("Column '{name}' not found in right side of '{}'", spec.label))?;
            Ok((idx, ColumnMeta::new(output.clone(), right.columns[idx].data_type)))
        })
        .collect::<Result<Vec<_>>>()?;

    let lookup = build_right_lookup(right, &right_indices, &spec.label);

    let mut new_columns: Vec<Vec<Option<Value>>> =
        vec![Vec::with_capacity(left.rows.len()); carried.len()];
    let mut matched = 0usize;
    for row in &left.rows {
        let found = build_key(row, &left_indices).and_then(|key| lookup.get(&key));
        if found.is_some() {
            matched += 1;
        }
        for (slot, (right_idx, _)) in new_columns.iter_mut().zip(&carried) {
            slot.push(found.and_then(|r| right.rows[*r][*right_idx].clone()));
        }
    }

    for ((_, meta), values) in carried.into_iter().zip(new_columns) {
        left.push_column(meta, values)?;
    }

    let summary = JoinSummary {
        label: spec.label.clone(),
        rows: left.rows.len(),
        matched,
        unmatched: left.rows.len() - matched,
    };
    summary.log();
    Ok(summary)
}

/// Full outer merge of the department indicator and poverty tables on their
/// resolved keys. Keys keep first-seen order: indicator rows first, then
/// poverty-only departments.
pub fn combine_department_references(indicators: &Frame, poverty: &Frame) -> Result<Frame> {
    let indicator_key = indicators.require_column(&sources::key_column(sources::HDI_ENTITY))?;
    let hdi = indicators.require_column(sources::HDI_VALUE)?;
    let population = indicators.require_column(sources::HDI_POPULATION)?;
    let poverty_key = poverty.require_column(&sources::key_column(sources::POVERTY_DEPARTMENT))?;
    let poverty_value = poverty.require_column(sources::POVERTY_CURRENT)?;

    let mut combined = Frame::new(vec![
        ColumnMeta::new(DEPARTMENT_REFERENCE_KEY, ColumnType::String),
        ColumnMeta::new(sources::HDI_VALUE, indicators.columns[hdi].data_type),
        ColumnMeta::new(sources::HDI_POPULATION, indicators.columns[population].data_type),
        ColumnMeta::new(sources::POVERTY_CURRENT, poverty.columns[poverty_value].data_type),
    ]);
    let mut positions: HashMap<String, usize> = HashMap::new();

    for row in &indicators.rows {
        let Some(key) = row[indicator_key].as_ref().map(Value::as_display) else {
            debug!("Skipping indicator row without a resolvable department");
            continue;
        };
        if positions.contains_key(&key) {
            warn!("Duplicate department '{key}' in indicator table; keeping the first row");
            continue;
        }
        positions.insert(key.clone(), combined.rows.len());
        combined.rows.push(vec![
            Some(Value::String(key)),
            row[hdi].clone(),
            row[population].clone(),
            None,
        ]);
    }

    let mut filled = vec![false; combined.rows.len()];
    for row in &poverty.rows {
        let Some(key) = row[poverty_key].as_ref().map(Value::as_display) else {
            debug!("Skipping poverty row without a resolvable department");
            continue;
        };
        match positions.get(&key) {
            Some(&pos) if filled[pos] => {
                warn!("Duplicate department '{key}' in poverty table; keeping the first row");
            }
            Some(&pos) => {
                combined.rows[pos][3] = row[poverty_value].clone();
                filled[pos] = true;
            }
            None => {
                positions.insert(key.clone(), combined.rows.len());
                combined
                    .rows
                    .push(vec![Some(Value::String(key)), None, None, row[poverty_value].clone()]);
                filled.push(true);
            }
        }
    }

    info!(
        "Combined department reference: {} department(s), {} with poverty data",
        combined.rows.len(),
        filled.iter().filter(|f| **f).count()
    );
    Ok(combined)
}

fn column_indices(frame: &Frame, columns: &[String]) -> Result<Vec<usize>> {
    columns.iter().map(|name| frame.require_column(name)).collect()
}

fn build_right_lookup(right: &Frame, key_indices: &[usize], label: &str) -> HashMap<String, usize> {
    let mut map: HashMap<String, usize> = HashMap::new();
    let mut duplicates = 0usize;
    for (row_idx, row) in right.rows.iter().enumerate() {
        let Some(key) = build_key(row, key_indices) else {
            continue;
        };
        if map.contains_key(&key) {
            duplicates += 1;
            continue;
        }
        map.insert(key, row_idx);
    }
    if duplicates > 0 {
        warn!("Merge '{label}': {duplicates} duplicate reference key(s) ignored");
    }
    map
}

/// `None` when any key part is missing; null keys never match.
fn build_key(row: &Row, key_indices: &[usize]) -> Option<String> {
    let mut parts = Vec::with_capacity(key_indices.len());
    for idx in key_indices {
        parts.push(row.get(*idx)?.as_ref()?.key_fragment());
    }
    Some(parts.join(KEY_SEPARATOR))
}
