//! Data-quality expectations over the curated table and their JSON report.

use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::{data::Value, error::EtlError, fields, frame::Frame, io_utils, schema::ColumnType};

#[derive(Debug, Clone, PartialEq)]
pub enum Check {
    NotNull { column: String },
    Between { column: String, min: f64, max: f64 },
    OfType { column: String, expected: ColumnType },
    /// `left >= right` on every row; a null on either side fails the row.
    PairGreaterOrEqual { left: String, right: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expectation {
    pub name: String,
    pub check: Check,
    pub critical: bool,
}

impl Expectation {
    fn new(name: &str, check: Check, critical: bool) -> Self {
        Self {
            name: name.to_string(),
            check,
            critical,
        }
    }
}

pub fn default_suite() -> Vec<Expectation> {
    let column = |name: &str| name.to_string();
    vec![
        Expectation::new(
            "not_null_punt_global",
            Check::NotNull {
                column: column(fields::GLOBAL_SCORE),
            },
            true,
        ),
        Expectation::new(
            "range_punt_global_0_500",
            Check::Between {
                column: column(fields::GLOBAL_SCORE),
                min: 0.0,
                max: 500.0,
            },
            true,
        ),
        Expectation::new(
            "not_null_depto_reside",
            Check::NotNull {
                column: column(fields::RESIDENCE_DEPARTMENT),
            },
            true,
        ),
        Expectation::new(
            "type_periodo_int64",
            Check::OfType {
                column: column(fields::PERIOD),
                expected: ColumnType::Integer,
            },
            false,
        ),
        Expectation::new(
            "type_pais_str",
            Check::OfType {
                column: column(fields::RESIDENCE_COUNTRY),
                expected: ColumnType::String,
            },
            false,
        ),
        Expectation::new(
            "range_pobreza_0_100",
            Check::Between {
                column: column(fields::DEPARTMENT_POVERTY),
                min: 0.0,
                max: 100.0,
            },
            false,
        ),
        Expectation::new(
            "range_idh_0_1",
            Check::Between {
                column: column(fields::DEPARTMENT_HDI),
                min: 0.0,
                max: 1.0,
            },
            false,
        ),
        Expectation::new(
            "rule_global_ge_math",
            Check::PairGreaterOrEqual {
                left: column(fields::GLOBAL_SCORE),
                right: column(fields::MATH_SCORE),
            },
            false,
        ),
    ]
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Outcome {
    /// `None` when the check could not run.
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unexpected_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unexpected_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Outcome {
    fn skipped() -> Self {
        Self {
            note: Some("skipped".to_string()),
            ..Self::default()
        }
    }

    fn from_unexpected(unexpected: usize, population: usize) -> Self {
        let percent = if population == 0 {
            0.0
        } else {
            unexpected as f64 / population as f64 * 100.0
        };
        Self {
            success: Some(unexpected == 0),
            unexpected_count: Some(unexpected),
            unexpected_percent: Some(round4(percent)),
            ..Self::default()
        }
    }

    pub fn passed(&self) -> bool {
        self.success == Some(true)
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Shape {
    pub rows: usize,
    pub cols: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub dataset: String,
    pub shape: Shape,
    #[serde(serialize_with = "ordered_expectations")]
    pub expectations: Vec<(String, Outcome)>,
    #[serde(skip)]
    pub critical: Vec<String>,
}

fn ordered_expectations<S>(entries: &[(String, Outcome)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for (name, outcome) in entries {
        map.serialize_entry(name, outcome)?;
    }
    map.end()
}

impl QualityReport {
    pub fn outcome(&self, name: &str) -> Option<&Outcome> {
        self.expectations
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, o)| o)
    }

    /// Critical expectations that did not pass, skipped ones included.
    pub fn critical_failures(&self) -> Vec<String> {
        self.critical
            .iter()
            .filter(|name| !self.outcome(name).is_some_and(Outcome::passed))
            .cloned()
            .collect()
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Serializing quality report")?;
        io_utils::write_text(path, &json)
    }
}

pub fn run_suite(frame: &Frame, suite: &[Expectation], dataset: &str) -> QualityReport {
    let (rows, cols) = frame.shape();
    let expectations = suite
        .iter()
        .map(|expectation| (expectation.name.clone(), evaluate(frame, &expectation.check)))
        .collect();
    QualityReport {
        dataset: dataset.to_string(),
        shape: Shape { rows, cols },
        expectations,
        critical: suite
            .iter()
            .filter(|e| e.critical)
            .map(|e| e.name.clone())
            .collect(),
    }
}

fn evaluate(frame: &Frame, check: &Check) -> Outcome {
    match check {
        Check::NotNull { column } => {
            let Some(idx) = frame.column_index(column) else {
                return Outcome::skipped();
            };
            let nulls = frame.values(idx).filter(Option::is_none).count();
            Outcome::from_unexpected(nulls, frame.rows.len())
        }
        Check::Between { column, min, max } => {
            let Some(idx) = frame.column_index(column) else {
                return Outcome::skipped();
            };
            let mut present = 0usize;
            let mut unexpected = 0usize;
            for value in frame.values(idx).flatten() {
                present += 1;
                match value.as_f64() {
                    Some(v) if v >= *min && v <= *max => {}
                    _ => unexpected += 1,
                }
            }
            Outcome::from_unexpected(unexpected, present)
        }
        Check::OfType { column, expected } => {
            let Some(observed) = frame.column_type(column) else {
                return Outcome::skipped();
            };
            Outcome {
                success: Some(observed == *expected),
                observed_value: Some(observed.dtype_name().to_string()),
                ..Outcome::default()
            }
        }
        Check::PairGreaterOrEqual { left, right } => {
            let (Some(l), Some(r)) = (frame.column_index(left), frame.column_index(right)) else {
                return Outcome::skipped();
            };
            let unexpected = frame
                .rows
                .iter()
                .filter(|row| {
                    let pair = (
                        row[l].as_ref().and_then(Value::as_f64),
                        row[r].as_ref().and_then(Value::as_f64),
                    );
                    !matches!(pair, (Some(a), Some(b)) if a >= b)
                })
                .count();
            Outcome::from_unexpected(unexpected, frame.rows.len())
        }
    }
}

/// Runs the suite, writes the report, then fails with
/// [`EtlError::Validation`] if any critical expectation did not pass.
pub fn validate(frame: &Frame, dataset: &str, report_path: &Path) -> Result<QualityReport> {
    info!("Running {} expectation(s) on {dataset}", default_suite().len());
    let report = run_suite(frame, &default_suite(), dataset);
    report
        .write(report_path)
        .with_context(|| format!("Writing quality report to {report_path:?}"))?;
    info!("Quality report written to {report_path:?}");

    for (name, outcome) in &report.expectations {
        match outcome.success {
            Some(true) => info!("  ✓ {name}"),
            Some(false) => warn!("  ✗ {name} ({:?} unexpected)", outcome.unexpected_count),
            None => warn!("  - {name} skipped"),
        }
    }

    let failed = report.critical_failures();
    if !failed.is_empty() {
        return Err(EtlError::Validation {
            failed,
            report: report_path.to_path_buf(),
        }
        .into());
    }
    info!("All critical expectations passed");
    Ok(report)
}
