//! Loaders for the primary record file and the three reference tables.
//!
//! Every loader keeps the source's original key columns untouched and adds
//! `<column>_norm` (normalized text) and `<column>_key` (alias-resolved join
//! key) next to them.

use std::path::Path;

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::{debug, info};

use crate::{
    aliases::AliasCatalog,
    data::{Value, coerce_value},
    error::EtlError,
    fields,
    frame::Frame,
    io_utils,
    normalize::normalize_text,
    schema::{ColumnMeta, ColumnType},
};

pub const HDI_ENTITY: &str = "Entidad";
pub const HDI_VALUE: &str = "IDH";
pub const HDI_POPULATION: &str = "Población";

pub const POVERTY_DEPARTMENT: &str = "Departamento";
pub const POVERTY_PREVIOUS: &str = "Pobreza_2023";
pub const POVERTY_CURRENT: &str = "Pobreza_2024";

pub const MUNICIPALITY_DEPARTMENT: &str = "Departamento";
pub const MUNICIPALITY_NAME: &str = "Municipio";
pub const MUNICIPALITY_URL: &str = "URL";
pub const MUNICIPALITY_POPULATION: &str = "Poblacion";

pub fn norm_column(name: &str) -> String {
    format!("{name}_norm")
}

pub fn key_column(name: &str) -> String {
    format!("{name}_key")
}

/// Drops the descriptive survey columns and resolves every geographic
/// column of freshly read exam records.
pub fn prepare_records(frame: &mut Frame, catalog: &AliasCatalog) -> Result<()> {
    let dropped = frame.drop_columns(fields::DROPPED_RECORD_COLUMNS);
    debug!("Dropped {dropped} descriptive column(s); {} remain", frame.columns.len());
    resolve_record_geography(frame, catalog)
}

/// Rewrites department columns to their resolved names, normalizes the
/// municipality columns without aliasing them, and appends the transient
/// residence join keys. Municipality aliases only reach the join key.
/// Missing cells stay missing.
pub fn resolve_record_geography(frame: &mut Frame, catalog: &AliasCatalog) -> Result<()> {
    let department_keys = match frame.column_index(fields::RESIDENCE_DEPARTMENT) {
        Some(idx) => frame
            .values(idx)
            .map(|cell| {
                cell.and_then(|v| catalog.department_key(Some(&v.as_display())))
                    .map(Value::String)
            })
            .collect(),
        None => vec![None; frame.rows.len()],
    };
    for column in fields::DEPARTMENT_COLUMNS {
        if !frame.has_column(column) {
            continue;
        }
        frame.map_column(column, |cell| {
            cell.map(|v| Value::String(catalog.department_name(Some(&v.as_display()))))
        })?;
        frame.set_column_type(column, ColumnType::String)?;
    }

    let municipality_keys = match frame.column_index(fields::RESIDENCE_MUNICIPALITY) {
        Some(idx) => frame
            .values(idx)
            .map(|cell| {
                cell.and_then(|v| catalog.municipality_key(Some(&v.as_display())))
                    .map(Value::String)
            })
            .collect(),
        None => vec![None; frame.rows.len()],
    };
    for column in fields::MUNICIPALITY_COLUMNS {
        if !frame.has_column(column) {
            continue;
        }
        frame.map_column(column, |cell| {
            cell.map(|v| Value::String(normalize_text(Some(&v.as_display()))))
        })?;
        frame.set_column_type(column, ColumnType::String)?;
    }

    frame.push_column(
        ColumnMeta::new(fields::RESIDENCE_DEPARTMENT_KEY, ColumnType::String),
        department_keys,
    )?;
    frame.push_column(
        ColumnMeta::new(fields::RESIDENCE_MUNICIPALITY_KEY, ColumnType::String),
        municipality_keys,
    )?;
    Ok(())
}

/// Department HDI table: one row per department with `IDH` and `Población`.
pub fn load_department_indicators(
    path: &Path,
    encoding: &'static Encoding,
    catalog: &AliasCatalog,
) -> Result<Frame> {
    let mut frame = Frame::read_csv(path, encoding)?;
    coerce_column(&mut frame, HDI_VALUE, ColumnType::Float)?;
    coerce_column(&mut frame, HDI_POPULATION, ColumnType::Integer)?;
    add_department_keys(&mut frame, HDI_ENTITY, catalog)?;
    info!("Department indicators: {} row(s) from {path:?}", frame.rows.len());
    Ok(frame)
}

/// Monetary poverty table. Only the most recent year is kept.
pub fn load_poverty(
    path: &Path,
    encoding: &'static Encoding,
    catalog: &AliasCatalog,
) -> Result<Frame> {
    let mut frame = Frame::read_csv(path, encoding)?;
    frame.drop_columns(&[POVERTY_PREVIOUS]);
    coerce_column(&mut frame, POVERTY_CURRENT, ColumnType::Float)?;
    add_department_keys(&mut frame, POVERTY_DEPARTMENT, catalog)?;
    info!("Department poverty: {} row(s) from {path:?}", frame.rows.len());
    Ok(frame)
}

/// Municipality population table keyed by (department, municipality).
/// Population arrives as free text and must parse to a non-negative integer.
pub fn load_municipality_population(
    path: &Path,
    encoding: &'static Encoding,
    catalog: &AliasCatalog,
) -> Result<Frame> {
    let (headers, rows) = io_utils::read_all(path, encoding)?;
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("Column '{name}' not found in {path:?}"))
    };
    let department_idx = position(MUNICIPALITY_DEPARTMENT)?;
    let municipality_idx = position(MUNICIPALITY_NAME)?;
    let population_idx = position(MUNICIPALITY_POPULATION)?;

    let mut frame = Frame::new(vec![
        ColumnMeta::new(MUNICIPALITY_DEPARTMENT, ColumnType::String),
        ColumnMeta::new(MUNICIPALITY_NAME, ColumnType::String),
        ColumnMeta::new(MUNICIPALITY_POPULATION, ColumnType::Integer),
        ColumnMeta::new(norm_column(MUNICIPALITY_NAME), ColumnType::String),
        ColumnMeta::new(key_column(MUNICIPALITY_NAME), ColumnType::String),
        ColumnMeta::new(norm_column(MUNICIPALITY_DEPARTMENT), ColumnType::String),
        ColumnMeta::new(key_column(MUNICIPALITY_DEPARTMENT), ColumnType::String),
    ]);

    let mut capital_overrides = 0usize;
    for (row_idx, raw) in rows.iter().enumerate() {
        let cell = |idx: usize| raw.get(idx).map(|s| s.as_str()).filter(|s| !s.is_empty());
        let department = cell(department_idx);
        let municipality = cell(municipality_idx);
        let population = parse_population_text(cell(population_idx).unwrap_or(""))
            .with_context(|| format!("Row {} in {path:?}", row_idx + 2))?;

        let municipality_key = catalog.municipality_key(municipality);
        let department_key =
            catalog.department_key_for_municipality(department, municipality_key.as_deref());
        if municipality_key.as_deref() == Some(catalog.capital_municipality.as_str()) {
            capital_overrides += 1;
        }

        let text = |value: Option<&str>| value.map(|v| Value::String(v.to_string()));
        frame.rows.push(vec![
            text(department),
            text(municipality),
            Some(Value::Integer(population)),
            Some(Value::String(normalize_text(municipality))),
            municipality_key.map(Value::String),
            Some(Value::String(normalize_text(department))),
            department_key.map(Value::String),
        ]);
    }
    if headers.iter().any(|h| h == MUNICIPALITY_URL) {
        debug!("Ignoring '{MUNICIPALITY_URL}' column in {path:?}");
    }
    info!(
        "Municipality population: {} row(s) from {path:?}, {capital_overrides} capital override(s)",
        frame.rows.len()
    );
    Ok(frame)
}

/// Parses population text such as `Población 1.234.567 habitantes`.
pub fn parse_population_text(text: &str) -> Result<i64, EtlError> {
    let mut cleaned = text.to_string();
    for label in ["Población", "Poblacion", "POBLACIÓN", "habitantes", "Habitantes"] {
        cleaned = cleaned.replace(label, "");
    }
    let digits: String = cleaned
        .chars()
        .filter(|c| *c != '.' && !c.is_whitespace())
        .collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(EtlError::parse(
            "municipality population",
            format!("'{text}' is not a non-negative integer"),
        ));
    }
    digits.parse::<i64>().map_err(|err| {
        EtlError::parse(
            "municipality population",
            format!("'{text}' is out of range: {err}"),
        )
    })
}

fn coerce_column(frame: &mut Frame, name: &str, ty: ColumnType) -> Result<()> {
    let idx = frame.require_column(name)?;
    for (row_idx, row) in frame.rows.iter_mut().enumerate() {
        if let Some(value) = row[idx].take() {
            row[idx] = Some(
                coerce_value(value, &ty)
                    .with_context(|| format!("Row {} column '{name}'", row_idx + 2))?,
            );
        }
    }
    frame.set_column_type(name, ty)
}

fn add_department_keys(frame: &mut Frame, column: &str, catalog: &AliasCatalog) -> Result<()> {
    let idx = frame.require_column(column)?;
    let raw: Vec<Option<String>> = frame
        .values(idx)
        .map(|cell| cell.map(Value::as_display))
        .collect();
    let normalized = raw
        .iter()
        .map(|v| Some(Value::String(normalize_text(v.as_deref()))))
        .collect();
    let keys = raw
        .iter()
        .map(|v| catalog.department_key(v.as_deref()).map(Value::String))
        .collect();
    frame.push_column(ColumnMeta::new(norm_column(column), ColumnType::String), normalized)?;
    frame.push_column(ColumnMeta::new(key_column(column), ColumnType::String), keys)?;
    Ok(())
}
