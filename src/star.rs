//! Star-schema materialization.
//!
//! Each dimension owns a [`DimensionArena`] mapping an attribute tuple to a
//! dense 0-based index in first-occurrence order. The same arena assigns the
//! index while the dimension rows are collected and answers the fact-table
//! lookup, so every foreign key (`index + 1`) points back at the exact tuple
//! of the record that produced it. Null attributes are ordinary tuple
//! members: two nulls compare equal.

use std::collections::HashMap;

use anyhow::{Context, Result};
use log::info;

use crate::{
    data::Value,
    fields,
    frame::{Frame, Row},
    schema::{ColumnMeta, ColumnType},
};

pub const FACT_TABLE: &str = "fact_icfes";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionSpec {
    pub table: String,
    pub key: String,
    pub attributes: Vec<String>,
}

impl DimensionSpec {
    pub fn new(table: &str, key: &str, attributes: &[&str]) -> Self {
        Self {
            table: table.to_string(),
            key: key.to_string(),
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn defaults() -> Vec<DimensionSpec> {
        vec![
            DimensionSpec::new(
                "dim_departamento",
                "id_departamento",
                &[
                    fields::RESIDENCE_DEPARTMENT,
                    fields::DEPARTMENT_POPULATION,
                    fields::DEPARTMENT_HDI,
                    fields::DEPARTMENT_POVERTY,
                ],
            ),
            DimensionSpec::new(
                "dim_municipio",
                "id_municipio",
                &[fields::RESIDENCE_MUNICIPALITY, fields::MUNICIPALITY_POPULATION],
            ),
            DimensionSpec::new(
                "dim_contexto_socioeconomico",
                "id_contexto",
                &[
                    "estu_inse_individual",
                    "estu_nse_individual",
                    "fami_estratovivienda",
                ],
            ),
            DimensionSpec::new(
                "dim_colegio",
                "id_colegio",
                &[
                    "cole_area_ubicacion",
                    "cole_bilingue",
                    "cole_calendario",
                    "cole_naturaleza",
                    fields::SCHOOL_DEPARTMENT,
                    "estu_nse_establecimiento",
                ],
            ),
            DimensionSpec::new("dim_fecha", "id_fecha", &[fields::PERIOD]),
        ]
    }
}

#[derive(Debug, Default, Clone)]
pub struct DimensionArena {
    index: HashMap<Vec<String>, usize>,
    rows: Vec<Row>,
}

impl DimensionArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the tuple's 0-based index, assigning the next one on first
    /// sight.
    pub fn intern(&mut self, tuple: Row) -> usize {
        let identity = tuple_identity(&tuple);
        if let Some(existing) = self.index.get(&identity) {
            return *existing;
        }
        let next = self.rows.len();
        self.index.insert(identity, next);
        self.rows.push(tuple);
        next
    }

    pub fn lookup(&self, tuple: &[Option<Value>]) -> Option<usize> {
        self.index.get(&tuple_identity(tuple)).copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

fn tuple_identity(tuple: &[Option<Value>]) -> Vec<String> {
    tuple
        .iter()
        .map(|cell| match cell {
            Some(value) => value.key_fragment(),
            None => "n:".to_string(),
        })
        .collect()
}

/// A materialized dimension. Row `i` carries surrogate id `i + 1`.
#[derive(Debug, Clone)]
pub struct Dimension {
    pub spec: DimensionSpec,
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Row>,
}

impl Dimension {
    pub fn row_for_id(&self, id: i64) -> Option<&Row> {
        usize::try_from(id - 1).ok().and_then(|idx| self.rows.get(idx))
    }
}

#[derive(Debug, Clone)]
pub struct StarSchema {
    pub dimensions: Vec<Dimension>,
    /// Foreign-key columns (one per dimension, in dimension order) followed
    /// by the measures.
    pub facts: Frame,
}

impl StarSchema {
    pub fn dimension(&self, table: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.spec.table == table)
    }
}

pub fn build_star_schema(
    records: &Frame,
    specs: &[DimensionSpec],
    measures: &[&str],
) -> Result<StarSchema> {
    let mut dimensions = Vec::with_capacity(specs.len());
    let mut foreign_keys: Vec<Vec<Option<Value>>> = Vec::with_capacity(specs.len());

    for spec in specs {
        let indices = spec
            .attributes
            .iter()
            .map(|name| records.require_column(name))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Building dimension '{}'", spec.table))?;

        let mut arena = DimensionArena::new();
        let keys = records
            .rows
            .iter()
            .map(|row| {
                let tuple: Row = indices.iter().map(|idx| row[*idx].clone()).collect();
                Some(Value::Integer(arena.intern(tuple) as i64 + 1))
            })
            .collect();
        foreign_keys.push(keys);

        info!(
            "Dimension '{}': {} distinct row(s) from {} record(s)",
            spec.table,
            arena.len(),
            records.rows.len()
        );
        dimensions.push(Dimension {
            spec: spec.clone(),
            columns: indices.iter().map(|idx| records.columns[*idx].clone()).collect(),
            rows: arena.into_rows(),
        });
    }

    let measure_indices = measures
        .iter()
        .map(|name| records.require_column(name))
        .collect::<Result<Vec<_>>>()
        .context("Selecting fact measures")?;

    let mut columns: Vec<ColumnMeta> = specs
        .iter()
        .map(|spec| ColumnMeta::new(spec.key.clone(), ColumnType::Integer))
        .collect();
    columns.extend(measure_indices.iter().map(|idx| records.columns[*idx].clone()));

    let rows = records
        .rows
        .iter()
        .enumerate()
        .map(|(row_idx, row)| {
            foreign_keys
                .iter()
                .map(|keys| keys[row_idx].clone())
                .chain(measure_indices.iter().map(|idx| row[*idx].clone()))
                .collect()
        })
        .collect();
    let facts = Frame { columns, rows };
    info!("Fact table '{FACT_TABLE}': {} row(s)", facts.rows.len());

    Ok(StarSchema { dimensions, facts })
}
