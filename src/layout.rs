//! Final column order for the curated table, applied once as a projection.

use anyhow::Result;
use log::debug;

use crate::{fields, frame::Frame};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Column(String),
    /// Every column not named elsewhere in the layout, in input order.
    Rest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    slots: Vec<Slot>,
    excluded: Vec<String>,
}

impl ColumnLayout {
    pub fn new(slots: Vec<Slot>) -> Self {
        Self {
            slots,
            excluded: Vec::new(),
        }
    }

    /// Columns that never reach the output, even through `Rest`.
    pub fn excluding<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.excluded
            .extend(names.iter().map(|n| n.as_ref().to_string()));
        self
    }

    /// Layout of the curated exam-record table: geography next to the
    /// columns it was joined from, remaining columns in input order, and the
    /// global score last.
    pub fn record_default() -> Self {
        let leading = [
            fields::PERIOD,
            fields::STUDENT,
            "cole_area_ubicacion",
            "cole_bilingue",
            "cole_calendario",
            "cole_naturaleza",
            fields::SCHOOL_DEPARTMENT,
            fields::SCHOOL_MUNICIPALITY,
            fields::EXAM_DEPARTMENT,
            fields::EXAM_MUNICIPALITY,
            fields::RESIDENCE_DEPARTMENT,
            fields::RESIDENCE_MUNICIPALITY,
            fields::DEPARTMENT_POPULATION,
            fields::MUNICIPALITY_POPULATION,
            fields::NATIONALITY,
            fields::RESIDENCE_COUNTRY,
            fields::DEPARTMENT_HDI,
            fields::DEPARTMENT_POVERTY,
            "estu_inse_individual",
            "estu_nse_individual",
            "estu_nse_establecimiento",
            "fami_estratovivienda",
        ];
        let mut slots: Vec<Slot> = leading
            .iter()
            .map(|name| Slot::Column(name.to_string()))
            .collect();
        slots.push(Slot::Rest);
        slots.push(Slot::Column(fields::GLOBAL_SCORE.to_string()));
        Self::new(slots).excluding(&[
            fields::RESIDENCE_DEPARTMENT_KEY,
            fields::RESIDENCE_MUNICIPALITY_KEY,
        ])
    }

    /// Resolves the layout against `headers`. Named slots missing from the
    /// input are skipped.
    pub fn order(&self, headers: &[String]) -> Vec<String> {
        let named: Vec<&str> = self
            .slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Column(name) => Some(name.as_str()),
                Slot::Rest => None,
            })
            .collect();
        let present = |name: &str| headers.iter().any(|h| h == name);
        let mut order = Vec::with_capacity(headers.len());
        for slot in &self.slots {
            match slot {
                Slot::Column(name) => {
                    if present(name) && !order.contains(name) {
                        order.push(name.clone());
                    }
                }
                Slot::Rest => order.extend(
                    headers
                        .iter()
                        .filter(|h| !named.contains(&h.as_str()))
                        .filter(|h| !self.excluded.contains(h))
                        .cloned(),
                ),
            }
        }
        order
    }

    pub fn apply(&self, frame: &Frame) -> Result<Frame> {
        let order = self.order(&frame.headers());
        debug!("Projecting {} column(s) into final layout", order.len());
        frame.project(&order)
    }
}
