//! Alias tables that map normalized spelling variants to canonical
//! department and municipality names.
//!
//! The catalog is plain immutable data handed to whoever resolves names.
//! [`AliasCatalog::default`] carries the built-in tables for the 2024 data
//! year; a YAML file can replace any part of it (see
//! [`AliasCatalog::load`]).

use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::normalize::normalize_text;

/// Outcome of looking a normalized name up in an [`AliasMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// The map names a canonical spelling for this variant.
    Canonical(&'a str),
    /// Not in the map; the input is taken as already canonical.
    Unchanged,
    /// Mapped to null: the reference sources have no such entity.
    NoEquivalent,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Option<String>>", into = "BTreeMap<String, Option<String>>")]
pub struct AliasMap {
    entries: HashMap<String, Option<String>>,
}

impl AliasMap {
    /// Builds a map whose keys are stored normalized. Two spellings that
    /// normalize to the same key must agree on their target.
    pub fn from_entries<I, K>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Option<String>)>,
        K: AsRef<str>,
    {
        let mut map: HashMap<String, Option<String>> = HashMap::new();
        for (key, target) in entries {
            let normalized = normalize_text(Some(key.as_ref()));
            if normalized.is_empty() {
                bail!("Alias key '{}' normalizes to an empty name", key.as_ref());
            }
            match map.get(&normalized) {
                Some(existing) if *existing != target => bail!(
                    "Alias '{}' conflicts with an earlier entry for '{normalized}' ({existing:?} vs {target:?})",
                    key.as_ref()
                ),
                Some(_) => {}
                None => {
                    map.insert(normalized, target);
                }
            }
        }
        Ok(Self { entries: map })
    }

    fn from_static(entries: &[(&str, Option<&str>)]) -> Self {
        let mut map = HashMap::new();
        for &(key, target) in entries {
            map.entry(normalize_text(Some(key)))
                .or_insert_with(|| target.map(str::to_string));
        }
        Self { entries: map }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up an already normalized name.
    pub fn resolve(&self, normalized: &str) -> Resolution<'_> {
        match self.entries.get(normalized) {
            Some(Some(target)) => Resolution::Canonical(target.as_str()),
            Some(None) => Resolution::NoEquivalent,
            None => Resolution::Unchanged,
        }
    }

    /// Name stored in the record: the canonical spelling when one exists,
    /// otherwise the normalized input.
    pub fn display_name(&self, normalized: &str) -> String {
        match self.resolve(normalized) {
            Resolution::Canonical(target) => target.to_string(),
            Resolution::Unchanged | Resolution::NoEquivalent => normalized.to_string(),
        }
    }

    /// Key used for exact-match joins; `None` keeps the row out of every match.
    pub fn join_key(&self, normalized: &str) -> Option<String> {
        if normalized.is_empty() {
            return None;
        }
        match self.resolve(normalized) {
            Resolution::Canonical(target) => Some(target.to_string()),
            Resolution::Unchanged => Some(normalized.to_string()),
            Resolution::NoEquivalent => None,
        }
    }
}

impl TryFrom<BTreeMap<String, Option<String>>> for AliasMap {
    type Error = anyhow::Error;

    fn try_from(value: BTreeMap<String, Option<String>>) -> Result<Self> {
        AliasMap::from_entries(value)
    }
}

impl From<AliasMap> for BTreeMap<String, Option<String>> {
    fn from(value: AliasMap) -> Self {
        value.entries.into_iter().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AliasCatalog {
    pub departments: AliasMap,
    pub municipalities: AliasMap,
    /// Resolved municipality spelling of the capital district.
    pub capital_municipality: String,
    /// Department assigned to the capital municipality regardless of how the
    /// municipality source labels it.
    pub capital_department: String,
    /// Department value marking students residing abroad.
    pub foreign_sentinel: String,
}

impl Default for AliasCatalog {
    fn default() -> Self {
        Self {
            departments: AliasMap::from_static(DEPARTMENT_ALIASES),
            municipalities: AliasMap::from_static(MUNICIPALITY_ALIASES),
            capital_municipality: "BOGOTA D.C.".to_string(),
            capital_department: "BOGOTÁ, D.C.".to_string(),
            foreign_sentinel: "EXTRANJERO".to_string(),
        }
    }
}

impl AliasCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Opening alias catalog {path:?}"))?;
        let catalog: AliasCatalog = serde_yaml::from_str(&raw)
            .with_context(|| format!("Parsing alias catalog {path:?}"))?;
        Ok(catalog)
    }

    pub fn department_name(&self, raw: Option<&str>) -> String {
        self.departments.display_name(&normalize_text(raw))
    }

    pub fn department_key(&self, raw: Option<&str>) -> Option<String> {
        self.departments.join_key(&normalize_text(raw))
    }

    pub fn municipality_name(&self, raw: Option<&str>) -> String {
        self.municipalities.display_name(&normalize_text(raw))
    }

    pub fn municipality_key(&self, raw: Option<&str>) -> Option<String> {
        self.municipalities.join_key(&normalize_text(raw))
    }

    /// Department key for a municipality-source row, overriding the source's
    /// own label when the municipality is the capital district.
    pub fn department_key_for_municipality(
        &self,
        raw_department: Option<&str>,
        municipality_key: Option<&str>,
    ) -> Option<String> {
        if municipality_key == Some(self.capital_municipality.as_str()) {
            return Some(self.capital_department.clone());
        }
        self.department_key(raw_department)
    }

    pub fn is_foreign(&self, department: &str) -> bool {
        department.trim().to_uppercase() == self.foreign_sentinel
    }
}

const DEPARTMENT_ALIASES: &[(&str, Option<&str>)] = &[
    ("BOGOTÁ", Some("BOGOTÁ, D.C.")),
    ("BOGOTA", Some("BOGOTÁ, D.C.")),
    ("BOGOTÁ D.C.", Some("BOGOTÁ, D.C.")),
    ("BOGOTA D.C.", Some("BOGOTÁ, D.C.")),
    ("BOGOTÁ, D.C.", Some("BOGOTÁ, D.C.")),
    ("VALLE", Some("VALLE DEL CAUCA")),
    ("VALLE DEL CAUCA", Some("VALLE DEL CAUCA")),
    ("QUINDIO", Some("QUINDÍO")),
    ("CUNDINAMARCA", Some("CUNDINAMARCA")),
    ("ANTIOQUIA", Some("ANTIOQUIA")),
    ("BOLIVAR", Some("BOLÍVAR")),
    ("CAUCA", Some("CAUCA")),
    ("ATLANTICO", Some("ATLÁNTICO")),
    ("NARIÑO", Some("NARIÑO")),
    ("NARINO", Some("NARIÑO")),
    ("SANTANDER", Some("SANTANDER")),
    ("CORDOBA", Some("CÓRDOBA")),
    ("RISARALDA", Some("RISARALDA")),
    ("CESAR", Some("CESAR")),
    ("MAGDALENA", Some("MAGDALENA")),
    ("HUILA", Some("HUILA")),
    ("CALDAS", Some("CALDAS")),
    ("NORTE SANTANDER", Some("NORTE DE SANTANDER")),
    ("NORTE DE SANTANDER", Some("NORTE DE SANTANDER")),
    ("TOLIMA", Some("TOLIMA")),
    ("LA GUAJIRA", Some("LA GUAJIRA")),
    ("META", Some("META")),
    ("CASANARE", Some("CASANARE")),
    ("ARAUCA", Some("ARAUCA")),
    ("SUCRE", Some("SUCRE")),
    ("BOYACA", Some("BOYACÁ")),
    ("CAQUETA", Some("CAQUETÁ")),
    ("PUTUMAYO", Some("PUTUMAYO")),
    ("GUAVIARE", Some("GUAVIARE")),
    ("CHOCO", Some("CHOCÓ")),
    ("GUAINIA", Some("GUAINÍA")),
    ("VICHADA", Some("VICHADA")),
    ("AMAZONAS", Some("AMAZONAS")),
    ("SAN ANDRES", Some("SAN ANDRÉS, PROVIDENCIA Y SANTA CATALINA")),
    ("SAN ANDRES Y PROVIDENCIA", Some("SAN ANDRÉS, PROVIDENCIA Y SANTA CATALINA")),
    ("SAN ANDRES, PROVIDENCIA Y SANTA CATALINA", Some("SAN ANDRÉS, PROVIDENCIA Y SANTA CATALINA")),
    ("VAUPES", Some("VAUPÉS")),
    ("DESCONOCIDO", Some("DESCONOCIDO")),
    ("EXTRANJERO", Some("EXTRANJERO")),
];

const MUNICIPALITY_ALIASES: &[(&str, Option<&str>)] = &[
    // Spelling and renaming differences between the sources.
    ("ARMERO GUAYABAL", Some("ARMERO")),
    ("BOGOTA", Some("BOGOTA D.C.")),
    ("CALIMA EL DARIEN", Some("CALIMA")),
    ("CARTAGENA", Some("CARTAGENA DE INDIAS")),
    ("CHIBOLO", Some("CHIVOLO")),
    ("DON MATIAS", Some("DONMATIAS")),
    ("FUENTE DE ORO", Some("FUENTEDEORO")),
    ("GUICAN", Some("GUICAN DE LA SIERRA")),
    ("MAGUI PAYAN", Some("MAGUI")),
    ("MARIQUITA", Some("SAN SEBASTIAN DE MARIQUITA")),
    ("PIENDAMO", Some("PIENDAMO - TUNIA")),
    ("PURISIMA", Some("PURISIMA DE LA CONCEPCION")),
    ("SALAZAR DE LAS PALMAS", Some("SALAZAR")),
    ("SAN JOSE DEL PALMAR", Some("SAN JOSE DEL PALMAR")),
    ("SAN JUAN DE RIO SECO", Some("SAN JUAN DE RIOSECO")),
    ("SAN VICENTE", Some("SAN VICENTE FERRER")),
    ("SANTA CRUZ DE LORICA", Some("LORICA")),
    ("SANTAFE DE ANTIOQUIA", Some("SANTA FE DE ANTIOQUIA")),
    ("SINCE", Some("SAN LUIS DE SINCE")),
    ("TUMACO", Some("SAN ANDRES DE TUMACO")),
    ("UBATE", Some("VILLA DE SAN DIEGO DE UBATE")),
    // Present in only one source.
    ("RIO IRO", None),
    ("SIPI", None),
];
