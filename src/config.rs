use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{aliases::AliasCatalog, extract};

pub const CURATED_FILE: &str = "df_icfes_2024_final.csv";
pub const REPORT_FILE: &str = "ge_report.json";

/// Directory layout and file locations for one pipeline run. Every field is
/// optional in YAML; missing ones take the defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub staging_dir: PathBuf,
    pub output_dir: PathBuf,
    pub records_file: PathBuf,
    pub schema_script: PathBuf,
    pub warehouse: PathBuf,
    /// YAML alias catalog replacing the built-in tables.
    pub aliases: Option<PathBuf>,
    /// Encoding label of the input CSVs.
    pub encoding: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data/input"),
            staging_dir: PathBuf::from("data/staging"),
            output_dir: PathBuf::from("data/output"),
            records_file: PathBuf::from("data/input/data_icfes_2024.csv"),
            schema_script: PathBuf::from("sql/schema.sql"),
            warehouse: PathBuf::from("data/output/dw.sqlite"),
            aliases: None,
            encoding: None,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Opening pipeline config {path:?}"))?;
        let config: PipelineConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("Parsing pipeline config {path:?}"))?;
        debug!("Loaded pipeline config from {path:?}: {config:?}");
        Ok(config)
    }

    /// Loads `path` when given, otherwise returns the defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn alias_catalog(&self) -> Result<AliasCatalog> {
        match &self.aliases {
            Some(path) => {
                info!("Using alias catalog {path:?}");
                AliasCatalog::load(path)
            }
            None => Ok(AliasCatalog::default()),
        }
    }

    pub fn hdi_staging(&self) -> PathBuf {
        self.staging_dir.join(extract::HDI_STAGING)
    }

    pub fn poverty_staging(&self) -> PathBuf {
        self.staging_dir.join(extract::POVERTY_STAGING)
    }

    pub fn municipality_staging(&self) -> PathBuf {
        self.staging_dir.join(extract::MUNICIPALITY_STAGING)
    }

    pub fn curated_csv(&self) -> PathBuf {
        self.output_dir.join(CURATED_FILE)
    }

    pub fn report_json(&self) -> PathBuf {
        self.output_dir.join(REPORT_FILE)
    }
}
