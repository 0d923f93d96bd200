use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::PipelineConfig;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Reconcile Colombian geographic names across socioeconomic sources and load an ICFES star schema",
    long_about = None
)]
pub struct Cli {
    /// Pipeline configuration file (YAML); defaults apply when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Download the reference pages and write the staging CSVs
    Extract(ExtractArgs),
    /// Join the exam records with the reference tables and write the curated CSV
    Transform(TransformArgs),
    /// Run the data-quality expectations on the curated CSV
    Validate(ValidateArgs),
    /// Build the star schema and load it into the warehouse
    Load(LoadArgs),
    /// Run extract, transform, validate, and load in sequence
    Run(RunArgs),
}

/// Directory overrides shared by every stage.
#[derive(Debug, Args, Default, Clone)]
pub struct PathOverrides {
    /// Directory holding the raw inputs and cached HTML
    #[arg(long = "input-dir")]
    pub input_dir: Option<PathBuf>,
    /// Directory for the staged reference CSVs
    #[arg(long = "staging-dir")]
    pub staging_dir: Option<PathBuf>,
    /// Directory for the curated CSV and the quality report
    #[arg(long = "output-dir")]
    pub output_dir: Option<PathBuf>,
}

impl PathOverrides {
    pub fn apply(&self, config: &mut PipelineConfig) {
        if let Some(dir) = &self.input_dir {
            config.input_dir = dir.clone();
        }
        if let Some(dir) = &self.staging_dir {
            config.staging_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
    }
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub paths: PathOverrides,
}

#[derive(Debug, Args)]
pub struct TransformArgs {
    #[command(flatten)]
    pub paths: PathOverrides,
    /// Exam-record CSV to transform
    #[arg(short, long)]
    pub records: Option<PathBuf>,
    /// YAML alias catalog replacing the built-in tables
    #[arg(long)]
    pub aliases: Option<PathBuf>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub paths: PathOverrides,
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    #[command(flatten)]
    pub paths: PathOverrides,
    /// SQL script executed before loading
    #[arg(long)]
    pub schema: Option<PathBuf>,
    /// SQLite warehouse file
    #[arg(short, long)]
    pub warehouse: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub paths: PathOverrides,
    /// Exam-record CSV to transform
    #[arg(short, long)]
    pub records: Option<PathBuf>,
    /// YAML alias catalog replacing the built-in tables
    #[arg(long)]
    pub aliases: Option<PathBuf>,
    /// SQL script executed before loading
    #[arg(long)]
    pub schema: Option<PathBuf>,
    /// SQLite warehouse file
    #[arg(short, long)]
    pub warehouse: Option<PathBuf>,
    /// Reuse the existing staging CSVs instead of downloading
    #[arg(long)]
    pub skip_extract: bool,
}
