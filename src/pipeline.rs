//! Stage functions behind the CLI subcommands.

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::info;

use crate::{
    aliases::AliasCatalog,
    config::PipelineConfig,
    extract::{self, ExtractSummary},
    fetch::Fetcher,
    fields,
    frame::Frame,
    io_utils,
    join::{self, DEPARTMENT_REFERENCE_KEY, JoinSpec, JoinSummary},
    layout::ColumnLayout,
    quality::{self, QualityReport},
    reconcile::{self, NullReport},
    sources,
    star::{self, DimensionSpec, StarSchema},
    table::TextTable,
    warehouse::Warehouse,
};

/// The three reference tables, already keyed.
#[derive(Debug, Clone)]
pub struct References {
    pub indicators: Frame,
    pub poverty: Frame,
    pub municipalities: Frame,
}

impl References {
    pub fn load(
        config: &PipelineConfig,
        encoding: &'static Encoding,
        catalog: &AliasCatalog,
    ) -> Result<Self> {
        Ok(Self {
            indicators: sources::load_department_indicators(
                &config.hdi_staging(),
                encoding,
                catalog,
            )?,
            poverty: sources::load_poverty(&config.poverty_staging(), encoding, catalog)?,
            municipalities: sources::load_municipality_population(
                &config.municipality_staging(),
                encoding,
                catalog,
            )?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TransformOutcome {
    pub frame: Frame,
    pub joins: Vec<JoinSummary>,
    pub zero_filled: usize,
    pub nulls_before: NullReport,
    pub nulls_after: NullReport,
}

/// Joins, reconciles, and orders raw exam records. `records` is the frame
/// as read from disk.
pub fn transform_records(
    mut records: Frame,
    references: &References,
    catalog: &AliasCatalog,
) -> Result<TransformOutcome> {
    sources::prepare_records(&mut records, catalog)?;

    let departments =
        join::combine_department_references(&references.indicators, &references.poverty)?;
    let department_join = join::left_join(
        &mut records,
        &departments,
        &JoinSpec::new("departamento")
            .on(fields::RESIDENCE_DEPARTMENT_KEY, DEPARTMENT_REFERENCE_KEY)
            .carry(sources::HDI_POPULATION, fields::DEPARTMENT_POPULATION)
            .carry(sources::HDI_VALUE, fields::DEPARTMENT_HDI)
            .carry(sources::POVERTY_CURRENT, fields::DEPARTMENT_POVERTY),
    )?;
    let municipality_join = join::left_join(
        &mut records,
        &references.municipalities,
        &JoinSpec::new("municipio")
            .on(
                fields::RESIDENCE_DEPARTMENT_KEY,
                sources::key_column(sources::MUNICIPALITY_DEPARTMENT),
            )
            .on(
                fields::RESIDENCE_MUNICIPALITY_KEY,
                sources::key_column(sources::MUNICIPALITY_NAME),
            )
            .carry(sources::MUNICIPALITY_POPULATION, fields::MUNICIPALITY_POPULATION),
    )?;

    let nulls_before = NullReport::from_frame(&records);
    nulls_before.log("after joins");
    let zero_filled = reconcile::zero_fill_foreign(&mut records, catalog)?;
    reconcile::coerce_types(&mut records)?;
    let nulls_after = NullReport::from_frame(&records);
    nulls_after.log("after reconciliation");

    let frame = ColumnLayout::record_default().apply(&records)?;
    let (rows, cols) = frame.shape();
    info!("Curated table: {rows} row(s), {cols} column(s)");

    Ok(TransformOutcome {
        frame,
        joins: vec![department_join, municipality_join],
        zero_filled,
        nulls_before,
        nulls_after,
    })
}

pub fn transform(config: &PipelineConfig) -> Result<TransformOutcome> {
    let encoding = io_utils::resolve_encoding(config.encoding.as_deref())?;
    let catalog = config.alias_catalog()?;
    info!(
        "Alias catalog: {} department and {} municipality entries",
        catalog.departments.len(),
        catalog.municipalities.len()
    );
    let references = References::load(config, encoding, &catalog)?;
    let records = Frame::read_csv(&config.records_file, encoding)?;
    let (rows, cols) = records.shape();
    info!(
        "Records loaded from {:?}: {rows} row(s), {cols} column(s)",
        config.records_file
    );

    let outcome = transform_records(records, &references, &catalog)?;
    let output = config.curated_csv();
    outcome
        .frame
        .write_csv(&output, true)
        .with_context(|| format!("Writing curated table {output:?}"))?;
    info!("Curated table written to {output:?}");
    log_join_table(&outcome.joins);
    Ok(outcome)
}

fn log_join_table(joins: &[JoinSummary]) {
    let mut table = TextTable::new(&["merge", "rows", "matched", "unmatched", "rate"])
        .align_right(1)
        .align_right(2)
        .align_right(3)
        .align_right(4);
    for summary in joins {
        table.push_row(vec![
            summary.label.clone(),
            summary.rows.to_string(),
            summary.matched.to_string(),
            summary.unmatched.to_string(),
            format!("{:.2}%", summary.match_rate()),
        ]);
    }
    info!("Merge summary:\n{}", table.render());
}

fn read_curated(config: &PipelineConfig) -> Result<Frame> {
    let path = config.curated_csv();
    let frame = Frame::read_csv(&path, encoding_rs::UTF_8)
        .with_context(|| format!("Reading curated table {path:?}; run the transform stage first"))?;
    let (rows, cols) = frame.shape();
    info!("Curated table read from {path:?}: {rows} row(s), {cols} column(s)");
    Ok(frame)
}

pub fn validate(config: &PipelineConfig) -> Result<QualityReport> {
    let frame = read_curated(config)?;
    let dataset = config.curated_csv().display().to_string();
    quality::validate(&frame, &dataset, &config.report_json())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub dimension_rows: Vec<(String, usize)>,
    pub fact_rows: usize,
}

pub fn build_star(frame: &Frame) -> Result<StarSchema> {
    star::build_star_schema(frame, &DimensionSpec::defaults(), fields::MEASURES)
}

/// Builds the star schema before touching the warehouse, so input errors
/// leave the previous load in place.
pub fn load(config: &PipelineConfig) -> Result<LoadSummary> {
    let frame = read_curated(config)?;
    let star = build_star(&frame)?;

    let mut warehouse = Warehouse::open(&config.warehouse)?;
    warehouse.apply_schema(&config.schema_script)?;
    let mut shapes = TextTable::new(&["table", "rows"]).align_right(1);
    for dimension in &star.dimensions {
        shapes.push_row(vec![
            dimension.spec.table.clone(),
            dimension.rows.len().to_string(),
        ]);
    }
    shapes.push_row(vec![star::FACT_TABLE.to_string(), star.facts.rows.len().to_string()]);
    info!("Star schema:\n{}", shapes.render());

    warehouse.load_star(&star)?;
    Ok(LoadSummary {
        dimension_rows: star
            .dimensions
            .iter()
            .map(|d| (d.spec.table.clone(), d.rows.len()))
            .collect(),
        fact_rows: star.facts.rows.len(),
    })
}

pub fn extract(config: &PipelineConfig) -> Result<ExtractSummary> {
    let fetcher = Fetcher::http()?;
    extract::run(&fetcher, &config.input_dir, &config.staging_dir)
}

/// Extract, transform, validate, and load in sequence. Any stage error stops
/// the run.
pub fn run_all(config: &PipelineConfig, skip_extract: bool) -> Result<()> {
    if skip_extract {
        info!("Skipping extract; using staged reference tables");
    } else {
        extract(config).context("Extract stage")?;
    }
    transform(config).context("Transform stage")?;
    validate(config).context("Validate stage")?;
    load(config).context("Load stage")?;
    info!("Pipeline finished");
    Ok(())
}
