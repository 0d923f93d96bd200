pub mod aliases;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod fields;
pub mod frame;
pub mod io_utils;
pub mod join;
pub mod layout;
pub mod normalize;
pub mod pipeline;
pub mod quality;
pub mod reconcile;
pub mod schema;
pub mod scrape;
pub mod sources;
pub mod star;
pub mod table;
pub mod warehouse;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands},
    config::PipelineConfig,
};

pub use error::EtlError;

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("icfes_dw", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let mut config = PipelineConfig::resolve(cli.config.as_deref())?;
    debug!("Command: {:?}", cli.command);
    match cli.command {
        Commands::Extract(args) => {
            args.paths.apply(&mut config);
            let summary = pipeline::extract(&config)?;
            info!(
                "Extract complete: {} HDI, {} poverty, {} municipality row(s)",
                summary.departments_hdi, summary.departments_poverty, summary.municipalities
            );
            Ok(())
        }
        Commands::Transform(args) => {
            args.paths.apply(&mut config);
            if let Some(records) = args.records {
                config.records_file = records;
            }
            if let Some(aliases) = args.aliases {
                config.aliases = Some(aliases);
            }
            if let Some(encoding) = args.input_encoding {
                config.encoding = Some(encoding);
            }
            pipeline::transform(&config).map(|_| ())
        }
        Commands::Validate(args) => {
            args.paths.apply(&mut config);
            pipeline::validate(&config).map(|_| ())
        }
        Commands::Load(args) => {
            args.paths.apply(&mut config);
            if let Some(schema) = args.schema {
                config.schema_script = schema;
            }
            if let Some(warehouse) = args.warehouse {
                config.warehouse = warehouse;
            }
            let summary = pipeline::load(&config)?;
            info!("Load complete: {} fact row(s)", summary.fact_rows);
            Ok(())
        }
        Commands::Run(args) => {
            args.paths.apply(&mut config);
            if let Some(records) = args.records {
                config.records_file = records;
            }
            if let Some(aliases) = args.aliases {
                config.aliases = Some(aliases);
            }
            if let Some(schema) = args.schema {
                config.schema_script = schema;
            }
            if let Some(warehouse) = args.warehouse {
                config.warehouse = warehouse;
            }
            pipeline::run_all(&config, args.skip_extract)
        }
    }
}
