//! Download stage: fetches (or reuses) the HTML artifacts and writes the
//! three reference tables to the staging directory.

use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::{
    data::format_float,
    fetch::{Fetcher, Sleeper, Transport, cache_path_for},
    io_utils,
    scrape::{self, HdiRow, MunicipalityLink, PovertyRow},
    sources,
};

pub const HDI_URL: &str = "https://es.wikipedia.org/wiki/Anexo:Departamentos_de_Colombia_por_IDH";
pub const DANE_URL: &str = "https://www.dane.gov.co/index.php/estadisticas-por-tema/pobreza-y-condiciones-de-vida/pobreza-monetaria";
pub const MUNICIPALITIES_URL: &str = "https://www.municipios.com.co/municipios";

pub const HDI_HTML: &str = "wikipedia_departamentos_idh.html";
pub const DANE_HTML: &str = "dane_pobreza_monetaria.html";
pub const DANE_IFRAME_HTML: &str = "dane_pobreza_monetaria_visualizacion.html";
pub const MUNICIPALITIES_HTML: &str = "municipios_colombia.html";
pub const MUNICIPALITY_PAGES_DIR: &str = "municipios";

pub const HDI_STAGING: &str = "idh_departamentos.csv";
pub const POVERTY_STAGING: &str = "dane_pobreza_monetaria.csv";
pub const MUNICIPALITY_STAGING: &str = "poblacion_municipios.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractSummary {
    pub departments_hdi: usize,
    pub departments_poverty: usize,
    pub municipalities: usize,
}

pub fn run<T: Transport, S: Sleeper>(
    fetcher: &Fetcher<T, S>,
    input_dir: &Path,
    staging_dir: &Path,
) -> Result<ExtractSummary> {
    info!("Extract: caching HTML under {input_dir:?}, staging under {staging_dir:?}");

    let hdi_html = fetcher.fetch_cached(HDI_URL, &input_dir.join(HDI_HTML))?;
    let hdi = scrape::parse_hdi_table(&hdi_html)?;
    write_hdi(&staging_dir.join(HDI_STAGING), &hdi)?;
    info!("Staged {} HDI row(s)", hdi.len());

    let dane_html = fetcher.fetch_cached(DANE_URL, &input_dir.join(DANE_HTML))?;
    let iframe_url = scrape::find_poverty_iframe(&dane_html)?;
    let iframe_html = fetcher.fetch_cached(&iframe_url, &input_dir.join(DANE_IFRAME_HTML))?;
    let poverty = scrape::parse_poverty_script(&iframe_html)?;
    write_poverty(&staging_dir.join(POVERTY_STAGING), &poverty)?;
    info!("Staged {} poverty row(s)", poverty.len());

    let index_html =
        fetcher.fetch_cached(MUNICIPALITIES_URL, &input_dir.join(MUNICIPALITIES_HTML))?;
    let links = scrape::parse_municipality_index(&index_html)?;
    info!("Municipality index lists {} municipality page(s)", links.len());
    let pages_dir = input_dir.join(MUNICIPALITY_PAGES_DIR);
    let mut populations = Vec::with_capacity(links.len());
    for link in &links {
        let page = fetcher.fetch_cached(&link.url, &cache_path_for(&pages_dir, &link.url))?;
        let population = scrape::parse_municipality_population(&page)
            .with_context(|| format!("{} ({})", link.municipality, link.url))?;
        populations.push(population);
    }
    write_municipalities(&staging_dir.join(MUNICIPALITY_STAGING), &links, &populations)?;
    info!("Staged {} municipality row(s)", links.len());

    Ok(ExtractSummary {
        departments_hdi: hdi.len(),
        departments_poverty: poverty.len(),
        municipalities: links.len(),
    })
}

fn write_hdi(path: &Path, rows: &[HdiRow]) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(path, false)?;
    writer.write_record([sources::HDI_ENTITY, sources::HDI_VALUE, sources::HDI_POPULATION])?;
    for row in rows {
        writer.write_record([
            row.entity.clone(),
            format_float(row.hdi),
            row.population.to_string(),
        ])?;
    }
    writer.flush().with_context(|| format!("Flushing {path:?}"))?;
    Ok(())
}

fn write_poverty(path: &Path, rows: &[PovertyRow]) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(path, true)?;
    writer.write_record([
        sources::POVERTY_DEPARTMENT,
        sources::POVERTY_PREVIOUS,
        sources::POVERTY_CURRENT,
    ])?;
    for row in rows {
        writer.write_record([
            row.department.clone(),
            format_float(row.poverty_2023),
            format_float(row.poverty_2024),
        ])?;
    }
    writer.flush().with_context(|| format!("Flushing {path:?}"))?;
    Ok(())
}

fn write_municipalities(
    path: &Path,
    links: &[MunicipalityLink],
    populations: &[String],
) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(path, true)?;
    writer.write_record([
        sources::MUNICIPALITY_DEPARTMENT,
        sources::MUNICIPALITY_NAME,
        sources::MUNICIPALITY_URL,
        sources::MUNICIPALITY_POPULATION,
    ])?;
    for (link, population) in links.iter().zip(populations) {
        writer.write_record([
            link.department.as_str(),
            link.municipality.as_str(),
            link.url.as_str(),
            population.as_str(),
        ])?;
    }
    writer.flush().with_context(|| format!("Flushing {path:?}"))?;
    Ok(())
}
