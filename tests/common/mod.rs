#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use icfes_dw::{
    config::PipelineConfig,
    fetch::{HttpResponse, Sleeper, Transport},
};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace (creating parent
    /// directories) and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Config whose directories all live inside the workspace.
    pub fn config(&self) -> PipelineConfig {
        let root = self.path();
        PipelineConfig {
            input_dir: root.join("input"),
            staging_dir: root.join("staging"),
            output_dir: root.join("output"),
            records_file: root.join("input").join("data_icfes_2024.csv"),
            schema_script: schema_script(),
            warehouse: root.join("output").join("dw.sqlite"),
            aliases: None,
            encoding: None,
        }
    }

    /// Writes the sample records and the three staged reference tables.
    pub fn seed(&self) -> PipelineConfig {
        self.write("input/data_icfes_2024.csv", RECORDS);
        self.write("staging/idh_departamentos.csv", HDI);
        self.write("staging/dane_pobreza_monetaria.csv", &format!("\u{feff}{POVERTY}"));
        self.write("staging/poblacion_municipios.csv", &format!("\u{feff}{MUNICIPALITIES}"));
        self.config()
    }
}

/// The schema script shipped with the crate.
pub fn schema_script() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("sql")
        .join("schema.sql")
}

/// Row order: Bogotá, two Antioquia/Medellín spellings, a foreign resident,
/// a Chocó student from RIO IRO (no municipal equivalent), and Tumaco.
pub const RECORDS: &str = "\
periodo,estu_estudiante,estu_genero,cole_area_ubicacion,cole_bilingue,cole_calendario,cole_naturaleza,cole_depto_ubicacion,cole_mcpio_ubicacion,estu_depto_presentacion,estu_mcpio_presentacion,estu_depto_reside,estu_mcpio_reside,estu_nacionalidad,estu_pais_reside,estu_inse_individual,estu_nse_individual,estu_nse_establecimiento,fami_estratovivienda,percentil_c_naturales,percentil_global,percentil_ingles,percentil_lectura_critica,percentil_matematicas,percentil_sociales_ciudadanas,punt_c_naturales,punt_ingles,punt_lectura_critica,punt_matematicas,punt_sociales_ciudadanas,punt_global
20242,ESTUDIANTE,F,URBANO,N,A,OFICIAL,BOGOTA,BOGOTA,BOGOTA,BOGOTA,BOGOTA,BOGOTA,COLOMBIA,COLOMBIA,55.2,NSE3,NSE3,Estrato 3,70,75,60,80,72,68,62,58,65,280,60,310
20242,ESTUDIANTE,M,URBANO,N,A,NO OFICIAL,ANTIOQUIA,MEDELLIN,ANTIOQUIA,MEDELLIN,ANTIOQUIA,MEDELLIN,COLOMBIA,COLOMBIA,60.1,NSE4,NSE4,Estrato 4,80,82,75,85,79,81,66,70,68,71,64,339
20242,ESTUDIANTE,F,URBANO,N,A,OFICIAL,ANTIOQUIA,MEDELLÍN,Antioquia,Medellín,Antioquia,Medellín,COLOMBIA,COLOMBIA,48.7,NSE2,NSE2,Estrato 2,40,45,38,50,42,47,48,45,52,47,50,243
20242,ESTUDIANTE,M,URBANO,N,A,NO OFICIAL,BOGOTÁ,BOGOTÁ,BOGOTÁ,BOGOTÁ,EXTRANJERO,EXTRANJERO,VENEZUELA,VENEZUELA,50.0,NSE3,NSE3,Estrato 2,55,57,52,60,58,54,55,52,57,56,53,272
20241,ESTUDIANTE,F,RURAL,N,A,OFICIAL,CHOCO,RIO IRO,CHOCO,RIO IRO,CHOCO,RIO IRO,COLOMBIA,COLOMBIA,35.5,NSE1,NSE1,Estrato 1,20,18,15,22,25,19,40,38,42,41,39,200
20241,ESTUDIANTE,M,URBANO,N,A,OFICIAL,NARIÑO,TUMACO,NARIÑO,TUMACO,NARIÑO,TUMACO,COLOMBIA,COLOMBIA,,NSE2,NSE2,,35,33,30,36,34,31,45,40,44,43,42,214
";

pub const HDI: &str = "\
Entidad,IDH,Población
Bogotá,0.904,7968095
Antioquia,0.783,6848366
Chocó,0.692,544764
Nariño,0.716,1630592
";

pub const POVERTY: &str = "\
Departamento,Pobreza_2023,Pobreza_2024
Antioquia,25.4,23.0
Bogotá D.C.,24.1,22.5
Chocó,65.2,62.9
Nariño,50.1,48.0
";

pub const MUNICIPALITIES: &str = "\
Departamento,Municipio,URL,Poblacion
Cundinamarca,Bogotá,https://www.municipios.com.co/bogota,Población 7.968.095
Antioquia,Medellín,https://www.municipios.com.co/antioquia/medellin,2.612.958
Chocó,Río Iró,https://www.municipios.com.co/choco/rio-iro,9.000
Nariño,San Andrés de Tumaco,https://www.municipios.com.co/narino/tumaco,257.052
";

/// Scripted transport: each URL answers from its own queue, and a URL with
/// an empty or missing queue answers 404. Every request is recorded.
#[derive(Default)]
pub struct MockTransport {
    responses: RefCell<HashMap<String, VecDeque<Result<HttpResponse, String>>>>,
    pub requests: RefCell<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, status: u16, body: &str) -> &Self {
        self.push(url, Ok(response(status, None, body)))
    }

    pub fn throttle(&self, url: &str, status: u16, retry_after: &str) -> &Self {
        self.push(url, Ok(response(status, Some(retry_after), "")))
    }

    pub fn fail(&self, url: &str, message: &str) -> &Self {
        self.push(url, Err(message.to_string()))
    }

    fn push(&self, url: &str, entry: Result<HttpResponse, String>) -> &Self {
        self.responses
            .borrow_mut()
            .entry(url.to_string())
            .or_default()
            .push_back(entry);
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl Transport for &MockTransport {
    fn get(&self, url: &str) -> anyhow::Result<HttpResponse> {
        self.requests.borrow_mut().push(url.to_string());
        let next = self
            .responses
            .borrow_mut()
            .get_mut(url)
            .and_then(VecDeque::pop_front);
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Ok(response(404, None, "")),
        }
    }
}

fn response(status: u16, retry_after: Option<&str>, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        retry_after: retry_after.map(str::to_string),
        body: body.to_string(),
    }
}

/// Records requested sleeps instead of blocking.
#[derive(Default)]
pub struct RecordingSleeper {
    pub sleeps: RefCell<Vec<Duration>>,
}

impl Sleeper for &RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }
}
