mod common;

use std::fs;

use common::TestWorkspace;
use icfes_dw::{
    EtlError,
    aliases::AliasCatalog,
    data::Value,
    fields,
    frame::Frame,
    io_utils::UTF8_BOM,
    pipeline::{self, References},
};

fn cell<'a>(frame: &'a Frame, row: usize, column: &str) -> Option<&'a Value> {
    let idx = frame.require_column(column).expect("column exists");
    frame.get(row, idx)
}

fn text(value: &str) -> Option<Value> {
    Some(Value::String(value.to_string()))
}

#[test]
fn transform_preserves_every_record_and_resolves_bogota() {
    let workspace = TestWorkspace::new();
    let config = workspace.seed();
    let outcome = pipeline::transform(&config).expect("transform");
    let frame = &outcome.frame;

    assert_eq!(frame.rows.len(), 6);
    assert_eq!(
        cell(frame, 0, fields::RESIDENCE_DEPARTMENT).cloned(),
        text("BOGOTÁ, D.C.")
    );
    assert_eq!(
        cell(frame, 0, fields::RESIDENCE_MUNICIPALITY).cloned(),
        text("BOGOTA")
    );
    assert_eq!(
        cell(frame, 0, fields::DEPARTMENT_POPULATION).cloned(),
        Some(Value::Integer(7_968_095))
    );
    assert_eq!(
        cell(frame, 0, fields::MUNICIPALITY_POPULATION).cloned(),
        Some(Value::Integer(7_968_095))
    );
    assert_eq!(
        cell(frame, 0, fields::DEPARTMENT_POVERTY).cloned(),
        Some(Value::Float(22.5))
    );
    assert!(!frame.has_column(fields::RESIDENCE_DEPARTMENT_KEY));
    assert!(!frame.has_column("estu_genero"));
}

#[test]
fn merge_summaries_count_unmatched_rows() {
    let workspace = TestWorkspace::new();
    let config = workspace.seed();
    let outcome = pipeline::transform(&config).expect("transform");

    let department = &outcome.joins[0];
    assert_eq!((department.rows, department.matched, department.unmatched), (6, 5, 1));
    let municipality = &outcome.joins[1];
    assert_eq!(
        (municipality.rows, municipality.matched, municipality.unmatched),
        (6, 4, 2)
    );
}

#[test]
fn municipality_without_equivalent_stays_null() {
    let workspace = TestWorkspace::new();
    let config = workspace.seed();
    let outcome = pipeline::transform(&config).expect("transform");
    let frame = &outcome.frame;

    assert_eq!(
        cell(frame, 4, fields::RESIDENCE_MUNICIPALITY).cloned(),
        text("RIO IRO")
    );
    assert_eq!(cell(frame, 4, fields::MUNICIPALITY_POPULATION), None);
    assert_eq!(
        cell(frame, 4, fields::DEPARTMENT_HDI).cloned(),
        Some(Value::Float(0.692))
    );
    assert_eq!(outcome.nulls_after.nulls_in(fields::MUNICIPALITY_POPULATION), 1);
}

#[test]
fn foreign_residents_are_zero_filled() {
    let workspace = TestWorkspace::new();
    let config = workspace.seed();
    let outcome = pipeline::transform(&config).expect("transform");
    let frame = &outcome.frame;

    assert_eq!(outcome.zero_filled, 1);
    assert_eq!(
        cell(frame, 3, fields::DEPARTMENT_POPULATION).cloned(),
        Some(Value::Integer(0))
    );
    assert_eq!(
        cell(frame, 3, fields::MUNICIPALITY_POPULATION).cloned(),
        Some(Value::Integer(0))
    );
    assert_eq!(cell(frame, 3, fields::DEPARTMENT_HDI).cloned(), Some(Value::Float(0.0)));
    assert_eq!(
        cell(frame, 3, fields::DEPARTMENT_POVERTY).cloned(),
        Some(Value::Float(0.0))
    );
    assert_eq!(outcome.nulls_before.nulls_in(fields::DEPARTMENT_HDI), 1);
    assert_eq!(outcome.nulls_after.nulls_in(fields::DEPARTMENT_HDI), 0);
}

#[test]
fn tumaco_keeps_its_record_spelling_and_matches_through_the_alias() {
    let workspace = TestWorkspace::new();
    let config = workspace.seed();
    let outcome = pipeline::transform(&config).expect("transform");
    for column in fields::MUNICIPALITY_COLUMNS {
        assert_eq!(cell(&outcome.frame, 5, column).cloned(), text("TUMACO"), "{column}");
    }
    assert_eq!(
        cell(&outcome.frame, 5, fields::MUNICIPALITY_POPULATION).cloned(),
        Some(Value::Integer(257_052))
    );
}

#[test]
fn curated_csv_has_signature_and_fixed_column_order() {
    let workspace = TestWorkspace::new();
    let config = workspace.seed();
    pipeline::transform(&config).expect("transform");

    let bytes = fs::read(config.curated_csv()).expect("curated csv");
    assert!(bytes.starts_with(UTF8_BOM));
    let contents = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).expect("utf-8");
    let header: Vec<&str> = contents.lines().next().expect("header").split(',').collect();
    assert_eq!(
        &header[..18],
        &[
            "periodo",
            "estu_estudiante",
            "cole_area_ubicacion",
            "cole_bilingue",
            "cole_calendario",
            "cole_naturaleza",
            "cole_depto_ubicacion",
            "cole_mcpio_ubicacion",
            "estu_depto_presentacion",
            "estu_mcpio_presentacion",
            "estu_depto_reside",
            "estu_mcpio_reside",
            "poblacion_depto",
            "poblacion_mcpio",
            "estu_nacionalidad",
            "estu_pais_reside",
            "idh_depto",
            "pobreza_monetaria_depto",
        ]
    );
    assert_eq!(header.last(), Some(&"punt_global"));
    assert!(contents.contains("\"BOGOTÁ, D.C.\""));
}

#[test]
fn transform_records_never_changes_row_count_with_unique_references() {
    let workspace = TestWorkspace::new();
    let config = workspace.seed();
    let catalog = AliasCatalog::default();
    let references =
        References::load(&config, encoding_rs::UTF_8, &catalog).expect("references");
    let records = Frame::read_csv(&config.records_file, encoding_rs::UTF_8).expect("records");
    let before = records.rows.len();
    let outcome = pipeline::transform_records(records, &references, &catalog).expect("transform");
    assert_eq!(outcome.frame.rows.len(), before);
    for summary in &outcome.joins {
        assert_eq!(summary.matched + summary.unmatched, before);
    }
}

#[test]
fn run_without_extract_validates_and_loads() {
    let workspace = TestWorkspace::new();
    let config = workspace.seed();
    pipeline::run_all(&config, true).expect("pipeline run");

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(config.report_json()).expect("report"))
            .expect("report json");
    assert_eq!(report["shape"]["rows"], 6);
    assert_eq!(report["expectations"]["rule_global_ge_math"]["success"], true);
    assert_eq!(report["expectations"]["type_periodo_int64"]["observed_value"], "int64");

    let conn = rusqlite::Connection::open(&config.warehouse).expect("warehouse");
    let count = |table: &str| -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .expect("count")
    };
    assert_eq!(count("fact_icfes"), 6);
    assert_eq!(count("dim_departamento"), 5);
    assert_eq!(count("dim_municipio"), 5);
    assert_eq!(count("dim_fecha"), 2);
}

#[test]
fn records_sharing_a_department_tuple_share_a_key() {
    let workspace = TestWorkspace::new();
    let config = workspace.seed();
    pipeline::transform(&config).expect("transform");
    pipeline::load(&config).expect("load");

    let conn = rusqlite::Connection::open(&config.warehouse).expect("warehouse");
    let keys: Vec<i64> = conn
        .prepare("SELECT id_departamento FROM fact_icfes ORDER BY id_hecho")
        .expect("prepare")
        .query_map([], |row| row.get(0))
        .expect("query")
        .collect::<Result<_, _>>()
        .expect("rows");
    assert_eq!(keys, vec![1, 2, 2, 3, 4, 5]);
    let name: String = conn
        .query_row(
            "SELECT estu_depto_reside FROM dim_departamento WHERE id_departamento = 2",
            [],
            |row| row.get(0),
        )
        .expect("dimension row");
    assert_eq!(name, "ANTIOQUIA");
}

#[test]
fn unparseable_population_text_is_a_parse_error() {
    let workspace = TestWorkspace::new();
    let config = workspace.seed();
    workspace.write(
        "staging/poblacion_municipios.csv",
        "Departamento,Municipio,URL,Poblacion\nAntioquia,Medellín,u,sin dato\n",
    );
    let err = pipeline::transform(&config).unwrap_err();
    assert!(
        matches!(err.downcast_ref::<EtlError>(), Some(EtlError::Parse { .. })),
        "{err:#}"
    );
}

#[test]
fn load_rejects_incomplete_curated_table_without_touching_the_warehouse() {
    let workspace = TestWorkspace::new();
    let config = workspace.seed();
    pipeline::transform(&config).expect("transform");
    pipeline::load(&config).expect("first load");

    fs::write(config.curated_csv(), "periodo,punt_global\n20242,300\n").expect("overwrite");
    let err = pipeline::load(&config).unwrap_err();
    assert!(format!("{err:#}").contains("Building dimension"), "{err:#}");

    let conn = rusqlite::Connection::open(&config.warehouse).expect("warehouse");
    let facts: i64 = conn
        .query_row("SELECT COUNT(*) FROM fact_icfes", [], |row| row.get(0))
        .expect("count");
    assert_eq!(facts, 6);
}
