//! Column names shared across stages.

pub const PERIOD: &str = "periodo";
pub const STUDENT: &str = "estu_estudiante";

pub const SCHOOL_DEPARTMENT: &str = "cole_depto_ubicacion";
pub const SCHOOL_MUNICIPALITY: &str = "cole_mcpio_ubicacion";
pub const EXAM_DEPARTMENT: &str = "estu_depto_presentacion";
pub const EXAM_MUNICIPALITY: &str = "estu_mcpio_presentacion";
pub const RESIDENCE_DEPARTMENT: &str = "estu_depto_reside";
pub const RESIDENCE_MUNICIPALITY: &str = "estu_mcpio_reside";
pub const NATIONALITY: &str = "estu_nacionalidad";
pub const RESIDENCE_COUNTRY: &str = "estu_pais_reside";

/// Transient join keys carried by the record frame between resolution and
/// the final projection.
pub const RESIDENCE_DEPARTMENT_KEY: &str = "__estu_depto_reside_key";
pub const RESIDENCE_MUNICIPALITY_KEY: &str = "__estu_mcpio_reside_key";

pub const DEPARTMENT_POPULATION: &str = "poblacion_depto";
pub const MUNICIPALITY_POPULATION: &str = "poblacion_mcpio";
pub const DEPARTMENT_HDI: &str = "idh_depto";
pub const DEPARTMENT_POVERTY: &str = "pobreza_monetaria_depto";

pub const GLOBAL_SCORE: &str = "punt_global";
pub const MATH_SCORE: &str = "punt_matematicas";

pub const DEPARTMENT_COLUMNS: [&str; 3] = [SCHOOL_DEPARTMENT, EXAM_DEPARTMENT, RESIDENCE_DEPARTMENT];
pub const MUNICIPALITY_COLUMNS: [&str; 3] =
    [SCHOOL_MUNICIPALITY, EXAM_MUNICIPALITY, RESIDENCE_MUNICIPALITY];

pub const POPULATION_COLUMNS: [&str; 2] = [DEPARTMENT_POPULATION, MUNICIPALITY_POPULATION];
pub const INDICATOR_COLUMNS: [&str; 2] = [DEPARTMENT_HDI, DEPARTMENT_POVERTY];

/// Descriptive survey columns removed when the record file is loaded.
pub const DROPPED_RECORD_COLUMNS: &[&str] = &[
    "cole_genero",
    "cole_jornada",
    "cole_caracter",
    "estu_genero",
    "estu_grado",
    "estu_dedicacioninternet",
    "estu_dedicacionlecturadiaria",
    "estu_horassemanatrabaja",
    "fami_comecarnepescadohuevo",
    "fami_comecerealfrutoslegumbre",
    "fami_comelechederivados",
    "fami_cuartoshogar",
    "fami_educacionmadre",
    "fami_educacionpadre",
    "fami_numlibros",
    "fami_personashogar",
    "fami_tienecomputador",
    "fami_tieneinternet",
];

/// Score and percentile measures carried into the fact table.
pub const MEASURES: &[&str] = &[
    "percentil_c_naturales",
    "percentil_global",
    "percentil_ingles",
    "percentil_lectura_critica",
    "percentil_matematicas",
    "percentil_sociales_ciudadanas",
    "punt_c_naturales",
    "punt_ingles",
    "punt_lectura_critica",
    "punt_matematicas",
    "punt_sociales_ciudadanas",
    "punt_global",
];
