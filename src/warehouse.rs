//! SQLite warehouse sink.
//!
//! The schema script is executed verbatim; table and column names come from
//! the dimension specs, so the script must declare matching tables. Each
//! logical batch (schema, dimensions, facts) runs in its own transaction.

use std::{fs, path::Path};

use log::{debug, info};
use rusqlite::{
    Connection, ToSql, params_from_iter,
    types::{ToSqlOutput, Value as SqlValue},
};

use crate::{
    data::Value,
    error::EtlError,
    frame::Frame,
    star::{Dimension, FACT_TABLE, StarSchema},
};

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::String(s) => ToSqlOutput::from(s.as_str()),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
        })
    }
}

pub struct Warehouse {
    conn: Connection,
}

impl Warehouse {
    pub fn open(path: &Path) -> Result<Self, EtlError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| EtlError::Warehouse {
                message: format!("cannot create directory {parent:?}: {err}"),
                source: None,
            })?;
        }
        let conn = Connection::open(path)
            .map_err(|err| EtlError::warehouse(format!("cannot open {path:?}"), err))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|err| EtlError::warehouse("cannot enable foreign keys", err))?;
        info!("Connected to warehouse {path:?}");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, EtlError> {
        let conn = Connection::open_in_memory()
            .map_err(|err| EtlError::warehouse("cannot open in-memory database", err))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|err| EtlError::warehouse("cannot enable foreign keys", err))?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Reads and executes the schema script. Nothing is written when the
    /// script is missing.
    pub fn apply_schema(&mut self, script: &Path) -> Result<(), EtlError> {
        let sql = fs::read_to_string(script).map_err(|err| EtlError::Warehouse {
            message: format!("cannot read schema script {script:?}: {err}"),
            source: None,
        })?;
        self.apply_schema_sql(&sql)?;
        info!("Schema script {script:?} applied");
        Ok(())
    }

    pub fn apply_schema_sql(&mut self, sql: &str) -> Result<(), EtlError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|err| EtlError::warehouse("cannot start schema transaction", err))?;
        tx.execute_batch(sql)
            .map_err(|err| EtlError::warehouse("schema script failed", err))?;
        tx.commit()
            .map_err(|err| EtlError::warehouse("cannot commit schema", err))
    }

    /// Inserts every dimension with explicit 1-based ids in one transaction.
    pub fn load_dimensions(&mut self, dimensions: &[Dimension]) -> Result<usize, EtlError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|err| EtlError::warehouse("cannot start dimension transaction", err))?;
        let mut inserted = 0usize;
        for dimension in dimensions {
            let mut columns = vec![dimension.spec.key.clone()];
            columns.extend(dimension.columns.iter().map(|c| c.name.clone()));
            let sql = insert_statement(&dimension.spec.table, &columns);
            let mut stmt = tx.prepare(&sql).map_err(|err| {
                EtlError::warehouse(format!("cannot prepare insert into {}", dimension.spec.table), err)
            })?;
            for (idx, row) in dimension.rows.iter().enumerate() {
                let id = Some(Value::Integer(idx as i64 + 1));
                stmt.execute(params_from_iter(std::iter::once(&id).chain(row.iter())))
                    .map_err(|err| {
                        EtlError::warehouse(
                            format!("insert into {} failed at id {}", dimension.spec.table, idx + 1),
                            err,
                        )
                    })?;
            }
            debug!(
                "Inserted {} row(s) into {}",
                dimension.rows.len(),
                dimension.spec.table
            );
            inserted += dimension.rows.len();
        }
        tx.commit()
            .map_err(|err| EtlError::warehouse("cannot commit dimensions", err))?;
        info!("Dimensions loaded: {inserted} row(s) across {} table(s)", dimensions.len());
        Ok(inserted)
    }

    pub fn load_facts(&mut self, facts: &Frame) -> Result<usize, EtlError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|err| EtlError::warehouse("cannot start fact transaction", err))?;
        {
            let sql = insert_statement(FACT_TABLE, &facts.headers());
            let mut stmt = tx
                .prepare(&sql)
                .map_err(|err| EtlError::warehouse(format!("cannot prepare insert into {FACT_TABLE}"), err))?;
            for (idx, row) in facts.rows.iter().enumerate() {
                stmt.execute(params_from_iter(row.iter())).map_err(|err| {
                    EtlError::warehouse(format!("insert into {FACT_TABLE} failed at row {}", idx + 1), err)
                })?;
            }
        }
        tx.commit()
            .map_err(|err| EtlError::warehouse("cannot commit facts", err))?;
        info!("Fact table loaded: {} row(s)", facts.rows.len());
        Ok(facts.rows.len())
    }

    pub fn load_star(&mut self, star: &StarSchema) -> Result<(usize, usize), EtlError> {
        let dimensions = self.load_dimensions(&star.dimensions)?;
        let facts = self.load_facts(&star.facts)?;
        Ok((dimensions, facts))
    }

    pub fn count_rows(&self, table: &str) -> Result<i64, EtlError> {
        self.conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", quote_ident(table)), [], |row| {
                row.get(0)
            })
            .map_err(|err| EtlError::warehouse(format!("cannot count rows in {table}"), err))
    }
}

fn insert_statement(table: &str, columns: &[String]) -> String {
    let names: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        quote_ident(table),
        names.join(", ")
    )
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_statement_quotes_identifiers() {
        let sql = insert_statement("dim_fecha", &["id_fecha".into(), "periodo".into()]);
        assert_eq!(
            sql,
            "INSERT INTO \"dim_fecha\" (\"id_fecha\", \"periodo\") VALUES (?, ?)"
        );
    }

    #[test]
    fn invalid_schema_leaves_database_untouched() {
        let mut warehouse = Warehouse::open_in_memory().unwrap();
        let err = warehouse
            .apply_schema_sql("CREATE TABLE ok (id INTEGER); CREATE TABLE broken (")
            .unwrap_err();
        assert!(matches!(err, EtlError::Warehouse { .. }));
        let tables: i64 = warehouse
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 0);
    }
}
