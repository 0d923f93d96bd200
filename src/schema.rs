use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Integer,
    Float,
}

impl ColumnType {
    /// Name reported by type expectations, following the dataframe dtypes the
    /// quality report has always used.
    pub fn dtype_name(&self) -> &'static str {
        match self {
            ColumnType::String => "str",
            ColumnType::Integer => "int64",
            ColumnType::Float => "float64",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnMeta {
    pub name: String,
    pub data_type: ColumnType,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, data_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

#[derive(Debug, Clone)]
struct TypeCandidate {
    possible_integer: bool,
    possible_float: bool,
}

impl TypeCandidate {
    fn new() -> Self {
        Self {
            possible_integer: true,
            possible_float: true,
        }
    }

    fn observe(&mut self, value: &str) {
        let value = value.trim();
        if self.possible_integer && value.parse::<i64>().is_err() {
            self.possible_integer = false;
        }
        if self.possible_float && value.parse::<f64>().is_err() {
            self.possible_float = false;
        }
    }

    fn decide(&self) -> ColumnType {
        if self.possible_integer {
            ColumnType::Integer
        } else if self.possible_float {
            ColumnType::Float
        } else {
            ColumnType::String
        }
    }
}

/// Infers one type per header from raw string cells. Empty cells are nulls
/// and do not vote; an all-empty column stays textual.
pub fn infer_column_types(headers: &[String], rows: &[Vec<String>]) -> Vec<ColumnMeta> {
    let mut candidates = vec![TypeCandidate::new(); headers.len()];
    let mut seen = vec![false; headers.len()];
    for row in rows {
        for (idx, field) in row.iter().enumerate().take(headers.len()) {
            if field.is_empty() {
                continue;
            }
            seen[idx] = true;
            candidates[idx].observe(field);
        }
    }
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let data_type = if seen[idx] {
                candidates[idx].decide()
            } else {
                ColumnType::String
            };
            ColumnMeta::new(name.clone(), data_type)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn infer_column_types_prefers_narrowest_numeric_type() {
        let headers = strings(&["periodo", "idh", "depto", "empty"]);
        let rows = vec![
            strings(&["20242", "0.739", "ANTIOQUIA", ""]),
            strings(&["20241", "", "BOGOTA", ""]),
            strings(&["", "1", "CHOCO", ""]),
        ];
        let columns = infer_column_types(&headers, &rows);
        assert_eq!(columns[0].data_type, ColumnType::Integer);
        assert_eq!(columns[1].data_type, ColumnType::Float);
        assert_eq!(columns[2].data_type, ColumnType::String);
        assert_eq!(columns[3].data_type, ColumnType::String);
    }
}
