use crate::error::{Result, TabchatError};
use serde::Serialize;

/// A single cell value. Uploaded files only ever produce these five kinds;
/// everything the sandbox computes stays within them too.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Cell::Int(_) | Cell::Float(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Display form used for rendered tables and scalar answers.
    pub fn to_text(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Bool(b) => b.to_string(),
            Cell::Int(i) => i.to_string(),
            Cell::Float(f) => format!("{}", f),
            Cell::Str(s) => s.clone(),
        }
    }

    /// Parse a raw text field the way uploads do: integer, then float,
    /// then boolean, otherwise text. Empty fields are null.
    pub fn from_field(raw: &str) -> Cell {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Null;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Cell::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return Cell::Float(f);
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "true" => Cell::Bool(true),
            "false" => Cell::Bool(false),
            _ => Cell::Str(trimmed.to_string()),
        }
    }
}

/// Declared type of a column, derived from its cells after cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnType {
    Integer,
    Float,
    Boolean,
    Text,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Text => "text",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

/// The loaded table: ordered, named, typed columns with row-major storage.
/// One live dataset per session; replacing it invalidates prior context.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: Vec<Vec<Cell>>,
}

impl Dataset {
    pub fn new(names: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != names.len() {
                return Err(TabchatError::UploadParseFailed(format!(
                    "row {} has {} fields, expected {}",
                    idx + 1,
                    row.len(),
                    names.len()
                )));
            }
        }

        let columns = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Column {
                name,
                ty: derive_column_type(rows.iter().map(|r| &r[i])),
            })
            .collect();

        Ok(Self { columns, rows })
    }

    /// Build a view over the same columns with a subset of rows, preserving
    /// both column order and row order.
    pub fn with_rows(&self, rows: Vec<Vec<Cell>>) -> Dataset {
        Dataset {
            columns: self.columns.clone(),
            rows,
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, idx: usize) -> &Column {
        &self.columns[idx]
    }

    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Cell> {
        self.rows.iter().map(move |row| &row[idx])
    }

    /// Append a derived column; the values must line up with existing rows.
    pub fn push_column(&mut self, name: String, values: Vec<Cell>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(TabchatError::UploadParseFailed(format!(
                "derived column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }
        let ty = derive_column_type(values.iter());
        self.columns.push(Column { name, ty });
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }

    /// Replace a column's cells in place and re-derive its type.
    pub fn replace_column(&mut self, idx: usize, values: Vec<Cell>) {
        debug_assert_eq!(values.len(), self.rows.len());
        self.columns[idx].ty = derive_column_type(values.iter());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[idx] = value;
        }
    }
}

fn derive_column_type<'a>(cells: impl Iterator<Item = &'a Cell>) -> ColumnType {
    let mut saw_int = false;
    let mut saw_float = false;
    let mut saw_bool = false;
    let mut saw_text = false;

    for cell in cells {
        match cell {
            Cell::Null => {}
            Cell::Int(_) => saw_int = true,
            Cell::Float(_) => saw_float = true,
            Cell::Bool(_) => saw_bool = true,
            Cell::Str(_) => saw_text = true,
        }
    }

    if saw_text {
        ColumnType::Text
    } else if saw_bool && !saw_int && !saw_float {
        ColumnType::Boolean
    } else if saw_float {
        ColumnType::Float
    } else if saw_int {
        ColumnType::Integer
    } else {
        // all-null column
        ColumnType::Text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(
            vec!["name".to_string(), "gross_sal".to_string()],
            vec![
                vec![Cell::Str("Mr. Mohan".to_string()), Cell::Int(42000)],
                vec![Cell::Str("Asha".to_string()), Cell::Int(55000)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_column_types_derived() {
        let ds = sample();
        assert_eq!(ds.column(0).ty, ColumnType::Text);
        assert_eq!(ds.column(1).ty, ColumnType::Integer);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let result = Dataset::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![Cell::Int(1)]],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_mixed_numeric_column_is_float() {
        let ds = Dataset::new(
            vec!["v".to_string()],
            vec![vec![Cell::Int(1)], vec![Cell::Float(2.5)], vec![Cell::Null]],
        )
        .unwrap();
        assert_eq!(ds.column(0).ty, ColumnType::Float);
    }

    #[test]
    fn test_from_field_parses_in_order() {
        assert_eq!(Cell::from_field("42"), Cell::Int(42));
        assert_eq!(Cell::from_field("4.5"), Cell::Float(4.5));
        assert_eq!(Cell::from_field("true"), Cell::Bool(true));
        assert_eq!(Cell::from_field("  x "), Cell::Str("x".to_string()));
        assert_eq!(Cell::from_field("   "), Cell::Null);
    }

    #[test]
    fn test_push_column_length_checked() {
        let mut ds = sample();
        assert!(ds
            .push_column("extra".to_string(), vec![Cell::Int(1)])
            .is_err());
        assert!(ds
            .push_column("extra".to_string(), vec![Cell::Int(1), Cell::Int(2)])
            .is_ok());
        assert_eq!(ds.column_count(), 3);
    }
}
