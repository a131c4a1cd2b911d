use crate::table::dataset::{Cell, ColumnType, Dataset};
use once_cell::sync::Lazy;
use regex::Regex;

/// Honorific prefixes stripped from name-like columns before text search.
static HONORIFIC_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(mr\.?|ms\.?|mrs\.?|dr\.?|miss|m/s)\s*").unwrap());

/// Everything that is not a digit or decimal point in a money-like field.
static NON_NUMERIC_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\d.]").unwrap());

/// Column name of the derived searchable name column.
pub const CLEAN_NAME_COLUMN: &str = "clean_emp_name";

const MONEY_NEEDLES: &[&str] = &["sal", "amount", "price", "cost", "value"];

pub fn is_money_like(name: &str) -> bool {
    let lowered = name.to_lowercase();
    MONEY_NEEDLES.iter().any(|needle| lowered.contains(needle))
}

/// Post-ingestion cleaning pass. Derives a lowercase, honorific-free
/// companion for the first name-like column and coerces textual money-like
/// columns to numbers. Runs exactly once, right after load.
pub fn prepare(dataset: &mut Dataset) {
    derive_clean_names(dataset);
    scrub_money_columns(dataset);
}

fn derive_clean_names(dataset: &mut Dataset) {
    if dataset.column_index(CLEAN_NAME_COLUMN).is_some() {
        return;
    }

    let name_idx = dataset
        .columns()
        .iter()
        .position(|c| c.name.contains("name"));

    let Some(idx) = name_idx else {
        return;
    };

    tracing::info!(column = %dataset.column(idx).name, "deriving searchable name column");

    let cleaned: Vec<Cell> = dataset
        .column_values(idx)
        .map(|cell| match cell {
            Cell::Null => Cell::Null,
            other => {
                let text = other.to_text();
                let stripped = HONORIFIC_REGEX.replace(&text, "");
                Cell::Str(stripped.trim().to_lowercase())
            }
        })
        .collect();

    // length always matches, push_column cannot fail here
    let _ = dataset.push_column(CLEAN_NAME_COLUMN.to_string(), cleaned);
}

fn scrub_money_columns(dataset: &mut Dataset) {
    let targets: Vec<usize> = dataset
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, c)| is_money_like(&c.name) && c.ty == ColumnType::Text)
        .map(|(i, _)| i)
        .collect();

    for idx in targets {
        tracing::info!(column = %dataset.column(idx).name, "coercing money-like column to numeric");

        let scrubbed: Vec<Cell> = dataset
            .column_values(idx)
            .map(|cell| match cell {
                Cell::Null => Cell::Null,
                Cell::Int(i) => Cell::Int(*i),
                Cell::Float(f) => Cell::Float(*f),
                other => {
                    let text = other.to_text();
                    let digits = NON_NUMERIC_REGEX.replace_all(&text, "");
                    match digits.parse::<f64>() {
                        Ok(f) => Cell::Float(f),
                        Err(_) => Cell::Null,
                    }
                }
            })
            .collect();

        dataset.replace_column(idx, scrubbed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_names_strip_honorifics() {
        let mut ds = Dataset::new(
            vec!["emp_name".to_string()],
            vec![
                vec![Cell::Str("Mr. Mohan".to_string())],
                vec![Cell::Str("MRS Asha Rao".to_string())],
                vec![Cell::Null],
            ],
        )
        .unwrap();

        prepare(&mut ds);

        let idx = ds.column_index(CLEAN_NAME_COLUMN).unwrap();
        let values: Vec<_> = ds.column_values(idx).cloned().collect();
        assert_eq!(values[0], Cell::Str("mohan".to_string()));
        assert_eq!(values[1], Cell::Str("asha rao".to_string()));
        assert_eq!(values[2], Cell::Null);
    }

    #[test]
    fn test_money_column_scrubbed_to_numeric() {
        let mut ds = Dataset::new(
            vec!["gross_sal".to_string()],
            vec![
                vec![Cell::Str("Rs. 42,000".to_string())],
                vec![Cell::Str("55000.50".to_string())],
                vec![Cell::Str("n/a".to_string())],
            ],
        )
        .unwrap();

        prepare(&mut ds);

        assert!(ds.column(0).ty.is_numeric());
        let values: Vec<_> = ds.column_values(0).cloned().collect();
        assert_eq!(values[0], Cell::Float(42000.0));
        assert_eq!(values[1], Cell::Float(55000.5));
        assert_eq!(values[2], Cell::Null);
    }

    #[test]
    fn test_numeric_money_column_untouched() {
        let mut ds = Dataset::new(
            vec!["price".to_string()],
            vec![vec![Cell::Int(10)], vec![Cell::Int(20)]],
        )
        .unwrap();

        prepare(&mut ds);

        assert_eq!(ds.column(0).ty, ColumnType::Integer);
    }

    #[test]
    fn test_no_name_column_no_derived_column() {
        let mut ds = Dataset::new(vec!["dept".to_string()], vec![vec![Cell::Str("hr".into())]])
            .unwrap();
        prepare(&mut ds);
        assert!(ds.column_index(CLEAN_NAME_COLUMN).is_none());
    }
}
