use crate::expr::eval::Evaluated;
use crate::schema::{descriptor::format_amount, hints};
use crate::table::dataset::Dataset;

/// The fixed set of response variants. Classification is total and ordered:
/// every executed value maps to exactly one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultVariant {
    Table {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    NamedSeries {
        label: String,
        value: String,
        rows: Vec<(String, String)>,
    },
    Sequence {
        values: Vec<String>,
    },
    Scalar(String),
    Empty {
        /// Formatted dataset maximum of a recognized salary column, present
        /// only when the heuristic below fires.
        max_salary: Option<String>,
    },
}

/// Map an executed value onto its response variant.
///
/// `expression` is the executed expression text; it feeds the empty-result
/// enrichment, which fires only when a numeric salary-like column's name
/// appears verbatim in the expression. That is a string-match heuristic, not
/// semantic analysis of the query.
pub fn normalize(value: Evaluated, dataset: &Dataset, expression: &str) -> ResultVariant {
    match value {
        Evaluated::Frame(frame) => {
            if frame.row_count() == 0 {
                ResultVariant::Empty {
                    max_salary: salary_context(dataset, expression),
                }
            } else {
                ResultVariant::Table {
                    columns: frame.column_names(),
                    rows: frame
                        .rows()
                        .iter()
                        .map(|row| row.iter().map(|c| c.to_text()).collect())
                        .collect(),
                }
            }
        }
        Evaluated::Counts { label, pairs } => ResultVariant::NamedSeries {
            label: label.unwrap_or_else(|| "Value".to_string()),
            value: "Count".to_string(),
            rows: pairs
                .into_iter()
                .map(|(cell, count)| (cell.to_text(), count.to_string()))
                .collect(),
        },
        Evaluated::Series { name, values } => ResultVariant::NamedSeries {
            // a bare column keeps its positional index as the label side
            label: "Value".to_string(),
            value: if name.is_empty() {
                "Count".to_string()
            } else {
                name
            },
            rows: values
                .iter()
                .enumerate()
                .map(|(i, cell)| (i.to_string(), cell.to_text()))
                .collect(),
        },
        Evaluated::List(values) => ResultVariant::Sequence {
            values: values.iter().map(|c| c.to_text()).collect(),
        },
        Evaluated::Scalar(cell) => ResultVariant::Scalar(cell.to_text()),
    }
}

fn salary_context(dataset: &Dataset, expression: &str) -> Option<String> {
    let idx = hints::numeric_salary_column(dataset)?;
    let name = &dataset.column(idx).name;
    if !expression.contains(name.as_str()) {
        return None;
    }

    dataset
        .column_values(idx)
        .filter_map(|c| c.as_f64())
        .fold(None::<f64>, |best, v| {
            Some(best.map_or(v, |b| b.max(v)))
        })
        .map(format_amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{evaluate, parse_expression};
    use crate::table::dataset::Cell;

    fn dataset() -> Dataset {
        Dataset::new(
            vec![
                "emp_name".to_string(),
                "dept".to_string(),
                "gross_sal".to_string(),
            ],
            vec![
                vec![
                    Cell::Str("mohan".to_string()),
                    Cell::Str("hr".to_string()),
                    Cell::Int(42000),
                ],
                vec![
                    Cell::Str("asha".to_string()),
                    Cell::Str("hr".to_string()),
                    Cell::Int(61000),
                ],
            ],
        )
        .unwrap()
    }

    fn run(input: &str) -> ResultVariant {
        let ds = dataset();
        let value = evaluate(&parse_expression(input).unwrap(), &ds).unwrap();
        normalize(value, &ds, input)
    }

    #[test]
    fn test_zero_row_frame_normalizes_to_empty() {
        let variant = run("df.query('gross_sal > 99999')");
        // expression names the salary column, so the enrichment fires
        assert_eq!(
            variant,
            ResultVariant::Empty {
                max_salary: Some("61,000.00".to_string())
            }
        );
    }

    #[test]
    fn test_enrichment_requires_verbatim_column_mention() {
        let ds = dataset();
        let value =
            evaluate(&parse_expression("df.query('gross_sal > 99999')").unwrap(), &ds).unwrap();
        // same empty frame, but an expression that never names the column
        let variant = normalize(value, &ds, "df[df['dept'] == 'zzz']");
        assert_eq!(variant, ResultVariant::Empty { max_salary: None });
    }

    #[test]
    fn test_table_preserves_row_and_column_order() {
        let variant = run("df.query('gross_sal > 1')");
        let ResultVariant::Table { columns, rows } = variant else {
            panic!()
        };
        assert_eq!(columns, vec!["emp_name", "dept", "gross_sal"]);
        assert_eq!(rows[0][0], "mohan");
        assert_eq!(rows[1][0], "asha");
    }

    #[test]
    fn test_counts_normalize_to_named_series() {
        let variant = run("df['dept'].value_counts().reset_index()");
        assert_eq!(
            variant,
            ResultVariant::NamedSeries {
                label: "dept".to_string(),
                value: "Count".to_string(),
                rows: vec![("hr".to_string(), "2".to_string())],
            }
        );
    }

    #[test]
    fn test_bare_column_normalizes_with_placeholder_label() {
        let variant = run("df['emp_name']");
        let ResultVariant::NamedSeries { label, value, rows } = variant else {
            panic!()
        };
        assert_eq!(label, "Value");
        assert_eq!(value, "emp_name");
        assert_eq!(rows[0], ("0".to_string(), "mohan".to_string()));
    }

    #[test]
    fn test_list_normalizes_to_sequence() {
        let variant = run("df[df['dept'] == 'hr']['emp_name'].tolist()");
        assert_eq!(
            variant,
            ResultVariant::Sequence {
                values: vec!["mohan".to_string(), "asha".to_string()]
            }
        );
    }

    #[test]
    fn test_scalar_normalizes_to_text() {
        assert_eq!(run("len(df)"), ResultVariant::Scalar("2".to_string()));
    }

    #[test]
    fn test_classification_is_idempotent_per_category() {
        // same question against unchanged data lands in the same variant
        let first = std::mem::discriminant(&run("df.query('gross_sal > 1')"));
        let second = std::mem::discriminant(&run("df.query('gross_sal > 1')"));
        assert_eq!(first, second);
    }
}
