use crate::schema::hints;
use crate::table::dataset::{Cell, Dataset};

/// Immutable snapshot of a dataset's shape plus a light statistical digest.
/// Recomputed on every upload; the prompt composer trusts it verbatim, so a
/// stale descriptor is a correctness bug.
#[derive(Debug, Clone)]
pub struct SchemaDescriptor {
    schema_text: String,
    record_count: usize,
    column_count: usize,
    top_department: Option<(String, String)>,
    salary_range: Option<(String, f64, f64)>,
}

impl SchemaDescriptor {
    /// Column listing in the form the prompt embeds: one `- 'name' (type: t)`
    /// line per column, in column order.
    pub fn schema_text(&self) -> &str {
        &self.schema_text
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn column_count(&self) -> usize {
        self.column_count
    }

    pub fn top_department(&self) -> Option<&(String, String)> {
        self.top_department.as_ref()
    }

    pub fn salary_range(&self) -> Option<&(String, f64, f64)> {
        self.salary_range.as_ref()
    }

    /// Summary facts as display sentences, used both for the prompt's
    /// precomputed summary answer and for tests.
    pub fn summary_sentences(&self) -> Vec<String> {
        let mut parts = vec![format!(
            "This dataset contains {} records and {} columns.",
            self.record_count, self.column_count
        )];

        if let Some((_, mode)) = &self.top_department {
            parts.push(format!(
                "The department with the most employees is '{}'.",
                mode
            ));
        }

        if let Some((_, min, max)) = &self.salary_range {
            parts.push(format!(
                "Gross salaries range from {} to {}.",
                format_amount(*min),
                format_amount(*max)
            ));
        }

        parts
    }
}

/// Derive the descriptor for a freshly loaded dataset. Pure; no side effects.
pub fn describe(dataset: &Dataset) -> SchemaDescriptor {
    let schema_text = dataset
        .columns()
        .iter()
        .map(|c| format!("- '{}' (type: {})", c.name, c.ty.as_str()))
        .collect::<Vec<_>>()
        .join("\n");

    let top_department = hints::department_column(dataset).and_then(|idx| {
        mode_of(dataset, idx).map(|mode| (dataset.column(idx).name.clone(), mode))
    });

    let salary_range = hints::numeric_salary_column(dataset).and_then(|idx| {
        numeric_range(dataset, idx).map(|(min, max)| (dataset.column(idx).name.clone(), min, max))
    });

    SchemaDescriptor {
        schema_text,
        record_count: dataset.row_count(),
        column_count: dataset.column_count(),
        top_department,
        salary_range,
    }
}

/// Most frequent non-null value; ties break to the lexicographically
/// smallest display form so the digest is deterministic.
fn mode_of(dataset: &Dataset, idx: usize) -> Option<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();

    for cell in dataset.column_values(idx) {
        if cell.is_null() {
            continue;
        }
        let text = cell.to_text();
        match counts.iter_mut().find(|(v, _)| *v == text) {
            Some((_, n)) => *n += 1,
            None => counts.push((text, 1)),
        }
    }

    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(v, _)| v)
}

fn numeric_range(dataset: &Dataset, idx: usize) -> Option<(f64, f64)> {
    let mut range: Option<(f64, f64)> = None;
    for cell in dataset.column_values(idx) {
        if let Some(v) = cell.as_f64() {
            range = Some(match range {
                None => (v, v),
                Some((min, max)) => (min.min(v), max.max(v)),
            });
        }
    }
    range
}

/// Money display form: thousands separators, two decimals.
pub fn format_amount(value: f64) -> String {
    let negative = value < 0.0;
    let rounded = format!("{:.2}", value.abs());
    let (int_part, frac_part) = rounded.split_once('.').unwrap_or((&rounded, "00"));

    let mut grouped = String::new();
    for (i, ch) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let grouped: String = grouped.chars().rev().collect();

    if negative {
        format!("-{}.{}", grouped, frac_part)
    } else {
        format!("{}.{}", grouped, frac_part)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
                    Cell::Str("engineering".to_string()),
                    Cell::Int(61000),
                ],
                vec![
                    Cell::Str("ravi".to_string()),
                    Cell::Str("hr".to_string()),
                    Cell::Float(55000.5),
                ],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_schema_text_covers_every_column() {
        let ds = dataset();
        let descriptor = describe(&ds);
        assert_eq!(
            descriptor.schema_text().lines().count(),
            ds.column_count()
        );
        for column in ds.columns() {
            assert!(descriptor
                .schema_text()
                .contains(&format!("'{}' (type: {})", column.name, column.ty.as_str())));
        }
    }

    #[test]
    fn test_digest_facts() {
        let descriptor = describe(&dataset());
        assert_eq!(descriptor.record_count(), 3);
        let (col, mode) = descriptor.top_department().unwrap();
        assert_eq!(col, "dept");
        assert_eq!(mode, "hr");
        let (col, min, max) = descriptor.salary_range().unwrap();
        assert_eq!(col, "gross_sal");
        assert_eq!(*min, 42000.0);
        assert_eq!(*max, 61000.0);
    }

    #[test]
    fn test_textual_salary_column_has_no_range() {
        let ds = Dataset::new(
            vec!["sal_band".to_string()],
            vec![vec![Cell::Str("A".to_string())]],
        )
        .unwrap();
        assert!(describe(&ds).salary_range().is_none());
    }

    #[test]
    fn test_summary_sentences() {
        let sentences = describe(&dataset()).summary_sentences();
        assert_eq!(sentences.len(), 3);
        assert!(sentences[0].contains("3 records and 3 columns"));
        assert!(sentences[2].contains("42,000.00 to 61,000.00"));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(42000.0), "42,000.00");
        assert_eq!(format_amount(1234567.891), "1,234,567.89");
        assert_eq!(format_amount(999.0), "999.00");
        assert_eq!(format_amount(-5000.0), "-5,000.00");
    }
}
