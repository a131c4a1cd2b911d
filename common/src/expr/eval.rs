use crate::expr::ast::{
    AggFunc, CmpOp, Expr, Literal, Mask, NumberFormat, Segment, Step, Template, TextMethod,
};
use crate::table::dataset::{Cell, Dataset};
use std::fmt;

/// Evaluation failure: the expression parsed but could not run against this
/// dataset. Reported to the asker, never propagated as a crash.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalError(pub String);

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for EvalError {}

type EResult<T> = Result<T, EvalError>;

fn fail<T>(msg: impl Into<String>) -> EResult<T> {
    Err(EvalError(msg.into()))
}

/// Runtime shape of an executed expression. The normalizer maps each of
/// these onto exactly one response variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluated {
    Frame(Dataset),
    Series { name: String, values: Vec<Cell> },
    Counts { label: Option<String>, pairs: Vec<(Cell, i64)> },
    List(Vec<Cell>),
    Scalar(Cell),
}

/// Evaluate with a symbol table of exactly one binding: the dataset as `df`.
/// No filesystem, network, or ambient process state is reachable from here.
pub fn evaluate(expr: &Expr, dataset: &Dataset) -> EResult<Evaluated> {
    match expr {
        Expr::Chain(steps) => eval_chain(steps, dataset),
        Expr::Len(steps) => {
            let value = eval_chain(steps, dataset)?;
            let n = match value {
                Evaluated::Frame(frame) => frame.row_count(),
                Evaluated::Series { values, .. } => values.len(),
                Evaluated::Counts { pairs, .. } => pairs.len(),
                Evaluated::List(values) => values.len(),
                Evaluated::Scalar(_) => return fail("len() of a scalar value"),
            };
            Ok(Evaluated::Scalar(Cell::Int(n as i64)))
        }
        Expr::Literal(template) => {
            Ok(Evaluated::Scalar(Cell::Str(render_template(template, dataset)?)))
        }
    }
}

fn eval_chain(steps: &[Step], dataset: &Dataset) -> EResult<Evaluated> {
    let mut current = Evaluated::Frame(dataset.clone());
    for step in steps {
        current = apply_step(current, step)?;
    }
    Ok(current)
}

fn apply_step(current: Evaluated, step: &Step) -> EResult<Evaluated> {
    match (current, step) {
        (Evaluated::Frame(frame), Step::Filter(mask)) => {
            let mut kept = Vec::new();
            for row in frame.rows() {
                if mask_matches(mask, &frame, row)? {
                    kept.push(row.clone());
                }
            }
            Ok(Evaluated::Frame(frame.with_rows(kept)))
        }
        (Evaluated::Frame(frame), Step::Select(column)) => {
            let idx = frame
                .column_index(column)
                .ok_or_else(|| EvalError(format!("unknown column '{}'", column)))?;
            Ok(Evaluated::Series {
                name: column.clone(),
                values: frame.column_values(idx).cloned().collect(),
            })
        }
        (Evaluated::Frame(frame), Step::Head(n)) => {
            let rows = frame.rows().iter().take(*n).cloned().collect();
            Ok(Evaluated::Frame(frame.with_rows(rows)))
        }
        (Evaluated::Series { name, mut values }, Step::Head(n)) => {
            values.truncate(*n);
            Ok(Evaluated::Series { name, values })
        }
        (Evaluated::Series { name, values }, Step::ValueCounts) => {
            Ok(Evaluated::Counts {
                label: Some(name),
                pairs: value_counts(&values),
            })
        }
        (counts @ Evaluated::Counts { .. }, Step::ResetIndex) => Ok(counts),
        (Evaluated::Series { values, .. }, Step::ToList) => Ok(Evaluated::List(values)),
        (Evaluated::Series { name, values }, Step::Agg(func)) => {
            let cell = aggregate(*func, &name, &values)?;
            Ok(Evaluated::Scalar(cell))
        }
        (other, step) => fail(format!(
            "cannot apply {} to {}",
            describe_step(step),
            describe_value(&other)
        )),
    }
}

fn describe_step(step: &Step) -> String {
    match step {
        Step::Filter(_) => "a row filter".to_string(),
        Step::Select(col) => format!("column selection ['{}']", col),
        Step::Head(_) => ".head()".to_string(),
        Step::ValueCounts => ".value_counts()".to_string(),
        Step::ResetIndex => ".reset_index()".to_string(),
        Step::ToList => ".tolist()".to_string(),
        Step::Agg(func) => format!(".{}()", func.name()),
    }
}

fn describe_value(value: &Evaluated) -> &'static str {
    match value {
        Evaluated::Frame(_) => "a table",
        Evaluated::Series { .. } => "a column",
        Evaluated::Counts { .. } => "grouped counts",
        Evaluated::List(_) => "a list",
        Evaluated::Scalar(_) => "a scalar",
    }
}

// ---------------------------------------------------------------------------
// masks
// ---------------------------------------------------------------------------

fn mask_matches(mask: &Mask, frame: &Dataset, row: &[Cell]) -> EResult<bool> {
    match mask {
        Mask::And(lhs, rhs) => {
            Ok(mask_matches(lhs, frame, row)? && mask_matches(rhs, frame, row)?)
        }
        Mask::Or(lhs, rhs) => {
            Ok(mask_matches(lhs, frame, row)? || mask_matches(rhs, frame, row)?)
        }
        Mask::Compare { column, op, value } => {
            let idx = frame
                .column_index(column)
                .ok_or_else(|| EvalError(format!("unknown column '{}'", column)))?;
            compare_cell(&row[idx], *op, value, column)
        }
        Mask::Text {
            column,
            method,
            needle,
        } => {
            let idx = frame
                .column_index(column)
                .ok_or_else(|| EvalError(format!("unknown column '{}'", column)))?;
            // na=False semantics: null and non-text cells never match
            Ok(match row[idx].as_str() {
                Some(text) => match method {
                    TextMethod::Contains => text.contains(needle.as_str()),
                    TextMethod::StartsWith => text.starts_with(needle.as_str()),
                    TextMethod::EndsWith => text.ends_with(needle.as_str()),
                },
                None => false,
            })
        }
    }
}

fn compare_cell(cell: &Cell, op: CmpOp, literal: &Literal, column: &str) -> EResult<bool> {
    if cell.is_null() {
        return Ok(false);
    }

    let ordering = match (cell, literal) {
        (Cell::Int(_) | Cell::Float(_), Literal::Int(_) | Literal::Float(_)) => {
            let lhs = cell.as_f64().unwrap_or(f64::NAN);
            let rhs = match literal {
                Literal::Int(n) => *n as f64,
                Literal::Float(f) => *f,
                _ => unreachable!(),
            };
            lhs.partial_cmp(&rhs)
        }
        (Cell::Str(s), Literal::Str(t)) => Some(s.as_str().cmp(t.as_str())),
        (Cell::Bool(a), Literal::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    };

    match ordering {
        Some(ordering) => Ok(match op {
            CmpOp::Eq => ordering.is_eq(),
            CmpOp::Ne => ordering.is_ne(),
            CmpOp::Lt => ordering.is_lt(),
            CmpOp::Le => ordering.is_le(),
            CmpOp::Gt => ordering.is_gt(),
            CmpOp::Ge => ordering.is_ge(),
        }),
        // mismatched kinds: equality is decidable, ordering is not
        None => match op {
            CmpOp::Eq => Ok(false),
            CmpOp::Ne => Ok(true),
            _ => fail(format!(
                "cannot order values in column '{}' against {}",
                column,
                describe_literal(literal)
            )),
        },
    }
}

fn describe_literal(literal: &Literal) -> &'static str {
    match literal {
        Literal::Int(_) | Literal::Float(_) => "a number",
        Literal::Str(_) => "a string",
        Literal::Bool(_) => "a boolean",
    }
}

// ---------------------------------------------------------------------------
// aggregates
// ---------------------------------------------------------------------------

fn value_counts(values: &[Cell]) -> Vec<(Cell, i64)> {
    let mut pairs: Vec<(Cell, i64)> = Vec::new();
    for value in values {
        if value.is_null() {
            continue;
        }
        match pairs.iter_mut().find(|(v, _)| v == value) {
            Some((_, n)) => *n += 1,
            None => pairs.push((value.clone(), 1)),
        }
    }
    // stable sort keeps first-seen order among equal counts
    pairs.sort_by(|a, b| b.1.cmp(&a.1));
    pairs
}

fn aggregate(func: AggFunc, column: &str, values: &[Cell]) -> EResult<Cell> {
    let non_null: Vec<&Cell> = values.iter().filter(|c| !c.is_null()).collect();

    match func {
        AggFunc::Count => Ok(Cell::Int(non_null.len() as i64)),
        AggFunc::Nunique => {
            let mut distinct: Vec<&Cell> = Vec::new();
            for value in &non_null {
                if !distinct.contains(value) {
                    distinct.push(value);
                }
            }
            Ok(Cell::Int(distinct.len() as i64))
        }
        AggFunc::Sum => {
            let numbers = numeric_values(&non_null, column, "sum")?;
            if all_ints(&non_null) {
                Ok(Cell::Int(numbers.iter().sum::<f64>() as i64))
            } else {
                Ok(Cell::Float(numbers.iter().sum()))
            }
        }
        AggFunc::Mean => {
            let numbers = numeric_values(&non_null, column, "mean")?;
            if numbers.is_empty() {
                return fail(format!("mean() of empty column '{}'", column));
            }
            Ok(Cell::Float(numbers.iter().sum::<f64>() / numbers.len() as f64))
        }
        AggFunc::Max | AggFunc::Min => extremum(func, column, &non_null),
    }
}

fn extremum(func: AggFunc, column: &str, non_null: &[&Cell]) -> EResult<Cell> {
    if non_null.is_empty() {
        return fail(format!("{}() of empty column '{}'", func.name(), column));
    }

    if non_null.iter().all(|c| c.is_numeric()) {
        let mut best = non_null[0].as_f64().unwrap_or(f64::NAN);
        let mut best_cell = non_null[0];
        for cell in non_null[1..].iter().copied() {
            let v = cell.as_f64().unwrap_or(f64::NAN);
            let better = match func {
                AggFunc::Max => v > best,
                _ => v < best,
            };
            if better {
                best = v;
                best_cell = cell;
            }
        }
        return Ok(best_cell.clone());
    }

    if non_null.iter().all(|c| matches!(c, Cell::Str(_))) {
        let mut best = non_null[0];
        for cell in non_null[1..].iter().copied() {
            let better = match func {
                AggFunc::Max => cell.as_str() > best.as_str(),
                _ => cell.as_str() < best.as_str(),
            };
            if better {
                best = cell;
            }
        }
        return Ok(best.clone());
    }

    fail(format!(
        "{}() needs a uniformly numeric or text column, '{}' is mixed",
        func.name(),
        column
    ))
}

fn numeric_values(non_null: &[&Cell], column: &str, func: &str) -> EResult<Vec<f64>> {
    non_null
        .iter()
        .map(|cell| {
            cell.as_f64().ok_or_else(|| {
                EvalError(format!(
                    "{}() needs a numeric column, '{}' has text values",
                    func, column
                ))
            })
        })
        .collect()
}

fn all_ints(non_null: &[&Cell]) -> bool {
    non_null.iter().all(|c| matches!(c, Cell::Int(_)))
}

// ---------------------------------------------------------------------------
// f-string templates
// ---------------------------------------------------------------------------

fn render_template(template: &Template, dataset: &Dataset) -> EResult<String> {
    let mut out = String::new();
    for segment in &template.segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Placeholder { expr, format } => {
                let value = evaluate(expr, dataset)?;
                let cell = match value {
                    Evaluated::Scalar(cell) => cell,
                    other => {
                        return fail(format!(
                            "placeholder must produce a single value, got {}",
                            describe_value(&other)
                        ))
                    }
                };
                match format {
                    None => out.push_str(&cell.to_text()),
                    Some(spec) => {
                        let number = cell.as_f64().ok_or_else(|| {
                            EvalError("numeric format applied to a non-numeric value".to_string())
                        })?;
                        out.push_str(&format_number(number, *spec));
                    }
                }
            }
        }
    }
    Ok(out)
}

fn format_number(value: f64, spec: NumberFormat) -> String {
    let rendered = match spec.precision {
        Some(p) => format!("{:.*}", p, value.abs()),
        None => {
            // integral values print without a fraction, like python's `:,`
            if value.fract() == 0.0 {
                format!("{}", value.abs() as i64)
            } else {
                format!("{}", value.abs())
            }
        }
    };

    let (int_part, frac_part) = match rendered.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (rendered, None),
    };

    let int_part = if spec.thousands {
        let mut grouped = String::new();
        for (i, ch) in int_part.chars().rev().enumerate() {
            if i > 0 && i % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        grouped.chars().rev().collect()
    } else {
        int_part
    };

    let sign = if value < 0.0 { "-" } else { "" };
    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, int_part, frac),
        None => format!("{}{}", sign, int_part),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::parse_expression;

    fn dataset() -> Dataset {
        Dataset::new(
            vec![
                "emp_name".to_string(),
                "clean_emp_name".to_string(),
                "dept".to_string(),
                "gross_sal".to_string(),
            ],
            vec![
                vec![
                    Cell::Str("Mr. Mohan".to_string()),
                    Cell::Str("mohan".to_string()),
                    Cell::Str("hr".to_string()),
                    Cell::Int(42000),
                ],
                vec![
                    Cell::Str("Ms. Asha".to_string()),
                    Cell::Str("asha".to_string()),
                    Cell::Str("engineering".to_string()),
                    Cell::Int(61000),
                ],
                vec![
                    Cell::Str("Dr. Meena".to_string()),
                    Cell::Str("meena".to_string()),
                    Cell::Str("hr".to_string()),
                    Cell::Int(55000),
                ],
            ],
        )
        .unwrap()
    }

    fn run(input: &str) -> EResult<Evaluated> {
        evaluate(&parse_expression(input).unwrap(), &dataset())
    }

    #[test]
    fn test_len_counts_rows() {
        assert_eq!(run("len(df)").unwrap(), Evaluated::Scalar(Cell::Int(3)));
    }

    #[test]
    fn test_query_filters_rows_in_order() {
        let Evaluated::Frame(frame) = run("df.query('gross_sal > 50000')").unwrap() else {
            panic!()
        };
        assert_eq!(frame.row_count(), 2);
        // row order preserved from the source
        assert_eq!(frame.rows()[0][1], Cell::Str("asha".to_string()));
        assert_eq!(frame.rows()[1][1], Cell::Str("meena".to_string()));
    }

    #[test]
    fn test_startswith_projection_tolist() {
        let result =
            run("df[df['clean_emp_name'].str.startswith('m', na=False)]['emp_name'].tolist()")
                .unwrap();
        assert_eq!(
            result,
            Evaluated::List(vec![
                Cell::Str("Mr. Mohan".to_string()),
                Cell::Str("Dr. Meena".to_string()),
            ])
        );
    }

    #[test]
    fn test_contains_keeps_original_row() {
        let Evaluated::Frame(frame) =
            run("df[df['clean_emp_name'].str.contains('moh', na=False)]").unwrap()
        else {
            panic!()
        };
        assert_eq!(frame.row_count(), 1);
        assert_eq!(frame.rows()[0][0], Cell::Str("Mr. Mohan".to_string()));
    }

    #[test]
    fn test_zero_row_filter_is_success() {
        let Evaluated::Frame(frame) = run("df.query('gross_sal > 99999')").unwrap() else {
            panic!()
        };
        assert_eq!(frame.row_count(), 0);
    }

    #[test]
    fn test_value_counts_sorted_desc() {
        let Evaluated::Counts { label, pairs } = run("df['dept'].value_counts()").unwrap()
        else {
            panic!()
        };
        assert_eq!(label.as_deref(), Some("dept"));
        assert_eq!(pairs[0], (Cell::Str("hr".to_string()), 2));
        assert_eq!(pairs[1], (Cell::Str("engineering".to_string()), 1));
    }

    #[test]
    fn test_reset_index_is_shape_preserving() {
        assert_eq!(
            run("df['dept'].value_counts()").unwrap(),
            run("df['dept'].value_counts().reset_index()").unwrap()
        );
    }

    #[test]
    fn test_aggregates() {
        assert_eq!(
            run("df['gross_sal'].max()").unwrap(),
            Evaluated::Scalar(Cell::Int(61000))
        );
        assert_eq!(
            run("df['gross_sal'].min()").unwrap(),
            Evaluated::Scalar(Cell::Int(42000))
        );
        assert_eq!(
            run("df['gross_sal'].sum()").unwrap(),
            Evaluated::Scalar(Cell::Int(158000))
        );
        assert_eq!(
            run("df['dept'].nunique()").unwrap(),
            Evaluated::Scalar(Cell::Int(2))
        );
        let Evaluated::Scalar(Cell::Float(mean)) = run("df['gross_sal'].mean()").unwrap()
        else {
            panic!()
        };
        assert!((mean - 52666.666).abs() < 0.01);
    }

    #[test]
    fn test_unknown_column_is_eval_error() {
        let err = run("df['no_such_column'].max()").unwrap_err();
        assert!(err.0.contains("no_such_column"));

        let err = run("df.query('missing > 1')").unwrap_err();
        assert!(err.0.contains("missing"));
    }

    #[test]
    fn test_type_confusion_is_eval_error() {
        assert!(run("df['dept'].mean()").is_err());
        assert!(run("df.query('dept > 40000')").is_err());
        assert!(run("df.tolist()").is_err());
        assert!(run("df.max()").is_err());
    }

    #[test]
    fn test_fstring_evaluates_placeholders() {
        let result = run("f\"There are {len(df)} records in total.\"").unwrap();
        assert_eq!(
            result,
            Evaluated::Scalar(Cell::Str("There are 3 records in total.".to_string()))
        );
    }

    #[test]
    fn test_fstring_number_format() {
        let result = run("f\"top: {df['gross_sal'].max():,.2f}\"").unwrap();
        assert_eq!(
            result,
            Evaluated::Scalar(Cell::Str("top: 61,000.00".to_string()))
        );
    }

    #[test]
    fn test_mixed_kind_equality() {
        // comparing a text column for equality with a number matches nothing
        let Evaluated::Frame(frame) = run("df[df['dept'] == 42]").unwrap() else {
            panic!()
        };
        assert_eq!(frame.row_count(), 0);
        // but inequality matches everything
        let Evaluated::Frame(frame) = run("df[df['dept'] != 42]").unwrap() else {
            panic!()
        };
        assert_eq!(frame.row_count(), 3);
    }

    #[test]
    fn test_head_limits_rows() {
        let Evaluated::Frame(frame) = run("df.head(2)").unwrap() else { panic!() };
        assert_eq!(frame.row_count(), 2);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(
            format_number(
                1234567.5,
                NumberFormat {
                    thousands: true,
                    precision: Some(2)
                }
            ),
            "1,234,567.50"
        );
        assert_eq!(
            format_number(
                42000.0,
                NumberFormat {
                    thousands: true,
                    precision: None
                }
            ),
            "42,000"
        );
        assert_eq!(
            format_number(
                3.14159,
                NumberFormat {
                    thousands: false,
                    precision: Some(2)
                }
            ),
            "3.14"
        );
    }
}
