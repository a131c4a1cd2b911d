use crate::result::normalize::ResultVariant;

/// Serialize a normalized result into the presentation markup handed to the
/// transport layer. Successful answers never leak the executed expression.
pub fn render(variant: &ResultVariant) -> String {
    match variant {
        ResultVariant::Table { columns, rows } => table_block(columns, rows.iter()),
        ResultVariant::NamedSeries { label, value, rows } => table_block(
            &[label.clone(), value.clone()],
            rows.iter()
                .map(|(l, v)| vec![l.clone(), v.clone()])
                .collect::<Vec<_>>()
                .iter(),
        ),
        ResultVariant::Sequence { values } => {
            if values.is_empty() {
                "I couldn't find any results for that.".to_string()
            } else {
                table_block(
                    &["Results".to_string()],
                    values
                        .iter()
                        .map(|v| vec![v.clone()])
                        .collect::<Vec<_>>()
                        .iter(),
                )
            }
        }
        ResultVariant::Scalar(text) => escape(text).replace('\n', "<br>"),
        ResultVariant::Empty { max_salary: None } => {
            "I couldn't find any records that match your query.".to_string()
        }
        ResultVariant::Empty {
            max_salary: Some(max),
        } => format!(
            "I couldn't find any records that match your filter. \
             For context, the highest salary in the dataset is <strong>{}</strong>.",
            escape(max)
        ),
    }
}

/// Failure message for an expression that parsed but raised during
/// evaluation. This is the one place the expression is shown verbatim, so
/// the asker can see what was attempted.
pub fn render_failure(expression: &str, detail: &str) -> String {
    format!(
        "I tried this code:<br><code>{}</code><br><br>\
         But it failed: <code>{}</code><br>Please try rephrasing your question.",
        escape(expression),
        escape(detail)
    )
}

/// Message for model output that neither parsed directly nor yielded a
/// recoverable expression.
pub fn render_unextractable(raw: &str) -> String {
    format!(
        "I couldn't turn the model's reply into a runnable expression. It said:<br>\
         <code>{}</code><br>Please try rephrasing your question.",
        escape(raw.trim())
    )
}

fn table_block<'a>(
    columns: &[String],
    rows: impl Iterator<Item = &'a Vec<String>>,
) -> String {
    let mut html = String::from(
        "<div class='table-responsive'><table class='table table-striped'><thead><tr>",
    );
    for column in columns {
        html.push_str("<th>");
        html.push_str(&escape(column));
        html.push_str("</th>");
    }
    html.push_str("</tr></thead><tbody>");
    for row in rows {
        html.push_str("<tr>");
        for cell in row {
            html.push_str("<td>");
            html.push_str(&escape(cell));
            html.push_str("</td>");
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table></div>");
    html
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_markup() {
        let variant = ResultVariant::Table {
            columns: vec!["name".to_string()],
            rows: vec![vec!["mohan".to_string()]],
        };
        let html = render(&variant);
        assert!(html.starts_with("<div class='table-responsive'>"));
        assert!(html.contains("<th>name</th>"));
        assert!(html.contains("<td>mohan</td>"));
    }

    #[test]
    fn test_scalar_newlines_become_breaks() {
        let html = render(&ResultVariant::Scalar("a\nb".to_string()));
        assert_eq!(html, "a<br>b");
    }

    #[test]
    fn test_empty_with_context() {
        let html = render(&ResultVariant::Empty {
            max_salary: Some("61,000.00".to_string()),
        });
        assert!(html.contains("couldn't find any records"));
        assert!(html.contains("<strong>61,000.00</strong>"));
    }

    #[test]
    fn test_empty_sequence_message() {
        let html = render(&ResultVariant::Sequence { values: vec![] });
        assert_eq!(html, "I couldn't find any results for that.");
    }

    #[test]
    fn test_failure_shows_expression() {
        let html = render_failure("df['nope'].max()", "unknown column 'nope'");
        assert!(html.contains("<code>df[&#39;nope&#39;].max()</code>"));
        assert!(html.contains("unknown column"));
    }

    #[test]
    fn test_cells_are_escaped() {
        let variant = ResultVariant::Scalar("<script>".to_string());
        assert_eq!(render(&variant), "&lt;script&gt;");
    }
}
