use crate::error::{Result, TabchatError};
use crate::expr::{parse_expression, Expr};
use once_cell::sync::Lazy;
use regex::Regex;

static FENCE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:python|py)?\n?(.*?)```").unwrap());

/// Accepted expression shapes, tried in order on the first match: a query
/// call, an indexing chain, a length call, a formatted or plain string
/// literal. This is a bounded recovery heuristic for generators that wrap
/// the expression in prose, not a general parser.
static FALLBACK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?x)
        (
          df\.query\(\s*(?:'[^']*'|"[^"]*")\s*\)(?:\.\w+\(\d*\))*
        | df\[.*\](?:\.\w+\(\d*\))*
        | len\(df[^)]*\)
        | f?"(?:[^"\\]|\\.)*"
        | f'(?:[^'\\]|\\.)*'
        )
    "#,
    )
    .unwrap()
});

/// A successfully extracted expression: the parsed form plus the exact text
/// that was executed, kept for failure display.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub text: String,
    pub expr: Expr,
}

/// Isolate one well-formed expression from raw generator output.
///
/// Step 1 strips fences, stray backticks, and whitespace; if the remainder
/// parses, it is the expression. Step 2 scans for the first occurrence of an
/// accepted shape and re-parses that match. If neither yields a valid
/// expression the whole turn fails with `UnextractableExpression`.
#[tracing::instrument(skip(raw), fields(raw_len = raw.len()))]
pub fn extract_expression(raw: &str) -> Result<Extraction> {
    let cleaned = strip_artifacts(raw);

    match parse_expression(&cleaned) {
        Ok(expr) => Ok(Extraction {
            text: cleaned,
            expr,
        }),
        Err(direct_err) => {
            tracing::debug!(error = %direct_err, "direct parse failed, trying pattern recovery");

            let candidate = FALLBACK_REGEX
                .find(&cleaned)
                .map(|m| m.as_str().to_string());

            match candidate {
                Some(text) => match parse_expression(&text) {
                    Ok(expr) => {
                        tracing::info!(recovered = %text, "recovered expression from prose");
                        Ok(Extraction { text, expr })
                    }
                    Err(_) => Err(TabchatError::UnextractableExpression {
                        raw: raw.to_string(),
                    }),
                },
                None => Err(TabchatError::UnextractableExpression {
                    raw: raw.to_string(),
                }),
            }
        }
    }
}

fn strip_artifacts(raw: &str) -> String {
    let text = raw.trim();

    let text = match FENCE_REGEX.captures(text) {
        Some(captures) => captures.get(1).map(|m| m.as_str()).unwrap_or(text),
        None => text,
    };

    text.replace('`', "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_output_is_identity() {
        let extraction = extract_expression("df.query('gross_sal > 40000')").unwrap();
        assert_eq!(extraction.text, "df.query('gross_sal > 40000')");
    }

    #[test]
    fn test_whitespace_and_backticks_stripped() {
        let extraction = extract_expression("  `len(df)`  \n").unwrap();
        assert_eq!(extraction.text, "len(df)");
    }

    #[test]
    fn test_code_fence_stripped() {
        let extraction =
            extract_expression("```python\ndf.query('gross_sal > 40000')\n```").unwrap();
        assert_eq!(extraction.text, "df.query('gross_sal > 40000')");
    }

    #[test]
    fn test_prose_wrapped_query_recovered() {
        let extraction = extract_expression("Sure! df.query('gross_sal > 40000')").unwrap();
        assert_eq!(extraction.text, "df.query('gross_sal > 40000')");
    }

    #[test]
    fn test_prose_wrapped_index_chain_recovered() {
        let raw = "Here you go: df[df['clean_emp_name'].str.contains('george', na=False)] should work";
        let extraction = extract_expression(raw).unwrap();
        assert_eq!(
            extraction.text,
            "df[df['clean_emp_name'].str.contains('george', na=False)]"
        );
    }

    #[test]
    fn test_prose_wrapped_len_recovered() {
        let extraction = extract_expression("The answer is len(df) records").unwrap();
        assert_eq!(extraction.text, "len(df)");
    }

    #[test]
    fn test_unrecognizable_output_fails() {
        let err = extract_expression("I cannot answer that question.").unwrap_err();
        match err {
            TabchatError::UnextractableExpression { raw } => {
                assert!(raw.contains("cannot answer"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_empty_output_fails() {
        assert!(extract_expression("").is_err());
        assert!(extract_expression("   \n  ").is_err());
    }

    #[test]
    fn test_fstring_recovered_from_prose() {
        let raw = "Of course. f\"There are {len(df)} records in total.\"";
        let extraction = extract_expression(raw).unwrap();
        assert_eq!(extraction.text, "f\"There are {len(df)} records in total.\"");
    }
}
