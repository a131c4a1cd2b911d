use crate::agent::parser::extract_expression;
use crate::agent::prompt::build_preamble;
use crate::error::{Result, TabchatError};
use crate::expr::evaluate;
use crate::llm::client::{ChatMessage, GenerationClient};
use crate::result::{normalize, render, render_failure, render_unextractable};
use crate::schema::SchemaDescriptor;
use crate::table::dataset::Dataset;

/// One completed chat turn: the rendered answer plus the raw generated text
/// to append to the conversation log.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub answer: String,
    pub generated: String,
}

/// Run one question through the full pipeline: compose, generate, extract,
/// execute, normalize, render.
///
/// `GenerationUnavailable` aborts the turn and propagates. Extraction and
/// execution failures do not: they are rendered into an explanatory answer
/// (showing the attempted expression) so the conversation can continue.
#[tracing::instrument(skip_all, fields(question_len = question.len(), history_len = history.len()))]
pub async fn answer_question(
    client: &dyn GenerationClient,
    dataset: &Dataset,
    descriptor: &SchemaDescriptor,
    history: &[ChatMessage],
    question: &str,
) -> Result<ChatOutcome> {
    let preamble = build_preamble(descriptor);

    // the sole suspension point of the pipeline
    let raw = client.generate(&preamble, history, question).await?;
    tracing::debug!(generated = %raw.trim(), "model produced candidate text");

    let answer = match extract_expression(&raw) {
        Err(TabchatError::UnextractableExpression { raw }) => {
            tracing::warn!("no expression recovered from model output");
            render_unextractable(&raw)
        }
        Err(other) => return Err(other),
        Ok(extraction) => match evaluate(&extraction.expr, dataset) {
            Err(eval_err) => {
                tracing::warn!(expression = %extraction.text, error = %eval_err, "execution failed");
                render_failure(&extraction.text, &eval_err.0)
            }
            Ok(value) => {
                let variant = normalize(value, dataset, &extraction.text);
                render(&variant)
            }
        },
    };

    Ok(ChatOutcome {
        answer,
        generated: raw.trim().replace('`', ""),
    })
}
