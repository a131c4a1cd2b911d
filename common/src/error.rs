use thiserror::Error;

#[derive(Error, Debug)]
pub enum TabchatError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("upload rejected: {0}")]
    UploadRejected(String),

    #[error("could not parse uploaded file: {0}")]
    UploadParseFailed(String),

    #[error("generation client unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("no runnable expression in model output")]
    UnextractableExpression {
        /// raw model text, kept for diagnostic display
        raw: String,
    },

    #[error("expression `{expression}` failed: {detail}")]
    ExecutionFailed { expression: String, detail: String },

    #[error("precondition unmet: {0}")]
    PreconditionUnmet(String),

    #[error("tracing initialization failed: {0}")]
    Tracing(String),
}

pub type Result<T> = std::result::Result<T, TabchatError>;
