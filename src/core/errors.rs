use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("no documents indexed")]
    NoDocumentsIndexed,
    #[error("no relevant match")]
    NoRelevantMatch,
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl RagError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        RagError::Internal(err.to_string())
    }

    pub fn store<E: std::fmt::Display>(err: E) -> Self {
        RagError::Store(err.to_string())
    }

    pub fn provider<E: std::fmt::Display>(err: E) -> Self {
        RagError::ProviderUnavailable(err.to_string())
    }

    /// True for invariant violations that must propagate instead of being
    /// rendered as a chat reply.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, RagError::DimensionMismatch { .. })
    }

    /// User-facing rendering for recoverable failures. The orchestrator
    /// returns these as answer text rather than erroring across the UI
    /// boundary.
    pub fn user_message(&self) -> String {
        match self {
            RagError::NoDocumentsIndexed => {
                "Your documents have not been indexed yet. Please re-upload them \
                 so they can be processed before asking questions."
                    .to_string()
            }
            RagError::NoRelevantMatch => {
                "I couldn't find anything in your documents related to that \
                 question. Try rephrasing it or asking about something else."
                    .to_string()
            }
            RagError::ProviderUnavailable(cause) => {
                format!("The model backend is not reachable right now ({cause}).")
            }
            other => format!("Something went wrong while answering: {other}"),
        }
    }
}
