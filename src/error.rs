use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Structural precondition violated by the input corpus
    #[error("data error: {message}")]
    Data { message: String },
    /// N-gram table and unigram table disagree at a computed offset
    #[error(
        "alignment error in interaction {interaction_id}, turn {turn_id}, index {index}: {message}"
    )]
    Alignment {
        interaction_id: String,
        turn_id: String,
        index: u64,
        message: String,
    },
    #[error("invalid configuration: {message}")]
    Config { message: String },
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error while {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl PersistenceError {
    pub(crate) fn data(message: impl Into<String>) -> Self {
        Self::Data {
            message: message.into(),
        }
    }

    pub(crate) fn alignment(
        interaction_id: &str,
        turn_id: &str,
        index: u64,
        message: impl Into<String>,
    ) -> Self {
        Self::Alignment {
            interaction_id: interaction_id.to_string(),
            turn_id: turn_id.to_string(),
            index,
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    /// Whether this error is a data-integrity failure of the input corpus
    pub fn is_data_error(&self) -> bool {
        matches!(self, Self::Data { .. })
    }

    /// Whether this error is a merge-time alignment failure
    pub fn is_alignment_error(&self) -> bool {
        matches!(self, Self::Alignment { .. })
    }
}

pub type Result<T> = std::result::Result<T, PersistenceError>;
