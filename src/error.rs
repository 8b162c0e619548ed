use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error while {context}: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to parse {context}: {message}")]
    Parse {
        context: &'static str,
        message: String,
    },
    #[error("transcript references unknown unit `{name}`")]
    UnknownUnit { name: String },
    #[error("invalid model `{unit}`: {message}")]
    InvalidModel { unit: String, message: String },
    #[error("feature dimension mismatch at frame {frame}: model expects {expected}, got {actual}")]
    DimensionMismatch {
        expected: usize,
        actual: usize,
        /// First frame whose width differs; 0 when a whole utterance has the wrong width.
        frame: usize,
    },
    #[error("utterance `{id}` is empty ({units} units, {frames} frames)")]
    EmptyTranscript {
        id: String,
        units: usize,
        frames: usize,
    },
    #[error("utterance `{id}` has zero likelihood under the current model")]
    NumericalOverflow { id: String },
}

impl TrainingError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn json(context: &'static str, source: serde_json::Error) -> Self {
        Self::Json { context, source }
    }

    pub(crate) fn parse(context: &'static str, message: impl Into<String>) -> Self {
        Self::Parse {
            context,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_model(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidModel {
            unit: unit.into(),
            message: message.into(),
        }
    }

    /// Errors that invalidate the model set or the corpus as a whole rather than one
    /// utterance.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnknownUnit { .. } | Self::InvalidModel { .. })
    }
}
