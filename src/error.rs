use serde_json::error::Category;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON parse error while {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("XML parse error while {context}: {source}")]
    Xml {
        context: String,
        #[source]
        source: roxmltree::Error,
    },
    #[error("schema error in {context}: {message}")]
    Schema { context: String, message: String },
    #[error("malformed record '{movie_id}': {reason}")]
    MalformedRecord { movie_id: String, reason: String },
    #[error("dimension mismatch in {context}: {message}")]
    DimensionMismatch { context: String, message: String },
    #[error("invalid validation scenario: {message}")]
    Configuration { message: String },
    #[error("{context}: needs at least {required} samples, got {actual}")]
    InsufficientData {
        context: String,
        required: usize,
        actual: usize,
    },
}

impl ValidationError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Routes a serde_json failure to the taxonomy: shape problems are schema
    /// errors, broken syntax stays a JSON error.
    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        let context = context.into();
        match source.classify() {
            Category::Data => Self::Schema {
                context,
                message: source.to_string(),
            },
            Category::Io => Self::Io {
                context,
                source: source.into(),
            },
            Category::Syntax | Category::Eof => Self::Json { context, source },
        }
    }

    pub(crate) fn xml(context: impl Into<String>, source: roxmltree::Error) -> Self {
        Self::Xml {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn schema(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            context: context.into(),
            message: message.into(),
        }
    }

    pub(crate) fn malformed(movie_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            movie_id: movie_id.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn dimension(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DimensionMismatch {
            context: context.into(),
            message: message.into(),
        }
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn insufficient(context: impl Into<String>, required: usize, actual: usize) -> Self {
        Self::InsufficientData {
            context: context.into(),
            required,
            actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_data_errors_become_schema_errors() {
        let err = serde_json::from_str::<Vec<f64>>(r#"{"not": "a list"}"#).unwrap_err();
        let mapped = ValidationError::json("parse positions", err);
        assert!(matches!(mapped, ValidationError::Schema { .. }));
    }

    #[test]
    fn json_syntax_errors_stay_json_errors() {
        let err = serde_json::from_str::<Vec<f64>>("[1.0, 2.0").unwrap_err();
        let mapped = ValidationError::json("parse positions", err);
        assert!(matches!(mapped, ValidationError::Json { .. }));
    }

    #[test]
    fn insufficient_data_message_names_counts() {
        let err = ValidationError::insufficient("welch test", 2, 1);
        assert_eq!(
            err.to_string(),
            "welch test: needs at least 2 samples, got 1"
        );
    }
}
