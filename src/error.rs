//! Error types for Centinela operations.
//!
//! Provides rich error context for library consumers. Sample-level parse
//! failures are recoverable (the offending sample is dropped from the
//! corpus); every other variant aborts the pipeline.

use std::fmt;

/// Main error type for Centinela operations.
///
/// Corpus-level precondition violations (`EmptyCorpus`,
/// `InsufficientSamples`, `DegenerateClass`) abort before training starts.
/// `UnknownNodeKind` signals that graph construction ran against a
/// vocabulary built from a different corpus. `NumericalInstability` aborts
/// a run mid-training with no retry.
///
/// # Examples
///
/// ```
/// use centinela::error::CentinelaError;
///
/// let err = CentinelaError::UnknownNodeKind {
///     kind: "FuncDef".to_string(),
/// };
/// assert!(err.to_string().contains("FuncDef"));
/// ```
#[derive(Debug)]
pub enum CentinelaError {
    /// A single sample failed to parse; the sample is excluded, never fatal.
    ParseFailure {
        /// Parser diagnostic
        message: String,
    },

    /// The corpus contained zero valid trees.
    EmptyCorpus,

    /// A label class is too small to appear in both splits.
    InsufficientSamples {
        /// The offending class label
        label: usize,
        /// Number of members found
        count: usize,
    },

    /// A class has zero training samples, so its weight is undefined.
    DegenerateClass {
        /// The offending class label
        label: usize,
    },

    /// A node kind was absent from the vocabulary during graph construction.
    UnknownNodeKind {
        /// The unmapped kind tag
        kind: String,
    },

    /// The forward pass produced a non-finite loss.
    NumericalInstability {
        /// Epoch in which the failure occurred
        epoch: usize,
        /// Loss value observed
        loss: f64,
    },

    /// Invalid hyperparameter value provided.
    InvalidHyperparameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// I/O error (file not found, permission denied, etc.).
    Io(std::io::Error),

    /// Checkpoint serialization/deserialization error.
    Serialization(String),
}

impl fmt::Display for CentinelaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CentinelaError::ParseFailure { message } => {
                write!(f, "Parse failure: {message}")
            }
            CentinelaError::EmptyCorpus => {
                write!(f, "Corpus contains zero valid trees")
            }
            CentinelaError::InsufficientSamples { label, count } => {
                write!(
                    f,
                    "Class {label} has {count} sample(s), too few to stratify into both splits"
                )
            }
            CentinelaError::DegenerateClass { label } => {
                write!(f, "Class {label} has no training samples")
            }
            CentinelaError::UnknownNodeKind { kind } => {
                write!(
                    f,
                    "Node kind '{kind}' is not in the vocabulary; vocabulary and corpus disagree"
                )
            }
            CentinelaError::NumericalInstability { epoch, loss } => {
                write!(f, "Non-finite loss {loss} at epoch {epoch}")
            }
            CentinelaError::InvalidHyperparameter {
                param,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "Invalid hyperparameter: {param} = {value}, expected {constraint}"
                )
            }
            CentinelaError::Io(e) => write!(f, "I/O error: {e}"),
            CentinelaError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
        }
    }
}

impl std::error::Error for CentinelaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CentinelaError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CentinelaError {
    fn from(err: std::io::Error) -> Self {
        CentinelaError::Io(err)
    }
}

impl CentinelaError {
    /// Create a parse failure from any parser diagnostic.
    #[must_use]
    pub fn parse_failure(message: impl Into<String>) -> Self {
        Self::ParseFailure {
            message: message.into(),
        }
    }

    /// Create an invalid hyperparameter error with descriptive context.
    #[must_use]
    pub fn invalid_hyperparameter(param: &str, value: impl fmt::Display, constraint: &str) -> Self {
        Self::InvalidHyperparameter {
            param: param.to_string(),
            value: value.to_string(),
            constraint: constraint.to_string(),
        }
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, CentinelaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_failure_display() {
        let err = CentinelaError::parse_failure("unexpected token at line 3");
        assert!(err.to_string().contains("Parse failure"));
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_empty_corpus_display() {
        let err = CentinelaError::EmptyCorpus;
        assert!(err.to_string().contains("zero valid trees"));
    }

    #[test]
    fn test_insufficient_samples_display() {
        let err = CentinelaError::InsufficientSamples { label: 1, count: 1 };
        let msg = err.to_string();
        assert!(msg.contains("Class 1"));
        assert!(msg.contains("stratify"));
    }

    #[test]
    fn test_degenerate_class_display() {
        let err = CentinelaError::DegenerateClass { label: 0 };
        assert!(err.to_string().contains("no training samples"));
    }

    #[test]
    fn test_unknown_node_kind_display() {
        let err = CentinelaError::UnknownNodeKind {
            kind: "Decl".to_string(),
        };
        assert!(err.to_string().contains("Decl"));
        assert!(err.to_string().contains("vocabulary"));
    }

    #[test]
    fn test_numerical_instability_display() {
        let err = CentinelaError::NumericalInstability {
            epoch: 7,
            loss: f64::NAN,
        };
        let msg = err.to_string();
        assert!(msg.contains("epoch 7"));
        assert!(msg.contains("NaN"));
    }

    #[test]
    fn test_invalid_hyperparameter_display() {
        let err = CentinelaError::invalid_hyperparameter("learning_rate", -0.1, ">0");
        let msg = err.to_string();
        assert!(msg.contains("learning_rate"));
        assert!(msg.contains("-0.1"));
        assert!(msg.contains(">0"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CentinelaError = io_err.into();
        assert!(matches!(err, CentinelaError::Io(_)));
    }

    #[test]
    fn test_error_source_io() {
        use std::error::Error;
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = CentinelaError::Io(io_err);
        assert!(err.source().is_some());

        let err = CentinelaError::EmptyCorpus;
        assert!(err.source().is_none());
    }
}
