//! Error types for the OrangeFlow pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Every way a pipeline stage can fail.
///
/// The first group are caller mistakes (bad input or a stage invoked out of
/// order); the second group are failures of the data or the numerics.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Unsupported file type: '{0}'. Use .csv, .xlsx or .xls")]
    UnsupportedFormat(String),

    #[error("Dataset is empty")]
    EmptyDataset,

    #[error("Upload a dataset first")]
    NoDataset,

    #[error("Invalid target column: {0}")]
    InvalidTarget(String),

    #[error("Invalid feature column: {0}")]
    InvalidFeature(String),

    #[error("Target must have at least two classes, found {found}")]
    InsufficientClasses { found: usize },

    #[error("Preprocess data first")]
    NotPreprocessed,

    #[error("Split data first")]
    NotSplit,

    #[error("Invalid model_type: '{0}'. Use 'logistic' or 'tree'")]
    InvalidModelKind(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl PipelineError {
    /// Whether the failure is the caller's fault (maps to HTTP 400)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::UnsupportedFormat(_)
                | PipelineError::EmptyDataset
                | PipelineError::NoDataset
                | PipelineError::InvalidTarget(_)
                | PipelineError::InvalidFeature(_)
                | PipelineError::InsufficientClasses { .. }
                | PipelineError::NotPreprocessed
                | PipelineError::NotSplit
                | PipelineError::InvalidModelKind(_)
                | PipelineError::InvalidParameter { .. }
        )
    }

    /// Stable name of the error class, reported to HTTP clients
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::UnsupportedFormat(_) => "UnsupportedFormat",
            PipelineError::EmptyDataset => "EmptyDataset",
            PipelineError::NoDataset => "NoDataset",
            PipelineError::InvalidTarget(_) => "InvalidTarget",
            PipelineError::InvalidFeature(_) => "InvalidFeature",
            PipelineError::InsufficientClasses { .. } => "InsufficientClasses",
            PipelineError::NotPreprocessed => "NotPreprocessed",
            PipelineError::NotSplit => "NotSplit",
            PipelineError::InvalidModelKind(_) => "InvalidModelKind",
            PipelineError::InvalidParameter { .. } => "InvalidParameter",
            PipelineError::DataError(_)
            | PipelineError::ComputationError(_)
            | PipelineError::TrainingError(_)
            | PipelineError::Unexpected(_) => "Unexpected",
        }
    }

    pub(crate) fn invalid_parameter(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        PipelineError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::DataError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipelineError::ComputationError(err.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Unexpected(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::InsufficientClasses { found: 1 };
        assert_eq!(err.to_string(), "Target must have at least two classes, found 1");
    }

    #[test]
    fn test_client_and_server_classes() {
        assert!(PipelineError::NoDataset.is_client_error());
        assert!(PipelineError::invalid_parameter("C", -1.0, "must be > 0").is_client_error());
        assert!(!PipelineError::DataError("bad bytes".into()).is_client_error());
        assert!(!PipelineError::TrainingError("one class".into()).is_client_error());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(PipelineError::NotSplit.kind(), "NotSplit");
        assert_eq!(PipelineError::ComputationError("nan".into()).kind(), "Unexpected");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PipelineError = io_err.into();
        assert!(matches!(err, PipelineError::Unexpected(_)));
    }
}
