//! Error types for the multi-timeframe pipeline.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the pipeline.
///
/// Every stage fails fast with one of these; none of them is recovered from
/// inside the library.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required field or column is absent.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A value (usually a date/time pair) could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// No rows survived alignment or filtering.
    #[error("Empty result: {0}")]
    EmptyResult(String),

    /// The feature set is empty, or a persisted feature is missing from the data.
    #[error("No features: {0}")]
    NoFeatures(String),

    /// Too few rows for the requested window length or split.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// No eligible row at inference time.
    #[error("No data: {0}")]
    NoData(String),

    /// Scaler or feature-order artifact absent or unusable.
    #[error("Missing artifact: {0}")]
    MissingArtifact(String),

    /// Unexpected missing data in the middle of a series.
    #[error("Data error: {0}")]
    Data(String),

    /// Matrix or window shape disagrees with what a fitted component expects.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The external predictor returned something outside its contract.
    #[error("Predictor error: {0}")]
    Predictor(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reading/writing error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a schema error.
    pub fn schema(msg: impl Into<String>) -> Self {
        Error::Schema(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    /// Create an empty result error.
    pub fn empty_result(msg: impl Into<String>) -> Self {
        Error::EmptyResult(msg.into())
    }

    /// Create a no features error.
    pub fn no_features(msg: impl Into<String>) -> Self {
        Error::NoFeatures(msg.into())
    }

    /// Create an insufficient data error.
    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Error::InsufficientData(msg.into())
    }

    /// Create a no data error.
    pub fn no_data(msg: impl Into<String>) -> Self {
        Error::NoData(msg.into())
    }

    /// Create a missing artifact error.
    pub fn missing_artifact(msg: impl Into<String>) -> Self {
        Error::MissingArtifact(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Create a predictor error.
    pub fn predictor(msg: impl Into<String>) -> Self {
        Error::Predictor(msg.into())
    }
}
