use crate::validation::ValidationReport;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WardenError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to load document: {0}")]
    LoadError(String),

    #[error("Failed to fetch remote document {location}: {message}")]
    FetchError { location: String, message: String },

    #[error("The document is invalid and cannot be processed ({} errors)", .0.errors.len())]
    InvalidDocument(Box<ValidationReport>),

    #[error("Unable to resolve the document: it fails structural validation ({} errors)", .0.errors.len())]
    UnresolvableDocument(Box<ValidationReport>),

    #[error("Unresolvable reference: {0}")]
    UnresolvableReference(String),

    #[error("Meta-schema error: {0}")]
    MetaSchemaError(String),

    #[error("Telemetry error: {0}")]
    TelemetryError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl WardenError {
    /// The aggregate report carried by invalid-document errors.
    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            WardenError::InvalidDocument(report) | WardenError::UnresolvableDocument(report) => {
                Some(report)
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, WardenError>;
