use thiserror::Error;

/// Errors returned by the upload-to-generation pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Caught before any network call: no staged image, or an empty prompt.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The staged file could not be read.
    #[error("Failed to read image: {0}")]
    Encoding(String),

    /// Network-level request failure with context.
    #[error("{context}: {source}")]
    Network {
        context: String,
        source: reqwest::Error,
    },

    /// A webhook returned a non-success HTTP status.
    #[error("Webhook returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The webhook response was missing the expected output field.
    #[error("Invalid result: {0}")]
    InvalidResult(String),

    /// Media repository persistence failed. Never surfaced to the user.
    #[error("Persistence failed: {0}")]
    Persistence(String),

    /// Another generation is already in flight.
    #[error("A generation is already in progress")]
    Busy,

    /// Missing or malformed configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub(crate) const MISSING_IMAGE: &str = "Please upload an image first";
pub(crate) const EMPTY_PROMPT: &str = "Please enter a design prompt";
pub(crate) const UPLOAD_FAILED: &str = "Error processing upload. Please try again.";
pub(crate) const GENERATION_FAILED: &str = "Error generating concept. Please try again.";

impl PipelineError {
    /// The notification text shown to the user for this failure.
    ///
    /// Validation errors carry their own message; every other failure during
    /// a Generate invocation collapses to one generic line.
    pub fn user_message(&self) -> &str {
        match self {
            PipelineError::Validation(msg) => msg.as_str(),
            PipelineError::Busy => "Please wait for the current generation to finish",
            PipelineError::Config(_) => "The widget is not configured correctly",
            _ => GENERATION_FAILED,
        }
    }

    /// Whether the failure happened before any network traffic.
    pub fn is_validation(&self) -> bool {
        matches!(self, PipelineError::Validation(_))
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, PipelineError>;
