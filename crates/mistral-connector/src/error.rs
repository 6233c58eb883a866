use thiserror::Error;

pub use connector_common::error::CommonRequestError;

/// Every way a connector call can fail. No failure is retried internally.
#[derive(Error, Debug)]
pub enum MistralError {
    #[error("Missing API key: set MISTRAL_API_KEY")]
    MissingApiKey,

    /// The conversation had no turns and no prompt was supplied
    #[error("Conversation history is empty")]
    EmptyHistory,

    #[error("Invalid execution settings: {0}")]
    InvalidSettings(String),

    /// A successful response did not contain what the call needs
    #[error("Unexpected response shape: {0}")]
    ResponseShape(String),

    /// Transport failure, non-success status, undecodable body, or cancellation
    #[error("Mistral API error: {0}")]
    Request(#[from] CommonRequestError),
}

impl MistralError {
    /// HTTP status of a non-success response.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Request(err) => err.status_code(),
            _ => None,
        }
    }

    /// Raw body of a non-success response.
    #[must_use]
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            Self::Request(err) => err.raw_body(),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Request(CommonRequestError::Cancelled))
    }

    /// Whether a successful response had the wrong shape.
    #[must_use]
    pub fn is_shape_error(&self) -> bool {
        matches!(
            self,
            Self::ResponseShape(_)
                | Self::Request(
                    CommonRequestError::InvalidEventData(_)
                        | CommonRequestError::UnexpectedResponse(_)
                )
        )
    }
}
