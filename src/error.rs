use thiserror::Error;

/// Problems reading or interpreting form input
#[derive(Error, Debug)]
pub enum FormError {
    #[error("missing form field: {0}")]
    MissingField(String),

    #[error("invalid country code: {0:?}")]
    InvalidCountryCode(String),

    #[error("invalid sales value {token:?} at position {index}")]
    InvalidSalesValue { index: usize, token: String },

    #[error("invalid start date: {0:?}")]
    InvalidStartDate(String),
}

/// Failures of a client-side prediction pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Form(#[from] FormError),

    #[error("{0}")]
    Transport(anyhow::Error),

    #[error("Network response was not ok: {status} {status_text}\nResponse Body: {body}")]
    Status {
        status: u16,
        status_text: String,
        body: String,
    },

    #[error("invalid JSON in response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("response is missing {0}")]
    MissingField(&'static str),

    #[error("{0}")]
    Render(anyhow::Error),
}

/// Failures inside a cloud-function handler, each mapped to an HTTP status
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Invalid JSON format")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Error processing your request")]
    Invocation(anyhow::Error),

    #[error("Error processing your request")]
    UnexpectedResponse(String),
}

impl HandlerError {
    pub fn status_code(&self) -> u16 {
        match self {
            HandlerError::InvalidJson(_) | HandlerError::InvalidRequest(_) => 400,
            HandlerError::Invocation(_) | HandlerError::UnexpectedResponse(_) => 500,
        }
    }

    /// Underlying cause for logs; the public message stays generic.
    pub fn detail(&self) -> Option<String> {
        match self {
            HandlerError::InvalidJson(e) => Some(e.to_string()),
            HandlerError::InvalidRequest(_) => None,
            HandlerError::Invocation(e) => Some(format!("{e:#}")),
            HandlerError::UnexpectedResponse(reason) => Some(reason.clone()),
        }
    }
}
