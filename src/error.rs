use thiserror::Error;

/// Error taxonomy for the client core. Each variant maps to a stable wire
/// code via [`Error::code`], which the JSON error envelope exposes to
/// scripting callers.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    ConfigMissing(String),

    #[error("{message}")]
    InvalidArgs {
        message: String,
        details: Option<String>,
    },

    /// Terminal non-2xx response. 4xx (other than 429) always lands here on
    /// the first attempt; retryable statuses land here only via
    /// [`Error::HttpRetry`] exhaustion.
    #[error("request failed with status {status}")]
    Http { status: u16, body: String },

    /// A retryable status (429 or 5xx). Internal to the transport's retry
    /// loop; surfaced as the final error once retries are exhausted.
    #[error("retryable status {status}")]
    HttpRetry { status: u16, body: String },

    #[error("identity not found")]
    IdentityNotFound { id: String },

    #[error("assigned-to is required and could not be resolved")]
    AssignedToRequired { details: Option<String> },

    #[error("{0}")]
    ConfirmationRequired(String),

    #[error("{0}")]
    WhoamiUnavailable(String),

    #[error("operation cancelled")]
    Cancelled,

    /// Connection-level failure (refused, DNS, timeout). Never retried; the
    /// retry loop only classifies response statuses.
    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid response payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::ConfigMissing(_) => "config_missing",
            Error::InvalidArgs { .. } => "invalid_args",
            Error::Http { .. } => "http_error",
            Error::HttpRetry { .. } => "http_retry",
            Error::IdentityNotFound { .. } => "identity_not_found",
            Error::AssignedToRequired { .. } => "assigned_to_required",
            Error::ConfirmationRequired(_) => "confirmation_required",
            Error::WhoamiUnavailable(_) => "whoami_unavailable",
            Error::Cancelled => "cancelled",
            Error::Network(_) => "network_error",
            Error::Decode(_) => "decode_error",
        }
    }

    pub fn details(&self) -> Option<String> {
        match self {
            Error::InvalidArgs { details, .. } => details.clone(),
            Error::Http { body, .. } | Error::HttpRetry { body, .. } => {
                (!body.is_empty()).then(|| body.clone())
            }
            Error::IdentityNotFound { id } => Some(id.clone()),
            Error::AssignedToRequired { details } => details.clone(),
            _ => None,
        }
    }

    pub fn invalid_args(message: impl Into<String>) -> Self {
        Error::InvalidArgs {
            message: message.into(),
            details: None,
        }
    }

    pub fn invalid_args_with(message: impl Into<String>, details: impl Into<String>) -> Self {
        Error::InvalidArgs {
            message: message.into(),
            details: Some(details.into()),
        }
    }
}
