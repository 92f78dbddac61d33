use thiserror::Error;

/// Error outputs from `ReclaimKit`
#[derive(Debug, Error)]
pub enum ReclaimError {
    /// The application id or secret is missing, malformed or the two do not belong together
    #[error("invalid_credentials: {0}")]
    InvalidCredentials(String),
    /// The provider reference could not be resolved by the provider directory
    #[error("unknown_provider: {0}")]
    UnknownProvider(String),
    /// The presented string is not a well-formed absolute URL
    #[error("invalid_url: {url} ({reason})")]
    InvalidUrl {
        /// The rejected input.
        url: String,
        /// Why the input was rejected.
        reason: String,
    },
    /// A context entry with the same address is already part of the request
    #[error("duplicate_context: {0}")]
    DuplicateContext(String),
    /// The presented input is not valid for the requested operation
    #[error("invalid_input_{attribute}: {reason}")]
    InvalidInput {
        /// The attribute that is invalid.
        attribute: String,
        /// The reason the input is invalid.
        reason: String,
    },
    /// The request payload could not be signed
    #[error("signing_error: {0}")]
    Signing(String),
    /// An exported request is structurally invalid
    #[error("malformed_config: {0}")]
    MalformedConfig(String),
    /// The signature embedded in an exported request does not match its fields
    #[error("signature_mismatch")]
    SignatureMismatch,
    /// The session has not been registered with the verification network yet
    #[error("session_not_started")]
    SessionNotStarted,
    /// The session tracker was dropped while a caller was still waiting on it
    #[error("session_closed")]
    SessionClosed,
    /// The caller cancelled the wait
    #[error("cancelled")]
    Cancelled,
    /// Network connection error with details
    #[error("network_error: {url} (status: {status:?}) {error}")]
    NetworkError {
        /// The URL of the request.
        url: String,
        /// The HTTP status code of the response, if any.
        status: Option<u16>,
        /// The error message.
        error: String,
        /// Whether the failure is transient: timeouts, connection errors, rate
        /// limiting and server errors.
        retryable: bool,
    },
    /// Unexpected error serializing information
    #[error("serialization_error: {error}")]
    SerializationError {
        /// The error message.
        error: String,
    },
    /// A proof was rejected by the proof validator
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ReclaimError {
    /// Whether retrying the same operation later may succeed.
    ///
    /// Only transport-level failures (timeouts, connection errors, rate limiting and
    /// server errors) are retryable. Everything else requires fixing the input.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkError { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ReclaimError {
    fn from(error: reqwest::Error) -> Self {
        let status = error.status().map(|status| status.as_u16());
        Self::NetworkError {
            url: error
                .url()
                .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
            retryable: error.is_timeout()
                || error.is_connect()
                || status.is_some_and(is_transient_status),
            status,
            error: error.to_string(),
        }
    }
}

/// Rate limiting and server errors.
pub(crate) fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

impl From<serde_json::Error> for ReclaimError {
    fn from(error: serde_json::Error) -> Self {
        Self::SerializationError {
            error: error.to_string(),
        }
    }
}

/// Reasons a returned proof is rejected. Always terminal for the proof in question.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// The claim is not attested by the expected witnesses, or its identifier does not
    /// match the claim information.
    #[error("bad_signature")]
    BadSignature,
    /// The context echoed in the claim differs from the request's context entries.
    #[error("context_mismatch")]
    ContextMismatch,
    /// The claim was produced for a different provider.
    #[error("provider_mismatch")]
    ProviderMismatch,
    /// The claim timestamp is outside the accepted window.
    #[error("expired")]
    Expired,
}
