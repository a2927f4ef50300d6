use thiserror::Error;

/// Failures surfaced by a board fetch.
#[derive(Debug, Error)]
pub enum BoardError {
    /// Credentials rejected or session no longer valid.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Transport failure: connection refused, DNS, timeout.
    #[error("Network error: {0}")]
    Network(String),

    /// The service answered with a body we cannot interpret.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Non-success status that is not an auth rejection.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl BoardError {
    pub fn is_auth(&self) -> bool {
        matches!(self, BoardError::Auth(_))
    }

    /// Worth another attempt after a short pause.
    pub fn is_transient(&self) -> bool {
        match self {
            BoardError::Network(_) => true,
            BoardError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for BoardError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BoardError::MalformedResponse(e.to_string())
        } else if e.is_timeout() {
            BoardError::Network(format!("request timed out: {e}"))
        } else {
            BoardError::Network(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, BoardError>;
