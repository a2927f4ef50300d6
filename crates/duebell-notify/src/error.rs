use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    /// The endpoint answered and refused the message.
    #[error("Publish rejected ({status}): {message}")]
    Publish { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Publish timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Credentials unavailable: {0}")]
    Credentials(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for NotifyError {
    fn from(e: reqwest::Error) -> Self {
        NotifyError::Network(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NotifyError>;
