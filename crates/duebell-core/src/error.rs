use thiserror::Error;

/// Configuration and value-parsing failures raised before the service starts.
#[derive(Debug, Error)]
pub enum DuebellError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid timestamp '{raw}': {reason}")]
    InvalidTimestamp { raw: String, reason: String },
}

impl DuebellError {
    /// Stable code attached to startup error logs.
    pub fn code(&self) -> &'static str {
        match self {
            DuebellError::Config(_) => "CONFIG_ERROR",
            DuebellError::InvalidTimezone(_) => "INVALID_TIMEZONE",
            DuebellError::InvalidTimestamp { .. } => "INVALID_TIMESTAMP",
        }
    }
}

pub type Result<T> = std::result::Result<T, DuebellError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(DuebellError::Config("x".into()).code(), "CONFIG_ERROR");
        assert_eq!(DuebellError::InvalidTimezone("Mars/Base".into()).code(), "INVALID_TIMEZONE");
        let err = DuebellError::InvalidTimestamp {
            raw: "tomorrow".into(),
            reason: "not RFC 3339".into(),
        };
        assert_eq!(err.code(), "INVALID_TIMESTAMP");
        assert_eq!(err.to_string(), "Invalid timestamp 'tomorrow': not RFC 3339");
    }
}
