use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

use crate::error::Result;

/// A rendered notification ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub subject: String,
    pub body: String,
}

/// Identifier assigned by the messaging endpoint to an accepted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pub/sub publish endpoint.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Endpoint name for logging.
    fn name(&self) -> &str;

    /// Publish `message` to `topic`. `Ok` means the endpoint accepted it.
    async fn publish(&self, topic: &str, message: &OutboundMessage) -> Result<MessageId>;

    /// Confirm `topic` exists and the credentials can read it. Sends nothing.
    async fn check_topic(&self, topic: &str) -> Result<()>;
}
