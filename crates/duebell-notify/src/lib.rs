//! `duebell-notify`: turns due-card events into one message per cycle and
//! publishes it to the messaging endpoint.
//!
//! | Piece              | Role                                             |
//! |--------------------|--------------------------------------------------|
//! | [`MessageFormatter`] | Subject + plain-text body for a batch          |
//! | [`Publisher`]      | `publish(topic, message)` seam                   |
//! | [`SnsPublisher`]   | AWS SNS query API with SigV4 signing             |
//! | [`Dispatcher`]     | Batching, timeout, success/failure accounting    |

pub mod dispatcher;
pub mod error;
pub mod format;
pub mod publisher;
pub mod sns;

pub use dispatcher::{Dispatcher, PublishOutcome};
pub use error::{NotifyError, Result};
pub use format::MessageFormatter;
pub use publisher::{MessageId, OutboundMessage, Publisher};
pub use sns::{AwsCredentials, SnsPublisher};
