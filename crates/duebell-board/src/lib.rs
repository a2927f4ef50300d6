//! `duebell-board`: read-only client for the task-board service.
//!
//! [`BoardSource`] is the seam the scheduler depends on; [`WekanClient`] is
//! the production implementation backed by the Wekan REST API.

pub mod error;
pub mod records;
pub mod source;
pub mod wekan;

pub use error::{BoardError, Result};
pub use source::{BoardSource, FetchedCards};
pub use wekan::WekanClient;
