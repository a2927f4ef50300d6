//! `duebell-core`: configuration, error taxonomy and the domain types shared
//! by the board client, the notifier and the scheduler.

pub mod config;
pub mod error;
pub mod time;
pub mod types;

pub use error::{DuebellError, Result};
