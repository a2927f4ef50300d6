use thiserror::Error;

/// Errors returned by scheduler control operations.
///
/// Cycle failures are not errors here; they are reported in the
/// [`RunSummary`](crate::types::RunSummary).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// `start` was called while the interval task is already running.
    #[error("Scheduler is already running")]
    AlreadyRunning,

    /// `stop` was called while no interval task is running.
    #[error("Scheduler is not running")]
    NotRunning,

    /// `start` was given a zero interval.
    #[error("Scheduler interval must be greater than zero")]
    InvalidInterval,

    /// A cycle is already in flight.
    #[error("A reminder cycle is already in progress")]
    Busy,
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
