//! `duebell-scheduler`: the reminder cycle and the loop that drives it.
//!
//! # Overview
//!
//! Each cycle fetches due candidates from a [`duebell_board::BoardSource`],
//! keeps the ones inside the due window ([`window::evaluate`]), drops those
//! already notified ([`DedupTracker`]), and hands the rest to a
//! [`duebell_notify::Dispatcher`]. The outcome of every cycle is kept in a
//! bounded [`RunHistory`].
//!
//! | Trigger     | Path                                              |
//! |-------------|---------------------------------------------------|
//! | `Scheduled` | Interval task started by [`ReminderScheduler::start`] |
//! | `Manual`    | [`ReminderScheduler::trigger_now`]                |
//!
//! Only one cycle runs at a time; whichever trigger arrives second is
//! rejected with [`SchedulerError::Busy`] (scheduled ticks just skip).

pub mod dedup;
pub mod engine;
pub mod error;
pub mod history;
pub mod types;
pub mod window;

pub use dedup::DedupTracker;
pub use engine::ReminderScheduler;
pub use error::{Result, SchedulerError};
pub use history::RunHistory;
pub use types::{
    DeliveryStatus, DueCardReport, LastStatus, RunOutcome, RunSummary, SchedulerSnapshot,
    SchedulerState, Trigger,
};
pub use window::{evaluate, WindowSettings};
