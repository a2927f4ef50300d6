use chrono::{DateTime, Utc};
use duebell_core::types::{CardId, DueCategory, NotificationEvent};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What started a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Scheduled,
    Manual,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Trigger::Scheduled => "scheduled",
            Trigger::Manual => "manual",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Everything fetched and every pending notification was published.
    Success,
    /// Notifications went out but some records or boards were skipped.
    Partial,
    /// The board could not be read or the publish failed.
    Failed,
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunOutcome::Success => "success",
            RunOutcome::Partial => "partial",
            RunOutcome::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// What happened to one due card in a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Included in this cycle's published message.
    Notified,
    /// Suppressed; a reminder for this due date went out earlier.
    AlreadyNotified,
    /// Included in a batch the publisher did not accept.
    Failed,
}

/// A card inside the due window, as reported for a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueCardReport {
    pub card_id: CardId,
    pub title: String,
    pub board_title: String,
    pub list_title: Option<String>,
    pub due_at: DateTime<Utc>,
    pub category: DueCategory,
    /// Negative when overdue, rounded to two decimals.
    pub hours_until_due: f64,
    pub delivery: DeliveryStatus,
}

impl DueCardReport {
    pub(crate) fn new(event: &NotificationEvent, now: DateTime<Utc>, delivery: DeliveryStatus) -> Self {
        let hours = (event.due_at - now).num_seconds() as f64 / 3600.0;
        Self {
            card_id: event.card_id.clone(),
            title: event.title.clone(),
            board_title: event.board_title.clone(),
            list_title: event.list_title.clone(),
            due_at: event.due_at,
            category: event.category,
            hours_until_due: (hours * 100.0).round() / 100.0,
            delivery,
        }
    }
}

/// Recorded outcome of one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: Uuid,
    pub trigger: Trigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Cards with a due timestamp returned by the board.
    pub cards_scanned: usize,
    /// Records the board client could not interpret.
    pub malformed_skipped: usize,
    pub due_soon: usize,
    pub overdue: usize,
    /// Events dropped because they were already notified.
    pub suppressed: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    /// Every card inside the due window, including suppressed ones.
    pub due_cards: Vec<DueCardReport>,
    pub errors: Vec<String>,
    pub outcome: RunOutcome,
}

impl RunSummary {
    pub(crate) fn begin(trigger: Trigger, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            trigger,
            started_at,
            finished_at: started_at,
            cards_scanned: 0,
            malformed_skipped: 0,
            due_soon: 0,
            overdue: 0,
            suppressed: 0,
            notifications_sent: 0,
            notifications_failed: 0,
            due_cards: Vec::new(),
            errors: Vec::new(),
            outcome: RunOutcome::Success,
        }
    }

    pub fn due_found(&self) -> usize {
        self.due_soon + self.overdue
    }

    /// Cards this cycle actually delivered a reminder for.
    pub fn notified_cards(&self) -> Vec<&CardId> {
        self.due_cards
            .iter()
            .filter(|c| c.delivery == DeliveryStatus::Notified)
            .map(|c| &c.card_id)
            .collect()
    }
}

/// Whether the interval task is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// Coarse status for the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "last_run", rename_all = "snake_case")]
pub enum LastStatus {
    Stopped,
    /// Running, no cycle has finished yet.
    Idle,
    Completed(RunSummary),
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerSnapshot {
    pub state: SchedulerState,
    pub interval_secs: Option<u64>,
    pub in_flight: bool,
    pub dedup_entries: usize,
    /// Newest first.
    pub recent_runs: Vec<RunSummary>,
}
