use async_trait::async_trait;
use duebell_core::types::Card;
use serde::Serialize;

use crate::error::Result;

/// Outcome of one full board scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchedCards {
    /// Cards that carry a due timestamp.
    pub cards: Vec<Card>,
    pub boards_scanned: usize,
    /// Card, list or board records that could not be normalized.
    pub malformed: usize,
    /// Boards or lists whose endpoint answered with an error status.
    pub unreachable: usize,
}

/// Read-only view of the task-board service.
#[async_trait]
pub trait BoardSource: Send + Sync {
    /// Source name for logging.
    fn name(&self) -> &str;

    /// Enumerate every accessible board and return its cards that have a due
    /// date. Individual malformed records are skipped and counted.
    async fn fetch_due_candidate_cards(&self) -> Result<FetchedCards>;

    /// Cheap reachability check that does not require credentials.
    async fn check_connection(&self) -> Result<()>;

    /// Log in with the configured credentials and count the accessible boards.
    async fn check_access(&self) -> Result<usize>;
}
