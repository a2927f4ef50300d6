use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Card identifier as issued by the board service (opaque, unique per board).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CardId(pub String);

impl CardId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CardId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CardId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Board identifier as issued by the board service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoardId(pub String);

impl BoardId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BoardId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Normalized card snapshot taken during one fetch.
///
/// All timestamps are UTC; the board client applies the configured default
/// zone to naive source values before building a `Card`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub title: String,
    pub board_id: BoardId,
    pub board_title: String,
    pub list_title: Option<String>,
    pub description: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Why a card is being notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DueCategory {
    DueSoon,
    Overdue,
}

impl fmt::Display for DueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DueCategory::DueSoon => write!(f, "due-soon"),
            DueCategory::Overdue => write!(f, "overdue"),
        }
    }
}

/// One notifiable obligation produced by the due-window evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub card_id: CardId,
    pub title: String,
    pub board_id: BoardId,
    pub board_title: String,
    pub list_title: Option<String>,
    pub description: Option<String>,
    pub due_at: DateTime<Utc>,
    pub category: DueCategory,
    pub generated_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn key(&self) -> DedupKey {
        DedupKey {
            card_id: self.card_id.clone(),
            due_at: self.due_at,
        }
    }
}

/// Identity of a notifiable obligation: a card whose due date moves becomes a
/// different key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DedupKey {
    pub card_id: CardId,
    pub due_at: DateTime<Utc>,
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.card_id, self.due_at.to_rfc3339())
    }
}
