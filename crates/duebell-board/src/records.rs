//! Wekan wire records and their normalization into [`Card`]s.

use chrono_tz::Tz;
use duebell_core::{
    time::parse_instant,
    types::{BoardId, Card, CardId},
};
use serde::Deserialize;
use serde_json::Value;

/// `POST /users/login` response.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub id: String,
    pub token: String,
    #[serde(rename = "tokenExpires", default)]
    pub token_expires: Option<String>,
}

/// Entry of `GET /api/users/{id}/boards`.
#[derive(Debug, Clone, Deserialize)]
pub struct BoardRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl BoardRecord {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Unknown Board")
    }
}

/// Entry of `GET /api/boards/{id}/lists`.
#[derive(Debug, Clone, Deserialize)]
pub struct ListRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Why a raw card record was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedCard(pub String);

/// Normalize one raw card record.
///
/// Returns `Ok(None)` for a well-formed card without a due date and
/// `Err(MalformedCard)` when the record cannot be trusted.
pub fn normalize_card(
    raw: &Value,
    board: &BoardRecord,
    list: &ListRecord,
    default_tz: Tz,
) -> Result<Option<Card>, MalformedCard> {
    let obj = raw
        .as_object()
        .ok_or_else(|| MalformedCard("card record is not an object".into()))?;

    let id = match obj.get("_id") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        _ => return Err(MalformedCard("card record has no _id".into())),
    };

    let due_at = match obj.get("dueAt") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => parse_instant(s, default_tz)
            .map_err(|e| MalformedCard(format!("card {id}: {e}")))?,
        Some(other) => {
            return Err(MalformedCard(format!(
                "card {id}: dueAt is not a string ({other})"
            )))
        }
    };

    let title = obj
        .get("title")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or("Untitled")
        .to_string();

    let description = obj
        .get("description")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(String::from);

    // Only informational; a bad value does not invalidate the card.
    let modified_at = obj
        .get("modifiedAt")
        .and_then(Value::as_str)
        .and_then(|s| parse_instant(s, default_tz).ok());

    Ok(Some(Card {
        id: CardId(id),
        title,
        board_id: BoardId(board.id.clone()),
        board_title: board.display_title().to_string(),
        list_title: list.title.clone(),
        description,
        due_at: Some(due_at),
        modified_at,
    }))
}
