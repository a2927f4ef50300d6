use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use duebell_core::time::format_local;
use duebell_core::types::NotificationEvent;

use crate::publisher::OutboundMessage;

const DESCRIPTION_LIMIT: usize = 100;
const RULE: &str = "==================================================";

/// How close a card is to its due time, as shown to the recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Overdue,
    Urgent,
    Soon,
    Upcoming,
}

impl Urgency {
    pub fn classify(due_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let minutes = (due_at - now).num_seconds() as f64 / 60.0;
        if minutes < 0.0 {
            Urgency::Overdue
        } else if minutes < 30.0 {
            Urgency::Urgent
        } else if minutes < 60.0 {
            Urgency::Soon
        } else {
            Urgency::Upcoming
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Urgency::Overdue => "OVERDUE",
            Urgency::Urgent => "URGENT (< 30 min)",
            Urgency::Soon => "SOON (< 1 hour)",
            Urgency::Upcoming => "UPCOMING",
        }
    }
}

/// Renders notification batches as plain text for email/SMS subscribers.
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    tz: Tz,
    board_url: String,
}

impl MessageFormatter {
    pub fn new(tz: Tz, board_url: impl Into<String>) -> Self {
        Self {
            tz,
            board_url: board_url.into(),
        }
    }

    /// One message covering every event of a cycle. Subject stays ASCII.
    pub fn format_batch(&self, events: &[NotificationEvent], now: DateTime<Utc>) -> OutboundMessage {
        let count = events.len();
        let subject = format!(
            "Task board alert: {count} card{} due",
            if count == 1 { "" } else { "s" }
        );

        let mut lines = vec![
            format!("Card reminders - {}", format_local(now, self.tz)),
            format!("Cards needing attention: {count}"),
            String::new(),
            "Due cards:".to_string(),
            RULE.to_string(),
        ];

        for (i, event) in events.iter().enumerate() {
            let urgency = Urgency::classify(event.due_at, now);
            let hours = (event.due_at - now).num_seconds() as f64 / 3600.0;
            lines.push(format!("{}. {} [{}]", i + 1, event.title, urgency.label()));
            lines.push(format!("   Board: {}", event.board_title));
            lines.push(format!(
                "   List: {}",
                event.list_title.as_deref().unwrap_or("Unknown List")
            ));
            lines.push(format!("   Due: {}", format_local(event.due_at, self.tz)));
            lines.push(format!("   Time until due: {hours:.1} hours"));
            if let Some(desc) = event
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
            {
                lines.push(format!("   Description: {}", truncate(desc, DESCRIPTION_LIMIT)));
            }
            lines.push(String::new());
        }

        lines.push(RULE.to_string());
        lines.push(format!("Open the board: {}", self.board_url));
        lines.push(String::new());
        lines.push("Automated reminder from duebell.".to_string());

        OutboundMessage {
            subject,
            body: lines.join("\n"),
        }
    }

    /// Synthetic message used to verify the publish path end to end.
    pub fn format_test(&self, topic: &str, now: DateTime<Utc>) -> OutboundMessage {
        let body = [
            format!("duebell test notification - {}", format_local(now, self.tz)),
            String::new(),
            "The notification path is working.".to_string(),
            String::new(),
            format!("Topic: {topic}"),
            format!("Board: {}", self.board_url),
            format!("Timezone: {}", self.tz.name()),
            String::new(),
            "Real reminders are sent when cards come due.".to_string(),
        ]
        .join("\n");

        OutboundMessage {
            subject: "duebell test notification".to_string(),
            body,
        }
    }
}

/// Cut `text` to `limit` characters, appending "..." when shortened.
fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
