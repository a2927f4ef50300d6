//! Due-window evaluation.
//!
//! A card is **due soon** when `now <= due < now + lookahead`, and
//! **overdue** when `due < now` and it has been overdue for at most
//! `overdue_ceiling`. Anything else produces no event.

use chrono::{DateTime, Duration, Utc};
use duebell_core::config::ReminderConfig;
use duebell_core::types::{Card, DueCategory, NotificationEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSettings {
    pub lookahead: Duration,
    pub overdue_ceiling: Duration,
}

impl WindowSettings {
    pub fn from_config(config: &ReminderConfig) -> Self {
        Self {
            lookahead: config.lookahead(),
            overdue_ceiling: config.overdue_retention(),
        }
    }

    pub fn classify(&self, due: DateTime<Utc>, now: DateTime<Utc>) -> Option<DueCategory> {
        if due >= now {
            (due < now + self.lookahead).then_some(DueCategory::DueSoon)
        } else {
            (now - due <= self.overdue_ceiling).then_some(DueCategory::Overdue)
        }
    }
}

/// Events for every card inside the window, ordered by due time.
pub fn evaluate(
    cards: &[Card],
    now: DateTime<Utc>,
    settings: &WindowSettings,
) -> Vec<NotificationEvent> {
    let mut events: Vec<NotificationEvent> = cards
        .iter()
        .filter_map(|card| {
            let due = card.due_at?;
            let category = settings.classify(due, now)?;
            Some(NotificationEvent {
                card_id: card.id.clone(),
                title: card.title.clone(),
                board_id: card.board_id.clone(),
                board_title: card.board_title.clone(),
                list_title: card.list_title.clone(),
                description: card.description.clone(),
                due_at: due,
                category,
                generated_at: now,
            })
        })
        .collect();

    // Card id breaks ties so equal due times keep a stable order.
    events.sort_by(|a, b| a.due_at.cmp(&b.due_at).then_with(|| a.card_id.cmp(&b.card_id)));
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, h, m, s).unwrap()
    }

    fn card(id: &str, due: Option<DateTime<Utc>>) -> Card {
        Card {
            id: id.into(),
            title: format!("card {id}"),
            board_id: "b1".into(),
            board_title: "Ops".into(),
            list_title: None,
            description: None,
            due_at: due,
            modified_at: None,
        }
    }

    fn settings() -> WindowSettings {
        WindowSettings {
            lookahead: Duration::minutes(60),
            overdue_ceiling: Duration::hours(24),
        }
    }

    fn ids(events: &[NotificationEvent]) -> Vec<&str> {
        events.iter().map(|e| e.card_id.as_str()).collect()
    }

    #[test]
    fn lookahead_boundaries() {
        let now = at(12, 0, 0);
        let s = settings();
        assert_eq!(s.classify(at(12, 59, 59), now), Some(DueCategory::DueSoon));
        assert_eq!(s.classify(at(13, 0, 0), now), None);
        assert_eq!(s.classify(at(13, 0, 1), now), None);
        assert_eq!(s.classify(now, now), Some(DueCategory::DueSoon));
        assert_eq!(s.classify(at(11, 59, 59), now), Some(DueCategory::Overdue));
    }

    #[test]
    fn overdue_ceiling_is_inclusive() {
        let now = at(12, 0, 0);
        let s = settings();
        assert_eq!(
            s.classify(now - Duration::hours(24), now),
            Some(DueCategory::Overdue)
        );
        assert_eq!(
            s.classify(now - Duration::hours(24) - Duration::seconds(1), now),
            None
        );
    }

    #[test]
    fn reference_scenario() {
        let now = at(12, 0, 0);
        let cards = vec![
            card("B", Some(at(13, 5, 0))),
            card("A", Some(at(12, 30, 0))),
            card("C", Some(at(11, 50, 0))),
            card("D", None),
        ];
        let events = evaluate(&cards, now, &settings());
        assert_eq!(ids(&events), vec!["C", "A"]);
        assert_eq!(events[0].category, DueCategory::Overdue);
        assert_eq!(events[1].category, DueCategory::DueSoon);
        assert!(events.iter().all(|e| e.generated_at == now));
    }

    #[test]
    fn output_is_sorted_by_due_time() {
        let now = at(12, 0, 0);
        let cards = vec![
            card("z", Some(at(12, 40, 0))),
            card("y", Some(at(12, 10, 0))),
            card("x", Some(at(12, 40, 0))),
            card("w", Some(at(9, 0, 0))),
        ];
        let events = evaluate(&cards, now, &settings());
        assert_eq!(ids(&events), vec!["w", "y", "x", "z"]);
    }
}
