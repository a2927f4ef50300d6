use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use duebell_core::config::DuebellConfig;
use duebell_scheduler::ReminderScheduler;

/// Shared state passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: DuebellConfig,
    pub scheduler: Arc<ReminderScheduler>,
}

impl AppState {
    pub fn new(config: DuebellConfig, scheduler: Arc<ReminderScheduler>) -> Self {
        Self { config, scheduler }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/status", get(crate::http::status::status_handler))
        .route("/reminders/run", post(crate::http::reminders::run_handler))
        .route("/test/notify", post(crate::http::test::notify_handler))
        .route("/test/board", post(crate::http::test::board_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::{Duration, Utc};
    use duebell_board::{BoardError, BoardSource, FetchedCards};
    use duebell_core::config::{BoardConfig, GatewayConfig, NotifyConfig, ReminderConfig};
    use duebell_core::types::Card;
    use duebell_notify::{
        Dispatcher, MessageFormatter, MessageId, NotifyError, OutboundMessage, Publisher,
    };
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Semaphore;
    use tower::ServiceExt;

    #[derive(Default)]
    struct FakeBoard {
        cards: Mutex<Vec<Card>>,
        down: AtomicBool,
        bad_credentials: AtomicBool,
        gate: Option<Semaphore>,
    }

    #[async_trait]
    impl BoardSource for FakeBoard {
        fn name(&self) -> &str {
            "fake"
        }

        async fn fetch_due_candidate_cards(&self) -> duebell_board::Result<FetchedCards> {
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            if self.down.load(Ordering::SeqCst) {
                return Err(BoardError::Network("connection refused".into()));
            }
            Ok(FetchedCards {
                cards: self.cards.lock().unwrap().clone(),
                boards_scanned: 1,
                ..Default::default()
            })
        }

        async fn check_connection(&self) -> duebell_board::Result<()> {
            if self.down.load(Ordering::SeqCst) {
                Err(BoardError::Network("connection refused".into()))
            } else {
                Ok(())
            }
        }

        async fn check_access(&self) -> duebell_board::Result<usize> {
            self.check_connection().await?;
            if self.bad_credentials.load(Ordering::SeqCst) {
                return Err(BoardError::Auth("login rejected (401)".into()));
            }
            Ok(3)
        }
    }

    #[derive(Default)]
    struct FakePublisher {
        fail: AtomicBool,
    }

    #[async_trait]
    impl Publisher for FakePublisher {
        fn name(&self) -> &str {
            "fake"
        }

        async fn publish(
            &self,
            _topic: &str,
            _message: &OutboundMessage,
        ) -> duebell_notify::Result<MessageId> {
            if self.fail.load(Ordering::SeqCst) {
                Err(NotifyError::Publish {
                    status: 404,
                    message: "NotFound: Topic does not exist".into(),
                })
            } else {
                Ok(MessageId("m-1".into()))
            }
        }

        async fn check_topic(&self, _topic: &str) -> duebell_notify::Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                Err(NotifyError::Publish {
                    status: 404,
                    message: "NotFound: Topic does not exist".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn config() -> DuebellConfig {
        DuebellConfig {
            gateway: GatewayConfig::default(),
            board: BoardConfig {
                base_url: "http://board.local".into(),
                username: "bot".into(),
                password: "secret".into(),
                request_timeout_secs: 5,
                max_attempts: 1,
            },
            notify: NotifyConfig {
                region: "eu-west-1".into(),
                topic_arn: "arn:aws:sns:eu-west-1:1:reminders".into(),
                profile: None,
                request_timeout_secs: 5,
            },
            reminders: ReminderConfig::default(),
        }
    }

    fn router_with(
        board: Arc<FakeBoard>,
        publisher: Arc<FakePublisher>,
    ) -> (Router, Arc<AppState>) {
        let config = config();
        let dispatcher = Dispatcher::new(
            publisher,
            config.notify.topic_arn.clone(),
            MessageFormatter::new(chrono_tz::UTC, config.board.base_url.clone()),
        );
        let scheduler = Arc::new(ReminderScheduler::new(board, dispatcher, &config.reminders));
        let state = Arc::new(AppState::new(config, scheduler));
        (build_router(Arc::clone(&state)), state)
    }

    fn due_card(id: &str, minutes: i64) -> Card {
        Card {
            id: id.into(),
            title: format!("card {id}"),
            board_id: "b1".into(),
            board_title: "Ops".into(),
            list_title: None,
            description: None,
            due_at: Some(Utc::now() + Duration::minutes(minutes)),
            modified_at: None,
        }
    }

    async fn send(router: Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let resp = router
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_version() {
        let (router, _) = router_with(Arc::default(), Arc::default());
        let (status, body) = send(router, "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["scheduler"], "stopped");
    }

    #[tokio::test]
    async fn manual_run_returns_summary_and_shows_in_status() {
        let board = Arc::new(FakeBoard::default());
        board.cards.lock().unwrap().push(due_card("a", 20));
        let (router, _) = router_with(board, Arc::default());

        let (status, body) = send(router.clone(), "POST", "/reminders/run").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["trigger"], "manual");
        assert_eq!(body["notifications_sent"], 1);
        assert_eq!(body["outcome"], "success");
        let card = &body["due_cards"][0];
        assert_eq!(card["title"], "card a");
        assert_eq!(card["board_title"], "Ops");
        assert_eq!(card["category"], "due-soon");
        assert_eq!(card["delivery"], "notified");
        let hours = card["hours_until_due"].as_f64().unwrap();
        assert!((0.3..=0.34).contains(&hours), "hours_until_due = {hours}");

        let (status, body) = send(router, "GET", "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["scheduler"]["state"], "stopped");
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["board_connection"], true);
        assert_eq!(body["notify_connection"], true);
        assert_eq!(body["scheduler"]["dedup_entries"], 1);
        assert_eq!(body["scheduler"]["recent_runs"].as_array().unwrap().len(), 1);
        assert_eq!(body["settings"]["lookahead_minutes"], 60);
    }

    #[tokio::test]
    async fn failed_cycle_is_a_server_error() {
        let board = Arc::new(FakeBoard::default());
        board.cards.lock().unwrap().push(due_card("a", 20));
        let publisher = Arc::new(FakePublisher::default());
        publisher.fail.store(true, Ordering::SeqCst);
        let (router, _) = router_with(board, publisher);

        let (status, body) = send(router, "POST", "/reminders/run").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["outcome"], "failed");
        assert_eq!(body["notifications_failed"], 1);
    }

    #[tokio::test]
    async fn run_while_busy_is_a_conflict() {
        let board = Arc::new(FakeBoard {
            gate: Some(Semaphore::new(0)),
            ..Default::default()
        });
        let (router, state) = router_with(Arc::clone(&board), Arc::default());

        let first = tokio::spawn(send(router.clone(), "POST", "/reminders/run"));
        for _ in 0..300 {
            if state.scheduler.snapshot().in_flight {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(state.scheduler.snapshot().in_flight);

        let (status, body) = send(router, "POST", "/reminders/run").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "busy");

        board.gate.as_ref().unwrap().add_permits(1);
        let (status, _) = first.await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn connectivity_checks_map_to_bad_gateway() {
        let board = Arc::new(FakeBoard::default());
        let publisher = Arc::new(FakePublisher::default());
        let (router, _) = router_with(Arc::clone(&board), Arc::clone(&publisher));

        let (status, body) = send(router.clone(), "POST", "/test/notify").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message_id"], "m-1");
        let (status, body) = send(router.clone(), "POST", "/test/board").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connection"], true);
        assert_eq!(body["authentication"], true);
        assert_eq!(body["boards_count"], 3);

        publisher.fail.store(true, Ordering::SeqCst);
        board.down.store(true, Ordering::SeqCst);
        let (status, body) = send(router.clone(), "POST", "/test/notify").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("NotFound"));
        let (status, body) = send(router, "POST", "/test/board").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["connection"], false);
    }

    #[tokio::test]
    async fn board_check_reports_rejected_login() {
        let board = Arc::new(FakeBoard::default());
        board.bad_credentials.store(true, Ordering::SeqCst);
        let (router, _) = router_with(board, Arc::default());

        let (status, body) = send(router, "POST", "/test/board").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["connection"], true);
        assert_eq!(body["authentication"], false);
        assert!(body.get("boards_count").is_none());
        assert!(body["error"].as_str().unwrap().contains("Authentication failed"));
    }

    #[tokio::test]
    async fn status_is_healthy_only_when_running_and_both_services_answer() {
        let board = Arc::new(FakeBoard::default());
        let publisher = Arc::new(FakePublisher::default());
        let (router, state) = router_with(Arc::clone(&board), Arc::clone(&publisher));

        state
            .scheduler
            .start(std::time::Duration::from_secs(3600))
            .unwrap();
        let (_, body) = send(router.clone(), "GET", "/status").await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["scheduler"]["state"], "running");

        publisher.fail.store(true, Ordering::SeqCst);
        let (status, body) = send(router.clone(), "GET", "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["board_connection"], true);
        assert_eq!(body["notify_connection"], false);

        publisher.fail.store(false, Ordering::SeqCst);
        board.bad_credentials.store(true, Ordering::SeqCst);
        let (_, body) = send(router, "GET", "/status").await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["board_connection"], false);

        state.scheduler.stop().await.unwrap();
    }
}
