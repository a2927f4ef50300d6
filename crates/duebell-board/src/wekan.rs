//! Wekan REST client.
//!
//! Auth flow:
//!   1. `POST /users/login` exchanges username/password for a bearer token and
//!      the user id; both are cached for the process lifetime.
//!   2. When any call is rejected with 401/403 the cached session is dropped
//!      and the fetch restarts after a fresh login. That happens at most once
//!      per fetch; transient retries do not re-arm it.

use std::time::Duration;

use async_trait::async_trait;
use chrono_tz::Tz;
use duebell_core::config::BoardConfig;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{BoardError, Result};
use crate::records::{normalize_card, BoardRecord, ListRecord, LoginResponse};
use crate::source::{BoardSource, FetchedCards};

const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
struct Session {
    user_id: String,
    token: String,
}

pub struct WekanClient {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    default_tz: Tz,
    max_attempts: u32,
    retry_backoff: Duration,
    session: RwLock<Option<Session>>,
}

impl WekanClient {
    pub fn new(config: &BoardConfig, default_tz: Tz) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| BoardError::Network(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            default_tz,
            max_attempts: config.max_attempts.max(1),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            session: RwLock::new(None),
        })
    }

    /// Override the pause between transport retries (grows linearly per attempt).
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Return the cached session, logging in first if there is none.
    async fn ensure_session(&self) -> Result<Session> {
        // Fast path: read lock
        {
            let cached = self.session.read().await;
            if let Some(ref s) = *cached {
                return Ok(s.clone());
            }
        }

        // Slow path: write lock; another task may have logged in meanwhile.
        let mut cached = self.session.write().await;
        if let Some(ref s) = *cached {
            return Ok(s.clone());
        }

        let session = self.login().await?;
        *cached = Some(session.clone());
        Ok(session)
    }

    async fn invalidate_session(&self) {
        *self.session.write().await = None;
    }

    async fn login(&self) -> Result<Session> {
        let url = format!("{}/users/login", self.base_url);
        info!(%url, user = %self.username, "logging in to Wekan");

        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "username": self.username,
                "password": self.password,
            }))
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status >= 500 {
            let text = resp.text().await.unwrap_or_default();
            return Err(BoardError::Api {
                status,
                message: format!("login failed: {text}"),
            });
        }
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Wekan login rejected");
            return Err(BoardError::Auth(format!("login rejected with status {status}")));
        }

        let body = resp.text().await?;
        let login: LoginResponse = serde_json::from_str(&body)
            .map_err(|e| BoardError::MalformedResponse(format!("login response: {e}")))?;
        if login.token.is_empty() {
            return Err(BoardError::Auth("login returned an empty token".into()));
        }

        debug!(user_id = %login.id, expires = ?login.token_expires, "Wekan session established");
        Ok(Session {
            user_id: login.id,
            token: login.token,
        })
    }

    /// Authenticated GET returning the parsed JSON body.
    async fn get_json(&self, url: &str, token: &str) -> Result<Value> {
        let resp = self.client.get(url).bearer_auth(token).send().await?;

        let status = resp.status().as_u16();
        if status == 401 || status == 403 {
            return Err(BoardError::Auth(format!("{url} rejected the session ({status})")));
        }
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(BoardError::Api {
                status,
                message: text,
            });
        }

        let body = resp.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| BoardError::MalformedResponse(format!("{url}: {e}")))
    }

    async fn get_array(&self, url: &str, token: &str) -> Result<Vec<Value>> {
        match self.get_json(url, token).await? {
            Value::Array(items) => Ok(items),
            other => Err(BoardError::MalformedResponse(format!(
                "{url}: expected a JSON array, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// One full scan with whatever session is current.
    async fn fetch_once(&self) -> Result<FetchedCards> {
        let session = self.ensure_session().await?;
        let mut out = FetchedCards::default();

        let boards_url = format!("{}/api/users/{}/boards", self.base_url, session.user_id);
        let boards = self.get_array(&boards_url, &session.token).await?;
        info!(count = boards.len(), "retrieved boards");

        for raw_board in boards {
            let board: BoardRecord = match serde_json::from_value(raw_board) {
                Ok(b) => b,
                Err(e) => {
                    warn!("skipping malformed board record: {e}");
                    out.malformed += 1;
                    continue;
                }
            };
            out.boards_scanned += 1;
            self.fetch_board(&board, &session, &mut out).await?;
        }

        info!(
            boards = out.boards_scanned,
            cards = out.cards.len(),
            malformed = out.malformed,
            unreachable = out.unreachable,
            "board scan complete"
        );
        Ok(out)
    }

    async fn fetch_board(
        &self,
        board: &BoardRecord,
        session: &Session,
        out: &mut FetchedCards,
    ) -> Result<()> {
        let lists_url = format!("{}/api/boards/{}/lists", self.base_url, board.id);
        let lists = match self.get_array(&lists_url, &session.token).await {
            Ok(lists) => lists,
            Err(BoardError::Api { status, .. }) => {
                warn!(board_id = %board.id, status, "cannot list board lists, skipping board");
                out.unreachable += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        for raw_list in lists {
            let list: ListRecord = match serde_json::from_value(raw_list) {
                Ok(l) => l,
                Err(e) => {
                    warn!(board_id = %board.id, "skipping malformed list record: {e}");
                    out.malformed += 1;
                    continue;
                }
            };

            let cards_url = format!(
                "{}/api/boards/{}/lists/{}/cards",
                self.base_url, board.id, list.id
            );
            let cards = match self.get_array(&cards_url, &session.token).await {
                Ok(cards) => cards,
                Err(BoardError::Api { status, .. }) => {
                    warn!(board_id = %board.id, list_id = %list.id, status, "cannot fetch list cards, skipping list");
                    out.unreachable += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            for raw in &cards {
                match normalize_card(raw, board, &list, self.default_tz) {
                    Ok(Some(card)) => {
                        debug!(card_id = %card.id, title = %card.title, due = ?card.due_at, "due candidate");
                        out.cards.push(card);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(board_id = %board.id, list_id = %list.id, reason = %e.0, "skipping malformed card");
                        out.malformed += 1;
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BoardSource for WekanClient {
    fn name(&self) -> &str {
        "wekan"
    }

    async fn fetch_due_candidate_cards(&self) -> Result<FetchedCards> {
        let mut attempt = 1;
        let mut reauthenticated = false;
        loop {
            match self.fetch_once().await {
                // At most one fresh login per fetch, whatever the transport does.
                Err(e) if e.is_auth() && !reauthenticated => {
                    warn!("board fetch rejected ({e}), re-authenticating once");
                    self.invalidate_session().await;
                    reauthenticated = true;
                }
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    warn!(attempt, max = self.max_attempts, "board fetch failed: {e}; retrying");
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    async fn check_connection(&self) -> Result<()> {
        let url = format!("{}/api/version", self.base_url);
        let resp = self.client.get(&url).send().await?;
        let status = resp.status().as_u16();
        if resp.status().is_success() {
            info!(%url, "Wekan API reachable");
            Ok(())
        } else {
            let text = resp.text().await.unwrap_or_default();
            Err(BoardError::Api {
                status,
                message: text,
            })
        }
    }

    async fn check_access(&self) -> Result<usize> {
        // Always a fresh login: a cached token would hide changed credentials.
        let session = self.login().await?;
        *self.session.write().await = Some(session.clone());

        let boards_url = format!("{}/api/users/{}/boards", self.base_url, session.user_id);
        let boards = self.get_array(&boards_url, &session.token).await?;
        info!(boards = boards.len(), "Wekan credentials accepted");
        Ok(boards.len())
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
