use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{DuebellError, Result};

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_BOARD_URL: &str = "http://localhost:80";
pub const DEFAULT_REGION: &str = "eu-west-1";
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Top-level config (duebell.toml + DUEBELL_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuebellConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    pub board: BoardConfig,
    pub notify: NotifyConfig,
    #[serde(default)]
    pub reminders: ReminderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

/// Task-board (Wekan) connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    #[serde(default = "default_board_url")]
    pub base_url: String,
    #[serde(deserialize_with = "lenient_string")]
    pub username: String,
    #[serde(deserialize_with = "lenient_string")]
    pub password: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Total attempts per fetch when the transport fails (not for auth errors).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Messaging endpoint (SNS) settings. AWS credentials come from the standard
/// chain: AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY or ~/.aws/credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_region")]
    pub region: String,
    pub topic_arn: String,
    /// Profile name in ~/.aws/credentials (default: "default").
    pub profile: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Due-window and scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    #[serde(default = "default_lookahead_minutes")]
    pub lookahead_minutes: u32,
    #[serde(default = "default_poll_interval_minutes")]
    pub poll_interval_minutes: u32,
    /// Overdue cards older than this are neither notified nor remembered.
    #[serde(default = "default_overdue_retention_hours")]
    pub overdue_retention_hours: u32,
    /// IANA zone applied to board timestamps that carry no offset.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Number of run summaries kept for status reporting.
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            lookahead_minutes: default_lookahead_minutes(),
            poll_interval_minutes: default_poll_interval_minutes(),
            overdue_retention_hours: default_overdue_retention_hours(),
            timezone: default_timezone(),
            history_size: default_history_size(),
        }
    }
}

impl ReminderConfig {
    pub fn tz(&self) -> Result<Tz> {
        crate::time::parse_timezone(&self.timezone)
    }

    pub fn lookahead(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.lookahead_minutes))
    }

    pub fn overdue_retention(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.overdue_retention_hours))
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.poll_interval_minutes) * 60)
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_board_url() -> String {
    DEFAULT_BOARD_URL.to_string()
}
fn default_region() -> String {
    DEFAULT_REGION.to_string()
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_max_attempts() -> u32 {
    2
}
fn default_lookahead_minutes() -> u32 {
    60
}
fn default_poll_interval_minutes() -> u32 {
    60
}
fn default_overdue_retention_hours() -> u32 {
    24
}
fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}
fn default_history_size() -> usize {
    20
}

/// Env values are type-guessed by figment, so a numeric password arrives as
/// a number. Accept any scalar and keep its textual form.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Str(String),
        Int(i64),
        UInt(u64),
        Float(f64),
        Bool(bool),
    }

    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Str(s) => s,
        Scalar::Int(n) => n.to_string(),
        Scalar::UInt(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
        Scalar::Bool(b) => b.to_string(),
    })
}

impl DuebellConfig {
    /// Load config from a TOML file, then the legacy environment names of the
    /// previous deployment, then DUEBELL_* overrides (`__` separates nesting,
    /// e.g. `DUEBELL_REMINDERS__LOOKAHEAD_MINUTES=30`).
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        tracing::debug!(%path, "loading configuration");

        let config: DuebellConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(legacy_env())
            .merge(Env::prefixed("DUEBELL_").split("__"))
            .extract()
            .map_err(|e| DuebellError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the scheduler cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(self.board.base_url.starts_with("http://") || self.board.base_url.starts_with("https://")) {
            return Err(DuebellError::Config(format!(
                "board.base_url must be an http(s) URL, got '{}'",
                self.board.base_url
            )));
        }
        if self.board.max_attempts == 0 {
            return Err(DuebellError::Config("board.max_attempts must be >= 1".into()));
        }
        if self.notify.topic_arn.trim().is_empty() {
            return Err(DuebellError::Config("notify.topic_arn is required".into()));
        }
        if self.reminders.poll_interval_minutes == 0 {
            return Err(DuebellError::Config(
                "reminders.poll_interval_minutes must be >= 1".into(),
            ));
        }
        if self.reminders.lookahead_minutes == 0 {
            return Err(DuebellError::Config(
                "reminders.lookahead_minutes must be >= 1".into(),
            ));
        }
        if self.reminders.history_size == 0 {
            return Err(DuebellError::Config("reminders.history_size must be >= 1".into()));
        }
        self.reminders.tz()?;
        Ok(())
    }
}

/// Variable names used by earlier deployments of this service.
fn legacy_env() -> Env {
    Env::raw().filter_map(|key| {
        let mapped = match key.as_str().to_ascii_uppercase().as_str() {
            "WEKAN_URL" => "board.base_url",
            "WEKAN_USER" => "board.username",
            "WEKAN_PASSWORD" => "board.password",
            "AWS_REGION" => "notify.region",
            "SNS_TOPIC_ARN" => "notify.topic_arn",
            "SCHEDULER_INTERVAL_MINUTES" => "reminders.poll_interval_minutes",
            _ => return None,
        };
        Some(mapped.into())
    })
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.duebell/duebell.toml", home)
}
