//! AWS SNS publisher with SigV4 authentication.
//!
//! Auth flow:
//!   1. Resolves AWS credentials:
//!      - `notify.profile` set: that profile from the shared credentials file
//!      - otherwise AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY / AWS_SESSION_TOKEN
//!      - otherwise the AWS_PROFILE (or `default`) profile from the file
//!   2. Signs each request with SigV4 (HMAC-SHA256).
//!   3. Sends an `Action=Publish` (or `GetTopicAttributes` for health checks)
//!      form request to the regional SNS endpoint.
//!
//! SNS answers in XML; only `MessageId` and the error `Code`/`Message` are
//! needed, so they are pulled out by tag rather than with a full parser.

use std::time::Duration;

use async_trait::async_trait;
use duebell_core::config::NotifyConfig;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info};

use crate::error::{NotifyError, Result};
use crate::publisher::{MessageId, OutboundMessage, Publisher};

type HmacSha256 = Hmac<Sha256>;

const SNS_API_VERSION: &str = "2010-03-31";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

/// AWS credentials resolved from the standard chain.
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

pub struct SnsPublisher {
    client: reqwest::Client,
    credentials: AwsCredentials,
    region: String,
    endpoint: String,
}

impl SnsPublisher {
    pub fn new(credentials: AwsCredentials, region: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Network(format!("cannot build HTTP client: {e}")))?;
        let endpoint = format!("https://sns.{region}.amazonaws.com/");
        Ok(Self {
            client,
            credentials,
            region,
            endpoint,
        })
    }

    /// Build from config, resolving credentials from the profile, env vars or the shared file.
    pub fn from_config(config: &NotifyConfig) -> Result<Self> {
        let creds = resolve_aws_credentials(config.profile.as_deref())?;
        info!(region = %config.region, "SNS publisher initialised");
        Self::new(
            creds,
            config.region.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Point at a different endpoint (local SNS emulators, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sign and send a form-encoded request to SNS.
    async fn signed_request(&self, body: &str) -> Result<reqwest::Response> {
        let now = chrono::Utc::now();
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

        let parsed = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| NotifyError::Network(format!("bad SNS endpoint: {e}")))?;
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(h), Some(p)) => format!("{h}:{p}"),
            (Some(h), None) => h.to_string(),
            (None, _) => return Err(NotifyError::Network("SNS endpoint has no host".into())),
        };
        let path = parsed.path();

        let payload_hash = hex::encode(Sha256::digest(body.as_bytes()));
        let mut signed_headers = "content-type;host;x-amz-date".to_string();
        let mut canonical_headers =
            format!("content-type:{FORM_CONTENT_TYPE}\nhost:{host}\nx-amz-date:{amz_date}\n");

        if let Some(ref token) = self.credentials.session_token {
            canonical_headers.push_str(&format!("x-amz-security-token:{token}\n"));
            signed_headers.push_str(";x-amz-security-token");
        }

        let canonical_request =
            format!("POST\n{path}\n\n{canonical_headers}\n{signed_headers}\n{payload_hash}");

        let credential_scope = format!("{date_stamp}/{}/sns/aws4_request", self.region);
        let canonical_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));
        let string_to_sign =
            format!("AWS4-HMAC-SHA256\n{amz_date}\n{credential_scope}\n{canonical_hash}");

        let signing_key = derive_signing_key(
            &self.credentials.secret_access_key,
            &date_stamp,
            &self.region,
            "sns",
        )?;
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);
        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.credentials.access_key_id, credential_scope, signed_headers, signature
        );

        let mut builder = self
            .client
            .post(self.endpoint.as_str())
            .header("Content-Type", FORM_CONTENT_TYPE)
            .header("x-amz-date", &amz_date)
            .header("Authorization", &authorization);

        if let Some(ref token) = self.credentials.session_token {
            builder = builder.header("x-amz-security-token", token);
        }

        let resp = builder.body(body.to_string()).send().await?;
        Ok(resp)
    }
}

#[async_trait]
impl Publisher for SnsPublisher {
    fn name(&self) -> &str {
        "sns"
    }

    async fn publish(&self, topic: &str, message: &OutboundMessage) -> Result<MessageId> {
        let body = publish_form(topic, message);
        debug!(%topic, region = %self.region, bytes = body.len(), "publishing to SNS");

        let resp = self.signed_request(&body).await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;

        if !(200..300).contains(&status) {
            return Err(rejection("Publish", status, &text));
        }

        let id = extract_xml_tag(&text, "MessageId").ok_or_else(|| {
            NotifyError::MalformedResponse("SNS response has no MessageId".into())
        })?;
        info!(message_id = %id, "SNS notification accepted");
        Ok(MessageId(id.to_string()))
    }

    async fn check_topic(&self, topic: &str) -> Result<()> {
        let body = topic_attributes_form(topic);
        let resp = self.signed_request(&body).await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;

        if !(200..300).contains(&status) {
            return Err(rejection("GetTopicAttributes", status, &text));
        }
        let display_name = extract_xml_tag(&text, "DisplayName").unwrap_or("");
        debug!(%topic, %display_name, "SNS topic reachable");
        Ok(())
    }
}

/// Log an SNS error response with a hint for the common codes and turn it
/// into a `Publish` error.
fn rejection(action: &str, status: u16, text: &str) -> NotifyError {
    let code = extract_xml_tag(text, "Code").unwrap_or("Unknown");
    let detail = extract_xml_tag(text, "Message").unwrap_or(text);
    error!(status, %code, "SNS {action} rejected: {detail}");
    match code {
        "NotFound" => error!("SNS topic not found, check notify.topic_arn"),
        "AuthorizationError" | "InvalidClientTokenId" | "SignatureDoesNotMatch" => {
            error!("SNS rejected the credentials, check notify.profile, AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY or the shared credentials file")
        }
        "AccessDenied" => error!("credentials lack sns:{action} on the topic"),
        _ => {}
    }
    NotifyError::Publish {
        status,
        message: format!("{code}: {detail}"),
    }
}

/// Form body for the SNS `Publish` action.
fn publish_form(topic: &str, message: &OutboundMessage) -> String {
    [
        ("Action", "Publish"),
        ("Version", SNS_API_VERSION),
        ("TopicArn", topic),
        ("Subject", message.subject.as_str()),
        ("Message", message.body.as_str()),
    ]
    .iter()
    .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
    .collect::<Vec<_>>()
    .join("&")
}

fn topic_attributes_form(topic: &str) -> String {
    format!(
        "Action=GetTopicAttributes&Version={SNS_API_VERSION}&TopicArn={}",
        urlencoding::encode(topic)
    )
}

/// Text content of the first `<tag>…</tag>` in `xml`.
fn extract_xml_tag<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = xml.find(&open)? + open.len();
    let end = start + xml[start..].find(&close)?;
    Some(xml[start..end].trim())
}

// ── SigV4 helpers ────────────────────────────────────────────────────────────

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| NotifyError::Credentials(format!("invalid signing key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn derive_signing_key(secret: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

// ── AWS credential resolution ────────────────────────────────────────────────

fn resolve_aws_credentials(profile: Option<&str>) -> Result<AwsCredentials> {
    resolve_aws_credentials_with(
        profile,
        &|key| std::env::var(key).ok(),
        &|path| std::fs::read_to_string(path).ok(),
    )
}

/// Credential lookup with the environment and filesystem injected.
///
/// An explicitly configured profile always wins; otherwise env keys are used
/// when both are present, then the `AWS_PROFILE` (or `default`) profile.
fn resolve_aws_credentials_with(
    profile: Option<&str>,
    env: &dyn Fn(&str) -> Option<String>,
    read_file: &dyn Fn(&str) -> Option<String>,
) -> Result<AwsCredentials> {
    let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    if profile.is_none() {
        if let (Some(key_id), Some(secret)) = (
            non_empty("AWS_ACCESS_KEY_ID"),
            non_empty("AWS_SECRET_ACCESS_KEY"),
        ) {
            debug!("using AWS credentials from the environment");
            return Ok(AwsCredentials {
                access_key_id: key_id,
                secret_access_key: secret,
                session_token: non_empty("AWS_SESSION_TOKEN"),
            });
        }
    }

    let profile = match profile {
        Some(p) => p.to_string(),
        None => non_empty("AWS_PROFILE").unwrap_or_else(|| "default".to_string()),
    };
    let cred_path = non_empty("AWS_SHARED_CREDENTIALS_FILE").unwrap_or_else(|| {
        let home = non_empty("HOME").unwrap_or_else(|| ".".to_string());
        format!("{home}/.aws/credentials")
    });
    let content = read_file(&cred_path).ok_or_else(|| {
        NotifyError::Credentials(format!(
            "AWS credentials not found: set AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY or provide profile '{profile}' in {cred_path}"
        ))
    })?;

    debug!(%profile, path = %cred_path, "using AWS credentials from shared file");
    parse_aws_credentials_file(&content, &profile)
}

fn parse_aws_credentials_file(content: &str, profile: &str) -> Result<AwsCredentials> {
    let mut in_profile = false;
    let mut key_id = None;
    let mut secret = None;
    let mut session_token = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let section = section.trim();
            let name = section.strip_prefix("profile ").unwrap_or(section).trim();
            in_profile = name == profile;
            continue;
        }
        if !in_profile {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            let v = v.trim();
            if v.is_empty() {
                continue;
            }
            match k.trim() {
                "aws_access_key_id" => key_id = Some(v.to_string()),
                "aws_secret_access_key" => secret = Some(v.to_string()),
                "aws_session_token" => session_token = Some(v.to_string()),
                _ => {}
            }
        }
    }

    match (key_id, secret) {
        (Some(k), Some(s)) => Ok(AwsCredentials {
            access_key_id: k,
            secret_access_key: s,
            session_token,
        }),
        _ => Err(NotifyError::Credentials(format!(
            "AWS profile '{profile}' not found or incomplete in the shared credentials file"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn credentials_file_profiles() {
        let content = "\
[default]
aws_access_key_id = AKIADEFAULT
aws_secret_access_key = secret-default

[ops]
aws_access_key_id=AKIAOPS
aws_secret_access_key=secret-ops
aws_session_token=tok
";
        let default = parse_aws_credentials_file(content, "default").unwrap();
        assert_eq!(default.access_key_id, "AKIADEFAULT");
        assert!(default.session_token.is_none());

        let ops = parse_aws_credentials_file(content, "ops").unwrap();
        assert_eq!(ops.secret_access_key, "secret-ops");
        assert_eq!(ops.session_token.as_deref(), Some("tok"));

        assert!(parse_aws_credentials_file(content, "missing").is_err());
    }

    #[test]
    fn credentials_file_skips_comments_and_blank_values() {
        let content = "\
# rotated monthly
[profile ops]
; legacy key below
aws_access_key_id = AKIAOPS
aws_secret_access_key = secret-ops
aws_session_token =
";
        let ops = parse_aws_credentials_file(content, "ops").unwrap();
        assert_eq!(ops.access_key_id, "AKIAOPS");
        assert!(ops.session_token.is_none());
    }

    const SHARED_FILE: &str = "\
[default]
aws_access_key_id = AKIAFILEDEFAULT
aws_secret_access_key = file-default

[ops]
aws_access_key_id = AKIAFILEOPS
aws_secret_access_key = file-ops
";

    fn resolve(
        profile: Option<&str>,
        vars: &[(&str, &str)],
        file: Option<&str>,
    ) -> Result<AwsCredentials> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let file = file.map(str::to_string);
        resolve_aws_credentials_with(
            profile,
            &|key| vars.get(key).cloned(),
            &|path| {
                assert_eq!(path, "/home/ops/.aws/credentials");
                file.clone()
            },
        )
    }

    #[test]
    fn environment_keys_are_used_without_a_profile() {
        let creds = resolve(
            None,
            &[
                ("HOME", "/home/ops"),
                ("AWS_ACCESS_KEY_ID", "AKIAENV"),
                ("AWS_SECRET_ACCESS_KEY", "env-secret"),
                ("AWS_SESSION_TOKEN", "env-token"),
            ],
            Some(SHARED_FILE),
        )
        .unwrap();
        assert_eq!(creds.access_key_id, "AKIAENV");
        assert_eq!(creds.secret_access_key, "env-secret");
        assert_eq!(creds.session_token.as_deref(), Some("env-token"));
    }

    #[test]
    fn configured_profile_overrides_environment_keys() {
        let creds = resolve(
            Some("ops"),
            &[
                ("HOME", "/home/ops"),
                ("AWS_ACCESS_KEY_ID", "AKIAENV"),
                ("AWS_SECRET_ACCESS_KEY", "env-secret"),
            ],
            Some(SHARED_FILE),
        )
        .unwrap();
        assert_eq!(creds.access_key_id, "AKIAFILEOPS");
    }

    #[test]
    fn aws_profile_variable_selects_file_section() {
        let creds = resolve(
            None,
            &[("HOME", "/home/ops"), ("AWS_PROFILE", "ops")],
            Some(SHARED_FILE),
        )
        .unwrap();
        assert_eq!(creds.access_key_id, "AKIAFILEOPS");

        let creds = resolve(None, &[("HOME", "/home/ops")], Some(SHARED_FILE)).unwrap();
        assert_eq!(creds.access_key_id, "AKIAFILEDEFAULT");
    }

    #[test]
    fn half_set_environment_falls_back_to_file() {
        let creds = resolve(
            None,
            &[("HOME", "/home/ops"), ("AWS_ACCESS_KEY_ID", "AKIAENV")],
            Some(SHARED_FILE),
        )
        .unwrap();
        assert_eq!(creds.access_key_id, "AKIAFILEDEFAULT");
    }

    #[test]
    fn missing_file_is_a_credentials_error() {
        let err = resolve(None, &[("HOME", "/home/ops")], None).unwrap_err();
        assert!(matches!(err, NotifyError::Credentials(_)));
    }

    #[test]
    fn topic_attributes_form_is_url_encoded() {
        assert_eq!(
            topic_attributes_form("arn:aws:sns:eu-west-1:1:t"),
            "Action=GetTopicAttributes&Version=2010-03-31&TopicArn=arn%3Aaws%3Asns%3Aeu-west-1%3A1%3At"
        );
    }

    #[test]
    fn publish_form_is_url_encoded() {
        let form = publish_form(
            "arn:aws:sns:eu-west-1:1:t",
            &OutboundMessage {
                subject: "2 cards due".into(),
                body: "a&b=c\nnext".into(),
            },
        );
        assert!(form.starts_with("Action=Publish&Version=2010-03-31&"));
        assert!(form.contains("TopicArn=arn%3Aaws%3Asns%3Aeu-west-1%3A1%3At"));
        assert!(form.contains("Subject=2%20cards%20due"));
        assert!(form.contains("Message=a%26b%3Dc%0Anext"));
    }

    #[test]
    fn xml_tags_are_extracted() {
        let ok = "<PublishResponse><PublishResult><MessageId>abc-123</MessageId></PublishResult></PublishResponse>";
        assert_eq!(extract_xml_tag(ok, "MessageId"), Some("abc-123"));

        let err = "<ErrorResponse><Error><Type>Sender</Type><Code>NotFound</Code><Message>Topic does not exist</Message></Error></ErrorResponse>";
        assert_eq!(extract_xml_tag(err, "Code"), Some("NotFound"));
        assert_eq!(extract_xml_tag(err, "Message"), Some("Topic does not exist"));
        assert_eq!(extract_xml_tag(err, "MessageId"), None);
    }

    #[test]
    fn signing_key_is_deterministic() {
        // Reference values from the AWS SigV4 documentation example.
        let key = derive_signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        )
        .unwrap();
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }
}
