//! REST Gateway Adapter
//!
//! Drives the array's REST command bridge: token auth via
//! `POST {endpoint}/rest/auth`, commands via `POST {endpoint}/rest/<cmd>`
//! with the object name as a path segment. Array rejections are surfaced
//! verbatim; only "object not found" is classified. Transient transport
//! failures are retried here with exponential backoff, never at the
//! reconciliation layer.

use crate::error::{Error, Result};
use crate::gateway::{ArrayGateway, CommandOptions, CommandOutcome, Record};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use reqwest::StatusCode;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Array error codes that mean "the named object does not exist"
const NOT_FOUND_CODES: [&str; 2] = ["CMMVC5753E", "CMMVC5804E"];

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the REST gateway
#[derive(Debug, Clone)]
pub struct RestGatewayConfig {
    /// Management endpoint, e.g. `https://array1:7443`
    pub endpoint: String,
    /// Management username
    pub username: String,
    /// Management password
    pub password: String,
    /// Verify the array's TLS certificate
    pub verify_tls: bool,
    /// Per-request timeout, also bounds transient retries
    pub timeout: Duration,
}

impl Default for RestGatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://localhost:7443".to_string(),
            username: "superuser".to_string(),
            password: String::new(),
            verify_tls: true,
            timeout: Duration::from_secs(60),
        }
    }
}

// =============================================================================
// REST Gateway
// =============================================================================

/// Gateway adapter for the array's REST command bridge
pub struct RestGateway {
    config: RestGatewayConfig,
    http: reqwest::Client,
    /// Cached auth token; dropped and refreshed when the array rejects it
    token: RwLock<Option<String>>,
}

impl RestGateway {
    /// Create a new REST gateway
    pub fn new(config: RestGatewayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;

        Ok(Self {
            config,
            http,
            token: RwLock::new(None),
        })
    }

    fn command_url(&self, command: &str, object: Option<&str>) -> String {
        let base = self.config.endpoint.trim_end_matches('/');
        match object {
            Some(object) => format!("{}/rest/{}/{}", base, command, urlencoding::encode(object)),
            None => format!("{}/rest/{}", base, command),
        }
    }

    async fn authenticate(&self) -> Result<String> {
        let url = format!(
            "{}/rest/auth",
            self.config.endpoint.trim_end_matches('/')
        );

        let response = self
            .http
            .post(&url)
            .header("X-Auth-Username", &self.config.username)
            .header("X-Auth-Password", &self.config.password)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Gateway {
                command: "auth".into(),
                message: format!("authentication failed with status {}", response.status()),
            });
        }

        let body: serde_json::Value = response.json().await?;
        let token = body
            .get("token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::MalformedRecord {
                command: "auth".into(),
                field: "token".into(),
            })?
            .to_string();

        debug!("Authenticated against {}", self.config.endpoint);
        *self.token.write().await = Some(token.clone());

        Ok(token)
    }

    async fn token(&self) -> Result<String> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        self.authenticate().await
    }

    async fn send_command(
        &self,
        token: &str,
        command: &str,
        object: Option<&str>,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response> {
        Ok(self
            .http
            .post(self.command_url(command, object))
            .header("X-Auth-Token", token)
            .json(body)
            .send()
            .await?)
    }

    /// Issue one command, re-authenticating once if the token has expired
    async fn post_once(
        &self,
        command: &str,
        object: Option<&str>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let token = self.token().await?;
        let mut response = self.send_command(&token, command, object, body).await?;

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            *self.token.write().await = None;
            let token = self.authenticate().await?;
            response = self.send_command(&token, command, object, body).await?;
        }

        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::NOT_FOUND || is_not_found_text(&text) {
            return Err(Error::ObjectNotFound {
                command: command.to_string(),
                object: object.unwrap_or_default().to_string(),
            });
        }

        if !status.is_success() {
            return Err(Error::Gateway {
                command: command.to_string(),
                message: array_message(&text),
            });
        }

        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Issue a command, retrying transient transport failures with backoff
    async fn post(
        &self,
        command: &str,
        object: Option<&str>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let policy = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(self.config.timeout))
            .build();

        backoff::future::retry(policy, || async {
            match self.post_once(command, object, body).await {
                Ok(value) => Ok(value),
                Err(e) if e.is_transient() => {
                    warn!("Transient transport failure on {}: {}", command, e);
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .await
    }
}

#[async_trait]
impl ArrayGateway for RestGateway {
    async fn query(&self, command: &str, object: Option<&str>) -> Result<Vec<Record>> {
        let value = self.post(command, object, &serde_json::json!({})).await?;
        Ok(records_from(value))
    }

    async fn execute(
        &self,
        command: &str,
        options: &CommandOptions,
        args: &[&str],
    ) -> Result<CommandOutcome> {
        // The command bridge takes one positional object as a path segment.
        let object = args.first().copied();
        let value = self.post(command, object, &options.to_body()).await?;

        let outcome = match &value {
            serde_json::Value::Object(map) => CommandOutcome {
                id: map.get("id").and_then(|v| v.as_str()).map(str::to_string),
                message: map
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
            },
            _ => CommandOutcome::default(),
        };

        debug!("Executed {} on {:?}: {:?}", command, object, outcome.id);
        Ok(outcome)
    }
}

// =============================================================================
// Response Parsing
// =============================================================================

fn records_from(value: serde_json::Value) -> Vec<Record> {
    match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::Object(map) => Some(Record(map)),
                _ => None,
            })
            .collect(),
        serde_json::Value::Object(map) => vec![Record(map)],
        _ => Vec::new(),
    }
}

fn is_not_found_text(text: &str) -> bool {
    NOT_FOUND_CODES.iter().any(|code| text.contains(code))
}

/// Extract the array's own error text from a failed response body
fn array_message(text: &str) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(text) {
        if let Some(message) = map.get("message").and_then(|v| v.as_str()) {
            return message.to_string();
        }
    }
    text.trim().to_string()
}
