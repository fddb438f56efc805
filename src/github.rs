use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER, USER_AGENT};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::RemoteCallError;
use crate::query::QueryRequest;

pub const GITHUB_GRAPHQL_URL: &str = "https://api.github.com/graphql";

/// How a 200 response carrying a GraphQL `errors` array is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphqlErrorPolicy {
    /// Keep the body as a successful result and log the messages.
    #[default]
    Accept,
    /// Fail the call with [`RemoteCallError::Graphql`].
    Reject,
}

/// Retry schedule for transient failures (network errors, timeouts, 5xx).
/// Client errors are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Upper bound on any single wait, including a server's `Retry-After`.
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_wait: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): base, 2x base, 4x base...
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_wait)
    }

    /// Wait before retry number `attempt`, preferring the server's hint.
    pub fn wait(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) => hint.min(self.max_wait),
            None => self.backoff(attempt),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub graphql_errors: GraphqlErrorPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: GITHUB_GRAPHQL_URL.to_string(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            graphql_errors: GraphqlErrorPolicy::default(),
        }
    }
}

/// Anything that can answer a contributions query.
#[async_trait]
pub trait ContributionSource: Send + Sync {
    async fn execute(&self, request: &QueryRequest) -> Result<Value, RemoteCallError>;
}

/// A failed attempt, plus the server's `Retry-After` hint if it sent one.
struct Attempt {
    error: RemoteCallError,
    retry_after: Option<Duration>,
}

impl From<RemoteCallError> for Attempt {
    fn from(error: RemoteCallError) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

#[derive(Clone)]
pub struct GithubClient {
    token: Arc<String>,
    http: Arc<Client>,
    config: Arc<ClientConfig>,
}

impl GithubClient {
    /// Create a GitHub GraphQL client authenticating with `token`.
    pub fn new(token: impl Into<String>, config: ClientConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            token: Arc::new(token.into()),
            http: Arc::new(http),
            config: Arc::new(config),
        })
    }

    /// GraphQL request with bounded retry/backoff on transient failures.
    async fn graphql(&self, request: &QueryRequest) -> Result<Value, RemoteCallError> {
        let retry = self.config.retry;
        let mut attempt = 0u32;

        loop {
            let failure = match self.send_once(request).await {
                Ok(json) => return Ok(json),
                Err(failure) => failure,
            };

            if !failure.error.is_transient() || attempt >= retry.max_retries {
                return Err(failure.error);
            }
            attempt += 1;

            let wait = retry.wait(attempt, failure.retry_after);
            warn!(
                login = %request.variables.login,
                attempt,
                max_retries = retry.max_retries,
                wait_ms = wait.as_millis() as u64,
                error = %failure.error,
                "transient GitHub failure, retrying"
            );
            sleep(wait).await;
        }
    }

    async fn send_once(&self, request: &QueryRequest) -> Result<Value, Attempt> {
        let resp = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&*self.token)
            .header(USER_AGENT, "team-stats")
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await
            .map_err(RemoteCallError::Network)?;

        let status = resp.status().as_u16();
        debug!(login = %request.variables.login, status, "GitHub responded");

        if status != 200 {
            let retry_after = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = error_body(status, resp.text().await);
            return Err(Attempt {
                error: RemoteCallError::Status { status, body },
                retry_after,
            });
        }

        let json: Value = resp.json().await.map_err(RemoteCallError::Decode)?;
        Ok(self.check_graphql_errors(request, json)?)
    }

    fn check_graphql_errors(
        &self,
        request: &QueryRequest,
        json: Value,
    ) -> Result<Value, RemoteCallError> {
        let messages = graphql_error_messages(&json);
        if messages.is_empty() {
            return Ok(json);
        }
        match self.config.graphql_errors {
            GraphqlErrorPolicy::Accept => {
                warn!(
                    login = %request.variables.login,
                    errors = ?messages,
                    "GraphQL reported errors, keeping partial data"
                );
                Ok(json)
            }
            GraphqlErrorPolicy::Reject => Err(RemoteCallError::Graphql { messages }),
        }
    }
}

#[async_trait]
impl ContributionSource for GithubClient {
    async fn execute(&self, request: &QueryRequest) -> Result<Value, RemoteCallError> {
        self.graphql(request).await
    }
}

/// Body text for a non-200 response; a failed read is kept in the text.
fn error_body(status: u16, read: Result<String, reqwest::Error>) -> String {
    match read {
        Ok(body) => body,
        Err(e) => {
            debug!(status, error = %e, "failed to read error response body");
            format!("<unreadable response body: {e}>")
        }
    }
}

/// Messages of a GraphQL `errors` array, if the body has one.
pub fn graphql_error_messages(json: &Value) -> Vec<String> {
    let Some(errors) = json.get("errors").and_then(Value::as_array) else {
        return Vec::new();
    };
    errors
        .iter()
        .map(|e| {
            e.get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| e.to_string())
        })
        .collect()
}
