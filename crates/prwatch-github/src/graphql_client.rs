use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::retry_policy::{
    clip_error_text, is_transient_status, is_transient_transport_error, retry_after_hint,
    RetryPolicy,
};

const ERROR_BODY_MAX_CHARS: usize = 800;
const RETRY_ATTEMPT_HEADER: &str = "x-prwatch-retry-attempt";

#[derive(Debug, Error)]
/// Enumerates supported `GithubApiError` values.
pub enum GithubApiError {
    #[error("invalid github authorization header")]
    InvalidHeader,
    #[error("failed to create github api client")]
    Build(#[source] reqwest::Error),
    #[error("github api {operation} request failed")]
    Http {
        operation: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("github api {operation} failed with status {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },
    #[error("failed to decode github {operation}")]
    Decode {
        operation: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("github graphql {operation} could not resolve: {}", messages.join("; "))]
    NotFound {
        operation: String,
        messages: Vec<String>,
    },
    #[error("github graphql {operation} returned errors: {}", messages.join("; "))]
    GraphQl {
        operation: String,
        messages: Vec<String>,
    },
}

#[async_trait]
/// Trait contract for issuing a single GraphQL operation and returning its `data` member.
pub trait GraphqlTransport: Send + Sync {
    async fn query(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> Result<Value, GithubApiError>;
}

#[async_trait]
impl<T: GraphqlTransport + ?Sized> GraphqlTransport for Arc<T> {
    async fn query(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> Result<Value, GithubApiError> {
        (**self).query(operation, query, variables).await
    }
}

#[derive(Debug, Deserialize)]
struct GraphqlEnvelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorEntry {
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

impl GraphqlErrorEntry {
    fn is_not_found(&self) -> bool {
        self.kind.as_deref() == Some("NOT_FOUND")
    }
}

#[derive(Clone)]
pub struct GithubGraphqlClient {
    http: reqwest::Client,
    api_base: String,
    retry: RetryPolicy,
}

impl GithubGraphqlClient {
    pub fn new(
        api_base: String,
        token: String,
        request_timeout_ms: u64,
        retry_max_attempts: usize,
        retry_base_delay_ms: u64,
    ) -> Result<Self, GithubApiError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("prwatch-comment-watcher"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", token.trim());
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth_header)
                .map_err(|_| GithubApiError::InvalidHeader)?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .map_err(GithubApiError::Build)?;
        Ok(Self {
            http: client,
            api_base: api_base.trim_end_matches('/').to_string(),
            retry: RetryPolicy::new(retry_max_attempts, retry_base_delay_ms),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    async fn post_graphql(
        &self,
        operation: &str,
        payload: &Value,
    ) -> Result<GraphqlEnvelope, GithubApiError> {
        let endpoint = format!("{}/graphql", self.api_base);
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = self
                .http
                .post(&endpoint)
                .header(RETRY_ATTEMPT_HEADER, attempt.saturating_sub(1).to_string())
                .json(payload)
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<GraphqlEnvelope>().await.map_err(|source| {
                            GithubApiError::Decode {
                                operation: operation.to_string(),
                                source,
                            }
                        });
                    }

                    let server_hint = retry_after_hint(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if self.retry.allows_retry_after(attempt) && is_transient_status(status) {
                        tracing::debug!(
                            operation,
                            status = status.as_u16(),
                            attempt,
                            "retrying github graphql request"
                        );
                        tokio::time::sleep(self.retry.backoff(attempt, server_hint)).await;
                        continue;
                    }

                    return Err(GithubApiError::Status {
                        operation: operation.to_string(),
                        status: status.as_u16(),
                        body: clip_error_text(&body, ERROR_BODY_MAX_CHARS),
                    });
                }
                Err(error) => {
                    if self.retry.allows_retry_after(attempt) && is_transient_transport_error(&error)
                    {
                        tracing::debug!(operation, attempt, %error, "retrying github graphql transport");
                        tokio::time::sleep(self.retry.backoff(attempt, None)).await;
                        continue;
                    }
                    return Err(GithubApiError::Http {
                        operation: operation.to_string(),
                        source: error,
                    });
                }
            }
        }
    }
}

#[async_trait]
impl GraphqlTransport for GithubGraphqlClient {
    async fn query(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> Result<Value, GithubApiError> {
        let payload = json!({ "query": query, "variables": variables });
        let envelope = self.post_graphql(operation, &payload).await?;
        if !envelope.errors.is_empty() {
            let not_found = envelope.errors.iter().all(GraphqlErrorEntry::is_not_found);
            let operation = operation.to_string();
            let messages = envelope
                .errors
                .into_iter()
                .map(|entry| clip_error_text(&entry.message, ERROR_BODY_MAX_CHARS))
                .collect();
            return Err(if not_found {
                GithubApiError::NotFound {
                    operation,
                    messages,
                }
            } else {
                GithubApiError::GraphQl {
                    operation,
                    messages,
                }
            });
        }
        envelope.data.ok_or_else(|| GithubApiError::GraphQl {
            operation: operation.to_string(),
            messages: vec!["response carried no data".to_string()],
        })
    }
}
