//! Resilient HTTP layer: bounded retry with exponential backoff.
//!
//! Retries only server-class (5xx) and transport failures. Client
//! rejections and malformed responses fail immediately; exhausted
//! retries surface as a single typed terminal error so callers decide
//! whether absence is acceptable.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Transient failures (5xx or transport) survived every retry.
    #[error("transient failures exhausted after {attempts} attempts: {last}")]
    TransientExhausted { attempts: u32, last: String },
    /// Client-class rejection (4xx-equivalent); never retried.
    #[error("request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
    /// Response parsed but did not match the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::TransientExhausted { .. })
    }
}

/// Bounded retry policy: `attempts` total tries, delay doubling from
/// `initial_delay` between them.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following attempt number `attempt`
    /// (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.initial_delay.saturating_mul(1u32 << (attempt.saturating_sub(1)).min(16))
    }
}

/// Shared HTTP client wrapping reqwest with the retry policy.
#[derive(Debug, Clone)]
pub struct ResilientClient {
    client: reqwest::Client,
    policy: RetryPolicy,
}

enum AttemptOutcome<T> {
    Done(Result<T, FetchError>),
    Transient(String),
}

impl ResilientClient {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to create HTTP client"),
            policy,
        }
    }

    /// GET a JSON document with query parameters.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        self.execute(|| self.client.get(url).query(query)).await
    }

    /// POST a JSON body and parse a JSON response.
    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, FetchError> {
        self.execute(|| self.client.post(url).json(body)).await
    }

    /// POST url-encoded form data and parse a JSON response.
    pub async fn post_form<T: DeserializeOwned>(
        &self,
        url: &str,
        form: &[(&str, String)],
    ) -> Result<T, FetchError> {
        self.execute(|| self.client.post(url).form(form)).await
    }

    async fn execute<T, F>(&self, build: F) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let attempts = self.policy.attempts.max(1);
        let mut last_transient = String::new();

        for attempt in 1..=attempts {
            match self.attempt(build()).await {
                AttemptOutcome::Done(result) => return result,
                AttemptOutcome::Transient(reason) => {
                    last_transient = reason;
                    if attempt < attempts {
                        let delay = self.policy.delay_after(attempt);
                        tracing::debug!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "transient failure, backing off: {last_transient}"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(FetchError::TransientExhausted {
            attempts,
            last: last_transient,
        })
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> AttemptOutcome<T> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => return AttemptOutcome::Transient(err.to_string()),
        };

        let status = response.status();
        if status.is_server_error() {
            return AttemptOutcome::Transient(format!("server error {status}"));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return AttemptOutcome::Done(Err(FetchError::Rejected {
                status: status.as_u16(),
                body,
            }));
        }

        match response.json::<T>().await {
            Ok(parsed) => AttemptOutcome::Done(Ok(parsed)),
            Err(err) => AttemptOutcome::Done(Err(FetchError::Malformed(err.to_string()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        ok: bool,
    }

    /// Serve one scripted HTTP response per connection, then close.
    async fn scripted_server(responses: Vec<(u16, &'static str)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(_) => return,
                };
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let reason = match status {
                    200 => "OK",
                    404 => "Not Found",
                    _ => "Internal Server Error",
                };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        format!("http://{addr}/test")
    }

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            initial_delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn two_server_errors_then_success_returns_body() {
        let url = scripted_server(vec![
            (500, "{}"),
            (500, "{}"),
            (200, r#"{"ok":true}"#),
        ])
        .await;

        let client = ResilientClient::new(fast_policy(3));
        let payload: Payload = client.get_json(&url, &[]).await.unwrap();
        assert_eq!(payload, Payload { ok: true });
    }

    #[tokio::test]
    async fn client_rejection_fails_immediately() {
        // Only one response is scripted; a retry would hang, so
        // completing at all proves no retry happened.
        let url = scripted_server(vec![(404, r#"{"error":"missing"}"#)]).await;

        let client = ResilientClient::new(fast_policy(3));
        let result: Result<Payload, _> = client.get_json(&url, &[]).await;
        match result {
            Err(FetchError::Rejected { status, .. }) => assert_eq!(status, 404),
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn exhausted_retries_surface_terminal_error() {
        let url = scripted_server(vec![(500, "{}"), (500, "{}"), (500, "{}")]).await;

        let client = ResilientClient::new(fast_policy(3));
        let result: Result<Payload, _> = client.get_json(&url, &[]).await;
        match result {
            Err(FetchError::TransientExhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected TransientExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_not_retried() {
        let url = scripted_server(vec![(200, "not json")]).await;

        let client = ResilientClient::new(fast_policy(3));
        let result: Result<Payload, _> = client.get_json(&url, &[]).await;
        assert!(matches!(result, Err(FetchError::Malformed(_))));
    }
}
