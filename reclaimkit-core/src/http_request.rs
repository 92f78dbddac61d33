use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::{
    config::RetryConfig,
    error::{is_transient_status, ReclaimError},
};

/// HTTP client of the backend calls. Applies the per-attempt timeout and user agent,
/// and retries transient failures as configured by [`RetryConfig`].
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl HttpClient {
    pub(crate) fn new(retry: RetryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            retry,
        }
    }

    fn with_defaults(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .timeout(Duration::from_millis(self.retry.timeout_ms))
            .header(
                "User-Agent",
                format!("reclaimkit-core/{}", env!("CARGO_PKG_VERSION")),
            )
    }

    pub(crate) fn get(&self, url: &str) -> RequestBuilder {
        self.with_defaults(self.client.get(url))
    }

    pub(crate) fn post(&self, url: &str) -> RequestBuilder {
        self.with_defaults(self.client.post(url))
    }

    /// Sends `builder` and returns the response whatever its status, once the retries
    /// for transient failures are exhausted.
    pub(crate) async fn send(&self, builder: RequestBuilder) -> Result<Response, ReclaimError> {
        // streaming bodies cannot be replayed
        let Some(template) = builder.try_clone() else {
            return attempt(builder).await.map_err(Into::into);
        };

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.retry.min_backoff_ms))
            .with_max_delay(Duration::from_millis(self.retry.max_backoff_ms))
            .with_max_times(self.retry.max_retries as usize);

        (|| async {
            match template.try_clone() {
                Some(builder) => attempt(builder).await,
                None => Err(TransportError {
                    url: "<unknown>".to_string(),
                    kind: FailureKind::Build,
                    detail: "request is not cloneable".to_string(),
                }),
            }
        })
        .retry(backoff)
        .when(TransportError::is_transient)
        .notify(|err: &TransportError, delay: Duration| {
            log::warn!("{} failed ({}), retrying in {delay:?}", err.url, err.detail);
        })
        .await
        .map_err(Into::into)
    }

    /// Sends `builder` and fails with a `NetworkError` carrying the response body on
    /// non-success statuses.
    pub(crate) async fn send_ok(&self, builder: RequestBuilder) -> Result<Response, ReclaimError> {
        ensure_success(self.send(builder).await?).await
    }

    /// Sends `builder` and decodes the JSON body of a successful response.
    pub(crate) async fn json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, ReclaimError> {
        decode_json(self.send(builder).await?).await
    }
}

/// Fails with a `NetworkError` carrying the response body on non-success statuses.
pub(crate) async fn ensure_success(response: Response) -> Result<Response, ReclaimError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let error = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("Unknown error"));
    Err(ReclaimError::NetworkError {
        url,
        status: Some(status.as_u16()),
        error,
        retryable: is_transient_status(status.as_u16()),
    })
}

/// Decodes the JSON body of a successful response.
pub(crate) async fn decode_json<T: DeserializeOwned>(
    response: Response,
) -> Result<T, ReclaimError> {
    let response = ensure_success(response).await?;
    let url = response.url().to_string();
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| ReclaimError::SerializationError {
        error: format!("failed to parse response from {url}: {e}"),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureKind {
    RateLimited(u16),
    Server(u16),
    Timeout,
    Connect,
    Build,
    Other,
}

#[derive(Debug)]
struct TransportError {
    url: String,
    kind: FailureKind,
    detail: String,
}

impl TransportError {
    const fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            FailureKind::RateLimited(_)
                | FailureKind::Server(_)
                | FailureKind::Timeout
                | FailureKind::Connect
        )
    }

    const fn status(&self) -> Option<u16> {
        match self.kind {
            FailureKind::RateLimited(status) | FailureKind::Server(status) => Some(status),
            FailureKind::Timeout | FailureKind::Connect | FailureKind::Build | FailureKind::Other => {
                None
            }
        }
    }
}

impl From<TransportError> for ReclaimError {
    fn from(value: TransportError) -> Self {
        Self::NetworkError {
            status: value.status(),
            retryable: value.is_transient(),
            url: value.url,
            error: value.detail,
        }
    }
}

/// One attempt. Rate limiting and server errors are turned into errors so they can be
/// retried; every other response is returned as is.
async fn attempt(builder: RequestBuilder) -> Result<Response, TransportError> {
    let (client, request) = builder.build_split();
    let request = request.map_err(|err| TransportError {
        url: err
            .url()
            .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
        kind: FailureKind::Build,
        detail: format!("invalid request: {err}"),
    })?;
    let url = request.url().to_string();

    match client.execute(request).await {
        Ok(response) => {
            let status = response.status();
            let kind = if status.as_u16() == 429 {
                FailureKind::RateLimited(429)
            } else if status.is_server_error() {
                FailureKind::Server(status.as_u16())
            } else {
                return Ok(response);
            };
            Err(TransportError {
                url,
                kind,
                detail: format!("backend answered {status}"),
            })
        }
        Err(err) => {
            let kind = if err.is_timeout() {
                FailureKind::Timeout
            } else if err.is_connect() {
                FailureKind::Connect
            } else {
                FailureKind::Other
            };
            Err(TransportError {
                url,
                kind,
                detail: err.to_string(),
            })
        }
    }
}
