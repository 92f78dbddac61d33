//! Client for the verification network's REST API.

use std::{future::Future, sync::Arc};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::instrument;

use crate::{
    config::NetworkConfig,
    error::ReclaimError,
    http_request::{decode_json, HttpClient},
    proof::Proof,
    provider::{ProviderData, ProviderDirectory},
    request::{ProviderId, SignedRequest},
    session::{SessionId, StatusReport},
};

/// Session status as tracked by the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    SessionInit,
    SessionStarted,
    UserInitVerification,
    UserStartedVerification,
    ProofGenerationStarted,
    ProofGenerationSuccess,
    ProofGenerationFailed,
    ProofSubmitted,
    ProofSubmissionFailed,
    // the network spells it this way
    #[serde(rename = "PROOF_MANUAL_VERIFICATION_SUBMITED")]
    #[strum(serialize = "PROOF_MANUAL_VERIFICATION_SUBMITED")]
    ProofManualVerificationSubmitted,
    SessionExpired,
    /// A status this SDK does not know. Treated as pending.
    #[serde(other)]
    Unknown,
}

impl SessionStatus {
    /// Maps the network status to a report for the session tracker.
    #[must_use]
    pub fn into_report(self, proofs: Vec<Proof>) -> StatusReport {
        match self {
            Self::ProofSubmitted | Self::ProofManualVerificationSubmitted => {
                StatusReport::Verified(proofs)
            }
            Self::ProofGenerationFailed | Self::ProofSubmissionFailed => {
                StatusReport::Failed(self.to_string())
            }
            Self::SessionExpired => StatusReport::Expired,
            Self::SessionInit
            | Self::SessionStarted
            | Self::UserInitVerification
            | Self::UserStartedVerification
            | Self::ProofGenerationStarted
            | Self::ProofGenerationSuccess
            | Self::Unknown => StatusReport::Pending,
        }
    }
}

/// The verification network, as seen by a session tracker.
pub trait VerificationNetwork: Send + Sync {
    /// Registers a session for `request`.
    ///
    /// # Errors
    /// Returns a `NetworkError` if the network rejects the request or cannot be reached.
    fn init_session(
        &self,
        request: &SignedRequest,
    ) -> impl Future<Output = Result<SessionId, ReclaimError>> + Send;

    /// Reports a status change of the session to the network.
    ///
    /// # Errors
    /// Returns a `NetworkError` if the update fails.
    fn update_session(
        &self,
        session_id: &SessionId,
        status: SessionStatus,
    ) -> impl Future<Output = Result<(), ReclaimError>> + Send;

    /// Fetches the current status of a session.
    ///
    /// # Errors
    /// Returns a `NetworkError` if the status cannot be fetched. Transient failures are
    /// retryable, see [`ReclaimError::is_retryable`].
    fn fetch_status(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<StatusReport, ReclaimError>> + Send;

    /// The URL end users open to fulfill `request`.
    ///
    /// # Errors
    /// Returns `SerializationError` if the request cannot be encoded.
    fn request_url(
        &self,
        request: &SignedRequest,
    ) -> impl Future<Output = Result<String, ReclaimError>> + Send;

    /// The per-session status endpoint.
    fn status_url(&self, session_id: &SessionId) -> String;

    /// The endpoint proofs are delivered to when the request sets no callback URL.
    fn callback_url(&self, session_id: &SessionId) -> String;
}

impl<T: VerificationNetwork> VerificationNetwork for Arc<T> {
    fn init_session(
        &self,
        request: &SignedRequest,
    ) -> impl Future<Output = Result<SessionId, ReclaimError>> + Send {
        (**self).init_session(request)
    }

    fn update_session(
        &self,
        session_id: &SessionId,
        status: SessionStatus,
    ) -> impl Future<Output = Result<(), ReclaimError>> + Send {
        (**self).update_session(session_id, status)
    }

    fn fetch_status(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<StatusReport, ReclaimError>> + Send {
        (**self).fetch_status(session_id)
    }

    fn request_url(
        &self,
        request: &SignedRequest,
    ) -> impl Future<Output = Result<String, ReclaimError>> + Send {
        (**self).request_url(request)
    }

    fn status_url(&self, session_id: &SessionId) -> String {
        (**self).status_url(session_id)
    }

    fn callback_url(&self, session_id: &SessionId) -> String {
        (**self).callback_url(session_id)
    }
}

/// Registers a session for `request` and marks it as started.
///
/// A failed status update is logged and does not fail the registration.
///
/// # Errors
/// Returns a `NetworkError` if the network refuses the registration or cannot be reached.
pub async fn start_session<N: VerificationNetwork>(
    network: &N,
    request: &SignedRequest,
) -> Result<SessionId, ReclaimError> {
    let session_id = network.init_session(request).await?;
    if let Err(e) = network
        .update_session(&session_id, SessionStatus::SessionStarted)
        .await
    {
        log::warn!("failed to mark session {session_id} as started: {e}");
    }
    Ok(session_id)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InitSessionBody<'a> {
    provider_id: &'a str,
    app_id: String,
    timestamp: String,
    signature: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitSessionResponse {
    session_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateSessionBody<'a> {
    session_id: &'a str,
    status: SessionStatus,
}

#[derive(Deserialize)]
struct StatusResponse {
    session: Option<StatusSession>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusSession {
    status_v2: SessionStatus,
    #[serde(default)]
    proofs: Option<Vec<Proof>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ShortenBody<'a> {
    full_url: &'a str,
}

#[derive(Deserialize)]
struct ShortenResponse {
    result: ShortenResult,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShortenResult {
    short_url: String,
}

#[derive(Deserialize)]
struct ProviderResponse {
    providers: ProviderData,
}

/// The Reclaim backend: provider directory, session registry and URL shortener.
#[derive(Debug, Clone)]
pub struct ReclaimBackend {
    config: NetworkConfig,
    http: HttpClient,
}

impl ReclaimBackend {
    /// Creates a client for the backend described by `config`.
    ///
    /// # Errors
    /// Returns `InvalidUrl` if the backend URL is not an absolute `https` URL. Plain
    /// `http` is accepted only with `allow_insecure_http`.
    pub fn new(config: NetworkConfig) -> Result<Self, ReclaimError> {
        let url = Url::parse(&config.backend_url).map_err(|e| ReclaimError::InvalidUrl {
            url: config.backend_url.clone(),
            reason: e.to_string(),
        })?;
        let scheme_allowed = match url.scheme() {
            "https" => true,
            "http" => config.allow_insecure_http,
            _ => false,
        };
        if !scheme_allowed {
            return Err(ReclaimError::InvalidUrl {
                url: config.backend_url,
                reason: "backend must be served over https".to_string(),
            });
        }

        Ok(Self {
            http: HttpClient::new(config.retry),
            config,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &NetworkConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.backend_url.trim_end_matches('/'))
    }

    /// Backend URL with `segments` appended as percent-encoded path segments.
    fn resource_url(&self, segments: &[&str]) -> Result<Url, ReclaimError> {
        let invalid = |reason: String| ReclaimError::InvalidUrl {
            url: self.config.backend_url.clone(),
            reason,
        };
        let mut url = Url::parse(&self.config.backend_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("backend url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Shortens `url` through the backend. Falls back to `url` itself when shortening
    /// fails.
    #[instrument(skip(self, url))]
    pub async fn shorten_url(&self, url: &str) -> String {
        match self.try_shorten_url(url).await {
            Ok(short_url) => short_url,
            Err(e) => {
                log::warn!("failed to shorten request url, using the full url: {e}");
                url.to_string()
            }
        }
    }

    async fn try_shorten_url(&self, url: &str) -> Result<String, ReclaimError> {
        let response: ShortenResponse = self
            .http
            .json(
                self.http
                    .post(&self.endpoint("/api/sdk/shortener"))
                    .json(&ShortenBody { full_url: url }),
            )
            .await?;
        Ok(response.result.short_url)
    }

    /// The App Clip link for `request`, under the configured App Clip prefix.
    ///
    /// # Errors
    /// Returns `SerializationError` if the request cannot be encoded.
    pub fn app_clip_url(&self, request: &SignedRequest) -> Result<String, ReclaimError> {
        request.to_request_url_with_base(&self.config.app_clip_url)
    }
}

impl ProviderDirectory for ReclaimBackend {
    #[instrument(skip(self, provider_id), fields(provider_id = %provider_id))]
    async fn resolve(
        &self,
        provider_id: &ProviderId,
    ) -> Result<ProviderData, ReclaimError> {
        let url = self.resource_url(&["api", "providers", provider_id.as_str()])?;
        let response = self.http.send(self.http.get(url.as_str())).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ReclaimError::UnknownProvider(provider_id.to_string()));
        }
        let response: ProviderResponse = decode_json(response).await?;
        Ok(response.providers)
    }
}

impl VerificationNetwork for ReclaimBackend {
    #[instrument(skip(self, request), fields(provider_id = %request.provider_id()))]
    async fn init_session(&self, request: &SignedRequest) -> Result<SessionId, ReclaimError> {
        let body = InitSessionBody {
            provider_id: request.provider_id().as_str(),
            app_id: request.app_id().to_checksum(None),
            timestamp: request.timestamp_ms().to_string(),
            signature: request.signature_hex(),
        };
        let response: InitSessionResponse = self
            .http
            .json(
                self.http
                    .post(&self.endpoint("/api/sdk/init-session/"))
                    .json(&body),
            )
            .await?;
        log::info!("registered session {}", response.session_id);
        SessionId::new(response.session_id)
    }

    #[instrument(skip(self, session_id), fields(session_id = %session_id))]
    async fn update_session(
        &self,
        session_id: &SessionId,
        status: SessionStatus,
    ) -> Result<(), ReclaimError> {
        let body = UpdateSessionBody {
            session_id: session_id.as_str(),
            status,
        };
        self.http
            .send_ok(
                self.http
                    .post(&self.endpoint("/api/sdk/update/session/"))
                    .json(&body),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, session_id), fields(session_id = %session_id))]
    async fn fetch_status(&self, session_id: &SessionId) -> Result<StatusReport, ReclaimError> {
        let url = self.status_url(session_id);
        let response: StatusResponse = self.http.json(self.http.get(&url)).await?;
        let session = response.session.ok_or_else(|| ReclaimError::NetworkError {
            url,
            status: None,
            error: "status response carries no session".to_string(),
            retryable: false,
        })?;
        log::debug!("session {session_id} is {}", session.status_v2);
        Ok(session
            .status_v2
            .into_report(session.proofs.unwrap_or_default()))
    }

    async fn request_url(&self, request: &SignedRequest) -> Result<String, ReclaimError> {
        let url = request.to_request_url_with_base(&self.config.share_url)?;
        if self.config.shorten_urls {
            Ok(self.shorten_url(&url).await)
        } else {
            Ok(url)
        }
    }

    fn status_url(&self, session_id: &SessionId) -> String {
        self.endpoint(&format!("/api/sdk/session/{session_id}"))
    }

    fn callback_url(&self, session_id: &SessionId) -> String {
        self.endpoint(&format!("/api/sdk/callback?callbackId={session_id}"))
    }
}
