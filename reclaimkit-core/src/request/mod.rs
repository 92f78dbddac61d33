//! Proof request construction.
//!
//! A request is built in two phases. A [`RequestDraft`] collects the provider, context
//! entries, parameters and endpoints and can be freely mutated. Consuming it with
//! [`RequestDraft::finalize`] produces a [`SignedRequest`], which carries the canonical
//! payload and its signature and has no mutators. Changing a signed request means
//! converting it back into a draft, which drops the signature.

use std::{collections::BTreeMap, fmt};

use alloy_primitives::Address;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::ReclaimError;

mod draft;
mod signed;

pub use draft::RequestDraft;
pub use signed::SignedRequest;

/// Reference to the provider (claim template) a request asks a proof for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    /// Wraps a provider reference.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the reference is empty.
    pub fn new(provider_id: impl Into<String>) -> Result<Self, ReclaimError> {
        let provider_id = provider_id.into();
        if provider_id.trim().is_empty() {
            return Err(ReclaimError::InvalidInput {
                attribute: "provider_id".to_string(),
                reason: "provider id is empty".to_string(),
            });
        }
        Ok(Self(provider_id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An application-supplied binding embedded in the request and echoed back in the
/// proof, e.g. a wallet address and a note about the action being authorized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    #[serde(rename = "contextAddress")]
    pub address: String,
    #[serde(rename = "contextMessage")]
    pub message: String,
}

/// Where the end user is sent after verification and where the proof is delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoints {
    /// Page the end user is redirected to once the proof is submitted.
    pub redirect_url: Option<String>,
    /// Endpoint the network POSTs the proof to. The network's default callback is
    /// used when absent.
    pub app_callback_url: Option<String>,
    /// Deliver the proof as JSON instead of a URL-encoded form body.
    pub json_proof_response: bool,
}

/// Fields covered by the request signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequestFields {
    pub(crate) app_id: Address,
    pub(crate) provider_id: ProviderId,
    /// Creation time, epoch milliseconds.
    pub(crate) timestamp_ms: u64,
    pub(crate) context: Vec<ContextEntry>,
    pub(crate) parameters: BTreeMap<String, String>,
    pub(crate) endpoints: Endpoints,
    pub(crate) accept_ai_providers: bool,
}

/// Canonical serialization of [`RequestFields`]. The field order here is the signed order.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalPayload<'a> {
    application_id: String,
    provider_id: &'a str,
    timestamp: u64,
    context: &'a [ContextEntry],
    parameters: &'a BTreeMap<String, String>,
    redirect_url: Option<&'a str>,
    app_callback_url: Option<&'a str>,
    json_proof_response: bool,
    accept_ai_providers: bool,
}

impl RequestFields {
    pub(crate) fn new(app_id: Address, provider_id: ProviderId, timestamp_ms: u64) -> Self {
        Self {
            app_id,
            provider_id,
            timestamp_ms,
            context: Vec::new(),
            parameters: BTreeMap::new(),
            endpoints: Endpoints::default(),
            accept_ai_providers: false,
        }
    }

    /// Appends a context entry. On error the fields are left untouched.
    pub(crate) fn push_context(
        &mut self,
        address: &str,
        message: &str,
    ) -> Result<(), ReclaimError> {
        if address.is_empty() || message.is_empty() {
            return Err(ReclaimError::InvalidInput {
                attribute: "context".to_string(),
                reason: "context address and message must not be empty".to_string(),
            });
        }
        if self.context.iter().any(|entry| entry.address == address) {
            return Err(ReclaimError::DuplicateContext(address.to_string()));
        }
        self.context.push(ContextEntry {
            address: address.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }

    /// Merges `params` into the parameters, last write wins. Either every entry is
    /// applied or none is.
    pub(crate) fn merge_params<I, K, V>(&mut self, params: I) -> Result<(), ReclaimError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let params: Vec<(String, String)> = params
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        if params.iter().any(|(key, _)| key.is_empty()) {
            return Err(ReclaimError::InvalidInput {
                attribute: "parameters".to_string(),
                reason: "parameter names must not be empty".to_string(),
            });
        }
        self.parameters.extend(params);
        Ok(())
    }

    /// Deterministic byte encoding of the fields, used as the signing input.
    pub(crate) fn canonical_bytes(&self) -> Result<Vec<u8>, ReclaimError> {
        let payload = CanonicalPayload {
            application_id: self.app_id.to_checksum(None),
            provider_id: self.provider_id.as_str(),
            timestamp: self.timestamp_ms,
            context: &self.context,
            parameters: &self.parameters,
            redirect_url: self.endpoints.redirect_url.as_deref(),
            app_callback_url: self.endpoints.app_callback_url.as_deref(),
            json_proof_response: self.endpoints.json_proof_response,
            accept_ai_providers: self.accept_ai_providers,
        };
        Ok(serde_json::to_vec(&payload)?)
    }
}

/// Checks that `url` is a well-formed absolute URL and returns it unchanged.
pub(crate) fn validate_url(url: &str) -> Result<String, ReclaimError> {
    let invalid = |reason: String| ReclaimError::InvalidUrl {
        url: url.to_string(),
        reason,
    };
    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    if !parsed.has_host() {
        return Err(invalid("url has no host".to_string()));
    }
    Ok(url.to_string())
}
