use std::collections::BTreeMap;

use alloy_primitives::{Address, Signature};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Serialize;

use crate::{
    defaults::{APP_CLIP_URL, RECLAIM_SHARE_URL, SDK_VERSION},
    error::ReclaimError,
    primitives::signature_to_hex,
    session::SessionId,
};

use super::{ContextEntry, Endpoints, ProviderId, RequestDraft, RequestFields};

/// A finalized proof request: canonical payload plus the application's signature over it.
///
/// There is no way to mutate a signed request. Use [`SignedRequest::into_draft`] to
/// change it, then finalize the draft again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    fields: RequestFields,
    canonical: Vec<u8>,
    signature: Signature,
    session_id: Option<SessionId>,
}

/// Request template handed to the request front-end.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestTemplate<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
    provider_id: &'a str,
    application_id: String,
    signature: String,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_url: Option<&'a str>,
    context: String,
    parameters: &'a BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_url: Option<&'a str>,
    json_proof_response: bool,
    accept_ai_providers: bool,
    sdk_version: &'a str,
}

#[derive(Serialize)]
struct ContextEcho<'a> {
    contexts: &'a [ContextEntry],
}

impl SignedRequest {
    pub(crate) const fn from_parts(
        fields: RequestFields,
        canonical: Vec<u8>,
        signature: Signature,
        session_id: Option<SessionId>,
    ) -> Self {
        Self {
            fields,
            canonical,
            signature,
            session_id,
        }
    }

    pub(crate) const fn fields(&self) -> &RequestFields {
        &self.fields
    }

    /// Binds the request to the network session it was registered under. The session
    /// id is not part of the signed payload.
    #[must_use]
    pub fn with_session(self, session_id: SessionId) -> Self {
        Self {
            session_id: Some(session_id),
            ..self
        }
    }

    /// Converts the request back into a draft. The signature and session binding are
    /// dropped.
    #[must_use]
    pub fn into_draft(self) -> RequestDraft {
        RequestDraft::from_fields(self.fields)
    }

    /// The bytes the signature was computed over.
    #[must_use]
    pub fn canonical_bytes(&self) -> &[u8] {
        &self.canonical
    }

    #[must_use]
    pub const fn signature(&self) -> &Signature {
        &self.signature
    }

    /// The signature as `0x`-prefixed hex.
    #[must_use]
    pub fn signature_hex(&self) -> String {
        signature_to_hex(&self.signature)
    }

    #[must_use]
    pub const fn app_id(&self) -> Address {
        self.fields.app_id
    }

    #[must_use]
    pub const fn provider_id(&self) -> &ProviderId {
        &self.fields.provider_id
    }

    /// Creation time of the request, in epoch milliseconds.
    #[must_use]
    pub const fn timestamp_ms(&self) -> u64 {
        self.fields.timestamp_ms
    }

    #[must_use]
    pub fn context(&self) -> &[ContextEntry] {
        &self.fields.context
    }

    #[must_use]
    pub const fn parameters(&self) -> &BTreeMap<String, String> {
        &self.fields.parameters
    }

    #[must_use]
    pub const fn endpoints(&self) -> &Endpoints {
        &self.fields.endpoints
    }

    #[must_use]
    pub const fn accept_ai_providers(&self) -> bool {
        self.fields.accept_ai_providers
    }

    /// The network session the request is registered under, if any.
    #[must_use]
    pub const fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// The context, as the proof is expected to echo it.
    ///
    /// # Errors
    /// Returns `SerializationError` if the context cannot be encoded.
    pub fn context_echo(&self) -> Result<String, ReclaimError> {
        Ok(serde_json::to_string(&ContextEcho {
            contexts: &self.fields.context,
        })?)
    }

    /// The URL of the Reclaim request front-end for this request.
    ///
    /// # Errors
    /// Returns `SerializationError` if the request template cannot be encoded.
    pub fn to_request_url(&self) -> Result<String, ReclaimError> {
        self.to_request_url_with_base(RECLAIM_SHARE_URL)
    }

    /// The request front-end URL, using `base` as the URL prefix.
    ///
    /// # Errors
    /// Returns `SerializationError` if the request template cannot be encoded.
    pub fn to_request_url_with_base(&self, base: &str) -> Result<String, ReclaimError> {
        Ok(format!("{base}{}", self.encoded_template()?))
    }

    /// The App Clip deep link for this request.
    ///
    /// # Errors
    /// Returns `SerializationError` if the request template cannot be encoded.
    pub fn to_app_clip_url(&self) -> Result<String, ReclaimError> {
        self.to_request_url_with_base(APP_CLIP_URL)
    }

    fn encoded_template(&self) -> Result<String, ReclaimError> {
        let template = RequestTemplate {
            session_id: self.session_id.as_ref().map(SessionId::as_str),
            provider_id: self.fields.provider_id.as_str(),
            application_id: self.fields.app_id.to_checksum(None),
            signature: self.signature_hex(),
            timestamp: self.fields.timestamp_ms.to_string(),
            callback_url: self.fields.endpoints.app_callback_url.as_deref(),
            context: self.context_echo()?,
            parameters: &self.fields.parameters,
            redirect_url: self.fields.endpoints.redirect_url.as_deref(),
            json_proof_response: self.fields.endpoints.json_proof_response,
            accept_ai_providers: self.fields.accept_ai_providers,
            sdk_version: SDK_VERSION,
        };
        Ok(URL_SAFE_NO_PAD.encode(serde_json::to_vec(&template)?))
    }
}
