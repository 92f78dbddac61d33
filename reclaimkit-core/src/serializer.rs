//! Portable text form of signed requests, for handing a request to another process.
//!
//! The exported text is JSON. It carries every signed field, the signature, the session
//! binding and the SDK version, but never the application secret. Importing verifies
//! the signature against the embedded application id, so a request tampered with at
//! rest is rejected.

use std::collections::BTreeMap;

use alloy_primitives::{Address, Signature};
use serde::{Deserialize, Serialize};

use crate::{
    credentials::Credentials,
    error::ReclaimError,
    primitives::{signature_to_hex, ParseFromInput},
    request::{validate_url, ContextEntry, ProviderId, RequestFields, SignedRequest},
    session::SessionId,
};

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ExportedRequest {
    application_id: String,
    provider_id: String,
    timestamp: u64,
    #[serde(default)]
    context: Vec<ContextEntry>,
    #[serde(default)]
    parameters: BTreeMap<String, String>,
    #[serde(default)]
    redirect_url: Option<String>,
    #[serde(default)]
    app_callback_url: Option<String>,
    #[serde(default)]
    json_proof_response: bool,
    #[serde(default)]
    accept_ai_providers: bool,
    signature: String,
    #[serde(default)]
    session_id: Option<String>,
}

/// Exports `request` as UTF-8 JSON text.
///
/// # Errors
/// Returns `SerializationError` if the request cannot be encoded.
pub fn export(request: &SignedRequest) -> Result<String, ReclaimError> {
    let endpoints = request.endpoints();
    let exported = ExportedRequest {
        application_id: request.app_id().to_checksum(None),
        provider_id: request.provider_id().to_string(),
        timestamp: request.timestamp_ms(),
        context: request.context().to_vec(),
        parameters: request.parameters().clone(),
        redirect_url: endpoints.redirect_url.clone(),
        app_callback_url: endpoints.app_callback_url.clone(),
        json_proof_response: endpoints.json_proof_response,
        accept_ai_providers: request.accept_ai_providers(),
        signature: signature_to_hex(request.signature()),
        session_id: request.session_id().map(ToString::to_string),
    };
    Ok(serde_json::to_string(&exported)?)
}

fn malformed(e: impl std::fmt::Display) -> ReclaimError {
    ReclaimError::MalformedConfig(e.to_string())
}

/// Imports a request exported with [`export`].
///
/// The imported request produces the same canonical bytes, signature and URLs as the
/// exported one. Changing it requires the original credentials to finalize again.
///
/// # Errors
/// - `MalformedConfig` if the text is not an exported request or a field is invalid.
/// - `SignatureMismatch` if the signature does not match the embedded fields.
pub fn import(text: &str) -> Result<SignedRequest, ReclaimError> {
    let exported: ExportedRequest = serde_json::from_str(text).map_err(malformed)?;

    let app_id =
        Address::parse_from_input(&exported.application_id, "application_id").map_err(malformed)?;
    let provider_id = ProviderId::new(exported.provider_id).map_err(malformed)?;

    let mut fields = RequestFields::new(app_id, provider_id, exported.timestamp);
    for entry in &exported.context {
        fields
            .push_context(&entry.address, &entry.message)
            .map_err(malformed)?;
    }
    fields
        .merge_params(exported.parameters)
        .map_err(malformed)?;
    fields.endpoints.redirect_url = exported
        .redirect_url
        .as_deref()
        .map(validate_url)
        .transpose()
        .map_err(malformed)?;
    fields.endpoints.app_callback_url = exported
        .app_callback_url
        .as_deref()
        .map(validate_url)
        .transpose()
        .map_err(malformed)?;
    fields.endpoints.json_proof_response = exported.json_proof_response;
    fields.accept_ai_providers = exported.accept_ai_providers;

    let signature =
        Signature::parse_from_input(&exported.signature, "signature").map_err(malformed)?;
    let session_id = exported
        .session_id
        .map(SessionId::new)
        .transpose()
        .map_err(malformed)?;

    let canonical = fields.canonical_bytes()?;
    if !Credentials::verify(app_id, &canonical, &signature) {
        log::warn!(
            "rejected imported request for provider {}: signature mismatch",
            fields.provider_id
        );
        return Err(ReclaimError::SignatureMismatch);
    }

    Ok(SignedRequest::from_parts(
        fields,
        canonical,
        signature,
        session_id,
    ))
}
