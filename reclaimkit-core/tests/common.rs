//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use alloy::signers::{local::PrivateKeySigner, SignerSync};
use eyre::Result;
use mockito::{Matcher, Mock, ServerGuard};
use reclaimkit_core::{
    config::NetworkConfig,
    network::ReclaimBackend,
    primitives::signature_to_hex,
    proof::{ClaimData, Proof, WitnessData},
    provider::{ProviderData, StaticDirectory},
    Credentials, RequestDraft, SignedRequest,
};
use secrecy::SecretString;

pub const APP_ID: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
pub const APP_SECRET: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const OWNER: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
pub const WITNESS_SECRET: &str =
    "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn credentials() -> Result<Credentials> {
    Ok(Credentials::new(
        APP_ID,
        &SecretString::from(APP_SECRET.to_string()),
    )?)
}

pub fn witness() -> Result<PrivateKeySigner> {
    Ok(WITNESS_SECRET.parse()?)
}

pub fn provider(id: &str) -> Result<ProviderData> {
    Ok(serde_json::from_value(serde_json::json!({
        "httpProviderId": id,
        "name": "Email ownership",
        "url": "https://mail.example.com/api/me",
        "loginUrl": "https://mail.example.com/login",
        "responseSelections": [{ "responseMatch": "\"email\":\"{{email}}\"" }]
    }))?)
}

pub fn directory() -> Result<StaticDirectory> {
    Ok(StaticDirectory::new()
        .with_provider(provider("P1")?)
        .with_provider(provider("P2")?))
}

/// A draft for `P1` with context `("0xabc", "login")` and an email parameter.
pub async fn draft() -> Result<RequestDraft> {
    let mut draft = RequestDraft::create(&credentials()?, "P1", &directory()?).await?;
    draft.add_context("0xabc", "login")?;
    draft.set_params([("email", "a@b.com")])?;
    Ok(draft)
}

pub async fn signed_request() -> Result<SignedRequest> {
    Ok(draft().await?.finalize(&credentials()?)?)
}

/// A proof for `provider` echoing `context`, attested by [`witness`].
pub fn attested_proof(provider: &str, context: &str, timestamp_s: u64) -> Result<Proof> {
    let mut claim_data = ClaimData {
        provider: provider.to_string(),
        parameters: r#"{"email":"a@b.com"}"#.to_string(),
        owner: OWNER.to_string(),
        timestamp_s,
        context: context.to_string(),
        identifier: String::new(),
        epoch: 1,
    };
    claim_data.identifier = claim_data.compute_identifier();

    let witness = witness()?;
    let signature = witness.sign_message_sync(claim_data.sign_data().as_bytes())?;
    Ok(Proof {
        identifier: claim_data.identifier.clone(),
        claim_data,
        signatures: vec![signature_to_hex(&signature)],
        witnesses: vec![WitnessData {
            id: witness.address().to_string(),
            url: "wss://witness.reclaimprotocol.org/ws".to_string(),
        }],
        public_data: None,
    })
}

/// A backend talking to `server` over plain http, without URL shortening.
pub fn backend(server: &ServerGuard) -> Result<ReclaimBackend> {
    Ok(ReclaimBackend::new(NetworkConfig {
        allow_insecure_http: true,
        shorten_urls: false,
        ..NetworkConfig::with_backend_url(server.url())
    })?)
}

/// Mocks session registration, answering with `session_id`.
pub async fn mock_registration(server: &mut ServerGuard, session_id: &str) -> (Mock, Mock) {
    let init = server
        .mock("POST", "/api/sdk/init-session/")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "providerId": "P1",
            "appId": APP_ID,
        })))
        .with_status(201)
        .with_body(serde_json::json!({ "sessionId": session_id }).to_string())
        .expect(1)
        .create_async()
        .await;
    let update = server
        .mock("POST", "/api/sdk/update/session/")
        .match_body(Matcher::Json(serde_json::json!({
            "sessionId": session_id,
            "status": "SESSION_STARTED",
        })))
        .with_status(200)
        .with_body(r#"{"message": "session status updated"}"#)
        .create_async()
        .await;
    (init, update)
}

/// Mocks the status endpoint of `session_id`.
pub async fn mock_status(
    server: &mut ServerGuard,
    session_id: &str,
    status: &str,
    proofs: &[Proof],
) -> Mock {
    server
        .mock("GET", format!("/api/sdk/session/{session_id}").as_str())
        .with_status(200)
        .with_body(
            serde_json::json!({
                "message": "session found",
                "session": {
                    "sessionId": session_id,
                    "statusV2": status,
                    "proofs": proofs,
                }
            })
            .to_string(),
        )
        .create_async()
        .await
}
