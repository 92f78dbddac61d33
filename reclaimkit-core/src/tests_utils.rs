//! Test helpers: well-known keys, a provider directory and proof fixtures.

use alloy::signers::{local::PrivateKeySigner, SignerSync};
use alloy_primitives::Address;
use secrecy::SecretString;

use crate::{
    credentials::Credentials,
    primitives::signature_to_hex,
    proof::{ClaimData, Proof, WitnessData},
    provider::{ProviderData, StaticDirectory},
    request::{RequestDraft, SignedRequest},
};

// Well-known development keys, never used outside tests.
pub const APP_ID: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
pub const APP_SECRET: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const OTHER_APP_ID: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
pub const OTHER_APP_SECRET: &str =
    "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
pub const WITNESS_SECRET: &str =
    "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a";

pub fn credentials() -> Credentials {
    Credentials::new(APP_ID, &SecretString::from(APP_SECRET.to_string())).unwrap()
}

pub fn other_credentials() -> Credentials {
    Credentials::new(OTHER_APP_ID, &SecretString::from(OTHER_APP_SECRET.to_string()))
        .unwrap()
}

pub fn witness() -> PrivateKeySigner {
    WITNESS_SECRET.parse().unwrap()
}

pub fn witness_address() -> Address {
    witness().address()
}

pub fn provider(id: &str) -> ProviderData {
    serde_json::from_value(serde_json::json!({
        "httpProviderId": id,
        "name": format!("Provider {id}"),
        "url": "https://mail.example.com/api/me",
        "loginUrl": "https://mail.example.com/login",
        "responseSelections": [{ "responseMatch": "\"email\":\"{{email}}\"" }]
    }))
    .unwrap()
}

pub fn directory() -> StaticDirectory {
    StaticDirectory::new()
        .with_provider(provider("P1"))
        .with_provider(provider("P2"))
}

/// Provider `P1`, context `("0xabc", "login")`, email parameter.
pub async fn signed_request() -> SignedRequest {
    let credentials = credentials();
    let mut draft = RequestDraft::create(&credentials, "P1", &directory())
        .await
        .unwrap();
    draft.add_context("0xabc", "login").unwrap();
    draft.set_params([("email", "a@b.com")]).unwrap();
    draft.finalize(&credentials).unwrap()
}

/// A proof for `provider` echoing `context`, attested by [`witness`].
pub fn proof_for(provider: &str, context: &str, timestamp_s: u64) -> Proof {
    let mut claim_data = ClaimData {
        provider: provider.to_string(),
        parameters: r#"{"email":"a@b.com"}"#.to_string(),
        owner: OTHER_APP_ID.to_string(),
        timestamp_s,
        context: context.to_string(),
        identifier: String::new(),
        epoch: 1,
    };
    claim_data.identifier = claim_data.compute_identifier();
    sign_claim(claim_data)
}

/// A proof answering `request`, attested by [`witness`].
pub fn proof_for_request(request: &SignedRequest, timestamp_s: u64) -> Proof {
    proof_for(
        request.provider_id().as_str(),
        &request.context_echo().unwrap(),
        timestamp_s,
    )
}

/// Signs `claim_data` with the witness key, keeping the fields as given.
pub fn sign_claim(claim_data: ClaimData) -> Proof {
    let witness = witness();
    let signature = witness
        .sign_message_sync(claim_data.sign_data().as_bytes())
        .unwrap();
    Proof {
        identifier: claim_data.identifier.clone(),
        claim_data,
        signatures: vec![signature_to_hex(&signature)],
        witnesses: vec![WitnessData {
            id: witness.address().to_string(),
            url: "wss://witness.reclaimprotocol.org/ws".to_string(),
        }],
        public_data: None,
    }
}
