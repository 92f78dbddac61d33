//! Proofs returned by the verification network.

use alloy_primitives::keccak256;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::ReclaimError;

/// URL marking a witness entry as a manual verification by the network operator.
pub const MANUAL_VERIFY_WITNESS_URL: &str = "manual-verify";

/// The claim attested by the witnesses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimData {
    /// Provider the claim was produced for.
    pub provider: String,
    /// Provider parameters, as a JSON encoded string.
    pub parameters: String,
    /// Address of the end user that generated the claim.
    pub owner: String,
    /// Claim creation time, epoch seconds.
    pub timestamp_s: u64,
    /// Context echoed from the request, as a JSON encoded string.
    pub context: String,
    pub identifier: String,
    /// Witness set epoch the claim was attested in.
    pub epoch: u64,
}

impl ClaimData {
    /// Recomputes the claim identifier: `keccak256` of provider, parameters and context
    /// joined by newlines, as `0x`-prefixed lowercase hex.
    #[must_use]
    pub fn compute_identifier(&self) -> String {
        let info = format!("{}\n{}\n{}", self.provider, self.parameters, self.context);
        format!("0x{}", hex::encode(keccak256(info.as_bytes())))
    }

    /// The message every witness signs for this claim.
    #[must_use]
    pub fn sign_data(&self) -> String {
        format!(
            "{}\n{}\n{}\n{}",
            self.identifier,
            self.owner.to_lowercase(),
            self.timestamp_s,
            self.epoch
        )
    }
}

/// A witness that attested a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessData {
    /// Address of the witness.
    pub id: String,
    pub url: String,
}

/// A proof delivered by the network, by polling or callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    pub identifier: String,
    pub claim_data: ClaimData,
    /// Witness signatures over [`ClaimData::sign_data`], `0x`-prefixed hex.
    pub signatures: Vec<String>,
    #[serde(default)]
    pub witnesses: Vec<WitnessData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_data: Option<serde_json::Value>,
}

impl Proof {
    /// Deserializes a proof from JSON.
    ///
    /// # Errors
    /// Returns `SerializationError` if the JSON is not a proof.
    pub fn from_json(json: &str) -> Result<Self, ReclaimError> {
        Ok(serde_json::from_str(json)?)
    }

    /// # Errors
    /// Returns `SerializationError` if serialization fails.
    pub fn to_json(&self) -> Result<String, ReclaimError> {
        Ok(serde_json::to_string(self)?)
    }

    /// The context the claim echoes back from the request.
    #[must_use]
    pub fn context_echo(&self) -> &str {
        &self.claim_data.context
    }

    /// Whether the proof was verified manually by the network operator instead of by
    /// the witness network.
    #[must_use]
    pub fn is_manual_verification(&self) -> bool {
        self.witnesses
            .first()
            .is_some_and(|witness| witness.url == MANUAL_VERIFY_WITNESS_URL)
    }

    /// Reshapes the proof for submission to the Reclaim verifier contract.
    #[must_use]
    pub fn to_onchain(&self) -> OnchainProof {
        OnchainProof {
            claim_info: ClaimInfo {
                context: self.claim_data.context.clone(),
                parameters: self.claim_data.parameters.clone(),
                provider: self.claim_data.provider.clone(),
            },
            signed_claim: SignedClaim {
                claim: Claim {
                    identifier: self.claim_data.identifier.clone(),
                    owner: self.claim_data.owner.clone(),
                    timestamp_s: self.claim_data.timestamp_s,
                    epoch: self.claim_data.epoch,
                },
                signatures: self.signatures.clone(),
            },
        }
    }
}

/// A proof in the shape expected by the Reclaim verifier contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnchainProof {
    pub claim_info: ClaimInfo,
    pub signed_claim: SignedClaim,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimInfo {
    pub context: String,
    pub parameters: String,
    pub provider: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedClaim {
    pub claim: Claim,
    pub signatures: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub identifier: String,
    pub owner: String,
    pub timestamp_s: u64,
    pub epoch: u64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CallbackBody {
    Batch(Vec<Proof>),
    Single(Box<Proof>),
}

/// Decodes the body of a callback delivery.
///
/// The network POSTs either a single proof or an array of proofs. Unless the request
/// asked for a JSON proof response, the JSON document is URL-encoded.
///
/// # Errors
/// Returns `SerializationError` if the body does not hold proofs.
pub fn parse_callback_body(body: &str) -> Result<Vec<Proof>, ReclaimError> {
    let body = body.trim();
    let json = if body.starts_with('{') || body.starts_with('[') {
        body.to_string()
    } else {
        url_decode(body)?
    };

    match serde_json::from_str(&json)? {
        CallbackBody::Batch(proofs) => Ok(proofs),
        CallbackBody::Single(proof) => Ok(vec![*proof]),
    }
}

fn url_decode(body: &str) -> Result<String, ReclaimError> {
    let mut url =
        Url::parse("https://callback.invalid/").map_err(|e| ReclaimError::SerializationError {
            error: e.to_string(),
        })?;
    url.set_query(Some(body));
    url.query_pairs()
        .next()
        .map(|(key, _)| key.into_owned())
        .ok_or_else(|| ReclaimError::SerializationError {
            error: "empty callback body".to_string(),
        })
}
