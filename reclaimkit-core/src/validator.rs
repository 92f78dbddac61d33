//! Validation of proofs against the request they answer.

use std::collections::HashMap;

use alloy_primitives::{keccak256, Address, Signature};
use serde::{Deserialize, Serialize};

use crate::{
    config::ValidatorConfig,
    error::ValidationError,
    primitives::ParseFromInput,
    proof::{ClaimData, Proof, WitnessData},
    request::{ContextEntry, SignedRequest},
    utils::now_secs,
};

/// Decides whether a proof carries the attestations of the witnesses trusted for it.
///
/// How witnesses are selected is up to the verification network; implementations
/// encode one selection strategy.
pub trait AttestationVerifier: Send + Sync {
    /// Checks the witness signatures of `proof`. The claim identifier has already been
    /// checked against the claim data.
    ///
    /// # Errors
    /// Returns `BadSignature` if a required attestation is missing or invalid.
    fn verify(&self, proof: &Proof) -> Result<(), ValidationError>;
}

/// Recovers the addresses that signed `claim`.
///
/// # Errors
/// Returns `BadSignature` if any signature is malformed or unrecoverable.
pub fn recover_signers(
    claim: &ClaimData,
    signatures: &[String],
) -> Result<Vec<Address>, ValidationError> {
    let message = claim.sign_data();
    signatures
        .iter()
        .map(|signature| {
            Signature::parse_from_input(signature, "signature")
                .ok()
                .and_then(|signature| {
                    signature.recover_address_from_msg(message.as_bytes()).ok()
                })
                .ok_or(ValidationError::BadSignature)
        })
        .collect()
}

fn require_all(
    expected: &[Address],
    proof: &Proof,
) -> Result<(), ValidationError> {
    if expected.is_empty() {
        return Err(ValidationError::BadSignature);
    }
    let signers = recover_signers(&proof.claim_data, &proof.signatures)?;
    if expected.iter().all(|witness| signers.contains(witness)) {
        Ok(())
    } else {
        Err(ValidationError::BadSignature)
    }
}

/// A fixed set of trusted witnesses. Every witness of the set must have signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WitnessSet {
    witnesses: Vec<Address>,
}

impl WitnessSet {
    #[must_use]
    pub const fn new(witnesses: Vec<Address>) -> Self {
        Self { witnesses }
    }

    #[must_use]
    pub fn witnesses(&self) -> &[Address] {
        &self.witnesses
    }
}

impl AttestationVerifier for WitnessSet {
    fn verify(&self, proof: &Proof) -> Result<(), ValidationError> {
        require_all(&self.witnesses, proof)
    }
}

/// State of the witness beacon for one epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeaconState {
    pub witnesses: Vec<WitnessData>,
    pub epoch: u64,
    pub witnesses_required_for_claim: u32,
    pub next_epoch_timestamp_s: u64,
}

impl BeaconState {
    /// Deterministically selects the witnesses responsible for the claim `identifier`
    /// created at `timestamp_s`.
    ///
    /// The selection is seeded with `keccak256` of the identifier, epoch, required
    /// witness count and timestamp; every pick consumes the next 4 bytes of the hash.
    /// Returns `None` if the state requires no witness or fewer witnesses are
    /// registered than required.
    #[must_use]
    pub fn select_witnesses(
        &self,
        identifier: &str,
        timestamp_s: u64,
    ) -> Option<Vec<WitnessData>> {
        let required = usize::try_from(self.witnesses_required_for_claim).ok()?;
        if required == 0 || self.witnesses.len() < required {
            return None;
        }

        let seed = format!(
            "{identifier}\n{}\n{}\n{timestamp_s}",
            self.epoch, self.witnesses_required_for_claim
        );
        let hash = keccak256(seed.as_bytes());

        let mut left = self.witnesses.clone();
        let mut selected = Vec::with_capacity(required);
        let mut offset = 0;
        for _ in 0..required {
            let mut word = [0u8; 4];
            word.copy_from_slice(&hash[offset..offset + 4]);
            let index = usize::try_from(u32::from_be_bytes(word)).unwrap_or(0) % left.len();
            selected.push(left.swap_remove(index));
            offset = (offset + 4) % hash.len();
        }
        Some(selected)
    }
}

/// Selects the witnesses of a claim from the beacon state of the claim's epoch. Every
/// selected witness must have signed.
#[derive(Debug, Clone, Default)]
pub struct BeaconVerifier {
    states: HashMap<u64, BeaconState>,
}

impl BeaconVerifier {
    #[must_use]
    pub fn new(states: impl IntoIterator<Item = BeaconState>) -> Self {
        Self {
            states: states.into_iter().map(|state| (state.epoch, state)).collect(),
        }
    }
}

impl AttestationVerifier for BeaconVerifier {
    fn verify(&self, proof: &Proof) -> Result<(), ValidationError> {
        let state = self
            .states
            .get(&proof.claim_data.epoch)
            .ok_or(ValidationError::BadSignature)?;
        let expected = state
            .select_witnesses(&proof.claim_data.identifier, proof.claim_data.timestamp_s)
            .ok_or(ValidationError::BadSignature)?
            .iter()
            .map(|witness| Address::parse_from_input(&witness.id, "witness"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ValidationError::BadSignature)?;
        require_all(&expected, proof)
    }
}

/// Accepts proofs verified manually by the network operator, i.e. proofs whose first
/// witness entry carries the `manual-verify` URL. These must be signed by the trusted
/// `operator`; the witness id the proof declares is ignored. All other proofs are
/// checked by `inner`.
#[derive(Debug, Clone)]
pub struct ManualVerification<V = WitnessSet> {
    operator: Address,
    inner: V,
}

impl<V: AttestationVerifier> ManualVerification<V> {
    #[must_use]
    pub const fn new(operator: Address, inner: V) -> Self {
        Self { operator, inner }
    }
}

impl<V: AttestationVerifier> AttestationVerifier for ManualVerification<V> {
    fn verify(&self, proof: &Proof) -> Result<(), ValidationError> {
        if proof.is_manual_verification() {
            require_all(&[self.operator], proof)
        } else {
            self.inner.verify(proof)
        }
    }
}

/// Context as echoed in the claim. Claims may carry extra keys (extracted parameters,
/// provider hash), which are ignored.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EchoedContext {
    contexts: Option<Vec<ContextEntry>>,
    context_address: Option<String>,
    context_message: Option<String>,
}

fn echoed_entries(echo: &str) -> Result<Vec<ContextEntry>, ValidationError> {
    if echo.trim().is_empty() {
        return Ok(Vec::new());
    }
    let echoed: EchoedContext =
        serde_json::from_str(echo).map_err(|_| ValidationError::ContextMismatch)?;
    match echoed {
        EchoedContext {
            contexts: Some(contexts),
            ..
        } => Ok(contexts),
        EchoedContext {
            context_address: Some(address),
            context_message: Some(message),
            ..
        } => Ok(vec![ContextEntry { address, message }]),
        EchoedContext {
            context_address: None,
            context_message: None,
            ..
        } => Ok(Vec::new()),
        _ => Err(ValidationError::ContextMismatch),
    }
}

/// Checks proofs returned by the network against the request they answer.
///
/// Checks run in a fixed order and stop at the first failure: witness attestation,
/// context binding, provider, freshness. The validator holds no mutable state and
/// can be shared across sessions and tasks.
#[derive(Debug, Clone)]
pub struct ProofValidator<V = WitnessSet> {
    verifier: V,
    config: ValidatorConfig,
}

impl<V: AttestationVerifier> ProofValidator<V> {
    #[must_use]
    pub fn new(verifier: V) -> Self {
        Self::with_config(verifier, ValidatorConfig::default())
    }

    #[must_use]
    pub const fn with_config(verifier: V, config: ValidatorConfig) -> Self {
        Self { verifier, config }
    }

    #[must_use]
    pub const fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validates `proof` against `request` at the current time.
    ///
    /// # Errors
    /// - `BadSignature` if the identifier does not match the claim or the claim is not
    ///   attested by the expected witnesses.
    /// - `ContextMismatch` if the echoed context differs from the request's context.
    /// - `ProviderMismatch` if the claim was produced for another provider.
    /// - `Expired` if the claim timestamp is outside the accepted window.
    pub fn validate(
        &self,
        proof: &Proof,
        request: &SignedRequest,
    ) -> Result<ClaimData, ValidationError> {
        self.validate_at(proof, request, now_secs())
    }

    /// Validates `proof` against `request` as of `now_s` (epoch seconds).
    ///
    /// # Errors
    /// See [`ProofValidator::validate`].
    pub fn validate_at(
        &self,
        proof: &Proof,
        request: &SignedRequest,
        now_s: u64,
    ) -> Result<ClaimData, ValidationError> {
        let result = self.check(proof, request, now_s);
        match &result {
            Ok(()) => log::debug!("proof {} accepted", proof.identifier),
            Err(e) => log::info!("proof {} rejected: {e}", proof.identifier),
        }
        result.map(|()| proof.claim_data.clone())
    }

    /// Validates every proof of a delivery, stopping at the first rejection.
    ///
    /// # Errors
    /// See [`ProofValidator::validate`].
    pub fn validate_all(
        &self,
        proofs: &[Proof],
        request: &SignedRequest,
    ) -> Result<Vec<ClaimData>, ValidationError> {
        let now_s = now_secs();
        proofs
            .iter()
            .map(|proof| self.validate_at(proof, request, now_s))
            .collect()
    }

    fn check(
        &self,
        proof: &Proof,
        request: &SignedRequest,
        now_s: u64,
    ) -> Result<(), ValidationError> {
        let claim = &proof.claim_data;

        let identifier = claim.compute_identifier();
        if !proof
            .identifier
            .trim_matches('"')
            .eq_ignore_ascii_case(&identifier)
            || !claim.identifier.eq_ignore_ascii_case(&identifier)
        {
            return Err(ValidationError::BadSignature);
        }
        if proof.signatures.is_empty() {
            return Err(ValidationError::BadSignature);
        }
        self.verifier.verify(proof)?;

        if echoed_entries(proof.context_echo())? != request.context() {
            return Err(ValidationError::ContextMismatch);
        }

        if claim.provider != request.provider_id().as_str() {
            return Err(ValidationError::ProviderMismatch);
        }

        let skew = self.config.max_clock_skew_secs;
        let requested_s = request.timestamp_ms() / 1000;
        let ts = claim.timestamp_s;
        if ts.saturating_add(skew) < requested_s
            || ts > now_s.saturating_add(skew)
            || now_s.saturating_sub(ts) > self.config.max_proof_age_secs
        {
            return Err(ValidationError::Expired);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        request::RequestDraft,
        tests_utils::{
            credentials, directory, proof_for, proof_for_request, sign_claim,
            signed_request, witness_address, OTHER_APP_ID,
        },
        proof::MANUAL_VERIFY_WITNESS_URL,
        utils::now_secs,
    };
    use test_case::test_case;

    fn validator() -> ProofValidator {
        ProofValidator::new(WitnessSet::new(vec![witness_address()]))
    }

    fn now_for(request: &SignedRequest) -> u64 {
        request.timestamp_ms() / 1000 + 10
    }

    #[tokio::test]
    async fn test_valid_proof_is_accepted() {
        let request = signed_request().await;
        let now = now_for(&request);
        let proof = proof_for_request(&request, now - 5);

        let claim = validator().validate_at(&proof, &request, now).unwrap();
        assert_eq!(claim, proof.claim_data);
    }

    #[tokio::test]
    async fn test_untrusted_witness_is_rejected() {
        let request = signed_request().await;
        let now = now_for(&request);
        let proof = proof_for_request(&request, now);

        let validator = ProofValidator::new(WitnessSet::new(vec![OTHER_APP_ID
            .parse()
            .unwrap()]));
        assert_eq!(
            validator.validate_at(&proof, &request, now),
            Err(ValidationError::BadSignature)
        );

        let empty = ProofValidator::new(WitnessSet::new(vec![]));
        assert_eq!(
            empty.validate_at(&proof, &request, now),
            Err(ValidationError::BadSignature)
        );
    }

    #[tokio::test]
    async fn test_tampered_claim_is_rejected() {
        let request = signed_request().await;
        let now = now_for(&request);

        let mut proof = proof_for_request(&request, now);
        proof.claim_data.parameters = r#"{"email":"evil@b.com"}"#.to_string();
        assert_eq!(
            validator().validate_at(&proof, &request, now),
            Err(ValidationError::BadSignature)
        );

        let mut proof = proof_for_request(&request, now);
        proof.claim_data.timestamp_s -= 1;
        assert_eq!(
            validator().validate_at(&proof, &request, now),
            Err(ValidationError::BadSignature)
        );

        let mut proof = proof_for_request(&request, now);
        proof.signatures = vec!["0xdeadbeef".to_string()];
        assert_eq!(
            validator().validate_at(&proof, &request, now),
            Err(ValidationError::BadSignature)
        );

        let mut proof = proof_for_request(&request, now);
        proof.signatures.clear();
        assert_eq!(
            validator().validate_at(&proof, &request, now),
            Err(ValidationError::BadSignature)
        );
    }

    #[tokio::test]
    async fn test_context_differing_by_one_character_is_rejected() {
        let mut draft = RequestDraft::create(&credentials(), "P1", &directory())
            .await
            .unwrap();
        draft.add_context("0xabc", "Example context").unwrap();
        let request = draft.finalize(&credentials()).unwrap();
        let now = now_for(&request);

        let echo = r#"{"contexts":[{"contextAddress":"0xabc","contextMessage":"Example Context"}]}"#;
        let proof = proof_for("P1", echo, now);
        assert_eq!(
            validator().validate_at(&proof, &request, now),
            Err(ValidationError::ContextMismatch)
        );
    }

    #[test_case(r#"{"contextAddress":"0xabc","contextMessage":"login","providerHash":"0x1"}"#, true ; "legacy single entry")]
    #[test_case(r#"{"contexts":[{"contextAddress":"0xabc","contextMessage":"login"}]}"#, true ; "entry list")]
    #[test_case(r#"{"contextAddress":"0xabc"}"#, false ; "partial legacy entry")]
    #[test_case("{}", false ; "no context")]
    #[test_case("not json", false ; "garbage")]
    fn test_context_echo_forms(echo: &str, accepted: bool) {
        let request = tokio_test::block_on(signed_request());
        let now = now_for(&request);
        let result = validator().validate_at(&proof_for("P1", echo, now), &request, now);
        if accepted {
            assert!(result.is_ok());
        } else {
            assert_eq!(result, Err(ValidationError::ContextMismatch));
        }
    }

    #[tokio::test]
    async fn test_other_provider_is_rejected() {
        let request = signed_request().await;
        let now = now_for(&request);
        let proof = proof_for("P2", &request.context_echo().unwrap(), now);
        assert_eq!(
            validator().validate_at(&proof, &request, now),
            Err(ValidationError::ProviderMismatch)
        );
    }

    #[tokio::test]
    async fn test_freshness_window() {
        let request = signed_request().await;
        let requested = request.timestamp_ms() / 1000;
        let config = ValidatorConfig::default();

        // before the request was created
        let proof = proof_for_request(&request, requested - config.max_clock_skew_secs - 1);
        assert_eq!(
            validator().validate_at(&proof, &request, requested),
            Err(ValidationError::Expired)
        );

        // from the future
        let proof = proof_for_request(&request, requested + config.max_clock_skew_secs + 1);
        assert_eq!(
            validator().validate_at(&proof, &request, requested),
            Err(ValidationError::Expired)
        );

        // replayed long after
        let proof = proof_for_request(&request, requested);
        assert_eq!(
            validator().validate_at(
                &proof,
                &request,
                requested + config.max_proof_age_secs + 1
            ),
            Err(ValidationError::Expired)
        );
    }

    #[tokio::test]
    async fn test_validate_all_stops_at_first_rejection() {
        let request = signed_request().await;
        let good = proof_for_request(&request, now_secs());
        let bad = proof_for("P2", &request.context_echo().unwrap(), now_secs());

        let validator = validator();
        assert_eq!(
            validator
                .validate_all(&[good.clone(), good.clone()], &request)
                .unwrap()
                .len(),
            2
        );
        assert_eq!(
            validator.validate_all(&[good, bad], &request),
            Err(ValidationError::ProviderMismatch)
        );
    }

    #[test]
    fn test_beacon_selection_is_deterministic() {
        let state = BeaconState {
            witnesses: (0..5)
                .map(|i| WitnessData {
                    id: format!("0x{i:040x}"),
                    url: format!("wss://w{i}.example.com"),
                })
                .collect(),
            epoch: 1,
            witnesses_required_for_claim: 3,
            next_epoch_timestamp_s: 0,
        };
        let first = state.select_witnesses("0x01", 1_700_000_000).unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(Some(first.clone()), state.select_witnesses("0x01", 1_700_000_000));

        let mut ids: Vec<_> = first.iter().map(|w| w.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test]
    async fn test_beacon_verifier() {
        let request = signed_request().await;
        let now = now_for(&request);
        let proof = proof_for_request(&request, now);

        let state = BeaconState {
            witnesses: proof.witnesses.clone(),
            epoch: proof.claim_data.epoch,
            witnesses_required_for_claim: 1,
            next_epoch_timestamp_s: 0,
        };
        let validator = ProofValidator::new(BeaconVerifier::new([state]));
        assert!(validator.validate_at(&proof, &request, now).is_ok());

        let mut other_epoch = proof.claim_data.clone();
        other_epoch.epoch += 1;
        let proof = sign_claim(other_epoch);
        assert_eq!(
            validator.validate_at(&proof, &request, now),
            Err(ValidationError::BadSignature)
        );
    }

    #[tokio::test]
    async fn test_manual_verification_needs_trusted_operator() {
        let request = signed_request().await;
        let now = now_for(&request);
        let other = Address::parse_from_input(OTHER_APP_ID, "witness").unwrap();

        let mut manual = proof_for_request(&request, now);
        manual.witnesses[0].url = MANUAL_VERIFY_WITNESS_URL.to_string();
        assert!(manual.is_manual_verification());

        let trusted = ProofValidator::new(ManualVerification::new(
            witness_address(),
            WitnessSet::new(vec![other]),
        ));
        assert!(trusted.validate_at(&manual, &request, now).is_ok());

        // the proof names the operator it claims, which is not trusted
        manual.witnesses[0].id = other.to_string();
        let untrusted = ProofValidator::new(ManualVerification::new(
            other,
            WitnessSet::new(vec![witness_address()]),
        ));
        assert_eq!(
            untrusted.validate_at(&manual, &request, now),
            Err(ValidationError::BadSignature)
        );

        // witness attested proofs are left to the inner strategy
        let attested = proof_for_request(&request, now);
        assert!(untrusted.validate_at(&attested, &request, now).is_ok());
        assert_eq!(
            trusted.validate_at(&attested, &request, now),
            Err(ValidationError::BadSignature)
        );
    }

    #[test_case(5 ; "fewer witnesses than required")]
    #[test_case(0 ; "no witness required")]
    fn test_underpopulated_beacon_rejects(required: u32) {
        let request = tokio_test::block_on(signed_request());
        let now = now_for(&request);
        let proof = proof_for_request(&request, now);

        let state = BeaconState {
            witnesses: proof.witnesses.clone(),
            epoch: proof.claim_data.epoch,
            witnesses_required_for_claim: required,
            next_epoch_timestamp_s: 0,
        };
        assert_eq!(
            state.select_witnesses(&proof.claim_data.identifier, proof.claim_data.timestamp_s),
            None
        );
        let validator = ProofValidator::new(BeaconVerifier::new([state]));
        assert_eq!(
            validator.validate_at(&proof, &request, now),
            Err(ValidationError::BadSignature)
        );
    }
}
