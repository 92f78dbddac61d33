//! Application identity and request signing.

use std::{fmt, str::FromStr};

use alloy::signers::{local::PrivateKeySigner, SignerSync};
use alloy_primitives::{keccak256, Address, Signature};
use secrecy::{ExposeSecret, SecretString};

use crate::{error::ReclaimError, primitives::ParseFromInput};

/// The identity of an application registered with the Reclaim network.
///
/// The application id is the Ethereum address of the application's key pair and the
/// application secret is its private key. The secret is only used to build the
/// internal signer and is never exposed, serialized or printed afterwards.
///
/// Instances are immutable and cheap to share by reference; nothing in the SDK keeps
/// a process-wide copy.
#[derive(Clone)]
pub struct Credentials {
    app_id: Address,
    signer: PrivateKeySigner,
}

impl Credentials {
    /// Initializes the credentials from an application id and secret.
    ///
    /// # Errors
    /// Returns `InvalidCredentials` if either value is empty, if the id is not a
    /// well-formed address, if the secret is not a valid secp256k1 private key or if
    /// the secret does not belong to the application id.
    pub fn new(app_id: &str, app_secret: &SecretString) -> Result<Self, ReclaimError> {
        if app_id.trim().is_empty() {
            return Err(ReclaimError::InvalidCredentials(
                "application id is empty".to_string(),
            ));
        }
        let secret = app_secret.expose_secret().trim();
        if secret.is_empty() {
            return Err(ReclaimError::InvalidCredentials(
                "application secret is empty".to_string(),
            ));
        }

        let app_id = Address::parse_from_input(app_id, "application_id")
            .map_err(|e| ReclaimError::InvalidCredentials(e.to_string()))?;

        // never echo the secret in the error
        let signer = PrivateKeySigner::from_str(secret).map_err(|_| {
            ReclaimError::InvalidCredentials(
                "application secret is not a valid private key".to_string(),
            )
        })?;

        if signer.address() != app_id {
            return Err(ReclaimError::InvalidCredentials(format!(
                "application secret does not belong to application id {}",
                app_id.to_checksum(None)
            )));
        }

        log::debug!(
            "credentials initialized for application id {}",
            app_id.to_checksum(None)
        );

        Ok(Self { app_id, signer })
    }

    /// The application id.
    #[must_use]
    pub const fn app_id(&self) -> Address {
        self.app_id
    }

    /// Signs `payload`.
    ///
    /// The signature is an EIP-191 personal signature over `keccak256(payload)`. ECDSA
    /// nonces are derived deterministically (RFC 6979), so signing the same payload
    /// twice yields the same signature.
    ///
    /// # Errors
    /// Returns `Signing` if the underlying signer fails.
    pub fn sign(&self, payload: &[u8]) -> Result<Signature, ReclaimError> {
        let digest = keccak256(payload);
        self.signer
            .sign_message_sync(digest.as_slice())
            .map_err(|e| ReclaimError::Signing(e.to_string()))
    }

    /// Checks that `signature` was produced over `payload` by the key of `app_id`.
    ///
    /// Verification only needs the public application id, so requests imported in
    /// another process can be checked without the secret.
    #[must_use]
    pub fn verify(app_id: Address, payload: &[u8], signature: &Signature) -> bool {
        let digest = keccak256(payload);
        signature
            .recover_address_from_msg(digest.as_slice())
            .is_ok_and(|signer| signer == app_id)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("app_secret", &"<redacted>")
            .finish()
    }
}
