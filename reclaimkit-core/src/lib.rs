#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
//! Client core for the Reclaim Protocol.
//!
//! An application holding credentials (an application id and secret issued by the
//! network) builds a [`RequestDraft`] naming a provider, finalizes it into a
//! [`SignedRequest`], registers it with a [`VerificationNetwork`] through a
//! [`SessionTracker`] and waits for the end user's proof. Returned proofs are checked
//! by a [`ProofValidator`] before the session is marked verified.
//!
//! ```rust,no_run
//! use reclaimkit_core::{
//!     config::NetworkConfig, network::ReclaimBackend, Credentials, ProofValidator,
//!     RequestDraft, SessionTracker, WitnessSet,
//! };
//! use secrecy::SecretString;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run(app_id: &str, app_secret: SecretString) -> Result<(), reclaimkit_core::ReclaimError> {
//! let credentials = Credentials::new(app_id, &app_secret)?;
//! let backend = ReclaimBackend::new(NetworkConfig::default())?;
//!
//! let mut draft = RequestDraft::create(&credentials, "provider-id", &backend).await?;
//! draft.add_context("0xabc", "login")?;
//! let request = draft.finalize(&credentials)?;
//!
//! let validator = Arc::new(ProofValidator::new(WitnessSet::new(vec![])));
//! let mut tracker = SessionTracker::new(request, backend, validator, Default::default());
//! println!("{}", tracker.request_url().await?);
//! let _outcome = tracker.run(&CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

mod error;
pub use error::*;

mod credentials;
pub use credentials::Credentials;

pub mod config;
pub mod defaults;
pub mod logger;
pub mod network;
pub mod primitives;
pub mod proof;
pub mod provider;
pub mod request;
pub mod serializer;
pub mod session;
pub mod validator;

pub use network::VerificationNetwork;
pub use proof::Proof;
pub use request::{RequestDraft, SignedRequest};
pub use session::{SessionOutcome, SessionState, SessionTracker};
pub use validator::{ProofValidator, WitnessSet};

// private modules
mod http_request;
mod utils;

#[cfg(test)]
mod tests_utils;
