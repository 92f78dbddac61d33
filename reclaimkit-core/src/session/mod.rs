//! Verification session lifecycle.
//!
//! A session moves `Created -> Pending -> {Verified, Failed, Expired}`. The last three
//! states are terminal: once reached, the state never changes again. Reports about the
//! session arrive from two producers, the status poll and the callback channel, and both
//! go through the same transition function, [`Session::apply`].

use std::{fmt, time::SystemTime};

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::{
    error::{ReclaimError, ValidationError},
    proof::Proof,
};

mod tracker;

pub use tracker::{CallbackSink, SessionHandle, SessionOutcome, SessionTracker};

/// Id of a session registered with the verification network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// # Errors
    /// Returns `InvalidInput` if the id is empty.
    pub fn new(session_id: impl Into<String>) -> Result<Self, ReclaimError> {
        let session_id = session_id.into();
        if session_id.trim().is_empty() {
            return Err(ReclaimError::InvalidInput {
                attribute: "session_id".to_string(),
                reason: "session id is empty".to_string(),
            });
        }
        Ok(Self(session_id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    /// Exists locally, not registered with the network yet.
    Created,
    /// Registered; waiting for the network to report an outcome.
    Pending,
    /// A proof was received and accepted.
    Verified,
    /// The network reported a failure or the received proof was rejected.
    Failed,
    /// No outcome was reported within the tracking window.
    Expired,
}

impl SessionState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Verified | Self::Failed | Self::Expired)
    }
}

/// Why a session failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The network reported a failure, e.g. the user declined or the submission failed.
    Reported(String),
    /// A delivered proof was rejected by the proof validator.
    ProofRejected(ValidationError),
    /// The network reported success without delivering a proof.
    MissingProof,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reported(reason) => write!(f, "reported: {reason}"),
            Self::ProofRejected(e) => write!(f, "proof rejected: {e}"),
            Self::MissingProof => f.write_str("missing proof"),
        }
    }
}

/// A report about a session, from the status poll or the callback channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusReport {
    /// No outcome yet.
    Pending,
    /// The network delivered proofs. They still have to pass validation.
    Verified(Vec<Proof>),
    /// The network reported a failure.
    Failed(String),
    /// The network expired the session.
    Expired,
}

/// A terminal report after validation, ready to be applied to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Transition {
    Verified(Vec<Proof>),
    Failed(FailureReason),
    Expired,
}

impl Transition {
    const fn state(&self) -> SessionState {
        match self {
            Self::Verified(_) => SessionState::Verified,
            Self::Failed(_) => SessionState::Failed,
            Self::Expired => SessionState::Expired,
        }
    }
}

/// What applying a report did to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Applied {
    /// The session entered a terminal state.
    Transitioned,
    /// Nothing changed: the report was pending or repeated the terminal state.
    Unchanged,
    /// The report contradicts the terminal state; recorded as an anomaly.
    Conflict,
}

/// Snapshot of a session. Readers always see a whole snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: Option<SessionId>,
    pub state: SessionState,
    /// Set when the session failed.
    pub failure: Option<FailureReason>,
    /// Proofs that verified the session.
    pub proofs: Vec<Proof>,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    /// Reports that contradicted the terminal state, oldest first.
    pub anomalies: Vec<String>,
}

impl Session {
    pub(crate) fn new(session_id: Option<SessionId>) -> Self {
        let now = SystemTime::now();
        let state = if session_id.is_some() {
            SessionState::Pending
        } else {
            SessionState::Created
        };
        Self {
            session_id,
            state,
            failure: None,
            proofs: Vec::new(),
            created_at: now,
            updated_at: now,
            anomalies: Vec::new(),
        }
    }

    pub(crate) fn register(&mut self, session_id: SessionId) {
        self.session_id = Some(session_id);
        self.state = SessionState::Pending;
        self.updated_at = SystemTime::now();
    }

    /// Applies a terminal report. The first terminal report wins; a repeat of the same
    /// terminal state is ignored and a contradicting one is recorded as an anomaly.
    pub(crate) fn apply(&mut self, transition: Transition) -> Applied {
        let target = transition.state();
        if self.state.is_terminal() {
            if self.state == target {
                return Applied::Unchanged;
            }
            self.anomalies.push(format!(
                "{target} reported after the session was {}",
                self.state
            ));
            self.updated_at = SystemTime::now();
            return Applied::Conflict;
        }

        self.state = target;
        match transition {
            Transition::Verified(proofs) => self.proofs = proofs,
            Transition::Failed(reason) => self.failure = Some(reason),
            Transition::Expired => {}
        }
        self.updated_at = SystemTime::now();
        Applied::Transitioned
    }

    /// The outcome of a terminal session.
    pub(crate) fn outcome(&self) -> Option<SessionOutcome> {
        match self.state {
            SessionState::Verified => Some(SessionOutcome::Verified(self.proofs.clone())),
            SessionState::Failed => Some(SessionOutcome::Failed(
                self.failure.clone().unwrap_or(FailureReason::MissingProof),
            )),
            SessionState::Expired => Some(SessionOutcome::Expired),
            SessionState::Created | SessionState::Pending => None,
        }
    }
}
