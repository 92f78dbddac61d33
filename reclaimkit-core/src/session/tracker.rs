use std::sync::Arc;

use tokio::{
    sync::{mpsc, watch},
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::PollingConfig,
    error::ReclaimError,
    network::{start_session, VerificationNetwork},
    proof::{parse_callback_body, Proof},
    request::SignedRequest,
    validator::{AttestationVerifier, ProofValidator, WitnessSet},
};

use super::{Applied, FailureReason, Session, SessionId, SessionState, StatusReport, Transition};

/// Final result of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The delivered proofs passed validation.
    Verified(Vec<Proof>),
    Failed(FailureReason),
    Expired,
}

/// Owns the lifecycle of one proof request.
///
/// The tracker is the only writer of its session state. Readers obtain a
/// [`SessionHandle`] through [`SessionTracker::subscribe`] and always observe whole
/// snapshots. Reports are produced by polling the network and by the callback channel
/// ([`SessionTracker::callback_sink`]); both are applied through one transition path,
/// where the first terminal report wins.
pub struct SessionTracker<N, V = WitnessSet> {
    request: SignedRequest,
    network: N,
    validator: Arc<ProofValidator<V>>,
    polling: PollingConfig,
    state: watch::Sender<Session>,
    callbacks_tx: mpsc::UnboundedSender<StatusReport>,
    callbacks_rx: mpsc::UnboundedReceiver<StatusReport>,
}

impl<N: VerificationNetwork, V: AttestationVerifier> SessionTracker<N, V> {
    /// Creates a tracker for `request`. The session starts in `Created` and is
    /// registered with the network on first use.
    pub fn new(
        request: SignedRequest,
        network: N,
        validator: Arc<ProofValidator<V>>,
        polling: PollingConfig,
    ) -> Self {
        Self::with_session(request, None, network, validator, polling)
    }

    /// Resumes tracking a request that was already registered, e.g. one imported from
    /// another process. The session starts in `Pending`.
    ///
    /// # Errors
    /// Returns `SessionNotStarted` if the request is not bound to a session.
    pub fn resume(
        request: SignedRequest,
        network: N,
        validator: Arc<ProofValidator<V>>,
        polling: PollingConfig,
    ) -> Result<Self, ReclaimError> {
        let session_id = request
            .session_id()
            .cloned()
            .ok_or(ReclaimError::SessionNotStarted)?;
        Ok(Self::with_session(
            request,
            Some(session_id),
            network,
            validator,
            polling,
        ))
    }

    fn with_session(
        request: SignedRequest,
        session_id: Option<SessionId>,
        network: N,
        validator: Arc<ProofValidator<V>>,
        polling: PollingConfig,
    ) -> Self {
        let (state, _) = watch::channel(Session::new(session_id));
        let (callbacks_tx, callbacks_rx) = mpsc::unbounded_channel();
        Self {
            request,
            network,
            validator,
            polling,
            state,
            callbacks_tx,
            callbacks_rx,
        }
    }

    /// The tracked request. Bound to its session once registered.
    #[must_use]
    pub const fn request(&self) -> &SignedRequest {
        &self.request
    }

    /// Current snapshot of the session.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().state
    }

    /// A read-only view on the session state.
    #[must_use]
    pub fn subscribe(&self) -> SessionHandle {
        SessionHandle {
            state: self.state.subscribe(),
        }
    }

    /// A sender for reports pushed by the application's callback endpoint.
    #[must_use]
    pub fn callback_sink(&self) -> CallbackSink {
        CallbackSink {
            tx: self.callbacks_tx.clone(),
        }
    }

    fn session_id(&self) -> Option<SessionId> {
        self.state.borrow().session_id.clone()
    }

    /// Registers the session with the network, once. Later calls return the id of the
    /// registered session.
    ///
    /// # Errors
    /// Returns a `NetworkError` if the network refuses or cannot be reached. The
    /// session stays `Created` in that case.
    pub async fn register(&mut self) -> Result<SessionId, ReclaimError> {
        if let Some(session_id) = self.session_id() {
            return Ok(session_id);
        }

        let session_id = start_session(&self.network, &self.request).await?;
        self.request = self.request.clone().with_session(session_id.clone());
        self.state
            .send_modify(|session| session.register(session_id.clone()));
        log::info!("session {session_id} is pending");
        Ok(session_id)
    }

    /// The URL end users open to fulfill the request. Registers the session first.
    ///
    /// # Errors
    /// See [`SessionTracker::register`].
    pub async fn request_url(&mut self) -> Result<String, ReclaimError> {
        self.register().await?;
        self.network.request_url(&self.request).await
    }

    /// The session's status endpoint. Registers the session first.
    ///
    /// # Errors
    /// See [`SessionTracker::register`].
    pub async fn status_url(&mut self) -> Result<String, ReclaimError> {
        let session_id = self.register().await?;
        Ok(self.network.status_url(&session_id))
    }

    /// Where the network delivers the proof: the request's callback URL, or the
    /// network's default callback for this session.
    ///
    /// # Errors
    /// Returns `SessionNotStarted` if the request sets no callback URL and the session
    /// is not registered yet.
    pub fn app_callback_url(&self) -> Result<String, ReclaimError> {
        if let Some(url) = &self.request.endpoints().app_callback_url {
            return Ok(url.clone());
        }
        self.session_id()
            .map(|session_id| self.network.callback_url(&session_id))
            .ok_or(ReclaimError::SessionNotStarted)
    }

    /// Applies any queued callback reports, then fetches the session status once.
    ///
    /// Returns the outcome once the session is terminal. A failed fetch leaves the
    /// state untouched; check [`ReclaimError::is_retryable`] to decide whether to
    /// poll again.
    ///
    /// # Errors
    /// - `SessionNotStarted` if the session is not registered.
    /// - `NetworkError` if the status could not be fetched.
    pub async fn poll_once(&mut self) -> Result<Option<SessionOutcome>, ReclaimError> {
        let session_id = self.session_id().ok_or(ReclaimError::SessionNotStarted)?;

        if let Some(outcome) = self.drain_callbacks() {
            return Ok(Some(outcome));
        }

        let report = self.network.fetch_status(&session_id).await?;
        Ok(self.apply(report))
    }

    /// Tracks the session until it is terminal, polling at the configured interval and
    /// applying callback reports as they arrive.
    ///
    /// Callback reports queued before the call are applied first. Without a terminal
    /// report within the configured window the session expires. Transient network
    /// failures are logged and polling continues; a status request in flight is
    /// abandoned when `cancel` fires.
    ///
    /// # Errors
    /// - `SessionNotStarted` if the session is not registered.
    /// - `Cancelled` if `cancel` fires first. The session keeps its last state.
    /// - Non-retryable `NetworkError`s from the status endpoint.
    pub async fn run(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<SessionOutcome, ReclaimError> {
        let session_id = self.session_id().ok_or(ReclaimError::SessionNotStarted)?;
        let current = self
            .drain_callbacks()
            .or_else(|| self.state.borrow().outcome());
        if let Some(outcome) = current {
            return Ok(outcome);
        }

        let mut ticker = tokio::time::interval(self.polling.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut polls = 0;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    log::debug!("stopped tracking session {session_id}");
                    return Err(ReclaimError::Cancelled);
                }
                Some(report) = self.callbacks_rx.recv() => {
                    if let Some(outcome) = self.apply(report) {
                        return Ok(outcome);
                    }
                }
                _ = ticker.tick() => {
                    if polls >= self.polling.max_polls {
                        log::info!("session {session_id} expired after {polls} polls");
                        return Ok(self
                            .transition(Transition::Expired)
                            .unwrap_or(SessionOutcome::Expired));
                    }
                    polls += 1;
                    let fetched = tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            log::debug!("stopped tracking session {session_id} during a poll");
                            return Err(ReclaimError::Cancelled);
                        }
                        fetched = self.network.fetch_status(&session_id) => fetched,
                    };
                    match fetched {
                        Ok(report) => {
                            if let Some(outcome) = self.apply(report) {
                                return Ok(outcome);
                            }
                        }
                        Err(e) if e.is_retryable() => {
                            log::warn!("polling session {session_id} failed, retrying: {e}");
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }
    }

    fn drain_callbacks(&mut self) -> Option<SessionOutcome> {
        let mut outcome = None;
        while let Ok(report) = self.callbacks_rx.try_recv() {
            outcome = self.apply(report).or(outcome);
        }
        outcome
    }

    /// Validates a report and applies it. Returns the outcome if the session is
    /// terminal afterwards.
    fn apply(&self, report: StatusReport) -> Option<SessionOutcome> {
        let transition = match report {
            StatusReport::Pending => return self.state.borrow().outcome(),
            StatusReport::Verified(proofs) if proofs.is_empty() => {
                Transition::Failed(FailureReason::MissingProof)
            }
            StatusReport::Verified(proofs) => {
                match self.validator.validate_all(&proofs, &self.request) {
                    Ok(_) => Transition::Verified(proofs),
                    Err(e) => Transition::Failed(FailureReason::ProofRejected(e)),
                }
            }
            StatusReport::Failed(reason) => {
                Transition::Failed(FailureReason::Reported(reason))
            }
            StatusReport::Expired => Transition::Expired,
        };
        self.transition(transition)
    }

    fn transition(&self, transition: Transition) -> Option<SessionOutcome> {
        let mut applied = Applied::Unchanged;
        self.state.send_if_modified(|session| {
            applied = session.apply(transition);
            applied != Applied::Unchanged
        });

        let session = self.snapshot();
        let session_id = session
            .session_id
            .as_ref()
            .map_or_else(|| "<unregistered>".to_string(), ToString::to_string);
        match applied {
            Applied::Transitioned => {
                log::info!("session {session_id} is {}", session.state);
            }
            Applied::Conflict => {
                log::warn!(
                    "conflicting report for session {session_id}: {}",
                    session.anomalies.last().map_or("", String::as_str)
                );
            }
            Applied::Unchanged => {}
        }
        session.outcome()
    }
}

/// Read-only, cloneable view on a session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    state: watch::Receiver<Session>,
}

impl SessionHandle {
    /// Current snapshot of the session.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().state
    }

    /// Waits until the session is terminal.
    ///
    /// # Errors
    /// Returns `SessionClosed` if the tracker is dropped before the session ends.
    pub async fn wait_for_terminal(&mut self) -> Result<SessionOutcome, ReclaimError> {
        let session = self
            .state
            .wait_for(|session| session.state.is_terminal())
            .await
            .map_err(|_| ReclaimError::SessionClosed)?;
        session.outcome().ok_or(ReclaimError::SessionClosed)
    }
}

/// Feeds reports received by the application's callback endpoint into a tracker.
#[derive(Debug, Clone)]
pub struct CallbackSink {
    tx: mpsc::UnboundedSender<StatusReport>,
}

impl CallbackSink {
    /// Delivers proofs received by the callback endpoint.
    ///
    /// # Errors
    /// Returns `SessionClosed` if the tracker was dropped.
    pub fn deliver(&self, proofs: Vec<Proof>) -> Result<(), ReclaimError> {
        self.send(StatusReport::Verified(proofs))
    }

    /// Decodes a raw callback body and delivers its proofs.
    ///
    /// # Errors
    /// Returns `SerializationError` if the body holds no proofs, or `SessionClosed` if
    /// the tracker was dropped.
    pub fn deliver_body(&self, body: &str) -> Result<(), ReclaimError> {
        self.deliver(parse_callback_body(body)?)
    }

    /// Reports a failure received by the callback endpoint.
    ///
    /// # Errors
    /// Returns `SessionClosed` if the tracker was dropped.
    pub fn report_failure(&self, reason: impl Into<String>) -> Result<(), ReclaimError> {
        self.send(StatusReport::Failed(reason.into()))
    }

    fn send(&self, report: StatusReport) -> Result<(), ReclaimError> {
        self.tx.send(report).map_err(|_| ReclaimError::SessionClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ValidationError,
        network::SessionStatus,
        tests_utils::{proof_for, proof_for_request, signed_request, witness_address},
        utils::now_secs,
    };
    use std::{
        collections::VecDeque,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    };

    /// Replays scripted status reports; once exhausted, reports pending.
    #[derive(Default)]
    struct ScriptedNetwork {
        reports: Mutex<VecDeque<Result<StatusReport, ReclaimError>>>,
        inits: AtomicUsize,
        started: AtomicUsize,
        fetches: AtomicUsize,
        fetch_delay: Option<std::time::Duration>,
    }

    impl ScriptedNetwork {
        fn with_reports(
            reports: impl IntoIterator<Item = Result<StatusReport, ReclaimError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                reports: Mutex::new(reports.into_iter().collect()),
                ..Self::default()
            })
        }
    }

    impl VerificationNetwork for ScriptedNetwork {
        async fn init_session(
            &self,
            _request: &SignedRequest,
        ) -> Result<SessionId, ReclaimError> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            SessionId::new("s-1")
        }

        async fn update_session(
            &self,
            _session_id: &SessionId,
            status: SessionStatus,
        ) -> Result<(), ReclaimError> {
            if status == SessionStatus::SessionStarted {
                self.started.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }

        async fn fetch_status(
            &self,
            _session_id: &SessionId,
        ) -> Result<StatusReport, ReclaimError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.fetch_delay {
                tokio::time::sleep(delay).await;
            }
            self.reports
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(StatusReport::Pending))
        }

        async fn request_url(&self, request: &SignedRequest) -> Result<String, ReclaimError> {
            request.to_request_url()
        }

        fn status_url(&self, session_id: &SessionId) -> String {
            format!("https://backend.test/session/{session_id}")
        }

        fn callback_url(&self, session_id: &SessionId) -> String {
            format!("https://backend.test/callback?callbackId={session_id}")
        }
    }

    fn validator() -> Arc<ProofValidator> {
        Arc::new(ProofValidator::new(WitnessSet::new(vec![witness_address()])))
    }

    fn fast_polling(max_polls: u32) -> PollingConfig {
        PollingConfig {
            interval_ms: 1,
            max_polls,
        }
    }

    async fn tracker(
        network: Arc<ScriptedNetwork>,
        max_polls: u32,
    ) -> SessionTracker<Arc<ScriptedNetwork>> {
        SessionTracker::new(
            signed_request().await,
            network,
            validator(),
            fast_polling(max_polls),
        )
    }

    #[tokio::test]
    async fn test_registration_happens_once() {
        let network = ScriptedNetwork::with_reports([]);
        let mut tracker = tracker(network.clone(), 1).await;
        assert_eq!(tracker.state(), SessionState::Created);
        assert!(matches!(
            tracker.poll_once().await,
            Err(ReclaimError::SessionNotStarted)
        ));
        assert!(matches!(
            tracker.app_callback_url(),
            Err(ReclaimError::SessionNotStarted)
        ));

        let url = tracker.request_url().await.unwrap();
        assert_eq!(tracker.state(), SessionState::Pending);
        assert_eq!(tracker.request().session_id().unwrap().as_str(), "s-1");
        assert_eq!(url, tracker.request().to_request_url().unwrap());

        assert_eq!(
            tracker.status_url().await.unwrap(),
            "https://backend.test/session/s-1"
        );
        assert_eq!(
            tracker.app_callback_url().unwrap(),
            "https://backend.test/callback?callbackId=s-1"
        );
        assert_eq!(network.inits.load(Ordering::SeqCst), 1);
        assert_eq!(network.started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_window_expires() {
        let network = ScriptedNetwork::with_reports([]);
        let mut tracker = tracker(network.clone(), 3).await;
        tracker.register().await.unwrap();

        let outcome = tracker.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, SessionOutcome::Expired);
        assert_eq!(tracker.state(), SessionState::Expired);
        assert_eq!(network.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_network_errors_are_retried() {
        let request = signed_request().await;
        let proof = proof_for_request(&request, now_secs());
        let network = ScriptedNetwork::with_reports([
            Err(ReclaimError::NetworkError {
                url: "https://backend.test".to_string(),
                status: Some(503),
                error: "unavailable".to_string(),
                retryable: true,
            }),
            Ok(StatusReport::Pending),
            Ok(StatusReport::Verified(vec![proof.clone()])),
        ]);
        let mut tracker =
            SessionTracker::new(request, network, validator(), fast_polling(10));
        tracker.register().await.unwrap();

        let outcome = tracker.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, SessionOutcome::Verified(vec![proof]));
    }

    #[tokio::test]
    async fn test_failed_poll_keeps_state() {
        let network = ScriptedNetwork::with_reports([Err(ReclaimError::NetworkError {
            url: "https://backend.test".to_string(),
            status: None,
            error: "timeout".to_string(),
            retryable: true,
        })]);
        let mut tracker = tracker(network, 10).await;
        tracker.register().await.unwrap();

        let err = tracker.poll_once().await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(tracker.state(), SessionState::Pending);
    }

    #[tokio::test]
    async fn test_permanent_network_error_stops_tracking() {
        let network = ScriptedNetwork::with_reports([Err(ReclaimError::NetworkError {
            url: "https://backend.test".to_string(),
            status: Some(404),
            error: "not found".to_string(),
            retryable: false,
        })]);
        let mut tracker = tracker(network, 10).await;
        tracker.register().await.unwrap();

        let err = tracker.run(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ReclaimError::NetworkError { status: Some(404), .. }));
        assert_eq!(tracker.state(), SessionState::Pending);
    }

    #[tokio::test]
    async fn test_rejected_proof_fails_session() {
        let request = signed_request().await;
        let proof = proof_for("P2", &request.context_echo().unwrap(), now_secs());
        let network =
            ScriptedNetwork::with_reports([Ok(StatusReport::Verified(vec![proof]))]);
        let mut tracker =
            SessionTracker::new(request, network, validator(), fast_polling(10));
        tracker.register().await.unwrap();

        let outcome = tracker.poll_once().await.unwrap();
        assert_eq!(
            outcome,
            Some(SessionOutcome::Failed(FailureReason::ProofRejected(
                ValidationError::ProviderMismatch
            )))
        );
    }

    #[tokio::test]
    async fn test_verified_without_proofs_fails() {
        let network = ScriptedNetwork::with_reports([Ok(StatusReport::Verified(vec![]))]);
        let mut tracker = tracker(network, 10).await;
        tracker.register().await.unwrap();

        assert_eq!(
            tracker.poll_once().await.unwrap(),
            Some(SessionOutcome::Failed(FailureReason::MissingProof))
        );
    }

    #[tokio::test]
    async fn test_callback_wins_and_conflicting_poll_is_flagged() {
        let request = signed_request().await;
        let proof = proof_for_request(&request, now_secs());
        let network = ScriptedNetwork::with_reports([Ok(StatusReport::Failed(
            "PROOF_SUBMISSION_FAILED".to_string(),
        ))]);
        let mut tracker =
            SessionTracker::new(request, network, validator(), fast_polling(10));
        tracker.register().await.unwrap();

        let sink = tracker.callback_sink();
        sink.deliver_body(&proof.to_json().unwrap()).unwrap();
        let outcome = tracker.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, SessionOutcome::Verified(vec![proof.clone()]));

        // the scripted failure contradicts the verified session
        assert_eq!(
            tracker.poll_once().await.unwrap(),
            Some(SessionOutcome::Verified(vec![proof.clone()]))
        );
        // a repeated delivery is consistent and ignored
        sink.deliver(vec![proof.clone()]).unwrap();
        assert_eq!(
            tracker.poll_once().await.unwrap(),
            Some(SessionOutcome::Verified(vec![proof]))
        );

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.state, SessionState::Verified);
        assert_eq!(snapshot.anomalies.len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_run_keeps_state() {
        let network = ScriptedNetwork::with_reports([]);
        let mut tracker = tracker(network, 1_000).await;
        tracker.register().await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = tracker.run(&cancel).await.unwrap_err();
        assert!(matches!(err, ReclaimError::Cancelled));
        assert_eq!(tracker.state(), SessionState::Pending);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_status_request() {
        let network = Arc::new(ScriptedNetwork {
            fetch_delay: Some(std::time::Duration::from_secs(30)),
            ..ScriptedNetwork::default()
        });
        let mut tracker = tracker(network.clone(), 10).await;
        tracker.register().await.unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = tracker.run(&cancel).await.unwrap_err();
        assert!(matches!(err, ReclaimError::Cancelled));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        assert_eq!(network.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.state(), SessionState::Pending);
    }

    #[tokio::test]
    async fn test_permanent_status_error_is_not_retried() {
        let network = ScriptedNetwork::with_reports([Err(ReclaimError::NetworkError {
            url: "https://backend.test".to_string(),
            status: None,
            error: "status response carries no session".to_string(),
            retryable: false,
        })]);
        let mut tracker = tracker(network.clone(), 10).await;
        tracker.register().await.unwrap();

        let err = tracker.run(&CancellationToken::new()).await.unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(network.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.state(), SessionState::Pending);
    }

    #[tokio::test]
    async fn test_terminal_state_survives_later_run() {
        let request = signed_request().await;
        let proof = proof_for_request(&request, now_secs());
        let network =
            ScriptedNetwork::with_reports([Ok(StatusReport::Verified(vec![proof.clone()]))]);
        let mut tracker =
            SessionTracker::new(request, network.clone(), validator(), fast_polling(10));
        tracker.register().await.unwrap();
        let cancel = CancellationToken::new();
        assert_eq!(
            tracker.run(&cancel).await.unwrap(),
            SessionOutcome::Verified(vec![proof.clone()])
        );

        tracker
            .callback_sink()
            .report_failure("PROOF_SUBMISSION_FAILED")
            .unwrap();
        assert_eq!(
            tracker.run(&cancel).await.unwrap(),
            SessionOutcome::Verified(vec![proof])
        );

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.state, SessionState::Verified);
        assert_eq!(snapshot.anomalies.len(), 1);
        assert_eq!(network.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handles_observe_terminal_state() {
        let request = signed_request().await;
        let proof = proof_for_request(&request, now_secs());
        let network =
            ScriptedNetwork::with_reports([Ok(StatusReport::Verified(vec![proof.clone()]))]);
        let mut tracker =
            SessionTracker::new(request, network, validator(), fast_polling(10));
        tracker.register().await.unwrap();

        let mut handle = tracker.subscribe();
        let waiter = tokio::spawn(async move { handle.wait_for_terminal().await });

        tracker.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(
            waiter.await.unwrap().unwrap(),
            SessionOutcome::Verified(vec![proof])
        );

        let late = tracker.subscribe();
        drop(tracker);
        assert_eq!(late.state(), SessionState::Verified);
    }

    #[tokio::test]
    async fn test_handle_reports_dropped_tracker() {
        let network = ScriptedNetwork::with_reports([]);
        let tracker = tracker(network, 10).await;
        let mut handle = tracker.subscribe();
        drop(tracker);

        assert!(matches!(
            handle.wait_for_terminal().await,
            Err(ReclaimError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn test_resume_requires_session() {
        let request = signed_request().await;
        let network = ScriptedNetwork::with_reports([]);
        assert!(matches!(
            SessionTracker::resume(request.clone(), network.clone(), validator(), fast_polling(1)),
            Err(ReclaimError::SessionNotStarted)
        ));

        let bound = request.with_session(SessionId::new("s-9").unwrap());
        let mut tracker =
            SessionTracker::resume(bound, network.clone(), validator(), fast_polling(1))
                .unwrap();
        assert_eq!(tracker.state(), SessionState::Pending);
        assert_eq!(tracker.register().await.unwrap().as_str(), "s-9");
        assert_eq!(network.inits.load(Ordering::SeqCst), 0);
    }
}
