//! End-to-end transformation: input → request → model → contract → slot state.
//!
//! A [`Slot`] is the single channel per feature through which at most one
//! in-flight call's result is honoured. [`TransformationPipeline::invoke`]
//! always yields exactly one [`PipelineOutcome`] and reports whether it was
//! applied to the slot or discarded as stale.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use clearmind_shared::{ClearMindError, ErrorKind, ModelConfig, TaskKind, TaskResult};

use crate::contract::ResponseContract;
use crate::credential::CredentialStore;
use crate::request::{RequestBuilder, TaskInput, TaskRequest};
use crate::session::{
    SessionObserver, SessionState, SessionStateMachine, SilentObserver, Ticket, Transition,
};
use crate::transport::{GeminiTransport, ModelTransport};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// A classified failure as stored in `Failed` states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineFailure {
    pub kind: ErrorKind,
    /// Diagnostic message. Never contains the credential or model output.
    pub message: String,
    /// Offending model text for malformed responses. Debug builds only.
    pub raw: Option<String>,
}

impl PipelineFailure {
    pub fn from_error(err: &ClearMindError) -> Self {
        let raw = if cfg!(debug_assertions) {
            err.raw_response().map(str::to_owned)
        } else {
            None
        };
        Self {
            kind: err.kind(),
            message: err.to_string(),
            raw,
        }
    }

    /// Short text for the end user.
    pub fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }
}

/// Terminal result of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Success(TaskResult),
    Failure(PipelineFailure),
}

impl PipelineOutcome {
    fn from_result(result: clearmind_shared::Result<TaskResult>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(err) => Self::Failure(PipelineFailure::from_error(&err)),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// What `invoke` hands back to the caller.
#[derive(Debug, Clone)]
pub struct InvokeReport {
    /// Sequence number this invocation held on its slot.
    pub seq: u64,
    pub outcome: PipelineOutcome,
    /// `false` when a newer invocation superseded this one.
    pub applied: bool,
}

// ---------------------------------------------------------------------------
// Slot
// ---------------------------------------------------------------------------

/// One feature's session state plus its observer.
pub struct Slot {
    name: String,
    machine: Mutex<SessionStateMachine>,
    observer: Arc<dyn SessionObserver>,
}

impl Slot {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_observer(name, Arc::new(SilentObserver))
    }

    pub fn with_observer(name: impl Into<String>, observer: Arc<dyn SessionObserver>) -> Self {
        Self {
            name: name.into(),
            machine: Mutex::new(SessionStateMachine::new()),
            observer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.lock().state().clone()
    }

    /// User-initiated clear. Returns `false` if nothing changed.
    pub fn reset(&self) -> bool {
        let mut machine = self.lock();
        let transition = machine.reset();
        self.notify(&machine, transition)
    }

    /// Toggle a step of a succeeded action plan.
    pub fn toggle_step(&self, step_id: u32) -> bool {
        let mut machine = self.lock();
        let transition = machine.toggle_step(step_id);
        self.notify(&machine, transition)
    }

    fn begin(&self) -> Ticket {
        let mut machine = self.lock();
        let (ticket, transition) = machine.begin();
        self.notify(&machine, Some(transition));
        ticket
    }

    fn settle(&self, ticket: Ticket, outcome: PipelineOutcome) -> bool {
        let mut machine = self.lock();
        let transition = machine.settle(ticket, outcome);
        self.notify(&machine, transition)
    }

    fn reject(&self, failure: PipelineFailure) -> Ticket {
        let mut machine = self.lock();
        let (ticket, transition) = machine.reject(failure);
        self.notify(&machine, Some(transition));
        ticket
    }

    // Observers run under the lock so transitions are seen in the order applied.
    fn notify(&self, machine: &SessionStateMachine, transition: Option<Transition>) -> bool {
        match transition {
            Some(transition) => {
                debug!(
                    slot = %self.name,
                    seq = transition.seq,
                    from = %transition.from,
                    to = %transition.to,
                    "slot transition"
                );
                self.observer
                    .on_transition(&self.name, &transition, machine.state());
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionStateMachine> {
        self.machine.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot")
            .field("name", &self.name)
            .field("state", &self.state().phase())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// TransformationPipeline
// ---------------------------------------------------------------------------

/// Orchestrates build → send → parse and feeds the result into a slot.
pub struct TransformationPipeline {
    builder: RequestBuilder,
    credentials: Arc<CredentialStore>,
    transport: Arc<dyn ModelTransport>,
    timeout: Duration,
}

impl TransformationPipeline {
    pub fn new(
        builder: RequestBuilder,
        credentials: Arc<CredentialStore>,
        transport: Arc<dyn ModelTransport>,
        timeout: Duration,
    ) -> Self {
        Self {
            builder,
            credentials,
            transport,
            timeout,
        }
    }

    /// Production pipeline talking to the configured Gemini endpoint.
    pub fn from_config(
        config: &ModelConfig,
        credentials: Arc<CredentialStore>,
    ) -> clearmind_shared::Result<Self> {
        let builder = RequestBuilder::new(config)?;
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let transport = GeminiTransport::new(timeout)?;
        Ok(Self::new(builder, credentials, Arc::new(transport), timeout))
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one invocation on `slot`.
    ///
    /// A request that cannot be built moves the slot straight to `Failed`
    /// without touching the network. Otherwise the slot enters `Loading`,
    /// superseding any earlier call, and the outcome is applied only if no
    /// newer invocation was issued meanwhile. No retry.
    #[instrument(skip_all, fields(slot = %slot.name(), kind = %kind))]
    pub async fn invoke(&self, slot: &Slot, kind: TaskKind, input: TaskInput) -> InvokeReport {
        let credential = self.credentials.get();
        let request = match self.builder.build(kind, &input, credential.as_ref()) {
            Ok(request) => request,
            Err(err) => {
                let failure = PipelineFailure::from_error(&err);
                info!(error_kind = %failure.kind, "request rejected before dispatch");
                let ticket = slot.reject(failure.clone());
                return InvokeReport {
                    seq: ticket.seq(),
                    outcome: PipelineOutcome::Failure(failure),
                    applied: true,
                };
            }
        };

        let ticket = slot.begin();
        let outcome = self.dispatch(&request).await;
        let applied = slot.settle(ticket, outcome.clone());
        if !applied {
            debug!(seq = ticket.seq(), "stale outcome discarded");
        }

        InvokeReport {
            seq: ticket.seq(),
            outcome,
            applied,
        }
    }

    /// Send a built request and classify the result. Never touches a slot.
    async fn dispatch(&self, request: &TaskRequest) -> PipelineOutcome {
        let start = Instant::now();
        let fingerprint = request.fingerprint();
        debug!(
            fingerprint = %fingerprint,
            payload_chars = request.payload.chars().count(),
            "dispatching"
        );

        let text = match tokio::time::timeout(self.timeout, self.transport.send(request)).await {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => return self.fail(err, start),
            Err(_) => {
                let err = ClearMindError::Transport(format!(
                    "no response within {}s",
                    self.timeout.as_secs()
                ));
                return self.fail(err, start);
            }
        };

        let parsed = ResponseContract::for_kind(request.kind).parse(text.as_deref());
        let outcome = PipelineOutcome::from_result(parsed);
        match &outcome {
            PipelineOutcome::Success(result) => info!(
                result = result.variant_name(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "transformation succeeded"
            ),
            PipelineOutcome::Failure(failure) => warn!(
                error_kind = %failure.kind,
                error = %failure.message,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "model response rejected"
            ),
        }
        outcome
    }

    fn fail(&self, err: ClearMindError, start: Instant) -> PipelineOutcome {
        warn!(
            error = %err,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "model call failed"
        );
        PipelineOutcome::Failure(PipelineFailure::from_error(&err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Phase, TransitionCause};
    use crate::test_support::{
        GatedTransport, RecordingObserver, ScriptedTransport, configured_credentials,
        pipeline_with, unconfigured_credentials,
    };

    const SEGMENT_INPUT: &str = "Dogs are loyal. Cats are independent.";

    #[tokio::test]
    async fn segment_scenario_succeeds() {
        let transport = ScriptedTransport::new().reply(r#"["Dogs are loyal.", "Cats are independent."]"#);
        let pipeline = pipeline_with(transport.clone(), configured_credentials().await);
        let slot = Slot::new("focus");

        let report = pipeline
            .invoke(&slot, TaskKind::Segment, TaskInput::new(SEGMENT_INPUT))
            .await;

        assert!(report.applied);
        let SessionState::Succeeded(TaskResult::SentenceList(sentences)) = slot.state() else {
            panic!("expected sentence list, got {:?}", slot.state());
        };
        assert_eq!(sentences.len(), 2);
        assert!(sentences.iter().all(|s| !s.trim().is_empty()));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn prose_wrapped_response_is_malformed() {
        let transport = ScriptedTransport::new().reply(r#"Sure! Here's the list: ["a"]"#);
        let pipeline = pipeline_with(transport, configured_credentials().await);
        let slot = Slot::new("focus");

        pipeline
            .invoke(&slot, TaskKind::Segment, TaskInput::new(SEGMENT_INPUT))
            .await;

        let failure = slot.state().failure().cloned().unwrap();
        assert_eq!(failure.kind, ErrorKind::MalformedResponse);
        assert!(!failure.message.contains("Sure!"));
        if cfg!(debug_assertions) {
            assert_eq!(failure.raw.as_deref(), Some(r#"Sure! Here's the list: ["a"]"#));
        }
    }

    #[tokio::test]
    async fn mistyped_plan_keeps_model_text_out_of_message() {
        let reply = r#"{"goal": "g", "steps": "I cannot help with that, here is prose"}"#;
        let transport = ScriptedTransport::new().reply(reply);
        let pipeline = pipeline_with(transport, configured_credentials().await);
        let slot = Slot::new("planner");

        pipeline
            .invoke(&slot, TaskKind::Decompose, TaskInput::new("Clean the kitchen."))
            .await;

        let failure = slot.state().failure().cloned().unwrap();
        assert_eq!(failure.kind, ErrorKind::MalformedResponse);
        assert!(!failure.message.contains("I cannot help"), "{}", failure.message);
        if cfg!(debug_assertions) {
            assert_eq!(failure.raw.as_deref(), Some(reply));
        }
    }

    #[tokio::test]
    async fn empty_structures_fail_closed_for_every_kind() {
        for kind in TaskKind::ALL {
            for text in ["[]", "{}"] {
                let transport = ScriptedTransport::new().reply(text);
                let pipeline = pipeline_with(transport, configured_credentials().await);
                let slot = Slot::new("any");
                let input = TaskInput::new("Some text.").with_context("A document.");

                pipeline.invoke(&slot, kind, input).await;

                assert_eq!(
                    slot.state().failure().map(|f| f.kind),
                    Some(ErrorKind::MalformedResponse),
                    "{kind} with {text}"
                );
            }
        }
    }

    #[tokio::test]
    async fn empty_input_never_reaches_transport() {
        let transport = ScriptedTransport::new();
        let pipeline = pipeline_with(transport.clone(), configured_credentials().await);
        let slot = Slot::new("simplifier");

        for text in ["", "   "] {
            let report = pipeline
                .invoke(&slot, TaskKind::Simplify, TaskInput::new(text))
                .await;
            assert!(report.applied);
            assert_eq!(slot.state().failure().map(|f| f.kind), Some(ErrorKind::EmptyInput));
        }
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn missing_credential_fails_before_dispatch() {
        let transport = ScriptedTransport::new();
        let pipeline = pipeline_with(transport.clone(), unconfigured_credentials().await);
        let slot = Slot::new("tasks");

        let report = pipeline
            .invoke(&slot, TaskKind::Decompose, TaskInput::new("Write my essay"))
            .await;

        let PipelineOutcome::Failure(failure) = report.outcome else {
            panic!("expected failure");
        };
        assert_eq!(failure.kind, ErrorKind::MissingCredential);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn missing_candidate_text_is_empty_model_response() {
        let transport = ScriptedTransport::new().reply_none().reply("  \n ");
        let pipeline = pipeline_with(transport, configured_credentials().await);
        let slot = Slot::new("memory");

        for _ in 0..2 {
            pipeline
                .invoke(&slot, TaskKind::Extract, TaskInput::new("Notes."))
                .await;
            assert_eq!(
                slot.state().failure().map(|f| f.kind),
                Some(ErrorKind::EmptyModelResponse)
            );
        }
    }

    #[tokio::test]
    async fn transport_error_is_classified() {
        let transport = ScriptedTransport::new()
            .fail(ClearMindError::Transport("HTTP 401 Unauthorized: bad key".into()));
        let pipeline = pipeline_with(transport, configured_credentials().await);
        let slot = Slot::new("simplifier");

        pipeline
            .invoke(&slot, TaskKind::Simplify, TaskInput::new("Dense prose."))
            .await;

        assert_eq!(
            slot.state().failure().map(|f| f.kind),
            Some(ErrorKind::TransportError)
        );
    }

    #[tokio::test]
    async fn every_invocation_yields_one_outcome_and_no_retry() {
        let transport = ScriptedTransport::new()
            .reply(r#"["One."]"#)
            .fail(ClearMindError::Transport("connection reset".into()))
            .reply("not json");
        let pipeline = pipeline_with(transport.clone(), configured_credentials().await);
        let observer = Arc::new(RecordingObserver::default());
        let slot = Slot::with_observer("focus", observer.clone());

        for _ in 0..3 {
            let report = pipeline
                .invoke(&slot, TaskKind::Segment, TaskInput::new("One."))
                .await;
            assert!(report.applied);
        }

        assert_eq!(transport.calls(), 3);
        let outcomes: Vec<Phase> = observer
            .transitions()
            .into_iter()
            .filter(|t| t.cause == TransitionCause::Outcome)
            .map(|t| t.to)
            .collect();
        assert_eq!(outcomes, vec![Phase::Succeeded, Phase::Failed, Phase::Failed]);
    }

    #[tokio::test]
    async fn newer_invocation_supersedes_older_one() {
        let (transport, mut gates) = GatedTransport::new();
        let pipeline = Arc::new(pipeline_with(transport, configured_credentials().await));
        let slot = Arc::new(Slot::new("focus"));

        let first = tokio::spawn({
            let (pipeline, slot) = (pipeline.clone(), slot.clone());
            async move {
                pipeline
                    .invoke(&slot, TaskKind::Segment, TaskInput::new("A."))
                    .await
            }
        });
        let gate_a = gates.recv().await.unwrap();

        let second = tokio::spawn({
            let (pipeline, slot) = (pipeline.clone(), slot.clone());
            async move {
                pipeline
                    .invoke(&slot, TaskKind::Segment, TaskInput::new("B."))
                    .await
            }
        });
        let gate_b = gates.recv().await.unwrap();
        assert!(gate_b.payload.contains("B."));

        gate_b.respond(Ok(Some(r#"["B."]"#.into())));
        let report_b = second.await.unwrap();
        assert!(report_b.applied);

        gate_a.respond(Ok(Some(r#"["A."]"#.into())));
        let report_a = first.await.unwrap();
        assert!(!report_a.applied);
        assert!(report_a.outcome.is_success());
        assert!(report_a.seq < report_b.seq);

        assert_eq!(
            slot.state(),
            SessionState::Succeeded(TaskResult::SentenceList(vec!["B.".into()]))
        );
    }

    #[tokio::test]
    async fn stale_failure_cannot_overwrite_newer_success() {
        let (transport, mut gates) = GatedTransport::new();
        let pipeline = Arc::new(pipeline_with(transport, configured_credentials().await));
        let slot = Arc::new(Slot::new("focus"));

        let first = tokio::spawn({
            let (pipeline, slot) = (pipeline.clone(), slot.clone());
            async move { pipeline.invoke(&slot, TaskKind::Segment, TaskInput::new("A.")).await }
        });
        let gate_a = gates.recv().await.unwrap();

        let second = tokio::spawn({
            let (pipeline, slot) = (pipeline.clone(), slot.clone());
            async move { pipeline.invoke(&slot, TaskKind::Segment, TaskInput::new("B.")).await }
        });
        let gate_b = gates.recv().await.unwrap();

        // A resolves first but is already stale.
        gate_a.respond(Err(ClearMindError::Transport("reset".into())));
        assert!(!first.await.unwrap().applied);
        assert!(slot.state().is_loading());

        gate_b.respond(Ok(Some(r#"["B."]"#.into())));
        assert!(second.await.unwrap().applied);
        assert!(slot.state().result().is_some());
    }

    #[tokio::test]
    async fn rejected_invocation_supersedes_in_flight_call() {
        let (transport, mut gates) = GatedTransport::new();
        let pipeline = Arc::new(pipeline_with(transport, configured_credentials().await));
        let slot = Arc::new(Slot::new("simplifier"));

        let first = tokio::spawn({
            let (pipeline, slot) = (pipeline.clone(), slot.clone());
            async move { pipeline.invoke(&slot, TaskKind::Segment, TaskInput::new("A.")).await }
        });
        let gate_a = gates.recv().await.unwrap();

        pipeline
            .invoke(&slot, TaskKind::Segment, TaskInput::new("  "))
            .await;
        gate_a.respond(Ok(Some(r#"["A."]"#.into())));

        assert!(!first.await.unwrap().applied);
        assert_eq!(slot.state().failure().map(|f| f.kind), Some(ErrorKind::EmptyInput));
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_call_times_out_as_transport_error() {
        let (transport, mut gates) = GatedTransport::new();
        let pipeline = pipeline_with(transport, configured_credentials().await);
        let slot = Slot::new("focus");

        let (report, _gate) = tokio::join!(
            pipeline.invoke(&slot, TaskKind::Segment, TaskInput::new("Never answered.")),
            gates.recv()
        );

        assert!(report.applied);
        let failure = slot.state().failure().cloned().unwrap();
        assert_eq!(failure.kind, ErrorKind::TransportError);
        assert!(failure.message.contains("30s"));
    }

    #[tokio::test]
    async fn slots_are_isolated() {
        let transport = ScriptedTransport::new()
            .reply(r#"["Fine."]"#)
            .fail(ClearMindError::Transport("boom".into()));
        let pipeline = pipeline_with(transport, configured_credentials().await);
        let focus = Slot::new("focus");
        let memory = Slot::new("memory");

        pipeline
            .invoke(&focus, TaskKind::Segment, TaskInput::new("Fine."))
            .await;
        pipeline
            .invoke(&memory, TaskKind::Extract, TaskInput::new("Notes."))
            .await;

        assert!(focus.state().result().is_some());
        assert_eq!(memory.state().failure().map(|f| f.kind), Some(ErrorKind::TransportError));

        assert!(memory.reset());
        assert_eq!(memory.state(), SessionState::Idle);
        assert!(focus.state().result().is_some());
    }

    #[tokio::test]
    async fn observer_sees_transitions_in_order() {
        let transport = ScriptedTransport::new().reply(r#"["One."]"#);
        let pipeline = pipeline_with(transport, configured_credentials().await);
        let observer = Arc::new(RecordingObserver::default());
        let slot = Slot::with_observer("focus", observer.clone());

        pipeline
            .invoke(&slot, TaskKind::Segment, TaskInput::new("One."))
            .await;
        slot.reset();

        let phases: Vec<(Phase, Phase)> = observer
            .transitions()
            .iter()
            .map(|t| (t.from, t.to))
            .collect();
        assert_eq!(
            phases,
            vec![
                (Phase::Idle, Phase::Loading),
                (Phase::Loading, Phase::Succeeded),
                (Phase::Succeeded, Phase::Idle),
            ]
        );
    }
}
