//! Per-slot session state: `Idle`, `Loading`, `Succeeded`, `Failed`.
//!
//! Every invocation on a slot takes a [`Ticket`] carrying a sequence number.
//! The number increases monotonically per slot, and an outcome is applied only
//! when its ticket is the latest one issued. Older calls that resolve late are
//! discarded without touching state.

use clearmind_shared::TaskResult;

use crate::pipeline::{PipelineFailure, PipelineOutcome};

/// Observable state of one slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Loading,
    Succeeded(TaskResult),
    Failed(PipelineFailure),
}

impl SessionState {
    pub fn phase(&self) -> Phase {
        match self {
            Self::Idle => Phase::Idle,
            Self::Loading => Phase::Loading,
            Self::Succeeded(_) => Phase::Succeeded,
            Self::Failed(_) => Phase::Failed,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn result(&self) -> Option<&TaskResult> {
        match self {
            Self::Succeeded(result) => Some(result),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&PipelineFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Payload-free tag of a [`SessionState`], used in transition events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Loading,
    Succeeded,
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a transition happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCause {
    Invoke,
    Outcome,
    Reset,
    Edit,
}

/// One applied state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Sequence number the slot held when the change was applied.
    pub seq: u64,
    pub from: Phase,
    pub to: Phase,
    pub cause: TransitionCause,
}

/// Receives transitions for a slot, in the order they are applied.
///
/// Called while the slot is locked, so implementations must not call back
/// into the same slot.
pub trait SessionObserver: Send + Sync {
    fn on_transition(&self, slot: &str, transition: &Transition, state: &SessionState);
}

/// Observer that ignores every transition.
pub struct SilentObserver;

impl SessionObserver for SilentObserver {
    fn on_transition(&self, _slot: &str, _transition: &Transition, _state: &SessionState) {}
}

/// Proof of an issued invocation. Only the newest ticket may settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    seq: u64,
}

impl Ticket {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// The state machine behind one slot.
#[derive(Debug, Default)]
pub struct SessionStateMachine {
    state: SessionState,
    latest_seq: u64,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn latest_seq(&self) -> u64 {
        self.latest_seq
    }

    /// Enter `Loading` for a new invocation, superseding any call in flight.
    pub fn begin(&mut self) -> (Ticket, Transition) {
        self.latest_seq += 1;
        let transition = self.move_to(SessionState::Loading, TransitionCause::Invoke);
        (
            Ticket {
                seq: self.latest_seq,
            },
            transition,
        )
    }

    /// Apply a terminal outcome if `ticket` is still the latest issued one.
    ///
    /// Returns `None` when the outcome is stale and was discarded.
    pub fn settle(&mut self, ticket: Ticket, outcome: PipelineOutcome) -> Option<Transition> {
        if ticket.seq != self.latest_seq || !self.state.is_loading() {
            return None;
        }
        let next = match outcome {
            PipelineOutcome::Success(result) => SessionState::Succeeded(result),
            PipelineOutcome::Failure(failure) => SessionState::Failed(failure),
        };
        Some(self.move_to(next, TransitionCause::Outcome))
    }

    /// Fail an invocation that never reached the network.
    ///
    /// Takes a fresh sequence number so anything still in flight is superseded.
    pub fn reject(&mut self, failure: PipelineFailure) -> (Ticket, Transition) {
        self.latest_seq += 1;
        let transition = self.move_to(SessionState::Failed(failure), TransitionCause::Invoke);
        (
            Ticket {
                seq: self.latest_seq,
            },
            transition,
        )
    }

    /// Return to `Idle` from a terminal state. No-op while `Idle` or `Loading`.
    pub fn reset(&mut self) -> Option<Transition> {
        match self.state {
            SessionState::Succeeded(_) | SessionState::Failed(_) => {
                Some(self.move_to(SessionState::Idle, TransitionCause::Reset))
            }
            SessionState::Idle | SessionState::Loading => None,
        }
    }

    /// Flip a step of a succeeded action plan. Returns `None` in any other state
    /// or when no step has that id.
    pub fn toggle_step(&mut self, step_id: u32) -> Option<Transition> {
        let SessionState::Succeeded(TaskResult::ActionPlan(plan)) = &mut self.state else {
            return None;
        };
        if !plan.toggle_step(step_id) {
            return None;
        }
        Some(Transition {
            seq: self.latest_seq,
            from: Phase::Succeeded,
            to: Phase::Succeeded,
            cause: TransitionCause::Edit,
        })
    }

    fn move_to(&mut self, next: SessionState, cause: TransitionCause) -> Transition {
        let from = self.state.phase();
        self.state = next;
        Transition {
            seq: self.latest_seq,
            from,
            to: self.state.phase(),
            cause,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clearmind_shared::{ActionPlan, ErrorKind, PlanStep, Priority};

    fn sentences(items: &[&str]) -> PipelineOutcome {
        PipelineOutcome::Success(TaskResult::SentenceList(
            items.iter().map(|s| s.to_string()).collect(),
        ))
    }

    fn failure(kind: ErrorKind) -> PipelineFailure {
        PipelineFailure {
            kind,
            message: kind.user_message().to_string(),
            raw: None,
        }
    }

    fn plan() -> TaskResult {
        TaskResult::ActionPlan(ActionPlan {
            goal: "Clean the kitchen".into(),
            steps: vec![PlanStep {
                id: 1,
                text: "Clear the counter".into(),
                estimated_duration: "5 min".into(),
                priority: Priority::High,
                done: false,
            }],
        })
    }

    #[test]
    fn starts_idle() {
        let machine = SessionStateMachine::new();
        assert_eq!(machine.state(), &SessionState::Idle);
        assert_eq!(machine.latest_seq(), 0);
    }

    #[test]
    fn invoke_then_success() {
        let mut machine = SessionStateMachine::new();
        let (ticket, t) = machine.begin();
        assert_eq!((t.from, t.to), (Phase::Idle, Phase::Loading));

        let t = machine.settle(ticket, sentences(&["One."])).unwrap();
        assert_eq!((t.from, t.to), (Phase::Loading, Phase::Succeeded));
        assert!(machine.state().result().is_some());
    }

    #[test]
    fn terminal_states_are_reentrant() {
        let mut machine = SessionStateMachine::new();
        let (ticket, _) = machine.begin();
        machine.settle(
            ticket,
            PipelineOutcome::Failure(failure(ErrorKind::TransportError)),
        );

        let (_, t) = machine.begin();
        assert_eq!((t.from, t.to), (Phase::Failed, Phase::Loading));
    }

    #[test]
    fn stale_ticket_is_discarded() {
        let mut machine = SessionStateMachine::new();
        let (a, _) = machine.begin();
        let (b, _) = machine.begin();
        assert!(b.seq() > a.seq());

        assert!(machine.settle(b, sentences(&["B."])).is_some());
        assert!(machine.settle(a, sentences(&["A."])).is_none());
        assert_eq!(
            machine.state().result(),
            Some(&TaskResult::SentenceList(vec!["B.".into()]))
        );
    }

    #[test]
    fn stale_ticket_discarded_even_before_newer_resolves() {
        let mut machine = SessionStateMachine::new();
        let (a, _) = machine.begin();
        let (_b, _) = machine.begin();

        assert!(machine.settle(a, sentences(&["A."])).is_none());
        assert!(machine.state().is_loading());
    }

    #[test]
    fn ticket_settles_at_most_once() {
        let mut machine = SessionStateMachine::new();
        let (ticket, _) = machine.begin();
        assert!(machine.settle(ticket, sentences(&["One."])).is_some());
        assert!(machine.settle(ticket, sentences(&["Two."])).is_none());
    }

    #[test]
    fn reject_supersedes_in_flight_call() {
        let mut machine = SessionStateMachine::new();
        let (a, _) = machine.begin();

        let (_, t) = machine.reject(failure(ErrorKind::EmptyInput));
        assert_eq!((t.from, t.to), (Phase::Loading, Phase::Failed));

        assert!(machine.settle(a, sentences(&["A."])).is_none());
        assert_eq!(
            machine.state().failure().map(|f| f.kind),
            Some(ErrorKind::EmptyInput)
        );
    }

    #[test]
    fn reset_only_from_terminal_states() {
        let mut machine = SessionStateMachine::new();
        assert!(machine.reset().is_none());

        let (ticket, _) = machine.begin();
        assert!(machine.reset().is_none(), "no exit from Loading except an outcome");

        machine.settle(ticket, sentences(&["One."]));
        let t = machine.reset().unwrap();
        assert_eq!((t.from, t.to), (Phase::Succeeded, Phase::Idle));
        assert_eq!(machine.state(), &SessionState::Idle);
    }

    #[test]
    fn toggle_step_edits_succeeded_plan() {
        let mut machine = SessionStateMachine::new();
        assert!(machine.toggle_step(1).is_none());

        let (ticket, _) = machine.begin();
        assert!(machine.toggle_step(1).is_none());
        machine.settle(ticket, PipelineOutcome::Success(plan()));

        let t = machine.toggle_step(1).unwrap();
        assert_eq!(t.cause, TransitionCause::Edit);
        assert!(machine.toggle_step(99).is_none());

        let Some(TaskResult::ActionPlan(plan)) = machine.state().result() else {
            panic!("expected plan");
        };
        assert!(plan.steps[0].done);
    }
}
