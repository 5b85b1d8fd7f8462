//! Terminal rendering of slot states and results.

use std::fmt::Write as _;
use std::time::Duration;

use clearmind_core::pipeline::PipelineFailure;
use clearmind_core::session::{Phase, SessionObserver, SessionState, Transition};
use clearmind_shared::{ActionPlan, ChatRole, ChatTurn, ErrorKind, TaskResult};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

// ---------------------------------------------------------------------------
// Spinner
// ---------------------------------------------------------------------------

/// Shows a spinner while any observed slot is `Loading`.
pub(crate) struct SpinnerObserver {
    spinner: ProgressBar,
}

impl SpinnerObserver {
    pub(crate) fn new() -> Self {
        let spinner = ProgressBar::hidden();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        Self { spinner }
    }
}

impl SessionObserver for SpinnerObserver {
    fn on_transition(&self, slot: &str, transition: &Transition, _state: &SessionState) {
        match transition.to {
            Phase::Loading => {
                self.spinner
                    .set_draw_target(indicatif::ProgressDrawTarget::stderr());
                self.spinner.set_message(format!("Thinking ({slot})..."));
                self.spinner.enable_steady_tick(Duration::from_millis(80));
            }
            Phase::Succeeded | Phase::Failed | Phase::Idle => {
                self.spinner.finish_and_clear();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// Print a terminal state. `Failed` becomes an error carrying a calm message.
pub(crate) fn print_state(state: &SessionState) -> Result<()> {
    match state {
        SessionState::Succeeded(result) => {
            print!("{}", format_result(result));
            Ok(())
        }
        SessionState::Failed(failure) => Err(failure_report(failure)),
        SessionState::Idle | SessionState::Loading => Ok(()),
    }
}

pub(crate) fn failure_report(failure: &PipelineFailure) -> color_eyre::eyre::Report {
    debug!(kind = %failure.kind, message = %failure.message, "invocation failed");
    if let Some(raw) = &failure.raw {
        debug!(raw_chars = raw.chars().count(), "malformed model text kept for diagnostics");
    }
    match failure.kind {
        ErrorKind::MissingCredential => {
            eyre!("No API key yet. Run `clearmind key set` to add one.")
        }
        kind => eyre!("{}", kind.user_message()),
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

pub(crate) fn format_result(result: &TaskResult) -> String {
    let mut out = String::new();
    match result {
        TaskResult::SentenceList(sentences) => {
            for (i, sentence) in sentences.iter().enumerate() {
                let _ = writeln!(out, "{:>3}. {sentence}", i + 1);
            }
        }
        TaskResult::ExtractionSet(cards) => {
            for card in cards {
                let _ = writeln!(out, "[{}] {}", card.category, card.title);
                let _ = writeln!(out, "    {}", card.body);
                out.push('\n');
            }
        }
        TaskResult::SimplificationBundle(bundle) => {
            let _ = writeln!(out, "Summary\n  {}\n", bundle.summary);
            out.push_str("Key points\n");
            for point in &bundle.bullet_points {
                let _ = writeln!(out, "  • {point}");
            }
            let _ = writeln!(out, "\nPlain version\n  {}", bundle.plain_text);
        }
        TaskResult::ActionPlan(plan) => out.push_str(&format_plan(plan)),
        TaskResult::ChatTurn(turn) => {
            let _ = writeln!(out, "{}", turn.content);
        }
    }
    out
}

pub(crate) fn format_plan(plan: &ActionPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Goal: {}\n", plan.goal);
    for step in &plan.steps {
        let mark = if step.done { "x" } else { " " };
        let _ = writeln!(
            out,
            "  [{mark}] {}. {} ({}, {})",
            step.id, step.text, step.estimated_duration, step.priority
        );
    }
    let _ = writeln!(
        out,
        "\nProgress: {}/{} ({}%)",
        plan.completed_count(),
        plan.steps.len(),
        plan.progress_percent()
    );
    out
}

pub(crate) fn format_transcript(turns: &[ChatTurn]) -> String {
    let mut out = String::new();
    for turn in turns {
        let who = match turn.role {
            ChatRole::User => "You",
            ChatRole::Assistant => "Companion",
        };
        let _ = writeln!(out, "{who}: {}\n", turn.content);
    }
    out
}
