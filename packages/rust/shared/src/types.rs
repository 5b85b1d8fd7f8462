//! Core domain types for ClearMind transformations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TaskKind
// ---------------------------------------------------------------------------

/// The transformation requested from the language model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Rewrite dense text as a summary, bullet points, and plain prose.
    Simplify,
    /// Break a goal into small, ordered steps.
    Decompose,
    /// Pull key facts out of notes as memory cards.
    Extract,
    /// Split text into one sentence per item for focused reading.
    Segment,
    /// Answer a question about a document.
    Answer,
    /// Explain a highlighted passage of a document.
    Explain,
}

impl TaskKind {
    /// Every task kind, in dashboard order.
    pub const ALL: [TaskKind; 6] = [
        Self::Simplify,
        Self::Segment,
        Self::Extract,
        Self::Decompose,
        Self::Answer,
        Self::Explain,
    ];

    /// Stable identifier used in logs and fingerprints.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simplify => "simplify",
            Self::Decompose => "decompose",
            Self::Extract => "extract",
            Self::Segment => "segment",
            Self::Answer => "answer",
            Self::Explain => "explain",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TaskResult
// ---------------------------------------------------------------------------

/// A validated transformation result. Each variant already satisfies its
/// minimum-shape contract when produced by the response parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TaskResult {
    /// Ordered, non-empty sentences.
    SentenceList(Vec<String>),
    /// Memory cards extracted from notes.
    ExtractionSet(Vec<MemoryCard>),
    /// Simplified rendition of a difficult text.
    SimplificationBundle(Simplification),
    /// A goal broken into steps.
    ActionPlan(ActionPlan),
    /// One turn of the reading companion conversation.
    ChatTurn(ChatTurn),
}

impl TaskResult {
    /// The task kind family this result belongs to.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::SentenceList(_) => "sentence_list",
            Self::ExtractionSet(_) => "extraction_set",
            Self::SimplificationBundle(_) => "simplification_bundle",
            Self::ActionPlan(_) => "action_plan",
            Self::ChatTurn(_) => "chat_turn",
        }
    }
}

/// A single memory card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryCard {
    /// 1-based position within the set.
    pub id: u32,
    /// Card category, e.g. "Definition", "Key Point", "Rule".
    pub category: String,
    pub title: String,
    pub body: String,
}

/// Output of the simplifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Simplification {
    pub summary: String,
    pub bullet_points: Vec<String>,
    pub plain_text: String,
}

// ---------------------------------------------------------------------------
// ActionPlan
// ---------------------------------------------------------------------------

/// Step priority as shown next to each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => f.write_str("High"),
            Self::Medium => f.write_str("Medium"),
            Self::Low => f.write_str("Low"),
        }
    }
}

/// One step of an action plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// 1-based position within the plan.
    pub id: u32,
    pub text: String,
    /// Free-form estimate such as "15 mins".
    pub estimated_duration: String,
    pub priority: Priority,
    pub done: bool,
}

/// A goal decomposed into small steps the user can tick off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub goal: String,
    pub steps: Vec<PlanStep>,
}

impl ActionPlan {
    /// Flip the `done` flag of the step with `id`. Returns `false` if no such step exists.
    pub fn toggle_step(&mut self, id: u32) -> bool {
        match self.steps.iter_mut().find(|s| s.id == id) {
            Some(step) => {
                step.done = !step.done;
                true
            }
            None => false,
        }
    }

    /// Number of steps marked done.
    pub fn completed_count(&self) -> usize {
        self.steps.iter().filter(|s| s.done).count()
    }

    /// Completion as a whole percentage, rounded half up (0 for an empty plan).
    pub fn progress_percent(&self) -> u8 {
        let total = self.steps.len();
        if total == 0 {
            return 0;
        }
        ((self.completed_count() * 200 + total) / (2 * total)) as u8
    }

    /// Whether every step is done.
    pub fn is_complete(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|s| s.done)
    }
}

// ---------------------------------------------------------------------------
// ChatTurn
// ---------------------------------------------------------------------------

/// Speaker of a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One literal transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}
