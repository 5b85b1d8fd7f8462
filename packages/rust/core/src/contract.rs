//! Response contracts: the output shape each task kind must produce.
//!
//! Parsing is strictly syntactic. Fenced-code decoration is stripped from
//! the ends of the text, the rest must decode as the kind's JSON shape, and
//! the decoded value must pass minimum-shape validation. Anything else fails
//! closed with [`ClearMindError::MalformedResponse`]; no default result is
//! ever substituted.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::error::Category;

use clearmind_shared::{
    ActionPlan, ChatTurn, ClearMindError, MemoryCard, PlanStep, Priority, Result, Simplification,
    TaskKind, TaskResult,
};

/// Fenced-code delimiter the model sometimes wraps JSON in.
const FENCE: &str = "```";

// ---------------------------------------------------------------------------
// Decoration stripping
// ---------------------------------------------------------------------------

/// Remove fenced-code delimiters (and a language tag after the opening
/// fence) from both ends of `raw`, trimming whitespace. Interior content is
/// never touched, and applying this twice is the same as applying it once.
pub fn strip_decoration(raw: &str) -> &str {
    let mut current = raw.trim();
    loop {
        let next = strip_trailing_fence(strip_leading_fence(current)).trim();
        // Only prefixes/suffixes are removed, so equal length means no change.
        if next.len() == current.len() {
            return next;
        }
        current = next;
    }
}

fn strip_leading_fence(s: &str) -> &str {
    match s.strip_prefix(FENCE) {
        Some(rest) => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
        None => s,
    }
}

fn strip_trailing_fence(s: &str) -> &str {
    s.strip_suffix(FENCE).unwrap_or(s)
}

// ---------------------------------------------------------------------------
// Wire shapes (what the model is told to emit)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimplifyWire {
    summary: String,
    bullet_points: Vec<String>,
    simplified_text: String,
}

#[derive(Debug, Deserialize)]
struct DecomposeWire {
    goal: String,
    steps: Vec<StepWire>,
}

#[derive(Debug, Deserialize)]
struct StepWire {
    text: String,
    time: String,
    priority: String,
}

#[derive(Debug, Deserialize)]
struct CardWire {
    #[serde(rename = "type")]
    category: String,
    title: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnswerWire {
    answer: String,
}

#[derive(Debug, Deserialize)]
struct ExplainWire {
    explanation: String,
}

// ---------------------------------------------------------------------------
// ResponseContract
// ---------------------------------------------------------------------------

/// Expected output shape for one task kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseContract {
    kind: TaskKind,
}

impl ResponseContract {
    pub fn for_kind(kind: TaskKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Shape description embedded in the request instruction.
    pub fn shape_description(&self) -> &'static str {
        match self.kind {
            TaskKind::Simplify => {
                r#"{"summary": string, "bulletPoints": [string, ...], "simplifiedText": string}"#
            }
            TaskKind::Decompose => {
                r#"{"goal": string, "steps": [{"text": string, "time": string, "priority": "High" | "Medium" | "Low"}, ...]}"#
            }
            TaskKind::Extract => {
                r#"[{"type": "Definition" | "Key Point" | "Rule", "title": string, "content": string}, ...]"#
            }
            TaskKind::Segment => r#"[string, ...]"#,
            TaskKind::Answer => r#"{"answer": string}"#,
            TaskKind::Explain => r#"{"explanation": string}"#,
        }
    }

    /// Parse the model's text payload into a validated result.
    ///
    /// `None` or whitespace-only text means the service sent nothing usable.
    pub fn parse(&self, text: Option<&str>) -> Result<TaskResult> {
        let raw = match text {
            Some(t) if !t.trim().is_empty() => t,
            _ => return Err(ClearMindError::EmptyModelResponse),
        };
        let cleaned = strip_decoration(raw);

        match self.kind {
            TaskKind::Segment => {
                let sentences: Vec<String> = decode(cleaned, raw, "a JSON array of strings")?;
                let sentences = non_empty_list("sentences", sentences, raw)?;
                Ok(TaskResult::SentenceList(sentences))
            }
            TaskKind::Extract => {
                let cards: Vec<CardWire> = decode(cleaned, raw, "a JSON array of cards")?;
                if cards.is_empty() {
                    return Err(ClearMindError::malformed("no cards", raw));
                }
                let cards = cards
                    .into_iter()
                    .enumerate()
                    .map(|(i, card)| {
                        Ok(MemoryCard {
                            id: position(i),
                            category: required("type", card.category, raw)?,
                            title: required("title", card.title, raw)?,
                            body: required("content", card.content, raw)?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(TaskResult::ExtractionSet(cards))
            }
            TaskKind::Simplify => {
                let wire: SimplifyWire = decode(cleaned, raw, "a simplification object")?;
                Ok(TaskResult::SimplificationBundle(Simplification {
                    summary: required("summary", wire.summary, raw)?,
                    bullet_points: non_empty_list("bulletPoints", wire.bullet_points, raw)?,
                    plain_text: required("simplifiedText", wire.simplified_text, raw)?,
                }))
            }
            TaskKind::Decompose => {
                let wire: DecomposeWire = decode(cleaned, raw, "an action plan object")?;
                if wire.steps.is_empty() {
                    return Err(ClearMindError::malformed("plan has no steps", raw));
                }
                let steps = wire
                    .steps
                    .into_iter()
                    .enumerate()
                    .map(|(i, step)| {
                        let priority: Priority = step.priority.parse().map_err(|_: String| {
                            ClearMindError::malformed(
                                format!("step {} has an unknown priority", i + 1),
                                raw,
                            )
                        })?;
                        Ok(PlanStep {
                            id: position(i),
                            text: required("text", step.text, raw)?,
                            estimated_duration: required("time", step.time, raw)?,
                            priority,
                            done: false,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(TaskResult::ActionPlan(ActionPlan {
                    goal: required("goal", wire.goal, raw)?,
                    steps,
                }))
            }
            TaskKind::Answer => {
                let wire: AnswerWire = decode(cleaned, raw, "an answer object")?;
                Ok(TaskResult::ChatTurn(ChatTurn::assistant(required(
                    "answer",
                    wire.answer,
                    raw,
                )?)))
            }
            TaskKind::Explain => {
                let wire: ExplainWire = decode(cleaned, raw, "an explanation object")?;
                Ok(TaskResult::ChatTurn(ChatTurn::assistant(required(
                    "explanation",
                    wire.explanation,
                    raw,
                )?)))
            }
        }
    }
}

/// Decode `cleaned` as `T`, attaching the original `raw` text on failure.
///
/// The reason names only the error category and position. serde's own
/// message can quote model text, which must stay in `raw`.
fn decode<T: DeserializeOwned>(cleaned: &str, raw: &str, expected: &str) -> Result<T> {
    serde_json::from_str(cleaned).map_err(|e| {
        let category = match e.classify() {
            Category::Syntax => "invalid JSON",
            Category::Eof => "truncated JSON",
            Category::Data => "unexpected value or missing field",
            Category::Io => "unreadable input",
        };
        ClearMindError::malformed(
            format!(
                "expected {expected}: {category} at line {} column {}",
                e.line(),
                e.column()
            ),
            raw,
        )
    })
}

/// Trimmed, non-empty string field.
fn required(field: &str, value: String, raw: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ClearMindError::malformed(
            format!("field '{field}' is empty"),
            raw,
        ));
    }
    Ok(trimmed.to_string())
}

/// Non-empty list of trimmed, non-empty strings.
fn non_empty_list(field: &str, values: Vec<String>, raw: &str) -> Result<Vec<String>> {
    if values.is_empty() {
        return Err(ClearMindError::malformed(
            format!("'{field}' is empty"),
            raw,
        ));
    }
    values
        .into_iter()
        .map(|v| required(field, v, raw))
        .collect()
}

fn position(index: usize) -> u32 {
    u32::try_from(index + 1).unwrap_or(u32::MAX)
}
