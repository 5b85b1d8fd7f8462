//! Reading companion: questions about a document, and explanations of
//! highlighted passages.
//!
//! The transcript is literal. A question is shown as soon as it is asked;
//! the answer is appended only when its outcome was applied to the chat slot.
//! No earlier turns are sent back to the model.

use std::sync::Arc;

use tracing::debug;

use clearmind_shared::{ChatTurn, TaskKind, TaskResult};

use crate::pipeline::{InvokeReport, PipelineOutcome, Slot, TransformationPipeline};
use crate::request::TaskInput;

/// First assistant turn of every transcript.
pub const GREETING: &str = "Hi! I'm your reading companion. Highlight any passage to get a \
     plain explanation, or ask me a question about the document.";

/// Selections this short (after trimming) are ignored.
const MIN_SELECTION_CHARS: usize = 3;

pub struct ReadingCompanion {
    pipeline: Arc<TransformationPipeline>,
    chat: Arc<Slot>,
    explain: Arc<Slot>,
    document: String,
    transcript: Vec<ChatTurn>,
}

impl ReadingCompanion {
    pub fn new(
        pipeline: Arc<TransformationPipeline>,
        chat: Arc<Slot>,
        explain: Arc<Slot>,
        document: impl Into<String>,
    ) -> Self {
        Self {
            pipeline,
            chat,
            explain,
            document: document.into(),
            transcript: vec![ChatTurn::assistant(GREETING)],
        }
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn transcript(&self) -> &[ChatTurn] {
        &self.transcript
    }

    /// Ask about the document. Blank questions are ignored and return `None`.
    pub async fn ask(&mut self, question: &str) -> Option<InvokeReport> {
        let question = question.trim();
        if question.is_empty() {
            return None;
        }
        self.transcript.push(ChatTurn::user(question));

        let input = TaskInput::new(question).with_context(self.document.as_str());
        let report = self
            .pipeline
            .invoke(&self.chat, TaskKind::Answer, input)
            .await;

        if report.applied {
            if let PipelineOutcome::Success(TaskResult::ChatTurn(turn)) = &report.outcome {
                self.transcript.push(turn.clone());
            }
        } else {
            debug!(seq = report.seq, "superseded answer not added to transcript");
        }
        Some(report)
    }

    /// Explain a highlighted passage. Selections of three characters or
    /// fewer are ignored and return `None`.
    pub async fn explain(&self, selection: &str) -> Option<InvokeReport> {
        let selection = selection.trim();
        if selection.chars().count() <= MIN_SELECTION_CHARS {
            return None;
        }
        let input = TaskInput::new(selection).with_context(self.document.as_str());
        Some(
            self.pipeline
                .invoke(&self.explain, TaskKind::Explain, input)
                .await,
        )
    }

    /// The explanation currently shown, if the explain slot succeeded.
    pub fn explanation(&self) -> Option<String> {
        match self.explain.state().result() {
            Some(TaskResult::ChatTurn(turn)) => Some(turn.content.clone()),
            _ => None,
        }
    }
}
