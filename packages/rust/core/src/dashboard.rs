//! The dashboard: one isolated slot per feature, all sharing one pipeline.

use std::fmt;
use std::sync::Arc;

use clearmind_shared::{ActionPlan, TaskKind, TaskResult};

use crate::pipeline::{InvokeReport, Slot, TransformationPipeline};
use crate::request::TaskInput;
use crate::session::{SessionObserver, SessionState, SilentObserver};

/// Features that own a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureId {
    Simplifier,
    Focus,
    Memory,
    Tasks,
    CompanionChat,
    CompanionExplain,
}

impl FeatureId {
    pub const ALL: [FeatureId; 6] = [
        Self::Simplifier,
        Self::Focus,
        Self::Memory,
        Self::Tasks,
        Self::CompanionChat,
        Self::CompanionExplain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simplifier => "simplifier",
            Self::Focus => "focus",
            Self::Memory => "memory",
            Self::Tasks => "tasks",
            Self::CompanionChat => "companion-chat",
            Self::CompanionExplain => "companion-explain",
        }
    }

    /// The task kind this feature invokes.
    pub fn task_kind(&self) -> TaskKind {
        match self {
            Self::Simplifier => TaskKind::Simplify,
            Self::Focus => TaskKind::Segment,
            Self::Memory => TaskKind::Extract,
            Self::Tasks => TaskKind::Decompose,
            Self::CompanionChat => TaskKind::Answer,
            Self::CompanionExplain => TaskKind::Explain,
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owns every feature slot. Failure or success in one never touches another.
pub struct Dashboard {
    pipeline: Arc<TransformationPipeline>,
    slots: [Arc<Slot>; 6],
}

impl Dashboard {
    pub fn new(pipeline: Arc<TransformationPipeline>) -> Self {
        Self::with_observer(pipeline, Arc::new(SilentObserver))
    }

    pub fn with_observer(
        pipeline: Arc<TransformationPipeline>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        let slots = FeatureId::ALL
            .map(|feature| Arc::new(Slot::with_observer(feature.as_str(), observer.clone())));
        Self { pipeline, slots }
    }

    pub fn pipeline(&self) -> &Arc<TransformationPipeline> {
        &self.pipeline
    }

    pub fn slot(&self, feature: FeatureId) -> &Arc<Slot> {
        &self.slots[feature.index()]
    }

    pub fn state(&self, feature: FeatureId) -> SessionState {
        self.slot(feature).state()
    }

    /// Invoke the feature's task on plain text.
    pub async fn run(&self, feature: FeatureId, text: &str) -> InvokeReport {
        self.run_with(feature, TaskInput::new(text)).await
    }

    pub async fn run_with(&self, feature: FeatureId, input: TaskInput) -> InvokeReport {
        self.pipeline
            .invoke(self.slot(feature), feature.task_kind(), input)
            .await
    }

    pub fn reset(&self, feature: FeatureId) -> bool {
        self.slot(feature).reset()
    }

    /// Tick or untick a step of the current action plan.
    pub fn toggle_step(&self, step_id: u32) -> bool {
        self.slot(FeatureId::Tasks).toggle_step(step_id)
    }

    /// The current action plan, if the tasks slot holds one.
    pub fn plan(&self) -> Option<ActionPlan> {
        match self.state(FeatureId::Tasks) {
            SessionState::Succeeded(TaskResult::ActionPlan(plan)) => Some(plan),
            _ => None,
        }
    }
}
