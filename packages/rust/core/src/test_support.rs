//! Transport doubles and fixtures shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use clearmind_shared::{ClearMindError, ModelConfig, Result};
use clearmind_storage::MemoryStore;

use crate::credential::{CREDENTIAL_KEY, CredentialStore};
use crate::pipeline::TransformationPipeline;
use crate::request::{RequestBuilder, TaskRequest};
use crate::session::{SessionObserver, SessionState, Transition};
use crate::transport::ModelTransport;

pub(crate) const TEST_KEY: &str = "AIzaTestKey-0000-1234";

/// Replays a fixed script of responses and counts calls.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Result<Option<String>>>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<TaskRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(self: Arc<Self>, entry: Result<Option<String>>) -> Arc<Self> {
        self.script.lock().unwrap().push_back(entry);
        self
    }

    pub(crate) fn reply(self: Arc<Self>, text: &str) -> Arc<Self> {
        self.push(Ok(Some(text.to_string())))
    }

    pub(crate) fn reply_none(self: Arc<Self>) -> Arc<Self> {
        self.push(Ok(None))
    }

    pub(crate) fn fail(self: Arc<Self>, err: ClearMindError) -> Arc<Self> {
        self.push(Err(err))
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<TaskRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelTransport for ScriptedTransport {
    async fn send(&self, request: &TaskRequest) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClearMindError::Transport("script exhausted".into())))
    }
}

/// A call held open until the test responds to it.
pub(crate) struct Gate {
    pub(crate) payload: String,
    responder: oneshot::Sender<Result<Option<String>>>,
}

impl Gate {
    pub(crate) fn respond(self, response: Result<Option<String>>) {
        let _ = self.responder.send(response);
    }
}

/// Hands every call to the test as a [`Gate`] so resolution order is controlled.
pub(crate) struct GatedTransport {
    gates: mpsc::UnboundedSender<Gate>,
}

impl GatedTransport {
    pub(crate) fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Gate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { gates: tx }), rx)
    }
}

#[async_trait]
impl ModelTransport for GatedTransport {
    async fn send(&self, request: &TaskRequest) -> Result<Option<String>> {
        let (tx, rx) = oneshot::channel();
        let gate = Gate {
            payload: request.payload.clone(),
            responder: tx,
        };
        self.gates
            .send(gate)
            .map_err(|_| ClearMindError::Transport("gate receiver dropped".into()))?;
        rx.await
            .map_err(|_| ClearMindError::Transport("gate dropped".into()))?
    }
}

/// Records every transition it sees.
#[derive(Default)]
pub(crate) struct RecordingObserver {
    seen: Mutex<Vec<(String, Transition)>>,
}

impl RecordingObserver {
    pub(crate) fn transitions(&self) -> Vec<Transition> {
        self.seen.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    pub(crate) fn slots(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|(slot, _)| slot.clone())
            .collect()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_transition(&self, slot: &str, transition: &Transition, _state: &SessionState) {
        self.seen
            .lock()
            .unwrap()
            .push((slot.to_string(), *transition));
    }
}

pub(crate) async fn configured_credentials() -> Arc<CredentialStore> {
    let store = Arc::new(MemoryStore::with_entry(CREDENTIAL_KEY, TEST_KEY));
    Arc::new(CredentialStore::load(store).await.unwrap())
}

pub(crate) async fn unconfigured_credentials() -> Arc<CredentialStore> {
    Arc::new(CredentialStore::load(Arc::new(MemoryStore::new())).await.unwrap())
}

/// Pipeline over the default model config with a 30s timeout.
pub(crate) fn pipeline_with(
    transport: Arc<dyn ModelTransport>,
    credentials: Arc<CredentialStore>,
) -> TransformationPipeline {
    let builder = RequestBuilder::new(&ModelConfig::default()).unwrap();
    TransformationPipeline::new(builder, credentials, transport, Duration::from_secs(30))
}
