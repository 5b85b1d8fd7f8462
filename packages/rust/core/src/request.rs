//! Request construction for model calls.
//!
//! A [`TaskRequest`] is fully specified (endpoint, headers, instruction,
//! payload, generation options) and immutable once built. Identical inputs
//! always produce identical requests: no timestamps, no random seeds.

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use sha2::{Digest, Sha256};
use url::Url;

use clearmind_shared::{ClearMindError, ModelConfig, Result, TaskKind};

use crate::contract::ResponseContract;
use crate::credential::Credential;

/// Header carrying the API key. Keeping the key out of the URL keeps URLs loggable.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Response MIME type requested from the model.
const JSON_MIME_TYPE: &str = "application/json";

/// Rules appended to every instruction. The parser only strips fences, so
/// the model must not add anything else around the JSON.
const OUTPUT_RULES: &str = "\
Output rules:
- Respond with exactly one JSON value matching the shape above and nothing else.
- Do not add any introduction, explanation, apology, or closing remark.
- Do not wrap the JSON in code fences, backticks, or any other markup.";

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// User-supplied input for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInput {
    /// The text to transform, or the question / selection for companion tasks.
    pub text: String,
    /// Document the question or selection refers to.
    pub context: Option<String>,
}

impl TaskInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

// ---------------------------------------------------------------------------
// TaskRequest
// ---------------------------------------------------------------------------

/// Generation options sent with every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub response_mime_type: &'static str,
}

/// A built, ready-to-send model request.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub kind: TaskKind,
    pub endpoint: String,
    pub headers: HeaderMap,
    /// System instruction embedding the strict output contract.
    pub instruction: String,
    /// User payload.
    pub payload: String,
    pub options: GenerationOptions,
}

impl TaskRequest {
    /// JSON body for the `generateContent` call.
    pub fn body(&self) -> GenerateContentRequest<'_> {
        GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: &self.instruction,
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part {
                    text: &self.payload,
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.options.temperature,
                response_mime_type: self.options.response_mime_type,
            },
        }
    }

    /// Stable SHA-256 over everything that shapes the answer. Safe to log.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.kind.as_str().as_bytes());
        hasher.update(self.endpoint.as_bytes());
        hasher.update(self.instruction.as_bytes());
        hasher.update(self.payload.as_bytes());
        hasher.update(self.options.temperature.to_le_bytes());
        format!("{:x}", hasher.finalize())
    }
}

// Gemini request wire structures

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
}

// ---------------------------------------------------------------------------
// RequestBuilder
// ---------------------------------------------------------------------------

/// Builds [`TaskRequest`]s for a fixed endpoint and model.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    endpoint: String,
    temperature: f32,
}

impl RequestBuilder {
    /// Create a builder from the `[model]` config section.
    pub fn new(config: &ModelConfig) -> Result<Self> {
        config.validate()?;
        let base = Url::parse(&config.endpoint).map_err(|e| {
            ClearMindError::config(format!("invalid model endpoint '{}': {e}", config.endpoint))
        })?;
        let endpoint = format!(
            "{}/models/{}:generateContent",
            base.as_str().trim_end_matches('/'),
            config.model.trim()
        );
        Ok(Self {
            endpoint,
            temperature: config.temperature,
        })
    }

    /// Full URL requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build a request, checking preconditions in order: credential, then input.
    pub fn build(
        &self,
        kind: TaskKind,
        input: &TaskInput,
        credential: Option<&Credential>,
    ) -> Result<TaskRequest> {
        let credential = credential.ok_or(ClearMindError::MissingCredential)?;
        let text = input.text.trim();
        if text.is_empty() {
            return Err(ClearMindError::EmptyInput);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_MIME_TYPE));
        let mut key = HeaderValue::from_str(credential.expose())
            .map_err(|_| ClearMindError::InvalidCredential)?;
        key.set_sensitive(true);
        headers.insert(HeaderName::from_static(API_KEY_HEADER), key);

        Ok(TaskRequest {
            kind,
            endpoint: self.endpoint.clone(),
            headers,
            instruction: instruction_for(kind),
            payload: payload_for(kind, text, input.context.as_deref()),
            options: GenerationOptions {
                temperature: self.temperature,
                response_mime_type: JSON_MIME_TYPE,
            },
        })
    }
}

/// Task guidance + output shape + strict output rules.
fn instruction_for(kind: TaskKind) -> String {
    let guidance = match kind {
        TaskKind::Simplify => {
            "You help people with cognitive overload read difficult text. \
             Summarise the text in one or two plain sentences, list the key ideas as short \
             bullet points, and rewrite the whole text with common words and short sentences."
        }
        TaskKind::Decompose => {
            "You help people who feel overwhelmed start on a goal. \
             Break the goal into 3 to 8 small, concrete, ordered steps. \
             Give each step a realistic time estimate and a priority of High, Medium, or Low."
        }
        TaskKind::Extract => {
            "You help people remember what they read. \
             Extract the most important facts as memory cards. Use the category \
             \"Definition\", \"Key Point\", or \"Rule\" for each card."
        }
        TaskKind::Segment => {
            "You help people read one sentence at a time. \
             Split the text into its sentences in their original order without rewording them."
        }
        TaskKind::Answer => {
            "You are a calm reading companion. Answer the question using the document. \
             Keep the answer short and use plain language."
        }
        TaskKind::Explain => {
            "You are a calm reading companion. Explain what the highlighted passage means \
             in the context of the document, in two or three plain sentences."
        }
    };
    let shape = ResponseContract::for_kind(kind).shape_description();
    format!("{guidance}\n\nOutput shape:\n{shape}\n\n{OUTPUT_RULES}")
}

fn payload_for(kind: TaskKind, text: &str, context: Option<&str>) -> String {
    let Some(document) = context.map(str::trim).filter(|d| !d.is_empty()) else {
        return text.to_string();
    };
    let label = match kind {
        TaskKind::Explain => "Highlighted passage",
        TaskKind::Answer => "Question",
        _ => "Text",
    };
    format!("Document:\n<<<\n{document}\n>>>\n\n{label}: {text}")
}
