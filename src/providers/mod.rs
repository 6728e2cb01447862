//! Completer layer.
//!
//! The booking pipeline sees the language model only through [`LlmProvider`]:
//! one prompt goes in, free text comes out, and nothing about that text is
//! trusted. [`ollama::OllamaProvider`] is the only backend.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;

pub mod ollama;

/// Longest upstream error body kept in a [`ProviderError::HttpStatus`].
const MAX_ERROR_BODY_CHARS: usize = 256;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Author of a chat message. The extraction prompt is the only message
/// Straylight sends, so only the user role exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user.
    User,
}

impl Role {
    /// Lowercase name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
        }
    }
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who wrote it.
    pub role: Role,
    /// Text body.
    pub content: String,
}

impl Message {
    /// A user-role message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Input to one completer call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Conversation; the booking pipeline sends exactly one user message.
    pub messages: Vec<Message>,
    /// Sampling temperature; backend default when `None`.
    pub temperature: Option<f32>,
    /// Generation cap in tokens; backend default when `None`.
    pub max_tokens: Option<u32>,
}

/// Why generation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The model finished on its own.
    EndTurn,
    /// Cut off by the token cap; the JSON may be truncated.
    MaxTokens,
    /// Anything else the backend reported.
    Other(String),
}

/// Token accounting for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsageStats {
    /// Prompt tokens.
    pub input_tokens: u32,
    /// Generated tokens.
    pub output_tokens: u32,
}

/// Output of one completer call.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Raw assistant text, prose and all.
    pub text: String,
    /// Why generation ended.
    pub stop_reason: StopReason,
    /// Token accounting.
    pub usage: UsageStats,
    /// Model name as reported by the backend.
    pub model: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Completer failures.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Could not reach the backend or read its reply.
    #[error("completer request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The backend replied with something other than its documented schema.
    #[error("unexpected completer response: {0}")]
    Parse(String),
    /// The backend answered with a non-2xx status.
    #[error("completer returned status {status}: {body}")]
    HttpStatus {
        /// Status code.
        status: u16,
        /// Response body, redacted and truncated.
        body: String,
    },
    /// The configured backend cannot be used.
    #[error("completer unavailable: {0}")]
    Unavailable(String),
}

static SECRET_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"sk-[A-Za-z0-9_\-]{20,}",
        r"ghp_[A-Za-z0-9]{20,}",
        r"(?i)bearer\s+[A-Za-z0-9._\-]{16,}",
    ]
    .into_iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Read a response body, turning non-2xx statuses into [`ProviderError::HttpStatus`].
///
/// Error bodies are whitespace-collapsed, stripped of token-like secrets
/// and cut to a bounded length before they are stored.
///
/// # Errors
///
/// `Request` if the body cannot be read, `HttpStatus` on a non-success status.
pub async fn check_http_response(response: reqwest::Response) -> Result<String, ProviderError> {
    let status = response.status();
    let body = response.text().await?;
    if status.is_success() {
        return Ok(body);
    }
    Err(ProviderError::HttpStatus {
        status: status.as_u16(),
        body: redact_error_body(&body),
    })
}

fn redact_error_body(raw: &str) -> String {
    let mut body = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    for re in SECRET_PATTERNS.iter() {
        body = re.replace_all(&body, "[REDACTED]").into_owned();
    }
    match body.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}...[truncated]", body.get(..cut).unwrap_or_default()),
        None => body,
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A black-box text completer.
///
/// One instance serves every request concurrently, so implementations hold
/// no per-request state.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run one completion.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the backend is unreachable, rejects the
    /// call, or answers in an unexpected shape.
    async fn complete(&self, request: CompletionRequest)
        -> Result<CompletionResponse, ProviderError>;

    /// Model spec this instance was built from, e.g. `ollama/mistral`.
    fn model_id(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Split a model spec such as `ollama/mistral` into `(backend, model)`.
///
/// Only the first `/` separates, so namespaced or tagged models like
/// `ollama/library/mistral:7b` keep their full name.
///
/// # Errors
///
/// Fails when there is no `/` or either half is empty.
pub fn parse_provider_string(spec: &str) -> anyhow::Result<(&str, &str)> {
    match spec.split_once('/') {
        Some((backend, model)) if !backend.is_empty() && !model.is_empty() => {
            Ok((backend, model))
        }
        _ => anyhow::bail!("invalid model spec {spec:?}, expected 'backend/model'"),
    }
}

/// Build the completer described by the `[model]` section.
///
/// # Errors
///
/// Fails on a malformed spec or a backend other than `ollama`.
pub fn provider_from_config(model: &ModelConfig) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let (backend, name) = parse_provider_string(&model.default)?;
    if backend != "ollama" {
        return Err(ProviderError::Unavailable(format!(
            "unsupported provider '{backend}' in model spec '{}'",
            model.default
        ))
        .into());
    }
    let provider = ollama::OllamaProvider::new(model.default.clone(), name.to_owned())
        .with_base_url(&model.base_url)
        .with_json_format(model.json_format);
    Ok(Arc::new(provider))
}
