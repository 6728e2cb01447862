//! Completer backed by a local Ollama server (`POST /api/chat`, non-streaming).

use serde::{Deserialize, Serialize};

use super::{
    check_http_response, CompletionRequest, CompletionResponse, LlmProvider, ProviderError,
    StopReason, UsageStats,
};

/// Where `ollama serve` listens by default.
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

// Wire types are public so tests can inspect exactly what goes over HTTP.

/// Body of `POST /api/chat`.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    /// Model name without the `ollama/` prefix.
    pub model: String,
    /// Chat history.
    pub messages: Vec<ChatMessage>,
    /// Always `false`.
    pub stream: bool,
    /// `"json"` constrains decoding to a JSON value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<&'static str>,
    /// Sampling knobs, omitted when none are set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<ChatOptions>,
}

/// One message as Ollama spells it.
#[doc(hidden)]
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`.
    pub role: String,
    /// Text body.
    pub content: String,
}

/// Subset of Ollama's model options.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct ChatOptions {
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Generation cap in tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

/// Final (and only) reply of a non-streaming chat.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    /// Model that answered.
    pub model: String,
    /// The assistant message.
    pub message: ChatMessage,
    /// `stop`, `length`, ... Older servers leave it out.
    #[serde(default)]
    pub done_reason: Option<String>,
    /// Prompt tokens evaluated.
    #[serde(default)]
    pub prompt_eval_count: Option<u32>,
    /// Tokens generated.
    #[serde(default)]
    pub eval_count: Option<u32>,
}

/// Ollama chat completer.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    model_spec: String,
    /// Model name sent in requests.
    #[doc(hidden)]
    pub model: String,
    /// Server root, no trailing slash.
    #[doc(hidden)]
    pub base_url: String,
    json_format: bool,
    client: reqwest::Client,
}

impl OllamaProvider {
    /// A provider for `model_name`, identified by `model_spec` in logs and
    /// health output, pointed at [`DEFAULT_OLLAMA_URL`].
    pub fn new(model_spec: String, model_name: String) -> Self {
        Self {
            model_spec,
            model: model_name,
            base_url: DEFAULT_OLLAMA_URL.to_owned(),
            json_format: false,
            client: reqwest::Client::new(),
        }
    }

    /// Use another server.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        base_url.trim_end_matches('/').clone_into(&mut self.base_url);
        self
    }

    /// Ask Ollama to constrain output to JSON.
    pub fn with_json_format(mut self, enabled: bool) -> Self {
        self.json_format = enabled;
        self
    }

    /// Whether the server answers `GET /api/tags`.
    pub async fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .is_ok_and(|resp| resp.status().is_success())
    }

    fn request_body(&self, request: &CompletionRequest) -> ChatRequest {
        let mut body = build_request(&self.model, request);
        if self.json_format {
            body.format = Some("json");
        }
        body
    }
}

/// Translate a [`CompletionRequest`] into Ollama's chat body.
#[doc(hidden)]
pub fn build_request(model: &str, request: &CompletionRequest) -> ChatRequest {
    let options = (request.temperature.is_some() || request.max_tokens.is_some()).then(|| {
        ChatOptions {
            temperature: request.temperature,
            num_predict: request.max_tokens,
        }
    });

    ChatRequest {
        model: model.to_owned(),
        messages: request
            .messages
            .iter()
            .map(|m| ChatMessage {
                role: m.role.as_str().to_owned(),
                content: m.content.clone(),
            })
            .collect(),
        stream: false,
        format: None,
        options,
    }
}

/// Decode Ollama's chat reply.
///
/// # Errors
///
/// [`ProviderError::Parse`] if `body` is not a chat response.
#[doc(hidden)]
pub fn parse_response(body: &str) -> Result<CompletionResponse, ProviderError> {
    let reply: ChatResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Parse(e.to_string()))?;

    let stop_reason = match reply.done_reason.as_deref() {
        None | Some("stop") => StopReason::EndTurn,
        Some("length") => StopReason::MaxTokens,
        Some(other) => StopReason::Other(other.to_owned()),
    };

    Ok(CompletionResponse {
        text: reply.message.content,
        stop_reason,
        usage: UsageStats {
            input_tokens: reply.prompt_eval_count.unwrap_or_default(),
            output_tokens: reply.eval_count.unwrap_or_default(),
        },
        model: reply.model,
    })
}

#[async_trait::async_trait]
impl LlmProvider for OllamaProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&self.request_body(&request))
            .send()
            .await?;

        let body = check_http_response(response).await?;
        parse_response(&body)
    }

    fn model_id(&self) -> &str {
        &self.model_spec
    }
}
