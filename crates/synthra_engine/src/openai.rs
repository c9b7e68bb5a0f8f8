use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

use crate::{
    ChatMessage, CompletionRequest, EngineFactory, InferenceEngine, InferenceError, InitProgress,
    ProgressSink,
};

/// Connection settings for a local OpenAI-compatible inference server.
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub model_id: String,
    pub api_key: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Delay between `/v1/models` polls while the model is loading.
    pub load_poll_interval: Duration,
    pub load_poll_attempts: u32,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:1234".to_string(),
            model_id: "gemma-3-1b-it".to_string(),
            api_key: None,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(90),
            load_poll_interval: Duration::from_secs(2),
            load_poll_attempts: 60,
        }
    }
}

impl OpenAiSettings {
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Builds [`OpenAiEngine`]s once the configured model is served.
#[derive(Debug, Clone)]
pub struct OpenAiEngineFactory {
    settings: OpenAiSettings,
}

impl OpenAiEngineFactory {
    pub fn new(settings: OpenAiSettings) -> Self {
        Self { settings }
    }

    fn build_client(&self) -> Result<reqwest::Client, InferenceError> {
        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .build()
            .map_err(|err| InferenceError::Network(err.to_string()))
    }

    async fn find_model(&self, client: &reqwest::Client) -> Result<Option<ModelEntry>, InferenceError> {
        let mut request = client.get(self.settings.endpoint("v1/models"));
        if let Some(key) = &self.settings.api_key {
            request = request.bearer_auth(key);
        }
        let timeout = self.settings.request_timeout;
        let response = request
            .send()
            .await
            .map_err(|err| map_reqwest_error(err, timeout))?;
        let status = response.status();
        if !status.is_success() {
            return Err(InferenceError::Http {
                status: status.as_u16(),
                message: status.to_string(),
            });
        }
        let body = response
            .bytes()
            .await
            .map_err(|err| map_reqwest_error(err, timeout))?;
        let list: ModelList = serde_json::from_slice(&body)
            .map_err(|err| InferenceError::InvalidResponse(err.to_string()))?;
        Ok(list
            .data
            .into_iter()
            .find(|model| model.id == self.settings.model_id))
    }
}

#[async_trait::async_trait]
impl EngineFactory for OpenAiEngineFactory {
    async fn create(
        &self,
        progress: &dyn ProgressSink,
    ) -> Result<Arc<dyn InferenceEngine>, InferenceError> {
        let client = self.build_client()?;
        let attempts = self.settings.load_poll_attempts.max(1);

        for attempt in 1..=attempts {
            progress.report(InitProgress::new(
                (attempt - 1) as f32 / attempts as f32,
                format!("Waiting for model {}", self.settings.model_id),
            ));
            match self.find_model(&client).await {
                Ok(Some(model)) => {
                    let context_window = model.context_window();
                    engine_info!(
                        "Model {} is served (context window {:?})",
                        model.id,
                        context_window
                    );
                    progress.report(InitProgress::new(1.0, "Model loaded"));
                    return Ok(Arc::new(OpenAiEngine {
                        client,
                        settings: self.settings.clone(),
                        context_window,
                    }));
                }
                Ok(None) => {
                    engine_debug!(
                        "Model {} not listed yet (poll {}/{})",
                        self.settings.model_id,
                        attempt,
                        attempts
                    );
                }
                Err(err) => {
                    engine_debug!("Model poll {}/{} failed: {}", attempt, attempts, err);
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.settings.load_poll_interval).await;
            }
        }

        Err(InferenceError::ModelUnavailable(
            self.settings.model_id.clone(),
        ))
    }
}

/// Chat-completion client bound to one served model.
#[derive(Debug, Clone)]
pub struct OpenAiEngine {
    client: reqwest::Client,
    settings: OpenAiSettings,
    context_window: Option<u32>,
}

#[async_trait::async_trait]
impl InferenceEngine for OpenAiEngine {
    async fn complete(&self, request: CompletionRequest) -> Result<String, InferenceError> {
        let body = ChatCompletionBody {
            model: &self.settings.model_id,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            stream: false,
        };
        let payload =
            serde_json::to_vec(&body).map_err(|err| InferenceError::InvalidResponse(err.to_string()))?;

        let mut http = self
            .client
            .post(self.settings.endpoint("v1/chat/completions"))
            .header(CONTENT_TYPE, "application/json")
            .body(payload);
        if let Some(key) = &self.settings.api_key {
            http = http.bearer_auth(key);
        }

        let timeout = self.settings.request_timeout;
        let response = http
            .send()
            .await
            .map_err(|err| map_reqwest_error(err, timeout))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| map_reqwest_error(err, timeout))?;

        if !status.is_success() {
            let message = String::from_utf8_lossy(&bytes).into_owned();
            if is_context_overflow(status.as_u16(), &message) {
                engine_warn!("Completion rejected: context length exceeded");
                return Err(InferenceError::ContextLengthExceeded(message));
            }
            return Err(InferenceError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_slice(&bytes)
            .map_err(|err| InferenceError::InvalidResponse(err.to_string()))?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default())
    }

    fn context_window(&self) -> Option<u32> {
        self.context_window
    }
}

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
    context_length: Option<u32>,
    max_context_length: Option<u32>,
    meta: Option<ModelMeta>,
}

#[derive(Deserialize)]
struct ModelMeta {
    n_ctx_train: Option<u32>,
}

impl ModelEntry {
    fn context_window(&self) -> Option<u32> {
        self.context_length
            .or(self.max_context_length)
            .or_else(|| self.meta.as_ref().and_then(|meta| meta.n_ctx_train))
            .filter(|tokens| *tokens > 0)
    }
}

fn is_context_overflow(status: u16, message: &str) -> bool {
    if !matches!(status, 400 | 413 | 422) {
        return false;
    }
    let lower = message.to_ascii_lowercase();
    ["context length", "context_length", "context window", "too many tokens"]
        .iter()
        .any(|needle| lower.contains(needle))
}

fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> InferenceError {
    if err.is_timeout() {
        return InferenceError::Timeout(timeout);
    }
    InferenceError::Network(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_overflow_needs_client_error_and_wording() {
        assert!(is_context_overflow(400, "This model's maximum context length is 4096 tokens"));
        assert!(is_context_overflow(400, "{\"code\":\"context_length_exceeded\"}"));
        assert!(!is_context_overflow(500, "context length"));
        assert!(!is_context_overflow(400, "bad temperature"));
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let settings = OpenAiSettings {
            base_url: "http://localhost:8080/".to_string(),
            ..OpenAiSettings::default()
        };
        assert_eq!(
            settings.endpoint("v1/models"),
            "http://localhost:8080/v1/models"
        );
    }
}
