//! Generation adapters.
//!
//! Implements the core [`Generator`] trait on top of chat-completion APIs:
//! - **[`DisabledGenerator`]**: always fails; used when no provider is configured.
//! - **[`ChatGenerator`]** with the OpenAI backend: `POST {url}/chat/completions`,
//!   requires `OPENAI_API_KEY` unless a custom `url` is configured.
//! - **[`ChatGenerator`]** with the Ollama backend: `POST {url}/api/chat`.
//!
//! Use [`create_generator`] to build the one named by the configuration.
//!
//! # Retry Strategy
//!
//! Retries live here, not in the lifecycle service:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use docchat_core::adapters::Generator;
use docchat_core::error::GenerationError;

use crate::config::GenerationConfig;

const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";
const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

const SUMMARY_SYSTEM: &str = "You summarize documents for a specific reader. \
Write plain, well-organized prose and keep every statement faithful to the document.";

const ANSWER_SYSTEM: &str = "You answer questions about a document. \
Use only the document text provided. If the document does not contain the answer, say so.";

/// Builds the generator named by `config.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "openai" => Ok(Arc::new(ChatGenerator::openai(config)?)),
        "ollama" => Ok(Arc::new(ChatGenerator::ollama(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

// ============ Disabled ============

/// A generator that refuses every request.
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    async fn summarize(
        &self,
        _text: &str,
        _age: Option<u32>,
        _interests: &[String],
    ) -> Result<String, GenerationError> {
        Err(GenerationError("generation provider is disabled".to_string()))
    }

    async fn answer(&self, _text: &str, _question: &str) -> Result<String, GenerationError> {
        Err(GenerationError("generation provider is disabled".to_string()))
    }
}

// ============ Chat-completion backends ============

#[derive(Clone)]
enum Backend {
    OpenAi { api_key: Option<String> },
    Ollama,
}

impl Backend {
    fn label(&self) -> &'static str {
        match self {
            Backend::OpenAi { .. } => "openai",
            Backend::Ollama => "ollama",
        }
    }
}

/// Generator backed by an OpenAI-compatible or Ollama chat endpoint.
pub struct ChatGenerator {
    backend: Backend,
    client: reqwest::Client,
    url: String,
    model: String,
    max_retries: u32,
    max_context_chars: usize,
}

impl ChatGenerator {
    /// # Errors
    ///
    /// Fails if `model` is unset, or if `OPENAI_API_KEY` is missing while
    /// the default OpenAI URL is in use.
    pub fn openai(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok();
        if api_key.is_none() && config.url.is_none() {
            bail!("OPENAI_API_KEY environment variable not set");
        }
        Self::build(
            Backend::OpenAi { api_key },
            config,
            config.url.as_deref().unwrap_or(OPENAI_DEFAULT_URL),
        )
    }

    pub fn ollama(config: &GenerationConfig) -> Result<Self> {
        Self::build(
            Backend::Ollama,
            config,
            config.url.as_deref().unwrap_or(OLLAMA_DEFAULT_URL),
        )
    }

    fn build(backend: Backend, config: &GenerationConfig, url: &str) -> Result<Self> {
        let model = config.model.clone().ok_or_else(|| {
            anyhow::anyhow!("generation.model required for {} provider", backend.label())
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            backend,
            client,
            url: url.trim_end_matches('/').to_string(),
            model,
            max_retries: config.max_retries,
            max_context_chars: config.max_context_chars,
        })
    }

    fn endpoint(&self) -> String {
        match self.backend {
            Backend::OpenAi { .. } => format!("{}/chat/completions", self.url),
            Backend::Ollama => format!("{}/api/chat", self.url),
        }
    }

    fn request_body(&self, system: &str, user: &str) -> Value {
        let messages = json!([
            { "role": "system", "content": system },
            { "role": "user", "content": user },
        ]);
        match self.backend {
            Backend::OpenAi { .. } => json!({ "model": self.model, "messages": messages }),
            Backend::Ollama => json!({ "model": self.model, "messages": messages, "stream": false }),
        }
    }

    fn parse_reply(&self, json: &Value) -> Result<String> {
        let content = match self.backend {
            Backend::OpenAi { .. } => json
                .pointer("/choices/0/message/content")
                .and_then(|c| c.as_str()),
            Backend::Ollama => json.pointer("/message/content").and_then(|c| c.as_str()),
        };
        content
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing message content"))
    }

    /// Sends one chat exchange with retry/backoff.
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = self.request_body(system, user);
        let endpoint = self.endpoint();
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(attempt, ?delay, "retrying generation request");
                tokio::time::sleep(delay).await;
            }

            let mut req = self.client.post(&endpoint).json(&body);
            if let Backend::OpenAi {
                api_key: Some(key),
            } = &self.backend
            {
                req = req.bearer_auth(key);
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: Value = response.json().await?;
                        return self.parse_reply(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(%status, attempt, "generation endpoint returned retryable error");
                        last_err =
                            Some(anyhow::anyhow!("chat API error {}: {}", status, body_text));
                        continue;
                    }

                    bail!("chat API error {}: {}", status, body_text);
                }
                Err(e) => {
                    warn!(error = %e, attempt, "generation request failed");
                    last_err = Some(anyhow::anyhow!(
                        "chat API connection error ({}): {}",
                        self.url,
                        e
                    ));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("generation failed after retries")))
    }
}

#[async_trait]
impl Generator for ChatGenerator {
    async fn summarize(
        &self,
        text: &str,
        age: Option<u32>,
        interests: &[String],
    ) -> Result<String, GenerationError> {
        let prompt = summary_prompt(truncate_chars(text, self.max_context_chars), age, interests);
        self.complete(SUMMARY_SYSTEM, &prompt)
            .await
            .map_err(|e| GenerationError(e.to_string()))
    }

    async fn answer(&self, text: &str, question: &str) -> Result<String, GenerationError> {
        let prompt = answer_prompt(truncate_chars(text, self.max_context_chars), question);
        self.complete(ANSWER_SYSTEM, &prompt)
            .await
            .map_err(|e| GenerationError(e.to_string()))
    }
}

// ============ Prompts ============

pub fn summary_prompt(text: &str, age: Option<u32>, interests: &[String]) -> String {
    let reader = match age {
        Some(age) => format!("a {}-year-old reader", age),
        None => "a general reader".to_string(),
    };
    format!(
        "Summarize the following document for {} interested in {}. \
         Where it helps understanding, relate the ideas to those interests.\n\n\
         Document:\n{}",
        reader,
        interests.join(", "),
        text
    )
}

pub fn answer_prompt(text: &str, question: &str) -> String {
    format!("Document:\n{}\n\nQuestion: {}", text, question)
}

/// Cuts `text` to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};

    fn config(provider: &str, url: Option<String>, retries: u32) -> GenerationConfig {
        GenerationConfig {
            provider: provider.to_string(),
            model: Some("test-model".to_string()),
            url,
            timeout_secs: 5,
            max_retries: retries,
            max_context_chars: 40,
            ..GenerationConfig::default()
        }
    }

    async fn spawn_mock(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn summary_prompt_personalizes() {
        let p = summary_prompt("TEXT", Some(15), &["soccer".into(), "space".into()]);
        assert!(p.contains("15-year-old"));
        assert!(p.contains("soccer, space"));
        assert!(p.ends_with("TEXT"));

        let p = summary_prompt("TEXT", None, &["various topics".into()]);
        assert!(p.contains("general reader"));
        assert!(p.contains("various topics"));
    }

    #[tokio::test]
    async fn disabled_generator_always_fails() {
        let gen = create_generator(&GenerationConfig::default()).unwrap();
        assert!(gen.summarize("t", None, &[]).await.is_err());
        assert!(gen.answer("t", "q").await.is_err());
    }

    #[tokio::test]
    async fn ollama_backend_parses_reply_and_truncates_context() {
        let app = Router::new().route(
            "/api/chat",
            post(|Json(body): Json<Value>| async move {
                let user = body["messages"][1]["content"].as_str().unwrap_or("").to_string();
                Json(json!({ "message": { "role": "assistant", "content": user } }))
            }),
        );
        let url = spawn_mock(app).await;
        let gen = ChatGenerator::ollama(&config("ollama", Some(url), 0)).unwrap();

        let long_text = "x".repeat(500);
        let echoed = gen.answer(&long_text, "why?").await.unwrap();
        assert!(echoed.contains(&"x".repeat(40)));
        assert!(!echoed.contains(&"x".repeat(41)));
        assert!(echoed.ends_with("Question: why?"));
    }

    #[tokio::test]
    async fn openai_backend_reads_first_choice() {
        let app = Router::new().route(
            "/chat/completions",
            post(|| async {
                Json(json!({
                    "choices": [ { "message": { "role": "assistant", "content": "a summary" } } ]
                }))
            }),
        );
        let url = spawn_mock(app).await;
        let gen = ChatGenerator::openai(&config("openai", Some(url), 0)).unwrap();
        let summary = gen
            .summarize("doc", Some(30), &["history".into()])
            .await
            .unwrap();
        assert_eq!(summary, "a summary");
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/api/chat",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (axum::http::StatusCode::BAD_REQUEST, "bad model")
                }
            }),
        );
        let url = spawn_mock(app).await;
        let gen = ChatGenerator::ollama(&config("ollama", Some(url), 3)).unwrap();

        let err = gen.answer("doc", "q").await.unwrap_err();
        assert!(err.to_string().contains("400"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
