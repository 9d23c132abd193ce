//! Chat-completion client for code generation.
//!
//! The [`ChatService`] trait decouples generation from the actual service
//! backend (an OpenAI-compatible HTTP API). Tests use scripted services that
//! return predetermined responses without network access.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::fence::{ParseError, extract_fenced_block};
use crate::core::imports::rewrite_function_import;
use crate::io::config::SessionConfig;
use crate::io::prompt::PromptEngine;

/// A two-message system/user exchange, bounded by a token budget.
/// Immutable once sent.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
}

/// Raw service response plus the completion identifier, used only for
/// diagnostics.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub completion_id: String,
}

/// The service signalled rate-limit/overload; the only structured error
/// consumed from the service. Recovered locally via fixed-delay retry.
#[derive(Debug, Clone, Error)]
#[error("service overloaded (HTTP {status})")]
pub struct ServiceOverload {
    pub status: u16,
}

/// Abstraction over chat-completion backends.
pub trait ChatService {
    fn complete(&self, request: &ChatRequest) -> Result<ChatResponse>;
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    id: String,
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: String,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChat {
    client: reqwest::blocking::Client,
    api_base: String,
    api_key: String,
}

impl OpenAiChat {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            api_base: api_base.into(),
            api_key: api_key.into(),
        }
    }

    /// Build a client with the key from `OPENAI_API_KEY`.
    pub fn from_env(api_base: &str) -> Result<Self> {
        let api_key =
            std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?;
        Ok(Self::new(api_base, api_key))
    }
}

impl ChatService for OpenAiChat {
    #[instrument(skip_all, fields(model = %request.model, max_tokens = request.max_tokens))]
    fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let body = WireRequest {
            model: &request.model,
            messages: vec![
                WireMessage {
                    role: "system",
                    content: &request.system,
                },
                WireMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            max_tokens: request.max_tokens,
        };

        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));
        debug!(url = %url, "sending chat completion request");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .context("send chat completion request")?;

        let status = response.status();
        if status.as_u16() == 429 || status.as_u16() == 503 {
            warn!(status = status.as_u16(), "service overloaded");
            return Err(ServiceOverload {
                status: status.as_u16(),
            }
            .into());
        }
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "chat completion failed with HTTP {}: {}",
                status.as_u16(),
                text.trim()
            ));
        }

        let parsed: WireResponse = response.json().context("parse chat completion body")?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("chat completion returned no choices"))?;
        debug!(completion_id = %parsed.id, "chat completion received");
        Ok(ChatResponse {
            content,
            completion_id: parsed.id,
        })
    }
}

/// Code-generation front end: builds prompts, calls the service with
/// overload retry, and extracts the single fenced code block.
pub struct GenerationClient<'a, S: ChatService> {
    service: &'a S,
    engine: PromptEngine,
    config: &'a SessionConfig,
}

impl<'a, S: ChatService> GenerationClient<'a, S> {
    pub fn new(service: &'a S, config: &'a SessionConfig) -> Self {
        Self {
            service,
            engine: PromptEngine::new(),
            config,
        }
    }

    /// Generate the implementation source for `function_name`.
    ///
    /// On retries the failure transcript is appended to the original task
    /// description.
    #[instrument(skip_all, fields(function_name, retry = failure.is_some()))]
    pub fn generate_implementation(
        &self,
        function_name: &str,
        task: &str,
        failure: Option<&str>,
    ) -> Result<String> {
        let user = self
            .engine
            .render_implementation(function_name, task, failure)?;
        self.generate(&user, function_name)
    }

    /// Generate a test that imports (never inlines) the implementation.
    ///
    /// Whatever import path the model invents for the function under test is
    /// rewritten to the correct relative path before the source is returned.
    #[instrument(skip_all, fields(function_name))]
    pub fn generate_test(
        &self,
        function_name: &str,
        implementation_file: &str,
        implementation_source: &str,
    ) -> Result<String> {
        let module = implementation_file.trim_end_matches(".ts");
        let user = self
            .engine
            .render_test(function_name, module, implementation_source)?;
        let source = self.generate(&user, function_name)?;
        Ok(rewrite_function_import(&source, function_name))
    }

    /// One generation round: service call with overload retry, fenced-block
    /// extraction with bounded regeneration on malformed output.
    fn generate(&self, user: &str, function_name: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            system: self.engine.render_system()?,
            user: user.to_string(),
            max_tokens: self.config.max_tokens,
        };

        let mut parse_attempts = 0u32;
        loop {
            let response = self.complete_with_retry(&request)?;
            match extract_fenced_block(&response.content) {
                Ok(source) => return Ok(source),
                Err(err) => {
                    parse_attempts += 1;
                    warn!(
                        completion_id = %response.completion_id,
                        attempt = parse_attempts,
                        err = %err,
                        "malformed generation output"
                    );
                    if parse_attempts > self.config.parse_retry_limit {
                        return Err(anyhow::Error::new(err).context(format!(
                            "generation for '{function_name}' kept returning malformed output \
                             (last completion {})",
                            response.completion_id
                        )));
                    }
                }
            }
        }
    }

    fn complete_with_retry(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let mut overload_retries = 0u32;
        loop {
            match self.service.complete(request) {
                Ok(response) => return Ok(response),
                Err(err) => {
                    let Some(overload) = err.downcast_ref::<ServiceOverload>() else {
                        // Any non-overload service error propagates.
                        return Err(err);
                    };
                    overload_retries += 1;
                    if overload_retries > self.config.overload_retry_limit {
                        return Err(err.context("overload retry budget exhausted"));
                    }
                    info!(
                        status = overload.status,
                        retry = overload_retries,
                        delay_secs = self.config.overload_retry_delay_secs,
                        "model is currently overloaded, retrying"
                    );
                    thread::sleep(Duration::from_secs(self.config.overload_retry_delay_secs));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedChat;

    fn test_config() -> SessionConfig {
        SessionConfig {
            overload_retry_delay_secs: 0,
            overload_retry_limit: 3,
            parse_retry_limit: 1,
            ..SessionConfig::default()
        }
    }

    #[test]
    fn generate_extracts_trimmed_block_without_language_tag() {
        let chat = ScriptedChat::new(vec![Ok(
            "```typescript\nexport default function add(a: number, b: number): number {\n  return a + b;\n}\n```".to_string(),
        )]);
        let config = test_config();
        let client = GenerationClient::new(&chat, &config);

        let source = client
            .generate_implementation("add", "add two numbers", None)
            .expect("generate");
        assert!(source.starts_with("export default function add"));
        assert!(!source.contains("typescript"));
    }

    #[test]
    fn overload_is_retried_then_succeeds() {
        let chat = ScriptedChat::new(vec![
            Err(ServiceOverload { status: 429 }),
            Ok("```\nconst x = 1;\n```".to_string()),
        ]);
        let config = test_config();
        let client = GenerationClient::new(&chat, &config);

        let source = client
            .generate_implementation("x", "make x", None)
            .expect("generate");
        assert_eq!(source, "const x = 1;");
        assert_eq!(chat.calls(), 2);
    }

    #[test]
    fn overload_budget_exhaustion_propagates() {
        let chat = ScriptedChat::new(vec![
            Err(ServiceOverload { status: 429 }),
            Err(ServiceOverload { status: 429 }),
            Err(ServiceOverload { status: 503 }),
            Err(ServiceOverload { status: 429 }),
        ]);
        let config = SessionConfig {
            overload_retry_limit: 2,
            overload_retry_delay_secs: 0,
            ..SessionConfig::default()
        };
        let client = GenerationClient::new(&chat, &config);

        let err = client
            .generate_implementation("x", "make x", None)
            .unwrap_err();
        assert!(err.downcast_ref::<ServiceOverload>().is_some());
    }

    #[test]
    fn malformed_output_triggers_bounded_regeneration() {
        let chat = ScriptedChat::new(vec![
            Ok("no code at all".to_string()),
            Ok("```\nconst y = 2;\n```".to_string()),
        ]);
        let config = test_config();
        let client = GenerationClient::new(&chat, &config);

        let source = client
            .generate_implementation("y", "make y", None)
            .expect("generate");
        assert_eq!(source, "const y = 2;");
    }

    #[test]
    fn persistent_malformed_output_surfaces_parse_error() {
        let chat = ScriptedChat::new(vec![
            Ok("nothing".to_string()),
            Ok("still nothing".to_string()),
            Ok("and again".to_string()),
        ]);
        let config = test_config();
        let client = GenerationClient::new(&chat, &config);

        let err = client
            .generate_implementation("y", "make y", None)
            .unwrap_err();
        assert!(err.downcast_ref::<ParseError>().is_some());
    }

    #[test]
    fn generated_test_import_is_rewritten_to_relative_path() {
        let chat = ScriptedChat::new(vec![Ok(
            "```typescript\nimport { add } from 'made/up/path';\n\ntest('adds', () => {\n  expect(add(2, 3)).toBe(5);\n});\n```"
                .to_string(),
        )]);
        let config = test_config();
        let client = GenerationClient::new(&chat, &config);

        let source = client
            .generate_test("add", "add.ts", "export function add() {}")
            .expect("generate test");
        assert!(source.contains("from './add'"));
        assert!(!source.contains("made/up/path"));
    }
}
