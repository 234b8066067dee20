/// LLM Client: the single point of entry for all Claude API calls in ResumeRank.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// Resume analysis and salary estimation both go through this module.
///
/// Model: claude-sonnet-4-5 (fixed, not configurable)
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all LLM calls in ResumeRank.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 4096;
const MAX_RETRIES: u32 = 3;

/// Image media types accepted as `image` content blocks.
const IMAGE_MEDIA_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("Unsupported document media type: {0}")]
    UnsupportedMediaType(String),
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: MessageContent<'a>,
}

/// A user turn is either a bare prompt string or a list of content parts
/// (an attached document followed by the prompt).
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    Document { source: MediaSource },
    Image { source: MediaSource },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum MediaSource {
    Base64 { media_type: String, data: String },
    Text { media_type: String, data: String },
}

/// Raw document handed to the model alongside a prompt.
#[derive(Debug, Clone, Copy)]
pub struct DocumentInput<'a> {
    pub media_type: &'a str,
    pub data: &'a [u8],
}

impl DocumentInput<'_> {
    fn to_content_part(self) -> Result<ContentPart<'static>, LlmError> {
        let media_type = self.media_type.to_ascii_lowercase();
        if media_type == "application/pdf" {
            return Ok(ContentPart::Document {
                source: MediaSource::Base64 {
                    media_type,
                    data: general_purpose::STANDARD.encode(self.data),
                },
            });
        }
        if IMAGE_MEDIA_TYPES.contains(&media_type.as_str()) {
            return Ok(ContentPart::Image {
                source: MediaSource::Base64 {
                    media_type,
                    data: general_purpose::STANDARD.encode(self.data),
                },
            });
        }
        if media_type.starts_with("text/") {
            return Ok(ContentPart::Document {
                source: MediaSource::Text {
                    media_type: "text/plain".to_string(),
                    data: String::from_utf8_lossy(self.data).into_owned(),
                },
            });
        }
        Err(LlmError::UnsupportedMediaType(self.media_type.to_string()))
    }
}

/// Whether the Messages API can take a document of this media type.
pub fn supports_media_type(media_type: &str) -> bool {
    let media_type = media_type.to_ascii_lowercase();
    media_type == "application/pdf"
        || media_type.starts_with("text/")
        || IMAGE_MEDIA_TYPES.contains(&media_type.as_str())
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// The single LLM client used by all services in ResumeRank.
/// Wraps the Anthropic Messages API with retry logic and structured output helpers.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    api_url: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            api_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_api_url(api_key: String, api_url: String) -> Self {
        Self {
            api_url,
            ..Self::new(api_key)
        }
    }

    /// Makes a raw call to the Claude API, returning the full response object.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    pub async fn call(&self, prompt: &str, system: &str) -> Result<LlmResponse, LlmError> {
        self.send(system, MessageContent::Text(prompt), MAX_RETRIES)
            .await
    }

    /// Single attempt with a document attached ahead of the prompt.
    /// Transient failures are returned to the caller as-is.
    pub async fn call_with_document_once(
        &self,
        prompt: &str,
        system: &str,
        document: DocumentInput<'_>,
    ) -> Result<LlmResponse, LlmError> {
        let parts = vec![
            document.to_content_part()?,
            ContentPart::Text { text: prompt },
        ];
        self.send(system, MessageContent::Parts(parts), 1).await
    }

    /// Posts one user turn, making at most `max_attempts` requests.
    async fn send(
        &self,
        system: &str,
        content: MessageContent<'_>,
        max_attempts: u32,
    ) -> Result<LlmResponse, LlmError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content,
            }],
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..max_attempts.max(1) {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&self.api_url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<AnthropicError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let llm_response: LlmResponse = response.json().await?;

            debug!(
                "LLM call succeeded: input_tokens={}, output_tokens={}",
                llm_response.usage.input_tokens, llm_response.usage.output_tokens
            );

            return Ok(llm_response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: max_attempts,
        }))
    }

    /// Calls the LLM and returns the trimmed text of the first text block.
    pub async fn call_text(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        let response = self.call(prompt, system).await?;
        let text = response.text().map(str::trim).unwrap_or_default();
        if text.is_empty() {
            return Err(LlmError::EmptyContent);
        }
        Ok(text.to_string())
    }

    /// Single-attempt document call whose text response is deserialized as JSON.
    /// The prompt must instruct the model to return valid JSON.
    pub async fn call_json_with_document_once<T: DeserializeOwned>(
        &self,
        prompt: &str,
        system: &str,
        document: DocumentInput<'_>,
    ) -> Result<T, LlmError> {
        let response = self
            .call_with_document_once(prompt, system, document)
            .await?;
        parse_json_text(&response)
    }
}

fn parse_json_text<T: DeserializeOwned>(response: &LlmResponse) -> Result<T, LlmError> {
    let text = response.text().ok_or(LlmError::EmptyContent)?;

    // Strip markdown code fences if the model wraps JSON in them
    let text = strip_json_fences(text);

    serde_json::from_str(text).map_err(LlmError::Parse)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

/// Local stand-in for the Messages API that always answers with one status.
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{http::StatusCode, routing::post, Router};

    /// Returns the endpoint URL and a counter of requests received.
    pub(crate) async fn stub_api(status: StatusCode) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let app = Router::new().route(
            "/v1/messages",
            post(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (status, "upstream unavailable")
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/v1/messages"), hits)
    }
}
