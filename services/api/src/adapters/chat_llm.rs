//! services/api/src/adapters/chat_llm.rs
//!
//! This module contains the adapter for the DeepSeek chat-completions API.
//! It implements the `ChatCompletionService` port from the `core` crate in
//! both batch and streaming (server-sent events) modes.

use async_stream::try_stream;
use coaching_core::ports::{ChatCompletionService, ChatRequest, ChatStream, PortError, PortResult};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tracing::warn;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ChatCompletionService` against a
/// DeepSeek-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct DeepseekChatAdapter {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl DeepseekChatAdapter {
    /// Creates a new `DeepseekChatAdapter`.
    pub fn new(http: reqwest::Client, api_key: String, base_url: String, model: String) -> Self {
        Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }

    fn build_body(&self, request: &ChatRequest, stream: bool) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": m.role.as_str(),
                    "content": m.content,
                })
            })
            .collect();

        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "stream": stream,
        })
    }

    async fn send(
        &self,
        request: &ChatRequest,
        stream: bool,
    ) -> PortResult<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&self.build_body(request, stream))
            .send()
            .await
            .map_err(|e| PortError::Upstream(format!("DeepSeek request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PortError::Upstream(format!(
                "DeepSeek API error ({status}): {text}"
            )));
        }

        Ok(response)
    }
}

//=========================================================================================
// `ChatCompletionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatCompletionService for DeepseekChatAdapter {
    async fn complete(&self, request: ChatRequest) -> PortResult<String> {
        let response = self.send(&request, false).await?;

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| PortError::Upstream(format!("Malformed completion response: {e}")))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| PortError::Upstream("completion response contained no content".to_string()))
    }

    async fn complete_stream(&self, request: ChatRequest) -> PortResult<ChatStream> {
        let response = self.send(&request, true).await?;
        let mut bytes = response.bytes_stream();

        let stream = try_stream! {
            let mut decoder = SseLineDecoder::new();
            'read: while let Some(chunk) = bytes.next().await {
                let chunk = chunk
                    .map_err(|e| PortError::Upstream(format!("stream read failed: {e}")))?;
                for line in decoder.push(&chunk) {
                    if line == "data: [DONE]" {
                        break 'read;
                    }
                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    match serde_json::from_str::<StreamChunk>(data) {
                        Ok(parsed) => {
                            let content = parsed
                                .choices
                                .into_iter()
                                .next()
                                .and_then(|choice| choice.delta.content);
                            if let Some(content) = content {
                                if !content.is_empty() {
                                    yield content;
                                }
                            }
                        }
                        Err(e) => warn!(error = %e, "skipping undecodable stream frame"),
                    }
                }
            }
        };

        Ok(Box::pin(stream) as ChatStream)
    }
}

//=========================================================================================
// SSE Line Decoder
//=========================================================================================

/// Reassembles complete `data:` lines from arbitrarily split transport
/// chunks.
///
/// Bytes are buffered until a newline arrives, so fragment boundaries that
/// fall inside a multi-byte UTF-8 sequence or mid-line never lose data; a
/// trailing partial line simply waits for the next chunk.
pub struct SseLineDecoder {
    buf: Vec<u8>,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Feeds one transport chunk and returns every complete, non-empty line.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            // A complete line is valid UTF-8 whenever the input is: multi-byte
            // sequences never contain the newline byte.
            let line = String::from_utf8_lossy(&raw).trim().to_string();
            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines
    }
}

impl Default for SseLineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}
