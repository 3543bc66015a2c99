//! Streaming chat completion backends

use crate::error::ChatError;
use crate::types::{ApiKey, ChatMessage};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};

/// Text deltas of one assistant reply, in arrival order
pub type FragmentStream = BoxStream<'static, Result<String, ChatError>>;

/// Trait for chat completion providers
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Start a streamed completion. `messages` excludes the system prompt.
    async fn stream_completion(
        &self,
        api_key: &ApiKey,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<FragmentStream, ChatError>;
}

/// Request body for an OpenAI-compatible chat endpoint
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// One parsed server-sent-event line
#[derive(Debug, PartialEq)]
pub enum SseLine {
    Delta(String),
    Done,
    Skip,
}

/// Parse a single `data:` line of the completion stream
pub fn parse_sse_line(line: &str) -> Result<SseLine, ChatError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let payload = match line.strip_prefix("data:") {
        Some(payload) => payload.trim_start(),
        None => return Ok(SseLine::Skip), // comments, event names, keep-alives
    };

    if payload == "[DONE]" {
        return Ok(SseLine::Done);
    }

    let chunk: CompletionChunk = serde_json::from_str(payload)
        .map_err(|e| ChatError::Transport(format!("malformed stream chunk: {}", e)))?;

    if let Some(err) = chunk.error {
        return Err(ChatError::Transport(err.message));
    }

    match chunk.choices.into_iter().next().and_then(|c| c.delta.content) {
        Some(text) if !text.is_empty() => Ok(SseLine::Delta(text)),
        _ => Ok(SseLine::Skip),
    }
}

struct SseState<S> {
    inner: S,
    buffer: Vec<u8>,
    finished: bool,
}

/// Turn a byte stream of server-sent events into text fragments.
///
/// Lines are split on raw bytes so multi-byte characters cut across chunk
/// boundaries are decoded intact.
pub fn sse_fragments<S, B>(inner: S) -> FragmentStream
where
    S: Stream<Item = Result<B, ChatError>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = SseState {
        inner: Box::pin(inner),
        buffer: Vec::new(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if st.finished {
                return None;
            }

            if let Some(pos) = st.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = st.buffer.drain(..=pos).collect();
                match parse_sse_line(&String::from_utf8_lossy(&line)) {
                    Ok(SseLine::Delta(text)) => return Some((Ok(text), st)),
                    Ok(SseLine::Skip) => continue,
                    Ok(SseLine::Done) => return None,
                    Err(e) => {
                        st.finished = true;
                        return Some((Err(e), st));
                    }
                }
            }

            match st.inner.next().await {
                Some(Ok(chunk)) => st.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(e), st));
                }
                None => {
                    st.finished = true;
                    // Trailing line without a newline
                    if st.buffer.is_empty() {
                        return None;
                    }
                    let line = std::mem::take(&mut st.buffer);
                    return match parse_sse_line(&String::from_utf8_lossy(&line)) {
                        Ok(SseLine::Delta(text)) => Some((Ok(text), st)),
                        Ok(_) => None,
                        Err(e) => Some((Err(e), st)),
                    };
                }
            }
        }
    })
    .boxed()
}

/// OpenAI-compatible streaming chat client
pub struct OpenAiChat {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatBackend for OpenAiChat {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn stream_completion(
        &self,
        api_key: &ApiKey,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<FragmentStream, ChatError> {
        let mut all = Vec::with_capacity(messages.len() + 1);
        all.push(ChatMessage::system(system));
        all.extend_from_slice(messages);

        let body = CompletionRequest {
            model: &self.model,
            messages: all,
            stream: true,
        };

        let url = self.endpoint();
        tracing::debug!("Sending chat request to {} ({} messages)", url, body.messages.len());

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Transport(format!("failed to reach {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => ChatError::Auth(format!("{}: {}", status, error_text)),
                _ => ChatError::Transport(format!("chat service error ({}): {}", status, error_text)),
            });
        }

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ChatError::Transport(e.to_string())));
        Ok(sse_fragments(bytes))
    }
}

/// Replays a fixed script of fragments, for tests and the demo mode
pub struct ScriptedChat {
    script: Vec<Result<String, ChatError>>,
}

impl ScriptedChat {
    pub fn new(script: Vec<Result<String, ChatError>>) -> Self {
        Self { script }
    }

    pub fn replying(fragments: &[&str]) -> Self {
        Self::new(fragments.iter().map(|f| Ok(f.to_string())).collect())
    }
}

#[async_trait]
impl ChatBackend for ScriptedChat {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn stream_completion(
        &self,
        _api_key: &ApiKey,
        _system: &str,
        _messages: &[ChatMessage],
    ) -> Result<FragmentStream, ChatError> {
        Ok(stream::iter(self.script.clone()).boxed())
    }
}
