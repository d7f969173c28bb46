use futures::StreamExt;
use log::{debug, error, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::cancellable_sse::FrameSender;
use crate::error::StreamClosed;
use crate::stream_parser::{SseLineReader, SsePayload};

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("language model request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The upstream body is logged, never surfaced to the client.
    #[error("language model returned status {status}")]
    Status { status: u16 },
    #[error("language model returned no text")]
    Empty,
    #[error(transparent)]
    Closed(#[from] StreamClosed),
}

/// One request to the model.
#[derive(Debug, Clone, Default)]
pub struct GeminiPrompt {
    pub system: String,
    pub prompt: String,
    pub temperature: Option<f32>,
    /// Ask for thought summaries alongside the answer.
    pub include_thoughts: bool,
    /// Constrain the answer to a JSON document.
    pub json_output: bool,
}

impl GeminiPrompt {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_thoughts(mut self) -> Self {
        self.include_thoughts = true;
        self
    }

    pub fn json(mut self) -> Self {
        self.json_output = true;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn body(&self) -> serde_json::Value {
        let mut generation_config = json!({});
        if let Some(temperature) = self.temperature {
            generation_config["temperature"] = json!(temperature);
        }
        if self.include_thoughts {
            generation_config["thinkingConfig"] = json!({ "includeThoughts": true });
        }
        if self.json_output {
            generation_config["responseMimeType"] = json!("application/json");
        }

        json!({
            "systemInstruction": { "parts": [{ "text": self.system }] },
            "contents": [{ "role": "user", "parts": [{ "text": self.prompt }] }],
            "generationConfig": generation_config,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelChunk {
    Thought(String),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize, Serialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

/// Splits one upstream `data:` payload into thought and answer chunks.
/// Payloads that are not a generate response yield nothing.
pub fn parse_stream_payload(payload: &str) -> Vec<ModelChunk> {
    let Ok(response) = serde_json::from_str::<GenerateResponse>(payload) else {
        debug!("Ignoring unexpected model payload: {payload}");
        return Vec::new();
    };

    response
        .candidates
        .into_iter()
        .take(1)
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .filter_map(|part| match part.text {
            Some(text) if !text.is_empty() => Some(if part.thought {
                ModelChunk::Thought(text)
            } else {
                ModelChunk::Text(text)
            }),
            _ => None,
        })
        .collect()
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/models/{}:{method}", self.base_url, self.model)
    }

    async fn post(&self, url: String, prompt: &GeminiPrompt) -> Result<reqwest::Response, GeminiError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&prompt.body())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!("Model request failed with {status}: {body}");
            return Err(GeminiError::Status { status });
        }
        Ok(response)
    }

    /// Non-streaming call; returns the answer text without thoughts.
    pub async fn generate(&self, prompt: &GeminiPrompt) -> Result<String, GeminiError> {
        let response = self.post(self.url("generateContent"), prompt).await?;
        let raw = response.text().await?;
        let text: String = parse_stream_payload(&raw)
            .into_iter()
            .filter_map(|chunk| match chunk {
                ModelChunk::Text(text) => Some(text),
                ModelChunk::Thought(_) => None,
            })
            .collect();

        if text.trim().is_empty() {
            return Err(GeminiError::Empty);
        }
        Ok(text)
    }

    /// Streams the answer to `sender`: thought summaries as `thought` frames,
    /// answer fragments as `text` frames. Returns the full answer text.
    pub async fn stream_generate(
        &self,
        prompt: &GeminiPrompt,
        sender: &FrameSender,
    ) -> Result<String, GeminiError> {
        let url = format!("{}?alt=sse", self.url("streamGenerateContent"));
        let response = self.post(url, prompt).await?;

        info!("Streaming response from {}", self.model);
        let mut stream = response.bytes_stream();
        let mut reader = SseLineReader::new();
        let mut accumulated = String::new();

        while let Some(item) = stream.next().await {
            if sender.is_cancelled() {
                info!("Model stream cancelled during processing");
                return Err(StreamClosed.into());
            }

            let bytes = item?;
            for payload in reader.push(&bytes) {
                let SsePayload::Data(data) = payload else {
                    break;
                };
                for chunk in parse_stream_payload(&data) {
                    match chunk {
                        ModelChunk::Thought(thought) => {
                            let thought = thought.trim();
                            if !thought.is_empty() {
                                sender.thought(thought).await?;
                            }
                        }
                        ModelChunk::Text(text) => {
                            accumulated.push_str(&text);
                            sender.text(text).await?;
                        }
                    }
                }
            }
            if reader.is_done() {
                break;
            }
        }

        debug!("Model stream closed after {} chars", accumulated.len());
        if accumulated.trim().is_empty() {
            return Err(GeminiError::Empty);
        }
        Ok(accumulated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_thoughts_from_text() {
        let payload = r##"{"candidates":[{"content":{"parts":[
            {"text":"Considering the repos","thought":true},
            {"text":"# Hi there"}
        ],"role":"model"}}]}"##;
        assert_eq!(
            parse_stream_payload(payload),
            vec![
                ModelChunk::Thought("Considering the repos".into()),
                ModelChunk::Text("# Hi there".into()),
            ]
        );
    }

    #[test]
    fn ignores_empty_and_foreign_payloads() {
        assert!(parse_stream_payload(r#"{"candidates":[{"finishReason":"STOP"}]}"#).is_empty());
        assert!(parse_stream_payload(r#"{"usageMetadata":{"totalTokenCount":3}}"#).is_empty());
        assert!(parse_stream_payload("not json").is_empty());
        assert!(parse_stream_payload(r#"{"candidates":[{"content":{"parts":[{"text":""}]}}]}"#).is_empty());
    }

    #[test]
    fn request_body_flags() {
        let body = GeminiPrompt::new("sys", "hello")
            .with_thoughts()
            .json()
            .temperature(0.4)
            .body();
        assert_eq!(body["generationConfig"]["thinkingConfig"]["includeThoughts"], true);
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");

        let plain = GeminiPrompt::new("sys", "hello").body();
        assert!(plain["generationConfig"].get("thinkingConfig").is_none());
    }

    #[test]
    fn status_errors_hide_the_upstream_body() {
        let err = GeminiError::Status { status: 403 };
        assert_eq!(err.to_string(), "language model returned status 403");
    }

    #[test]
    fn endpoint_urls() {
        let client = GeminiClient::new("k".into(), "gemini-test".into(), "http://localhost/v1beta/".into());
        assert_eq!(
            client.url("generateContent"),
            "http://localhost/v1beta/models/gemini-test:generateContent"
        );
    }
}
