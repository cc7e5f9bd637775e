use anyhow::{Context, Result, bail};
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::credentials::Credentials;
use crate::model::{Message, ResponseChunk};
use crate::providers::http_errors::{ApiStatusError, ErrorDetail, api_request_error};
use crate::providers::sse::SseDecoder;
use crate::streaming::{ChunkFuture, ChunkSource};

const API_VERSION: &str = "v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

fn method_url(base_url: &str, model: &str, method: &str) -> String {
    format!(
        "{}/{}/{}:{}",
        base_url.trim_end_matches('/'),
        API_VERSION,
        model_path(model),
        method
    )
}

fn to_contents(messages: &[Message]) -> Vec<Content> {
    messages
        .iter()
        .map(|msg| Content {
            role: msg.role.as_str().to_string(),
            parts: vec![Part {
                text: msg.content.clone(),
            }],
        })
        .collect()
}

fn parse_event(data: &str) -> Result<ResponseChunk> {
    let parsed: GenerateContentResponse =
        serde_json::from_str(data).context("Failed to parse Gemini stream event")?;
    into_chunk(parsed)
}

fn into_chunk(response: GenerateContentResponse) -> Result<ResponseChunk> {
    if let Some(detail) = response.error {
        return Err(ApiStatusError::from_detail(detail).into());
    }
    if let Some(reason) = response.prompt_feedback.and_then(|fb| fb.block_reason) {
        bail!("Prompt blocked by Gemini: {reason}");
    }

    let parts: Vec<String> = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();
    Ok(ResponseChunk { parts })
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    connect_timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(cfg: &Config, creds: &Credentials) -> Result<Self> {
        if creds.api_key.trim().is_empty() {
            bail!("Gemini API key is empty. Rerun and enter a key when prompted.");
        }
        if creds.model.trim().is_empty() {
            bail!("Gemini model name is empty. Rerun and enter a model when prompted.");
        }

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .build()
            .context("Failed to initialize HTTP client")?;

        Ok(Self {
            http,
            base_url: cfg.base_url.clone(),
            api_key: creds.api_key.clone(),
            model: creds.model.clone(),
            connect_timeout_secs: cfg.connect_timeout_secs,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn post(
        &self,
        api_url: &str,
        messages: &[Message],
        sse: bool,
    ) -> Result<reqwest::Response> {
        let body = GenerateContentRequest {
            contents: to_contents(messages),
        };
        debug!(
            api_url = %api_url,
            model = %self.model,
            message_count = messages.len(),
            stream = sse,
            "sending gemini request"
        );

        let mut request = self
            .http
            .post(api_url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body);
        if sse {
            request = request.query(&[("alt", "sse")]);
        }

        let response = request.send().await.map_err(|err| {
            warn!(
                api_url = %api_url,
                model = %self.model,
                error = %err,
                "gemini request failed"
            );
            api_request_error(err, api_url, self.connect_timeout_secs)
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let response_body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read response body>".to_string());
            warn!(
                api_url = %api_url,
                model = %self.model,
                status = %status,
                response_body_len = response_body.len(),
                "gemini returned non-success status"
            );
            return Err(ApiStatusError::from_body(status.as_u16(), &response_body).into());
        }

        Ok(response)
    }

    pub async fn generate(&self, messages: &[Message]) -> Result<Message> {
        let api_url = method_url(&self.base_url, &self.model, "generateContent");
        let response = self.post(&api_url, messages, false).await?;
        let parsed: GenerateContentResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;
        let chunk = into_chunk(parsed)?;
        debug!(
            model = %self.model,
            response_len = chunk.text().len(),
            "received gemini response"
        );
        Ok(Message::model(chunk.text()))
    }

    /// Starts a streamed reply. Fails if the request cannot be sent or the
    /// API rejects it; later failures surface from the stream itself.
    pub async fn stream_generate(&self, messages: &[Message]) -> Result<ResponseStream> {
        let api_url = method_url(&self.base_url, &self.model, "streamGenerateContent");
        let response = self.post(&api_url, messages, true).await?;

        let timeout_secs = self.connect_timeout_secs;
        let body = response
            .bytes_stream()
            .map(move |item| {
                item.map(|bytes| bytes.to_vec())
                    .map_err(|err| api_request_error(err, &api_url, timeout_secs))
            })
            .boxed();
        Ok(ResponseStream::from_body(body))
    }
}

type BodyStream = BoxStream<'static, Result<Vec<u8>>>;

pub struct ResponseStream {
    body: BodyStream,
    decoder: SseDecoder,
    body_done: bool,
    finished: bool,
    transcript: String,
}

impl ResponseStream {
    pub(crate) fn from_body(body: BodyStream) -> Self {
        Self {
            body,
            decoder: SseDecoder::new(),
            body_done: false,
            finished: false,
            transcript: String::new(),
        }
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub async fn pull(&mut self) -> Option<Result<ResponseChunk>> {
        if self.finished {
            return None;
        }

        loop {
            let event = if self.body_done {
                self.decoder.next_event().or_else(|| self.decoder.finish())
            } else {
                self.decoder.next_event()
            };

            if let Some(data) = event {
                return Some(self.accept(parse_event(&data)));
            }

            if self.body_done {
                self.finished = true;
                return None;
            }

            match self.body.next().await {
                Some(Ok(bytes)) => self.decoder.push(&bytes),
                Some(Err(err)) => {
                    self.finished = true;
                    return Some(Err(err));
                }
                None => self.body_done = true,
            }
        }
    }

    fn accept(&mut self, parsed: Result<ResponseChunk>) -> Result<ResponseChunk> {
        match parsed {
            Ok(chunk) => {
                for part in &chunk.parts {
                    self.transcript.push_str(part);
                }
                Ok(chunk)
            }
            Err(err) => {
                self.finished = true;
                Err(err)
            }
        }
    }
}

impl ChunkSource for ResponseStream {
    fn next_chunk(&mut self) -> ChunkFuture<'_> {
        Box::pin(self.pull())
    }
}

impl std::fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseStream")
            .field("body_done", &self.body_done)
            .field("finished", &self.finished)
            .field("transcript_len", &self.transcript.len())
            .finish()
    }
}
